// src/session.rs
//
// Session state for uploaded videos. At most one session is current; it is
// keyed by the SHA-256 of the uploaded bytes and replaced whenever a
// different upload comes in. Completed sessions are persisted as JSON so a
// later run can reuse the artifact without reprocessing.

use crate::error::SessionError;
use crate::types::ClasswiseCount;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Raw bytes plus the name the user gave them.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self { filename, bytes })
    }

    /// Hex SHA-256 of the content; identical bytes share a session whatever
    /// their file name.
    pub fn content_key(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
    }

    /// `clip.mp4` -> `clip_output.mp4`
    pub fn output_file_name(&self) -> String {
        self.output_name_with_suffix("_output")
    }

    /// `clip.mp4` + `1a2b3c4d` -> `clip_output_1a2b3c4d.mp4`
    pub fn tagged_output_file_name(&self, tag: &str) -> String {
        self.output_name_with_suffix(&format!("_output_{}", tag))
    }

    fn output_name_with_suffix(&self, suffix: &str) -> String {
        let path = Path::new(&self.filename);
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        match self.extension() {
            Some(ext) => format!("{}{}.{}", stem, suffix, ext),
            None => format!("{}{}", stem, suffix),
        }
    }

    /// Copies the bytes to a temporary file that keeps the original
    /// extension, so the decoder can sniff the container. Removed on drop.
    pub fn write_temp_file(&self) -> std::io::Result<NamedTempFile> {
        let suffix = self
            .extension()
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("vehicle-counter-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&self.bytes)?;
        file.flush()?;
        Ok(file)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Idle,
    Processing,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingSession {
    pub input_key: String,
    pub source_name: String,
    pub raw_input_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub results: ClasswiseCount,
    pub status: SessionStatus,
    pub failure: Option<String>,
}

impl ProcessingSession {
    pub fn new(input_key: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            input_key: input_key.into(),
            source_name: source_name.into(),
            raw_input_path: None,
            output_path: None,
            results: ClasswiseCount::new(),
            status: SessionStatus::Idle,
            failure: None,
        }
    }

    fn artifact_exists(&self) -> bool {
        self.output_path.as_deref().is_some_and(Path::is_file)
    }
}

/// On-disk form of a completed session.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    input_key: String,
    source_name: String,
    output_path: PathBuf,
    results: ClasswiseCount,
}

/// What to do with a submitted input key.
#[derive(Debug)]
pub enum Resolution {
    /// Already processed; the stored session can be returned as is.
    Reuse(ProcessingSession),
    /// Processing this input failed before.
    PreviouslyFailed(String),
    /// Needs a fresh run.
    Fresh,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    state_file: Option<PathBuf>,
    current: Option<ProcessingSession>,
}

impl SessionStore {
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store backed by `state_file`, restoring the last completed session if
    /// the file exists. An unreadable file is ignored.
    pub fn open(state_file: impl Into<PathBuf>) -> Self {
        let state_file = state_file.into();
        let current = match Self::load(&state_file) {
            Ok(Some(session)) => {
                info!(
                    "Restored session for {} from {}",
                    session.source_name,
                    state_file.display()
                );
                Some(session)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Ignoring session state {}: {:#}", state_file.display(), e);
                None
            }
        };

        Self {
            state_file: Some(state_file),
            current,
        }
    }

    fn load(path: &Path) -> Result<Option<ProcessingSession>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let persisted: PersistedSession = serde_json::from_str(&contents)?;
        Ok(Some(ProcessingSession {
            input_key: persisted.input_key,
            source_name: persisted.source_name,
            raw_input_path: None,
            output_path: Some(persisted.output_path),
            results: persisted.results,
            status: SessionStatus::Done,
            failure: None,
        }))
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<&ProcessingSession> {
        self.current.as_ref()
    }

    pub fn resolve(&mut self, input_key: &str) -> Resolution {
        let Some(current) = self.current.as_ref() else {
            return Resolution::Fresh;
        };

        if current.input_key != input_key {
            debug!("New input {}, discarding session {}", input_key, current.input_key);
            self.current = None;
            return Resolution::Fresh;
        }

        match current.status {
            SessionStatus::Done if current.artifact_exists() => Resolution::Reuse(current.clone()),
            SessionStatus::Done => {
                warn!(
                    "Output for {} is gone, processing again",
                    current.source_name
                );
                self.current = None;
                Resolution::Fresh
            }
            SessionStatus::Failed => Resolution::PreviouslyFailed(
                current
                    .failure
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            SessionStatus::Idle | SessionStatus::Processing => {
                self.current = None;
                Resolution::Fresh
            }
        }
    }

    /// Replaces the current session with a new one in `Processing`.
    pub fn begin(
        &mut self,
        input_key: &str,
        source_name: &str,
        raw_input_path: &Path,
    ) -> &ProcessingSession {
        let mut session = ProcessingSession::new(input_key, source_name);
        session.raw_input_path = Some(raw_input_path.to_path_buf());
        session.status = SessionStatus::Processing;
        self.current.insert(session)
    }

    /// Marks the current session Done and persists it. Failing to write the
    /// state file is logged, not fatal.
    pub fn complete(
        &mut self,
        output_path: PathBuf,
        results: ClasswiseCount,
    ) -> Result<ProcessingSession, SessionError> {
        let Some(current) = self.current.as_ref() else {
            return Err(SessionError::NoActiveSession);
        };

        let mut session = current.clone();
        session.output_path = Some(output_path);
        session.results = results;
        session.status = SessionStatus::Done;
        session.raw_input_path = None;
        session.failure = None;

        if let Err(e) = self.persist(&session) {
            warn!("Could not save session state: {}", e);
        }

        self.current = Some(session.clone());
        Ok(session)
    }

    pub fn fail(&mut self, reason: String) {
        if let Some(session) = self.current.as_mut() {
            session.status = SessionStatus::Failed;
            session.output_path = None;
            session.raw_input_path = None;
            session.failure = Some(reason);
        }
    }

    /// Drops the current session without recording an outcome.
    pub fn discard(&mut self) {
        self.current = None;
    }

    fn persist(&self, session: &ProcessingSession) -> Result<(), SessionError> {
        let (Some(state_file), Some(output_path)) = (&self.state_file, &session.output_path) else {
            return Ok(());
        };

        if let Some(parent) = state_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let persisted = PersistedSession {
            input_key: session.input_key.clone(),
            source_name: session.source_name.clone(),
            output_path: output_path.clone(),
            results: session.results.clone(),
        };
        let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::from)?;
        fs::write(state_file, json)?;
        debug!("Session state saved to {}", state_file.display());
        Ok(())
    }
}
