// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Fatal outcomes of a processing session. Nothing here is retried.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open source video {path:?}: {reason}")]
    SourceOpen { path: PathBuf, reason: String },

    #[error("failed to initialize output video {path:?}: {reason}")]
    SinkInit { path: PathBuf, reason: String },

    #[error("failed to write frame #{frame} to output video: {reason}")]
    SinkWrite { frame: u64, reason: String },

    #[error("output video {path:?} is empty, codec may not be supported")]
    EmptyOutput { path: PathBuf },

    #[error("failed to load counting engine: {0:#}")]
    EngineInit(anyhow::Error),

    #[error("counting engine failed on frame #{frame}: {source:#}")]
    Engine {
        frame: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("counting region must be configured before the first frame")]
    RegionNotConfigured,

    #[error("counting region can only be configured once, before processing starts")]
    RegionReconfigured,

    #[error("processing cancelled after {frames} frame(s)")]
    Cancelled { frames: u64 },

    #[error("previous run for this video failed: {reason}")]
    PreviouslyFailed { reason: String },

    #[error("no session is being processed")]
    NoActiveSession,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::SourceOpen { .. } => "source_open",
            SessionError::SinkInit { .. } => "sink_init",
            SessionError::SinkWrite { .. } => "sink_write",
            SessionError::EmptyOutput { .. } => "empty_output",
            SessionError::EngineInit(_) => "engine_init",
            SessionError::Engine { .. } => "engine",
            SessionError::RegionNotConfigured | SessionError::RegionReconfigured => "engine_usage",
            SessionError::Cancelled { .. } => "cancelled",
            SessionError::PreviouslyFailed { .. } => "previously_failed",
            SessionError::NoActiveSession => "session_state",
            SessionError::Io(_) => "io",
        }
    }
}
