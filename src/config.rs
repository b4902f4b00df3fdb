// src/config.rs

use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        Self::from_yaml(&contents).with_context(|| format!("Invalid config {}", path))
    }

    /// Loads `path` when given; otherwise the default file if present, or the
    /// built-in defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let counting = &self.counting;

        for (name, value) in [
            ("confidence_threshold", counting.confidence_threshold),
            ("nms_iou_threshold", counting.nms_iou_threshold),
            ("track_iou_threshold", counting.track_iou_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                bail!("counting.{name} must be in (0, 1], got {value}");
            }
        }

        if counting.classes.is_empty() {
            bail!("counting.classes must list at least one class id");
        }

        if counting.intra_threads == 0 {
            bail!("counting.intra_threads must be at least 1");
        }

        let fourcc = &self.video.fourcc;
        if fourcc.len() != 4 || !fourcc.is_ascii() {
            bail!("video.fourcc must be exactly 4 ASCII characters, got {fourcc:?}");
        }

        if !(self.video.fallback_fps > 0.0) {
            bail!("video.fallback_fps must be positive");
        }

        Ok(())
    }
}
