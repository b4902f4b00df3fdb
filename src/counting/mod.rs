// src/counting/mod.rs

pub mod line_counter;
pub mod object_counter;

use crate::error::SessionError;
use crate::types::{ClasswiseCount, CountingRegion, Frame};
use anyhow::Result;
use tracing::{debug, warn};

/// Output of one engine step.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub annotated: Frame,
    /// Cumulative since the region was configured
    pub counts: ClasswiseCount,
}

/// Per-frame detection and line counting.
pub trait CountingEngine {
    fn configure_region(&mut self, region: CountingRegion);

    fn process(&mut self, frame: Frame) -> Result<EngineOutput>;
}

impl<E: CountingEngine + ?Sized> CountingEngine for Box<E> {
    fn configure_region(&mut self, region: CountingRegion) {
        (**self).configure_region(region)
    }

    fn process(&mut self, frame: Frame) -> Result<EngineOutput> {
        (**self).process(frame)
    }
}

/// Enforces the configure-once-then-process protocol around an engine and
/// keeps the latest count snapshot.
pub struct CountingAdapter<E> {
    engine: E,
    region: Option<CountingRegion>,
    frames_processed: u64,
    counts: ClasswiseCount,
}

impl<E: CountingEngine> CountingAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            region: None,
            frames_processed: 0,
            counts: ClasswiseCount::new(),
        }
    }

    pub fn configure_region(&mut self, region: CountingRegion) -> Result<(), SessionError> {
        if self.region.is_some() || self.frames_processed > 0 {
            return Err(SessionError::RegionReconfigured);
        }
        debug!(
            "Counting region: ({}, {}) -> ({}, {})",
            region.start.x, region.start.y, region.end.x, region.end.y
        );
        self.engine.configure_region(region);
        self.region = Some(region);
        Ok(())
    }

    /// Runs the engine on one frame. Not idempotent: engine state advances
    /// even if the caller later fails to use the output.
    pub fn process(&mut self, frame: Frame) -> Result<EngineOutput, SessionError> {
        if self.region.is_none() {
            return Err(SessionError::RegionNotConfigured);
        }

        let frame_number = self.frames_processed + 1;
        let output = self
            .engine
            .process(frame)
            .map_err(|source| SessionError::Engine {
                frame: frame_number,
                source,
            })?;
        self.frames_processed = frame_number;

        if !output.counts.dominates(&self.counts) {
            warn!(
                "Engine counts went backwards at frame {} ({:?} -> {:?})",
                frame_number, self.counts, output.counts
            );
        }
        self.counts = output.counts.clone();

        Ok(output)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn counts(&self) -> &ClasswiseCount {
        &self.counts
    }

    pub fn into_counts(self) -> ClasswiseCount {
        self.counts
    }
}
