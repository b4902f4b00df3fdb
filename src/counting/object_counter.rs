// src/counting/object_counter.rs

use super::line_counter::LineCounter;
use super::{CountingEngine, EngineOutput};
use crate::annotation;
use crate::types::{CountingConfig, CountingRegion, Frame};
use crate::vehicle_detection::YoloDetector;
use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

/// YOLO detection, IoU tracking and line counting behind the
/// `CountingEngine` contract.
pub struct ObjectCounter {
    detector: YoloDetector,
    counter: Option<LineCounter>,
    track_iou_threshold: f32,
    max_missing_frames: u64,
    frames: u64,
}

impl ObjectCounter {
    pub fn new(config: &CountingConfig) -> Result<Self> {
        let detector = YoloDetector::new(config).context("Failed to build object counter")?;

        info!(
            "✓ Object counter ready (classes {:?}, track IoU {:.2})",
            config.classes, config.track_iou_threshold
        );

        Ok(Self {
            detector,
            counter: None,
            track_iou_threshold: config.track_iou_threshold,
            max_missing_frames: config.max_missing_frames,
            frames: 0,
        })
    }
}

impl CountingEngine for ObjectCounter {
    fn configure_region(&mut self, region: CountingRegion) {
        self.counter = Some(LineCounter::new(
            region,
            self.track_iou_threshold,
            self.max_missing_frames,
        ));
        self.frames = 0;
    }

    fn process(&mut self, frame: Frame) -> Result<EngineOutput> {
        let counter = self
            .counter
            .as_mut()
            .ok_or_else(|| anyhow!("counting region not configured"))?;

        self.frames += 1;

        let detections = self
            .detector
            .detect(&frame.data, frame.width, frame.height)?;
        if self.frames % 100 == 0 {
            debug!(
                "Frame {}: {} detections, {} live tracks",
                self.frames,
                detections.len(),
                counter.tracks().count()
            );
        }

        for event in counter.update(detections) {
            info!(
                "🚦 {} #{} crossed {} at frame {}",
                event.class_name,
                event.track_id,
                event.direction.as_str(),
                event.frame_id
            );
        }

        let region = counter.region();
        let annotated =
            annotation::annotate_frame(&frame, &region, counter.active_tracks(), counter.counts())?;

        Ok(EngineOutput {
            annotated,
            counts: counter.counts().clone(),
        })
    }
}
