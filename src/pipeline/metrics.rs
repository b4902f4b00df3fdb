// src/pipeline/metrics.rs
//
// Per-run timing and throughput, logged when a session finishes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct PipelineMetrics {
    pub frames: AtomicU64,
    pub inference_time_us: AtomicU64,
    pub write_time_us: AtomicU64,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            frames: AtomicU64::new(0),
            inference_time_us: AtomicU64::new(0),
            write_time_us: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_frame(&self, inference: Duration, write: Duration) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.inference_time_us
            .fetch_add(inference.as_micros() as u64, Ordering::Relaxed);
        self.write_time_us
            .fetch_add(write.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let frames = self.frames.load(Ordering::Relaxed);
        let per_frame = |total: &AtomicU64| {
            if frames == 0 {
                0
            } else {
                total.load(Ordering::Relaxed) / frames
            }
        };

        MetricsSummary {
            frames,
            fps: self.fps(),
            avg_inference_us: per_frame(&self.inference_time_us),
            avg_write_us: per_frame(&self.write_time_us),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames: u64,
    pub fps: f64,
    pub avg_inference_us: u64,
    pub avg_write_us: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_averages_per_frame() {
        let metrics = PipelineMetrics::new();
        metrics.record_frame(Duration::from_micros(300), Duration::from_micros(40));
        metrics.record_frame(Duration::from_micros(100), Duration::from_micros(20));

        let summary = metrics.summary();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.avg_inference_us, 200);
        assert_eq!(summary.avg_write_us, 30);
    }

    #[test]
    fn test_empty_run_has_zero_averages() {
        let summary = PipelineMetrics::new().summary();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.avg_inference_us, 0);
    }
}
