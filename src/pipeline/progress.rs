// src/pipeline/progress.rs

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub processed: u64,
    pub total: u64,
    pub fraction: f64,
    /// Floor of `fraction * 100`
    pub percent: u8,
    pub status: String,
}

impl ProgressUpdate {
    fn new(processed: u64, total: u64, fraction: f64) -> Self {
        let percent = (fraction * 100.0).floor().clamp(0.0, 100.0) as u8;
        Self {
            processed,
            total,
            fraction,
            percent,
            status: format!("Processing video... {}%", percent),
        }
    }
}

/// Receives progress updates from a running session.
pub trait ProgressSink {
    fn on_update(&mut self, update: &ProgressUpdate);

    /// The run is over; clear whatever the sink is displaying.
    fn on_finish(&mut self) {}
}

/// Logs each time progress crosses another 10% step.
#[derive(Debug, Default)]
pub struct LogProgress {
    last_decile: Option<u8>,
}

impl ProgressSink for LogProgress {
    fn on_update(&mut self, update: &ProgressUpdate) {
        let decile = update.percent / 10;
        if self.last_decile.map_or(true, |last| decile > last) {
            self.last_decile = Some(decile);
            info!(
                "{} ({}/{} frames)",
                update.status, update.processed, update.total
            );
        }
    }

    fn on_finish(&mut self) {
        self.last_decile = None;
    }
}

pub fn fraction(processed: u64, total: u64) -> f64 {
    (processed as f64 / total.max(1) as f64).min(1.0)
}

/// Maps processed/total frame counts to a non-decreasing completion fraction.
/// One reporter per run.
pub struct ProgressReporter<'a> {
    sink: &'a mut dyn ProgressSink,
    last: Option<ProgressUpdate>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self { sink, last: None }
    }

    pub fn update(&mut self, processed: u64, total: u64) -> ProgressUpdate {
        let floor = self.last.as_ref().map_or(0.0, |last| last.fraction);
        let update = ProgressUpdate::new(processed, total, fraction(processed, total).max(floor));
        self.sink.on_update(&update);
        self.last = Some(update.clone());
        update
    }

    /// Reports completion and notifies the sink that the run is over.
    pub fn finish(&mut self) -> ProgressUpdate {
        let (processed, total) = self
            .last
            .as_ref()
            .map_or((0, 0), |last| (last.processed, last.total));
        let update = ProgressUpdate::new(processed, total, 1.0);
        self.sink.on_update(&update);
        self.sink.on_finish();
        self.last = Some(update.clone());
        update
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Ignores every update.
    #[derive(Debug, Default)]
    pub struct NoProgress;

    impl ProgressSink for NoProgress {
        fn on_update(&mut self, _update: &ProgressUpdate) {}
    }

    #[derive(Debug, Default)]
    pub struct RecordingProgress {
        pub updates: Vec<ProgressUpdate>,
        pub finished: usize,
    }

    impl ProgressSink for RecordingProgress {
        fn on_update(&mut self, update: &ProgressUpdate) {
            self.updates.push(update.clone());
        }

        fn on_finish(&mut self) {
            self.finished += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingProgress;
    use super::*;

    #[test]
    fn test_fraction_clamps() {
        assert_eq!(fraction(0, 10), 0.0);
        assert_eq!(fraction(5, 10), 0.5);
        assert_eq!(fraction(12, 10), 1.0);
        assert_eq!(fraction(1, 0), 1.0);
        assert_eq!(fraction(0, 0), 0.0);
    }

    #[test]
    fn test_status_uses_floor_percent() {
        let mut sink = RecordingProgress::default();
        let mut reporter = ProgressReporter::new(&mut sink);

        let update = reporter.update(2, 3);
        assert_eq!(update.percent, 66);
        assert_eq!(update.status, "Processing video... 66%");
    }

    #[test]
    fn test_reaches_one_at_the_end() {
        let mut sink = RecordingProgress::default();
        let mut reporter = ProgressReporter::new(&mut sink);
        let last = (1..=7).map(|i| reporter.update(i, 7)).last().unwrap();
        assert_eq!(last.fraction, 1.0);
        assert_eq!(last.percent, 100);
    }

    #[test]
    fn test_never_goes_backwards() {
        let mut sink = RecordingProgress::default();
        let mut reporter = ProgressReporter::new(&mut sink);
        reporter.update(5, 10);
        let update = reporter.update(3, 10);
        assert_eq!(update.fraction, 0.5);
        assert_eq!(update.processed, 3);
    }

    #[test]
    fn test_finish_notifies_sink() {
        let mut sink = RecordingProgress::default();
        {
            let mut reporter = ProgressReporter::new(&mut sink);
            reporter.update(1, 4);
            let last = reporter.finish();
            assert_eq!(last.fraction, 1.0);
            assert_eq!(last.processed, 1);
        }
        assert_eq!(sink.updates.len(), 2);
        assert_eq!(sink.finished, 1);
    }

    #[test]
    fn test_log_sink_tracks_deciles() {
        let mut sink = LogProgress::default();
        sink.on_update(&ProgressUpdate::new(1, 100, 0.01));
        assert_eq!(sink.last_decile, Some(0));
        sink.on_update(&ProgressUpdate::new(25, 100, 0.25));
        assert_eq!(sink.last_decile, Some(2));
        sink.on_finish();
        assert_eq!(sink.last_decile, None);
    }
}
