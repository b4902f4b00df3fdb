// src/pipeline/orchestrator.rs
//
// Drives one upload through read -> count -> write, and owns the session
// store that decides whether an upload needs processing at all.

use super::metrics::{MetricsSummary, PipelineMetrics};
use super::progress::{ProgressReporter, ProgressSink};
use crate::counting::{CountingAdapter, CountingEngine};
use crate::error::SessionError;
use crate::session::{ProcessingSession, Resolution, SessionStore, Upload};
use crate::types::{ClasswiseCount, CountingRegion, VideoGeometry};
use crate::video_processor::{FrameSink, FrameSource, VideoBackend};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Hex digits of the content key used to tell same-named artifacts apart.
const ARTIFACT_TAG_LEN: usize = 8;

/// Result of a run that reached the end of the source.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output_path: PathBuf,
    pub counts: ClasswiseCount,
    pub geometry: VideoGeometry,
    pub region: CountingRegion,
    pub metrics: MetricsSummary,
}

/// Processes `input` into an annotated video at `output`. If the run fails
/// after the sink was opened, the partial output is removed; files this run
/// never opened are left alone.
pub fn process_video<B, E>(
    backend: &B,
    engine: E,
    input: &Path,
    output: &Path,
    progress: &mut dyn ProgressSink,
    cancel: &AtomicBool,
) -> Result<RunOutcome, SessionError>
where
    B: VideoBackend,
    E: CountingEngine,
{
    let mut source = backend
        .open_source(input)
        .map_err(|e| SessionError::SourceOpen {
            path: input.to_path_buf(),
            reason: format!("{:#}", e),
        })?;

    let result = run_frames(backend, &mut source, engine, output, progress, cancel);
    source.close();
    result
}

fn run_frames<B, E>(
    backend: &B,
    source: &mut B::Source,
    engine: E,
    output: &Path,
    progress: &mut dyn ProgressSink,
    cancel: &AtomicBool,
) -> Result<RunOutcome, SessionError>
where
    B: VideoBackend,
    E: CountingEngine,
{
    let geometry = source.geometry();
    let region = CountingRegion::vertical_midline(&geometry);

    let mut adapter = CountingAdapter::new(engine);
    adapter.configure_region(region)?;

    let mut sink = backend
        .open_sink(output, &geometry)
        .map_err(|e| SessionError::SinkInit {
            path: output.to_path_buf(),
            reason: format!("{:#}", e),
        })?;

    info!(
        "Counting line at x={} for {}x{} video, writing {}",
        region.start.x,
        geometry.width,
        geometry.height,
        output.display()
    );

    let metrics = PipelineMetrics::new();
    let streamed = stream_frames(
        source,
        &mut adapter,
        &mut sink,
        &geometry,
        &metrics,
        progress,
        cancel,
    )
    .and_then(|()| {
        let written = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(SessionError::EmptyOutput {
                path: output.to_path_buf(),
            });
        }
        Ok(())
    });

    if let Err(e) = streamed {
        drop(sink);
        remove_partial_output(output);
        return Err(e);
    }

    Ok(RunOutcome {
        output_path: output.to_path_buf(),
        counts: adapter.into_counts(),
        geometry,
        region,
        metrics: metrics.summary(),
    })
}

/// Frame loop plus sink finalization.
fn stream_frames<S, K, E>(
    source: &mut S,
    adapter: &mut CountingAdapter<E>,
    sink: &mut K,
    geometry: &VideoGeometry,
    metrics: &PipelineMetrics,
    progress: &mut dyn ProgressSink,
    cancel: &AtomicBool,
) -> Result<(), SessionError>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
    E: CountingEngine,
{
    let mut reporter = ProgressReporter::new(progress);
    let mut written: u64 = 0;

    loop {
        if cancel.load(Ordering::SeqCst) {
            debug!("Counts at cancellation: {:?}", adapter.counts());
            return Err(SessionError::Cancelled {
                frames: adapter.frames_processed(),
            });
        }

        let Some(frame) = source.next_frame() else {
            break;
        };

        let inference_start = Instant::now();
        let result = adapter.process(frame)?;
        let inference = inference_start.elapsed();

        let write_start = Instant::now();
        sink.write(&result.annotated)
            .map_err(|e| SessionError::SinkWrite {
                frame: written + 1,
                reason: format!("{:#}", e),
            })?;
        metrics.record_frame(inference, write_start.elapsed());

        written += 1;
        reporter.update(written, geometry.frame_count);
    }

    sink.close().map_err(|e| SessionError::SinkWrite {
        frame: written,
        reason: format!("finalize failed: {:#}", e),
    })?;
    reporter.finish();
    Ok(())
}

fn remove_partial_output(output: &Path) {
    if !output.exists() {
        return;
    }
    match fs::remove_file(output) {
        Ok(()) => warn!("Removed partial output {}", output.display()),
        Err(e) => warn!("Could not remove partial output {}: {}", output.display(), e),
    }
}

/// Accepts uploads and turns each into a Done or Failed session. A fresh
/// engine is built for every run.
pub struct SessionOrchestrator<B, F> {
    backend: B,
    engine_factory: F,
    store: SessionStore,
    output_dir: PathBuf,
    /// Artifacts written by this orchestrator, keyed by path, valued by the
    /// content key that produced them.
    artifacts: HashMap<PathBuf, String>,
    cancel: Arc<AtomicBool>,
}

impl<B, F, E> SessionOrchestrator<B, F>
where
    B: VideoBackend,
    F: FnMut() -> anyhow::Result<E>,
    E: CountingEngine,
{
    pub fn new(
        backend: B,
        engine_factory: F,
        store: SessionStore,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            engine_factory,
            store,
            output_dir: output_dir.into(),
            artifacts: HashMap::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between frames; setting it aborts the current run.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    #[cfg(test)]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// `<output_dir>/<stem>_output.<ext>`, unless a different input already
    /// produced that file in this run; then the name gets a content tag.
    fn output_path_for(&self, upload: &Upload, input_key: &str) -> PathBuf {
        let plain = self.output_dir.join(upload.output_file_name());
        match self.artifacts.get(&plain) {
            Some(owner) if owner != input_key => {
                let tag = &input_key[..ARTIFACT_TAG_LEN.min(input_key.len())];
                let tagged = self.output_dir.join(upload.tagged_output_file_name(tag));
                warn!(
                    "{} already holds another video's output, writing {}",
                    plain.display(),
                    tagged.display()
                );
                tagged
            }
            _ => plain,
        }
    }

    pub fn submit(
        &mut self,
        upload: &Upload,
        progress: &mut dyn ProgressSink,
    ) -> Result<ProcessingSession, SessionError> {
        let input_key = upload.content_key();

        match self.store.resolve(&input_key) {
            Resolution::Reuse(session) => {
                info!(
                    "♻️  {} already processed, reusing {}",
                    upload.filename,
                    session
                        .output_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                );
                return Ok(session);
            }
            Resolution::PreviouslyFailed(reason) => {
                return Err(SessionError::PreviouslyFailed { reason });
            }
            Resolution::Fresh => {}
        }

        let raw_input = upload.write_temp_file()?;
        self.store
            .begin(&input_key, &upload.filename, raw_input.path());
        let output_path = self.output_path_for(upload, &input_key);

        info!("🎬 Processing {}", upload.filename);

        let result = match (self.engine_factory)() {
            Ok(engine) => process_video(
                &self.backend,
                engine,
                raw_input.path(),
                &output_path,
                progress,
                &self.cancel,
            ),
            Err(e) => Err(SessionError::EngineInit(e)),
        };

        match result {
            Ok(outcome) => {
                let metrics = &outcome.metrics;
                info!(
                    "📊 {}x{} video, line x={}: {} frames in {:.1}s ({:.1} FPS, inference {}µs, write {}µs per frame)",
                    outcome.geometry.width,
                    outcome.geometry.height,
                    outcome.region.start.x,
                    metrics.frames,
                    metrics.elapsed_secs,
                    metrics.fps,
                    metrics.avg_inference_us,
                    metrics.avg_write_us
                );
                self.artifacts
                    .insert(outcome.output_path.clone(), input_key);
                self.store.complete(outcome.output_path, outcome.counts)
            }
            Err(e @ SessionError::Cancelled { .. }) => {
                warn!("{} cancelled", upload.filename);
                self.store.discard();
                Err(e)
            }
            Err(e) => {
                error!("❌ {} failed [{}]: {}", upload.filename, e.kind(), e);
                self.store.fail(e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counting::testing::{counts, ScriptedEngine};
    use crate::pipeline::progress::testing::{NoProgress, RecordingProgress};
    use crate::session::SessionStatus;
    use crate::summary::summarize;
    use crate::types::{Frame, Point};
    use anyhow::{anyhow, bail, Result};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Clone)]
    struct FakeBackend {
        geometry: Option<VideoGeometry>,
        frames: usize,
        empty_output: bool,
        fail_sink: bool,
        opened_sinks: Rc<Cell<usize>>,
        written: Rc<RefCell<Vec<Frame>>>,
    }

    impl FakeBackend {
        fn new(geometry: VideoGeometry, frames: usize) -> Self {
            Self {
                geometry: Some(geometry),
                frames,
                empty_output: false,
                fail_sink: false,
                opened_sinks: Rc::new(Cell::new(0)),
                written: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    struct FakeSource {
        geometry: VideoGeometry,
        remaining: usize,
    }

    impl FrameSource for FakeSource {
        fn geometry(&self) -> VideoGeometry {
            self.geometry
        }

        fn next_frame(&mut self) -> Option<Frame> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(Frame::blank(
                self.geometry.width as usize,
                self.geometry.height as usize,
            ))
        }

        fn close(&mut self) {}
    }

    struct FakeSink {
        path: PathBuf,
        geometry: VideoGeometry,
        empty: bool,
        written: Rc<RefCell<Vec<Frame>>>,
    }

    impl FrameSink for FakeSink {
        fn write(&mut self, frame: &Frame) -> Result<()> {
            if !frame.matches(&self.geometry) {
                bail!("size mismatch");
            }
            self.written.borrow_mut().push(frame.clone());
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            let bytes = if self.empty {
                0
            } else {
                self.written.borrow().len()
            };
            fs::write(&self.path, vec![1u8; bytes])?;
            Ok(())
        }
    }

    impl VideoBackend for FakeBackend {
        type Source = FakeSource;
        type Sink = FakeSink;

        fn open_source(&self, _path: &Path) -> Result<FakeSource> {
            let geometry = self.geometry.ok_or_else(|| anyhow!("not a video"))?;
            Ok(FakeSource {
                geometry,
                remaining: self.frames,
            })
        }

        fn open_sink(&self, path: &Path, geometry: &VideoGeometry) -> Result<FakeSink> {
            if self.fail_sink {
                bail!("no encoder for {}", path.display());
            }
            fs::create_dir_all(path.parent().unwrap())?;
            // Encoders create the container up front
            fs::write(path, b"")?;
            self.opened_sinks.set(self.opened_sinks.get() + 1);
            Ok(FakeSink {
                path: path.to_path_buf(),
                geometry: *geometry,
                empty: self.empty_output,
                written: Rc::clone(&self.written),
            })
        }
    }

    fn vga(frame_count: u64) -> VideoGeometry {
        VideoGeometry {
            width: 640,
            height: 480,
            fps: 30.0,
            frame_count,
        }
    }

    fn car_script() -> Vec<ClasswiseCount> {
        vec![counts(&[("car", 1, 0)]), counts(&[("car", 2, 1)])]
    }

    #[test]
    fn test_two_frame_run() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(vga(2), 2);
        let output = dir.path().join("out").join("clip_output.mp4");
        let mut progress = RecordingProgress::default();

        let outcome = process_video(
            &backend,
            ScriptedEngine::new(car_script()),
            Path::new("clip.mp4"),
            &output,
            &mut progress,
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(outcome.metrics.frames, 2);
        assert_eq!(
            outcome.region,
            CountingRegion {
                start: Point::new(320, 0),
                end: Point::new(320, 480)
            }
        );
        assert_eq!(backend.written.borrow().len(), 2);

        let text = summarize(&outcome.counts);
        assert!(text.contains("Total Vehicles: 3 (IN: 2, OUT: 1)"));
        assert!(text.contains("Car: 3 (IN: 2, OUT: 1)"));

        let fractions: Vec<f64> = progress.updates.iter().map(|u| u.fraction).collect();
        assert_eq!(fractions, vec![0.5, 1.0, 1.0]);
        assert_eq!(progress.finished, 1);
    }

    #[test]
    fn test_unknown_frame_count_reaches_full_progress() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = VideoGeometry::from_raw(640, 480, 30.0, 0, 30.0).unwrap();
        let backend = FakeBackend::new(geometry, 1);
        let mut progress = RecordingProgress::default();

        process_video(
            &backend,
            ScriptedEngine::new(vec![]),
            Path::new("clip.mp4"),
            &dir.path().join("clip_output.mp4"),
            &mut progress,
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(progress.updates[0].fraction, 1.0);
        assert_eq!(progress.updates[0].status, "Processing video... 100%");
    }

    #[test]
    fn test_unreadable_source_creates_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::new(vga(2), 2);
        backend.geometry = None;
        let output = dir.path().join("clip_output.mp4");

        let err = process_video(
            &backend,
            ScriptedEngine::new(car_script()),
            Path::new("clip.mp4"),
            &output,
            &mut NoProgress,
            &AtomicBool::new(false),
        )
        .unwrap_err();

        assert_eq!(err.kind(), "source_open");
        assert!(!output.exists());
        assert_eq!(backend.opened_sinks.get(), 0);
    }

    #[test]
    fn test_zero_byte_output_fails_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::new(vga(2), 2);
        backend.empty_output = true;
        let output = dir.path().join("clip_output.mp4");

        let err = process_video(
            &backend,
            ScriptedEngine::new(car_script()),
            Path::new("clip.mp4"),
            &output,
            &mut NoProgress,
            &AtomicBool::new(false),
        )
        .unwrap_err();

        assert!(matches!(err, SessionError::EmptyOutput { .. }));
        assert_eq!(backend.written.borrow().len(), 2);
        assert!(!output.exists());
    }

    #[test]
    fn test_wrong_size_annotation_is_a_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(vga(3), 3);
        let mut engine = ScriptedEngine::new(car_script());
        engine.annotated_size = Some((320, 240));
        let output = dir.path().join("clip_output.mp4");

        let err = process_video(
            &backend,
            engine,
            Path::new("clip.mp4"),
            &output,
            &mut NoProgress,
            &AtomicBool::new(false),
        )
        .unwrap_err();

        match err {
            SessionError::SinkWrite { frame, .. } => assert_eq!(frame, 1),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_engine_failure_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(vga(5), 5);
        let mut engine = ScriptedEngine::new(car_script());
        engine.fail_on_frame = Some(3);

        let err = process_video(
            &backend,
            engine,
            Path::new("clip.mp4"),
            &dir.path().join("clip_output.mp4"),
            &mut NoProgress,
            &AtomicBool::new(false),
        )
        .unwrap_err();

        assert_eq!(err.kind(), "engine");
        assert_eq!(backend.written.borrow().len(), 2);
    }

    #[test]
    fn test_cancel_between_frames() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(vga(2), 2);

        let err = process_video(
            &backend,
            ScriptedEngine::new(car_script()),
            Path::new("clip.mp4"),
            &dir.path().join("clip_output.mp4"),
            &mut NoProgress,
            &AtomicBool::new(true),
        )
        .unwrap_err();

        assert!(matches!(err, SessionError::Cancelled { frames: 0 }));
        assert!(backend.written.borrow().is_empty());
    }

    fn orchestrator(
        backend: FakeBackend,
        dir: &Path,
        builds: Rc<Cell<usize>>,
    ) -> SessionOrchestrator<FakeBackend, impl FnMut() -> Result<ScriptedEngine>> {
        SessionOrchestrator::new(
            backend,
            move || {
                builds.set(builds.get() + 1);
                Ok(ScriptedEngine::new(car_script()))
            },
            SessionStore::in_memory(),
            dir.join("output"),
        )
    }

    #[test]
    fn test_same_upload_is_not_reprocessed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(vga(2), 2);
        let builds = Rc::new(Cell::new(0));
        let mut orchestrator = orchestrator(backend.clone(), dir.path(), Rc::clone(&builds));
        let upload = Upload::new("clip.mp4", b"video-a".to_vec());

        let first = orchestrator.submit(&upload, &mut NoProgress).unwrap();
        assert_eq!(first.status, SessionStatus::Done);
        assert_eq!(
            first.output_path,
            Some(dir.path().join("output").join("clip_output.mp4"))
        );
        assert_eq!(first.results, counts(&[("car", 2, 1)]));

        let second = orchestrator.submit(&upload, &mut NoProgress).unwrap();
        assert_eq!(second, first);
        assert_eq!(builds.get(), 1);
        assert_eq!(backend.written.borrow().len(), 2);
    }

    #[test]
    fn test_new_upload_resets_session() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(vga(2), 2);
        let builds = Rc::new(Cell::new(0));
        let mut orchestrator = orchestrator(backend, dir.path(), Rc::clone(&builds));

        orchestrator
            .submit(&Upload::new("a.mp4", b"video-a".to_vec()), &mut NoProgress)
            .unwrap();
        let second = orchestrator
            .submit(&Upload::new("b.mp4", b"video-b".to_vec()), &mut NoProgress)
            .unwrap();

        assert_eq!(builds.get(), 2);
        assert_eq!(second.source_name, "b.mp4");
        assert_eq!(
            orchestrator.store().current().unwrap().input_key,
            Upload::new("b.mp4", b"video-b".to_vec()).content_key()
        );
    }

    #[test]
    fn test_failed_upload_is_sticky() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::new(vga(2), 2);
        backend.empty_output = true;
        let builds = Rc::new(Cell::new(0));
        let mut orchestrator = orchestrator(backend, dir.path(), Rc::clone(&builds));
        let upload = Upload::new("clip.mp4", b"video-a".to_vec());

        let err = orchestrator.submit(&upload, &mut NoProgress).unwrap_err();
        assert_eq!(err.kind(), "empty_output");

        let session = orchestrator.store().current().unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.output_path, None);

        let err = orchestrator.submit(&upload, &mut NoProgress).unwrap_err();
        assert!(matches!(err, SessionError::PreviouslyFailed { .. }));
        assert_eq!(builds.get(), 1);
    }

    #[test]
    fn test_engine_init_failure() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(vga(2), 2);
        let mut orchestrator = SessionOrchestrator::new(
            backend.clone(),
            || -> Result<ScriptedEngine> { Err(anyhow!("model missing")) },
            SessionStore::in_memory(),
            dir.path().join("output"),
        );

        let err = orchestrator
            .submit(&Upload::new("clip.mp4", b"v".to_vec()), &mut NoProgress)
            .unwrap_err();
        assert_eq!(err.kind(), "engine_init");
        assert_eq!(backend.opened_sinks.get(), 0);
    }

    #[test]
    fn test_cancelled_upload_can_be_resubmitted() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(vga(2), 2);
        let builds = Rc::new(Cell::new(0));
        let mut orchestrator = orchestrator(backend, dir.path(), Rc::clone(&builds));
        let upload = Upload::new("clip.mp4", b"video-a".to_vec());

        let cancel = orchestrator.cancel_flag();
        cancel.store(true, Ordering::SeqCst);
        let err = orchestrator.submit(&upload, &mut NoProgress).unwrap_err();
        assert_eq!(err.kind(), "cancelled");
        assert!(orchestrator.store().current().is_none());

        cancel.store(false, Ordering::SeqCst);
        let session = orchestrator.submit(&upload, &mut NoProgress).unwrap();
        assert_eq!(session.status, SessionStatus::Done);
    }

    #[test]
    fn test_sink_init_failure_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::new(vga(2), 2);
        backend.fail_sink = true;
        let output = dir.path().join("clip_output.mp4");
        fs::write(&output, b"earlier run").unwrap();

        let err = process_video(
            &backend,
            ScriptedEngine::new(car_script()),
            Path::new("clip.mp4"),
            &output,
            &mut NoProgress,
            &AtomicBool::new(false),
        )
        .unwrap_err();

        assert_eq!(err.kind(), "sink_init");
        assert_eq!(fs::read(&output).unwrap(), b"earlier run");
    }

    #[test]
    fn test_submit_unreadable_source_fails_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::new(vga(2), 2);
        backend.geometry = None;
        let builds = Rc::new(Cell::new(0));
        let mut orchestrator = orchestrator(backend.clone(), dir.path(), Rc::clone(&builds));
        let upload = Upload::new("clip.mp4", b"not a video".to_vec());

        let err = orchestrator.submit(&upload, &mut NoProgress).unwrap_err();
        assert_eq!(err.kind(), "source_open");

        let session = orchestrator.store().current().unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.output_path, None);
        assert_eq!(backend.opened_sinks.get(), 0);

        let output_dir = dir.path().join("output");
        let leftovers = fs::read_dir(&output_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_same_name_different_content_gets_its_own_output() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(vga(2), 2);
        let builds = Rc::new(Cell::new(0));
        let mut orchestrator = orchestrator(backend, dir.path(), Rc::clone(&builds));

        let first_upload = Upload::new("clip.mp4", b"video-a".to_vec());
        let second_upload = Upload::new("clip.mp4", b"video-b".to_vec());
        let first = orchestrator.submit(&first_upload, &mut NoProgress).unwrap();
        let second = orchestrator.submit(&second_upload, &mut NoProgress).unwrap();

        let first_path = first.output_path.unwrap();
        let second_path = second.output_path.unwrap();
        assert_eq!(first_path, dir.path().join("output").join("clip_output.mp4"));
        let tag = &second_upload.content_key()[..ARTIFACT_TAG_LEN];
        assert_eq!(
            second_path,
            dir.path()
                .join("output")
                .join(format!("clip_output_{}.mp4", tag))
        );
        assert!(first_path.exists());
        assert!(second_path.exists());
        assert_eq!(builds.get(), 2);
    }

    #[test]
    fn test_resubmitting_same_content_keeps_plain_name() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(vga(2), 2);
        let builds = Rc::new(Cell::new(0));
        let mut orchestrator = orchestrator(backend, dir.path(), Rc::clone(&builds));
        let upload = Upload::new("clip.mp4", b"video-a".to_vec());

        orchestrator.submit(&upload, &mut NoProgress).unwrap();
        orchestrator
            .submit(&Upload::new("other.mp4", b"video-b".to_vec()), &mut NoProgress)
            .unwrap();
        let again = orchestrator.submit(&upload, &mut NoProgress).unwrap();

        assert_eq!(
            again.output_path,
            Some(dir.path().join("output").join("clip_output.mp4"))
        );
        assert_eq!(builds.get(), 3);
    }
}
