// src/video_processor.rs

use crate::types::{Frame, VideoConfig, VideoGeometry};
use anyhow::{anyhow, bail, Context, Result};
use opencv::{
    core::{self, Mat},
    prelude::*,
    videoio::{
        self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst, VideoWriter,
        VideoWriterTrait, VideoWriterTraitConst,
    },
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Lazy, finite, non-restartable sequence of decoded frames.
pub trait FrameSource {
    fn geometry(&self) -> VideoGeometry;

    /// Next frame, or `None` once the stream is exhausted. Decode failures
    /// end the stream.
    fn next_frame(&mut self) -> Option<Frame>;

    /// Releases the decoder. Safe to call more than once.
    fn close(&mut self);
}

/// Sequential encoder for annotated frames.
pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flushes and finalizes the container. Safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

/// Opens sources and sinks by path.
pub trait VideoBackend {
    type Source: FrameSource;
    type Sink: FrameSink;

    fn open_source(&self, path: &Path) -> Result<Self::Source>;

    fn open_sink(&self, path: &Path, geometry: &VideoGeometry) -> Result<Self::Sink>;
}

/// OpenCV-backed video I/O.
pub struct VideoProcessor {
    config: VideoConfig,
}

impl VideoProcessor {
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }

    pub fn find_video_files(&self) -> Result<Vec<PathBuf>> {
        let mut videos = Vec::new();

        for entry in WalkDir::new(&self.config.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
                if self
                    .config
                    .extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
                {
                    videos.push(path.to_path_buf());
                }
            }
        }

        videos.sort();
        info!("Found {} video files", videos.len());
        Ok(videos)
    }

    pub fn open_video(&self, path: &Path) -> Result<VideoReader> {
        info!("Opening video: {}", path.display());

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("path is not valid UTF-8"))?;
        let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;

        if !cap.is_opened()? {
            bail!("not a readable video container");
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let total_frames = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)? as i64;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

        let geometry =
            VideoGeometry::from_raw(width, height, fps, total_frames, self.config.fallback_fps)
                .ok_or_else(|| anyhow!("container reports invalid size {}x{}", width, height))?;

        info!(
            "Video properties: {}x{} @ {:.1} FPS, {} frames",
            geometry.width, geometry.height, geometry.fps, geometry.frame_count
        );

        Ok(VideoReader {
            cap,
            geometry,
            current_frame: 0,
            exhausted: false,
            closed: false,
        })
    }

    pub fn create_writer(&self, output_path: &Path, geometry: &VideoGeometry) -> Result<VideoSink> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
        }

        info!("Output video: {}", output_path.display());

        let mut codes = self.config.fourcc.chars();
        let fourcc = match (codes.next(), codes.next(), codes.next(), codes.next()) {
            (Some(a), Some(b), Some(c), Some(d)) => VideoWriter::fourcc(a, b, c, d)?,
            _ => bail!("invalid fourcc {:?}", self.config.fourcc),
        };

        let path_str = output_path
            .to_str()
            .ok_or_else(|| anyhow!("path is not valid UTF-8"))?;
        let writer = VideoWriter::new(
            path_str,
            fourcc,
            geometry.fps,
            core::Size::new(geometry.width as i32, geometry.height as i32),
            true,
        )?;

        if !writer.is_opened()? {
            bail!("encoder {} refused to open", self.config.fourcc);
        }

        Ok(VideoSink {
            writer,
            geometry: *geometry,
            frames_written: 0,
            closed: false,
        })
    }
}

impl VideoBackend for VideoProcessor {
    type Source = VideoReader;
    type Sink = VideoSink;

    fn open_source(&self, path: &Path) -> Result<VideoReader> {
        self.open_video(path)
    }

    fn open_sink(&self, path: &Path, geometry: &VideoGeometry) -> Result<VideoSink> {
        self.create_writer(path, geometry)
    }
}

pub struct VideoReader {
    cap: VideoCapture,
    geometry: VideoGeometry,
    current_frame: u64,
    exhausted: bool,
    closed: bool,
}

impl VideoReader {
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.exhausted || self.closed {
            return Ok(None);
        }

        let mut mat = Mat::default();

        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            self.exhausted = true;
            return Ok(None);
        }

        self.current_frame += 1;
        let timestamp_ms = (self.current_frame as f64 / self.geometry.fps) * 1000.0;

        let data = mat.data_bytes()?.to_vec();

        Ok(Some(Frame {
            data,
            width: mat.cols() as usize,
            height: mat.rows() as usize,
            timestamp_ms,
        }))
    }
}

impl FrameSource for VideoReader {
    fn geometry(&self) -> VideoGeometry {
        self.geometry
    }

    fn next_frame(&mut self) -> Option<Frame> {
        match self.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    "Frame {} could not be decoded, ending stream: {}",
                    self.current_frame + 1,
                    e
                );
                self.exhausted = true;
                None
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = VideoCaptureTrait::release(&mut self.cap) {
            warn!("Failed to release video capture: {}", e);
        }
        debug!("Video capture released after {} frames", self.current_frame);
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct VideoSink {
    writer: VideoWriter,
    geometry: VideoGeometry,
    frames_written: u64,
    closed: bool,
}

impl FrameSink for VideoSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.closed {
            bail!("writer already closed");
        }
        if !frame.matches(&self.geometry) {
            bail!(
                "frame is {}x{}, writer expects {}x{}",
                frame.width,
                frame.height,
                self.geometry.width,
                self.geometry.height
            );
        }

        let mat = Mat::from_slice(&frame.data)?;
        let mat = mat.reshape(3, frame.height as i32)?.try_clone()?;
        VideoWriterTrait::write(&mut self.writer, &mat)?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        VideoWriterTrait::release(&mut self.writer)?;
        debug!("Video writer finalized after {} frames", self.frames_written);
        Ok(())
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to finalize video writer: {}", e);
        }
    }
}
