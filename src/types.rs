// src/types.rs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub counting: CountingConfig,
    pub video: VideoConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountingConfig {
    pub model_path: String,
    /// COCO class ids to keep (car, motorcycle, bus, truck by default)
    pub classes: Vec<usize>,
    pub device: DeviceKind,
    pub confidence_threshold: f32,
    pub nms_iou_threshold: f32,
    pub track_iou_threshold: f32,
    pub max_missing_frames: u64,
    pub intra_threads: usize,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolo12n.onnx".to_string(),
            classes: vec![2, 3, 5, 7],
            device: DeviceKind::Auto,
            confidence_threshold: 0.25,
            nms_iou_threshold: 0.45,
            track_iou_threshold: 0.3,
            max_missing_frames: 30,
            intra_threads: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// CUDA when the provider registers, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub fourcc: String,
    pub fallback_fps: f64,
    pub extensions: Vec<String>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_dir: "videos".to_string(),
            output_dir: "output".to_string(),
            fourcc: "avc1".to_string(),
            fallback_fps: 30.0,
            extensions: vec!["mp4".to_string(), "avi".to_string(), "mov".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub state_file: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_file: "output/session.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Packed 8-bit BGR image, row major.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

impl Frame {
    #[cfg(test)]
    pub fn new(data: Vec<u8>, width: usize, height: usize, timestamp_ms: f64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
        }
    }

    /// Solid black frame for fakes.
    #[cfg(test)]
    pub fn blank(width: usize, height: usize) -> Self {
        Self::new(vec![0; width * height * 3], width, height, 0.0)
    }

    pub fn matches(&self, geometry: &VideoGeometry) -> bool {
        self.width == geometry.width as usize && self.height == geometry.height as usize
    }
}

/// Geometry reported by the source container. Never changes after open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
}

impl VideoGeometry {
    /// Normalizes raw container properties: unknown frame counts become 1 and
    /// unknown frame rates fall back to `fallback_fps`.
    pub fn from_raw(
        width: i32,
        height: i32,
        fps: f64,
        frame_count: i64,
        fallback_fps: f64,
    ) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }

        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            fallback_fps
        };

        Some(Self {
            width: width as u32,
            height: height as u32,
            fps,
            frame_count: frame_count.max(1) as u64,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Boundary line that tracked objects are counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingRegion {
    pub start: Point,
    pub end: Point,
}

impl CountingRegion {
    /// Vertical line through the horizontal midpoint, spanning the full height.
    pub fn vertical_midline(geometry: &VideoGeometry) -> Self {
        let x = (geometry.width / 2) as i32;
        Self {
            start: Point::new(x, 0),
            end: Point::new(x, geometry.height as i32),
        }
    }

    pub fn is_vertical(&self) -> bool {
        (self.start.x - self.end.x).abs() < (self.start.y - self.end.y).abs()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionalCount {
    #[serde(rename = "IN")]
    pub incoming: u64,
    #[serde(rename = "OUT")]
    pub outgoing: u64,
}

impl DirectionalCount {
    #[cfg(test)]
    pub fn new(incoming: u64, outgoing: u64) -> Self {
        Self { incoming, outgoing }
    }

    pub fn total(&self) -> u64 {
        self.incoming + self.outgoing
    }
}

/// Per-class crossing tallies, kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClasswiseCount(IndexMap<String, DirectionalCount>);

impl ClasswiseCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class with zero counts if it has not been seen yet.
    pub fn ensure_class(&mut self, class_name: &str) -> &mut DirectionalCount {
        self.0.entry(class_name.to_string()).or_default()
    }

    pub fn record_in(&mut self, class_name: &str) {
        self.ensure_class(class_name).incoming += 1;
    }

    pub fn record_out(&mut self, class_name: &str) {
        self.ensure_class(class_name).outgoing += 1;
    }

    pub fn get(&self, class_name: &str) -> Option<&DirectionalCount> {
        self.0.get(class_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DirectionalCount)> {
        self.0.iter().map(|(name, count)| (name.as_str(), count))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every class in `earlier` is still present with counts at
    /// least as large.
    pub fn dominates(&self, earlier: &ClasswiseCount) -> bool {
        earlier.iter().all(|(name, before)| {
            self.get(name).is_some_and(|now| {
                now.incoming >= before.incoming && now.outgoing >= before.outgoing
            })
        })
    }
}

impl FromIterator<(String, DirectionalCount)> for ClasswiseCount {
    fn from_iter<I: IntoIterator<Item = (String, DirectionalCount)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
