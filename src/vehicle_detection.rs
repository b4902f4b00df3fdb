// src/vehicle_detection.rs

use crate::types::{CountingConfig, DeviceKind};
use anyhow::{bail, Context, Result};
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
};
use tracing::{debug, info};

const YOLO_INPUT_SIZE: usize = 640;
const YOLO_CLASSES: usize = 80;
const LETTERBOX_FILL: u8 = 114;

const COCO_NAMES: [&str; YOLO_CLASSES] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: [f32; 4], // [x1, y1, x2, y2] in original image coordinates
    pub confidence: f32,
    pub class_id: usize,
    pub class_name: String,
}

impl Detection {
    pub fn center(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) / 2.0,
            (self.bbox[1] + self.bbox[3]) / 2.0,
        )
    }
}

pub fn class_id_to_name(class_id: usize) -> String {
    COCO_NAMES
        .get(class_id)
        .copied()
        .unwrap_or("unknown")
        .to_string()
}

pub struct YoloDetector {
    session: Session,
    classes: Vec<usize>,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl YoloDetector {
    pub fn new(config: &CountingConfig) -> Result<Self> {
        info!("Loading YOLO model: {}", config.model_path);

        if let Some(bad) = config.classes.iter().find(|c| **c >= YOLO_CLASSES) {
            bail!("class id {} is outside the {} COCO classes", bad, YOLO_CLASSES);
        }

        let mut builder = Session::builder()?;

        match config.device {
            DeviceKind::Cpu => info!("Running detector on CPU"),
            DeviceKind::Auto => {
                info!("Enabling CUDA execution provider (CPU fallback)");
                builder = builder.with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build()])?;
            }
            DeviceKind::Cuda => {
                info!("Enabling CUDA execution provider");
                builder = builder.with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build()
                    .error_on_failure()])?;
            }
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&config.model_path)
            .with_context(|| format!("Failed to load model {}", config.model_path))?;

        info!(
            "✓ YOLO detector initialized (classes: {:?})",
            config
                .classes
                .iter()
                .map(|c| COCO_NAMES[*c])
                .collect::<Vec<_>>()
        );

        Ok(Self {
            session,
            classes: config.classes.clone(),
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.nms_iou_threshold,
        })
    }

    /// Detects the configured classes in a packed BGR frame.
    pub fn detect(&mut self, frame: &[u8], width: usize, height: usize) -> Result<Vec<Detection>> {
        let (input, scale, pad_x, pad_y) = preprocess(frame, width, height)?;

        let output = self.infer(&input)?;

        let detections = postprocess(
            &output,
            scale,
            pad_x,
            pad_y,
            self.confidence_threshold,
            &self.classes,
        );
        let detections = nms(detections, self.iou_threshold);

        debug!("Detected {} objects", detections.len());
        Ok(detections)
    }

    fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let shape = [1, 3, YOLO_INPUT_SIZE, YOLO_INPUT_SIZE];
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), input.to_vec().into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs!["images" => input_value])?;
        let output = &outputs[0];
        let (_, data) = output.try_extract_tensor::<f32>()?;

        Ok(data.to_vec())
    }
}

/// Letterboxes into the model input, swaps BGR to RGB, and lays out CHW.
fn preprocess(src: &[u8], src_w: usize, src_h: usize) -> Result<(Vec<f32>, f32, f32, f32)> {
    if src_w == 0 || src_h == 0 || src.len() != src_w * src_h * 3 {
        bail!(
            "frame buffer of {} bytes does not match {}x{} BGR",
            src.len(),
            src_w,
            src_h
        );
    }

    let target_size = YOLO_INPUT_SIZE;

    // Fit inside 640x640 keeping the aspect ratio
    let scale = (target_size as f32 / src_w as f32).min(target_size as f32 / src_h as f32);
    let scaled_w = ((src_w as f32 * scale) as usize).clamp(1, target_size);
    let scaled_h = ((src_h as f32 * scale) as usize).clamp(1, target_size);

    let pad_x = (target_size - scaled_w) as f32 / 2.0;
    let pad_y = (target_size - scaled_h) as f32 / 2.0;

    let resized = resize_bilinear(src, src_w, src_h, scaled_w, scaled_h);

    let mut canvas = vec![LETTERBOX_FILL; target_size * target_size * 3];

    for y in 0..scaled_h {
        for x in 0..scaled_w {
            let src_idx = (y * scaled_w + x) * 3;
            let dst_x = x + pad_x as usize;
            let dst_y = y + pad_y as usize;
            let dst_idx = (dst_y * target_size + dst_x) * 3;
            canvas[dst_idx..dst_idx + 3].copy_from_slice(&resized[src_idx..src_idx + 3]);
        }
    }

    // [0, 255] -> [0, 1], HWC BGR -> CHW RGB
    let plane = target_size * target_size;
    let mut input = vec![0.0f32; 3 * plane];
    for c in 0..3 {
        for (pixel, chunk) in canvas.chunks_exact(3).enumerate() {
            input[c * plane + pixel] = chunk[2 - c] as f32 / 255.0;
        }
    }

    Ok((input, scale, pad_x, pad_y))
}

/// Parses a `[1, 4 + 80, N]` head into detections of the wanted classes.
fn postprocess(
    output: &[f32],
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    conf_thresh: f32,
    classes: &[usize],
) -> Vec<Detection> {
    let mut detections = Vec::new();
    let num_preds = output.len() / (4 + YOLO_CLASSES);

    for i in 0..num_preds {
        let cx = output[i];
        let cy = output[num_preds + i];
        let w = output[num_preds * 2 + i];
        let h = output[num_preds * 3 + i];

        let mut max_conf = 0.0f32;
        let mut best_class = 0;

        for c in 0..YOLO_CLASSES {
            let conf = output[num_preds * (4 + c) + i];
            if conf > max_conf {
                max_conf = conf;
                best_class = c;
            }
        }

        if max_conf < conf_thresh || !classes.contains(&best_class) {
            continue;
        }

        // Center format -> corners, then undo the letterbox
        let x1 = (cx - w / 2.0 - pad_x) / scale;
        let y1 = (cy - h / 2.0 - pad_y) / scale;
        let x2 = (cx + w / 2.0 - pad_x) / scale;
        let y2 = (cy + h / 2.0 - pad_y) / scale;

        detections.push(Detection {
            bbox: [x1, y1, x2, y2],
            confidence: max_conf,
            class_id: best_class,
            class_name: class_id_to_name(best_class),
        });
    }

    detections
}

fn resize_bilinear(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];
    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;
            let sx0 = (sx.floor() as usize).min(src_w - 1);
            let sy0 = (sy.floor() as usize).min(src_h - 1);
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);
            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    dst
}

/// Class-aware non-maximum suppression.
fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();

    for det in detections {
        let suppressed = keep.iter().any(|kept| {
            kept.class_id == det.class_id && calculate_iou(&kept.bbox, &det.bbox) >= iou_threshold
        });
        if !suppressed {
            keep.push(det);
        }
    }

    keep
}

pub fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
