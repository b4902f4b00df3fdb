// src/annotation.rs
//
// Overlay rendering for the counting engine: the counting line, one box per
// visible track, and a translucent per-class IN/OUT panel in the top-left.

use crate::counting::line_counter::TrackedObject;
use crate::types::{ClasswiseCount, CountingRegion, Frame};
use anyhow::{bail, Result};
use opencv::{core, imgproc, prelude::*};

mod colors {
    use opencv::core::Scalar;

    pub const REGION: Scalar = Scalar::new(255.0, 0.0, 255.0, 0.0);
    pub const TRACK: Scalar = Scalar::new(0.0, 200.0, 255.0, 0.0);
    pub const TRACK_COUNTED: Scalar = Scalar::new(0.0, 220.0, 0.0, 0.0);
    pub const PANEL_BG: Scalar = Scalar::new(20.0, 20.0, 20.0, 0.0);
    pub const TEXT: Scalar = Scalar::new(235.0, 235.0, 235.0, 0.0);
    pub const LABEL_TEXT: Scalar = Scalar::new(0.0, 0.0, 0.0, 0.0);
}

const FONT_SCALE: f64 = 0.5;
const PANEL_LINE_HEIGHT: i32 = 22;
const PANEL_PADDING: i32 = 8;

/// Draws the counting overlay onto a copy of `frame`.
pub fn annotate_frame<'a>(
    frame: &Frame,
    region: &CountingRegion,
    tracks: impl Iterator<Item = &'a TrackedObject>,
    counts: &ClasswiseCount,
) -> Result<Frame> {
    if frame.data.len() != frame.width * frame.height * 3 {
        bail!(
            "frame buffer holds {} bytes, expected {} for {}x{} BGR",
            frame.data.len(),
            frame.width * frame.height * 3,
            frame.width,
            frame.height
        );
    }

    let mat = Mat::from_slice(&frame.data)?;
    let mut output = mat.reshape(3, frame.height as i32)?.try_clone()?;

    imgproc::line(
        &mut output,
        core::Point::new(region.start.x, region.start.y),
        core::Point::new(region.end.x, region.end.y),
        colors::REGION,
        3,
        imgproc::LINE_AA,
        0,
    )?;

    for track in tracks {
        draw_track(&mut output, track)?;
    }

    draw_count_panel(&mut output, counts)?;

    Ok(Frame {
        data: output.data_bytes()?.to_vec(),
        width: frame.width,
        height: frame.height,
        timestamp_ms: frame.timestamp_ms,
    })
}

fn draw_track(output: &mut Mat, track: &TrackedObject) -> Result<()> {
    let [x1, y1, x2, y2] = track.bbox;
    let (x1, y1) = (x1.max(0.0) as i32, y1.max(0.0) as i32);
    let (x2, y2) = (x2 as i32, y2 as i32);
    if x2 <= x1 || y2 <= y1 {
        return Ok(());
    }

    let color = if track.crossed.is_some() {
        colors::TRACK_COUNTED
    } else {
        colors::TRACK
    };

    imgproc::rectangle(
        output,
        core::Rect::new(x1, y1, x2 - x1, y2 - y1),
        color,
        2,
        imgproc::LINE_AA,
        0,
    )?;

    let label = format!("{} #{}", track.class_name, track.id);
    let mut baseline = 0;
    let text_size = imgproc::get_text_size(
        &label,
        imgproc::FONT_HERSHEY_SIMPLEX,
        FONT_SCALE,
        1,
        &mut baseline,
    )?;

    let label_y = (y1 - text_size.height - 6).max(0);
    imgproc::rectangle(
        output,
        core::Rect::new(x1, label_y, text_size.width + 6, text_size.height + 6),
        color,
        -1,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::put_text(
        output,
        &label,
        core::Point::new(x1 + 3, label_y + text_size.height + 2),
        imgproc::FONT_HERSHEY_SIMPLEX,
        FONT_SCALE,
        colors::LABEL_TEXT,
        1,
        imgproc::LINE_AA,
        false,
    )?;

    track_centroid(output, track, color)
}

fn track_centroid(output: &mut Mat, track: &TrackedObject, color: core::Scalar) -> Result<()> {
    imgproc::circle(
        output,
        core::Point::new(track.center.0 as i32, track.center.1 as i32),
        4,
        color,
        -1,
        imgproc::LINE_AA,
        0,
    )?;
    Ok(())
}

fn draw_count_panel(output: &mut Mat, counts: &ClasswiseCount) -> Result<()> {
    if counts.is_empty() {
        return Ok(());
    }

    let lines = panel_lines(counts);

    let mut widest = 0;
    for line in &lines {
        let mut baseline = 0;
        let size = imgproc::get_text_size(
            line,
            imgproc::FONT_HERSHEY_SIMPLEX,
            FONT_SCALE,
            1,
            &mut baseline,
        )?;
        widest = widest.max(size.width);
    }

    let panel = core::Rect::new(
        10,
        10,
        widest + PANEL_PADDING * 2,
        lines.len() as i32 * PANEL_LINE_HEIGHT + PANEL_PADDING,
    );

    let mut overlay = output.try_clone()?;
    imgproc::rectangle(&mut overlay, panel, colors::PANEL_BG, -1, imgproc::LINE_8, 0)?;
    let mut blended = Mat::default();
    core::add_weighted(&overlay, 0.7, &*output, 0.3, 0.0, &mut blended, -1)?;
    blended.copy_to(output)?;

    for (i, line) in lines.iter().enumerate() {
        imgproc::put_text(
            output,
            line,
            core::Point::new(
                panel.x + PANEL_PADDING,
                panel.y + PANEL_PADDING + (i as i32 + 1) * PANEL_LINE_HEIGHT - 8,
            ),
            imgproc::FONT_HERSHEY_SIMPLEX,
            FONT_SCALE,
            colors::TEXT,
            1,
            imgproc::LINE_AA,
            false,
        )?;
    }

    Ok(())
}

fn panel_lines(counts: &ClasswiseCount) -> Vec<String> {
    counts
        .iter()
        .map(|(name, count)| {
            format!("{}: IN {} | OUT {}", name, count.incoming, count.outgoing)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DirectionalCount;

    #[test]
    fn test_panel_lines_follow_count_order() {
        let counts: ClasswiseCount = [
            ("truck".to_string(), DirectionalCount::new(0, 2)),
            ("car".to_string(), DirectionalCount::new(3, 1)),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            panel_lines(&counts),
            vec!["truck: IN 0 | OUT 2", "car: IN 3 | OUT 1"]
        );
    }

    #[test]
    fn test_rejects_short_buffer() {
        let frame = Frame::new(vec![0; 10], 4, 4, 0.0);
        let region = CountingRegion::vertical_midline(&crate::types::VideoGeometry {
            width: 4,
            height: 4,
            fps: 30.0,
            frame_count: 1,
        });
        assert!(annotate_frame(&frame, &region, std::iter::empty(), &ClasswiseCount::new()).is_err());
    }
}
