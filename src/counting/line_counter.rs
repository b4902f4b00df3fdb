// src/counting/line_counter.rs
//
// IoU tracker plus line-crossing tally. Each track is counted at most once,
// the first time its centroid path crosses the counting segment.

use crate::types::{ClasswiseCount, CountingRegion};
use crate::vehicle_detection::{calculate_iou, Detection};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingDirection {
    In,
    Out,
}

impl CrossingDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossingDirection::In => "IN",
            CrossingDirection::Out => "OUT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub id: u32,
    pub bbox: [f32; 4],
    pub class_name: String,
    pub center: (f32, f32),
    pub last_seen_frame: u64,
    pub crossed: Option<CrossingDirection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossingEvent {
    pub track_id: u32,
    pub class_name: String,
    pub direction: CrossingDirection,
    pub frame_id: u64,
}

pub struct LineCounter {
    region: CountingRegion,
    next_id: u32,
    tracks: BTreeMap<u32, TrackedObject>,
    iou_threshold: f32,
    max_missing_frames: u64,
    counts: ClasswiseCount,
    frame_id: u64,
}

impl LineCounter {
    pub fn new(region: CountingRegion, iou_threshold: f32, max_missing_frames: u64) -> Self {
        Self {
            region,
            next_id: 1,
            tracks: BTreeMap::new(),
            iou_threshold,
            max_missing_frames,
            counts: ClasswiseCount::new(),
            frame_id: 0,
        }
    }

    pub fn region(&self) -> CountingRegion {
        self.region
    }

    pub fn counts(&self) -> &ClasswiseCount {
        &self.counts
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackedObject> {
        self.tracks.values()
    }

    /// Visible on the current frame.
    pub fn active_tracks(&self) -> impl Iterator<Item = &TrackedObject> {
        let frame_id = self.frame_id;
        self.tracks
            .values()
            .filter(move |t| t.last_seen_frame == frame_id)
    }

    /// Associates one frame of detections with existing tracks and tallies
    /// any new crossings.
    pub fn update(&mut self, detections: Vec<Detection>) -> Vec<CrossingEvent> {
        self.frame_id += 1;
        let frame_id = self.frame_id;
        let mut events = Vec::new();
        let mut matched: Vec<u32> = Vec::with_capacity(detections.len());

        for det in detections {
            self.counts.ensure_class(&det.class_name);

            let mut best_match: Option<(u32, f32)> = None;
            for (track_id, track) in &self.tracks {
                if track.class_name != det.class_name || matched.contains(track_id) {
                    continue;
                }
                let iou = calculate_iou(&track.bbox, &det.bbox);
                if iou > self.iou_threshold && best_match.map_or(true, |(_, best)| iou > best) {
                    best_match = Some((*track_id, iou));
                }
            }

            let center = det.center();

            match best_match.and_then(|(id, _)| self.tracks.get_mut(&id)) {
                Some(track) => {
                    let previous = track.center;
                    track.bbox = det.bbox;
                    track.center = center;
                    track.last_seen_frame = frame_id;
                    matched.push(track.id);

                    if track.crossed.is_some() {
                        continue;
                    }

                    if let Some(direction) = crossing_direction(&self.region, previous, center) {
                        track.crossed = Some(direction);
                        match direction {
                            CrossingDirection::In => self.counts.record_in(&track.class_name),
                            CrossingDirection::Out => self.counts.record_out(&track.class_name),
                        }
                        events.push(CrossingEvent {
                            track_id: track.id,
                            class_name: track.class_name.clone(),
                            direction,
                            frame_id,
                        });
                    }
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    debug!("New {} tracked: ID #{}", det.class_name, id);
                    self.tracks.insert(
                        id,
                        TrackedObject {
                            id,
                            bbox: det.bbox,
                            class_name: det.class_name,
                            center,
                            last_seen_frame: frame_id,
                            crossed: None,
                        },
                    );
                    matched.push(id);
                }
            }
        }

        let max_missing = self.max_missing_frames;
        let before = self.tracks.len();
        self.tracks
            .retain(|_, track| frame_id - track.last_seen_frame <= max_missing);
        let removed = before - self.tracks.len();
        if removed > 0 {
            debug!("Dropped {} stale track(s)", removed);
        }

        events
    }
}

/// Direction of travel when the step `from -> to` crosses the region segment.
fn crossing_direction(
    region: &CountingRegion,
    from: (f32, f32),
    to: (f32, f32),
) -> Option<CrossingDirection> {
    let a = (region.start.x as f32, region.start.y as f32);
    let b = (region.end.x as f32, region.end.y as f32);

    if from == to || !segments_intersect(from, to, a, b) {
        return None;
    }

    let forward = if region.is_vertical() {
        to.0 > from.0
    } else {
        to.1 > from.1
    };

    Some(if forward {
        CrossingDirection::In
    } else {
        CrossingDirection::Out
    })
}

fn orientation(p: (f32, f32), q: (f32, f32), r: (f32, f32)) -> f32 {
    (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
}

fn on_segment(p: (f32, f32), q: (f32, f32), r: (f32, f32)) -> bool {
    r.0 >= p.0.min(q.0) && r.0 <= p.0.max(q.0) && r.1 >= p.1.min(q.1) && r.1 <= p.1.max(q.1)
}

fn segments_intersect(p1: (f32, f32), p2: (f32, f32), q1: (f32, f32), q2: (f32, f32)) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}
