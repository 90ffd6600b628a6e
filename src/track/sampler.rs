//! Periodic event sampling.
//!
//! Every `sample_interval`-th frame tick, one `MotionEvent` is built per
//! tracked object, in slot order, stamped with the wall clock. All other
//! ticks emit nothing.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::{detect::LabelMap, MotionEvent, TrackedObject};

pub struct EventSampler {
    sample_interval: u64,
}

impl EventSampler {
    pub fn new(sample_interval: u64) -> Self {
        Self {
            sample_interval: sample_interval.max(1),
        }
    }

    /// Build events for this tick, or nothing when the tick is not a
    /// sample tick.
    pub fn maybe_emit(
        &self,
        frame_count: u64,
        objects: &[TrackedObject],
        labels: &LabelMap,
    ) -> Vec<MotionEvent> {
        if frame_count % self.sample_interval != 0 {
            return Vec::new();
        }
        let timestamp = epoch_millis();
        objects
            .iter()
            .map(|obj| MotionEvent {
                id: obj.slot,
                kind: labels.label(obj.class_id).to_string(),
                position: obj.bbox.center_px(),
                velocity: obj.velocity,
                direction: obj.direction,
                is_moving: obj.state.status,
                confidence: obj.confidence,
                timestamp,
            })
            .collect()
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
