//! Positional tracker and motion classifier.
//!
//! Each frame, accepted detections are paired with the previous frame's
//! slots, displacement decides moving vs stopped, a per-slot hysteresis
//! counter gates the alarm flag, and velocity/direction fall out of the
//! displacement and the clock's `time_diff`. The slot and state vectors
//! are replaced wholesale at the end of every update; nothing survives a
//! slot that vanishes.

use crate::{Detection, Direction, MotionState, MotionStatus, TrackSlot, TrackedObject};

use super::AssociationStrategy;

pub struct Tracker {
    association: Box<dyn AssociationStrategy>,
    /// Center displacement (pixels) above which a slot counts as moving.
    movement_threshold: f64,
    /// Consecutive stopped ticks at which the alarm flag latches on.
    stop_alarm_threshold: u32,
    slots: Vec<TrackSlot>,
    states: Vec<MotionState>,
}

impl Tracker {
    pub fn new(
        association: Box<dyn AssociationStrategy>,
        movement_threshold: f64,
        stop_alarm_threshold: u32,
    ) -> Self {
        Self {
            association,
            movement_threshold,
            stop_alarm_threshold,
            slots: Vec::new(),
            states: Vec::new(),
        }
    }

    /// Advance one frame tick. `time_diff` is the clock's clamped
    /// inter-tick interval in seconds.
    pub fn update(&mut self, detections: &[Detection], time_diff: f64) -> Vec<TrackedObject> {
        let pairing = self.association.pair(&self.slots, detections);

        let mut next_slots = Vec::with_capacity(detections.len());
        let mut next_states = Vec::with_capacity(detections.len());
        let mut tracked = Vec::with_capacity(detections.len());

        for (i, det) in detections.iter().enumerate() {
            let curr = det.bbox.center();
            let (velocity, direction, state) = match pairing[i] {
                Some(prev_index) => {
                    let prev = self.slots[prev_index].bbox.center();
                    let dx = curr.0 - prev.0;
                    let dy = curr.1 - prev.1;
                    let distance = (dx * dx + dy * dy).sqrt();

                    let mut state = self.states[prev_index];
                    if distance > self.movement_threshold {
                        state.status = MotionStatus::Moving;
                        state.stopped_frames = 0;
                        state.alarm_active = false;
                    } else {
                        state.status = MotionStatus::Stopped;
                        state.stopped_frames += 1;
                        if state.stopped_frames >= self.stop_alarm_threshold {
                            state.alarm_active = true;
                        }
                    }
                    (distance / time_diff, classify_direction(dx, dy), state)
                }
                // First sighting: no displacement to classify yet.
                None => (0.0, Direction::NotApplicable, MotionState::default()),
            };

            next_slots.push(TrackSlot {
                bbox: det.bbox,
                class_id: det.class_id,
            });
            next_states.push(state);
            tracked.push(TrackedObject {
                slot: i,
                class_id: det.class_id,
                bbox: det.bbox,
                velocity,
                direction,
                state,
                confidence: det.confidence,
            });
        }

        self.slots = next_slots;
        self.states = next_states;
        tracked
    }

    /// Motion states for the current frame, in slot order.
    pub fn states(&self) -> &[MotionState] {
        &self.states
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

/// Bucket an inter-frame center displacement into a compass direction.
///
/// `dy` is in image coordinates (y grows downward); it is negated so the
/// buckets read in screen terms: an object whose center y shrinks moved
/// up. Buckets: `(-45, 45]` right, `(45, 135]` up, `[-135, -45)` down,
/// everything else left.
pub(crate) fn classify_direction(dx: f64, dy: f64) -> Direction {
    let angle = (-dy).atan2(dx).to_degrees();
    if angle > -45.0 && angle <= 45.0 {
        Direction::Right
    } else if angle > 45.0 && angle <= 135.0 {
        Direction::Up
    } else if (-135.0..-45.0).contains(&angle) {
        Direction::Down
    } else {
        Direction::Left
    }
}
