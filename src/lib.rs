//! motion-relay
//!
//! This crate turns a per-frame stream of object detections into a stream of
//! structured motion events, and drives an audible alarm when a tracked
//! object stops moving for too long.
//!
//! # Architecture
//!
//! One producer loop runs the whole pipeline:
//!
//! frame clock -> frame source -> detector -> ingestion filter -> tracker
//! -> alarm controller -> event sampler -> broadcast
//!
//! The loop is started lazily by the first subscriber connection and is
//! never duplicated or restarted; subscriber disconnects do not stop it.
//! All tracking state is owned by the producer thread.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (synthetic stub, looping restart policy)
//! - `detect`: detector boundary (trait, ingestion filter, label map)
//! - `track`: frame clock, association, tracker, alarm controller, sampler
//! - `alarm`: alarm device sinks
//! - `pipeline`: the producer loop
//! - `server`: TCP event transport and session manager
//! - `config`: daemon configuration (file + env)

use serde::{Deserialize, Serialize};

pub mod alarm;
pub mod config;
pub mod detect;
pub mod ingest;
pub mod pipeline;
pub mod server;
pub mod track;

pub use alarm::{AlarmSink, CommandAlarm, LogAlarm};
pub use detect::{accept_detections, Detector, LabelMap, ScriptedDetector, StubDetector};
pub use ingest::{Frame, FrameSource, LoopingSource, SourceConfig, SyntheticSource};
pub use pipeline::{EventBroadcast, Pipeline, OBJECT_DATA_EVENT};
pub use server::{
    EventServer, ServerConfig, ServerHandle, SessionManager, SubscriberRegistry, TcpBroadcaster,
};
pub use track::{
    AlarmCommand, AlarmController, AssociationStrategy, EventSampler, FrameClock, FrameTick,
    NearestCenterAssociation, PositionalAssociation, Tracker,
};

// -------------------- Geometry --------------------

/// Axis-aligned bounding box in pixel coordinates, origin top-left,
/// y increasing downward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl BoundingBox {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Box center for displacement math.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) as f64 / 2.0,
            (self.ymin + self.ymax) as f64 / 2.0,
        )
    }

    /// Box center as integer pixels, for event payloads (truncating
    /// midpoint, matching the wire format's integer positions).
    pub fn center_px(&self) -> Position {
        Position {
            x: (self.xmin + self.xmax) / 2,
            y: (self.ymin + self.ymax) / 2,
        }
    }

    /// A box is usable when it spans at least one pixel on both axes.
    pub fn is_valid(&self) -> bool {
        self.xmax > self.xmin && self.ymax > self.ymin
    }
}

/// Integer pixel position, as carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

// -------------------- Detections --------------------

/// One object instance reported by the detector for a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: usize,
    /// Detector confidence in `[0, 1]`. Values outside the range are
    /// rejected by `detect::accept_detections` before tracking.
    pub confidence: f32,
}

/// Per-index tracking state carried from one frame to the next: the
/// previous frame's accepted detection at that slot. The slot vector is
/// replaced wholesale each frame; index position is the only cross-frame
/// identity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackSlot {
    pub bbox: BoundingBox,
    pub class_id: usize,
}

// -------------------- Motion state --------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionStatus {
    Moving,
    Stopped,
}

/// Per-slot scalar motion state.
///
/// Invariants: `status == Stopped` iff `stopped_frames >= 1`;
/// `alarm_active` is set only when `stopped_frames` crosses the alarm
/// threshold and cleared only on the transition back to `Moving`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionState {
    pub stopped_frames: u32,
    pub status: MotionStatus,
    pub alarm_active: bool,
}

impl Default for MotionState {
    fn default() -> Self {
        Self {
            stopped_frames: 0,
            status: MotionStatus::Moving,
            alarm_active: false,
        }
    }
}

/// Compass direction of inter-frame movement, in screen terms: `Up` means
/// the object moved toward the top of the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "right")]
    Right,
    #[serde(rename = "up")]
    Up,
    #[serde(rename = "down")]
    Down,
    #[serde(rename = "left")]
    Left,
    /// First sighting of a slot; no previous center to compare against.
    #[serde(rename = "N/A")]
    NotApplicable,
}

// -------------------- Tracker output --------------------

/// One tracked detection for the current frame tick, after association and
/// motion classification.
#[derive(Clone, Debug)]
pub struct TrackedObject {
    /// Slot index within this frame's detection sequence.
    pub slot: usize,
    pub class_id: usize,
    pub bbox: BoundingBox,
    /// Pixels per second, `>= 0`.
    pub velocity: f64,
    pub direction: Direction,
    pub state: MotionState,
    pub confidence: f32,
}

// -------------------- Wire events --------------------

/// Motion event as delivered to subscribers. Field names are the wire
/// contract and must not change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: Position,
    pub velocity: f64,
    pub direction: Direction,
    #[serde(rename = "isMoving")]
    pub is_moving: MotionStatus,
    pub confidence: f32,
    /// Epoch milliseconds at emission time.
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_centers() {
        let bbox = BoundingBox::new(100, 200, 201, 301);
        assert_eq!(bbox.center(), (150.5, 250.5));
        assert_eq!(bbox.center_px(), Position { x: 150, y: 250 });
    }

    #[test]
    fn degenerate_boxes_are_invalid() {
        assert!(!BoundingBox::new(10, 10, 10, 20).is_valid());
        assert!(!BoundingBox::new(10, 10, 20, 10).is_valid());
        assert!(!BoundingBox::new(20, 20, 10, 10).is_valid());
        assert!(BoundingBox::new(10, 10, 11, 11).is_valid());
    }

    #[test]
    fn motion_event_wire_field_names() {
        let event = MotionEvent {
            id: 3,
            kind: "person".to_string(),
            position: Position { x: 100, y: 100 },
            velocity: 0.0,
            direction: Direction::NotApplicable,
            is_moving: MotionStatus::Stopped,
            confidence: 0.91,
            timestamp: 1_700_000_000_000,
        };

        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["id"], 3);
        assert_eq!(json["type"], "person");
        assert_eq!(json["position"]["x"], 100);
        assert_eq!(json["position"]["y"], 100);
        assert_eq!(json["direction"], "N/A");
        assert_eq!(json["isMoving"], "Stopped");
        assert_eq!(json["timestamp"], 1_700_000_000_000u64);
    }

    #[test]
    fn direction_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Direction::Right).expect("serialize"),
            "\"right\""
        );
        assert_eq!(
            serde_json::to_string(&Direction::Up).expect("serialize"),
            "\"up\""
        );
    }
}
