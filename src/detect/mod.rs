//! Detector boundary.
//!
//! The object detector is an external collaborator: an opaque function from
//! a frame to a list of detections. This module provides:
//! - the `Detector` trait the pipeline calls,
//! - `accept_detections`, the ingestion filter that rejects malformed
//!   detections before they reach the tracker,
//! - `LabelMap` for turning class ids into labels,
//! - stub backends for development and deterministic tests.
//!
//! The tracker never sees a detection with confidence outside `[0, 1]` or
//! a degenerate box; that contract is enforced here, keeping the hot loop
//! branch-light.

mod labels;
mod stub;

pub use labels::LabelMap;
pub use stub::{ScriptedDetector, StubDetector};

use anyhow::Result;

use crate::{Detection, Frame};

/// A detection backend. Implementations receive the frame and return raw
/// detections; they do not filter by confidence, that happens at the
/// ingestion boundary.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Ingestion filter: keep detections with confidence strictly above the
/// threshold and at most 1.0, and a box spanning at least one pixel.
/// Everything else is dropped here and logged at debug.
pub fn accept_detections(raw: Vec<Detection>, confidence_threshold: f32) -> Vec<Detection> {
    raw.into_iter()
        .filter(|det| {
            if !(det.confidence > confidence_threshold && det.confidence <= 1.0) {
                log::debug!(
                    "dropping detection class={} confidence={:.3} (threshold {:.3})",
                    det.class_id,
                    det.confidence,
                    confidence_threshold
                );
                return false;
            }
            if !det.bbox.is_valid() {
                log::debug!(
                    "dropping detection class={} with degenerate box {:?}",
                    det.class_id,
                    det.bbox
                );
                return false;
            }
            true
        })
        .collect()
}
