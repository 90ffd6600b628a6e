//! Stub detection backends.
//!
//! `StubDetector` emits a single wandering box so the daemon produces
//! plausible events without a model. `ScriptedDetector` plays back a fixed
//! sequence of detection lists for deterministic tests.

use anyhow::Result;
use rand::Rng;

use crate::{BoundingBox, Detection, Frame};

use super::Detector;

const STUB_BOX_SIZE: i32 = 60;
const STUB_CONFIDENCE: f32 = 0.9;

/// Single synthetic object that drifts around the frame. Movement
/// alternates between drift phases and dwell phases so the stopped-object
/// alarm path is exercised too.
pub struct StubDetector {
    x: i32,
    y: i32,
    tick: u64,
}

impl StubDetector {
    pub fn new() -> Self {
        Self {
            x: 100,
            y: 100,
            tick: 0,
        }
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for StubDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.tick += 1;
        // Dwell for 30 ticks out of every 100, drift otherwise.
        if self.tick % 100 >= 30 {
            let mut rng = rand::thread_rng();
            self.x += rng.gen_range(-6..=6);
            self.y += rng.gen_range(-6..=6);
        }
        let max_x = frame.width as i32 - STUB_BOX_SIZE - 1;
        let max_y = frame.height as i32 - STUB_BOX_SIZE - 1;
        self.x = self.x.clamp(1, max_x.max(1));
        self.y = self.y.clamp(1, max_y.max(1));

        Ok(vec![Detection {
            bbox: BoundingBox::new(self.x, self.y, self.x + STUB_BOX_SIZE, self.y + STUB_BOX_SIZE),
            class_id: 0,
            confidence: STUB_CONFIDENCE,
        }])
    }
}

/// Plays back a fixed sequence of per-frame detection lists, then repeats
/// the final entry forever. An empty script yields empty frames.
pub struct ScriptedDetector {
    script: Vec<Vec<Detection>>,
    cursor: usize,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self { script, cursor: 0 }
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        let Some(last) = self.script.last() else {
            return Ok(Vec::new());
        };
        let detections = self.script.get(self.cursor).unwrap_or(last).clone();
        if self.cursor < self.script.len() {
            self.cursor += 1;
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame {
            pixels: vec![0u8; 12],
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn stub_detector_stays_inside_frame() {
        let mut detector = StubDetector::new();
        for _ in 0..200 {
            let detections = detector.detect(&frame()).expect("detect");
            assert_eq!(detections.len(), 1);
            let bbox = detections[0].bbox;
            assert!(bbox.xmin >= 1 && bbox.ymin >= 1);
            assert!(bbox.xmax < 640 && bbox.ymax < 480);
        }
    }

    #[test]
    fn scripted_detector_repeats_final_entry() {
        let first = vec![Detection {
            bbox: BoundingBox::new(0, 0, 10, 10),
            class_id: 1,
            confidence: 0.9,
        }];
        let second: Vec<Detection> = Vec::new();
        let mut detector = ScriptedDetector::new(vec![first.clone(), second]);

        assert_eq!(detector.detect(&frame()).expect("detect"), first);
        assert!(detector.detect(&frame()).expect("detect").is_empty());
        assert!(detector.detect(&frame()).expect("detect").is_empty());
    }

    #[test]
    fn scripted_detector_empty_script_is_empty_frames() {
        let mut detector = ScriptedDetector::new(Vec::new());
        assert!(detector.detect(&frame()).expect("detect").is_empty());
    }
}
