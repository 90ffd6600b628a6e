//! Association strategies.
//!
//! The tracker pairs current-frame detections with previous-frame slots
//! through this seam. Positional pairing is the default: index i pairs
//! with slot i, which silently misassigns identity when detections are
//! reordered, added, or removed between frames. Nearest-center pairing is
//! the alternative for deployments that care more about continuity than
//! parity.

use crate::{Detection, TrackSlot};

/// For each current detection index, the previous slot index it pairs
/// with, or `None` for a first sighting. Each previous slot may be
/// claimed at most once.
pub trait AssociationStrategy: Send {
    fn pair(&self, previous: &[TrackSlot], current: &[Detection]) -> Vec<Option<usize>>;
}

/// Index-position pairing: detection i pairs with slot i when one exists.
pub struct PositionalAssociation;

impl AssociationStrategy for PositionalAssociation {
    fn pair(&self, previous: &[TrackSlot], current: &[Detection]) -> Vec<Option<usize>> {
        (0..current.len())
            .map(|i| if i < previous.len() { Some(i) } else { None })
            .collect()
    }
}

/// Greedy nearest-center pairing: candidate pairs are ranked by center
/// distance and claimed smallest-first.
pub struct NearestCenterAssociation;

impl AssociationStrategy for NearestCenterAssociation {
    fn pair(&self, previous: &[TrackSlot], current: &[Detection]) -> Vec<Option<usize>> {
        let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
        for (ci, det) in current.iter().enumerate() {
            let (cx, cy) = det.bbox.center();
            for (pi, slot) in previous.iter().enumerate() {
                let (px, py) = slot.bbox.center();
                let dist = ((cx - px).powi(2) + (cy - py).powi(2)).sqrt();
                candidates.push((dist, ci, pi));
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut pairing: Vec<Option<usize>> = vec![None; current.len()];
        let mut claimed = vec![false; previous.len()];
        for (_, ci, pi) in candidates {
            if pairing[ci].is_none() && !claimed[pi] {
                pairing[ci] = Some(pi);
                claimed[pi] = true;
            }
        }
        pairing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    fn det_at(x: i32, y: i32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x, y, x + 10, y + 10),
            class_id: 0,
            confidence: 0.9,
        }
    }

    fn slot_at(x: i32, y: i32) -> TrackSlot {
        TrackSlot {
            bbox: BoundingBox::new(x, y, x + 10, y + 10),
            class_id: 0,
        }
    }

    #[test]
    fn positional_pairs_by_index() {
        let previous = vec![slot_at(0, 0), slot_at(100, 0)];
        let current = vec![det_at(5, 0), det_at(105, 0), det_at(200, 0)];

        let pairing = PositionalAssociation.pair(&previous, &current);
        assert_eq!(pairing, vec![Some(0), Some(1), None]);
    }

    #[test]
    fn nearest_center_survives_reordering() {
        let previous = vec![slot_at(0, 0), slot_at(100, 0)];
        // Same two objects, reported in swapped order.
        let current = vec![det_at(102, 0), det_at(2, 0)];

        let pairing = NearestCenterAssociation.pair(&previous, &current);
        assert_eq!(pairing, vec![Some(1), Some(0)]);
    }

    #[test]
    fn nearest_center_claims_each_slot_once() {
        let previous = vec![slot_at(0, 0)];
        let current = vec![det_at(1, 0), det_at(2, 0)];

        let pairing = NearestCenterAssociation.pair(&previous, &current);
        assert_eq!(pairing, vec![Some(0), None]);
    }
}
