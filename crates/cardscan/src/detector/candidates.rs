//! Card candidates and redundant-detection suppression.

use nalgebra::Point2;

use cardscan_core::{geometry, RgbBuffer};

/// One detected card region.
///
/// Produced unrecognized by segmentation; recognition fills in the name and
/// score, fragment suppression may retire it before output.
#[derive(Clone, Debug)]
pub struct CardCandidate {
    /// Rectified canonical view of the region.
    pub warped: RgbBuffer,
    /// Detected quadrilateral in input-image coordinates.
    pub bounding_quad: [Point2<f32>; 4],
    /// Quad area over image area, in `(0, 1]`.
    pub image_area_fraction: f32,
    pub is_recognized: bool,
    /// Separation score over the acceptance threshold; `>= 1.0` iff
    /// recognized, `0` otherwise.
    pub recognition_score: f64,
    /// Fragments are redundant detections of an already-found card and are
    /// never emitted.
    pub is_fragment: bool,
    /// Matched reference name; empty while unrecognized.
    pub name: String,
}

impl CardCandidate {
    pub(crate) fn new(
        warped: RgbBuffer,
        bounding_quad: [Point2<f32>; 4],
        image_area_fraction: f32,
    ) -> Self {
        Self {
            warped,
            bounding_quad,
            image_area_fraction,
            is_recognized: false,
            recognition_score: 0.0,
            is_fragment: false,
            name: String::new(),
        }
    }
}

/// Cheap containment pre-pass: is candidate `idx` fully inside an earlier,
/// already-recognized candidate carrying the same name?
///
/// Only candidates recognized before `idx` is reached can contribute, so
/// within a single pass this rarely fires; the overlap pass below is the
/// authoritative one.
pub(crate) fn contained_by_recognized_twin(candidates: &[CardCandidate], idx: usize) -> bool {
    let c = &candidates[idx];
    candidates.iter().enumerate().any(|(j, other)| {
        j != idx
            && other.is_recognized
            && !other.is_fragment
            && other.name == c.name
            && geometry::contains_polygon(&other.bounding_quad, &c.bounding_quad)
    })
}

/// Pairwise overlap suppression: whenever two live candidates overlap by
/// more than half of the smaller quad, the weaker one becomes a fragment.
///
/// "Weaker": the lower recognition score when both are recognized, the
/// unrecognized one otherwise. Ties keep the earlier candidate.
pub(crate) fn mark_overlap_fragments(candidates: &mut [CardCandidate]) {
    let n = candidates.len();
    for i in 0..n {
        for j in (i + 1)..n {
            if candidates[i].is_fragment {
                break;
            }
            if candidates[j].is_fragment {
                continue;
            }
            let (a, b) = (&candidates[i], &candidates[j]);
            if !a.is_recognized && !b.is_recognized {
                continue;
            }

            let area_a = geometry::polygon_area(&a.bounding_quad);
            let area_b = geometry::polygon_area(&b.bounding_quad);
            let overlap = geometry::intersection_area(&a.bounding_quad, &b.bounding_quad);
            if overlap <= 0.5 * area_a.min(area_b) {
                continue;
            }

            let loser = match (a.is_recognized, b.is_recognized) {
                (true, false) => j,
                (false, true) => i,
                _ => {
                    if b.recognition_score > a.recognition_score {
                        i
                    } else {
                        j
                    }
                }
            };
            candidates[loser].is_fragment = true;
        }
    }
}

/// Could another card still fit in the frame?
///
/// True while the recognized area plus one more card of the smallest seen
/// size (with a 50% margin) leaves room inside the unit frame.
pub(crate) fn may_contain_more_cards(candidates: &[CardCandidate]) -> bool {
    if candidates.is_empty() {
        return true;
    }
    let total: f32 = candidates.iter().map(|c| c.image_area_fraction).sum();
    let smallest = candidates
        .iter()
        .map(|c| c.image_area_fraction)
        .fold(f32::INFINITY, f32::min);
    total + 1.5 * smallest < 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: f32, y: f32, side: f32, frac: f32) -> CardCandidate {
        CardCandidate::new(
            RgbBuffer::new(1, 1),
            [
                Point2::new(x, y),
                Point2::new(x + side, y),
                Point2::new(x + side, y + side),
                Point2::new(x, y + side),
            ],
            frac,
        )
    }

    fn recognized(mut c: CardCandidate, name: &str, score: f64) -> CardCandidate {
        c.is_recognized = true;
        c.recognition_score = score;
        c.name = name.to_string();
        c
    }

    #[test]
    fn overlapping_recognized_pair_keeps_higher_score() {
        let mut list = vec![
            recognized(candidate(0.0, 0.0, 100.0, 0.2), "whelp", 1.1),
            recognized(candidate(10.0, 10.0, 100.0, 0.2), "whelp", 2.3),
        ];
        mark_overlap_fragments(&mut list);
        assert!(list[0].is_fragment);
        assert!(!list[1].is_fragment);
    }

    #[test]
    fn unrecognized_overlap_loses_to_recognized() {
        let mut list = vec![
            candidate(0.0, 0.0, 100.0, 0.2),
            recognized(candidate(5.0, 5.0, 100.0, 0.2), "bolt", 1.5),
        ];
        mark_overlap_fragments(&mut list);
        assert!(list[0].is_fragment);
        assert!(!list[1].is_fragment);
    }

    #[test]
    fn score_tie_keeps_the_earlier_candidate() {
        let mut list = vec![
            recognized(candidate(0.0, 0.0, 100.0, 0.2), "bolt", 1.5),
            recognized(candidate(5.0, 5.0, 100.0, 0.2), "bolt", 1.5),
        ];
        mark_overlap_fragments(&mut list);
        assert!(!list[0].is_fragment);
        assert!(list[1].is_fragment);
    }

    #[test]
    fn disjoint_candidates_are_untouched() {
        let mut list = vec![
            recognized(candidate(0.0, 0.0, 50.0, 0.1), "a", 1.2),
            recognized(candidate(200.0, 0.0, 50.0, 0.1), "b", 1.2),
        ];
        mark_overlap_fragments(&mut list);
        assert!(!list[0].is_fragment && !list[1].is_fragment);
    }

    #[test]
    fn two_unrecognized_overlaps_are_ignored() {
        let mut list = vec![
            candidate(0.0, 0.0, 100.0, 0.2),
            candidate(5.0, 5.0, 100.0, 0.2),
        ];
        mark_overlap_fragments(&mut list);
        assert!(!list[0].is_fragment && !list[1].is_fragment);
    }

    #[test]
    fn containment_pre_pass_needs_matching_name() {
        let outer = recognized(candidate(0.0, 0.0, 100.0, 0.5), "whelp", 2.0);
        let mut inner = candidate(20.0, 20.0, 40.0, 0.1);
        let list = vec![outer.clone(), inner.clone()];
        // Unrecognized inner has an empty name: no match.
        assert!(!contained_by_recognized_twin(&list, 1));

        inner.name = "whelp".to_string();
        let list = vec![outer, inner];
        assert!(contained_by_recognized_twin(&list, 1));
    }

    #[test]
    fn frame_capacity_check() {
        // Empty frame: always room.
        assert!(may_contain_more_cards(&[]));
        // Two small cards: 0.2 + 0.2 + 1.5 * 0.2 = 0.7 < 1.
        let small = vec![
            recognized(candidate(0.0, 0.0, 10.0, 0.2), "a", 1.0),
            recognized(candidate(50.0, 0.0, 10.0, 0.2), "b", 1.0),
        ];
        assert!(may_contain_more_cards(&small));
        // One dominant card: 0.6 + 1.5 * 0.6 = 1.5 >= 1.
        let big = vec![recognized(candidate(0.0, 0.0, 10.0, 0.6), "c", 1.0)];
        assert!(!may_contain_more_cards(&big));
    }
}
