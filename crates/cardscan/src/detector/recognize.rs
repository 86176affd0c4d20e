//! Reference matching with rotation search and separation scoring.

use log::debug;

use cardscan_core::{rotate_rgb, RgbImageView, Rotation};
use cardscan_phash::{Phash, ReferenceCard};

use crate::params::{DetectorParams, NameMode, RotationSearch};

/// Outcome of matching one rectified segment against the reference list.
#[derive(Clone, Debug, Default)]
pub(crate) struct Recognition {
    pub is_recognized: bool,
    /// Separation score normalized by the acceptance threshold; `>= 1.0`
    /// when recognized.
    pub score: f64,
    pub name: String,
}

/// Match a segment against every reference at all four cardinal rotations.
///
/// Per rotation: hash the rotated segment, take the minimum Hamming
/// distance, and score how far it sits below the rest of the field in
/// standard deviations. With fewer than two references (or a flat distance
/// distribution) the deviation is zero and nothing is recognized.
pub(crate) fn recognize_segment(
    segment: &RgbImageView<'_>,
    refs: &[ReferenceCard],
    params: &DetectorParams,
) -> Recognition {
    if refs.is_empty() {
        return Recognition::default();
    }

    let threshold = params.separation_threshold;
    let mut best_score = f64::NEG_INFINITY;
    let mut best_match: Option<usize> = None;

    for rot in Rotation::ALL {
        let (score, index) = rotation_score(segment, rot, refs, params.hash_size);
        debug!(
            "rotation {:>3}: separation {:.2} (best: {})",
            rot.degrees(),
            score,
            refs[index].name
        );
        if score > best_score {
            best_score = score;
            best_match = Some(index);
        }
        // The short-circuit accepts the first rotation that clears the
        // threshold while leading every rotation seen so far.
        if params.rotation_search == RotationSearch::FirstAcceptable
            && score > threshold
            && score >= best_score
        {
            break;
        }
    }

    let Some(index) = best_match else {
        return Recognition::default();
    };
    if best_score <= threshold {
        return Recognition::default();
    }

    Recognition {
        is_recognized: true,
        score: best_score / threshold,
        name: canonical_name(&refs[index].name, params.name_mode),
    }
}

fn rotation_score(
    segment: &RgbImageView<'_>,
    rot: Rotation,
    refs: &[ReferenceCard],
    hash_size: usize,
) -> (f64, usize) {
    let rotated = rotate_rgb(segment, rot);
    let hash = Phash::of_rgb(&rotated.view(), hash_size);

    let distances: Vec<u32> = refs.iter().map(|r| hash.distance(&r.phash)).collect();
    let (index, &min) = distances
        .iter()
        .enumerate()
        .min_by_key(|(_, &d)| d)
        .unwrap_or((0, &0));

    (separation(&distances, min), index)
}

/// `(mean - min) / std` over the strictly-greater remainder of the distance
/// distribution. Zero when the remainder is empty or flat.
fn separation(distances: &[u32], min: u32) -> f64 {
    let rest: Vec<f64> = distances
        .iter()
        .filter(|&&d| d > min)
        .map(|&d| d as f64)
        .collect();
    if rest.is_empty() {
        return 0.0;
    }

    let mean = rest.iter().sum::<f64>() / rest.len() as f64;
    let var = rest.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / rest.len() as f64;
    let std = var.sqrt();
    if std <= 0.0 {
        return 0.0;
    }
    (mean - min as f64) / std
}

fn canonical_name(raw: &str, mode: NameMode) -> String {
    match mode {
        NameMode::FirstToken => raw.split_whitespace().next().unwrap_or("").to_string(),
        NameMode::FullName => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscan_core::RgbBuffer;
    use cardscan_phash::HashDb;

    /// Deterministic pattern image keyed by `seed`.
    fn pattern(seed: u64, w: usize, h: usize) -> RgbBuffer {
        let mut img = RgbBuffer::new(w, h);
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        // Blocky noise so downscaling to the hash grid keeps the structure.
        let cell = 8;
        for by in 0..h.div_ceil(cell) {
            for bx in 0..w.div_ceil(cell) {
                let v = (next() % 256) as u8;
                for y in (by * cell)..((by + 1) * cell).min(h) {
                    for x in (bx * cell)..((bx + 1) * cell).min(w) {
                        img.set_pixel(x, y, [v, v.wrapping_add(40), v.wrapping_add(90)]);
                    }
                }
            }
        }
        img
    }

    fn reference_list(count: usize) -> Vec<ReferenceCard> {
        (0..count)
            .map(|i| {
                let img = pattern(1000 + i as u64, 128, 176);
                ReferenceCard::new(
                    format!("card_{i}"),
                    Phash::of_rgb(&img.view(), 32),
                )
            })
            .collect()
    }

    #[test]
    fn finds_the_matching_reference() {
        let refs = reference_list(60);
        let segment = pattern(1000 + 17, 128, 176);
        let rec = recognize_segment(&segment.view(), &refs, &DetectorParams::default());
        assert!(rec.is_recognized);
        assert_eq!(rec.name, "card_17");
        assert!(rec.score >= 1.0, "score {}", rec.score);
    }

    #[test]
    fn finds_a_rotated_segment() {
        let refs = reference_list(60);
        let upright = pattern(1000 + 5, 128, 176);
        let sideways = rotate_rgb(&upright.view(), Rotation::R90);
        for search in [RotationSearch::FirstAcceptable, RotationSearch::BestOfFour] {
            let params = DetectorParams {
                rotation_search: search,
                ..DetectorParams::default()
            };
            let rec = recognize_segment(&sideways.view(), &refs, &params);
            assert!(rec.is_recognized, "search {search:?}");
            assert_eq!(rec.name, "card_5");
        }
    }

    #[test]
    fn empty_reference_list_recognizes_nothing() {
        let segment = pattern(7, 64, 88);
        let rec = recognize_segment(&segment.view(), &[], &DetectorParams::default());
        assert!(!rec.is_recognized);
        assert_eq!(rec.score, 0.0);
    }

    #[test]
    fn single_reference_cannot_separate() {
        // With one entry the remainder of the distribution is empty.
        let refs = reference_list(1);
        let segment = pattern(1000, 128, 176);
        let rec = recognize_segment(&segment.view(), &refs, &DetectorParams::default());
        assert!(!rec.is_recognized);
    }

    #[test]
    fn unrelated_segment_is_rejected() {
        let refs = reference_list(40);
        // A flat image is equidistant from all the noise references.
        let flat = RgbBuffer::new(128, 176);
        let rec = recognize_segment(&flat.view(), &refs, &DetectorParams::default());
        assert!(!rec.is_recognized, "score {}", rec.score);
    }

    #[test]
    fn name_canonicalization_modes() {
        assert_eq!(
            canonical_name("Dragon Whelp m19", NameMode::FirstToken),
            "Dragon"
        );
        assert_eq!(
            canonical_name("Dragon Whelp m19", NameMode::FullName),
            "Dragon Whelp m19"
        );
        assert_eq!(canonical_name("", NameMode::FirstToken), "");
    }

    #[test]
    fn reference_order_does_not_change_the_result() {
        let mut refs = reference_list(30);
        let segment = pattern(1000 + 3, 128, 176);
        let params = DetectorParams::default();
        let forward = recognize_segment(&segment.view(), &refs, &params);
        refs.reverse();
        let reversed = recognize_segment(&segment.view(), &refs, &params);
        assert_eq!(forward.is_recognized, reversed.is_recognized);
        assert_eq!(forward.name, reversed.name);
        assert!((forward.score - reversed.score).abs() < 1e-9);
    }

    #[test]
    fn detector_sized_hashes_match_the_database_width() {
        let refs = reference_list(3);
        let db = HashDb::new(refs);
        assert_eq!(db.hash_bits(), Some(32 * 32));
    }
}
