//! Pipeline driver: per-image orchestration across segmentation passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use nalgebra::Point2;

use cardscan_core::{geometry, RgbBuffer, RgbImageView};
use cardscan_phash::HashDb;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::{DetectorConfigError, ScanError};
use crate::params::{DetectorParams, SegmentMode};
use crate::segment;

use super::candidates::{
    contained_by_recognized_twin, mark_overlap_fragments, may_contain_more_cards, CardCandidate,
};
use super::characterize::characterize_contour;
use super::recognize::recognize_segment;
use super::rectify::rectify_segment;

/// Cooperative cancellation handle, checked between contours and between
/// segmentation passes. Cloneable and shareable across threads.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of scanning one image: the recognized cards (never fragments,
/// always scored at or above 1.0) and which passes ran.
#[derive(Clone, Debug, Default)]
pub struct ScanResult {
    pub cards: Vec<CardCandidate>,
    pub modes_tried: Vec<SegmentMode>,
}

/// One image travelling through the pipeline.
struct SceneImage {
    original: RgbBuffer,
    adjusted: RgbBuffer,
    candidates: Vec<CardCandidate>,
}

/// Card detector: holds the reference database and tunables, scans images
/// one at a time. Stateless across images, so one instance may be shared
/// by reference across worker threads.
#[derive(Clone, Debug)]
pub struct CardDetector {
    params: DetectorParams,
    db: HashDb,
}

impl CardDetector {
    /// Build a detector, validating that the database hash width matches
    /// the configured hash size.
    pub fn new(db: HashDb, params: DetectorParams) -> Result<Self, DetectorConfigError> {
        if params.hash_size < 2 {
            return Err(DetectorConfigError::HashSizeTooSmall(params.hash_size));
        }
        if params.pass_modes.is_empty() {
            return Err(DetectorConfigError::NoPassModes);
        }
        let expected = params.hash_size * params.hash_size;
        if let Some(db_bits) = db.hash_bits() {
            if db_bits != expected {
                return Err(DetectorConfigError::HashWidthMismatch {
                    db_bits,
                    hash_size: params.hash_size,
                    expected,
                });
            }
        }
        Ok(Self { params, db })
    }

    #[inline]
    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    #[inline]
    pub fn references(&self) -> &HashDb {
        &self.db
    }

    /// Scan an image for cards.
    pub fn detect(&self, image: &RgbImageView<'_>) -> Result<ScanResult, ScanError> {
        self.detect_cancellable(image, &CancelFlag::new())
    }

    /// Scan with a cancellation handle; a triggered flag aborts with
    /// [`ScanError::Cancelled`] and discards partial results.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image, cancel), fields(width = image.width, height = image.height))
    )]
    pub fn detect_cancellable(
        &self,
        image: &RgbImageView<'_>,
        cancel: &CancelFlag,
    ) -> Result<ScanResult, ScanError> {
        if image.width == 0 || image.height == 0 {
            return Err(ScanError::EmptyImage {
                width: image.width,
                height: image.height,
            });
        }

        let scale = downscale_factor(image.width, image.height, self.params.max_dimension);
        let mut scene = self.ingest(image, scale);
        let image_area = (scene.original.width * scene.original.height) as f32;

        let mut modes_tried = Vec::new();
        for &mode in &self.params.pass_modes {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            scene.candidates.clear();
            self.segment_pass(&mut scene, mode, image_area, cancel)?;
            let segmented = scene.candidates.len();

            self.recognize_candidates(&mut scene.candidates);
            mark_overlap_fragments(&mut scene.candidates);
            scene
                .candidates
                .retain(|c| c.is_recognized && !c.is_fragment);

            modes_tried.push(mode);
            info!(
                "mode {}: {} candidate(s), {} recognized",
                mode.as_str(),
                segmented,
                scene.candidates.len()
            );

            if !may_contain_more_cards(&scene.candidates)
                || scene.candidates.len() > self.params.max_cards
            {
                break;
            }
        }

        let mut cards = scene.candidates;
        if let Some(scale) = scale {
            // Report quads in the coordinates of the image we were handed.
            let inv = 1.0 / scale;
            for card in &mut cards {
                for v in &mut card.bounding_quad {
                    *v = Point2::new(v.x * inv, v.y * inv);
                }
            }
        }

        Ok(ScanResult { cards, modes_tried })
    }

    /// Downscale oversized inputs and build the contrast-adjusted twin.
    fn ingest(&self, image: &RgbImageView<'_>, scale: Option<f32>) -> SceneImage {
        let original = match scale {
            Some(s) => {
                let w = (image.width as f32 * s).round().max(1.0) as usize;
                let h = (image.height as f32 * s).round().max(1.0) as usize;
                debug!(
                    "downscaling {}x{} -> {}x{}",
                    image.width, image.height, w, h
                );
                downscale_rgb(image, w, h)
            }
            None => RgbBuffer {
                width: image.width,
                height: image.height,
                data: image.data.to_vec(),
            },
        };
        let adjusted = segment::enhance_lightness(&original.view(), &self.params.clahe);
        SceneImage {
            original,
            adjusted,
            candidates: Vec::new(),
        }
    }

    /// One segmentation pass: contours largest-first through the
    /// characterizer, accepted quads cropped and rectified.
    fn segment_pass(
        &self,
        scene: &mut SceneImage,
        mode: SegmentMode,
        image_area: f32,
        cancel: &CancelFlag,
    ) -> Result<(), ScanError> {
        let contours = segment::mode_contours(
            &scene.original.view(),
            &scene.adjusted.view(),
            mode,
            &self.params,
        );

        // The working size floor starts at the full frame and drops to the
        // first accepted card once one is found.
        let mut max_segment_area = image_area;
        let mut floor_set = false;

        for contour in &contours {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let ch = characterize_contour(contour, max_segment_area, image_area, &self.params);
            if let Some(accepted) = ch.accepted {
                let quad_area = geometry::polygon_area(&accepted.quad);
                let cropped = geometry::scale_polygon(&accepted.quad, accepted.crop_factor);
                let cropped = [cropped[0], cropped[1], cropped[2], cropped[3]];

                match rectify_segment(&scene.adjusted.view(), &cropped) {
                    Some(warped) => {
                        if !floor_set && quad_area > 0.1 * image_area {
                            max_segment_area = quad_area;
                            floor_set = true;
                        }
                        scene.candidates.push(CardCandidate::new(
                            warped,
                            accepted.quad,
                            quad_area / image_area,
                        ));
                    }
                    None => debug!("degenerate quad after crop, skipping contour"),
                }
            }
            if !ch.continue_pass {
                break;
            }
        }
        Ok(())
    }

    /// Recognize every live candidate, with the cheap containment pre-pass
    /// short-circuiting duplicates of already-recognized cards.
    fn recognize_candidates(&self, candidates: &mut Vec<CardCandidate>) {
        for idx in 0..candidates.len() {
            if candidates[idx].is_fragment {
                continue;
            }
            if contained_by_recognized_twin(candidates, idx) {
                candidates[idx].is_fragment = true;
                continue;
            }
            let rec = recognize_segment(
                &candidates[idx].warped.view(),
                &self.db.entries,
                &self.params,
            );
            let c = &mut candidates[idx];
            c.is_recognized = rec.is_recognized;
            c.recognition_score = rec.score;
            c.name = rec.name;
        }
    }
}

/// Scale factor that brings the short side down to `max_dimension`, or
/// `None` when the image is already small enough.
fn downscale_factor(width: usize, height: usize, max_dimension: usize) -> Option<f32> {
    let short = width.min(height);
    (max_dimension > 0 && short > max_dimension)
        .then(|| max_dimension as f32 / short as f32)
}

/// Area-averaged downscale.
fn downscale_rgb(src: &RgbImageView<'_>, new_w: usize, new_h: usize) -> RgbBuffer {
    let mut out = RgbBuffer::new(new_w, new_h);
    for ty in 0..new_h {
        let y0 = ty * src.height / new_h;
        let y1 = ((ty + 1) * src.height).div_ceil(new_h).max(y0 + 1);
        for tx in 0..new_w {
            let x0 = tx * src.width / new_w;
            let x1 = ((tx + 1) * src.width).div_ceil(new_w).max(x0 + 1);

            let mut acc = [0.0f32; 3];
            for y in y0..y1 {
                for x in x0..x1 {
                    let i = 3 * (y * src.width + x);
                    for c in 0..3 {
                        acc[c] += src.data[i + c] as f32;
                    }
                }
            }
            let n = ((y1 - y0) * (x1 - x0)) as f32;
            out.set_pixel(
                tx,
                ty,
                [
                    (acc[0] / n).round() as u8,
                    (acc[1] / n).round() as u8,
                    (acc[2] / n).round() as u8,
                ],
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downscale_factor_triggers_on_the_short_side() {
        assert_eq!(downscale_factor(800, 600, 1000), None);
        assert_eq!(downscale_factor(4000, 900, 1000), None);
        let s = downscale_factor(4000, 3000, 1000).expect("scale");
        assert!((s - 1000.0 / 3000.0).abs() < 1e-6);
    }

    #[test]
    fn downscale_averages_blocks() {
        let mut src = RgbBuffer::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                let v = if x < 2 { 100 } else { 200 };
                src.set_pixel(x, y, [v, v, v]);
            }
        }
        let out = downscale_rgb(&src.view(), 2, 2);
        assert_eq!(out.pixel(0, 0), [100, 100, 100]);
        assert_eq!(out.pixel(1, 1), [200, 200, 200]);
    }

    #[test]
    fn empty_image_is_rejected() {
        let db = HashDb::default();
        let detector = CardDetector::new(db, DetectorParams::default()).expect("detector");
        let empty = RgbImageView {
            width: 0,
            height: 0,
            data: &[],
        };
        assert!(matches!(
            detector.detect(&empty),
            Err(ScanError::EmptyImage { .. })
        ));
    }

    #[test]
    fn cancelled_flag_aborts() {
        let db = HashDb::default();
        let detector = CardDetector::new(db, DetectorParams::default()).expect("detector");
        let img = RgbBuffer::new(64, 64);
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(
            detector.detect_cancellable(&img.view(), &cancel),
            Err(ScanError::Cancelled)
        ));
    }

    #[test]
    fn config_validation_catches_mismatches() {
        let bad = DetectorParams {
            hash_size: 1,
            ..DetectorParams::default()
        };
        assert!(matches!(
            CardDetector::new(HashDb::default(), bad),
            Err(DetectorConfigError::HashSizeTooSmall(1))
        ));

        let no_modes = DetectorParams {
            pass_modes: Vec::new(),
            ..DetectorParams::default()
        };
        assert!(matches!(
            CardDetector::new(HashDb::default(), no_modes),
            Err(DetectorConfigError::NoPassModes)
        ));
    }
}
