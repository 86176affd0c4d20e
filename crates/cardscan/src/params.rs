//! Detector configuration.

use serde::{Deserialize, Serialize};

use crate::segment::ClaheParams;

/// Which thresholding strategy a segmentation pass uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentMode {
    /// Fixed threshold on the contrast-adjusted grayscale image.
    Gray,
    /// Adaptive Gaussian threshold on the contrast-adjusted grayscale image.
    Adaptive,
    /// Fixed threshold on each contrast-enhanced color channel separately.
    Rgb,
    /// Union of all of the above.
    All,
}

impl SegmentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentMode::Gray => "gray",
            SegmentMode::Adaptive => "adaptive",
            SegmentMode::Rgb => "rgb",
            SegmentMode::All => "all",
        }
    }
}

/// How a matched reference name is reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMode {
    /// Keep only the first whitespace-separated token. Collapses printing
    /// variants named like `"Dragon Whelp m19"` onto one identity, at the
    /// cost of truncating multi-word card names.
    #[default]
    FirstToken,
    /// Report the reference name untouched.
    FullName,
}

/// How the four cardinal rotations are searched during recognition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationSearch {
    /// Stop at the first rotation whose separation score exceeds the
    /// threshold and every score seen so far. Iteration-order dependent,
    /// but skips up to three hash computations per segment.
    #[default]
    FirstAcceptable,
    /// Score all four rotations and take the global best.
    BestOfFour,
}

/// Tunables honoured by the detection pipeline.
///
/// The defaults are calibrated for photographs of standard-size Magic cards
/// against a contrasting background; the form-factor window in particular
/// encodes the 63x88 mm card aspect ratio.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Acceptance threshold on the separation score.
    pub separation_threshold: f64,
    /// Fixed threshold level for [`SegmentMode::Gray`].
    pub gray_threshold: u8,
    /// Per-channel threshold level for [`SegmentMode::Rgb`].
    pub rgb_threshold: u8,
    /// Constant subtracted from the local Gaussian mean in adaptive mode.
    pub adaptive_offset: f32,
    /// Local contrast enhancement settings.
    pub clahe: ClaheParams,
    /// Inputs whose shorter side exceeds this are downscaled before
    /// processing.
    pub max_dimension: usize,
    /// Perceptual hash block side; the hash is `hash_size^2` bits wide and
    /// must match the reference database.
    pub hash_size: usize,
    /// Accepted range for the quad form factor `area / (perimeter * min_edge)`.
    pub form_factor_min: f32,
    pub form_factor_max: f32,
    /// Maximum tolerated corner-coverage deficit before a quad is rejected
    /// as non-card-shaped.
    pub max_corner_diff: f32,
    /// Slope of the pre-warp crop: `crop_factor = 1 - crop_slope * corner_diff`.
    pub crop_slope: f32,
    /// Stop scanning once more than this many cards are recognized.
    pub max_cards: usize,
    /// Polygon simplification removes edges shorter than this fraction of
    /// the perimeter.
    pub length_cutoff: f32,
    /// Safety ceiling on contours examined per segmentation pass.
    pub max_contours: usize,
    /// Thresholding passes, tried in order until the frame is accounted for.
    pub pass_modes: Vec<SegmentMode>,
    pub name_mode: NameMode,
    pub rotation_search: RotationSearch,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            separation_threshold: 4.0,
            gray_threshold: 70,
            rgb_threshold: 110,
            adaptive_offset: 10.0,
            clahe: ClaheParams::default(),
            max_dimension: 1000,
            hash_size: 32,
            form_factor_min: 0.25,
            form_factor_max: 0.33,
            max_corner_diff: 0.35,
            crop_slope: 0.22,
            max_cards: 5,
            length_cutoff: 0.15,
            max_contours: 60,
            pass_modes: vec![SegmentMode::Adaptive, SegmentMode::Rgb],
            name_mode: NameMode::default(),
            rotation_search: RotationSearch::default(),
        }
    }
}
