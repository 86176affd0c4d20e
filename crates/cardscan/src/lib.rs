//! Magic: The Gathering card recognition in photographs.
//!
//! Given a photo of cards on a contrasting background, the pipeline locates
//! each rectangular card (multi-threshold segmentation, convex hulls,
//! minimum-area quad fitting), warps it to a canonical view, and matches it
//! against a database of pre-hashed reference images by perceptual hash.
//!
//! ## Quickstart
//!
//! ```no_run
//! use cardscan::{CardDetector, DetectorParams};
//! use cardscan_phash::HashDb;
//!
//! let db = HashDb::load_json("references.json").expect("database");
//! let detector = CardDetector::new(db, DetectorParams::default()).expect("config");
//!
//! let photo = image::open("playmat.jpg").expect("image").to_rgb8();
//! let result = detector.detect(&cardscan::adapt::rgb_view(&photo)).expect("scan");
//! for card in &result.cards {
//!     println!("{} (score {:.2})", card.name, card.recognition_score);
//! }
//! ```

pub mod annotate;
mod detector;
mod error;
mod params;
pub mod report;
mod segment;

pub use cardscan_core as core;
pub use cardscan_phash as phash;

pub use detector::{CancelFlag, CardCandidate, CardDetector, ScanResult};
pub use error::{DetectorConfigError, ScanError};
pub use params::{DetectorParams, NameMode, RotationSearch, SegmentMode};
pub use segment::ClaheParams;

use cardscan_core::RgbImageView;
use cardscan_phash::Phash;

/// Hash a reference card image the same way the pipeline hashes rectified
/// segments (lightness enhancement, then DCT-median hash), so database
/// entries and scan-time hashes live in the same space.
pub fn hash_reference_image(img: &RgbImageView<'_>, params: &DetectorParams) -> Phash {
    let adjusted = segment::enhance_lightness(img, &params.clahe);
    Phash::of_rgb(&adjusted.view(), params.hash_size)
}

/// Adapters between the `image` crate and the pipeline's borrowed views.
#[cfg(feature = "image")]
pub mod adapt {
    use cardscan_core::{RgbBuffer, RgbImageView};

    /// Borrow an `image::RgbImage` as a pipeline view.
    pub fn rgb_view(img: &::image::RgbImage) -> RgbImageView<'_> {
        RgbImageView {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw(),
        }
    }

    /// Convert an owned pipeline buffer into an `image::RgbImage`.
    ///
    /// `None` only when the buffer dimensions are inconsistent, which the
    /// pipeline never produces.
    pub fn to_image(buf: &RgbBuffer) -> Option<::image::RgbImage> {
        ::image::RgbImage::from_raw(buf.width as u32, buf.height as u32, buf.data.clone())
    }
}
