//! The detection pipeline.
//!
//! This module wires together segmentation, contour characterization,
//! perspective rectification, perceptual-hash recognition, and redundant-
//! detection suppression.

mod candidates;
mod characterize;
mod pipeline;
mod recognize;
mod rectify;

pub use candidates::CardCandidate;
pub use pipeline::{CancelFlag, CardDetector, ScanResult};
