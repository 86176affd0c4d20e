//! Error types for the detection pipeline.

/// Errors raised while constructing a detector.
#[derive(thiserror::Error, Debug)]
pub enum DetectorConfigError {
    #[error("reference database hash width is {db_bits} bits but hash_size {hash_size} implies {expected} bits")]
    HashWidthMismatch {
        db_bits: usize,
        hash_size: usize,
        expected: usize,
    },
    #[error("hash_size must be at least 2 (got {0})")]
    HashSizeTooSmall(usize),
    #[error("pass_modes must not be empty")]
    NoPassModes,
}

/// Errors raised while scanning a single image.
///
/// Everything recoverable (degenerate contours, failed quad fits, zero
/// hash-distance deviation) is handled inside the pipeline; only per-image
/// fatal conditions surface here.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("input image has no pixels (width={width}, height={height})")]
    EmptyImage { width: usize, height: usize },
    #[error("scan cancelled")]
    Cancelled,
}
