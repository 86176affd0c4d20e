//! Core types and utilities for trading-card detection.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete image-decoding library; callers adapt decoded
//! pixels into the borrowed view types at the boundary.

pub mod geometry;
mod homography;
mod image;
pub mod logger;
mod quad;
mod rotate;

pub use homography::{homography_from_4pt, warp_perspective_rgb, Homography};
pub use image::{
    sample_bilinear, sample_bilinear_rgb, sample_bilinear_u8, GrayBuffer, GrayImageView, RgbBuffer,
    RgbImageView,
};
pub use quad::{min_area_enclosing_quad, simplify_polygon};
pub use rotate::{rotate_rgb, Rotation};
