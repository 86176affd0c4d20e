//! Perceptual hashing for card recognition.
//!
//! A [`Phash`] is a DCT-median hash: resize to a small square, 2D DCT, one
//! bit per coefficient (above/below the median, DC excluded from the
//! median). Similar card faces land within a few dozen bits of each other
//! out of 1024; unrelated faces are near the 512-bit random baseline.
//! [`HashDb`] persists pre-hashed reference entries as JSON.

mod db;
mod dct;
mod hash;

pub use db::{DbError, HashDb, ReferenceCard};
pub use hash::{Phash, DEFAULT_HASH_SIZE};
