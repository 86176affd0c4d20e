//! DCT-median perceptual hashes.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use cardscan_core::{GrayImageView, RgbImageView};

use crate::dct::{dct_2d, CosTable};

/// Default hash block side; the hash is `side * side` bits wide.
pub const DEFAULT_HASH_SIZE: usize = 32;

/// A fixed-width perceptual hash. Visually similar images have a small
/// Hamming distance.
///
/// Construction: resize to `side x side`, grayscale, 2D DCT-II, then one bit
/// per coefficient: set iff the coefficient exceeds the median of all
/// coefficients excluding DC. Serialized as a hex string, so hashes stay
/// greppable inside the JSON database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phash {
    words: Vec<u64>,
    bit_len: usize,
}

impl Phash {
    /// Hash a grayscale image.
    pub fn of_gray(img: &GrayImageView<'_>, hash_size: usize) -> Self {
        let block = resize_area_gray(img, hash_size);
        Self::of_block(block, hash_size)
    }

    /// Hash an RGB image (converted to luma first).
    pub fn of_rgb(img: &RgbImageView<'_>, hash_size: usize) -> Self {
        let block = resize_area_rgb(img, hash_size);
        Self::of_block(block, hash_size)
    }

    fn of_block(mut block: Vec<f32>, hash_size: usize) -> Self {
        let cos = CosTable::new(hash_size);
        dct_2d(&mut block, &cos);

        // Median of everything but the DC coefficient.
        let mut rest: Vec<f32> = block[1..].to_vec();
        rest.sort_by(f32::total_cmp);
        let median = if rest.is_empty() {
            0.0
        } else {
            rest[rest.len() / 2]
        };

        let bit_len = block.len();
        let mut words = vec![0u64; bit_len.div_ceil(64)];
        for (i, &c) in block.iter().enumerate() {
            if c > median {
                words[i / 64] |= 1u64 << (i % 64);
            }
        }
        Self { words, bit_len }
    }

    /// Hash width in bits.
    #[inline]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Hamming distance. Both hashes must have the same width (the database
    /// loader enforces this).
    pub fn distance(&self, other: &Phash) -> u32 {
        assert_eq!(
            self.bit_len, other.bit_len,
            "comparing hashes of different widths"
        );
        self.words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// Lowercase hex, LSB-first bytes, zero-padded to whole bytes.
    pub fn to_hex(&self) -> String {
        let n_bytes = self.bit_len.div_ceil(8);
        let mut out = String::with_capacity(2 * n_bytes);
        for i in 0..n_bytes {
            let byte = (self.words[i / 8] >> (8 * (i % 8))) as u8;
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    /// Parse the [`to_hex`](Self::to_hex) format. The bit width is the hex
    /// length times four.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.is_empty() || hex.len() % 2 != 0 {
            return None;
        }
        let n_bytes = hex.len() / 2;
        let mut words = vec![0u64; n_bytes.div_ceil(8)];
        for i in 0..n_bytes {
            let byte = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16).ok()?;
            words[i / 8] |= (byte as u64) << (8 * (i % 8));
        }
        Some(Self {
            words,
            bit_len: 8 * n_bytes,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_words(words: Vec<u64>, bit_len: usize) -> Self {
        Self { words, bit_len }
    }
}

impl Serialize for Phash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Phash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Phash::from_hex(&hex).ok_or_else(|| D::Error::custom("invalid phash hex string"))
    }
}

/// Box-average downscale of a grayscale view to `side x side` floats.
fn resize_area_gray(img: &GrayImageView<'_>, side: usize) -> Vec<f32> {
    resize_area(side, img.width, img.height, |x, y| {
        img.data[y * img.width + x] as f32
    })
}

/// Box-average downscale of an RGB view to `side x side` luma floats.
fn resize_area_rgb(img: &RgbImageView<'_>, side: usize) -> Vec<f32> {
    resize_area(side, img.width, img.height, |x, y| {
        let i = 3 * (y * img.width + x);
        0.299 * img.data[i] as f32 + 0.587 * img.data[i + 1] as f32 + 0.114 * img.data[i + 2] as f32
    })
}

fn resize_area(side: usize, w: usize, h: usize, sample: impl Fn(usize, usize) -> f32) -> Vec<f32> {
    let mut out = vec![0.0f32; side * side];
    if w == 0 || h == 0 || side == 0 {
        return out;
    }
    for ty in 0..side {
        let y0 = ty * h / side;
        let y1 = (((ty + 1) * h).div_ceil(side)).max(y0 + 1).min(h.max(1));
        for tx in 0..side {
            let x0 = tx * w / side;
            let x1 = (((tx + 1) * w).div_ceil(side)).max(x0 + 1).min(w.max(1));

            let mut acc = 0.0f32;
            for y in y0..y1 {
                for x in x0..x1 {
                    acc += sample(x, y);
                }
            }
            out[ty * side + tx] = acc / ((y1 - y0) * (x1 - x0)) as f32;
        }
    }
    out
}
