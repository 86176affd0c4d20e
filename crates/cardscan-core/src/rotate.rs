//! Lossless cardinal rotations.
//!
//! Recognition only ever needs quarter turns, which are pure pixel
//! permutations. Arbitrary-angle rotation is deliberately not offered: it
//! would interpolate and degrade the perceptual hash.

use crate::image::{RgbBuffer, RgbImageView};

/// A quarter-turn rotation, clockwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rotation {
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// All rotations in recognition search order.
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    #[inline]
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }
}

/// Rotate an RGB image by a quarter turn (clockwise).
pub fn rotate_rgb(src: &RgbImageView<'_>, rot: Rotation) -> RgbBuffer {
    let (w, h) = (src.width, src.height);
    let (out_w, out_h) = match rot {
        Rotation::R0 | Rotation::R180 => (w, h),
        Rotation::R90 | Rotation::R270 => (h, w),
    };

    let mut out = RgbBuffer::new(out_w, out_h);
    let src_px = |x: usize, y: usize| {
        let i = 3 * (y * w + x);
        [src.data[i], src.data[i + 1], src.data[i + 2]]
    };

    for y in 0..out_h {
        for x in 0..out_w {
            let (sx, sy) = match rot {
                Rotation::R0 => (x, y),
                Rotation::R90 => (y, h - 1 - x),
                Rotation::R180 => (w - 1 - x, h - 1 - y),
                Rotation::R270 => (w - 1 - y, x),
            };
            out.set_pixel(x, y, src_px(sx, sy));
        }
    }
    out
}
