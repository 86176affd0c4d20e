//! Contrast-limited adaptive histogram equalization.
//!
//! Card photographs often have uneven lighting across the playmat; plain
//! global equalization blows out either the cards or the background. CLAHE
//! equalizes per tile with a clipped histogram and blends neighbouring tile
//! mappings bilinearly, which keeps local edges strong without amplifying
//! noise in flat regions.

use serde::{Deserialize, Serialize};

use cardscan_core::{RgbBuffer, RgbImageView};

/// CLAHE settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaheParams {
    /// Histogram clip limit as a multiple of the uniform bin height.
    pub clip_limit: f32,
    /// Tiles per image side.
    pub tile_grid: usize,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid: 8,
        }
    }
}

/// Equalize a single `u8` plane in place-free fashion.
pub(crate) fn clahe_plane(
    plane: &[u8],
    width: usize,
    height: usize,
    params: &ClaheParams,
) -> Vec<u8> {
    let grid = params.tile_grid.max(1);
    let tile_w = width.div_ceil(grid).max(1);
    let tile_h = height.div_ceil(grid).max(1);
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    // Per-tile lookup tables from clipped histograms.
    let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[plane[y * width + x] as usize] += 1;
                }
            }
            let n_pixels = ((x1 - x0) * (y1 - y0)) as u32;
            clip_histogram(&mut hist, params.clip_limit, n_pixels);

            // CDF -> LUT.
            let lut = &mut luts[ty * tiles_x + tx];
            let mut cum = 0u32;
            let scale = 255.0 / n_pixels.max(1) as f32;
            for (v, &count) in hist.iter().enumerate() {
                cum += count;
                lut[v] = (cum as f32 * scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    // Bilinear blend between the four nearest tile mappings; pixels outside
    // the outermost tile centres use the border tile alone.
    let mut out = vec![0u8; plane.len()];
    for y in 0..height {
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let (ty0, wy) = if fy <= 0.0 {
            (0, 0.0)
        } else {
            ((fy.floor() as usize).min(tiles_y - 1), fy.fract())
        };
        let ty1 = (ty0 + 1).min(tiles_y - 1);

        for x in 0..width {
            let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
            let (tx0, wx) = if fx <= 0.0 {
                (0, 0.0)
            } else {
                ((fx.floor() as usize).min(tiles_x - 1), fx.fract())
            };
            let tx1 = (tx0 + 1).min(tiles_x - 1);

            let v = plane[y * width + x] as usize;
            let v00 = luts[ty0 * tiles_x + tx0][v] as f32;
            let v10 = luts[ty0 * tiles_x + tx1][v] as f32;
            let v01 = luts[ty1 * tiles_x + tx0][v] as f32;
            let v11 = luts[ty1 * tiles_x + tx1][v] as f32;

            let top = v00 + wx * (v10 - v00);
            let bottom = v01 + wx * (v11 - v01);
            out[y * width + x] = (top + wy * (bottom - top)).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn clip_histogram(hist: &mut [u32; 256], clip_limit: f32, n_pixels: u32) {
    if clip_limit <= 0.0 {
        return;
    }
    let limit = ((clip_limit * n_pixels as f32 / 256.0).max(1.0)) as u32;
    let mut excess = 0u32;
    for h in hist.iter_mut() {
        if *h > limit {
            excess += *h - limit;
            *h = limit;
        }
    }
    // Redistribute the clipped mass uniformly; the remainder goes bin by bin.
    let per_bin = excess / 256;
    let mut leftover = excess % 256;
    for h in hist.iter_mut() {
        *h += per_bin;
        if leftover > 0 {
            *h += 1;
            leftover -= 1;
        }
    }
}

/// Enhance local contrast in the lightness channel only: RGB -> L*a*b*,
/// CLAHE on L, back to RGB. Hue is untouched.
pub(crate) fn enhance_lightness(src: &RgbImageView<'_>, params: &ClaheParams) -> RgbBuffer {
    let n = src.width * src.height;
    let mut l_plane = vec![0u8; n];
    let mut a_plane = vec![0.0f32; n];
    let mut b_plane = vec![0.0f32; n];

    for (i, px) in src.data.chunks_exact(3).enumerate() {
        let (l, a, b) = rgb_to_lab(px[0], px[1], px[2]);
        l_plane[i] = (l * 2.55).round().clamp(0.0, 255.0) as u8;
        a_plane[i] = a;
        b_plane[i] = b;
    }

    let l_eq = clahe_plane(&l_plane, src.width, src.height, params);

    let mut out = RgbBuffer::new(src.width, src.height);
    for i in 0..n {
        let l = l_eq[i] as f32 / 2.55;
        let (r, g, b) = lab_to_rgb(l, a_plane[i], b_plane[i]);
        out.data[3 * i] = r;
        out.data[3 * i + 1] = g;
        out.data[3 * i + 2] = b;
    }
    out
}

/// Per-channel CLAHE, used by the rgb segmentation mode.
pub(crate) fn enhance_channels(src: &RgbImageView<'_>, params: &ClaheParams) -> [Vec<u8>; 3] {
    let n = src.width * src.height;
    let mut channels = [vec![0u8; n], vec![0u8; n], vec![0u8; n]];
    for (i, px) in src.data.chunks_exact(3).enumerate() {
        channels[0][i] = px[0];
        channels[1][i] = px[1];
        channels[2][i] = px[2];
    }
    channels.map(|c| clahe_plane(&c, src.width, src.height, params))
}

// ---- sRGB <-> CIE L*a*b* (D65) ----

fn srgb_to_linear(v: u8) -> f32 {
    let v = v as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(v: f32) -> u8 {
    let v = if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    };
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

const XN: f32 = 0.950_47;
const YN: f32 = 1.0;
const ZN: f32 = 1.088_83;

fn lab_f(t: f32) -> f32 {
    const DELTA3: f32 = 0.008_856_452; // (6/29)^3
    if t > DELTA3 {
        t.cbrt()
    } else {
        t / 0.128_418_55 + 4.0 / 29.0 // t / (3 * (6/29)^2)
    }
}

fn lab_f_inv(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA {
        t * t * t
    } else {
        3.0 * DELTA * DELTA * (t - 4.0 / 29.0)
    }
}

fn rgb_to_lab(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (rl, gl, bl) = (srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b));

    let x = 0.4124 * rl + 0.3576 * gl + 0.1805 * bl;
    let y = 0.2126 * rl + 0.7152 * gl + 0.0722 * bl;
    let z = 0.0193 * rl + 0.1192 * gl + 0.9505 * bl;

    let (fx, fy, fz) = (lab_f(x / XN), lab_f(y / YN), lab_f(z / ZN));
    (116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

fn lab_to_rgb(l: f32, a: f32, b: f32) -> (u8, u8, u8) {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let x = XN * lab_f_inv(fx);
    let y = YN * lab_f_inv(fy);
    let z = ZN * lab_f_inv(fz);

    let rl = 3.240_45 * x - 1.537_14 * y - 0.498_53 * z;
    let gl = -0.969_26 * x + 1.875_99 * y + 0.041_56 * z;
    let bl = 0.055_65 * x - 0.204_04 * y + 1.057_22 * z;

    (
        linear_to_srgb(rl.max(0.0)),
        linear_to_srgb(gl.max(0.0)),
        linear_to_srgb(bl.max(0.0)),
    )
}
