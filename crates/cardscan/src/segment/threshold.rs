//! Binary thresholding: fixed-level and adaptive Gaussian.

/// Fixed threshold: foreground where `pixel > level`.
pub(crate) fn threshold_fixed(plane: &[u8], level: u8) -> Vec<u8> {
    plane.iter().map(|&v| u8::from(v > level)).collect()
}

/// Adaptive Gaussian threshold: foreground where the pixel exceeds the
/// Gaussian-weighted local mean minus `offset`.
///
/// The window follows the image scale: `1 + 2 * (min(w, h) / 20)`, which is
/// odd by construction and spans roughly a tenth of the short side.
pub(crate) fn threshold_adaptive(plane: &[u8], width: usize, height: usize, offset: f32) -> Vec<u8> {
    let window = 1 + 2 * (width.min(height) / 20);
    let mean = gaussian_blur(plane, width, height, window);
    plane
        .iter()
        .zip(&mean)
        .map(|(&v, &m)| u8::from(v as f32 > m - offset))
        .collect()
}

/// Separable Gaussian blur with clamp-to-edge borders.
fn gaussian_blur(plane: &[u8], width: usize, height: usize, ksize: usize) -> Vec<f32> {
    let kernel = gaussian_kernel(ksize);
    let r = (ksize / 2) as isize;

    // Horizontal pass.
    let mut tmp = vec![0.0f32; width * height];
    for y in 0..height {
        let row = &plane[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + k as isize - r).clamp(0, width as isize - 1) as usize;
                acc += row[sx] as f32 * kv;
            }
            tmp[y * width + x] = acc;
        }
    }

    // Vertical pass.
    let mut out = vec![0.0f32; width * height];
    for x in 0..width {
        for y in 0..height {
            let mut acc = 0.0f32;
            for (k, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - r).clamp(0, height as isize - 1) as usize;
                acc += tmp[sy * width + x] * kv;
            }
            out[y * width + x] = acc;
        }
    }
    out
}

fn gaussian_kernel(ksize: usize) -> Vec<f32> {
    let ksize = ksize.max(1) | 1;
    // Sigma-from-kernel-size rule used by the usual CV toolkits.
    let sigma = 0.3 * ((ksize - 1) as f32 * 0.5 - 1.0) + 0.8;
    let r = (ksize / 2) as isize;

    let mut kernel: Vec<f32> = (-r..=r)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}
