//! Separable 2D type-II DCT on small square blocks.
//!
//! Hash blocks are 32x32, so the naive O(n^3) transform with a precomputed
//! cosine table is both simple and fast enough; pulling in an FFT crate for
//! a one-kiloflop transform would be all dependency and no gain.

use std::f32::consts::PI;

/// Precomputed `cos(pi * (2x + 1) * u / (2n))` table for one block size.
pub(crate) struct CosTable {
    n: usize,
    table: Vec<f32>,
}

impl CosTable {
    pub(crate) fn new(n: usize) -> Self {
        let mut table = vec![0.0f32; n * n];
        for u in 0..n {
            for x in 0..n {
                table[u * n + x] = (PI * (2 * x + 1) as f32 * u as f32 / (2 * n) as f32).cos();
            }
        }
        Self { n, table }
    }

    #[inline]
    fn at(&self, u: usize, x: usize) -> f32 {
        self.table[u * self.n + x]
    }
}

/// In-place 2D DCT-II of an `n x n` row-major block (row transform, then
/// column transform). Scaling factors are irrelevant downstream: the hash
/// only compares coefficients against their median.
pub(crate) fn dct_2d(block: &mut [f32], cos: &CosTable) {
    let n = cos.n;
    debug_assert_eq!(block.len(), n * n);

    let mut scratch = vec![0.0f32; n];

    // Rows.
    for row in block.chunks_exact_mut(n) {
        for (u, s) in scratch.iter_mut().enumerate() {
            *s = row.iter().enumerate().map(|(x, &v)| v * cos.at(u, x)).sum();
        }
        row.copy_from_slice(&scratch);
    }

    // Columns.
    for col in 0..n {
        for (u, s) in scratch.iter_mut().enumerate() {
            *s = (0..n).map(|y| block[y * n + col] * cos.at(u, y)).sum();
        }
        for (y, &s) in scratch.iter().enumerate() {
            block[y * n + col] = s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constant_block_has_only_dc() {
        let cos = CosTable::new(4);
        let mut block = vec![1.0f32; 16];
        dct_2d(&mut block, &cos);
        assert_relative_eq!(block[0], 16.0, epsilon = 1e-4);
        for &c in &block[1..] {
            assert_relative_eq!(c, 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn horizontal_cosine_lands_in_one_bin() {
        let n = 8;
        let cos = CosTable::new(n);
        let mut block = vec![0.0f32; n * n];
        for y in 0..n {
            for x in 0..n {
                block[y * n + x] = (PI * (2 * x + 1) as f32 * 3.0 / (2 * n) as f32).cos();
            }
        }
        dct_2d(&mut block, &cos);
        // Energy concentrates at (u, v) = (3, 0); everything else is ~0.
        let peak = block[3].abs();
        for (i, &c) in block.iter().enumerate() {
            if i == 3 {
                assert!(peak > 1.0);
            } else {
                assert!(c.abs() < 1e-3, "coefficient {i} = {c}");
            }
        }
    }
}
