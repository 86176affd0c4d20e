//! Four-point homography estimation and perspective warping.

use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector2, Vector3};

use crate::image::{sample_bilinear_rgb, RgbBuffer, RgbImageView};

/// A 3x3 projective transform between two image planes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let q = self.h * Vector3::new(f64::from(p.x), f64::from(p.y), 1.0);
        Point2::new((q.x / q.z) as f32, (q.y / q.z) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Similarity transform that recentres the four points on the origin and
/// rescales them to mean distance sqrt(2). Solving in conditioned
/// coordinates keeps the 8x8 system well-behaved for pixel-scale inputs.
fn conditioning_transform(pts: &[Point2<f32>; 4]) -> Matrix3<f64> {
    let mut mean = Vector2::zeros();
    for p in pts {
        mean += Vector2::new(f64::from(p.x), f64::from(p.y));
    }
    mean /= 4.0;

    let spread = pts
        .iter()
        .map(|p| (Vector2::new(f64::from(p.x), f64::from(p.y)) - mean).norm())
        .sum::<f64>()
        / 4.0;
    let k = if spread > 1e-12 {
        std::f64::consts::SQRT_2 / spread
    } else {
        1.0
    };

    Matrix3::new(
        k, 0.0, -k * mean.x, //
        0.0, k, -k * mean.y, //
        0.0, 0.0, 1.0,
    )
}

/// Apply an affine conditioning transform to one point.
#[inline]
fn condition(t: &Matrix3<f64>, p: Point2<f32>) -> (f64, f64) {
    let q = t * Vector3::new(f64::from(p.x), f64::from(p.y), 1.0);
    (q.x, q.y)
}

/// Compute H such that `dst ~ H * src`, from 4 point correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// for degenerate configurations (e.g. repeated or collinear corners).
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let t_src = conditioning_transform(src);
    let t_dst = conditioning_transform(dst);

    // Each correspondence (sx, sy) -> (dx, dy) pins h through
    //   dx * (h31 sx + h32 sy + 1) = h11 sx + h12 sy + h13
    //   dy * (h31 sx + h32 sy + 1) = h21 sx + h22 sy + h23
    // which is linear in the eight unknowns once h33 is fixed to 1.
    let mut coeffs = SMatrix::<f64, 8, 8>::zeros();
    let mut rhs = SVector::<f64, 8>::zeros();

    for (k, (s, d)) in src.iter().zip(dst).enumerate() {
        let (sx, sy) = condition(&t_src, *s);
        let (dx, dy) = condition(&t_dst, *d);

        let equations = [
            ([sx, sy, 1.0, 0.0, 0.0, 0.0, -dx * sx, -dx * sy], dx),
            ([0.0, 0.0, 0.0, sx, sy, 1.0, -dy * sx, -dy * sy], dy),
        ];
        for (j, (row, b)) in equations.iter().enumerate() {
            let r = 2 * k + j;
            for (c, &coeff) in row.iter().enumerate() {
                coeffs[(r, c)] = coeff;
            }
            rhs[r] = *b;
        }
    }

    let sol = coeffs.lu().solve(&rhs)?;
    let conditioned = Matrix3::new(
        sol[0], sol[1], sol[2], //
        sol[3], sol[4], sol[5], //
        sol[6], sol[7], 1.0,
    );

    // Undo the conditioning and rescale so h33 is 1 again.
    let h = t_dst.try_inverse()? * conditioned * t_src;
    let w = h[(2, 2)];
    if w.abs() < 1e-12 {
        return None;
    }
    Some(Homography::new(h / w))
}

/// Warp into a `out_w x out_h` canvas: each destination pixel is mapped
/// through `h_src_from_dst` and bilinearly sampled from `src`; samples
/// outside the source are black.
pub fn warp_perspective_rgb(
    src: &RgbImageView<'_>,
    h_src_from_dst: Homography,
    out_w: usize,
    out_h: usize,
) -> RgbBuffer {
    let mut out = RgbBuffer::new(out_w, out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            let p = h_src_from_dst.apply(Point2::new(x as f32, y as f32));
            let px = sample_bilinear_rgb(src, p.x, p.y);
            out.set_pixel(x, y, px);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f32>, b: Point2<f32>, tol: f32) {
        assert!(
            (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol,
            "expected ({:.4},{:.4}) ~ ({:.4},{:.4})",
            a.x,
            a.y,
            b.x,
            b.y
        );
    }

    #[test]
    fn four_point_recovers_known_transform() {
        let ground_truth = Homography::new(Matrix3::new(
            1.05, -0.08, 40.0, //
            0.03, 0.92, -15.0, //
            0.0007, 0.0002, 1.0,
        ));

        let corners = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(250.0_f32, 0.0),
            Point2::new(250.0_f32, 350.0),
            Point2::new(0.0_f32, 350.0),
        ];
        let mapped = corners.map(|p| ground_truth.apply(p));
        let recovered = homography_from_4pt(&corners, &mapped).expect("recoverable");

        for p in [
            Point2::new(10.0_f32, 20.0),
            Point2::new(125.0, 175.0),
            Point2::new(240.0, 330.0),
        ] {
            assert_close(recovered.apply(p), ground_truth.apply(p), 1e-3);
        }
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            0.95, 0.2, -8.0, //
            -0.1, 1.3, 22.0, //
            0.0004, -0.0008, 1.0,
        ));
        let inv = h.inverse().expect("invertible");
        for p in [Point2::new(5.0_f32, 7.0), Point2::new(280.0_f32, 140.0)] {
            assert_close(inv.apply(h.apply(p)), p, 1e-3);
        }
    }

    #[test]
    fn degenerate_corners_are_rejected() {
        let src = [Point2::new(2.0_f32, 2.0); 4];
        let dst = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(1.0_f32, 0.0),
            Point2::new(1.0_f32, 1.0),
            Point2::new(0.0_f32, 1.0),
        ];
        assert!(homography_from_4pt(&src, &dst).is_none());
    }

    #[test]
    fn identity_warp_copies_pixels() {
        let mut src = RgbBuffer::new(3, 2);
        src.set_pixel(1, 0, [10, 20, 30]);
        src.set_pixel(2, 1, [40, 50, 60]);
        let out = warp_perspective_rgb(&src.view(), Homography::new(Matrix3::identity()), 3, 2);
        assert_eq!(out.pixel(1, 0), [10, 20, 30]);
        assert_eq!(out.pixel(2, 1), [40, 50, 60]);
        assert_eq!(out.pixel(0, 0), [0, 0, 0]);
    }
}
