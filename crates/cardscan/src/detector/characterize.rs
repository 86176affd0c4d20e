//! Contour characterization: is this outline a card, and if so, which quad
//! bounds it?

use log::debug;
use nalgebra::Point2;

use cardscan_core::{geometry, min_area_enclosing_quad, simplify_polygon};

use crate::params::DetectorParams;

/// How far toward the quad corner the corner-region boundary sits.
const CORNER_REGION: f32 = 0.9;

/// Outcome of characterizing one contour.
pub(crate) struct Characterization {
    /// False once contours have shrunk below the size floor; since they are
    /// processed largest-first, nothing worth examining remains.
    pub continue_pass: bool,
    pub accepted: Option<AcceptedQuad>,
}

pub(crate) struct AcceptedQuad {
    pub quad: [Point2<f32>; 4],
    /// Shrink applied to the quad before rectification, trimming background
    /// bleed at rounded corners.
    pub crop_factor: f32,
}

impl Characterization {
    fn skip() -> Self {
        Self {
            continue_pass: true,
            accepted: None,
        }
    }

    fn stop() -> Self {
        Self {
            continue_pass: false,
            accepted: None,
        }
    }
}

pub(crate) fn characterize_contour(
    contour: &[Point2<f32>],
    max_segment_area: f32,
    image_area: f32,
    params: &DetectorParams,
) -> Characterization {
    let hull = geometry::convex_hull(contour);
    let hull_area = geometry::polygon_area(&hull);
    if hull_area < (0.1 * max_segment_area).max(image_area / 1000.0) {
        return Characterization::stop();
    }

    let simplified = simplify_polygon(&hull, params.length_cutoff, None);
    let Some(quad) = min_area_enclosing_quad(&simplified) else {
        debug!("no enclosing quad for {}-gon, skipping contour", simplified.len());
        return Characterization::skip();
    };

    let Some(corner_diff) = quad_corner_diff(&hull, &quad) else {
        debug!("degenerate corner regions, skipping contour");
        return Characterization::skip();
    };
    let crop_factor = (1.0 - params.crop_slope * corner_diff).min(1.0);

    let quad_area = geometry::polygon_area(&quad);
    let form_factor = geometry::form_factor(&quad);

    let size_ok = quad_area > 0.1 * max_segment_area && quad_area < 0.99 * image_area;
    let corners_ok = corner_diff < params.max_corner_diff;
    let shape_ok = form_factor > params.form_factor_min && form_factor < params.form_factor_max;

    if size_ok && corners_ok && shape_ok {
        Characterization {
            continue_pass: true,
            accepted: Some(AcceptedQuad { quad, crop_factor }),
        }
    } else {
        debug!(
            "quad rejected: area_frac={:.3} corner_diff={:.3} form_factor={:.3}",
            quad_area / image_area,
            corner_diff,
            form_factor
        );
        Characterization::skip()
    }
}

/// Fraction of the quad's four corner regions the hull fails to cover.
///
/// Each corner region is the triangle cut off by a line through the point
/// 90% of the way from centre to corner, orthogonal to the corner-centre
/// direction. Card shapes fill their corners almost fully; rounded blobs
/// and ellipses leave them empty.
fn quad_corner_diff(hull: &[Point2<f32>], quad: &[Point2<f32>; 4]) -> Option<f32> {
    let center = geometry::centroid(quad);

    let mut corner_area = 0.0f32;
    let mut covered_area = 0.0f32;
    for i in 0..4 {
        let corner = quad[i];
        let prev = quad[(i + 3) % 4];
        let next = quad[(i + 1) % 4];

        // Boundary line: through the interior point near the corner,
        // orthogonal to corner -> centre.
        let interior = Point2::new(
            center.x + CORNER_REGION * (corner.x - center.x),
            center.y + CORNER_REGION * (corner.y - center.y),
        );
        let across = Point2::new(
            interior.x - (center.y - corner.y),
            interior.y + (center.x - corner.x),
        );

        let e1 = geometry::line_intersection(interior, across, prev, corner)?;
        let e2 = geometry::line_intersection(interior, across, corner, next)?;
        let triangle = [corner, e1, e2];

        corner_area += geometry::polygon_area(&triangle);
        covered_area += geometry::intersection_area(&triangle, hull);
    }

    if corner_area <= 0.0 {
        return None;
    }
    Some((1.0 - covered_area / corner_area).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rectangle(w: f32, h: f32) -> Vec<Point2<f32>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }

    /// Ring of points approximating an ellipse.
    fn ellipse(rx: f32, ry: f32) -> Vec<Point2<f32>> {
        (0..24)
            .map(|i| {
                let t = i as f32 / 24.0 * std::f32::consts::TAU;
                Point2::new(rx + rx * t.cos(), ry + ry * t.sin())
            })
            .collect()
    }

    #[test]
    fn card_shaped_rectangle_is_accepted() {
        let contour = rectangle(252.0, 352.0);
        let image_area = 640.0 * 480.0;
        let ch = characterize_contour(&contour, image_area, image_area, &DetectorParams::default());
        assert!(ch.continue_pass);
        let acc = ch.accepted.expect("accepted");
        // Sharp corners leave essentially nothing uncovered.
        assert!(acc.crop_factor > 0.97, "crop {}", acc.crop_factor);
    }

    #[test]
    fn square_fails_the_form_factor_window() {
        let contour = rectangle(300.0, 300.0);
        let image_area = 640.0 * 480.0;
        let ch = characterize_contour(&contour, image_area, image_area, &DetectorParams::default());
        assert!(ch.continue_pass);
        assert!(ch.accepted.is_none());
    }

    #[test]
    fn ellipse_fails_the_corner_test() {
        // Card-like aspect so only the corner criterion can reject it.
        let hull = geometry::convex_hull(&ellipse(126.0, 176.0));
        let simplified = simplify_polygon(&hull, 0.15, None);
        let quad = min_area_enclosing_quad(&simplified).expect("quad");
        let diff = quad_corner_diff(&hull, &quad).expect("diff");
        assert!(diff > 0.35, "ellipse corner diff {diff}");

        let ch = characterize_contour(
            &ellipse(126.0, 176.0),
            640.0 * 480.0,
            640.0 * 480.0,
            &DetectorParams::default(),
        );
        assert!(ch.continue_pass);
        assert!(ch.accepted.is_none());
    }

    #[test]
    fn tiny_contour_ends_the_pass() {
        let contour = rectangle(5.0, 7.0);
        let image_area = 640.0 * 480.0;
        let ch = characterize_contour(&contour, image_area, image_area, &DetectorParams::default());
        assert!(!ch.continue_pass);
        assert!(ch.accepted.is_none());
    }

    #[test]
    fn near_full_frame_quad_is_rejected_but_continues() {
        let contour = rectangle(638.0, 478.0);
        let image_area = 640.0 * 480.0;
        let ch = characterize_contour(&contour, image_area, image_area, &DetectorParams::default());
        assert!(ch.continue_pass);
        assert!(ch.accepted.is_none());
    }

    #[test]
    fn rectangle_corner_diff_is_near_zero() {
        let rect = rectangle(63.0, 88.0);
        let quad = [rect[0], rect[1], rect[2], rect[3]];
        let diff = quad_corner_diff(&rect, &quad).expect("diff");
        assert!(diff < 0.05, "rectangle corner diff {diff}");
    }
}
