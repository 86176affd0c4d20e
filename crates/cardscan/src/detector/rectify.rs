//! Four-point perspective rectification of a detected quad.

use nalgebra::Point2;

use cardscan_core::{
    geometry, homography_from_4pt, warp_perspective_rgb, RgbBuffer, RgbImageView,
};

/// Warp the region inside `quad` to an axis-aligned canvas.
///
/// Vertices are ordered by angle around their centroid, which fixes the
/// winding but not which corner ends up top-left; the recognizer compensates
/// by searching all four cardinal rotations. Returns `None` for degenerate
/// quads.
pub(crate) fn rectify_segment(
    src: &RgbImageView<'_>,
    quad: &[Point2<f32>; 4],
) -> Option<RgbBuffer> {
    let ordered = geometry::order_polygon_points(quad);
    let [v0, v1, v2, v3] = [ordered[0], ordered[1], ordered[2], ordered[3]];

    let width = (v1 - v0).norm().max((v2 - v3).norm()).round().max(1.0) as usize;
    let height = (v3 - v0).norm().max((v2 - v1).norm()).round().max(1.0) as usize;

    let dst = [
        Point2::new(0.0, 0.0),
        Point2::new(width as f32 - 1.0, 0.0),
        Point2::new(width as f32 - 1.0, height as f32 - 1.0),
        Point2::new(0.0, height as f32 - 1.0),
    ];

    let h_src_from_dst = homography_from_4pt(&dst, &[v0, v1, v2, v3])?;
    Some(warp_perspective_rgb(src, h_src_from_dst, width, height))
}
