//! 2D polygon primitives used by the card detector.
//!
//! Polygons are plain `&[Point2<f32>]` rings in image coordinates (y grows
//! downward). All routines assume simple polygons; the convexity-sensitive
//! ones (`clip_convex`, `intersection_area`) additionally assume convex
//! inputs, which holds for the hulls and bounding quads the detector works
//! with.

use nalgebra::Point2;

/// Tolerance below which a cross product / determinant counts as parallel.
pub const PARALLEL_EPS: f32 = 1e-9;

/// Vertex mean of a polygon.
///
/// Returns the origin for an empty slice so callers can stay branch-free;
/// every detector call site guarantees at least three vertices.
pub fn centroid(poly: &[Point2<f32>]) -> Point2<f32> {
    if poly.is_empty() {
        return Point2::origin();
    }
    let n = poly.len() as f32;
    let (sx, sy) = poly
        .iter()
        .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point2::new(sx / n, sy / n)
}

/// Sort vertices by angle around the vertex centroid, ascending `atan2`.
///
/// The result is a consistently wound ring; which vertex comes first is
/// unspecified (downstream consumers must not attach meaning to it).
pub fn order_polygon_points(poly: &[Point2<f32>]) -> Vec<Point2<f32>> {
    let c = centroid(poly);
    let mut out = poly.to_vec();
    out.sort_by(|a, b| {
        let aa = (a.y - c.y).atan2(a.x - c.x);
        let ab = (b.y - c.y).atan2(b.x - c.x);
        aa.total_cmp(&ab)
    });
    out
}

/// Shoelace sum; positive when the ring is counter-clockwise in standard
/// (y-up) orientation.
pub fn signed_area(poly: &[Point2<f32>]) -> f32 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0f32;
    for (i, p) in poly.iter().enumerate() {
        let q = poly[(i + 1) % poly.len()];
        acc += p.x * q.y - q.x * p.y;
    }
    acc * 0.5
}

/// Absolute polygon area (Shoelace).
#[inline]
pub fn polygon_area(poly: &[Point2<f32>]) -> f32 {
    signed_area(poly).abs()
}

/// Sum of edge lengths.
pub fn polygon_perimeter(poly: &[Point2<f32>]) -> f32 {
    if poly.len() < 2 {
        return 0.0;
    }
    poly.iter()
        .enumerate()
        .map(|(i, p)| {
            let q = poly[(i + 1) % poly.len()];
            (q - p).norm()
        })
        .sum()
}

/// Length of the shortest edge.
pub fn min_edge_length(poly: &[Point2<f32>]) -> f32 {
    if poly.len() < 2 {
        return 0.0;
    }
    poly.iter()
        .enumerate()
        .map(|(i, p)| {
            let q = poly[(i + 1) % poly.len()];
            (q - p).norm()
        })
        .fold(f32::INFINITY, f32::min)
}

/// Shape statistic `area / (perimeter * shortest_edge)`.
///
/// A rectangle with aspect ratio r (long:short = 1:r, r <= 1) scores
/// `r / (2 * (1 + r))`; Magic cards (63 x 88 mm) land near 0.29.
pub fn form_factor(poly: &[Point2<f32>]) -> f32 {
    let per = polygon_perimeter(poly);
    let min_edge = min_edge_length(poly);
    if per <= 0.0 || min_edge <= 0.0 {
        return 0.0;
    }
    polygon_area(poly) / (per * min_edge)
}

/// Intersection of the infinite lines through `(a0, a1)` and `(b0, b1)`.
///
/// `None` when the lines are parallel (determinant below [`PARALLEL_EPS`]).
pub fn line_intersection(
    a0: Point2<f32>,
    a1: Point2<f32>,
    b0: Point2<f32>,
    b1: Point2<f32>,
) -> Option<Point2<f32>> {
    let (x1, y1, x2, y2) = (a0.x, a0.y, a1.x, a1.y);
    let (x3, y3, x4, y4) = (b0.x, b0.y, b1.x, b1.y);

    let det = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if det.abs() < PARALLEL_EPS {
        return None;
    }

    let d1 = x1 * y2 - y1 * x2;
    let d2 = x3 * y4 - y3 * x4;
    let px = (d1 * (x3 - x4) - (x1 - x2) * d2) / det;
    let py = (d1 * (y3 - y4) - (y1 - y2) * d2) / det;
    Some(Point2::new(px, py))
}

/// Ray-casting point-in-polygon test. Points exactly on an edge may land on
/// either side; callers that care shrink the tested ring first.
pub fn point_in_polygon(p: Point2<f32>, poly: &[Point2<f32>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (poly[i], poly[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let x_cross = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// All-vertices-inside containment test.
///
/// Exact only for convex `inner`; the detector only ever asks about convex
/// hulls and quads, where vertex containment implies polygon containment
/// given a convex `outer`.
pub fn contains_polygon(outer: &[Point2<f32>], inner: &[Point2<f32>]) -> bool {
    !inner.is_empty() && inner.iter().all(|&p| point_in_polygon(p, outer))
}

/// Scale a polygon about its centroid.
pub fn scale_polygon(poly: &[Point2<f32>], factor: f32) -> Vec<Point2<f32>> {
    let c = centroid(poly);
    poly.iter()
        .map(|p| Point2::new(c.x + (p.x - c.x) * factor, c.y + (p.y - c.y) * factor))
        .collect()
}

/// Convex hull by Andrew's monotone chain, collinear points dropped.
///
/// Output winds counter-clockwise in standard (y-up) orientation.
pub fn convex_hull(points: &[Point2<f32>]) -> Vec<Point2<f32>> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| a.x == b.x && a.y == b.y);
    let n = pts.len();
    if n < 3 {
        return pts;
    }

    let cross = |o: Point2<f32>, a: Point2<f32>, b: Point2<f32>| {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    };

    let mut hull: Vec<Point2<f32>> = Vec::with_capacity(2 * n);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Sutherland-Hodgman clip of a convex `subject` against a convex `clip`
/// ring. Returns the intersection polygon (possibly empty).
pub fn clip_convex(subject: &[Point2<f32>], clip: &[Point2<f32>]) -> Vec<Point2<f32>> {
    if subject.len() < 3 || clip.len() < 3 {
        return Vec::new();
    }

    // Orient the clip ring counter-clockwise so "inside" is a fixed side.
    let clip_ccw: Vec<Point2<f32>> = if signed_area(clip) < 0.0 {
        clip.iter().rev().copied().collect()
    } else {
        clip.to_vec()
    };

    let inside = |p: Point2<f32>, e0: Point2<f32>, e1: Point2<f32>| {
        (e1.x - e0.x) * (p.y - e0.y) - (e1.y - e0.y) * (p.x - e0.x) >= 0.0
    };

    let mut output = subject.to_vec();
    for i in 0..clip_ccw.len() {
        let e0 = clip_ccw[i];
        let e1 = clip_ccw[(i + 1) % clip_ccw.len()];
        let input = std::mem::take(&mut output);
        if input.is_empty() {
            break;
        }
        let mut prev = input[input.len() - 1];
        for &cur in &input {
            let cur_in = inside(cur, e0, e1);
            let prev_in = inside(prev, e0, e1);
            if cur_in {
                if !prev_in {
                    if let Some(x) = line_intersection(prev, cur, e0, e1) {
                        output.push(x);
                    }
                }
                output.push(cur);
            } else if prev_in {
                if let Some(x) = line_intersection(prev, cur, e0, e1) {
                    output.push(x);
                }
            }
            prev = cur;
        }
    }
    output
}

/// Area of the intersection of two convex polygons.
#[inline]
pub fn intersection_area(a: &[Point2<f32>], b: &[Point2<f32>]) -> f32 {
    polygon_area(&clip_convex(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x: f32, y: f32, side: f32) -> Vec<Point2<f32>> {
        vec![
            Point2::new(x, y),
            Point2::new(x + side, y),
            Point2::new(x + side, y + side),
            Point2::new(x, y + side),
        ]
    }

    #[test]
    fn shoelace_area_of_square() {
        assert_relative_eq!(polygon_area(&square(2.0, 3.0, 4.0)), 16.0);
    }

    #[test]
    fn perimeter_and_min_edge() {
        let rect = vec![
            Point2::new(0.0, 0.0),
            Point2::new(6.0, 0.0),
            Point2::new(6.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert_relative_eq!(polygon_perimeter(&rect), 16.0);
        assert_relative_eq!(min_edge_length(&rect), 2.0);
    }

    #[test]
    fn form_factor_of_card_shaped_rectangle() {
        let rect = vec![
            Point2::new(0.0, 0.0),
            Point2::new(63.0, 0.0),
            Point2::new(63.0, 88.0),
            Point2::new(0.0, 88.0),
        ];
        let ff = form_factor(&rect);
        assert!(ff > 0.25 && ff < 0.33, "got {ff}");
    }

    #[test]
    fn ordering_produces_a_ring() {
        let scrambled = vec![
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(10.0, 10.0),
        ];
        let ordered = order_polygon_points(&scrambled);
        // A properly wound square has the full area; a "bow tie" would not.
        assert_relative_eq!(polygon_area(&ordered), 100.0);
    }

    #[test]
    fn intersection_of_crossing_lines() {
        let p = line_intersection(
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
            Point2::new(2.0, 0.0),
        )
        .expect("not parallel");
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn parallel_lines_do_not_intersect() {
        assert!(line_intersection(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn point_in_polygon_basics() {
        let sq = square(0.0, 0.0, 10.0);
        assert!(point_in_polygon(Point2::new(5.0, 5.0), &sq));
        assert!(!point_in_polygon(Point2::new(15.0, 5.0), &sq));
        assert!(!point_in_polygon(Point2::new(-1.0, -1.0), &sq));
    }

    #[test]
    fn containment_of_nested_squares() {
        let outer = square(0.0, 0.0, 10.0);
        let inner = square(2.0, 2.0, 4.0);
        assert!(contains_polygon(&outer, &inner));
        assert!(!contains_polygon(&inner, &outer));
    }

    #[test]
    fn hull_of_square_with_interior_noise() {
        let mut pts = square(0.0, 0.0, 10.0);
        pts.push(Point2::new(5.0, 5.0));
        pts.push(Point2::new(3.0, 7.0));
        pts.push(Point2::new(5.0, 0.0)); // collinear on an edge
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert_relative_eq!(polygon_area(&hull), 100.0);
    }

    #[test]
    fn scaling_shrinks_area_quadratically() {
        let sq = square(0.0, 0.0, 10.0);
        let half = scale_polygon(&sq, 0.5);
        assert_relative_eq!(polygon_area(&half), 25.0, epsilon = 1e-4);
        // Centroid stays put.
        let c = centroid(&half);
        assert_relative_eq!(c.x, 5.0, epsilon = 1e-5);
        assert_relative_eq!(c.y, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn clip_of_offset_squares() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(5.0, 5.0, 10.0);
        assert_relative_eq!(intersection_area(&a, &b), 25.0, epsilon = 1e-3);
        // Winding of the clip ring must not matter.
        let b_cw: Vec<_> = b.iter().rev().copied().collect();
        assert_relative_eq!(intersection_area(&a, &b_cw), 25.0, epsilon = 1e-3);
    }

    #[test]
    fn clip_of_disjoint_squares_is_empty() {
        let a = square(0.0, 0.0, 4.0);
        let b = square(10.0, 10.0, 4.0);
        assert_relative_eq!(intersection_area(&a, &b), 0.0);
    }
}
