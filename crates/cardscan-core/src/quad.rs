//! Polygon simplification and minimum-area enclosing quadrilaterals.
//!
//! Thresholded card outlines come out as noisy 5-10 sided rings. The fitter
//! first collapses short edges, then searches the remaining edge set for the
//! tightest four-sided enclosure of the shape.

use nalgebra::Point2;

use crate::geometry::{
    contains_polygon, line_intersection, polygon_area, polygon_perimeter, scale_polygon,
};

/// Shrink applied to the polygon before the enclosure test, so candidate
/// quads with an edge coincident with a polygon edge still count as
/// enclosing despite float ties.
const ENCLOSE_SHRINK: f32 = 0.9999;

/// Collapse short edges until at most four vertices remain or the shortest
/// edge is no longer short relative to the perimeter.
///
/// Each step removes the current shortest edge by replacing its two
/// endpoints with the intersection of the two neighbouring edges extended as
/// lines. Stops early when those neighbours are parallel or when `max_iter`
/// is exhausted.
pub fn simplify_polygon(
    poly: &[Point2<f32>],
    length_cutoff: f32,
    max_iter: Option<usize>,
) -> Vec<Point2<f32>> {
    let mut ring = poly.to_vec();
    let mut steps = 0usize;

    while ring.len() > 4 {
        if max_iter.is_some_and(|cap| steps >= cap) {
            break;
        }
        let perimeter = polygon_perimeter(&ring);
        let n = ring.len();

        let (shortest, shortest_len) = (0..n)
            .map(|i| (i, (ring[(i + 1) % n] - ring[i]).norm()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));

        if shortest_len >= length_cutoff * perimeter {
            break;
        }

        // Neighbouring edges of the doomed edge (i -> i+1), as infinite lines.
        let prev0 = ring[(shortest + n - 1) % n];
        let prev1 = ring[shortest];
        let next0 = ring[(shortest + 1) % n];
        let next1 = ring[(shortest + 2) % n];
        let Some(junction) = line_intersection(prev0, prev1, next0, next1) else {
            break;
        };

        let removed = (shortest + 1) % n;
        let mut next_ring = Vec::with_capacity(n - 1);
        for (k, &v) in ring.iter().enumerate() {
            if k == removed {
                continue;
            }
            if k == shortest {
                next_ring.push(junction);
            } else {
                next_ring.push(v);
            }
        }
        ring = next_ring;
        steps += 1;
    }

    ring
}

/// Minimum-area quadrilateral whose sides lie on four of the polygon's
/// edges (extended as lines) and which encloses the polygon.
///
/// Enumerates every unordered 4-subset of edges; a candidate is rejected if
/// any pair of consecutive chosen edges is parallel or if the quad fails to
/// enclose a slightly shrunken copy of the polygon. `None` when no subset
/// survives.
pub fn min_area_enclosing_quad(poly: &[Point2<f32>]) -> Option<[Point2<f32>; 4]> {
    let n = poly.len();
    if n < 4 {
        return None;
    }

    let shrunk = scale_polygon(poly, ENCLOSE_SHRINK);
    let edge = |i: usize| (poly[i], poly[(i + 1) % n]);

    let mut best: Option<([Point2<f32>; 4], f32)> = None;
    for i in 0..n.saturating_sub(3) {
        for j in (i + 1)..n.saturating_sub(2) {
            for k in (j + 1)..n.saturating_sub(1) {
                for l in (k + 1)..n {
                    let Some(quad) = quad_from_edges(edge(i), edge(j), edge(k), edge(l)) else {
                        continue;
                    };
                    if !contains_polygon(&quad, &shrunk) {
                        continue;
                    }
                    let area = polygon_area(&quad);
                    if best.is_none_or(|(_, best_area)| area < best_area) {
                        best = Some((quad, area));
                    }
                }
            }
        }
    }

    best.map(|(quad, _)| quad)
}

type Edge = (Point2<f32>, Point2<f32>);

fn quad_from_edges(a: Edge, b: Edge, c: Edge, d: Edge) -> Option<[Point2<f32>; 4]> {
    Some([
        line_intersection(a.0, a.1, b.0, b.1)?,
        line_intersection(b.0, b.1, c.0, c.1)?,
        line_intersection(c.0, c.1, d.0, d.1)?,
        line_intersection(d.0, d.1, a.0, a.1)?,
    ])
}
