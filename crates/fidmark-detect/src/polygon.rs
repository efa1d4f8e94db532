//! Polygonal approximation and quad geometry predicates.

use nalgebra::Point2;

/// Douglas-Peucker simplification of a closed contour.
///
/// The contour is split at its two mutually farthest vertices and each open
/// chain is simplified with the given perpendicular-distance tolerance (in
/// pixels). Vertex order is preserved.
pub fn approx_poly_dp(contour: &[Point2<i32>], epsilon: f64) -> Vec<Point2<i32>> {
    let n = contour.len();
    if n < 3 {
        return contour.to_vec();
    }

    // Split the loop at a diameter: farthest point from vertex 0, then the
    // farthest point from that one.
    let a = farthest_from(contour, 0);
    let b = farthest_from(contour, a);
    let (a, b) = if a < b { (a, b) } else { (b, a) };

    let mut out = Vec::new();
    simplify_chain(contour, a, b, epsilon, &mut out);
    simplify_chain_wrapping(contour, b, a, epsilon, &mut out);
    out
}

fn farthest_from(points: &[Point2<i32>], idx: usize) -> usize {
    let origin = points[idx];
    let mut best = idx;
    let mut best_d = -1.0f64;
    for (i, p) in points.iter().enumerate() {
        let dx = (p.x - origin.x) as f64;
        let dy = (p.y - origin.y) as f64;
        let d = dx * dx + dy * dy;
        if d > best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

/// Perpendicular distance of `p` from the line through `a` and `b`.
fn deviation(a: Point2<i32>, b: Point2<i32>, p: Point2<i32>) -> f64 {
    let ax = a.x as f64;
    let ay = a.y as f64;
    let dx = b.x as f64 - ax;
    let dy = b.y as f64 - ay;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-12 {
        let ex = p.x as f64 - ax;
        let ey = p.y as f64 - ay;
        return (ex * ex + ey * ey).sqrt();
    }
    ((p.y as f64 - ay) * dx - (p.x as f64 - ax) * dy).abs() / len
}

/// Simplify the open chain `points[start..=end]`, appending kept vertices
/// (excluding `end`, which the next chain owns).
fn simplify_chain(
    points: &[Point2<i32>],
    start: usize,
    end: usize,
    epsilon: f64,
    out: &mut Vec<Point2<i32>>,
) {
    let mut stack = vec![(start, end)];
    let mut keep = vec![false; points.len()];
    keep[start] = true;

    while let Some((s, e)) = stack.pop() {
        if e <= s + 1 {
            continue;
        }
        let mut max_d = -1.0;
        let mut split = s;
        for i in (s + 1)..e {
            let d = deviation(points[s], points[e], points[i]);
            if d > max_d {
                max_d = d;
                split = i;
            }
        }
        if max_d > epsilon {
            keep[split] = true;
            stack.push((s, split));
            stack.push((split, e));
        }
    }

    for (i, &k) in keep.iter().enumerate() {
        if k {
            out.push(points[i]);
        }
    }
}

/// Like [`simplify_chain`] but for the chain wrapping past the end of the
/// closed contour: `start .. len-1, 0 .. end`.
fn simplify_chain_wrapping(
    points: &[Point2<i32>],
    start: usize,
    end: usize,
    epsilon: f64,
    out: &mut Vec<Point2<i32>>,
) {
    let n = points.len();
    let chain: Vec<Point2<i32>> = (0..=(n - start + end))
        .map(|k| points[(start + k) % n])
        .collect();
    simplify_chain(&chain, 0, chain.len() - 1, epsilon, out);
}

/// Total edge length of a closed polygon.
pub fn perimeter(poly: &[Point2<f32>]) -> f32 {
    let n = poly.len();
    if n < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..n {
        let p = poly[i];
        let q = poly[(i + 1) % n];
        total += (q - p).norm();
    }
    total
}

/// Shortest edge of a closed polygon.
pub fn min_edge_length(poly: &[Point2<f32>]) -> f32 {
    let n = poly.len();
    if n < 2 {
        return 0.0;
    }
    let mut min_len = f32::INFINITY;
    for i in 0..n {
        let p = poly[i];
        let q = poly[(i + 1) % n];
        min_len = min_len.min((q - p).norm());
    }
    min_len
}

/// Strict convexity test for a closed polygon.
///
/// All successive edge cross products must share a sign; a zero cross
/// (collinear vertices) also fails, which rejects degenerate quads.
pub fn is_convex_polygon(poly: &[Point2<i32>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }

    let mut sign = 0i64;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let c = poly[(i + 2) % n];
        let cross = (b.x - a.x) as i64 * (c.y - b.y) as i64
            - (b.y - a.y) as i64 * (c.x - b.x) as i64;
        if cross == 0 {
            return false;
        }
        let s = cross.signum();
        if sign == 0 {
            sign = s;
        } else if s != sign {
            return false;
        }
    }
    true
}

/// Reorder quad corners in place so they wind clockwise in image
/// coordinates (y pointing down).
pub fn ensure_clockwise(corners: &mut [Point2<f32>; 4]) {
    let dx1 = corners[1].x - corners[0].x;
    let dy1 = corners[1].y - corners[0].y;
    let dx2 = corners[2].x - corners[0].x;
    let dy2 = corners[2].y - corners[0].y;

    if dx1 * dy2 - dy1 * dx2 < 0.0 {
        corners.swap(1, 3);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_noise() -> Vec<Point2<i32>> {
        // 20x20 square boundary, one vertex per pixel along each edge
        let mut pts = Vec::new();
        for x in 0..20 {
            pts.push(Point2::new(x, 0));
        }
        for y in 0..20 {
            pts.push(Point2::new(20, y));
        }
        for x in 0..20 {
            pts.push(Point2::new(20 - x, 20));
        }
        for y in 0..20 {
            pts.push(Point2::new(0, 20 - y));
        }
        pts
    }

    #[test]
    fn square_simplifies_to_four_vertices() {
        let poly = approx_poly_dp(&square_with_noise(), 2.0);
        assert_eq!(poly.len(), 4);
        for corner in [
            Point2::new(0, 0),
            Point2::new(20, 0),
            Point2::new(20, 20),
            Point2::new(0, 20),
        ] {
            assert!(
                poly.iter().any(|p| (p.x - corner.x).abs() <= 1 && (p.y - corner.y).abs() <= 1),
                "missing corner {corner:?} in {poly:?}"
            );
        }
    }

    #[test]
    fn convexity() {
        let square = [
            Point2::new(0, 0),
            Point2::new(10, 0),
            Point2::new(10, 10),
            Point2::new(0, 10),
        ];
        assert!(is_convex_polygon(&square));

        let dented = [
            Point2::new(0, 0),
            Point2::new(10, 0),
            Point2::new(5, 5),
            Point2::new(10, 10),
            Point2::new(0, 10),
        ];
        assert!(!is_convex_polygon(&dented));

        let collinear = [
            Point2::new(0, 0),
            Point2::new(5, 0),
            Point2::new(10, 0),
            Point2::new(0, 10),
        ];
        assert!(!is_convex_polygon(&collinear));
    }

    #[test]
    fn perimeter_and_min_edge() {
        let rect = [
            Point2::new(0.0f32, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert!((perimeter(&rect) - 12.0).abs() < 1e-6);
        assert!((min_edge_length(&rect) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn counter_clockwise_quads_get_flipped() {
        let mut ccw = [
            Point2::new(0.0f32, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 0.0),
        ];
        ensure_clockwise(&mut ccw);
        assert_eq!(ccw[1], Point2::new(10.0, 0.0));
        assert_eq!(ccw[3], Point2::new(0.0, 10.0));
    }
}
