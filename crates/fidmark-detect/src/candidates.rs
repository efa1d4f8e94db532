//! Quadrilateral candidate detection (threshold, contours, quad filtering).

use fidmark_core::GrayImageView;
use nalgebra::Point2;

use crate::contours::find_contours;
use crate::polygon::{
    approx_poly_dp, ensure_clockwise, is_convex_polygon, min_edge_length, perimeter,
};
use crate::threshold::adaptive_threshold;

/// An unverified quadrilateral found in the frame.
///
/// Corners wind clockwise in image coordinates; corner 0 is wherever the
/// contour trace started, the decoder fixes the rotation later.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub corners: [Point2<f32>; 4],
}

impl Candidate {
    /// Perimeter of the quad in pixels.
    pub fn perimeter(&self) -> f32 {
        perimeter(&self.corners)
    }

    /// Axis-aligned bounding box `(min, max)` of the corners.
    pub fn bounds(&self) -> (Point2<f32>, Point2<f32>) {
        let mut min = self.corners[0];
        let mut max = self.corners[0];
        for c in &self.corners[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        (min, max)
    }
}

/// Candidate detector configuration.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DetectorParams {
    /// Adaptive threshold window side in pixels (rounded up to odd).
    pub threshold_window: usize,
    /// Offset below the local mean for a pixel to count as marker ink.
    pub threshold_offset: i32,
    /// Contours shorter than this perimeter (pixels) are skipped.
    pub min_perimeter: f32,
    /// Contours longer than this perimeter (pixels) are skipped.
    pub max_perimeter: f32,
    /// Minimum quad side length in pixels.
    pub min_side: f32,
    /// Polygon approximation tolerance, relative to the contour perimeter.
    pub poly_epsilon_rel: f32,
    /// Mean corner distance below which two quads count as duplicates.
    pub min_quad_distance: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            threshold_window: 23,
            threshold_offset: 7,
            min_perimeter: 60.0,
            max_perimeter: 4000.0,
            min_side: 10.0,
            poly_epsilon_rel: 0.05,
            min_quad_distance: 10.0,
        }
    }
}

/// Find quadrilateral marker candidates in a grayscale frame.
///
/// Pure function of the input: identical pixels produce identical
/// candidates in identical order. Candidates appear in the raster order of
/// the first traced boundary pixel (top-to-bottom, then left-to-right);
/// the duplicate suppression pass keeps that ordering.
pub fn detect_candidates(frame: &GrayImageView<'_>, params: &DetectorParams) -> Vec<Candidate> {
    let binary = adaptive_threshold(frame, params.threshold_window, params.threshold_offset);
    let contours = find_contours(&binary.view());
    log::trace!("traced {} contours", contours.len());

    let mut quads = Vec::new();
    for contour in &contours {
        // Contour length in pixels approximates its perimeter; cheap
        // pre-filter before the polygon fit.
        let n = contour.points.len() as f32;
        if n < params.min_perimeter || n > 4.0 * params.max_perimeter {
            continue;
        }

        let epsilon = f64::from(params.poly_epsilon_rel) * contour.points.len() as f64;
        let poly = approx_poly_dp(&contour.points, epsilon);
        if poly.len() != 4 || !is_convex_polygon(&poly) {
            continue;
        }

        let mut corners = [
            Point2::new(poly[0].x as f32, poly[0].y as f32),
            Point2::new(poly[1].x as f32, poly[1].y as f32),
            Point2::new(poly[2].x as f32, poly[2].y as f32),
            Point2::new(poly[3].x as f32, poly[3].y as f32),
        ];

        if min_edge_length(&corners) < params.min_side {
            continue;
        }
        let quad_perimeter = perimeter(&corners);
        if quad_perimeter < params.min_perimeter || quad_perimeter > params.max_perimeter {
            continue;
        }

        ensure_clockwise(&mut corners);
        quads.push(Candidate { corners });
    }

    let survivors = suppress_duplicates(quads, params.min_quad_distance);
    log::debug!("{} quad candidates", survivors.len());
    survivors
}

/// Drop quads whose corners nearly coincide with a larger quad's corners.
///
/// Nested border traces of the same marker produce such pairs; the larger
/// perimeter wins because the outer trace carries the full border.
fn suppress_duplicates(quads: Vec<Candidate>, min_distance: f32) -> Vec<Candidate> {
    let n = quads.len();
    let mut dropped = vec![false; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let mut dist_sq = 0.0;
            for k in 0..4 {
                let d = quads[i].corners[k] - quads[j].corners[k];
                dist_sq += d.norm_squared();
            }
            if dist_sq / 4.0 < min_distance * min_distance {
                if quads[i].perimeter() < quads[j].perimeter() {
                    dropped[i] = true;
                } else {
                    dropped[j] = true;
                }
            }
        }
    }

    quads
        .into_iter()
        .zip(dropped)
        .filter_map(|(q, drop)| (!drop).then_some(q))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fidmark_core::GrayImage;

    /// White frame with one filled black square.
    fn frame_with_square(x0: usize, y0: usize, side: usize) -> GrayImage {
        let width = 160;
        let height = 120;
        let mut data = vec![255u8; width * height];
        for y in y0..(y0 + side) {
            for x in x0..(x0 + side) {
                data[y * width + x] = 0;
            }
        }
        GrayImage {
            width,
            height,
            data,
        }
    }

    #[test]
    fn filled_square_yields_outer_quad_first() {
        // The adaptive threshold keeps only pixels darker than their local
        // mean, so a large filled square binarizes to a ring: an outer quad
        // plus an inner hole quad. The outer trace is discovered first.
        let img = frame_with_square(40, 30, 48);
        let candidates = detect_candidates(&img.view(), &DetectorParams::default());
        assert_eq!(candidates.len(), 2);

        let (min, max) = candidates[0].bounds();
        assert!((min.x - 40.0).abs() < 3.0, "min.x = {}", min.x);
        assert!((min.y - 30.0).abs() < 3.0, "min.y = {}", min.y);
        assert!((max.x - 87.0).abs() < 3.0, "max.x = {}", max.x);
        assert!((max.y - 77.0).abs() < 3.0, "max.y = {}", max.y);

        let (inner_min, inner_max) = candidates[1].bounds();
        assert!(inner_min.x > min.x && inner_max.x < max.x);
        assert!(inner_min.y > min.y && inner_max.y < max.y);
    }

    #[test]
    fn corners_wind_clockwise() {
        let img = frame_with_square(40, 30, 48);
        let candidates = detect_candidates(&img.view(), &DetectorParams::default());
        let c = &candidates[0].corners;
        let cross = (c[1].x - c[0].x) * (c[2].y - c[0].y) - (c[1].y - c[0].y) * (c[2].x - c[0].x);
        assert!(cross > 0.0);
    }

    #[test]
    fn small_squares_are_rejected() {
        let img = frame_with_square(40, 30, 8);
        let candidates = detect_candidates(&img.view(), &DetectorParams::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn blank_frame_yields_nothing() {
        let img = GrayImage {
            width: 64,
            height: 64,
            data: vec![255u8; 64 * 64],
        };
        assert!(detect_candidates(&img.view(), &DetectorParams::default()).is_empty());
    }

    #[test]
    fn candidates_are_ordered_top_to_bottom() {
        let width = 200;
        let height = 200;
        let mut data = vec![255u8; width * height];
        for (x0, y0) in [(120usize, 20usize), (20, 120)] {
            for y in y0..(y0 + 40) {
                for x in x0..(x0 + 40) {
                    data[y * width + x] = 0;
                }
            }
        }
        let img = GrayImage {
            width,
            height,
            data,
        };

        let candidates = detect_candidates(&img.view(), &DetectorParams::default());
        assert_eq!(candidates.len(), 4, "outer + hole quad per square");
        let ys: Vec<f32> = candidates.iter().map(|c| c.bounds().0.y).collect();
        let mut sorted = ys.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ys, sorted, "discovery order follows the raster scan");
    }

    #[test]
    fn detection_is_deterministic() {
        let img = frame_with_square(52, 41, 37);
        let a = detect_candidates(&img.view(), &DetectorParams::default());
        let b = detect_candidates(&img.view(), &DetectorParams::default());
        assert_eq!(a, b);
    }
}
