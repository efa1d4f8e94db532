//! Sub-pixel corner refinement on the original grayscale frame.

use fidmark_core::{sample_gradient, GrayImageView};
use nalgebra::Point2;

use crate::decode::DecodedMarker;

/// Refinement configuration.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RefineParams {
    /// Half-size of the search window in pixels.
    pub window_radius: i32,
    /// Iteration cap.
    pub max_iterations: usize,
    /// Stop once an update moves the corner less than this (pixels).
    pub epsilon: f32,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            window_radius: 4,
            max_iterations: 30,
            epsilon: 0.05,
        }
    }
}

/// Refine one corner to sub-pixel accuracy.
///
/// Classic gradient-normal iteration: every window sample contributes the
/// constraint `g . (q - p) = 0` (a point on an edge sees the corner along
/// its gradient normal), and the weighted normal equations are re-solved
/// around each new estimate until the update stalls. The estimate is
/// discarded (original point returned) if it drifts out of the window,
/// which keeps refinement idempotent: a refined corner re-enters the loop
/// already at its fixpoint.
pub fn refine_corner(
    frame: &GrayImageView<'_>,
    corner: Point2<f32>,
    params: &RefineParams,
) -> Point2<f32> {
    let r = params.window_radius;
    let sigma = r as f32 * 0.5;
    let inv_two_sigma_sq = 1.0 / (2.0 * sigma * sigma);

    let mut q = corner;
    for _ in 0..params.max_iterations {
        let mut a11 = 0.0f64;
        let mut a12 = 0.0f64;
        let mut a22 = 0.0f64;
        let mut b1 = 0.0f64;
        let mut b2 = 0.0f64;

        for dy in -r..=r {
            for dx in -r..=r {
                let px = q.x + dx as f32;
                let py = q.y + dy as f32;
                let (gx, gy) = sample_gradient(frame, px, py);
                let w = (-((dx * dx + dy * dy) as f32) * inv_two_sigma_sq).exp() as f64;

                let gx = gx as f64;
                let gy = gy as f64;
                a11 += w * gx * gx;
                a12 += w * gx * gy;
                a22 += w * gy * gy;
                b1 += w * (gx * gx * px as f64 + gx * gy * py as f64);
                b2 += w * (gx * gy * px as f64 + gy * gy * py as f64);
            }
        }

        let det = a11 * a22 - a12 * a12;
        if det.abs() < 1e-9 {
            // Flat or single-edge window: nothing to solve.
            break;
        }

        let nx = ((a22 * b1 - a12 * b2) / det) as f32;
        let ny = ((a11 * b2 - a12 * b1) / det) as f32;
        let next = Point2::new(nx, ny);

        let shift = (next - q).norm();
        q = next;
        if shift < params.epsilon {
            break;
        }
    }

    let drift = (q - corner).norm();
    if drift > r as f32 {
        log::trace!("corner refinement drifted {drift:.1} px, keeping original");
        return corner;
    }
    q
}

/// Refine all corners of the accepted markers in place.
pub fn refine_corners(
    frame: &GrayImageView<'_>,
    markers: &mut [DecodedMarker],
    params: &RefineParams,
) {
    for marker in markers.iter_mut() {
        for corner in marker.corners.iter_mut() {
            *corner = refine_corner(frame, *corner, params);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fidmark_core::GrayImage;

    /// Dark square on a bright field; the top-left intensity saddle sits at
    /// (19.5, 19.5) between the last bright and first dark pixel.
    fn corner_image() -> GrayImage {
        let width = 64;
        let height = 64;
        let mut data = vec![255u8; width * height];
        for y in 20..44 {
            for x in 20..44 {
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
    fn converges_to_the_intensity_saddle() {
        let img = corner_image();
        let refined = refine_corner(
            &img.view(),
            Point2::new(21.2, 20.6),
            &RefineParams::default(),
        );
        assert!(
            (refined.x - 19.5).abs() < 0.5 && (refined.y - 19.5).abs() < 0.5,
            "refined to ({}, {})",
            refined.x,
            refined.y
        );
    }

    #[test]
    fn refinement_is_idempotent() {
        let img = corner_image();
        let params = RefineParams::default();
        let once = refine_corner(&img.view(), Point2::new(21.0, 21.0), &params);
        let twice = refine_corner(&img.view(), once, &params);
        assert!(
            (twice - once).norm() < 0.1,
            "second pass moved the corner by {}",
            (twice - once).norm()
        );
    }

    #[test]
    fn flat_region_leaves_the_point_alone() {
        let img = GrayImage {
            width: 32,
            height: 32,
            data: vec![128u8; 32 * 32],
        };
        let p = Point2::new(16.0, 16.0);
        let refined = refine_corner(&img.view(), p, &RefineParams::default());
        assert_eq!(refined, p);
    }
}
