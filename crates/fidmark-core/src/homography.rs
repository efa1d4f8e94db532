use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

use crate::{sample_bilinear_u8, GrayImage, GrayImageView};

/// A 3x3 projective transform acting on 2-D points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Compute H such that `dst ~ H * src` from 4 point correspondences.
    ///
    /// Corner order must be consistent between `src` and `dst`. Returns
    /// `None` for degenerate quads (collinear corners, repeated points).
    pub fn from_quad(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Self> {
        // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1.
        // For each correspondence (x,y)->(u,v):
        //   h11 x + h12 y + h13 - u h31 x - u h32 y = u
        //   h21 x + h22 y + h23 - v h31 x - v h32 y = v
        let (src_n, t_src) = normalize4(src);
        let (dst_n, t_dst) = normalize4(dst);

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for k in 0..4 {
            let x = src_n[k].x;
            let y = src_n[k].y;
            let u = dst_n[k].x;
            let v = dst_n[k].y;

            let r0 = 2 * k;
            a[(r0, 0)] = x;
            a[(r0, 1)] = y;
            a[(r0, 2)] = 1.0;
            a[(r0, 6)] = -u * x;
            a[(r0, 7)] = -u * y;
            b[r0] = u;

            let r1 = 2 * k + 1;
            a[(r1, 3)] = x;
            a[(r1, 4)] = y;
            a[(r1, 5)] = 1.0;
            a[(r1, 6)] = -v * x;
            a[(r1, 7)] = -v * y;
            b[r1] = v;
        }

        let x = a.lu().solve(&b)?;

        let hn = Matrix3::<f64>::new(
            x[0], x[1], x[2], //
            x[3], x[4], x[5], //
            x[6], x[7], 1.0,
        );

        // Denormalize: H = T_dst^{-1} * Hn * T_src, rescaled so h33 = 1.
        let h = t_dst.try_inverse()? * hn * t_src;
        let s = h[(2, 2)];
        if s.abs() < 1e-12 {
            return None;
        }
        Some(Self::new(h / s))
    }

    /// Map a point through the homography.
    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Hartley normalization of 4 points: centroid at origin, mean distance
/// sqrt(2). Conditions the 8x8 solve for quads far from the image origin.
fn normalize4(pts: &[Point2<f32>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    let mut cx = 0.0_f64;
    let mut cy = 0.0_f64;
    for p in pts {
        cx += p.x as f64;
        cy += p.y as f64;
    }
    cx *= 0.25;
    cy *= 0.25;

    let mut mean_dist = 0.0_f64;
    for p in pts {
        let dx = p.x as f64 - cx;
        let dy = p.y as f64 - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist *= 0.25;

    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };
    let t = Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let mut out = [Point2::new(0.0_f64, 0.0_f64); 4];
    for (i, p) in pts.iter().enumerate() {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        out[i] = Point2::new(v[0], v[1]);
    }
    (out, t)
}

/// Warp the quad bounded by `h_img_from_patch` into an upright `side x side`
/// patch, sampling the source bilinearly at each destination pixel center.
pub fn warp_quad_gray(
    src: &GrayImageView<'_>,
    h_img_from_patch: Homography,
    side: usize,
) -> GrayImage {
    let mut out = vec![0u8; side * side];

    for y in 0..side {
        for x in 0..side {
            let pp = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
            let pi = h_img_from_patch.apply(pp);
            out[y * side + x] = sample_bilinear_u8(src, pi.x, pi.y);
        }
    }

    GrayImage {
        width: side,
        height: side,
        data: out,
    }
}
