//! Planar pose estimation for a single square marker.

use fidmark_core::Homography;
use nalgebra::{Matrix3, Point2, Point3, Rotation3, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::Calibration;

/// Errors from the pose solver.
#[derive(thiserror::Error, Debug)]
pub enum PoseError {
    #[error("marker side length must be positive and finite (got {side})")]
    InvalidMarkerSize { side: f64 },

    #[error("marker corners are degenerate (collinear or repeated)")]
    DegenerateCorners,

    #[error("pose decomposition failed")]
    SolveFailed,
}

/// Rotation (axis-angle) and translation of one marker relative to the
/// camera. Translation units match the marker side length units.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MarkerPose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl MarkerPose {
    /// Rotation matrix form of `rvec`.
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(self.rvec)
    }
}

/// The 3-D corners of a flat square marker of the given side length,
/// centered at the origin in its own plane (Z = 0), in the decoder's
/// canonical corner order: top-left, top-right, bottom-right, bottom-left.
pub fn marker_object_points(side_length: f64) -> [Point3<f64>; 4] {
    let h = side_length * 0.5;
    [
        Point3::new(-h, h, 0.0),
        Point3::new(h, h, 0.0),
        Point3::new(h, -h, 0.0),
        Point3::new(-h, -h, 0.0),
    ]
}

/// Solve the perspective-4-point problem for one marker.
///
/// The observed corners must be in canonical decoder order (corner 0 =
/// visual top-left). They are undistorted and normalized, a plane-induced
/// homography is fit, and its columns are decomposed into `[r1 r2 t]` with
/// an SVD projection onto SO(3). The sign of the decomposition is chosen so
/// the marker lies in front of the camera (`tvec.z > 0`).
pub fn estimate_marker_pose(
    corners: &[Point2<f32>; 4],
    side_length: f64,
    calib: &Calibration,
) -> Result<MarkerPose, PoseError> {
    if !(side_length.is_finite() && side_length > 0.0) {
        return Err(PoseError::InvalidMarkerSize { side: side_length });
    }
    if corners_degenerate(corners) {
        return Err(PoseError::DegenerateCorners);
    }

    let object = marker_object_points(side_length);
    let mut obj2d = [Point2::new(0.0f32, 0.0); 4];
    let mut img2d = [Point2::new(0.0f32, 0.0); 4];
    for i in 0..4 {
        obj2d[i] = Point2::new(object[i].x as f32, object[i].y as f32);
        let n = calib.undistort_pixel(Point2::new(corners[i].x as f64, corners[i].y as f64));
        img2d[i] = Point2::new(n.x as f32, n.y as f32);
    }

    // Observations are normalized, so H ~ [r1 r2 t] up to scale.
    let h = Homography::from_quad(&obj2d, &img2d).ok_or(PoseError::DegenerateCorners)?;
    let hm = h.h;

    let h1 = Vector3::new(hm[(0, 0)], hm[(1, 0)], hm[(2, 0)]);
    let h2 = Vector3::new(hm[(0, 1)], hm[(1, 1)], hm[(2, 1)]);
    let h3 = Vector3::new(hm[(0, 2)], hm[(1, 2)], hm[(2, 2)]);

    let norm_sum = h1.norm() + h2.norm();
    if norm_sum < 1e-12 {
        return Err(PoseError::SolveFailed);
    }
    let mut lambda = 2.0 / norm_sum;
    // The homography sign is arbitrary; pick the one placing the marker in
    // front of the camera.
    if lambda * h3.z < 0.0 {
        lambda = -lambda;
    }

    let r1 = lambda * h1;
    let r2 = lambda * h2;
    let r3 = r1.cross(&r2);

    let mut r_mat = Matrix3::<f64>::zeros();
    r_mat.set_column(0, &r1);
    r_mat.set_column(1, &r2);
    r_mat.set_column(2, &r3);

    // Nearest rotation matrix in the Frobenius sense.
    let svd = r_mat.svd(true, true);
    let u = svd.u.ok_or(PoseError::SolveFailed)?;
    let v_t = svd.v_t.ok_or(PoseError::SolveFailed)?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_fix = u;
        u_fix.column_mut(2).neg_mut();
        r_orth = u_fix * v_t;
    }

    let tvec = lambda * h3;
    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));

    Ok(MarkerPose {
        rvec: rot.scaled_axis(),
        tvec,
    })
}

/// Repeated corners or a collinear corner triple admit no plane-induced
/// homography; catching them up front keeps the linear solve well posed.
fn corners_degenerate(c: &[Point2<f32>; 4]) -> bool {
    for i in 0..4 {
        for j in (i + 1)..4 {
            if (c[i] - c[j]).norm_squared() < 1e-6 {
                return true;
            }
        }
    }
    for i in 0..4 {
        let a = c[i];
        let b = c[(i + 1) % 4];
        let d = c[(i + 2) % 4];
        let cross = (b.x - a.x) * (d.y - a.y) - (b.y - a.y) * (d.x - a.x);
        if cross.abs() < 1e-6 {
            return true;
        }
    }
    false
}

/// Mean pixel distance between the observed corners and the pose's
/// reprojection of the marker square.
pub fn reprojection_error(
    pose: &MarkerPose,
    corners: &[Point2<f32>; 4],
    side_length: f64,
    calib: &Calibration,
) -> f64 {
    let rot = pose.rotation();
    let mut total = 0.0;
    for (object, observed) in marker_object_points(side_length).iter().zip(corners) {
        let cam = rot * object.coords + pose.tvec;
        if cam.z <= 1e-12 {
            return f64::INFINITY;
        }
        let n = calib.distort(Vector2::new(cam.x / cam.z, cam.y / cam.z));
        let p = calib.denormalize(n);
        let dx = p.x - observed.x as f64;
        let dy = p.y - observed.y as f64;
        total += (dx * dx + dy * dy).sqrt();
    }
    total * 0.25
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    fn calib(dist: &[f64]) -> Calibration {
        let k = Matrix3::new(800.0, 0.0, 320.0, 0.0, 780.0, 240.0, 0.0, 0.0, 1.0);
        Calibration::new(k, dist).expect("valid intrinsics")
    }

    fn project(
        rot: &Rotation3<f64>,
        t: &Vector3<f64>,
        calib: &Calibration,
        side: f64,
    ) -> [Point2<f32>; 4] {
        let mut out = [Point2::new(0.0f32, 0.0); 4];
        for (i, object) in marker_object_points(side).iter().enumerate() {
            let cam = rot * object.coords + t;
            let n = calib.distort(Vector2::new(cam.x / cam.z, cam.y / cam.z));
            let p = calib.denormalize(n);
            out[i] = Point2::new(p.x as f32, p.y as f32);
        }
        out
    }

    #[test]
    fn recovers_synthetic_pose() {
        let calib = calib(&[]);
        let rot = Rotation3::from_euler_angles(0.12, -0.07, 0.25);
        let t = Vector3::new(0.04, -0.03, 0.62);
        let corners = project(&rot, &t, &calib, 0.05);

        let pose = estimate_marker_pose(&corners, 0.05, &calib).expect("pose");

        assert_relative_eq!(pose.tvec.x, t.x, epsilon = 1e-4);
        assert_relative_eq!(pose.tvec.y, t.y, epsilon = 1e-4);
        assert_relative_eq!(pose.tvec.z, t.z, epsilon = 1e-4);

        let angle_err = pose.rotation().rotation_to(&rot).angle();
        assert!(angle_err < 1e-3, "rotation error {angle_err}");
        assert!(pose.tvec.z > 0.0);
    }

    #[test]
    fn honors_distortion_coefficients() {
        let calib = calib(&[0.08, -0.03, 0.001, -0.0005, 0.0]);
        let rot = Rotation3::from_euler_angles(-0.05, 0.1, 0.02);
        let t = Vector3::new(-0.02, 0.015, 0.5);
        let corners = project(&rot, &t, &calib, 0.04);

        let pose = estimate_marker_pose(&corners, 0.04, &calib).expect("pose");
        assert_relative_eq!(pose.tvec.z, t.z, epsilon = 1e-3);
        let angle_err = pose.rotation().rotation_to(&rot).angle();
        assert!(angle_err < 1e-2, "rotation error {angle_err}");
    }

    #[test]
    fn reprojection_error_is_small_for_recovered_pose() {
        let calib = calib(&[]);
        let rot = Rotation3::from_euler_angles(0.2, 0.1, -0.15);
        let t = Vector3::new(0.01, 0.02, 0.45);
        let corners = project(&rot, &t, &calib, 0.05);

        let pose = estimate_marker_pose(&corners, 0.05, &calib).expect("pose");
        let err = reprojection_error(&pose, &corners, 0.05, &calib);
        assert!(err < 0.05, "reprojection error {err} px");
    }

    #[test]
    fn invalid_marker_size_is_a_configuration_error() {
        let calib = calib(&[]);
        let corners = [
            Point2::new(100.0f32, 100.0),
            Point2::new(200.0, 100.0),
            Point2::new(200.0, 200.0),
            Point2::new(100.0, 200.0),
        ];
        assert!(matches!(
            estimate_marker_pose(&corners, 0.0, &calib),
            Err(PoseError::InvalidMarkerSize { .. })
        ));
        assert!(matches!(
            estimate_marker_pose(&corners, -1.0, &calib),
            Err(PoseError::InvalidMarkerSize { .. })
        ));
    }

    #[test]
    fn degenerate_corners_are_rejected() {
        let calib = calib(&[]);
        let repeated = [
            Point2::new(100.0f32, 100.0),
            Point2::new(100.0, 100.0),
            Point2::new(200.0, 200.0),
            Point2::new(200.0, 100.0),
        ];
        assert!(matches!(
            estimate_marker_pose(&repeated, 0.05, &calib),
            Err(PoseError::DegenerateCorners)
        ));

        let collinear = [
            Point2::new(100.0f32, 100.0),
            Point2::new(150.0, 150.0),
            Point2::new(200.0, 200.0),
            Point2::new(250.0, 100.0),
        ];
        assert!(matches!(
            estimate_marker_pose(&collinear, 0.05, &calib),
            Err(PoseError::DegenerateCorners)
        ));
    }
}
