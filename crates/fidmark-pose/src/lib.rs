//! Camera intrinsics and single-marker pose estimation.
//!
//! [`Calibration`] wraps a 3x3 camera matrix and distortion coefficients,
//! validated at construction; [`estimate_marker_pose`] solves the planar
//! perspective-n-point problem for one decoded marker's four corners and
//! returns an axis-angle rotation plus translation, in the units of the
//! configured marker side length.

mod calibration;
mod estimate;

pub use calibration::{Calibration, CalibrationError};
pub use estimate::{
    estimate_marker_pose, marker_object_points, reprojection_error, MarkerPose, PoseError,
};
