//! Core types and utilities for fiducial marker detection.
//!
//! This crate is intentionally small and purely geometric. It owns the
//! grayscale buffer views, sampling helpers and the homography type that the
//! detector, decoder and pose crates build on. It does *not* know what a
//! marker is.

mod homography;
mod image;
mod logger;

pub use homography::{warp_quad_gray, Homography};
pub use image::{
    sample_bilinear, sample_bilinear_u8, sample_gradient, sample_mean_3x3, GrayImage,
    GrayImageView,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
