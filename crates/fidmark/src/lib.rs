//! High-level facade for the `fidmark-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the underlying crates
//! - the per-frame [`DetectorSession`] orchestrator
//! - (feature `image`) convenience helpers working on `image::GrayImage`
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use fidmark::dict::Dictionary;
//! use fidmark::{DetectorSession, SessionParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dict = Arc::new(Dictionary::generate(250, 6, 9)?);
//! let mut session = DetectorSession::new(dict, SessionParams::default());
//!
//! # let (width, height, pixels) = (640usize, 480usize, vec![0u8; 640 * 480]);
//! let frame = fidmark::core::GrayImageView { width, height, data: &pixels };
//! if session.detect(&frame) {
//!     for marker in session.markers() {
//!         println!("id {} at {:?}", marker.id, marker.corners[0]);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `fidmark::core`: image views, sampling, homographies, logging.
//! - `fidmark::dict`: dictionaries and the rotation-tolerant matcher.
//! - `fidmark::detect`: candidate detection, decoding, corner refinement.
//! - `fidmark::pose`: camera intrinsics and single-marker pose estimation.

pub use fidmark_core as core;
pub use fidmark_detect as detect;
pub use fidmark_dict as dict;
pub use fidmark_pose as pose;

mod session;

pub use session::{DetectionResult, DetectorSession, SessionParams};

#[cfg(feature = "image")]
pub mod convert;
