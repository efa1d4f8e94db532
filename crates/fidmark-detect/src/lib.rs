//! Marker detection on raw frames.
//!
//! Three stages, each usable on its own:
//! - [`detect_candidates`]: adaptive thresholding, contour tracing and quad
//!   filtering turn a grayscale frame into candidate quadrilaterals.
//! - [`decode_candidate`]: perspective bit sampling against a dictionary
//!   turns a candidate into a [`DecodedMarker`] or a [`RejectReason`].
//! - [`refine_corners`]: gradient-based sub-pixel refinement of accepted
//!   marker corners on the original (non-binarized) frame.
//!
//! All stages are pure functions of their inputs; the per-frame result
//! aggregation lives in the `fidmark` facade.

mod candidates;
mod contours;
mod decode;
mod polygon;
mod refine;
mod threshold;

pub use candidates::{detect_candidates, Candidate, DetectorParams};
pub use contours::{find_contours, Contour};
pub use decode::{decode_candidate, DecodeParams, DecodedMarker, RejectReason, RejectedCandidate};
pub use polygon::{approx_poly_dp, is_convex_polygon, min_edge_length, perimeter};
pub use refine::{refine_corner, refine_corners, RefineParams};
pub use threshold::{adaptive_threshold, otsu_threshold_from_samples};
