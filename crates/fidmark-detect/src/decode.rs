//! Bit sampling and dictionary decoding of quad candidates.

use fidmark_core::{sample_mean_3x3, GrayImageView, Homography};
use fidmark_dict::Matcher;
use nalgebra::Point2;

use crate::candidates::Candidate;
use crate::threshold::otsu_threshold_from_samples;

/// Decoder configuration.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DecodeParams {
    /// Marker border width in cells.
    pub border_bits: usize,
    /// Canonical sampling resolution, pixels per cell.
    pub cell_px: f32,
    /// Fraction of border cells that must classify as black.
    pub min_border_score: f32,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            border_bits: 1,
            cell_px: 8.0,
            min_border_score: 0.9,
        }
    }
}

/// Why a candidate failed to decode. Diagnostic only; rejection is an
/// expected per-candidate outcome, not a frame failure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RejectReason {
    /// Sample points fell outside the frame or the quad was degenerate.
    SamplingFailed,
    /// The outer cell ring was not uniformly black.
    BorderMismatch { score: f32 },
    /// The payload matched no dictionary codeword within tolerance.
    DictionaryMismatch,
}

/// A candidate that failed decoding, kept for diagnostics/tuning.
#[derive(Clone, Debug)]
pub struct RejectedCandidate {
    pub candidate: Candidate,
    pub reason: RejectReason,
}

/// A successfully decoded marker.
#[derive(Clone, Debug)]
pub struct DecodedMarker {
    /// Id in the dictionary.
    pub id: u32,
    /// Corners in canonical order: corner 0 is the visual top-left of the
    /// decoded symbol, winding clockwise in image coordinates.
    pub corners: [Point2<f32>; 4],
    /// Bit errors corrected during the dictionary match.
    pub hamming: u32,
    /// Observed payload bits (row-major, black = 1), before correction.
    pub code: u64,
}

/// Number of extra threshold samples per cell side. A denser grid than the
/// bit centers stabilizes Otsu on small quads.
const THRESH_SUBDIV: usize = 3;

/// Sample a candidate's interior grid and match it against the dictionary.
///
/// On success the returned corners are rotated so corner 0 is the decoded
/// symbol's visual top-left, whatever the candidate's orientation was.
pub fn decode_candidate(
    frame: &GrayImageView<'_>,
    candidate: &Candidate,
    params: &DecodeParams,
    matcher: &Matcher,
) -> Result<DecodedMarker, RejectReason> {
    let bits = matcher.dictionary().marker_bits();
    let border = params.border_bits;
    let cells = bits + 2 * border;
    let side = cells as f32 * params.cell_px;

    let canonical = [
        Point2::new(0.0, 0.0),
        Point2::new(side, 0.0),
        Point2::new(side, side),
        Point2::new(0.0, side),
    ];
    let h = Homography::from_quad(&canonical, &candidate.corners)
        .ok_or(RejectReason::SamplingFailed)?;

    // Cell-center intensities; any sample off the frame voids the candidate.
    let mut samples = Vec::with_capacity(cells * cells);
    for cy in 0..cells {
        for cx in 0..cells {
            let p = h.apply(Point2::new(
                (cx as f32 + 0.5) * params.cell_px,
                (cy as f32 + 0.5) * params.cell_px,
            ));
            let v = sample_mean_3x3(frame, p.x, p.y).ok_or(RejectReason::SamplingFailed)?;
            samples.push(v);
        }
    }

    // Denser grid for the per-candidate threshold; edge misses are fine here.
    let grid = cells * THRESH_SUBDIV;
    let step = side / grid as f32;
    let mut thresh_samples = Vec::with_capacity(grid * grid);
    for ty in 0..grid {
        for tx in 0..grid {
            let p = h.apply(Point2::new(
                (tx as f32 + 0.5) * step,
                (ty as f32 + 0.5) * step,
            ));
            if let Some(v) = sample_mean_3x3(frame, p.x, p.y) {
                thresh_samples.push(v);
            }
        }
    }
    let threshold = if thresh_samples.is_empty() {
        otsu_threshold_from_samples(&samples)
    } else {
        otsu_threshold_from_samples(&thresh_samples)
    };

    let mut border_black = 0u32;
    let mut border_total = 0u32;
    let mut code = 0u64;
    for cy in 0..cells {
        for cx in 0..cells {
            let is_black = samples[cy * cells + cx] < threshold;
            let on_border = cx < border || cy < border || cx >= border + bits || cy >= border + bits;
            if on_border {
                border_total += 1;
                if is_black {
                    border_black += 1;
                }
            } else if is_black {
                let bx = cx - border;
                let by = cy - border;
                code |= 1u64 << (by * bits + bx);
            }
        }
    }

    if border > 0 {
        let score = border_black as f32 / border_total.max(1) as f32;
        if score < params.min_border_score {
            log::trace!("border mismatch (score {score:.2})");
            return Err(RejectReason::BorderMismatch { score });
        }
    }

    let m = matcher
        .match_code(code)
        .ok_or(RejectReason::DictionaryMismatch)?;

    // A match at rotation r means the observed grid is the dictionary
    // pattern turned r quarter-turns clockwise, so the pattern's top-left
    // sits at observed corner r.
    let mut corners = candidate.corners;
    corners.rotate_left(m.rotation as usize);

    Ok(DecodedMarker {
        id: m.id,
        corners,
        hamming: m.hamming,
        code,
    })
}
