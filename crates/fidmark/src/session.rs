//! Per-frame detection session.

use std::sync::Arc;

use fidmark_core::GrayImageView;
use fidmark_detect::{
    decode_candidate, detect_candidates, refine_corners, DecodeParams, DecodedMarker,
    DetectorParams, RefineParams, RejectedCandidate,
};
use fidmark_dict::{Dictionary, Matcher};
use fidmark_pose::{estimate_marker_pose, Calibration, MarkerPose};

/// Session configuration.
#[derive(Clone, Debug)]
pub struct SessionParams {
    pub detector: DetectorParams,
    pub decode: DecodeParams,
    pub refine: RefineParams,
    /// Bit-error tolerance for dictionary matching. `None` uses the
    /// dictionary's full correction capacity.
    pub max_bit_errors: Option<u32>,
    /// Physical marker side length; translation units follow it.
    pub marker_side: f64,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            detector: DetectorParams::default(),
            decode: DecodeParams::default(),
            refine: RefineParams::default(),
            max_bit_errors: None,
            marker_side: 0.05,
        }
    }
}

/// Everything produced for the most recent frame.
///
/// Rebuilt from scratch on every [`DetectorSession::detect`] call: no
/// cross-frame identity is preserved, and callers must copy out anything
/// they want to retain.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Accepted markers, refined corners, in candidate discovery order.
    pub markers: Vec<DecodedMarker>,
    /// Pose per accepted marker, parallel to `markers`. Empty until
    /// [`DetectorSession::estimate_poses`] runs with calibration set; a
    /// `None` slot means the solver failed for that marker alone.
    pub poses: Vec<Option<MarkerPose>>,
    /// Candidates that failed decoding. Diagnostic only.
    pub rejected: Vec<RejectedCandidate>,
}

/// Stateful per-stream orchestrator of the detection pipeline.
///
/// The dictionary is shared read-only; everything mutable is per-session,
/// so independent video streams can run sessions on separate threads
/// without locking.
pub struct DetectorSession {
    matcher: Matcher,
    params: SessionParams,
    calibration: Option<Calibration>,
    result: DetectionResult,
}

impl DetectorSession {
    pub fn new(dictionary: Arc<Dictionary>, params: SessionParams) -> Self {
        let tolerance = params
            .max_bit_errors
            .unwrap_or_else(|| dictionary.max_correction_bits());
        let matcher = Matcher::new(dictionary, tolerance);
        Self {
            matcher,
            params,
            calibration: None,
            result: DetectionResult::default(),
        }
    }

    #[inline]
    pub fn dictionary(&self) -> &Dictionary {
        self.matcher.dictionary()
    }

    #[inline]
    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    /// Install intrinsics; poses stay absent until the next
    /// [`estimate_poses`](Self::estimate_poses) call.
    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.calibration = Some(calibration);
    }

    pub fn clear_calibration(&mut self) {
        self.calibration = None;
    }

    /// Whether pose estimation preconditions are met.
    #[inline]
    pub fn has_calibration(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn set_marker_side(&mut self, side: f64) {
        self.params.marker_side = side;
    }

    /// Run candidate detection, decoding and corner refinement on a frame.
    ///
    /// The previous frame's result is replaced, poses included. Returns
    /// whether at least one marker was accepted; an empty frame is a
    /// legitimate outcome, not an error.
    pub fn detect(&mut self, frame: &GrayImageView<'_>) -> bool {
        self.result = DetectionResult::default();

        let candidates = detect_candidates(frame, &self.params.detector);
        for candidate in candidates {
            match decode_candidate(frame, &candidate, &self.params.decode, &self.matcher) {
                Ok(marker) => self.result.markers.push(marker),
                Err(reason) => self
                    .result
                    .rejected
                    .push(RejectedCandidate { candidate, reason }),
            }
        }

        refine_corners(frame, &mut self.result.markers, &self.params.refine);

        log::debug!(
            "frame {}x{}: {} markers, {} rejected",
            frame.width,
            frame.height,
            self.result.markers.len(),
            self.result.rejected.len()
        );

        !self.result.markers.is_empty()
    }

    /// Solve a pose for every accepted marker.
    ///
    /// A quiet no-op while calibration is absent: that is an expected
    /// startup state, not an error, and `poses` stays empty rather than
    /// stale. With calibration set, a per-marker solver failure leaves a
    /// `None` slot without affecting the other markers.
    pub fn estimate_poses(&mut self) {
        let Some(calibration) = &self.calibration else {
            log::debug!("pose estimation skipped: no calibration set");
            return;
        };

        let side = self.params.marker_side;
        self.result.poses = self
            .result
            .markers
            .iter()
            .map(|marker| {
                estimate_marker_pose(&marker.corners, side, calibration)
                    .map_err(|err| log::warn!("pose failed for marker {}: {err}", marker.id))
                    .ok()
            })
            .collect();
    }

    /// Result for the most recent frame.
    #[inline]
    pub fn result(&self) -> &DetectionResult {
        &self.result
    }

    #[inline]
    pub fn markers(&self) -> &[DecodedMarker] {
        &self.result.markers
    }

    #[inline]
    pub fn poses(&self) -> &[Option<MarkerPose>] {
        &self.result.poses
    }

    #[inline]
    pub fn rejected(&self) -> &[RejectedCandidate] {
        &self.result.rejected
    }
}
