//! Dictionary matching and rotation helpers.

use std::sync::Arc;

use crate::Dictionary;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Marker id in the dictionary.
    pub id: u32,
    /// Rotation `0..=3` such that `observed == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance between observed and dictionary code (after rotation).
    pub hamming: u32,
}

/// Matcher for a fixed dictionary.
///
/// Brute-force search over all ids and rotations; for the dictionary sizes
/// in use (<= 1000) this is fast enough and keeps memory small. The four
/// rotations of every codeword are precomputed at construction.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Arc<Dictionary>,
    max_hamming: u32,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher allowing up to `max_hamming` bit errors.
    ///
    /// The tolerance is clamped to the dictionary's
    /// [`max_correction_bits`](Dictionary::max_correction_bits) so a match
    /// can never be closer to a different codeword than to its own.
    pub fn new(dict: Arc<Dictionary>, max_hamming: u32) -> Self {
        let clamped = max_hamming.min(dict.max_correction_bits());
        if clamped < max_hamming {
            log::debug!(
                "clamping bit-error tolerance {} to {} for dictionary {}",
                max_hamming,
                clamped,
                dict.name()
            );
        }

        let bits = dict.marker_bits();
        let mut rotated = Vec::with_capacity(dict.len());
        for &base in dict.codes() {
            rotated.push([
                rotate_code_u64(base, bits, 0),
                rotate_code_u64(base, bits, 1),
                rotate_code_u64(base, bits, 2),
                rotate_code_u64(base, bits, 3),
            ]);
        }

        Self {
            dict,
            max_hamming: clamped,
            rotated,
        }
    }

    /// Dictionary used by this matcher.
    #[inline]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// Maximum Hamming distance allowed for matches.
    #[inline]
    pub fn max_hamming(&self) -> u32 {
        self.max_hamming
    }

    /// Find the best match within the tolerance.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;

        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones();
                if h > self.max_hamming {
                    continue;
                }
                let m = Match {
                    id: id as u32,
                    rotation: rot as u8,
                    hamming: h,
                };
                match best {
                    None => {
                        best = Some(m);
                        if h == 0 {
                            return best;
                        }
                    }
                    Some(prev) if m.hamming < prev.hamming => {
                        best = Some(m);
                        if m.hamming == 0 {
                            return best;
                        }
                    }
                    Some(_) => {}
                }
            }
        }

        best
    }
}

/// Rotate a code stored in row-major bits (`idx = y * n + x`) by
/// `rot` quarter turns clockwise.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    #[inline]
    fn get(code: u64, idx: usize) -> u64 {
        (code >> idx) & 1
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            out |= get(code, sy * n + sx) << (y * n + x);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dict() -> Arc<Dictionary> {
        Arc::new(Dictionary::generate(24, 6, 8).expect("generate"))
    }

    #[test]
    fn rotate_four_times_is_identity() {
        let code = 0x0123_4567_89ab_cdef_u64;
        let n = 8;
        let mut r = code;
        for _ in 0..4 {
            r = rotate_code_u64(r, n, 1);
        }
        assert_eq!(code, r);
    }

    #[test]
    fn matcher_finds_rotated_code() {
        let dict = test_dict();
        let matcher = Matcher::new(dict.clone(), 0);

        let base = dict.code(5).expect("code 5");
        let observed = rotate_code_u64(base, dict.marker_bits(), 3);
        let m = matcher.match_code(observed).expect("match");
        assert_eq!(m.id, 5);
        assert_eq!(m.rotation, 3);
        assert_eq!(m.hamming, 0);
    }

    #[test]
    fn bit_errors_within_tolerance_still_match() {
        let dict = test_dict();
        let tolerance = dict.max_correction_bits();
        let matcher = Matcher::new(dict.clone(), tolerance);

        let mut observed = dict.code(2).expect("code 2");
        for i in 0..tolerance {
            observed ^= 1u64 << (i * 5);
        }
        let m = matcher.match_code(observed).expect("match");
        assert_eq!(m.id, 2);
        assert_eq!(m.hamming, tolerance);
    }

    #[test]
    fn one_error_past_tolerance_never_matches_another_id() {
        let dict = test_dict();
        let tolerance = dict.max_correction_bits();
        let matcher = Matcher::new(dict.clone(), tolerance);

        let mut observed = dict.code(7).expect("code 7");
        for i in 0..=tolerance {
            observed ^= 1u64 << (i * 3);
        }
        // Either rejected, or still id 7 found at a rotation; the
        // min-distance invariant forbids a different id.
        if let Some(m) = matcher.match_code(observed) {
            assert_eq!(m.id, 7);
        }
    }

    #[test]
    fn tolerance_is_clamped_to_correction_capacity() {
        let dict = test_dict();
        let matcher = Matcher::new(dict.clone(), 1000);
        assert_eq!(matcher.max_hamming(), dict.max_correction_bits());
    }
}
