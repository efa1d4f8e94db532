//! Dictionary construction and the minimum-distance invariant.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::matcher::rotate_code_u64;

/// Attempts per codeword slot before generation gives up.
const MAX_ATTEMPTS_PER_CODE: usize = 100_000;

/// Errors from dictionary construction.
#[derive(thiserror::Error, Debug)]
pub enum DictionaryError {
    #[error("marker bit depth {marker_bits} unsupported (need 1..=8 bits per side)")]
    BitDepthUnsupported { marker_bits: usize },

    #[error("dictionary must contain at least one codeword")]
    Empty,

    #[error("minimum distance {min_distance} exceeds the {bit_count} bits of a codeword")]
    MinDistanceTooLarge { min_distance: u32, bit_count: usize },

    #[error(
        "could not generate {requested} codewords of {marker_bits}x{marker_bits} bits with \
         minimum distance {min_distance} (got {generated})"
    )]
    Unsatisfiable {
        requested: usize,
        marker_bits: usize,
        min_distance: u32,
        generated: usize,
    },

    #[error(
        "codewords {first} and {second} are only {distance} bits apart \
         (minimum distance {min_distance})"
    )]
    MinDistanceViolated {
        first: usize,
        second: usize,
        distance: u32,
        min_distance: u32,
    },

    #[error("invalid dictionary JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// An immutable codebook of square bit patterns.
///
/// Codewords pack the inner `marker_bits x marker_bits` grid into a `u64`,
/// row-major with **black = 1**. Any two codewords differ by at least
/// `min_distance` bits across all four rotations, which is what makes
/// bounded-error decoding unambiguous.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dictionary {
    name: String,
    marker_bits: usize,
    min_distance: u32,
    codes: Vec<u64>,
}

impl Dictionary {
    /// Generate a dictionary of `num_markers` codewords.
    ///
    /// Codewords are drawn from a seeded PRNG, so the same parameters always
    /// produce the same dictionary. A candidate is accepted only when its
    /// distance to its own rotations and its rotation-minimal distance to
    /// every accepted codeword are both at least `min_distance`.
    pub fn generate(
        num_markers: usize,
        marker_bits: usize,
        min_distance: u32,
    ) -> Result<Self, DictionaryError> {
        validate_shape(num_markers, marker_bits, min_distance)?;

        let bit_count = marker_bits * marker_bits;
        let mask = if bit_count == 64 {
            u64::MAX
        } else {
            (1u64 << bit_count) - 1
        };

        let seed = 0x6d61_726b_6572_7321_u64
            ^ ((num_markers as u64) << 32)
            ^ ((marker_bits as u64) << 8)
            ^ min_distance as u64;
        let mut rng = Pcg64::seed_from_u64(seed);

        let mut codes: Vec<u64> = Vec::with_capacity(num_markers);
        while codes.len() < num_markers {
            let mut accepted = false;
            for _ in 0..MAX_ATTEMPTS_PER_CODE {
                let candidate = rng.next_u64() & mask;
                if self_distance(candidate, marker_bits) < min_distance {
                    continue;
                }
                if codes
                    .iter()
                    .any(|&c| rotation_min_distance(candidate, c, marker_bits) < min_distance)
                {
                    continue;
                }
                codes.push(candidate);
                accepted = true;
                break;
            }
            if !accepted {
                return Err(DictionaryError::Unsatisfiable {
                    requested: num_markers,
                    marker_bits,
                    min_distance,
                    generated: codes.len(),
                });
            }
        }

        log::debug!(
            "generated dictionary: {} codewords, {}x{} bits, min distance {}",
            codes.len(),
            marker_bits,
            marker_bits,
            min_distance
        );

        Ok(Self {
            name: format!("FID_{marker_bits}X{marker_bits}_{num_markers}"),
            marker_bits,
            min_distance,
            codes,
        })
    }

    /// Build a dictionary from explicit codewords, verifying the invariant.
    pub fn from_codes(
        name: impl Into<String>,
        marker_bits: usize,
        min_distance: u32,
        codes: Vec<u64>,
    ) -> Result<Self, DictionaryError> {
        validate_shape(codes.len(), marker_bits, min_distance)?;

        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate().skip(i + 1) {
                let d = rotation_min_distance(a, b, marker_bits);
                if d < min_distance {
                    return Err(DictionaryError::MinDistanceViolated {
                        first: i,
                        second: j,
                        distance: d,
                        min_distance,
                    });
                }
            }
        }

        Ok(Self {
            name: name.into(),
            marker_bits,
            min_distance,
            codes,
        })
    }

    /// Parse a dictionary from its JSON form, re-verifying the invariant.
    pub fn from_json_str(json: &str) -> Result<Self, DictionaryError> {
        let parsed: Dictionary = serde_json::from_str(json)?;
        Self::from_codes(
            parsed.name,
            parsed.marker_bits,
            parsed.min_distance,
            parsed.codes,
        )
    }

    pub fn to_json_string(&self) -> Result<String, DictionaryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of inner bits per side.
    #[inline]
    pub fn marker_bits(&self) -> usize {
        self.marker_bits
    }

    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_bits * self.marker_bits
    }

    /// Guaranteed rotation-minimal distance between any two codewords.
    #[inline]
    pub fn min_distance(&self) -> u32 {
        self.min_distance
    }

    /// Largest bit-error count that still decodes unambiguously.
    #[inline]
    pub fn max_correction_bits(&self) -> u32 {
        self.min_distance.saturating_sub(1) / 2
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    #[inline]
    pub fn codes(&self) -> &[u64] {
        &self.codes
    }

    /// Codeword for a marker id.
    #[inline]
    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }
}

fn validate_shape(
    num_markers: usize,
    marker_bits: usize,
    min_distance: u32,
) -> Result<(), DictionaryError> {
    if marker_bits == 0 || marker_bits * marker_bits > 64 {
        return Err(DictionaryError::BitDepthUnsupported { marker_bits });
    }
    if num_markers == 0 {
        return Err(DictionaryError::Empty);
    }
    let bit_count = marker_bits * marker_bits;
    if min_distance as usize > bit_count {
        return Err(DictionaryError::MinDistanceTooLarge {
            min_distance,
            bit_count,
        });
    }
    Ok(())
}

/// Minimal distance of a code to its own non-trivial rotations.
fn self_distance(code: u64, marker_bits: usize) -> u32 {
    (1..4u8)
        .map(|rot| (code ^ rotate_code_u64(code, marker_bits, rot)).count_ones())
        .min()
        .unwrap_or(u32::MAX)
}

/// Minimal distance between `a` and every rotation of `b`.
fn rotation_min_distance(a: u64, b: u64, marker_bits: usize) -> u32 {
    (0..4u8)
        .map(|rot| (a ^ rotate_code_u64(b, marker_bits, rot)).count_ones())
        .min()
        .unwrap_or(u32::MAX)
}
