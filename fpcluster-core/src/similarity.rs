// SPDX-License-Identifier: AGPL-3.0-or-later
// FPCluster - Distributed Fingerprint Clustering Engine
// Copyright (C) 2026 FPCluster Developers
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Tanimoto and Tversky distance kernels.
//!
//! Both measures yield a distance `d = 1 - s` in `[0, 1]`. With popcounts
//! `a`, `b` and intersection `c`:
//!
//! - Tanimoto: `d = 1 - c / (a + b - c)`
//! - Tversky:  `d = 1 - c / (alpha*(a-c) + beta*(b-c) + c)`, `beta = 1 - alpha`
//!
//! Tversky at `alpha = 0.5` halves the Tanimoto divisor's deficit evenly and
//! produces the same value. Tanimoto is symmetric; Tversky is symmetric only
//! at `alpha = 0.5` and callers must not rely on it otherwise.
//!
//! ## Threshold gating
//!
//! [`Measure::distance_within`] may return 1.0 without touching the word
//! arrays once the cached popcounts prove `d >= threshold`. Since
//! `c <= min(a, b)`:
//!
//! - Tanimoto divisor `a + b - c >= max(a, b)`, so `s <= min / max`; the pair
//!   cannot qualify when `min(a, b) < (1 - T) * max(a, b)`.
//! - The Tversky divisor telescopes to `alpha*a + beta*b` independent of `c`,
//!   so `s <= min(a, b) / (alpha*a + beta*b)` and the analogous bound applies.
//!
//! A result `< threshold` is returned if and only if one is achievable;
//! early exit only ever discards non-qualifying pairs.
//!
//! ## Empty fingerprints
//!
//! A zero divisor (both fingerprints empty under Tanimoto, and under Tversky
//! with any `alpha`) is defined as distance 1.0. Two empty fingerprints are
//! therefore maximally distant from each other even though `d(x, x) = 0` for
//! every non-empty `x`.

use serde::{Deserialize, Serialize};

use crate::bitops::{common_bits, tversky_counts};
use crate::error::{Error, Result};
use crate::fingerprint::{sorted_common, Fingerprint};

/// Similarity family selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Similarity {
    Tanimoto,
    Tversky,
}

impl Similarity {
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "TANIMOTO" => Ok(Similarity::Tanimoto),
            "TVERSKY" => Ok(Similarity::Tversky),
            _ => Err(Error::SettingsInvalid(format!(
                "Unknown similarity {token:?}. Must be TANIMOTO or TVERSKY."
            ))),
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            Similarity::Tanimoto => "TANIMOTO",
            Similarity::Tversky => "TVERSKY",
        }
    }
}

/// A similarity family plus its parameters, ready to compute distances.
#[derive(Debug, Clone, Copy)]
pub struct Measure {
    pub similarity: Similarity,
    pub alpha: f64,
}

impl Measure {
    pub fn tanimoto() -> Self {
        Measure {
            similarity: Similarity::Tanimoto,
            alpha: 0.5,
        }
    }

    pub fn tversky(alpha: f64) -> Self {
        Measure {
            similarity: Similarity::Tversky,
            alpha,
        }
    }

    /// Full distance between two fingerprints of any shapes.
    pub fn distance(&self, a: &Fingerprint, b: &Fingerprint) -> f64 {
        let (common, a_bits, b_bits) = match (a, b) {
            (Fingerprint::Hashed(x), Fingerprint::Hashed(y)) => (
                common_bits(x.words(), y.words()),
                x.num_bits_set(),
                y.num_bits_set(),
            ),
            (Fingerprint::NotHashed(x), Fingerprint::NotHashed(y)) => (
                x.num_bits_in_common(y),
                x.num_bits_set(),
                y.num_bits_set(),
            ),
            // mixed shapes: expand the hashed side to its set-bit positions
            // and run the sorted-ids merge
            (Fingerprint::Hashed(x), Fingerprint::NotHashed(y)) => (
                sorted_common(&x.set_bit_positions(), y.frag_nums()),
                x.num_bits_set(),
                y.num_bits_set(),
            ),
            (Fingerprint::NotHashed(x), Fingerprint::Hashed(y)) => (
                sorted_common(x.frag_nums(), &y.set_bit_positions()),
                x.num_bits_set(),
                y.num_bits_set(),
            ),
        };

        match self.similarity {
            Similarity::Tanimoto => tanimoto_from_counts(a_bits, b_bits, common),
            Similarity::Tversky => {
                // dedicated one-pass counts on the word path, cardinality
                // subtraction everywhere else
                if let (Fingerprint::Hashed(x), Fingerprint::Hashed(y)) = (a, b) {
                    let (c, u, v) = tversky_counts(x.words(), y.words());
                    tversky_from_counts(c, u, v, self.alpha)
                } else {
                    tversky_from_counts(common, a_bits - common, b_bits - common, self.alpha)
                }
            }
        }
    }

    /// Threshold-gated distance: any value `>= threshold` (conventionally
    /// 1.0) may come back for a pair that cannot qualify.
    pub fn distance_within(&self, a: &Fingerprint, b: &Fingerprint, threshold: f64) -> f64 {
        let a_bits = a.num_bits_set() as f64;
        let b_bits = b.num_bits_set() as f64;
        let (lo, hi) = if a_bits < b_bits {
            (a_bits, b_bits)
        } else {
            (b_bits, a_bits)
        };

        let bound = match self.similarity {
            Similarity::Tanimoto => hi,
            Similarity::Tversky => self.alpha * a_bits + (1.0 - self.alpha) * b_bits,
        };
        if lo < (1.0 - threshold) * bound {
            return 1.0;
        }

        self.distance(a, b)
    }
}

fn tanimoto_from_counts(a: u32, b: u32, common: u32) -> f64 {
    let divisor = (a + b - common) as f64;
    if divisor == 0.0 {
        return 1.0;
    }
    1.0 - common as f64 / divisor
}

fn tversky_from_counts(common: u32, a_not_b: u32, b_not_a: u32, alpha: f64) -> f64 {
    let divisor = alpha * a_not_b as f64 + (1.0 - alpha) * b_not_a as f64 + common as f64;
    if divisor == 0.0 {
        return 1.0;
    }
    1.0 - common as f64 / divisor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{HashedFingerprint, NotHashedFingerprint};

    fn hashed(name: &str, bits: &str) -> Fingerprint {
        Fingerprint::Hashed(HashedFingerprint::from_bitstring(name, bits, "").unwrap())
    }

    fn not_hashed(name: &str, ids: &[u32]) -> Fingerprint {
        Fingerprint::NotHashed(NotHashedFingerprint::from_frag_nums(name, ids.to_vec()).unwrap())
    }

    #[test]
    fn tanimoto_hand_computed() {
        // a = 4, b = 3, common = 2 -> d = 1 - 2/5
        let a = hashed("a", "11110000");
        let b = hashed("b", "11001000");
        let d = Measure::tanimoto().distance(&a, &b);
        assert!((d - 0.6).abs() < 1e-12);
    }

    #[test]
    fn tanimoto_identity_and_symmetry() {
        let a = hashed("a", "1011001110");
        let b = hashed("b", "0111000011");
        let m = Measure::tanimoto();
        assert_eq!(m.distance(&a, &a), 0.0);
        assert_eq!(m.distance(&a, &b), m.distance(&b, &a));
    }

    #[test]
    fn empty_both_is_distance_one() {
        let a = hashed("a", "0000");
        let b = hashed("b", "0000");
        assert_eq!(Measure::tanimoto().distance(&a, &b), 1.0);
        assert_eq!(Measure::tversky(0.3).distance(&a, &b), 1.0);
        // and an empty fingerprint is maximally distant from itself
        assert_eq!(Measure::tanimoto().distance(&a, &a), 1.0);
    }

    #[test]
    fn tversky_hand_computed() {
        // a\b = 2, b\a = 1, common = 2, alpha = 0.25:
        // d = 1 - 2 / (0.25*2 + 0.75*1 + 2) = 1 - 2/3.25
        let a = hashed("a", "11110000");
        let b = hashed("b", "11001000");
        let d = Measure::tversky(0.25).distance(&a, &b);
        assert!((d - (1.0 - 2.0 / 3.25)).abs() < 1e-12);
    }

    #[test]
    fn tversky_half_alpha_equals_tanimoto() {
        let a = not_hashed("a", &[1, 4, 9, 200, 301]);
        let b = not_hashed("b", &[4, 9, 77, 301, 500, 911]);
        let dt = Measure::tanimoto().distance(&a, &b);
        let dv = Measure::tversky(0.5).distance(&a, &b);
        assert!((dt - dv).abs() < 1e-12);
    }

    #[test]
    fn tversky_is_asymmetric_off_half() {
        let a = hashed("a", "11111100");
        let b = hashed("b", "11000011");
        let m = Measure::tversky(0.9);
        assert!((m.distance(&a, &b) - m.distance(&b, &a)).abs() > 1e-9);
    }

    #[test]
    fn shapes_agree() {
        let ha = hashed("a", "10110010");
        let hb = hashed("b", "00110110");
        let na = not_hashed("a", &[0, 2, 3, 6]);
        let nb = not_hashed("b", &[2, 3, 5, 6]);
        let m = Measure::tanimoto();
        let expect = m.distance(&ha, &hb);
        assert!((m.distance(&na, &nb) - expect).abs() < 1e-12);
        assert!((m.distance(&ha, &nb) - expect).abs() < 1e-12);
        assert!((m.distance(&na, &hb) - expect).abs() < 1e-12);
    }

    #[test]
    fn gate_skips_hopeless_pairs() {
        // popcounts 2 and 20: best possible tanimoto distance 1 - 2/20 = 0.9
        let sparse = not_hashed("s", &[1, 2]);
        let dense = not_hashed("d", &(1..=20).collect::<Vec<_>>());
        let m = Measure::tanimoto();
        assert_eq!(m.distance_within(&sparse, &dense, 0.5), 1.0);
        // at a looser ceiling the true value must come through
        let full = m.distance(&sparse, &dense);
        assert_eq!(m.distance_within(&sparse, &dense, 0.95), full);
    }

    #[test]
    fn gated_never_lies() {
        // exhaustive sweep over small popcount patterns: gated < T exactly
        // when full < T, and equal when both are below
        let pool: Vec<Fingerprint> = (0u32..64)
            .map(|mask| {
                let ids: Vec<u32> = (0..6).filter(|b| mask >> b & 1 == 1).collect();
                not_hashed(&format!("m{mask}"), &ids)
            })
            .collect();
        for m in [Measure::tanimoto(), Measure::tversky(0.2), Measure::tversky(0.8)] {
            for t in [0.1, 0.3, 0.5, 0.9, 1.0] {
                for a in &pool {
                    for b in &pool {
                        let full = m.distance(a, b);
                        let gated = m.distance_within(a, b, t);
                        if full < t {
                            assert_eq!(gated, full);
                        } else {
                            assert!(gated >= t);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn threshold_one_never_gates() {
        let a = not_hashed("a", &[1]);
        let b = not_hashed("b", &(1..=30).collect::<Vec<_>>());
        let m = Measure::tanimoto();
        assert_eq!(m.distance_within(&a, &b, 1.0), m.distance(&a, &b));
    }

    #[test]
    fn similarity_tokens() {
        assert_eq!(
            Similarity::from_token("TANIMOTO").unwrap(),
            Similarity::Tanimoto
        );
        assert_eq!(
            Similarity::from_token("TVERSKY").unwrap(),
            Similarity::Tversky
        );
        assert!(Similarity::from_token("DICE").is_err());
        assert_eq!(Similarity::Tanimoto.as_token(), "TANIMOTO");
    }
}
