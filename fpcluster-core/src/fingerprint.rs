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

//! Fingerprint value types.
//!
//! A fingerprint is an opaque bit set identified by a name. It comes in two
//! shapes with identical distance operations:
//!
//! - **Hashed**: a packed bitstring of fixed width, stored as `u32` words with
//!   the popcount cached. All hashed fingerprints in a run share one width.
//! - **Not-hashed**: the original fragment numbers as a strictly increasing
//!   `u32` sequence. Slower to compare but lossless.
//!
//! Bit `i` of a hashed fingerprint lives in word `i / 32` at position
//! `i % 32`, which is exactly the little-endian packing of the on-disk byte
//! stream. A not-hashed fragment number `k` corresponds to hashed bit `k`,
//! so the two shapes can be compared by expanding the hashed side to its
//! set-bit positions.

use crate::bitops::count_bits;
use crate::error::{Error, Result};

/// Packed-bitstring fingerprint with cached popcount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedFingerprint {
    name: String,
    words: Vec<u32>,
    num_bits_set: u32,
    len_bits: u32,
}

impl HashedFingerprint {
    /// Build from the raw on-disk bytes of one record. Bytes pack into words
    /// little-endian; a trailing partial word is zero-padded.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        let mut words = Vec::with_capacity(bytes.len().div_ceil(4));
        for chunk in bytes.chunks(4) {
            let mut buf = [0u8; 4];
            buf[..chunk.len()].copy_from_slice(chunk);
            words.push(u32::from_le_bytes(buf));
        }
        let num_bits_set = count_bits(&words);
        HashedFingerprint {
            name: name.into(),
            words,
            num_bits_set,
            len_bits: bytes.len() as u32 * 8,
        }
    }

    /// Build from a textual bitstring, most significant position first in
    /// reading order: character `i` is bit `i`. With a non-empty separator
    /// the string is split on it and each piece must be a single `0` or `1`.
    pub fn from_bitstring(name: impl Into<String>, bits: &str, separator: &str) -> Result<Self> {
        let mut parsed = Vec::new();
        if separator.is_empty() {
            for ch in bits.chars() {
                parsed.push(bit_from_char(ch, bits)?);
            }
        } else {
            for piece in bits.split(separator) {
                let mut chars = piece.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => parsed.push(bit_from_char(ch, bits)?),
                    _ => {
                        return Err(Error::FormatError(format!(
                            "bad bitstring token {piece:?} in {bits:?}"
                        )))
                    }
                }
            }
        }

        let mut words = vec![0u32; parsed.len().div_ceil(32)];
        for (i, bit) in parsed.iter().enumerate() {
            if *bit {
                words[i / 32] |= 1 << (i % 32);
            }
        }
        let num_bits_set = count_bits(&words);
        Ok(HashedFingerprint {
            name: name.into(),
            words,
            num_bits_set,
            len_bits: parsed.len() as u32,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn num_bits_set(&self) -> u32 {
        self.num_bits_set
    }

    /// Total width in bits, not the popcount.
    pub fn len_bits(&self) -> u32 {
        self.len_bits
    }

    pub fn len_bytes(&self) -> u32 {
        self.len_bits.div_ceil(8)
    }

    /// The raw record bytes, inverse of [`HashedFingerprint::from_bytes`].
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .take(self.len_bytes() as usize)
            .collect()
    }

    /// Render as a `0`/`1` string with `separator` between bits.
    pub fn to_bitstring(&self, separator: &str) -> String {
        let mut out = String::with_capacity(self.len_bits as usize * (1 + separator.len()));
        for i in 0..self.len_bits {
            if i > 0 {
                out.push_str(separator);
            }
            let set = self.words[i as usize / 32] >> (i % 32) & 1;
            out.push(if set == 1 { '1' } else { '0' });
        }
        out
    }

    /// Positions of set bits, ascending. Bridges to the not-hashed kernel.
    pub fn set_bit_positions(&self) -> Vec<u32> {
        let mut positions = Vec::with_capacity(self.num_bits_set as usize);
        for (wi, word) in self.words.iter().enumerate() {
            let mut w = *word;
            while w != 0 {
                positions.push(wi as u32 * 32 + w.trailing_zeros());
                w &= w - 1;
            }
        }
        positions
    }
}

/// Fragment-number fingerprint: a strictly increasing id sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotHashedFingerprint {
    name: String,
    frag_nums: Vec<u32>,
}

impl NotHashedFingerprint {
    /// Validates strict monotonicity; out-of-order or duplicate ids are a
    /// format error.
    pub fn from_frag_nums(name: impl Into<String>, frag_nums: Vec<u32>) -> Result<Self> {
        let name = name.into();
        for pair in frag_nums.windows(2) {
            if pair[1] <= pair[0] {
                return Err(Error::FormatError(format!(
                    "fragment numbers for {name} not strictly increasing: {} then {}",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(NotHashedFingerprint { name, frag_nums })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frag_nums(&self) -> &[u32] {
        &self.frag_nums
    }

    pub fn num_bits_set(&self) -> u32 {
        self.frag_nums.len() as u32
    }

    /// `|A ∩ B|` by linear merge of the two sorted sequences.
    pub fn num_bits_in_common(&self, other: &NotHashedFingerprint) -> u32 {
        sorted_common(&self.frag_nums, &other.frag_nums)
    }
}

/// Intersection size of two strictly increasing slices.
pub fn sorted_common(a: &[u32], b: &[u32]) -> u32 {
    let mut common = 0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                common += 1;
                i += 1;
                j += 1;
            }
        }
    }
    common
}

/// A fingerprint of either shape. Positional index in the loaded array is
/// the identity during clustering; the name only matters for output and for
/// the subset filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    Hashed(HashedFingerprint),
    NotHashed(NotHashedFingerprint),
}

impl Fingerprint {
    pub fn name(&self) -> &str {
        match self {
            Fingerprint::Hashed(fp) => &fp.name,
            Fingerprint::NotHashed(fp) => &fp.name,
        }
    }

    pub fn set_name(&mut self, name: String) {
        match self {
            Fingerprint::Hashed(fp) => fp.name = name,
            Fingerprint::NotHashed(fp) => fp.name = name,
        }
    }

    pub fn num_bits_set(&self) -> u32 {
        match self {
            Fingerprint::Hashed(fp) => fp.num_bits_set(),
            Fingerprint::NotHashed(fp) => fp.num_bits_set(),
        }
    }

    pub fn is_hashed(&self) -> bool {
        matches!(self, Fingerprint::Hashed(_))
    }
}

fn bit_from_char(ch: char, line: &str) -> Result<bool> {
    match ch {
        '0' => Ok(false),
        '1' => Ok(true),
        _ => Err(Error::FormatError(format!(
            "bad character {ch:?} in bitstring {line:?}"
        ))),
    }
}
