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

//! The in-memory fingerprint array.
//!
//! Fingerprints live here for the whole run, in file order. Positional index
//! is the identity the cluster engine works in; names matter only for the
//! subset filter, the output writers and the auxiliary name index.

use tracing::info;

use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;

#[derive(Debug, Default)]
pub struct FingerprintStore {
    fps: Vec<Fingerprint>,
}

impl FingerprintStore {
    pub fn new(fps: Vec<Fingerprint>) -> Self {
        FingerprintStore { fps }
    }

    pub fn len(&self) -> usize {
        self.fps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fps.is_empty()
    }

    pub fn get(&self, index: usize) -> &Fingerprint {
        &self.fps[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fingerprint> {
        self.fps.iter()
    }

    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.fps
    }

    pub fn names(&self) -> Vec<String> {
        self.fps.iter().map(|fp| fp.name().to_string()).collect()
    }

    /// Keep only fingerprints whose name appears in `subset_names`, which
    /// must be sorted ascending. Surviving order is stable.
    pub fn apply_subset(&mut self, subset_names: &[String]) {
        self.fps
            .retain(|fp| subset_names.binary_search_by(|n| n.as_str().cmp(fp.name())).is_ok());
    }

    /// SAMPLES output cannot represent spaces in names. With `fix_spaces`
    /// every space is rewritten to `_`; otherwise the first offending
    /// fingerprint aborts the run.
    pub fn check_names(&mut self, fix_spaces: bool, verbose: bool) -> Result<()> {
        for (i, fp) in self.fps.iter_mut().enumerate() {
            if !fp.name().contains(' ') {
                continue;
            }
            if !fix_spaces {
                return Err(Error::NameError {
                    index: i,
                    name: fp.name().to_string(),
                });
            }
            let fixed = fix_spaces_in_name(fp.name());
            if verbose {
                info!("Fingerprint name {} has space(s). Changing to {}", fp.name(), fixed);
            }
            fp.set_name(fixed);
        }
        Ok(())
    }

    /// Auxiliary name index, sorted by descending name. Only the
    /// incremental-assignment collaborator looks fingerprints up by name;
    /// the descending order is its contract and the lookup comparator below
    /// has to match it.
    pub fn name_index(&self) -> NameIndex {
        let mut entries: Vec<(String, usize)> = self
            .fps
            .iter()
            .enumerate()
            .map(|(i, fp)| (fp.name().to_string(), i))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        NameIndex { entries }
    }
}

/// Name -> position lookup over a descending-sorted copy of the names.
#[derive(Debug)]
pub struct NameIndex {
    entries: Vec<(String, usize)>,
}

impl NameIndex {
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.entries
            .binary_search_by(|(n, _)| name.cmp(n))
            .ok()
            .map(|slot| self.entries[slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn fix_spaces_in_name(name: &str) -> String {
    name.replace(' ', "_")
}
