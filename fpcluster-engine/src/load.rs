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

//! Shared fingerprint loading: read, subset-filter, fix names.
//!
//! The serial engine, every worker and the singleton-collapse pass all load
//! the same way so that positional indices and names agree everywhere.

use std::path::{Path, PathBuf};

use fpcluster_codec::{read_subset_names, FpReader};
use fpcluster_core::error::Result;
use fpcluster_core::store::fix_spaces_in_name;
use fpcluster_core::{ClusterSettings, Error, FingerprintStore, InputFormat, OutputFormat};

/// Relative paths resolve against the master's working directory, which
/// workers learn from the `New_CWD` message. A process-wide `chdir` would
/// race between worker threads, so the base directory travels explicitly.
pub fn resolve_path(path: &Path, base_dir: Option<&Path>) -> PathBuf {
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

pub fn separator_for(settings: &ClusterSettings) -> &str {
    match settings.input_format {
        InputFormat::Bitstrings => &settings.bitstring_separator,
        InputFormat::FragNums => &settings.frag_num_separator,
        _ => "",
    }
}

/// Load the full fingerprint array, apply the subset filter, and enforce
/// the SAMPLES name rules.
pub fn load_store(
    settings: &ClusterSettings,
    base_dir: Option<&Path>,
) -> Result<FingerprintStore> {
    let input = resolve_path(&settings.input_file, base_dir);
    let reader = FpReader::open(&input, settings.input_format, separator_for(settings))?;
    let mut store = FingerprintStore::new(reader.read_all()?);

    if let Some(subset) = &settings.subset_file {
        let subset_names = read_subset_names(&resolve_path(subset, base_dir))?;
        store.apply_subset(&subset_names);
    }

    if settings.output_format == OutputFormat::Samples {
        store.check_names(settings.fix_spaces_in_names, settings.verbose)?;
    }
    Ok(store)
}

/// The master's name table: same file walk and the same filtering as
/// [`load_store`], without decoding any fingerprint payloads.
pub fn load_names(settings: &ClusterSettings, base_dir: Option<&Path>) -> Result<Vec<String>> {
    let input = resolve_path(&settings.input_file, base_dir);
    let mut names = fpcluster_codec::read_names(&input, settings.input_format)?;

    if let Some(subset) = &settings.subset_file {
        let subset_names = read_subset_names(&resolve_path(subset, base_dir))?;
        names.retain(|n| subset_names.binary_search(n).is_ok());
    }

    if settings.output_format == OutputFormat::Samples {
        for (i, name) in names.iter_mut().enumerate() {
            if !name.contains(' ') {
                continue;
            }
            if !settings.fix_spaces_in_names {
                return Err(Error::NameError {
                    index: i,
                    name: name.clone(),
                });
            }
            *name = fix_spaces_in_name(name);
        }
    }
    Ok(names)
}
