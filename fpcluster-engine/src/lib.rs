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

//! # FPCluster Engine
//!
//! Sphere-exclusion clustering over fingerprint files: neighbor-list
//! construction, the greedy cluster engine, the master/worker coordinator
//! that shards a run across worker tasks, and the singleton-collapse
//! post-pass. Given the same input, settings and worker count, two runs
//! write byte-identical cluster files - and the worker count itself does
//! not change the result either.

pub mod collapse;
pub mod engine;
pub mod load;
pub mod master;
pub mod neighbors;
pub mod protocol;
pub mod worker;

pub use collapse::collapse_singletons;
pub use engine::{find_next_seed, output_clusters, remove_cluster_from_nns, serial_run, RunOutcome};
pub use master::parallel_run;
pub use neighbors::{build_nn_lists, orig_nn_sizes};

use fpcluster_core::error::Result;
use fpcluster_core::ClusterSettings;

/// A complete clustering run: serial or distributed by worker count, then
/// the singleton collapse when its threshold asks for it.
pub fn run(settings: &ClusterSettings) -> Result<RunOutcome> {
    settings.validate()?;
    let outcome = if settings.workers <= 1 {
        serial_run(settings)?
    } else {
        parallel_run(settings)?
    };
    if settings.collapse_singletons() {
        collapse_singletons(settings, &outcome)?;
    }
    Ok(outcome)
}
