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

//! The sphere-exclusion cluster engine.
//!
//! Greedy emission over a mutable neighbor graph: the list with the most
//! members becomes the next cluster, its members disappear from every
//! surviving list, emptied lists leave the graph, repeat until nothing is
//! left. Every fingerprint is emitted exactly once, and successive cluster
//! sizes never increase.
//!
//! Seed selection is a strict tie-break chain on
//! `(current size, original size of the seed's own list, seed index)`,
//! larger preferred at each step. Indices are unique, so the chain never
//! ties out — and because workers run the identical chain locally before
//! the master reduces their candidates with it again, the emitted sequence
//! does not depend on how many workers took part.

use std::fs::File;
use std::io::{BufWriter, Write};

use tracing::info;

use fpcluster_codec::ClusterWriter;
use fpcluster_core::error::{Error, Result};
use fpcluster_core::ClusterSettings;

use crate::load::load_store;
use crate::neighbors::build_nn_lists;

/// What a clustering run leaves behind for the optional collapse pass.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Seed name of every emitted cluster, in emission order.
    pub seed_names: Vec<String>,
    /// Names of the size-1 clusters, in emission order.
    pub singleton_names: Vec<String>,
    pub num_clusters: usize,
    pub num_fps: usize,
}

/// Index of the next seed: the longest list, breaking ties by greater
/// original size and then greater seed index. `nns` must not contain empty
/// lists and `orig_nn_sizes` is indexed by global position.
pub fn find_next_seed(nns: &[Vec<u32>], orig_nn_sizes: &[u32]) -> usize {
    let key = |list: &[u32]| (list.len(), orig_nn_sizes[list[0] as usize], list[0]);
    let mut best = 0;
    for i in 1..nns.len() {
        if key(&nns[i]) > key(&nns[best]) {
            best = i;
        }
    }
    best
}

/// Batch-remove an emitted cluster from every surviving list.
///
/// `in_cluster` is the reusable membership sidetable, one slot per global
/// position; it must arrive all-false and is handed back all-false. A list
/// whose own seed was emitted empties entirely, and emptied lists drop out
/// of the graph.
pub fn remove_cluster_from_nns(
    cluster: &[u32],
    nns: &mut Vec<Vec<u32>>,
    in_cluster: &mut [bool],
) {
    for &member in cluster {
        in_cluster[member as usize] = true;
    }

    for list in nns.iter_mut() {
        if list.is_empty() {
            continue;
        }
        if in_cluster[list[0] as usize] {
            list.clear();
            continue;
        }
        list.retain(|&member| !in_cluster[member as usize]);
    }
    nns.retain(|list| !list.is_empty());

    for &member in cluster {
        in_cluster[member as usize] = false;
    }
}

/// Run the emission loop to exhaustion, writing clusters as they fall out.
pub fn output_clusters<W: Write>(
    fp_names: &[String],
    mut nns: Vec<Vec<u32>>,
    writer: &mut ClusterWriter<W>,
    verbose: bool,
) -> Result<RunOutcome> {
    let mut orig_nn_sizes = vec![0u32; fp_names.len()];
    for list in &nns {
        orig_nn_sizes[list[0] as usize] = list.len() as u32;
    }
    let mut in_cluster = vec![false; fp_names.len()];

    let mut outcome = RunOutcome::default();
    let mut total = 0usize;
    while !nns.is_empty() {
        let next = find_next_seed(&nns, &orig_nn_sizes);
        let cluster = std::mem::take(&mut nns[next]);

        let member_names = resolve_names(fp_names, &cluster)?;
        writer.write_cluster(&member_names, orig_nn_sizes[cluster[0] as usize])?;
        outcome.seed_names.push(member_names[0].to_string());
        if cluster.len() == 1 {
            outcome.singleton_names.push(member_names[0].to_string());
        }
        total += cluster.len();

        remove_cluster_from_nns(&cluster, &mut nns, &mut in_cluster);

        let written = outcome.seed_names.len();
        if verbose && written % 100 == 0 {
            info!(
                "Written {written} clusters, average size {}.",
                total / written
            );
        }
    }

    outcome.num_clusters = outcome.seed_names.len();
    outcome.num_fps = total;
    info!(
        "Clustered {} fingerprints into {} clusters.",
        outcome.num_fps, outcome.num_clusters
    );
    Ok(outcome)
}

pub(crate) fn resolve_names<'a>(fp_names: &'a [String], cluster: &[u32]) -> Result<Vec<&'a str>> {
    cluster
        .iter()
        .map(|&i| {
            fp_names
                .get(i as usize)
                .map(String::as_str)
                .ok_or_else(|| {
                    Error::ProtocolError(format!(
                        "cluster member index {i} out of range ({} names)",
                        fp_names.len()
                    ))
                })
        })
        .collect()
}

/// The whole single-host run: load, build neighbor lists, cluster.
pub fn serial_run(settings: &ClusterSettings) -> Result<RunOutcome> {
    // open the output right away; better to find out now than after a long
    // neighbor-list build
    let out_file = File::create(&settings.output_file).map_err(|e| Error::FileOpen {
        path: settings.output_file.clone(),
        source: e,
    })?;
    let mut writer = ClusterWriter::new(BufWriter::new(out_file), settings.output_format)?;

    let store = load_store(settings, None)?;
    let names = store.names();
    let nns = build_nn_lists(
        &store,
        settings.measure(),
        settings.threshold,
        0,
        store.len(),
        settings.verbose,
    );
    drop(store);

    let outcome = output_clusters(&names, nns, &mut writer, settings.verbose)?;
    writer.flush()?;
    Ok(outcome)
}
