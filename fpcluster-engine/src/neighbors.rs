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

//! Neighbor-list construction.
//!
//! For every pivot in a contiguous index range, the threshold-gated neighbor
//! list against the whole array: self first at distance zero, then every
//! qualifying index ascending by distance with ties broken by descending
//! index. Embarrassingly parallel across pivots, which is exactly how the
//! distributed coordinator shards it.

use tracing::info;

use fpcluster_core::{FingerprintStore, Measure};

/// Neighbor lists for pivots `start..stop` (capped at the array length)
/// against the entire store. Each list is the index-only projection, pivot
/// first.
pub fn build_nn_lists(
    store: &FingerprintStore,
    measure: Measure,
    threshold: f64,
    start: usize,
    stop: usize,
    verbose: bool,
) -> Vec<Vec<u32>> {
    let stop = stop.min(store.len());
    let start = start.min(stop);
    if verbose {
        info!("Creating neighbor lists for fps {start} to {stop}");
    }

    let mut nns = Vec::with_capacity(stop - start);
    for i in start..stop {
        let pivot = store.get(i);
        let mut nbs: Vec<(u32, f64)> = vec![(i as u32, 0.0)];
        for j in 0..store.len() {
            if i == j {
                continue;
            }
            let dist = measure.distance_within(pivot, store.get(j), threshold);
            if dist < threshold {
                nbs.push((j as u32, dist));
            }
        }
        // ascending distance, equidistant neighbors by descending index
        nbs[1..].sort_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));
        nns.push(nbs.into_iter().map(|(j, _)| j).collect());

        let done = i - start;
        if verbose && done > 0 && done % 1000 == 0 {
            info!("Generated {done} neighbor lists.");
        }
    }

    if verbose {
        info!("Generated all {} neighbor lists.", stop - start);
    }
    nns
}

/// The write-once original-size table, indexed by global position: the
/// length of the list centered at each pivot, zero outside the local range.
pub fn orig_nn_sizes(num_fps: usize, start: usize, nns: &[Vec<u32>]) -> Vec<u32> {
    let mut sizes = vec![0u32; num_fps];
    for (offset, list) in nns.iter().enumerate() {
        sizes[start + offset] = list.len() as u32;
    }
    sizes
}
