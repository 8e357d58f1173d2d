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

//! The worker event loop.
//!
//! A worker owns one contiguous shard of neighbor lists and a private copy
//! of the fingerprint array (dropped once the lists are built). It is
//! single-threaded; the mailbox receive is its only blocking point, and the
//! master is the only peer. Anything off-script - a closed channel, an
//! out-of-range cluster index, an unparseable settings blob - kills the
//! worker, and with it the run.

use std::path::PathBuf;

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use fpcluster_core::error::{Error, Result};
use fpcluster_core::ClusterSettings;

use crate::engine::{find_next_seed, remove_cluster_from_nns};
use crate::load::load_store;
use crate::neighbors::{build_nn_lists, orig_nn_sizes};
use crate::protocol::{BestClusterDetails, Command, Reply};

pub fn run_worker(rank: usize, commands: Receiver<Command>, replies: Sender<Reply>) -> Result<()> {
    let mut base_dir: Option<PathBuf> = None;
    let mut nns: Vec<Vec<u32>> = Vec::new();
    let mut orig_sizes: Vec<u32> = Vec::new();
    let mut in_cluster: Vec<bool> = Vec::new();

    let closed = |what: &str| Error::ProtocolError(format!("worker {rank}: {what} channel closed"));

    loop {
        let command = commands.recv().map_err(|_| closed("command"))?;
        debug!("worker {rank} received {}", command.token());

        match command {
            Command::NewCwd { cwd } => base_dir = Some(cwd),

            Command::SearchDetails {
                settings_blob,
                per_worker,
                rank: my_rank,
            } => {
                let settings: ClusterSettings =
                    serde_json::from_str(&settings_blob).map_err(|e| {
                        Error::ProtocolError(format!("worker {rank}: bad settings blob: {e}"))
                    })?;
                let store = load_store(&settings, base_dir.as_deref())?;

                let start = (my_rank - 1) * per_worker;
                let stop = start.saturating_add(per_worker);
                nns = build_nn_lists(
                    &store,
                    settings.measure(),
                    settings.threshold,
                    start,
                    stop,
                    settings.verbose,
                );
                orig_sizes = orig_nn_sizes(store.len(), start.min(store.len()), &nns);
                in_cluster = vec![false; store.len()];
                // lists built; the fingerprints themselves are no longer
                // needed on this side
                drop(store);

                replies
                    .send(Reply::NnListsDone { rank })
                    .map_err(|_| closed("reply"))?;
            }

            Command::SendBestClusterDetails => {
                let best = if nns.is_empty() {
                    None
                } else {
                    let local = find_next_seed(&nns, &orig_sizes);
                    let list = &nns[local];
                    Some((
                        local,
                        BestClusterDetails {
                            size: list.len() as u32,
                            orig_size: orig_sizes[list[0] as usize],
                            seed_index: list[0],
                        },
                    ))
                };
                replies
                    .send(Reply::BestClusterDetails { rank, best })
                    .map_err(|_| closed("reply"))?;
            }

            Command::SendCluster { local_index } => {
                let list = nns.get(local_index).ok_or_else(|| {
                    Error::ProtocolError(format!(
                        "worker {rank}: no neighbor list at index {local_index}"
                    ))
                })?;
                replies
                    .send(Reply::Cluster {
                        rank,
                        members: list.clone(),
                        orig_size: orig_sizes[list[0] as usize],
                    })
                    .map_err(|_| closed("reply"))?;
            }

            Command::CrossOffCluster { members } => {
                if members.iter().any(|&m| m as usize >= in_cluster.len()) {
                    return Err(Error::ProtocolError(format!(
                        "worker {rank}: cross-off for unknown fingerprints"
                    )));
                }
                remove_cluster_from_nns(&members, &mut nns, &mut in_cluster);
            }

            Command::Finished => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::thread;

    fn spawn_worker() -> (
        Sender<Command>,
        Receiver<Reply>,
        thread::JoinHandle<Result<()>>,
    ) {
        let (cmd_tx, cmd_rx) = bounded(8);
        let (reply_tx, reply_rx) = bounded(8);
        let handle = thread::spawn(move || run_worker(1, cmd_rx, reply_tx));
        (cmd_tx, reply_rx, handle)
    }

    #[test]
    fn idle_worker_reports_empty_graph_and_finishes() {
        let (commands, replies, handle) = spawn_worker();
        commands.send(Command::SendBestClusterDetails).unwrap();
        assert_eq!(
            replies.recv().unwrap(),
            Reply::BestClusterDetails {
                rank: 1,
                best: None
            }
        );
        commands.send(Command::Finished).unwrap();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn out_of_range_cluster_request_is_fatal() {
        let (commands, replies, handle) = spawn_worker();
        commands.send(Command::SendCluster { local_index: 3 }).unwrap();
        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)), "{err:?}");
        assert!(replies.recv().is_err());
    }

    #[test]
    fn dropped_master_channel_is_fatal() {
        let (commands, _replies, handle) = spawn_worker();
        drop(commands);
        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[test]
    fn garbage_settings_blob_is_fatal() {
        let (commands, _replies, handle) = spawn_worker();
        commands
            .send(Command::SearchDetails {
                settings_blob: "not json".into(),
                per_worker: 1,
                rank: 1,
            })
            .unwrap();
        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }
}
