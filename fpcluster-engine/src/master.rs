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

//! The master side of the distributed run.
//!
//! The master never computes a neighbor list. It counts the input, shards
//! it, keeps the name table, owns the output file, and drives the cluster
//! loop: gather every worker's best local candidate, reduce with the strict
//! ordering, fetch the winning cluster, write it, broadcast the cross-off.
//! Reply arrival order varies run to run; the reduction does not depend on
//! it, so the emitted sequence is a function of the input, the settings and
//! nothing else.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info};

use fpcluster_codec::{count_fps, ClusterWriter};
use fpcluster_core::error::{Error, Result};
use fpcluster_core::ClusterSettings;

use crate::engine::{resolve_names, RunOutcome};
use crate::load::load_names;
use crate::protocol::{BestClusterDetails, Command, Reply};
use crate::worker::run_worker;

struct WorkerHandle {
    rank: usize,
    commands: Sender<Command>,
    thread: JoinHandle<Result<()>>,
}

impl WorkerHandle {
    fn send(&self, command: Command) -> Result<()> {
        let token = command.token();
        self.commands.send(command).map_err(|_| {
            Error::ProtocolError(format!("worker {} gone before {token}", self.rank))
        })
    }
}

/// Cluster with `settings.workers` worker tasks. Blocks until the run is
/// complete and every worker has shut down.
pub fn parallel_run(settings: &ClusterSettings) -> Result<RunOutcome> {
    // open the output stream right away, in case we can't
    let out_file = File::create(&settings.output_file).map_err(|e| Error::FileOpen {
        path: settings.output_file.clone(),
        source: e,
    })?;
    let mut writer = ClusterWriter::new(BufWriter::new(out_file), settings.output_format)?;

    let (reply_tx, reply_rx) = bounded::<Reply>(settings.workers.max(1) * 2);
    let mut workers = Vec::with_capacity(settings.workers);
    for rank in 1..=settings.workers {
        let (cmd_tx, cmd_rx) = bounded::<Command>(8);
        let replies = reply_tx.clone();
        let thread = thread::Builder::new()
            .name(format!("fpcluster-worker-{rank}"))
            .spawn(move || run_worker(rank, cmd_rx, replies))?;
        workers.push(WorkerHandle {
            rank,
            commands: cmd_tx,
            thread,
        });
    }
    drop(reply_tx);

    let drive_result = drive(settings, &workers, &reply_rx, &mut writer);

    // On a clean run every worker got Finished; on failure, dropping the
    // command senders is what unblocks them.
    let mut worker_err = None;
    for worker in workers {
        drop(worker.commands);
        match worker.thread.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                worker_err.get_or_insert(e);
            }
            Err(_) => {
                worker_err.get_or_insert(Error::ProtocolError("worker panicked".into()));
            }
        }
    }

    match drive_result {
        Ok(outcome) => match worker_err {
            None => Ok(outcome),
            Some(e) => Err(e),
        },
        // a worker's own failure is the root cause of a dead channel
        Err(Error::ProtocolError(msg)) => Err(worker_err.unwrap_or(Error::ProtocolError(msg))),
        Err(e) => Err(e),
    }
}

fn drive<W: Write>(
    settings: &ClusterSettings,
    workers: &[WorkerHandle],
    replies: &Receiver<Reply>,
    writer: &mut ClusterWriter<W>,
) -> Result<RunOutcome> {
    let num_fps = count_fps(&settings.input_file, settings.input_format)?;

    let mut outcome = RunOutcome::default();
    if num_fps == 0 {
        for worker in workers {
            worker.send(Command::Finished)?;
        }
        info!("Clustered 0 fingerprints into 0 clusters.");
        return Ok(outcome);
    }

    // Phase A: working directory, then the job itself
    let cwd = std::env::current_dir()?;
    let per_worker = num_fps.div_ceil(workers.len());
    let blob = serde_json::to_string(settings)
        .map_err(|e| Error::ProtocolError(format!("settings did not serialize: {e}")))?;
    for worker in workers {
        worker.send(Command::NewCwd { cwd: cwd.clone() })?;
    }
    for worker in workers {
        worker.send(Command::SearchDetails {
            settings_blob: blob.clone(),
            per_worker,
            rank: worker.rank,
        })?;
    }
    if settings.verbose {
        info!("Each worker does {per_worker} fps");
    }

    // while the workers grind through their shards, pull out the name table
    let names = load_names(settings, None)?;

    // Phase B barrier: every worker announces its lists are built
    for _ in 0..workers.len() {
        match replies.recv() {
            Ok(Reply::NnListsDone { rank }) => {
                if settings.verbose {
                    info!("Worker {rank} has finished neighbor lists.");
                }
            }
            Ok(other) => {
                return Err(Error::ProtocolError(format!(
                    "expected NNLists_Done, worker {} sent {}",
                    other.rank(),
                    other.token()
                )))
            }
            Err(_) => return Err(Error::ProtocolError("worker channel closed".into())),
        }
    }

    // Phase C: the cluster loop
    let mut total = 0usize;
    loop {
        for worker in workers {
            worker.send(Command::SendBestClusterDetails)?;
        }

        let mut best: Option<(usize, usize, BestClusterDetails)> = None;
        for _ in 0..workers.len() {
            match replies.recv() {
                Ok(Reply::BestClusterDetails {
                    rank,
                    best: Some((local_index, details)),
                }) => {
                    debug!(
                        "worker {rank} offers size {} orig {} seed {}",
                        details.size, details.orig_size, details.seed_index
                    );
                    let better = match &best {
                        None => true,
                        Some((_, _, current)) => details.key() > current.key(),
                    };
                    if better {
                        best = Some((rank, local_index, details));
                    }
                }
                Ok(Reply::BestClusterDetails { best: None, .. }) => {}
                Ok(other) => {
                    return Err(Error::ProtocolError(format!(
                        "expected best-cluster details, worker {} sent {}",
                        other.rank(),
                        other.token()
                    )))
                }
                Err(_) => return Err(Error::ProtocolError("worker channel closed".into())),
            }
        }

        // every worker reported an empty graph: clustering is complete
        let Some((rank, local_index, details)) = best else {
            break;
        };

        workers[rank - 1].send(Command::SendCluster { local_index })?;
        let (members, orig_size) = match replies.recv() {
            Ok(Reply::Cluster {
                rank: from,
                members,
                orig_size,
            }) if from == rank => (members, orig_size),
            Ok(other) => {
                return Err(Error::ProtocolError(format!(
                    "expected the cluster from worker {rank}, got {} from worker {}",
                    other.token(),
                    other.rank()
                )))
            }
            Err(_) => return Err(Error::ProtocolError("worker channel closed".into())),
        };
        if members.len() as u32 != details.size {
            return Err(Error::ProtocolError(format!(
                "worker {rank} sent the wrong cluster: advertised size {}, delivered {}",
                details.size,
                members.len()
            )));
        }

        let member_names = resolve_names(&names, &members)?;
        writer.write_cluster(&member_names, orig_size)?;
        outcome.seed_names.push(member_names[0].to_string());
        if members.len() == 1 {
            outcome.singleton_names.push(member_names[0].to_string());
        }
        total += members.len();

        let written = outcome.seed_names.len();
        if settings.verbose && written % 100 == 0 {
            info!(
                "Written {written} clusters, average size {}.",
                total / written
            );
        }

        for worker in workers {
            worker.send(Command::CrossOffCluster {
                members: members.clone(),
            })?;
        }
    }

    // Phase D
    for worker in workers {
        worker.send(Command::Finished)?;
    }
    writer.flush()?;

    outcome.num_clusters = outcome.seed_names.len();
    outcome.num_fps = total;
    info!(
        "Clustered {} fingerprints into {} clusters.",
        outcome.num_fps, outcome.num_clusters
    );
    Ok(outcome)
}
