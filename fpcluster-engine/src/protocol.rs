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

//! The master/worker control language.
//!
//! Seven string-tagged messages drive a run:
//!
//! ```text
//!              master                                 worker
//!                │  New_CWD + directory                 │
//!                │──────────────────────────────────────▶
//!                │  Search_Details + settings blob      │
//!                │    + per_worker + rank               │
//!                │──────────────────────────────────────▶
//!                │                        NNLists_Done  │
//!                ◀──────────────────────────────────────│
//!   per round:   │  Send_Best_Cluster_Details           │
//!                │──────────────────────────────────────▶
//!                │      best index + details, or "-1"   │
//!                ◀──────────────────────────────────────│
//!   winner only: │  Send_Cluster + local index          │
//!                │──────────────────────────────────────▶
//!                │        size + members + orig size    │
//!                ◀──────────────────────────────────────│
//!                │  Cross_Off_Cluster + members         │
//!                │──────────────────────────────────────▶
//!   shutdown:    │  Finished                            │
//!                │──────────────────────────────────────▶
//! ```
//!
//! The transport here is a pair of crossbeam channels per worker direction:
//! a private command mailbox each, and one shared reply channel the master
//! receives from in arrival order (the probe-any of the original transport).
//! Replies carry their source rank, and FIFO order per pair is the channel's
//! own guarantee. Both sides treat a closed channel or an out-of-contract
//! message as fatal; there are no retries and no timeouts.

/// Master-to-worker commands. `token()` is the message's literal wire tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Directory against which the worker resolves relative paths.
    NewCwd { cwd: std::path::PathBuf },
    /// The serialized settings blob plus this worker's share of the work.
    SearchDetails {
        settings_blob: String,
        per_worker: usize,
        rank: usize,
    },
    SendBestClusterDetails,
    SendCluster { local_index: usize },
    CrossOffCluster { members: Vec<u32> },
    Finished,
}

impl Command {
    pub fn token(&self) -> &'static str {
        match self {
            Command::NewCwd { .. } => "New_CWD",
            Command::SearchDetails { .. } => "Search_Details",
            Command::SendBestClusterDetails => "Send_Best_Cluster_Details",
            Command::SendCluster { .. } => "Send_Cluster",
            Command::CrossOffCluster { .. } => "Cross_Off_Cluster",
            Command::Finished => "Finished",
        }
    }
}

/// What a worker advertises about its current best local cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestClusterDetails {
    pub size: u32,
    pub orig_size: u32,
    pub seed_index: u32,
}

impl BestClusterDetails {
    /// The strict reduction ordering: larger size, then larger original
    /// size, then larger seed index. Seed indices are globally unique, so
    /// two live candidates never compare equal.
    pub fn key(&self) -> (u32, u32, u32) {
        (self.size, self.orig_size, self.seed_index)
    }
}

/// Worker-to-master replies, tagged with the sender's rank.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    NnListsDone {
        rank: usize,
    },
    /// `None` is the "-1" reply of a worker whose graph has emptied.
    BestClusterDetails {
        rank: usize,
        best: Option<(usize, BestClusterDetails)>,
    },
    Cluster {
        rank: usize,
        members: Vec<u32>,
        orig_size: u32,
    },
}

impl Reply {
    pub fn rank(&self) -> usize {
        match self {
            Reply::NnListsDone { rank }
            | Reply::BestClusterDetails { rank, .. }
            | Reply::Cluster { rank, .. } => *rank,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Reply::NnListsDone { .. } => "NNLists_Done",
            Reply::BestClusterDetails { .. } => "Best_Cluster_Details",
            Reply::Cluster { .. } => "Cluster",
        }
    }
}
