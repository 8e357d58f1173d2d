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

//! Error types for FPCluster
//!
//! Nothing below the CLI entry point recovers from an error: every layer
//! propagates upward and the run aborts with exit status 1. Partial output
//! files are left on disk for debugging, never truncated.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid settings: {0}")]
    SettingsInvalid(String),

    #[error("Couldn't open {} : {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Format error: {0}")]
    FormatError(String),

    #[error(
        "Fingerprint {index} name {name:?} has space(s) in its name. \
         Either use output format CSV or --fix-spaces-in-names"
    )]
    NameError { index: usize, name: String },

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Fingerprint width mismatch: expected {expected} bytes, got {got}")]
    CapacityError { expected: u32, got: u32 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
