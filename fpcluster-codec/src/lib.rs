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

//! # FPCluster Codec
//!
//! File formats: the four fingerprint input formats (binary FLUSH_FPS and
//! BIN_FRAG_NUMS with their endianness-marking magics, textual BITSTRINGS
//! and FRAG_NUMS), transparent gzip wrapping, subset-name files, and the
//! SAMPLES/CSV cluster files with their readers.

pub mod cluster_file;
pub mod fp_file;

pub use cluster_file::{ClusterReader, ClusterRecord, ClusterWriter, SAMPLES_HEADER};
pub use fp_file::{count_fps, open_raw, read_names, read_subset_names, FpReader, FpWriter};
