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

//! # FPCluster Core
//!
//! Fingerprint value types and the distance kernels of the FPCluster
//! similarity/clustering engine:
//!
//! - **Bit primitives**: popcount and intersection/difference counts over
//!   packed word streams.
//! - **Fingerprints**: hashed (packed bitstring, cached popcount) and
//!   not-hashed (sorted fragment numbers), with identical distance
//!   operations and on-the-fly mixed-shape comparison.
//! - **Distance kernels**: Tanimoto and Tversky, each in a full and a
//!   threshold-gated early-termination form.
//! - **Fingerprint store**: the as-loaded array with subset filtering, name
//!   fix-up and the descending name index.
//! - **Settings and errors** shared by every FPCluster crate.

pub mod bitops;
pub mod error;
pub mod fingerprint;
pub mod settings;
pub mod similarity;
pub mod store;

pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, HashedFingerprint, NotHashedFingerprint};
pub use settings::{ClusterSettings, InputFormat, OutputFormat};
pub use similarity::{Measure, Similarity};
pub use store::{FingerprintStore, NameIndex};
