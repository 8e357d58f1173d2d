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

//! FPCluster CLI
//!
//! Sphere-exclusion clustering of a fingerprint file.
//!
//! ## Usage
//!
//! ```bash
//! # cluster a binary fingerprint file at the default threshold
//! fpcluster -I fps.bin -O clusters.out
//!
//! # four workers, CSV output, collapse singletons at a looser ceiling
//! fpcluster -I fps.bin.gz -O clusters.csv --workers 4 \
//!     --output-format CSV_FORMAT -T 0.35 --singletons-threshold 0.5
//!
//! # textual fragment numbers, restricted to a named subset
//! fpcluster -I frags.txt -F FRAG_NUMS -S subset.txt -O clusters.out
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fpcluster_core::{ClusterSettings, InputFormat, OutputFormat, Similarity};

/// Sphere-exclusion clustering of chemical fingerprints
#[derive(Parser)]
#[command(name = "fpcluster")]
#[command(about = "Sphere-exclusion clustering of fingerprint files")]
struct Cli {
    /// Name of input fingerprint file
    #[arg(short = 'I', long)]
    input_file: PathBuf,

    /// Name of the output clusters file
    #[arg(short = 'O', long)]
    output_file: PathBuf,

    /// File of fingerprint names giving the subset to cluster
    #[arg(short = 'S', long)]
    subset_file: Option<PathBuf>,

    /// Clustering threshold
    #[arg(short = 'T', long, default_value = "0.3")]
    threshold: f64,

    /// Threshold for collapsing singletons; -1 disables the pass
    #[arg(long, default_value = "-1.0", allow_hyphen_values = true)]
    singletons_threshold: f64,

    /// Input format: FLUSH_FPS|BITSTRINGS|BIN_FRAG_NUMS|FRAG_NUMS
    #[arg(short = 'F', long, default_value = "FLUSH_FPS")]
    input_format: String,

    /// Output format: SAMPLES_FORMAT|CSV_FORMAT
    #[arg(long, default_value = "SAMPLES_FORMAT")]
    output_format: String,

    /// Similarity measure: TANIMOTO|TVERSKY
    #[arg(long, default_value = "TANIMOTO")]
    similarity: String,

    /// Tversky alpha weight
    #[arg(long, default_value = "0.5")]
    tversky_alpha: f64,

    /// For BITSTRINGS input, the separator between bits (default none)
    #[arg(long, default_value = "")]
    bitstring_separator: String,

    /// For FRAG_NUMS input, the separator between numbers (default space)
    #[arg(long, default_value = " ")]
    frag_num_separator: String,

    /// Change spaces in fingerprint names to '_' so they don't break the
    /// SAMPLES format
    #[arg(long)]
    fix_spaces_in_names: bool,

    /// Number of neighbor-list workers
    #[arg(short = 'W', long, default_value = "1")]
    workers: usize,

    /// Verbose progress reporting
    #[arg(short = 'V', long)]
    verbose: bool,
}

impl Cli {
    fn into_settings(self) -> Result<ClusterSettings> {
        Ok(ClusterSettings {
            input_file: self.input_file,
            output_file: self.output_file,
            subset_file: self.subset_file,
            threshold: self.threshold,
            singletons_threshold: self.singletons_threshold,
            similarity: Similarity::from_token(&self.similarity)?,
            tversky_alpha: self.tversky_alpha,
            input_format: InputFormat::from_token(&self.input_format)?,
            output_format: OutputFormat::from_token(&self.output_format)?,
            bitstring_separator: self.bitstring_separator,
            frag_num_separator: self.frag_num_separator,
            fix_spaces_in_names: self.fix_spaces_in_names,
            verbose: self.verbose,
            workers: self.workers,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let settings = cli.into_settings()?;
    let outcome = fpcluster_engine::run(&settings)?;

    println!(
        "Clustered {} fingerprint{} into {} cluster{}.",
        outcome.num_fps,
        if outcome.num_fps == 1 { "" } else { "s" },
        outcome.num_clusters,
        if outcome.num_clusters == 1 { "" } else { "s" },
    );
    Ok(())
}
