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

//! Cluster file formats.
//!
//! Two total orderings of the emission sequence:
//!
//! - **SAMPLES**: header line then
//!   `seed : size(orig_size) : member  member  ` — the member separator is
//!   two spaces and the trailing pair is kept for compatibility with files
//!   people have parsed for years.
//! - **CSV**: no header, one row per member,
//!   `clus_num,cluster_size,seed_name,member_name,orig_size` with 1-based
//!   `clus_num`.
//!
//! The readers exist for the singleton-collapse pass, which re-reads the
//! file it is about to rewrite.

use std::io::{BufRead, Write};

use fpcluster_core::error::{Error, Result};
use fpcluster_core::OutputFormat;

pub const SAMPLES_HEADER: &str = "Molecule name : Cluster size : Cluster Members";

/// One emitted cluster: members in emission order, seed first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRecord {
    pub members: Vec<String>,
    pub orig_size: u32,
}

impl ClusterRecord {
    pub fn seed(&self) -> &str {
        &self.members[0]
    }
}

/// Streams clusters out in emission order, numbering them 1-based.
pub struct ClusterWriter<W: Write> {
    w: W,
    format: OutputFormat,
    next_clus_num: u32,
}

impl<W: Write> ClusterWriter<W> {
    pub fn new(mut w: W, format: OutputFormat) -> Result<Self> {
        if format == OutputFormat::Samples {
            writeln!(w, "{SAMPLES_HEADER}")?;
        }
        Ok(ClusterWriter {
            w,
            format,
            next_clus_num: 1,
        })
    }

    /// `members[0]` is the seed.
    pub fn write_cluster(&mut self, members: &[&str], orig_size: u32) -> Result<()> {
        match self.format {
            OutputFormat::Samples => {
                write!(
                    self.w,
                    "{} : {}({}) : ",
                    members[0],
                    members.len(),
                    orig_size
                )?;
                for member in members {
                    write!(self.w, "{member}  ")?;
                }
                writeln!(self.w)?;
            }
            OutputFormat::Csv => {
                for member in members {
                    writeln!(
                        self.w,
                        "{},{},{},{},{}",
                        self.next_clus_num,
                        members.len(),
                        members[0],
                        member,
                        orig_size
                    )?;
                }
            }
        }
        self.next_clus_num += 1;
        Ok(())
    }

    pub fn clusters_written(&self) -> u32 {
        self.next_clus_num - 1
    }

    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}

/// Reads a cluster file back, one cluster at a time.
pub struct ClusterReader<R: BufRead> {
    r: R,
    format: OutputFormat,
    skipped_header: bool,
}

impl<R: BufRead> ClusterReader<R> {
    pub fn new(r: R, format: OutputFormat) -> Self {
        ClusterReader {
            r,
            format,
            skipped_header: false,
        }
    }

    pub fn next_cluster(&mut self) -> Result<Option<ClusterRecord>> {
        match self.format {
            OutputFormat::Samples => self.next_samples_cluster(),
            OutputFormat::Csv => self.next_csv_cluster(),
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.r.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if !trimmed.trim().is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    fn next_samples_cluster(&mut self) -> Result<Option<ClusterRecord>> {
        if !self.skipped_header {
            self.skipped_header = true;
            if self.next_line()?.is_none() {
                return Ok(None);
            }
        }
        let Some(line) = self.next_line()? else {
            return Ok(None);
        };

        // seed : size(orig) : member  member ...
        let mut tokens = line.split_whitespace();
        let (Some(_seed), Some(":"), Some(sizes), Some(":")) = (
            tokens.next(),
            tokens.next(),
            tokens.next(),
            tokens.next(),
        ) else {
            return Err(Error::FormatError(format!(
                "malformed SAMPLES cluster line {line:?}"
            )));
        };
        let orig_size = sizes
            .split_once('(')
            .and_then(|(_, rest)| rest.strip_suffix(')'))
            .and_then(|orig| orig.parse::<u32>().ok())
            .ok_or_else(|| {
                Error::FormatError(format!("malformed cluster size field {sizes:?}"))
            })?;

        let members: Vec<String> = tokens.map(str::to_string).collect();
        if members.is_empty() {
            return Err(Error::FormatError(format!(
                "cluster line {line:?} has no members"
            )));
        }
        Ok(Some(ClusterRecord { members, orig_size }))
    }

    fn next_csv_cluster(&mut self) -> Result<Option<ClusterRecord>> {
        let Some(line) = self.next_line()? else {
            return Ok(None);
        };
        let (size, member, orig_size) = parse_csv_row(&line)?;

        let mut members = vec![member];
        for _ in 1..size {
            let Some(line) = self.next_line()? else {
                return Err(Error::FormatError(
                    "cluster file ends mid-cluster".into(),
                ));
            };
            let (_, member, _) = parse_csv_row(&line)?;
            members.push(member);
        }
        Ok(Some(ClusterRecord { members, orig_size }))
    }
}

fn parse_csv_row(line: &str) -> Result<(u32, String, u32)> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 5 {
        return Err(Error::FormatError(format!(
            "malformed CSV cluster row {line:?}"
        )));
    }
    let size = fields[1]
        .parse::<u32>()
        .map_err(|_| Error::FormatError(format!("bad cluster size in {line:?}")))?;
    let orig_size = fields[4]
        .parse::<u32>()
        .map_err(|_| Error::FormatError(format!("bad original size in {line:?}")))?;
    Ok((size, fields[3].to_string(), orig_size))
}
