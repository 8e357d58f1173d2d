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

//! Run settings.
//!
//! One `ClusterSettings` value describes a whole run. The master serializes
//! it into the `Search_Details` message so every worker operates on an
//! identical configuration, which is why the struct derives serde traits.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::similarity::{Measure, Similarity};

/// Input fingerprint file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputFormat {
    /// Binary packed bitstrings ("F001" magic).
    FlushFps,
    /// Textual `name bits` lines.
    Bitstrings,
    /// Binary fragment numbers ("N001" magic).
    BinFragNums,
    /// Textual `name id id ...` lines.
    FragNums,
}

impl InputFormat {
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "FLUSH_FPS" => Ok(InputFormat::FlushFps),
            "BITSTRINGS" => Ok(InputFormat::Bitstrings),
            "BIN_FRAG_NUMS" => Ok(InputFormat::BinFragNums),
            "FRAG_NUMS" => Ok(InputFormat::FragNums),
            _ => Err(Error::SettingsInvalid(format!(
                "Unknown input format {token:?}. \
                 Must be FLUSH_FPS, BITSTRINGS, BIN_FRAG_NUMS or FRAG_NUMS."
            ))),
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            InputFormat::FlushFps => "FLUSH_FPS",
            InputFormat::Bitstrings => "BITSTRINGS",
            InputFormat::BinFragNums => "BIN_FRAG_NUMS",
            InputFormat::FragNums => "FRAG_NUMS",
        }
    }

}

/// Cluster file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Samples,
    Csv,
}

impl OutputFormat {
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "SAMPLES" | "SAMPLES_FORMAT" => Ok(OutputFormat::Samples),
            "CSV" | "CSV_FORMAT" => Ok(OutputFormat::Csv),
            _ => Err(Error::SettingsInvalid(format!(
                "Unknown output format {token:?}. Must be SAMPLES_FORMAT or CSV_FORMAT."
            ))),
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            OutputFormat::Samples => "SAMPLES_FORMAT",
            OutputFormat::Csv => "CSV_FORMAT",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSettings {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub subset_file: Option<PathBuf>,
    /// Cluster inclusion ceiling, in `[0, 1]`.
    pub threshold: f64,
    /// Looser ceiling for the singleton-collapse post-pass; `-1.0` disables,
    /// any value above `threshold` triggers it.
    pub singletons_threshold: f64,
    pub similarity: Similarity,
    pub tversky_alpha: f64,
    pub input_format: InputFormat,
    pub output_format: OutputFormat,
    /// Separator between bits for BITSTRINGS input; empty means none.
    pub bitstring_separator: String,
    /// Separator between ids for FRAG_NUMS input.
    pub frag_num_separator: String,
    pub fix_spaces_in_names: bool,
    pub verbose: bool,
    /// Number of neighbor-list workers; 1 selects the single-host engine.
    pub workers: usize,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        ClusterSettings {
            input_file: PathBuf::new(),
            output_file: PathBuf::new(),
            subset_file: None,
            threshold: 0.3,
            singletons_threshold: -1.0,
            similarity: Similarity::Tanimoto,
            tversky_alpha: 0.5,
            input_format: InputFormat::FlushFps,
            output_format: OutputFormat::Samples,
            bitstring_separator: String::new(),
            frag_num_separator: " ".to_string(),
            fix_spaces_in_names: false,
            verbose: false,
            workers: 1,
        }
    }
}

impl ClusterSettings {
    pub fn validate(&self) -> Result<()> {
        if self.input_file.as_os_str().is_empty() {
            return Err(Error::SettingsInvalid("No input file specified.".into()));
        }
        if self.output_file.as_os_str().is_empty() {
            return Err(Error::SettingsInvalid("No output file specified.".into()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::SettingsInvalid(format!(
                "Invalid distance threshold {}.",
                self.threshold
            )));
        }
        if !(-1.0..=1.0).contains(&self.singletons_threshold) {
            return Err(Error::SettingsInvalid(format!(
                "Invalid singletons threshold {}.",
                self.singletons_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.tversky_alpha) {
            return Err(Error::SettingsInvalid(format!(
                "Invalid Tversky alpha {}.",
                self.tversky_alpha
            )));
        }
        if self.workers == 0 {
            return Err(Error::SettingsInvalid(
                "Worker count must be at least 1.".into(),
            ));
        }
        Ok(())
    }

    pub fn measure(&self) -> Measure {
        Measure {
            similarity: self.similarity,
            alpha: self.tversky_alpha,
        }
    }

    /// Whether the singleton-collapse post-pass runs after clustering.
    pub fn collapse_singletons(&self) -> bool {
        self.singletons_threshold > self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ClusterSettings {
        ClusterSettings {
            input_file: PathBuf::from("fps.bin"),
            output_file: PathBuf::from("clusters.out"),
            ..ClusterSettings::default()
        }
    }

    #[test]
    fn defaults_validate_once_paths_are_set() {
        assert!(ClusterSettings::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn ranges_are_enforced() {
        let mut s = valid();
        s.threshold = 1.4;
        assert!(s.validate().is_err());
        let mut s = valid();
        s.tversky_alpha = -0.1;
        assert!(s.validate().is_err());
        let mut s = valid();
        s.singletons_threshold = 2.0;
        assert!(s.validate().is_err());
        let mut s = valid();
        s.workers = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn format_tokens_round_trip() {
        for token in ["FLUSH_FPS", "BITSTRINGS", "BIN_FRAG_NUMS", "FRAG_NUMS"] {
            assert_eq!(InputFormat::from_token(token).unwrap().as_token(), token);
        }
        assert!(InputFormat::from_token("SMILES").is_err());
        assert_eq!(
            OutputFormat::from_token("SAMPLES").unwrap(),
            OutputFormat::Samples
        );
        assert_eq!(
            OutputFormat::from_token("CSV_FORMAT").unwrap(),
            OutputFormat::Csv
        );
        assert!(OutputFormat::from_token("XML").is_err());
    }

    #[test]
    fn collapse_trigger() {
        let mut s = valid();
        assert!(!s.collapse_singletons());
        s.singletons_threshold = 0.5;
        assert!(s.collapse_singletons());
        s.singletons_threshold = 0.2;
        assert!(!s.collapse_singletons());
    }

    #[test]
    fn settings_survive_a_serde_round_trip() {
        let mut s = valid();
        s.subset_file = Some(PathBuf::from("names.txt"));
        s.workers = 4;
        let blob = serde_json::to_string(&s).unwrap();
        let back: ClusterSettings = serde_json::from_str(&blob).unwrap();
        assert_eq!(back.workers, 4);
        assert_eq!(back.subset_file, s.subset_file);
        assert_eq!(back.input_format, s.input_format);
    }
}
