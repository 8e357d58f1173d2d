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

//! Singleton collapse.
//!
//! An optional post-pass over a finished run: every singleton gets a second
//! chance to join the cluster of its nearest seed under a looser ceiling.
//! Only the seed and singleton fingerprints are re-read; the cluster file is
//! then rewritten through a temporary file so the original survives any
//! failure on the way.
//!
//! A singleton that attaches gives up its own one-member cluster, and a
//! seed that was itself a singleton stops being one the moment somebody
//! joins it. Candidates are scanned in file order and only a strictly
//! nearer seed displaces the current choice, so the earliest seed wins ties.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use fpcluster_codec::{ClusterReader, ClusterWriter, FpReader};
use fpcluster_core::error::{Error, Result};
use fpcluster_core::store::fix_spaces_in_name;
use fpcluster_core::{ClusterSettings, Fingerprint, OutputFormat};

use crate::engine::RunOutcome;
use crate::load::separator_for;

pub fn collapse_singletons(settings: &ClusterSettings, outcome: &RunOutcome) -> Result<()> {
    if settings.verbose {
        info!(
            "Collapsing singletons at {}: {} singleton(s) to slot into {} cluster(s).",
            settings.singletons_threshold,
            outcome.singleton_names.len(),
            outcome.seed_names.len()
        );
    }

    let mut seed_names = outcome.seed_names.clone();
    seed_names.sort();
    let mut singleton_names = outcome.singleton_names.clone();
    singleton_names.sort();

    let (mut seed_fps, mut singleton_fps) =
        read_seeds_and_singletons(settings, &seed_names, &singleton_names)?;

    let seed_map: HashMap<String, usize> = seed_fps
        .iter()
        .enumerate()
        .filter_map(|(i, fp)| fp.as_ref().map(|fp| (fp.name().to_string(), i)))
        .collect();
    let singleton_map: HashMap<String, usize> = singleton_fps
        .iter()
        .enumerate()
        .filter_map(|(i, fp)| fp.as_ref().map(|fp| (fp.name().to_string(), i)))
        .collect();

    // the singletons attached to each seed, in attachment order
    let mut attached: Vec<Vec<String>> = vec![Vec::new(); seed_fps.len()];
    let measure = settings.measure();

    for i in 0..singleton_fps.len() {
        let Some(singleton) = singleton_fps[i].clone() else {
            continue; // demoted: somebody already joined this one
        };

        let mut nearest_dist = settings.singletons_threshold;
        let mut nearest_seed = None;
        for (j, seed) in seed_fps.iter().enumerate() {
            let Some(seed) = seed else { continue };
            if seed.name() == singleton.name() {
                continue;
            }
            let dist = measure.distance_within(seed, &singleton, settings.singletons_threshold);
            if dist < nearest_dist {
                nearest_dist = dist;
                nearest_seed = Some(j);
            }
        }

        let Some(j) = nearest_seed else {
            debug!("singleton {} has no seed in range", singleton.name());
            continue;
        };
        let seed_name = match &seed_fps[j] {
            Some(seed) => seed.name().to_string(),
            None => continue,
        };
        if settings.verbose {
            info!(
                "Singleton {} goes into cluster of {seed_name} at distance {nearest_dist}",
                singleton.name()
            );
        }
        attached[j].push(singleton.name().to_string());
        // the singleton's own cluster is consumed
        if let Some(&slot) = seed_map.get(singleton.name()) {
            seed_fps[slot] = None;
        }
        // and a seed with members is no longer a singleton
        if let Some(&slot) = singleton_map.get(&seed_name) {
            singleton_fps[slot] = None;
        }
    }

    rewrite_cluster_file(settings, &seed_map, &seed_fps, &attached)
}

/// One pass over the fingerprint file, keeping only seeds and singletons.
/// Every fingerprint can land in both lists: a singleton is also the seed
/// of its own one-member cluster.
fn read_seeds_and_singletons(
    settings: &ClusterSettings,
    seed_names: &[String],
    singleton_names: &[String],
) -> Result<(Vec<Option<Fingerprint>>, Vec<Option<Fingerprint>>)> {
    let mut reader = FpReader::open(
        &settings.input_file,
        settings.input_format,
        separator_for(settings),
    )?;

    let mut seed_fps = Vec::new();
    let mut singleton_fps = Vec::new();
    while let Some(mut fp) = reader.next_fp()? {
        if settings.output_format == OutputFormat::Samples && fp.name().contains(' ') {
            // the cluster file was written with fixed names, match them
            let fixed = fix_spaces_in_name(fp.name());
            fp.set_name(fixed);
        }
        let is_seed = seed_names
            .binary_search_by(|n| n.as_str().cmp(fp.name()))
            .is_ok();
        let is_singleton = singleton_names
            .binary_search_by(|n| n.as_str().cmp(fp.name()))
            .is_ok();
        if is_seed {
            seed_fps.push(Some(fp.clone()));
        }
        if is_singleton {
            singleton_fps.push(Some(fp));
        }
    }
    Ok((seed_fps, singleton_fps))
}

/// Stream the cluster file into a replacement alongside it: consumed seeds
/// drop out, attached singletons append, numbering restarts at 1. The
/// original file is only replaced once the rewrite is complete.
fn rewrite_cluster_file(
    settings: &ClusterSettings,
    seed_map: &HashMap<String, usize>,
    seed_fps: &[Option<Fingerprint>],
    attached: &[Vec<String>],
) -> Result<()> {
    let cluster_path = &settings.output_file;
    let file = File::open(cluster_path).map_err(|e| Error::FileOpen {
        path: cluster_path.clone(),
        source: e,
    })?;
    let mut reader = ClusterReader::new(BufReader::new(file), settings.output_format);

    let dir = cluster_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer =
            ClusterWriter::new(BufWriter::new(temp.as_file_mut()), settings.output_format)?;
        while let Some(cluster) = reader.next_cluster()? {
            let Some(&slot) = seed_map.get(cluster.seed()) else {
                return Err(Error::FormatError(format!(
                    "failed to find seed {} in the seeds map",
                    cluster.seed()
                )));
            };
            if seed_fps[slot].is_none() {
                // a singleton that moved into a different cluster
                continue;
            }
            let mut members = cluster.members;
            members.extend(attached[slot].iter().cloned());
            let refs: Vec<&str> = members.iter().map(String::as_str).collect();
            writer.write_cluster(&refs, cluster.orig_size)?;
        }
        writer.flush()?;
    }

    // atomic rename, with copy-and-delete when the rename cannot cross
    // filesystems
    if let Err(e) = temp.persist(cluster_path) {
        fs::copy(e.file.path(), cluster_path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::serial_run;
    use fpcluster_codec::{ClusterRecord, FpWriter};
    use fpcluster_core::{Fingerprint, InputFormat, NotHashedFingerprint};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn not_hashed(name: &str, ids: Vec<u32>) -> Fingerprint {
        Fingerprint::NotHashed(NotHashedFingerprint::from_frag_nums(name, ids).unwrap())
    }

    fn write_fps(dir: &TempDir, fps: &[Fingerprint]) -> PathBuf {
        let path = dir.path().join("fps.bin");
        let mut w = FpWriter::create(&path, InputFormat::BinFragNums, "").unwrap();
        for fp in fps {
            w.write_fp(fp).unwrap();
        }
        w.finish().unwrap();
        path
    }

    fn read_clusters(path: &Path, format: OutputFormat) -> Vec<ClusterRecord> {
        let mut reader =
            ClusterReader::new(BufReader::new(File::open(path).unwrap()), format);
        let mut clusters = Vec::new();
        while let Some(c) = reader.next_cluster().unwrap() {
            clusters.push(c);
        }
        clusters
    }

    fn five_three_one(dir: &TempDir) -> (PathBuf, Vec<Fingerprint>) {
        let tight1: Vec<u32> = (1..=10).collect();
        let tight2: Vec<u32> = (20..=29).collect();
        // 8 of the second clump's 10 ids plus two strays: distance 1/3 to
        // the clump, inside (threshold, singletons_threshold)
        let straggler: Vec<u32> = (20..=27).chain([100, 101]).collect();

        let mut fps = Vec::new();
        for i in 0..5 {
            fps.push(not_hashed(&format!("big{i}"), tight1.clone()));
        }
        for i in 0..3 {
            fps.push(not_hashed(&format!("mid{i}"), tight2.clone()));
        }
        fps.push(not_hashed("stray", straggler));
        (write_fps(dir, &fps), fps)
    }

    fn run_settings(input: PathBuf, output: PathBuf, format: OutputFormat) -> ClusterSettings {
        ClusterSettings {
            input_file: input,
            output_file: output,
            input_format: InputFormat::BinFragNums,
            output_format: format,
            threshold: 0.3,
            singletons_threshold: 0.5,
            ..ClusterSettings::default()
        }
    }

    #[test]
    fn five_three_one_collapses_to_five_four() {
        for format in [OutputFormat::Samples, OutputFormat::Csv] {
            let dir = TempDir::new().unwrap();
            let (input, _) = five_three_one(&dir);
            let output = dir.path().join("clusters.out");
            let settings = run_settings(input, output.clone(), format);

            let outcome = serial_run(&settings).unwrap();
            let primary = read_clusters(&output, format);
            assert_eq!(
                primary.iter().map(|c| c.members.len()).collect::<Vec<_>>(),
                vec![5, 3, 1]
            );
            assert_eq!(outcome.singleton_names, vec!["stray"]);

            assert!(settings.collapse_singletons());
            collapse_singletons(&settings, &outcome).unwrap();

            let collapsed = read_clusters(&output, format);
            assert_eq!(
                collapsed.iter().map(|c| c.members.len()).collect::<Vec<_>>(),
                vec![5, 4]
            );
            // the straggler lands at the end of the second cluster, whose
            // seed and original size survive the rewrite
            assert_eq!(collapsed[1].seed(), "mid2");
            assert_eq!(collapsed[1].members.last().unwrap(), "stray");
            assert_eq!(collapsed[1].orig_size, 3);
        }
    }

    #[test]
    fn csv_rewrite_renumbers_from_one() {
        let dir = TempDir::new().unwrap();
        let (input, _) = five_three_one(&dir);
        let output = dir.path().join("clusters.csv");
        let settings = run_settings(input, output.clone(), OutputFormat::Csv);
        let outcome = serial_run(&settings).unwrap();
        collapse_singletons(&settings, &outcome).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        let nums: Vec<&str> = text
            .lines()
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(nums, vec!["1", "1", "1", "1", "1", "2", "2", "2", "2"]);
    }

    #[test]
    fn out_of_range_singleton_stays_put() {
        let dir = TempDir::new().unwrap();
        let fps = vec![
            not_hashed("a0", vec![1, 2, 3]),
            not_hashed("a1", vec![1, 2, 3]),
            not_hashed("lonely", vec![500, 501]),
        ];
        let input = write_fps(&dir, &fps);
        let output = dir.path().join("clusters.out");
        let settings = run_settings(input, output.clone(), OutputFormat::Samples);

        let outcome = serial_run(&settings).unwrap();
        collapse_singletons(&settings, &outcome).unwrap();

        let clusters = read_clusters(&output, OutputFormat::Samples);
        assert_eq!(
            clusters.iter().map(|c| c.members.len()).collect::<Vec<_>>(),
            vec![2, 1]
        );
        assert_eq!(clusters[1].members, vec!["lonely"]);
    }

    #[test]
    fn attaching_to_a_singleton_demotes_it() {
        // two mutual singletons: the first attaches to the second, which
        // then stops being a singleton and keeps its (grown) cluster
        let dir = TempDir::new().unwrap();
        let fps = vec![
            not_hashed("x", (1..=10).collect()),
            not_hashed("y", (3..=12).collect()),
        ];
        // d(x, y) = 1 - 8/12 = 1/3: apart at 0.3, together at 0.5
        let input = write_fps(&dir, &fps);
        let output = dir.path().join("clusters.out");
        let settings = run_settings(input, output.clone(), OutputFormat::Samples);

        let outcome = serial_run(&settings).unwrap();
        assert_eq!(outcome.singleton_names.len(), 2);
        collapse_singletons(&settings, &outcome).unwrap();

        let clusters = read_clusters(&output, OutputFormat::Samples);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 2);
        // singletons emit greatest-index-first, so y's cluster came first
        // in the file and x joined it
        assert_eq!(clusters[0].members, vec!["y", "x"]);
    }
}
