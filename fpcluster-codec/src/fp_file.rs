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

//! Fingerprint file formats.
//!
//! ## Binary layout
//!
//! ```text
//! FLUSH_FPS                            BIN_FRAG_NUMS
//! ┌──────────────────────────┐         ┌──────────────────────────┐
//! │ magic "F001" (optional)  │         │ magic "N001" (optional)  │
//! │ num_bytes_per_fp : u32   │         ├──────────────────────────┤
//! │ reserved         : u32   │         │ name_len : u32           │
//! ├──────────────────────────┤         │ name bytes + NUL         │
//! │ name_len : u32           │         │ num_ids  : u32           │
//! │ name bytes + NUL         │         │ ids      : u32 × num_ids │
//! │ fp bytes × num_bytes     │         ├──────────────────────────┤
//! ├──────────────────────────┤         │ ...                      │
//! │ ...                      │         └──────────────────────────┘
//! └──────────────────────────┘
//! ```
//!
//! The magic doubles as the endianness marker: read in file order, `"F001"`
//! means every subsequent `u32` is big-endian, the byte-swapped `"100F"`
//! means little-endian. Anything else is the headerless legacy layout, no
//! byte swap, and those first four bytes are `num_bytes_per_fp` itself.
//! Writers always emit the little-endian form, so a file loaded without
//! byte-swapping rewrites byte-identically.
//!
//! Textual BITSTRINGS (`name 010110...`) and FRAG_NUMS (`name 3 17 99`)
//! carry one fingerprint per line with caller-supplied separators.
//!
//! All files may be gzip-wrapped; detection is by `.gz` extension or the
//! gzip magic, transparently for every format.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use fpcluster_core::error::{Error, Result};
use fpcluster_core::fingerprint::{HashedFingerprint, NotHashedFingerprint};
use fpcluster_core::{Fingerprint, InputFormat};

/// Packed-bitstring file magic, as stored on a big-endian writer.
pub const FP_MAGIC: [u8; 4] = *b"F001";
/// The same magic after a byte swap: integers are little-endian.
pub const FP_MAGIC_SWAPPED: [u8; 4] = *b"100F";
/// Fragment-number file magic.
pub const FN_MAGIC: [u8; 4] = *b"N001";
pub const FN_MAGIC_SWAPPED: [u8; 4] = *b"100N";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// Caps on lengths decoded from headerless or corrupt files, so a garbage
// leading integer surfaces as a format error instead of an allocation.
const MAX_NAME_LEN: u32 = 1 << 20;
const MAX_FP_BYTES: u32 = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntOrder {
    Little,
    Big,
}

fn read_u32(r: &mut impl Read, order: IntOrder) -> io::Result<u32> {
    match order {
        IntOrder::Little => r.read_u32::<LittleEndian>(),
        IntOrder::Big => r.read_u32::<BigEndian>(),
    }
}

/// Open a fingerprint file for byte-level reading, unwrapping gzip when the
/// path ends in `.gz` or the content starts with the gzip magic.
pub fn open_raw(path: &Path) -> Result<Box<dyn Read>> {
    let mut file = File::open(path).map_err(|e| Error::FileOpen {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut head = [0u8; 2];
    let got = file.read(&mut head)?;
    file.seek(SeekFrom::Start(0))?;

    let by_extension = path.extension().is_some_and(|ext| ext == "gz");
    if by_extension || (got == 2 && head == GZIP_MAGIC) {
        debug!("reading {} through gzip", path.display());
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Streaming fingerprint reader over any of the four input formats.
pub struct FpReader {
    inner: ReaderKind,
}

enum ReaderKind {
    FlushFps {
        r: Box<dyn Read>,
        order: IntOrder,
        num_bytes_per_fp: u32,
    },
    BinFragNums {
        r: Box<dyn Read>,
        order: IntOrder,
    },
    Bitstrings {
        lines: std::io::Lines<BufReader<Box<dyn Read>>>,
        separator: String,
        len_bits: Option<u32>,
    },
    FragNums {
        lines: std::io::Lines<BufReader<Box<dyn Read>>>,
        separator: String,
    },
}

impl FpReader {
    /// `separator` is the bit separator for BITSTRINGS and the id separator
    /// for FRAG_NUMS; binary formats ignore it.
    pub fn open(path: &Path, format: InputFormat, separator: &str) -> Result<Self> {
        let mut r = open_raw(path)?;
        let inner = match format {
            InputFormat::FlushFps => {
                let (order, num_bytes_per_fp) = read_binary_header(&mut r, FP_MAGIC, FP_MAGIC_SWAPPED)?;
                if num_bytes_per_fp == 0 || num_bytes_per_fp > MAX_FP_BYTES {
                    return Err(Error::FormatError(format!(
                        "implausible fingerprint width {num_bytes_per_fp} bytes in {}",
                        path.display()
                    )));
                }
                ReaderKind::FlushFps {
                    r,
                    order,
                    num_bytes_per_fp,
                }
            }
            InputFormat::BinFragNums => {
                let (order, r) = read_frag_header(r)?;
                ReaderKind::BinFragNums { r, order }
            }
            InputFormat::Bitstrings => ReaderKind::Bitstrings {
                lines: BufReader::new(r).lines(),
                separator: separator.to_string(),
                len_bits: None,
            },
            InputFormat::FragNums => {
                let separator = if separator.is_empty() { " " } else { separator };
                ReaderKind::FragNums {
                    lines: BufReader::new(r).lines(),
                    separator: separator.to_string(),
                }
            }
        };
        Ok(FpReader { inner })
    }

    /// Width of one record's fingerprint bytes; FLUSH_FPS only.
    pub fn num_bytes_per_fp(&self) -> Option<u32> {
        match &self.inner {
            ReaderKind::FlushFps {
                num_bytes_per_fp, ..
            } => Some(*num_bytes_per_fp),
            _ => None,
        }
    }

    /// Next fingerprint, or `None` at a clean end of file. EOF anywhere but
    /// a record boundary is a format error.
    pub fn next_fp(&mut self) -> Result<Option<Fingerprint>> {
        match &mut self.inner {
            ReaderKind::FlushFps {
                r,
                order,
                num_bytes_per_fp,
            } => {
                let Some(name) = read_record_name(r, *order)? else {
                    return Ok(None);
                };
                let mut bytes = vec![0u8; *num_bytes_per_fp as usize];
                if !read_fully_or_eof(r, &mut bytes)? {
                    return Err(Error::FormatError(format!(
                        "truncated fingerprint record for {name}"
                    )));
                }
                Ok(Some(Fingerprint::Hashed(HashedFingerprint::from_bytes(
                    name, &bytes,
                ))))
            }
            ReaderKind::BinFragNums { r, order } => {
                let Some(name) = read_record_name(r, *order)? else {
                    return Ok(None);
                };
                let num_ids = read_u32(r, *order)
                    .map_err(|_| Error::FormatError(format!("truncated record for {name}")))?;
                if num_ids > MAX_FP_BYTES {
                    return Err(Error::FormatError(format!(
                        "implausible fragment count {num_ids} for {name}"
                    )));
                }
                let mut ids = Vec::with_capacity(num_ids as usize);
                for _ in 0..num_ids {
                    ids.push(read_u32(r, *order).map_err(|_| {
                        Error::FormatError(format!("truncated fragment numbers for {name}"))
                    })?);
                }
                Ok(Some(Fingerprint::NotHashed(
                    NotHashedFingerprint::from_frag_nums(name, ids)?,
                )))
            }
            ReaderKind::Bitstrings {
                lines,
                separator,
                len_bits,
            } => {
                let Some((name, rest)) = next_text_record(lines)? else {
                    return Ok(None);
                };
                let fp = HashedFingerprint::from_bitstring(name, &rest, separator)?;
                match *len_bits {
                    None => *len_bits = Some(fp.len_bits()),
                    Some(expected) if expected != fp.len_bits() => {
                        return Err(Error::CapacityError {
                            expected,
                            got: fp.len_bits(),
                        });
                    }
                    Some(_) => {}
                }
                Ok(Some(Fingerprint::Hashed(fp)))
            }
            ReaderKind::FragNums { lines, separator } => {
                let Some((name, rest)) = next_text_record(lines)? else {
                    return Ok(None);
                };
                let mut ids = Vec::new();
                for token in rest.split(separator.as_str()).filter(|t| !t.is_empty()) {
                    let id = token.parse::<u32>().map_err(|_| {
                        Error::FormatError(format!(
                            "bad fragment number {token:?} for {name}"
                        ))
                    })?;
                    ids.push(id);
                }
                Ok(Some(Fingerprint::NotHashed(
                    NotHashedFingerprint::from_frag_nums(name, ids)?,
                )))
            }
        }
    }

    pub fn read_all(mut self) -> Result<Vec<Fingerprint>> {
        let mut fps = Vec::new();
        while let Some(fp) = self.next_fp()? {
            fps.push(fp);
        }
        Ok(fps)
    }
}

/// Count the records in a fingerprint file without building fingerprints.
/// This is the master's cheap pre-scan for shard sizing.
pub fn count_fps(path: &Path, format: InputFormat) -> Result<usize> {
    walk_records(path, format, |_| {})
}

/// The name of every record, in file order, decoding nothing else.
pub fn read_names(path: &Path, format: InputFormat) -> Result<Vec<String>> {
    let mut names = Vec::new();
    walk_records(path, format, |name| names.push(name.to_string()))?;
    Ok(names)
}

fn walk_records(
    path: &Path,
    format: InputFormat,
    mut on_name: impl FnMut(&str),
) -> Result<usize> {
    // binary formats can skip fingerprint payloads; for textual ones a line
    // scan is already as cheap as it gets
    let mut count = 0;
    match format {
        InputFormat::FlushFps => {
            let mut r = open_raw(path)?;
            let (order, num_bytes) = read_binary_header(&mut r, FP_MAGIC, FP_MAGIC_SWAPPED)?;
            while let Some(name) = read_record_name(&mut r, order)? {
                if !skip_bytes(&mut r, num_bytes as u64)? {
                    return Err(Error::FormatError(format!(
                        "truncated fingerprint record for {name}"
                    )));
                }
                on_name(&name);
                count += 1;
            }
        }
        InputFormat::BinFragNums => {
            let r = open_raw(path)?;
            let (order, mut r) = read_frag_header(r)?;
            while let Some(name) = read_record_name(&mut r, order)? {
                let num_ids = read_u32(&mut r, order)
                    .map_err(|_| Error::FormatError(format!("truncated record for {name}")))?;
                if !skip_bytes(&mut r, num_ids as u64 * 4)? {
                    return Err(Error::FormatError(format!(
                        "truncated fragment numbers for {name}"
                    )));
                }
                on_name(&name);
                count += 1;
            }
        }
        InputFormat::Bitstrings | InputFormat::FragNums => {
            let r = open_raw(path)?;
            let mut lines = BufReader::new(r).lines();
            while let Some((name, _)) = next_text_record(&mut lines)? {
                on_name(&name);
                count += 1;
            }
        }
    }
    Ok(count)
}

fn read_binary_header(r: &mut impl Read, magic: [u8; 4], swapped: [u8; 4]) -> Result<(IntOrder, u32)> {
    let mut head = [0u8; 4];
    if !read_fully_or_eof(r, &mut head)? {
        return Err(Error::FormatError("empty fingerprint file".into()));
    }

    let (order, num_bytes) = if head == magic {
        debug!("big-endian fingerprint file");
        let n = read_u32(r, IntOrder::Big)
            .map_err(|_| Error::FormatError("truncated file header".into()))?;
        (IntOrder::Big, n)
    } else if head == swapped {
        let n = read_u32(r, IntOrder::Little)
            .map_err(|_| Error::FormatError("truncated file header".into()))?;
        (IntOrder::Little, n)
    } else {
        // headerless legacy layout: no magic, no swap, and the leading int
        // was the width all along
        (IntOrder::Little, u32::from_le_bytes(head))
    };

    // the reserved integer
    read_u32(r, order).map_err(|_| Error::FormatError("truncated file header".into()))?;
    Ok((order, num_bytes))
}

// BIN_FRAG_NUMS carries only the magic; records start straight after it.
// Without a recognisable magic the file is headerless and those four bytes
// already belong to the first record, so they are chained back in front.
fn read_frag_header(mut r: Box<dyn Read>) -> Result<(IntOrder, Box<dyn Read>)> {
    let mut head = [0u8; 4];
    if !read_fully_or_eof(&mut r, &mut head)? {
        return Err(Error::FormatError("empty fingerprint file".into()));
    }
    if head == FN_MAGIC {
        debug!("big-endian fragment-number file");
        Ok((IntOrder::Big, r))
    } else if head == FN_MAGIC_SWAPPED {
        Ok((IntOrder::Little, r))
    } else {
        Ok((IntOrder::Little, Box::new(io::Cursor::new(head.to_vec()).chain(r))))
    }
}

/// `Ok(None)` at clean EOF before the length field.
fn read_record_name(r: &mut impl Read, order: IntOrder) -> Result<Option<String>> {
    let mut len_buf = [0u8; 4];
    if !read_fully_or_eof(r, &mut len_buf)? {
        return Ok(None);
    }
    let name_len = match order {
        IntOrder::Little => u32::from_le_bytes(len_buf),
        IntOrder::Big => u32::from_be_bytes(len_buf),
    };
    if name_len > MAX_NAME_LEN {
        return Err(Error::FormatError(format!(
            "implausible name length {name_len}"
        )));
    }

    let mut name_buf = vec![0u8; name_len as usize + 1];
    if !read_fully_or_eof(r, &mut name_buf)? {
        return Err(Error::FormatError("truncated fingerprint name".into()));
    }
    let nul = name_buf.pop();
    if nul != Some(0) {
        return Err(Error::FormatError(
            "fingerprint name missing NUL terminator".into(),
        ));
    }
    let name = String::from_utf8(name_buf)
        .map_err(|e| Error::FormatError(format!("fingerprint name not UTF-8: {e}")))?;
    Ok(Some(name))
}

/// Fill `buf` completely, or report a clean EOF (`false`) if the stream
/// ended before the first byte. EOF part-way through is an error.
fn read_fully_or_eof(r: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(Error::FormatError("truncated record".into()));
        }
        filled += n;
    }
    Ok(true)
}

fn skip_bytes(r: &mut impl Read, mut remaining: u64) -> Result<bool> {
    let mut scratch = [0u8; 4096];
    while remaining > 0 {
        let want = remaining.min(scratch.len() as u64) as usize;
        let n = r.read(&mut scratch[..want])?;
        if n == 0 {
            return Ok(false);
        }
        remaining -= n as u64;
    }
    Ok(true)
}

fn next_text_record(
    lines: &mut std::io::Lines<BufReader<Box<dyn Read>>>,
) -> Result<Option<(String, String)>> {
    for line in lines.by_ref() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some((name, rest)) = trimmed.split_once(char::is_whitespace) else {
            return Err(Error::FormatError(format!(
                "expected `name fingerprint` on line {trimmed:?}"
            )));
        };
        return Ok(Some((name.to_string(), rest.trim_start().to_string())));
    }
    Ok(None)
}

/// Fingerprint writer, inverse of [`FpReader`]. Binary formats come out in
/// the little-endian layout; a `.gz` output path gets gzip-wrapped.
pub struct FpWriter {
    sink: Sink,
    format: InputFormat,
    separator: String,
    num_bytes_per_fp: Option<u32>,
    wrote_header: bool,
}

enum Sink {
    Plain(BufWriter<File>),
    Gz(GzEncoder<BufWriter<File>>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gz(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gz(w) => w.flush(),
        }
    }
}

impl FpWriter {
    pub fn create(path: &Path, format: InputFormat, separator: &str) -> Result<Self> {
        let file = File::create(path).map_err(|e| Error::FileOpen {
            path: path.to_path_buf(),
            source: e,
        })?;
        let buffered = BufWriter::new(file);
        let sink = if path.extension().is_some_and(|ext| ext == "gz") {
            Sink::Gz(GzEncoder::new(buffered, Compression::default()))
        } else {
            Sink::Plain(buffered)
        };
        let separator = match format {
            InputFormat::FragNums if separator.is_empty() => " ".to_string(),
            _ => separator.to_string(),
        };
        Ok(FpWriter {
            sink,
            format,
            separator,
            num_bytes_per_fp: None,
            wrote_header: false,
        })
    }

    pub fn write_fp(&mut self, fp: &Fingerprint) -> Result<()> {
        match (self.format, fp) {
            (InputFormat::FlushFps, Fingerprint::Hashed(hfp)) => {
                if !self.wrote_header {
                    self.sink.write_all(&FP_MAGIC_SWAPPED)?;
                    self.sink.write_u32::<LittleEndian>(hfp.len_bytes())?;
                    self.sink.write_u32::<LittleEndian>(0)?;
                    self.num_bytes_per_fp = Some(hfp.len_bytes());
                    self.wrote_header = true;
                }
                let expected = self.num_bytes_per_fp.unwrap_or(hfp.len_bytes());
                if hfp.len_bytes() != expected {
                    return Err(Error::CapacityError {
                        expected,
                        got: hfp.len_bytes(),
                    });
                }
                write_record_name(&mut self.sink, hfp.name())?;
                self.sink.write_all(&hfp.to_bytes())?;
                Ok(())
            }
            (InputFormat::BinFragNums, Fingerprint::NotHashed(nfp)) => {
                if !self.wrote_header {
                    self.sink.write_all(&FN_MAGIC_SWAPPED)?;
                    self.wrote_header = true;
                }
                write_record_name(&mut self.sink, nfp.name())?;
                self.sink
                    .write_u32::<LittleEndian>(nfp.frag_nums().len() as u32)?;
                for &id in nfp.frag_nums() {
                    self.sink.write_u32::<LittleEndian>(id)?;
                }
                Ok(())
            }
            (InputFormat::Bitstrings, Fingerprint::Hashed(hfp)) => {
                writeln!(
                    self.sink,
                    "{} {}",
                    hfp.name(),
                    hfp.to_bitstring(&self.separator)
                )?;
                Ok(())
            }
            (InputFormat::FragNums, Fingerprint::NotHashed(nfp)) => {
                let ids: Vec<String> = nfp.frag_nums().iter().map(|id| id.to_string()).collect();
                writeln!(self.sink, "{} {}", nfp.name(), ids.join(&self.separator))?;
                Ok(())
            }
            (format, fp) => Err(Error::FormatError(format!(
                "fingerprint {} has the wrong shape for output format {}",
                fp.name(),
                format.as_token()
            ))),
        }
    }

    pub fn finish(self) -> Result<()> {
        match self.sink {
            Sink::Plain(mut w) => w.flush()?,
            Sink::Gz(w) => {
                let mut inner = w.finish()?;
                inner.flush()?;
            }
        }
        Ok(())
    }
}

fn write_record_name(w: &mut impl Write, name: &str) -> Result<()> {
    w.write_u32::<LittleEndian>(name.len() as u32)?;
    w.write_all(name.as_bytes())?;
    w.write_all(&[0])?;
    Ok(())
}

/// Whitespace-separated names from a subset file, sorted ready for the
/// store's binary-search filter.
pub fn read_subset_names(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| Error::FileOpen {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut names = Vec::new();
    for line in BufReader::new(file).lines() {
        for token in line?.split_whitespace() {
            names.push(token.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn hashed(name: &str, bytes: &[u8]) -> Fingerprint {
        Fingerprint::Hashed(HashedFingerprint::from_bytes(name, bytes))
    }

    fn not_hashed(name: &str, ids: &[u32]) -> Fingerprint {
        Fingerprint::NotHashed(NotHashedFingerprint::from_frag_nums(name, ids.to_vec()).unwrap())
    }

    fn write_file(dir: &TempDir, name: &str, format: InputFormat, fps: &[Fingerprint]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut w = FpWriter::create(&path, format, "").unwrap();
        for fp in fps {
            w.write_fp(fp).unwrap();
        }
        w.finish().unwrap();
        path
    }

    #[test]
    fn flush_fps_round_trip_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let fps = vec![
            hashed("mol1", &[0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04]),
            hashed("another molecule name", &[0; 8]),
            hashed("m", &[0xff; 8]),
        ];
        let path = write_file(&dir, "fps.bin", InputFormat::FlushFps, &fps);
        let first = fs::read(&path).unwrap();
        assert_eq!(&first[..4], &FP_MAGIC_SWAPPED);

        let reader = FpReader::open(&path, InputFormat::FlushFps, "").unwrap();
        let loaded = reader.read_all().unwrap();
        assert_eq!(loaded, fps);

        let again = write_file(&dir, "fps2.bin", InputFormat::FlushFps, &loaded);
        assert_eq!(fs::read(&again).unwrap(), first);
    }

    #[test]
    fn flush_fps_big_endian_header_is_byteswapped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("be.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&FP_MAGIC);
        bytes.extend_from_slice(&4u32.to_be_bytes()); // num_bytes_per_fp
        bytes.extend_from_slice(&0u32.to_be_bytes()); // reserved
        bytes.extend_from_slice(&3u32.to_be_bytes()); // name_len
        bytes.extend_from_slice(b"abc\0");
        bytes.extend_from_slice(&[0x0f, 0x00, 0x00, 0xf0]);
        fs::write(&path, &bytes).unwrap();

        let reader = FpReader::open(&path, InputFormat::FlushFps, "").unwrap();
        assert_eq!(reader.num_bytes_per_fp(), Some(4));
        let fps = reader.read_all().unwrap();
        assert_eq!(fps.len(), 1);
        assert_eq!(fps[0].name(), "abc");
        assert_eq!(fps[0].num_bits_set(), 8);
    }

    #[test]
    fn headerless_legacy_layout_reads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes()); // width, no magic
        bytes.extend_from_slice(&7u32.to_le_bytes()); // reserved junk
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(b"m1\0");
        bytes.extend_from_slice(&[0x03, 0x80]);
        fs::write(&path, &bytes).unwrap();

        let fps = FpReader::open(&path, InputFormat::FlushFps, "")
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(fps.len(), 1);
        assert_eq!(fps[0].num_bits_set(), 3);
    }

    #[test]
    fn truncated_record_is_a_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trunc.bin");
        let fps = vec![hashed("mol1", &[1, 2, 3, 4])];
        let full = {
            let p = write_file(&dir, "full.bin", InputFormat::FlushFps, &fps);
            fs::read(p).unwrap()
        };
        fs::write(&path, &full[..full.len() - 2]).unwrap();

        let err = FpReader::open(&path, InputFormat::FlushFps, "")
            .unwrap()
            .read_all()
            .unwrap_err();
        assert!(matches!(err, Error::FormatError(_)), "{err:?}");
    }

    #[test]
    fn bin_frag_nums_round_trip_and_monotonicity() {
        let dir = TempDir::new().unwrap();
        let fps = vec![
            not_hashed("a", &[3, 17, 99, 100_000]),
            not_hashed("b", &[]),
            not_hashed("c", &[0]),
        ];
        let path = write_file(&dir, "frags.bin", InputFormat::BinFragNums, &fps);
        let first = fs::read(&path).unwrap();
        assert_eq!(&first[..4], &FN_MAGIC_SWAPPED);
        let loaded = FpReader::open(&path, InputFormat::BinFragNums, "")
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(loaded, fps);
        let again = write_file(&dir, "frags2.bin", InputFormat::BinFragNums, &loaded);
        assert_eq!(fs::read(again).unwrap(), first);

        // descending ids must be rejected
        let bad = dir.path().join("bad.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&FN_MAGIC_SWAPPED);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(b"x\0");
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&9u32.to_le_bytes());
        bytes.extend_from_slice(&4u32.to_le_bytes());
        fs::write(&bad, &bytes).unwrap();
        let err = FpReader::open(&bad, InputFormat::BinFragNums, "")
            .unwrap()
            .read_all()
            .unwrap_err();
        assert!(matches!(err, Error::FormatError(_)));
    }

    #[test]
    fn gzip_round_trip_by_extension() {
        let dir = TempDir::new().unwrap();
        let fps = vec![hashed("zipped", &[0xaa; 16])];
        let path = write_file(&dir, "fps.bin.gz", InputFormat::FlushFps, &fps);
        let raw = fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &GZIP_MAGIC);
        let loaded = FpReader::open(&path, InputFormat::FlushFps, "")
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(loaded, fps);
    }

    #[test]
    fn gzip_detected_by_magic_without_extension() {
        let dir = TempDir::new().unwrap();
        let gz = write_file(
            &dir,
            "fps.bin.gz",
            InputFormat::FlushFps,
            &[hashed("m", &[1, 2, 3, 4])],
        );
        let plain_name = dir.path().join("no_extension");
        fs::rename(&gz, &plain_name).unwrap();
        let loaded = FpReader::open(&plain_name, InputFormat::FlushFps, "")
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(loaded[0].name(), "m");
    }

    #[test]
    fn bitstrings_parse_and_width_check() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bits.txt");
        fs::write(&path, "m1 10110011\nm2 00000001\n\n").unwrap();
        let loaded = FpReader::open(&path, InputFormat::Bitstrings, "")
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].num_bits_set(), 5);
        assert_eq!(loaded[1].num_bits_set(), 1);

        fs::write(&path, "m1 1011\nm2 101\n").unwrap();
        let err = FpReader::open(&path, InputFormat::Bitstrings, "")
            .unwrap()
            .read_all()
            .unwrap_err();
        assert!(matches!(err, Error::CapacityError { expected: 4, got: 3 }));
    }

    #[test]
    fn bitstrings_with_separator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bits.txt");
        fs::write(&path, "m1 1,0,1,1\n").unwrap();
        let loaded = FpReader::open(&path, InputFormat::Bitstrings, ",")
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(loaded[0].num_bits_set(), 3);
    }

    #[test]
    fn frag_nums_text_round_trip() {
        let dir = TempDir::new().unwrap();
        let fps = vec![not_hashed("a", &[1, 5, 900]), not_hashed("b", &[2])];
        let path = write_file(&dir, "frags.txt", InputFormat::FragNums, &fps);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "a 1 5 900\nb 2\n"
        );
        let loaded = FpReader::open(&path, InputFormat::FragNums, " ")
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(loaded, fps);

        fs::write(&path, "a 1 x 3\n").unwrap();
        assert!(FpReader::open(&path, InputFormat::FragNums, " ")
            .unwrap()
            .read_all()
            .is_err());
    }

    #[test]
    fn count_and_names_agree_with_full_read() {
        let dir = TempDir::new().unwrap();
        let fps = vec![
            hashed("one", &[1; 8]),
            hashed("two", &[2; 8]),
            hashed("three", &[3; 8]),
        ];
        let path = write_file(&dir, "fps.bin", InputFormat::FlushFps, &fps);
        assert_eq!(count_fps(&path, InputFormat::FlushFps).unwrap(), 3);
        assert_eq!(
            read_names(&path, InputFormat::FlushFps).unwrap(),
            vec!["one", "two", "three"]
        );

        let frags = write_file(
            &dir,
            "f.bin",
            InputFormat::BinFragNums,
            &[not_hashed("x", &[1, 2]), not_hashed("y", &[])],
        );
        assert_eq!(count_fps(&frags, InputFormat::BinFragNums).unwrap(), 2);
        assert_eq!(
            read_names(&frags, InputFormat::BinFragNums).unwrap(),
            vec!["x", "y"]
        );
    }

    #[test]
    fn subset_names_are_sorted_tokens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("subset.txt");
        fs::write(&path, "zeta alpha\nmid\n").unwrap();
        assert_eq!(
            read_subset_names(&path).unwrap(),
            vec!["alpha", "mid", "zeta"]
        );
    }

    #[test]
    fn missing_file_is_file_open_error() {
        let err = FpReader::open(Path::new("/no/such/file"), InputFormat::FlushFps, "")
            .err()
            .unwrap();
        assert!(matches!(err, Error::FileOpen { .. }));
    }

    #[test]
    fn wrong_shape_for_format_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        let mut w = FpWriter::create(&path, InputFormat::FlushFps, "").unwrap();
        assert!(w.write_fp(&not_hashed("n", &[1])).is_err());
    }
}
