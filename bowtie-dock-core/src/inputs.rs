//! Read and index discovery
//!
//! Reads are paired by file name: an `R1`/`R2` token or a `1.f`/`2.f` marker
//! at the start of the name or right after one of `.`, `_`, `-`. The index is
//! identified by the shared basename of its `.bt2` part files.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::InputError;

/// Extension of bowtie2 index part files
pub const INDEX_EXTENSION: &str = ".bt2";

/// Extension of unpaired reads picked up when no file carries a mate marker
pub const UNPAIRED_EXTENSION: &str = ".fq";

fn mate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|[._-])(R[12]|[12]\.f)").expect("mate pattern is a valid regex")
    })
}

/// Which mate of a pair a file name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mate {
    First,
    Second,
}

/// Classify a file name by its mate marker, if it has one.
pub fn classify(file_name: &str) -> Option<Mate> {
    let found = mate_pattern().find(file_name)?;
    let token = found.as_str();
    if token.contains('1') {
        Some(Mate::First)
    } else if token.contains('2') {
        Some(Mate::Second)
    } else {
        None
    }
}

/// One input unit: a mate-1 file and, for paired-end data, its mate-2 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPair {
    pub mate1: String,
    pub mate2: Option<String>,
}

/// Ordered read files of one job.
///
/// Either every pair has a mate-2 file or none does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSet {
    pairs: Vec<ReadPair>,
}

impl ReadSet {
    /// Pair two equally long lists position by position.
    pub fn paired(mate1: Vec<String>, mate2: Vec<String>) -> Result<Self, InputError> {
        if mate1.len() != mate2.len() {
            return Err(InputError::UnbalancedPairs {
                mate1: mate1.len(),
                mate2: mate2.len(),
            });
        }
        let pairs = mate1
            .into_iter()
            .zip(mate2)
            .map(|(mate1, mate2)| ReadPair { mate1, mate2: Some(mate2) })
            .collect();
        Ok(Self { pairs })
    }

    /// Single-end reads.
    pub fn unpaired(reads: Vec<String>) -> Self {
        let pairs = reads
            .into_iter()
            .map(|mate1| ReadPair { mate1, mate2: None })
            .collect();
        Self { pairs }
    }

    pub fn pairs(&self) -> &[ReadPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// True when the set carries mate-2 files.
    pub fn is_paired(&self) -> bool {
        self.pairs.first().map_or(false, |p| p.mate2.is_some())
    }

    pub fn mate1_files(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|p| p.mate1.as_str())
    }

    pub fn mate2_files(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().filter_map(|p| p.mate2.as_deref())
    }
}

/// Basename shared by the part files of a bowtie2 index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReference {
    pub basename: String,
}

impl std::fmt::Display for IndexReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.basename)
    }
}

/// Resolve both directories of a job.
pub fn resolve(reads_dir: &Path, index_dir: &Path) -> Result<(ReadSet, IndexReference), InputError> {
    let reads = resolve_reads(reads_dir)?;
    let index = resolve_index(index_dir)?;
    Ok((reads, index))
}

/// Discover and pair the read files directly under `dir`.
pub fn resolve_reads(dir: &Path) -> Result<ReadSet, InputError> {
    let files = list_files(dir)?;
    if files.is_empty() {
        return Err(InputError::EmptyInput(dir.to_path_buf()));
    }

    let mut mate1 = Vec::new();
    let mut mate2 = Vec::new();
    for name in &files {
        match classify(name) {
            Some(Mate::First) => mate1.push(name.clone()),
            Some(Mate::Second) => mate2.push(name.clone()),
            None => log::warn!("Skipping file without mate marker: {}", name),
        }
    }

    if mate1.len() != mate2.len() {
        log::error!("Uneven number of pairs found. R1: {:?} R2: {:?}", mate1, mate2);
        return Err(InputError::UnbalancedPairs {
            mate1: mate1.len(),
            mate2: mate2.len(),
        });
    }

    if mate1.is_empty() {
        let unpaired: Vec<String> = files
            .into_iter()
            .filter(|name| name.ends_with(UNPAIRED_EXTENSION))
            .collect();
        if unpaired.is_empty() {
            return Err(InputError::NoRecognizedReads(dir.to_path_buf()));
        }
        log::info!("No mate markers found, using {} unpaired {} files", unpaired.len(), UNPAIRED_EXTENSION);
        return Ok(ReadSet::unpaired(unpaired));
    }

    mate1.sort();
    mate2.sort();
    log::info!("Found {} read pairs in {}", mate1.len(), dir.display());
    ReadSet::paired(mate1, mate2)
}

/// Find the index basename under `dir`.
pub fn resolve_index(dir: &Path) -> Result<IndexReference, InputError> {
    let basenames: BTreeSet<String> = list_files(dir)?
        .into_iter()
        .filter(|name| name.ends_with(INDEX_EXTENSION))
        .filter_map(|name| name.split('.').next().map(str::to_string))
        .filter(|base| !base.is_empty())
        .collect();

    match basenames.len() {
        0 => Err(InputError::NoIndex(dir.to_path_buf())),
        1 => {
            let basename = basenames.into_iter().next().unwrap_or_default();
            log::debug!("Using index basename {}", basename);
            Ok(IndexReference { basename })
        }
        _ => {
            let candidates: Vec<String> = basenames.into_iter().collect();
            log::warn!("Index directory {} holds several indexes: {:?}", dir.display(), candidates);
            Err(InputError::AmbiguousIndex(candidates))
        }
    }
}

/// Sorted names of the regular files directly under `dir`.
fn list_files(dir: &Path) -> Result<Vec<String>, InputError> {
    check_directory(dir)?;
    let io_err = |source| InputError::Io { path: dir.to_path_buf(), source };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.path().is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => log::warn!("Skipping non UTF-8 file name: {:?}", name),
        }
    }
    names.sort();
    Ok(names)
}

fn check_directory(dir: &Path) -> Result<(), InputError> {
    if !dir.exists() {
        return Err(InputError::MissingDirectory(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(InputError::NotADirectory(dir.to_path_buf()));
    }
    Ok(())
}

/// Absolute form of a host directory, usable as the host side of a bind.
///
/// Docker reads a relative host path as a named volume and splits bind
/// strings on `:`, so paths containing `:` are rejected.
pub fn host_dir(dir: &Path) -> Result<PathBuf, InputError> {
    check_directory(dir)?;
    let absolute = fs::canonicalize(dir).map_err(|source| InputError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    if absolute.to_string_lossy().contains(':') {
        return Err(InputError::UnbindablePath(absolute));
    }
    Ok(absolute)
}

/// Join a container directory and a file name with exactly one `/`.
pub(crate) fn container_path(prefix: &str, name: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), name)
}
