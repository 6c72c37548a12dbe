use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;

/// Category of run output archived together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum FileFamily {
    #[serde(rename = "reports")]
    #[value(name = "reports")]
    Reports,
    #[serde(rename = "raw-signal", alias = "fast5", alias = "pod5")]
    #[value(name = "raw-signal", alias = "fast5", alias = "pod5")]
    RawSignal,
    #[serde(rename = "basecalled-reads", alias = "fastq")]
    #[value(name = "basecalled-reads", alias = "fastq")]
    BasecalledReads,
}

impl FileFamily {
    pub const ALL: [FileFamily; 3] = [
        FileFamily::Reports,
        FileFamily::RawSignal,
        FileFamily::BasecalledReads,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFamily::Reports => "reports",
            FileFamily::RawSignal => "raw-signal",
            FileFamily::BasecalledReads => "basecalled-reads",
        }
    }

    /// Sub-paths of the run directory that always belong to this family.
    pub fn fixed_sources(&self) -> &'static [&'static str] {
        match self {
            FileFamily::Reports => &["other_reports"],
            FileFamily::RawSignal => &["fast5_pass", "fast5_fail"],
            FileFamily::BasecalledReads => &["fastq_pass", "fastq_fail"],
        }
    }

    /// Basecalled reads are written gzipped by the instrument already.
    pub fn compressed(&self) -> bool {
        !matches!(self, FileFamily::BasecalledReads)
    }

    pub fn archive_extension(&self) -> &'static str {
        if self.compressed() { "tar.gz" } else { "tar" }
    }
}

impl fmt::Display for FileFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileFamily {
    type Err = ArchiveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reports" => Ok(FileFamily::Reports),
            "raw-signal" | "fast5" | "pod5" => Ok(FileFamily::RawSignal),
            "basecalled-reads" | "fastq" => Ok(FileFamily::BasecalledReads),
            _ => Err(ArchiveError::InvalidFamily(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectFields {
    pub date: String,
    pub affiliation: String,
    pub lab: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProjectKind {
    Structured(ProjectFields),
    Extra,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDirectory {
    pub name: String,
    pub path: PathBuf,
    pub kind: ProjectKind,
}

impl ProjectDirectory {
    pub fn transfer_root(&self, transfer_dir: &str) -> PathBuf {
        self.path.join(transfer_dir)
    }
}

/// A leaf directory `project/sample/run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    pub path: PathBuf,
    pub sample: String,
    pub name: String,
}

impl RunDirectory {
    pub fn new(sample_dir: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        let sample = sample_dir
            .file_name()
            .map(|value| value.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path: sample_dir.join(&name),
            sample,
            name,
        }
    }
}

impl fmt::Display for RunDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sample, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSpec {
    pub family: FileFamily,
    /// Relative to the run directory, in the order passed to the archiver.
    pub sources: Vec<PathBuf>,
    /// Always absolute; the archiver runs inside the run directory.
    pub destination: PathBuf,
    pub compress: bool,
}
