use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use regex::Regex;

use crate::error::ArchiveError;

pub const DEFAULT_END_OF_RUN_PATTERN: &str = r"^sequencing_summary\w*\.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    NotFinished,
    TooRecent { marker: PathBuf, age: Duration },
    Eligible { marker: PathBuf, age: Duration },
}

impl Completion {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Completion::Eligible { .. })
    }
}

#[derive(Debug, Clone)]
pub struct CompletionGate {
    marker_pattern: Regex,
    min_age: Duration,
}

impl CompletionGate {
    pub fn new(marker_pattern: &str, min_age: Duration) -> Result<Self, ArchiveError> {
        let marker_pattern =
            Regex::new(marker_pattern).map_err(|err| ArchiveError::InvalidPattern {
                pattern: marker_pattern.to_string(),
                message: err.to_string(),
            })?;
        Ok(Self {
            marker_pattern,
            min_age,
        })
    }

    pub fn min_age(&self) -> Duration {
        self.min_age
    }

    /// First end-of-run marker among the run's immediate entries, in
    /// enumeration order. With several markers the pick is unspecified.
    pub fn find_marker(&self, run_dir: &Path) -> Result<Option<PathBuf>, ArchiveError> {
        let entries = fs::read_dir(run_dir).map_err(|err| {
            ArchiveError::Filesystem(format!("read {}: {err}", run_dir.display()))
        })?;
        for entry in entries {
            let entry = entry.map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
            let name = entry.file_name();
            if self.marker_pattern.is_match(&name.to_string_lossy()) {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    pub fn evaluate(&self, run_dir: &Path, now: SystemTime) -> Result<Completion, ArchiveError> {
        let Some(marker) = self.find_marker(run_dir)? else {
            return Ok(Completion::NotFinished);
        };
        let created = created_at(&marker)?;
        let age = now.duration_since(created).unwrap_or(Duration::ZERO);
        Ok(self.judge(marker, age))
    }

    /// An age equal to the delay is still too recent.
    pub fn judge(&self, marker: PathBuf, age: Duration) -> Completion {
        if age <= self.min_age {
            Completion::TooRecent { marker, age }
        } else {
            Completion::Eligible { marker, age }
        }
    }
}

fn created_at(path: &Path) -> Result<SystemTime, ArchiveError> {
    let metadata = fs::metadata(path)
        .map_err(|err| ArchiveError::Filesystem(format!("stat {}: {err}", path.display())))?;
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .map_err(|err| ArchiveError::Filesystem(format!("stat {}: {err}", path.display())))
}
