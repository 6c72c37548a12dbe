//! Success markers: empty sentinel files inside the run directory whose
//! presence is the only record that an operation already completed.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{FileFamily, RunDirectory};
use crate::error::ArchiveError;

pub const MARKER_EXTENSION: &str = "success";
pub const MANIFEST_EXTENSION: &str = "sha1";
pub const CHECKSUMS_DIR: &str = "checksums";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Archive(FileFamily),
    Checksums,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessMarker {
    path: PathBuf,
}

impl SuccessMarker {
    pub fn for_run(run: &RunDirectory, kind: MarkerKind) -> Self {
        Self {
            path: run.path.join(marker_file_name(&run.name, kind)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn create(&self) -> Result<(), ArchiveError> {
        fs::File::create(&self.path).map_err(|err| {
            ArchiveError::Filesystem(format!("create {}: {err}", self.path.display()))
        })?;
        Ok(())
    }
}

pub fn marker_file_name(run_name: &str, kind: MarkerKind) -> String {
    match kind {
        MarkerKind::Archive(family) => format!("{run_name}_{family}_archive.{MARKER_EXTENSION}"),
        MarkerKind::Checksums => format!("{run_name}_checksums.{MARKER_EXTENSION}"),
    }
}

pub fn manifest_file_name(run_name: &str) -> String {
    format!("{run_name}_checksums.{MANIFEST_EXTENSION}")
}

pub fn is_marker(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == MARKER_EXTENSION)
        .unwrap_or(false)
}

pub fn is_manifest(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.ends_with(&format!("_checksums.{MANIFEST_EXTENSION}")))
        .unwrap_or(false)
}
