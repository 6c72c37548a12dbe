use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::RunDirectory;
use crate::error::ArchiveError;

/// Walks `project/sample/run`. Entries that are not directories are
/// skipped at both levels. Order follows the filesystem and is unsorted.
pub struct RunLocator<'a> {
    project: &'a Path,
    transfer_dir: Option<&'a str>,
}

impl<'a> RunLocator<'a> {
    pub fn new(project: &'a Path) -> Self {
        Self {
            project,
            transfer_dir: None,
        }
    }

    /// Leaves the transfer area out of the sample listing.
    pub fn excluding_transfer_dir(mut self, transfer_dir: &'a str) -> Self {
        self.transfer_dir = Some(transfer_dir);
        self
    }

    pub fn locate_runs(&self) -> Result<Vec<RunDirectory>, ArchiveError> {
        let mut runs = Vec::new();
        for sample_dir in child_dirs(self.project)? {
            if let Some(transfer_dir) = self.transfer_dir {
                if sample_dir.file_name().map(|name| name == transfer_dir).unwrap_or(false) {
                    continue;
                }
            }
            for run_dir in child_dirs(&sample_dir)? {
                let Some(name) = run_dir.file_name() else {
                    continue;
                };
                runs.push(RunDirectory::new(&sample_dir, name.to_string_lossy()));
            }
        }
        Ok(runs)
    }
}

fn child_dirs(path: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let entries = fs::read_dir(path)
        .map_err(|err| ArchiveError::Filesystem(format!("read {}: {err}", path.display())))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    Ok(dirs)
}
