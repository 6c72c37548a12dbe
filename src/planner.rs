use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{ArchiveSpec, FileFamily, RunDirectory};
use crate::error::ArchiveError;
use crate::marker::{self, CHECKSUMS_DIR};

/// `{project}/{transfer_dir}`, holding one directory per family with one
/// directory per sample below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLayout {
    root: PathBuf,
}

impl TransferLayout {
    pub fn new(root: &Path) -> Result<Self, ArchiveError> {
        let root = std::path::absolute(root).map_err(|err| {
            ArchiveError::Filesystem(format!("resolve {}: {err}", root.display()))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn family_dir(&self, family: FileFamily, sample: &str) -> PathBuf {
        self.root.join(family.as_str()).join(sample)
    }

    pub fn archive_path(&self, run: &RunDirectory, family: FileFamily) -> PathBuf {
        self.family_dir(family, &run.sample).join(format!(
            "{}_{family}.{}",
            run.name,
            family.archive_extension()
        ))
    }

    pub fn checksums_dir(&self) -> PathBuf {
        self.root.join(CHECKSUMS_DIR)
    }

    pub fn manifest_path(&self, run: &RunDirectory) -> PathBuf {
        self.checksums_dir().join(marker::manifest_file_name(&run.name))
    }
}

pub struct ArchivePlanner<'a> {
    layout: &'a TransferLayout,
}

impl<'a> ArchivePlanner<'a> {
    pub fn new(layout: &'a TransferLayout) -> Self {
        Self { layout }
    }

    /// Fails with `SourceMissing` on the first absent source; nothing is
    /// archived for the family in that case.
    pub fn plan(&self, run: &RunDirectory, family: FileFamily) -> Result<ArchiveSpec, ArchiveError> {
        let mut sources = match family {
            FileFamily::Reports => report_files(&run.path)?,
            FileFamily::RawSignal | FileFamily::BasecalledReads => Vec::new(),
        };
        sources.extend(family.fixed_sources().iter().map(PathBuf::from));

        for source in &sources {
            let full = run.path.join(source);
            if !full.exists() {
                return Err(ArchiveError::SourceMissing {
                    run: run.to_string(),
                    family: family.to_string(),
                    path: full,
                });
            }
        }

        Ok(ArchiveSpec {
            family,
            sources,
            destination: self.layout.archive_path(run, family),
            compress: family.compressed(),
        })
    }
}

fn report_files(run_dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let entries = fs::read_dir(run_dir)
        .map_err(|err| ArchiveError::Filesystem(format!("read {}: {err}", run_dir.display())))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
        let path = entry.path();
        if !path.is_file() || marker::is_marker(&path) {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        files.push(PathBuf::from(name));
    }
    files.sort();
    Ok(files)
}
