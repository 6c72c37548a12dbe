//! Descriptors for the bulk-transfer service that moves the archives off
//! the instrument. Reads the transfer layout, never modifies it.

use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::{FileFamily, ProjectDirectory};
use crate::error::ArchiveError;
use crate::marker::CHECKSUMS_DIR;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub id: String,
    pub path: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferDescriptor {
    pub source: Endpoint,
    pub destination: Endpoint,
    pub transfer_label: String,
    pub delete_label: String,
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_endpoint: String,
    pub dest_endpoint: String,
    pub dest_path: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorFile {
    pub file_name: String,
    pub descriptor: TransferDescriptor,
}

pub fn collect_descriptors(
    projects: &[ProjectDirectory],
    transfer_dir: &str,
    request: &TransferRequest,
) -> Result<Vec<DescriptorFile>, ArchiveError> {
    let mut files = Vec::new();
    for project in projects {
        let root = utf8(&std::path::absolute(project.transfer_root(transfer_dir)).map_err(
            |err| ArchiveError::Filesystem(format!("resolve {}: {err}", project.name)),
        )?)?;
        if !root.is_dir() {
            continue;
        }

        for family in FileFamily::ALL {
            let family_dir = root.join(family.as_str());
            if !family_dir.is_dir() {
                continue;
            }
            for sample in sorted_child_dirs(&family_dir)? {
                let group = format!("{family}/{sample}");
                files.push(DescriptorFile {
                    file_name: format!("{}_{family}_{sample}.json", project.name),
                    descriptor: TransferDescriptor {
                        source: Endpoint {
                            id: request.source_endpoint.clone(),
                            path: family_dir.join(&sample),
                        },
                        destination: Endpoint {
                            id: request.dest_endpoint.clone(),
                            path: request.dest_path.join(&project.name).join(&group),
                        },
                        transfer_label: format!(
                            "Transfer {family} archives for {sample} from {}",
                            project.name
                        ),
                        delete_label: format!(
                            "Delete source {family} archives for {sample} from {}",
                            project.name
                        ),
                    },
                });
            }
        }

        let checksums = root.join(CHECKSUMS_DIR);
        if checksums.is_dir() {
            files.push(DescriptorFile {
                file_name: format!("{}_{CHECKSUMS_DIR}.json", project.name),
                descriptor: TransferDescriptor {
                    source: Endpoint {
                        id: request.source_endpoint.clone(),
                        path: checksums,
                    },
                    destination: Endpoint {
                        id: request.dest_endpoint.clone(),
                        path: request.dest_path.join(&project.name).join(CHECKSUMS_DIR),
                    },
                    transfer_label: format!("Transfer checksums from {}", project.name),
                    delete_label: format!("Delete source checksums from {}", project.name),
                },
            });
        }
    }
    Ok(files)
}

pub fn write_descriptors(
    files: &[DescriptorFile],
    out_dir: &Path,
) -> Result<Vec<Utf8PathBuf>, ArchiveError> {
    let out_dir = utf8(out_dir)?;
    fs::create_dir_all(out_dir.as_std_path())
        .map_err(|err| ArchiveError::Filesystem(err.to_string()))?;

    let mut written = Vec::new();
    for file in files {
        let path = out_dir.join(&file.file_name);
        let content = serde_json::to_vec_pretty(&file.descriptor)
            .map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
        written.push(path);
    }
    Ok(written)
}

fn sorted_child_dirs(dir: &Utf8Path) -> Result<Vec<String>, ArchiveError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| ArchiveError::Filesystem(format!("read {dir}: {err}")))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn utf8(path: &Path) -> Result<Utf8PathBuf, ArchiveError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|path| ArchiveError::Filesystem(format!("non UTF-8 path {}", path.display())))
}
