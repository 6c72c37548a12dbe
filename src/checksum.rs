use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::domain::RunDirectory;
use crate::error::ArchiveError;
use crate::events::{ArchiveEvent, EventSink};
use crate::marker::{self, MarkerKind, SuccessMarker};
use crate::process::{CommandRunner, Invocation, ProcessExit, Toolchain};
use crate::runner::Outcome;

/// Appends one digest line per file of the run to a manifest. A failure
/// anywhere leaves the stage without a marker, so the whole run is hashed
/// again on the next pass and the manifest gains duplicate lines.
pub struct ChecksumStage<'a, R: CommandRunner> {
    runner: &'a R,
    tools: &'a Toolchain,
    sink: &'a dyn EventSink,
}

impl<'a, R: CommandRunner> ChecksumStage<'a, R> {
    pub fn new(runner: &'a R, tools: &'a Toolchain, sink: &'a dyn EventSink) -> Self {
        Self {
            runner,
            tools,
            sink,
        }
    }

    pub fn marker(run: &RunDirectory) -> SuccessMarker {
        SuccessMarker::for_run(run, MarkerKind::Checksums)
    }

    pub fn compute(&self, run: &RunDirectory, manifest: &Path) -> Outcome {
        let marker = Self::marker(run);
        if marker.exists() {
            self.sink.event(ArchiveEvent::ChecksumsSkipped {
                run: run.to_string(),
            });
            return Outcome::Skipped;
        }

        match self.hash_all(run, manifest) {
            Ok((files, None)) => match marker.create() {
                Ok(()) => {
                    self.sink.event(ArchiveEvent::ChecksumsComputed {
                        run: run.to_string(),
                        files,
                    });
                    Outcome::Success
                }
                Err(err) => self.failed(run, err.to_string()),
            },
            Ok((_, Some(exit))) => self.failed(
                run,
                format!(
                    "hasher exited with {}",
                    exit.code()
                        .map(|code| code.to_string())
                        .unwrap_or_else(|| "a signal".to_string())
                ),
            ),
            Err(err) => self.failed(run, err.to_string()),
        }
    }

    fn failed(&self, run: &RunDirectory, message: String) -> Outcome {
        self.sink.event(ArchiveEvent::ChecksumsFailed {
            run: run.to_string(),
            message,
        });
        Outcome::Failed
    }

    /// Returns the number of files hashed and the worst exit seen, if any
    /// invocation failed.
    fn hash_all(
        &self,
        run: &RunDirectory,
        manifest: &Path,
    ) -> Result<(usize, Option<ProcessExit>), ArchiveError> {
        let (program, prefix) = self
            .tools
            .hasher
            .split_first()
            .ok_or_else(|| ArchiveError::InvalidConfig("hasher command is empty".to_string()))?;
        if let Some(parent) = manifest.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                ArchiveError::Filesystem(format!("create {}: {err}", parent.display()))
            })?;
        }

        let mut files = 0;
        let mut worst: Option<ProcessExit> = None;
        // Linked files are hashed through their targets.
        for entry in WalkDir::new(&run.path).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.sink.event(ArchiveEvent::ChecksumsFailed {
                        run: run.to_string(),
                        message: err.to_string(),
                    });
                    worst = Some(ProcessExit::from_code(1));
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || excluded(path, manifest) {
                continue;
            }
            let relative = path.strip_prefix(&run.path).unwrap_or(path);

            let command = Invocation::new(program)
                .args(prefix)
                .arg("--")
                .arg(relative)
                .current_dir(&run.path);
            let exit = self.runner.run_to_file(&command, manifest, true, self.sink)?;
            if !exit.success() {
                worst = Some(exit);
            }
            files += 1;
        }
        Ok((files, worst))
    }
}

/// Markers and digest manifests are never hashed.
pub fn excluded(path: &Path, manifest: &Path) -> bool {
    path == manifest || marker::is_marker(path) || marker::is_manifest(path)
}
