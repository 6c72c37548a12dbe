use std::fs;

use serde::Serialize;

use crate::domain::{ArchiveSpec, FileFamily, RunDirectory};
use crate::error::ArchiveError;
use crate::events::{ArchiveEvent, EventSink};
use crate::marker::{MarkerKind, SuccessMarker};
use crate::process::{CommandRunner, Invocation, Pipeline, Toolchain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveCommand {
    Single(Invocation),
    Piped(Pipeline),
}

/// Builds the archiver invocation for a planned family. Compression goes
/// through the parallel compressor only when more than one thread is
/// requested and the family is compressed at all. Sources always follow
/// `--`, so run files named like options are archived as files.
pub fn archive_command(
    tools: &Toolchain,
    run: &RunDirectory,
    spec: &ArchiveSpec,
    threads: usize,
) -> ArchiveCommand {
    if spec.compress && threads > 1 {
        let source = Invocation::new(&tools.tar)
            .arg("-cpvf")
            .arg("-")
            .arg("--")
            .args(&spec.sources)
            .current_dir(&run.path);
        let sink = Invocation::new(&tools.compressor)
            .arg("-p")
            .arg(threads.to_string());
        return ArchiveCommand::Piped(Pipeline {
            source,
            sink,
            output: spec.destination.clone(),
        });
    }

    let flags = if spec.compress { "-czpvf" } else { "-cpvf" };
    ArchiveCommand::Single(
        Invocation::new(&tools.tar)
            .arg(flags)
            .arg(&spec.destination)
            .arg("--")
            .args(&spec.sources)
            .current_dir(&run.path),
    )
}

pub struct IdempotentRunner<'a, R: CommandRunner> {
    runner: &'a R,
    tools: &'a Toolchain,
    threads: usize,
    sink: &'a dyn EventSink,
}

impl<'a, R: CommandRunner> IdempotentRunner<'a, R> {
    pub fn new(
        runner: &'a R,
        tools: &'a Toolchain,
        threads: usize,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            runner,
            tools,
            threads,
            sink,
        }
    }

    pub fn marker(run: &RunDirectory, family: FileFamily) -> SuccessMarker {
        SuccessMarker::for_run(run, MarkerKind::Archive(family))
    }

    /// Logs and returns `true` when a previous pass already archived this
    /// family for the run.
    pub fn already_done(&self, run: &RunDirectory, family: FileFamily) -> bool {
        if Self::marker(run, family).exists() {
            self.sink.event(ArchiveEvent::FamilySkipped {
                run: run.to_string(),
                family,
            });
            return true;
        }
        false
    }

    pub fn run(&self, run: &RunDirectory, spec: &ArchiveSpec) -> Outcome {
        if self.already_done(run, spec.family) {
            return Outcome::Skipped;
        }
        match self.execute(run, spec) {
            Ok(true) => {
                self.sink.event(ArchiveEvent::FamilyArchived {
                    run: run.to_string(),
                    family: spec.family,
                    destination: spec.destination.clone(),
                });
                Outcome::Success
            }
            Ok(false) => {
                self.sink.event(ArchiveEvent::FamilyFailed {
                    run: run.to_string(),
                    family: spec.family,
                    message: "archiver exited unsuccessfully".to_string(),
                });
                Outcome::Failed
            }
            Err(err) => {
                self.sink.event(ArchiveEvent::FamilyFailed {
                    run: run.to_string(),
                    family: spec.family,
                    message: err.to_string(),
                });
                Outcome::Failed
            }
        }
    }

    /// The destination is not removed when the archiver fails; the next
    /// attempt overwrites it.
    fn execute(&self, run: &RunDirectory, spec: &ArchiveSpec) -> Result<bool, ArchiveError> {
        if let Some(parent) = spec.destination.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                ArchiveError::Filesystem(format!("create {}: {err}", parent.display()))
            })?;
        }

        let succeeded = match archive_command(self.tools, run, spec, self.threads) {
            ArchiveCommand::Single(command) => self.runner.run(&command, self.sink)?.success(),
            ArchiveCommand::Piped(pipeline) => {
                self.runner.run_pipeline(&pipeline, self.sink)?.success()
            }
        };
        if succeeded {
            Self::marker(run, spec.family).create()?;
        }
        Ok(succeeded)
    }
}
