use std::time::SystemTime;

use serde::Serialize;

use crate::checksum::ChecksumStage;
use crate::config::ResolvedConfig;
use crate::domain::{FileFamily, ProjectDirectory, RunDirectory};
use crate::error::ArchiveError;
use crate::events::{ArchiveEvent, EventSink};
use crate::gate::{Completion, CompletionGate};
use crate::locator::RunLocator;
use crate::planner::{ArchivePlanner, TransferLayout};
use crate::process::CommandRunner;
use crate::runner::{IdempotentRunner, Outcome};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub projects: usize,
    pub runs: usize,
    pub not_finished: usize,
    pub too_recent: usize,
    pub eligible: usize,
    pub archived: usize,
    pub skipped: usize,
    pub failed: usize,
    pub checksums_computed: usize,
    pub checksums_skipped: usize,
    pub checksums_failed: usize,
}

impl PassSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.checksums_failed > 0
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.archived += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    fn record_checksums(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.checksums_computed += 1,
            Outcome::Skipped => self.checksums_skipped += 1,
            Outcome::Failed => self.checksums_failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    NotFinished,
    TooRecent,
    Eligible,
    Unreadable,
}

/// Gate result for one run, as reported by a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub project: String,
    pub sample: String,
    pub run: String,
    pub state: RunState,
    pub age_secs: Option<u64>,
}

/// One orchestration pass: projects, samples, runs and families are all
/// handled sequentially. Nothing is retried within a pass.
pub struct Orchestrator<'a, R: CommandRunner> {
    config: &'a ResolvedConfig,
    runner: &'a R,
    sink: &'a dyn EventSink,
}

impl<'a, R: CommandRunner> Orchestrator<'a, R> {
    pub fn new(config: &'a ResolvedConfig, runner: &'a R, sink: &'a dyn EventSink) -> Self {
        Self {
            config,
            runner,
            sink,
        }
    }

    pub fn run_pass(&self) -> Result<PassSummary, ArchiveError> {
        self.sink.event(ArchiveEvent::PassStarted {
            data_dir: self.config.data_dir.clone(),
        });
        let gate = self.config.gate()?;
        let projects = self.select_projects()?;

        let mut summary = PassSummary {
            projects: projects.len(),
            ..PassSummary::default()
        };
        for project in &projects {
            self.sink.event(ArchiveEvent::ProjectProcessing {
                name: project.name.clone(),
            });
            let layout = TransferLayout::new(&project.transfer_root(&self.config.transfer_dir))?;
            let Some(runs) = self.locate_runs(project) else {
                continue;
            };
            for run in runs {
                summary.runs += 1;
                self.process_run(&run, &gate, &layout, &mut summary);
            }
        }

        self.sink.event(ArchiveEvent::PassFinished);
        Ok(summary)
    }

    /// Evaluates every run's completion without archiving anything.
    pub fn survey(&self) -> Result<Vec<RunStatus>, ArchiveError> {
        let gate = self.config.gate()?;
        let mut statuses = Vec::new();
        for project in self.select_projects()? {
            let Some(runs) = self.locate_runs(&project) else {
                continue;
            };
            for run in runs {
                let (state, age) = match gate.evaluate(&run.path, SystemTime::now()) {
                    Ok(Completion::NotFinished) => (RunState::NotFinished, None),
                    Ok(Completion::TooRecent { age, .. }) => (RunState::TooRecent, Some(age)),
                    Ok(Completion::Eligible { age, .. }) => (RunState::Eligible, Some(age)),
                    Err(_) => (RunState::Unreadable, None),
                };
                statuses.push(RunStatus {
                    project: project.name.clone(),
                    sample: run.sample,
                    run: run.name,
                    state,
                    age_secs: age.map(|age| age.as_secs()),
                });
            }
        }
        Ok(statuses)
    }

    fn select_projects(&self) -> Result<Vec<ProjectDirectory>, ArchiveError> {
        self.config
            .matcher()?
            .select_projects(&self.config.data_dir, self.sink)
    }

    fn locate_runs(&self, project: &ProjectDirectory) -> Option<Vec<RunDirectory>> {
        let locator =
            RunLocator::new(&project.path).excluding_transfer_dir(&self.config.transfer_dir);
        match locator.locate_runs() {
            Ok(runs) => Some(runs),
            Err(err) => {
                self.sink.event(ArchiveEvent::ProjectUnreadable {
                    name: project.name.clone(),
                    message: err.to_string(),
                });
                None
            }
        }
    }

    fn process_run(
        &self,
        run: &RunDirectory,
        gate: &CompletionGate,
        layout: &TransferLayout,
        summary: &mut PassSummary,
    ) {
        let completion = match gate.evaluate(&run.path, SystemTime::now()) {
            Ok(completion) => completion,
            Err(err) => {
                self.sink.event(ArchiveEvent::RunUnreadable {
                    run: run.to_string(),
                    message: err.to_string(),
                });
                return;
            }
        };

        match completion {
            Completion::NotFinished => {
                summary.not_finished += 1;
                self.sink.event(ArchiveEvent::RunNotFinished {
                    run: run.to_string(),
                });
            }
            Completion::TooRecent { age, .. } => {
                summary.too_recent += 1;
                self.sink.event(ArchiveEvent::RunTooRecent {
                    run: run.to_string(),
                    age,
                    delay: gate.min_age(),
                });
            }
            Completion::Eligible { marker, .. } => {
                summary.eligible += 1;
                self.sink.event(ArchiveEvent::RunEligible {
                    run: run.to_string(),
                    marker,
                });
                if self.config.calculate_checksums {
                    let stage = ChecksumStage::new(self.runner, &self.config.tools, self.sink);
                    summary.record_checksums(stage.compute(run, &layout.manifest_path(run)));
                }
                for family in &self.config.file_types {
                    summary.record(self.archive_family(run, *family, layout));
                }
            }
        }
    }

    fn archive_family(
        &self,
        run: &RunDirectory,
        family: FileFamily,
        layout: &TransferLayout,
    ) -> Outcome {
        let runner = IdempotentRunner::new(
            self.runner,
            &self.config.tools,
            self.config.threads,
            self.sink,
        );
        if runner.already_done(run, family) {
            return Outcome::Skipped;
        }

        match ArchivePlanner::new(layout).plan(run, family) {
            Ok(spec) => runner.run(run, &spec),
            Err(ArchiveError::SourceMissing { path, .. }) => {
                self.sink.event(ArchiveEvent::SourceMissing {
                    run: run.to_string(),
                    family,
                    path,
                });
                Outcome::Failed
            }
            Err(err) => {
                self.sink.event(ArchiveEvent::FamilyFailed {
                    run: run.to_string(),
                    family,
                    message: err.to_string(),
                });
                Outcome::Failed
            }
        }
    }
}
