use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::FileFamily;

/// Every decision taken during a pass, in the order it was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEvent {
    PassStarted { data_dir: PathBuf },
    ProjectFound { name: String },
    ProjectIgnored { name: String, reason: String },
    ProjectProcessing { name: String },
    ProjectUnreadable { name: String, message: String },
    RunNotFinished { run: String },
    RunUnreadable { run: String, message: String },
    RunTooRecent { run: String, age: Duration, delay: Duration },
    RunEligible { run: String, marker: PathBuf },
    ChecksumsSkipped { run: String },
    ChecksumsComputed { run: String, files: usize },
    ChecksumsFailed { run: String, message: String },
    FamilySkipped { run: String, family: FileFamily },
    SourceMissing { run: String, family: FileFamily, path: PathBuf },
    FamilyArchived { run: String, family: FileFamily, destination: PathBuf },
    FamilyFailed { run: String, family: FileFamily, message: String },
    SourceStageFailed { program: String, code: Option<i32> },
    ToolOutput { program: String, line: String, stderr: bool },
    PassFinished,
}

pub trait EventSink: Send + Sync {
    fn event(&self, event: ArchiveEvent);
}

/// Forwards events to whatever `tracing` subscriber the binary installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn event(&self, event: ArchiveEvent) {
        match event {
            ArchiveEvent::PassStarted { data_dir } => {
                tracing::info!(data_dir = %data_dir.display(), "auto-archiver started")
            }
            ArchiveEvent::ProjectFound { name } => {
                tracing::info!("found project directory {name}")
            }
            ArchiveEvent::ProjectIgnored { name, reason } => {
                tracing::debug!("ignoring {name}: {reason}")
            }
            ArchiveEvent::ProjectProcessing { name } => tracing::info!("processing {name}..."),
            ArchiveEvent::ProjectUnreadable { name, message } => {
                tracing::error!("cannot read project {name}: {message}")
            }
            ArchiveEvent::RunNotFinished { run } => tracing::debug!("run {run} not finished"),
            ArchiveEvent::RunUnreadable { run, message } => {
                tracing::error!("cannot inspect run {run}: {message}")
            }
            ArchiveEvent::RunTooRecent { run, age, delay } => tracing::info!(
                "run {run} finished {}s ago, has not been complete for {}s yet, skipping",
                age.as_secs(),
                delay.as_secs()
            ),
            ArchiveEvent::RunEligible { run, marker } => tracing::info!(
                marker = %marker.display(),
                "run {run} finished, making archives"
            ),
            ArchiveEvent::ChecksumsSkipped { run } => {
                tracing::info!("skipped checksums for run {run} due to presence of success file")
            }
            ArchiveEvent::ChecksumsComputed { run, files } => {
                tracing::info!("calculated checksums for {files} files of run {run}")
            }
            ArchiveEvent::ChecksumsFailed { run, message } => {
                tracing::error!("checksums failed for run {run}: {message}")
            }
            ArchiveEvent::FamilySkipped { run, family } => {
                tracing::info!("skipped {family} for run {run} due to presence of success file")
            }
            ArchiveEvent::SourceMissing { run, family, path } => tracing::error!(
                "{} does not exist, not archiving {family} for run {run}",
                path.display()
            ),
            ArchiveEvent::FamilyArchived {
                run,
                family,
                destination,
            } => tracing::info!(
                destination = %destination.display(),
                "successfully archived {family} files for {run}"
            ),
            ArchiveEvent::FamilyFailed {
                run,
                family,
                message,
            } => tracing::error!("an error occurred archiving {family} for {run}: {message}"),
            ArchiveEvent::SourceStageFailed { program, code } => tracing::warn!(
                "{program} exited with {} while feeding the compressor",
                code.map(|code| code.to_string())
                    .unwrap_or_else(|| "a signal".to_string())
            ),
            ArchiveEvent::ToolOutput {
                program,
                line,
                stderr,
            } => tracing::info!(tool = %program, stderr, "{line}"),
            ArchiveEvent::PassFinished => tracing::info!("done"),
        }
    }
}

/// Keeps events in memory; used by dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ArchiveEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ArchiveEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn event(&self, event: ArchiveEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
