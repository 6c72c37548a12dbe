use std::io::{self, Write};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::orchestrator::{PassSummary, RunStatus};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &PassSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_survey(statuses: &[RunStatus]) -> io::Result<()> {
        Self::print_json(&statuses)
    }

    pub fn print_written(paths: &[Utf8PathBuf]) -> io::Result<()> {
        Self::print_json(&paths)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn print_summary_text(summary: &PassSummary) {
    println!("projects: {}", summary.projects);
    println!(
        "runs: {} ({} not finished, {} too recent, {} eligible)",
        summary.runs, summary.not_finished, summary.too_recent, summary.eligible
    );
    println!(
        "archives: {} created, {} already done, {} failed",
        summary.archived, summary.skipped, summary.failed
    );
    if summary.checksums_computed + summary.checksums_skipped + summary.checksums_failed > 0 {
        println!(
            "checksums: {} computed, {} already done, {} failed",
            summary.checksums_computed, summary.checksums_skipped, summary.checksums_failed
        );
    }
}
