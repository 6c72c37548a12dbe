#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use nanopore_auto_archive::config::{ConfigLoader, ResolvedConfig};
use nanopore_auto_archive::error::ArchiveError;
use nanopore_auto_archive::events::EventSink;
use nanopore_auto_archive::process::{
    CommandRunner, Invocation, Pipeline, PipelineExit, ProcessExit, find_in_path,
};

pub const DATE: &str = "20221208";
pub const FLOWCELL: &str = "PAK1234";
pub const SUBDIRS: [&str; 5] = [
    "fast5_pass",
    "fast5_fail",
    "fastq_pass",
    "fastq_fail",
    "other_reports",
];
pub const SAMPLES: [&str; 2] = ["sample_a", "sample_b"];
pub const TRANSFER_DIR: &str = "_transfer";

pub fn have(tool: &str) -> bool {
    find_in_path(tool).is_some()
}

/// YAML hasher argv; coreutils `sha1sum` when perl's `shasum` is absent.
pub fn hasher() -> &'static str {
    if have("shasum") {
        r#"["shasum", "-a", "1"]"#
    } else {
        r#"["sha1sum"]"#
    }
}

fn touch(path: &Path) {
    fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
}

/// Lays out a run the way the instrument does.
pub fn make_run(run_dir: &Path, run_hex: &str, finished: bool) {
    fs::create_dir_all(run_dir).unwrap();
    for subdir in SUBDIRS {
        fs::create_dir_all(run_dir.join(subdir)).unwrap();
    }
    if finished {
        touch(&run_dir.join(format!("sequencing_summary_{FLOWCELL}_{run_hex}_0a1b.txt")));
    }
    touch(&run_dir.join("fastq_pass").join(format!("{run_hex}_0.fastq.gz")));
    touch(&run_dir.join("fastq_fail").join(format!("{run_hex}_1.fastq.gz")));
    touch(&run_dir.join("fast5_pass").join(format!("{run_hex}_0.fast5")));
    touch(&run_dir.join("fast5_fail").join(format!("{run_hex}_1.fast5")));
    touch(&run_dir.join(format!("report_{run_hex}.html")));
}

pub fn project_name(run: &str) -> String {
    format!("{DATE}_wehi_bowden_{run}")
}

pub fn run_name(hex: &str) -> String {
    format!("{DATE}_1111_2F_{FLOWCELL}_{hex}")
}

/// Three structured projects (`runa` and `runb` finished, `runc` not), an
/// unstructured `TEST_a` that must be ignored and an unstructured `TEST_b`
/// that is only processed when listed as an extra directory.
pub fn make_data_root(root: &Path) {
    for (project, finished) in [("runa", true), ("runb", true), ("runc", false)] {
        for sample in SAMPLES {
            let hex = format!("{project}{sample}");
            let run_dir = root
                .join(project_name(project))
                .join(sample)
                .join(run_name(&hex));
            make_run(&run_dir, &hex, finished);
        }
    }
    fs::create_dir_all(root.join("TEST_a")).unwrap();
    make_run(
        &root.join("TEST_b").join(SAMPLES[0]).join(run_name("testb")),
        "testb",
        true,
    );
    fs::write(root.join("20221208_wehi_bowden_notadir"), b"").unwrap();
}

pub fn run_dir(root: &Path, project: &str, sample: &str) -> PathBuf {
    let hex = format!("{project}{sample}");
    root.join(project_name(project))
        .join(sample)
        .join(run_name(&hex))
}

pub struct Settings {
    pub delay: u64,
    pub threads: usize,
    pub checksums: bool,
    pub extra_dirs: &'static str,
    pub file_types: &'static str,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delay: 0,
            threads: 1,
            checksums: false,
            extra_dirs: "[]",
            file_types: "[reports, raw-signal, basecalled-reads]",
        }
    }
}

pub fn config(root: &Path, settings: Settings) -> ResolvedConfig {
    let hasher = hasher();
    let yaml = format!(
        "data_dir: {}\n\
         transfer_dir: {TRANSFER_DIR}\n\
         time_delay: {}\n\
         extra_dirs: {}\n\
         file_types: {}\n\
         calculate_checksums: {}\n\
         threads: {}\n\
         tools:\n  hasher: {hasher}\n",
        root.display(),
        settings.delay,
        settings.extra_dirs,
        settings.file_types,
        settings.checksums,
        settings.threads,
    );
    ConfigLoader::resolve_str(&yaml).unwrap()
}

/// Records invocations instead of spawning anything and answers with a
/// fixed exit code.
#[derive(Default)]
pub struct CountingRunner {
    pub exit_code: i32,
    calls: Mutex<Vec<Vec<String>>>,
}

impl CountingRunner {
    pub fn failing(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, command: &Invocation) {
        let mut argv = vec![command.program.clone()];
        argv.extend(command.args.iter().map(|arg| arg.to_string_lossy().into_owned()));
        self.calls.lock().unwrap().push(argv);
    }
}

impl CommandRunner for CountingRunner {
    fn run(
        &self,
        command: &Invocation,
        _sink: &dyn EventSink,
    ) -> Result<ProcessExit, ArchiveError> {
        self.record(command);
        Ok(ProcessExit::from_code(self.exit_code))
    }

    fn run_to_file(
        &self,
        command: &Invocation,
        _output: &Path,
        _append: bool,
        _sink: &dyn EventSink,
    ) -> Result<ProcessExit, ArchiveError> {
        self.record(command);
        Ok(ProcessExit::from_code(self.exit_code))
    }

    fn run_pipeline(
        &self,
        pipeline: &Pipeline,
        _sink: &dyn EventSink,
    ) -> Result<PipelineExit, ArchiveError> {
        self.record(&pipeline.source);
        self.record(&pipeline.sink);
        Ok(PipelineExit {
            source: ProcessExit::from_code(0),
            sink: ProcessExit::from_code(self.exit_code),
        })
    }
}

pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(files_under(&path));
        } else {
            out.push(path);
        }
    }
    out.sort();
    out
}
