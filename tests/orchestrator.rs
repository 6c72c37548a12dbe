mod common;

use std::fs;

use assert_matches::assert_matches;

use nanopore_auto_archive::domain::FileFamily;
use nanopore_auto_archive::events::{ArchiveEvent, MemorySink};
use nanopore_auto_archive::orchestrator::{Orchestrator, RunState};
use nanopore_auto_archive::process::SystemRunner;

use common::{
    CountingRunner, SAMPLES, Settings, TRANSFER_DIR, config, files_under, make_data_root,
    project_name, run_dir,
};

fn archives(root: &std::path::Path, project: &str) -> Vec<std::path::PathBuf> {
    files_under(&root.join(project_name(project)).join(TRANSFER_DIR))
}

#[test]
fn finished_run_gets_three_archives_and_markers() {
    let temp = tempfile::tempdir().unwrap();
    make_data_root(temp.path());
    let config = config(temp.path(), Settings::default());
    let sink = MemorySink::new();

    let summary = Orchestrator::new(&config, &SystemRunner::new(), &sink)
        .run_pass()
        .unwrap();

    // runa and runb, two samples each
    assert_eq!(summary.eligible, 4);
    assert_eq!(summary.not_finished, 2);
    assert_eq!(summary.archived, 12);
    assert_eq!(summary.failed, 0);

    for sample in SAMPLES {
        let transfer = temp.path().join(project_name("runa")).join(TRANSFER_DIR);
        let run = run_dir(temp.path(), "runa", sample);
        let run_name = run.file_name().unwrap().to_string_lossy().into_owned();
        for family in FileFamily::ALL {
            let archive = transfer.join(family.as_str()).join(sample).join(format!(
                "{run_name}_{family}.{}",
                family.archive_extension()
            ));
            assert!(archive.is_file(), "missing {}", archive.display());
            assert!(
                run.join(format!("{run_name}_{family}_archive.success"))
                    .is_file()
            );
        }
    }

    assert!(sink.events().iter().any(|event| matches!(
        event,
        ArchiveEvent::ProjectIgnored { name, .. } if name == "20221208_wehi_bowden_notadir"
    )));
}

#[test]
fn recent_run_is_left_alone() {
    let temp = tempfile::tempdir().unwrap();
    make_data_root(temp.path());
    let config = config(
        temp.path(),
        Settings {
            delay: 600,
            ..Settings::default()
        },
    );
    let runner = CountingRunner::default();
    let sink = MemorySink::new();

    let summary = Orchestrator::new(&config, &runner, &sink).run_pass().unwrap();

    assert_eq!(summary.too_recent, 4);
    assert_eq!(summary.eligible, 0);
    assert!(runner.calls().is_empty());
    assert!(archives(temp.path(), "runb").is_empty());
    assert!(
        sink.events()
            .iter()
            .any(|event| matches!(event, ArchiveEvent::RunTooRecent { .. }))
    );
}

#[test]
fn unfinished_run_is_never_archived() {
    let temp = tempfile::tempdir().unwrap();
    make_data_root(temp.path());
    let config = config(temp.path(), Settings::default());
    let runner = CountingRunner::default();
    let sink = MemorySink::new();

    Orchestrator::new(&config, &runner, &sink).run_pass().unwrap();

    assert!(archives(temp.path(), "runc").is_empty());
    let runc = run_dir(temp.path(), "runc", "sample_a");
    assert!(
        runner
            .calls()
            .iter()
            .all(|argv| !argv.iter().any(|arg| arg.contains("runcsample")))
    );
    assert!(
        fs::read_dir(&runc)
            .unwrap()
            .flatten()
            .all(|entry| !entry.file_name().to_string_lossy().ends_with(".success"))
    );
}

#[test]
fn second_pass_spawns_nothing() {
    let temp = tempfile::tempdir().unwrap();
    make_data_root(temp.path());
    let config = config(temp.path(), Settings::default());
    let sink = MemorySink::new();

    Orchestrator::new(&config, &SystemRunner::new(), &sink)
        .run_pass()
        .unwrap();
    let before: Vec<_> = archives(temp.path(), "runa")
        .into_iter()
        .map(|path| {
            let modified = fs::metadata(&path).unwrap().modified().unwrap();
            (path, modified)
        })
        .collect();
    assert_eq!(before.len(), 6);

    let runner = CountingRunner::default();
    let summary = Orchestrator::new(&config, &runner, &sink).run_pass().unwrap();

    assert!(runner.calls().is_empty());
    assert_eq!(summary.archived, 0);
    assert_eq!(summary.skipped, 12);
    for (path, modified) in before {
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }
}

#[test]
fn extra_directories_are_processed() {
    let temp = tempfile::tempdir().unwrap();
    make_data_root(temp.path());
    let config = config(
        temp.path(),
        Settings {
            extra_dirs: "[TEST_b]",
            file_types: "[fastq]",
            ..Settings::default()
        },
    );
    let runner = CountingRunner::default();
    let sink = MemorySink::new();

    let summary = Orchestrator::new(&config, &runner, &sink).run_pass().unwrap();

    assert_eq!(summary.projects, 4);
    assert_eq!(summary.eligible, 5);
    assert_eq!(runner.calls().len(), 5);
    assert!(
        temp.path()
            .join("TEST_b")
            .join(TRANSFER_DIR)
            .join("basecalled-reads")
            .join("sample_a")
            .is_dir()
    );
    assert!(!temp.path().join("TEST_a").join(TRANSFER_DIR).exists());
}

#[test]
fn missing_source_blocks_only_its_family() {
    let temp = tempfile::tempdir().unwrap();
    make_data_root(temp.path());
    let run = run_dir(temp.path(), "runa", "sample_a");
    fs::remove_dir_all(run.join("fastq_fail")).unwrap();
    let config = config(temp.path(), Settings::default());
    let runner = CountingRunner::default();
    let sink = MemorySink::new();

    let summary = Orchestrator::new(&config, &runner, &sink).run_pass().unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.archived, 11);
    let run_name = run.file_name().unwrap().to_string_lossy().into_owned();
    assert!(
        !run.join(format!("{run_name}_basecalled-reads_archive.success"))
            .exists()
    );
    assert!(run.join(format!("{run_name}_reports_archive.success")).exists());
    assert!(run.join(format!("{run_name}_raw-signal_archive.success")).exists());
    let missing = sink.events().into_iter().find_map(|event| match event {
        ArchiveEvent::SourceMissing { family, path, .. } => Some((family, path)),
        _ => None,
    });
    assert_matches!(missing, Some((FileFamily::BasecalledReads, path)) if path.ends_with("fastq_fail"));
}

#[test]
fn families_follow_configured_order() {
    let temp = tempfile::tempdir().unwrap();
    make_data_root(temp.path());
    let config = config(
        temp.path(),
        Settings {
            file_types: "[basecalled-reads, reports]",
            ..Settings::default()
        },
    );
    let runner = CountingRunner::default();
    let sink = MemorySink::new();

    Orchestrator::new(&config, &runner, &sink).run_pass().unwrap();

    let families: Vec<FileFamily> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ArchiveEvent::FamilyArchived { family, .. } => Some(family),
            _ => None,
        })
        .collect();
    assert_eq!(families.len(), 8);
    for pair in families.chunks(2) {
        assert_eq!(pair, [FileFamily::BasecalledReads, FileFamily::Reports]);
    }
}

#[test]
fn failed_archive_is_retried_next_pass() {
    let temp = tempfile::tempdir().unwrap();
    make_data_root(temp.path());
    let config = config(
        temp.path(),
        Settings {
            file_types: "[reports]",
            ..Settings::default()
        },
    );
    let sink = MemorySink::new();

    let failing = CountingRunner::failing(2);
    let summary = Orchestrator::new(&config, &failing, &sink).run_pass().unwrap();
    assert_eq!(summary.failed, 4);
    assert!(summary.has_failures());

    let working = CountingRunner::default();
    let summary = Orchestrator::new(&config, &working, &sink).run_pass().unwrap();
    assert_eq!(summary.archived, 4);
    assert_eq!(working.calls().len(), 4);
}

#[test]
fn survey_reports_gate_results_without_side_effects() {
    let temp = tempfile::tempdir().unwrap();
    make_data_root(temp.path());
    let config = config(temp.path(), Settings::default());
    let runner = CountingRunner::default();
    let sink = MemorySink::new();

    let statuses = Orchestrator::new(&config, &runner, &sink).survey().unwrap();

    assert_eq!(statuses.len(), 6);
    assert_eq!(
        statuses
            .iter()
            .filter(|status| status.state == RunState::NotFinished)
            .count(),
        2
    );
    assert!(runner.calls().is_empty());
    assert!(archives(temp.path(), "runa").is_empty());
}
