use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use nanopore_auto_archive::config::{ConfigLoader, ResolvedConfig};
use nanopore_auto_archive::domain::FileFamily;
use nanopore_auto_archive::error::ArchiveError;
use nanopore_auto_archive::events::TracingSink;
use nanopore_auto_archive::orchestrator::{Orchestrator, RunState};
use nanopore_auto_archive::output::{JsonOutput, print_summary_text};
use nanopore_auto_archive::process::SystemRunner;
use nanopore_auto_archive::transfer::{TransferRequest, collect_descriptors, write_descriptors};

#[derive(Parser)]
#[command(name = "auto-archive")]
#[command(about = "Archive finished sequencing runs into a transfer directory")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run one archiving pass over the data directory")]
    Run(RunArgs),
    #[command(about = "Validate the config and report which runs are ready, without archiving")]
    Check(CheckArgs),
    #[command(about = "Write transfer descriptors for the archives in each transfer directory")]
    TransferManifest(ManifestArgs),
}

#[derive(Args)]
struct RunArgs {
    config: PathBuf,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Overrides `file_types` from the config; may be repeated.
    #[arg(long = "file-type")]
    file_types: Vec<FileFamily>,

    #[arg(long)]
    json: bool,

    /// Exit with status 4 if any archive or checksum operation failed.
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct CheckArgs {
    config: PathBuf,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ManifestArgs {
    config: PathBuf,

    #[arg(long)]
    source_endpoint: String,

    #[arg(long)]
    dest_endpoint: String,

    #[arg(long)]
    dest_path: Utf8PathBuf,

    #[arg(long, default_value = "transfer_manifests")]
    out_dir: PathBuf,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<ArchiveError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &ArchiveError) -> u8 {
    match error {
        ArchiveError::MissingTool(_) => 3,
        error if error.is_configuration() => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_pass(args),
        Commands::Check(args) => {
            init_stderr_logging();
            run_check(args)
        }
        Commands::TransferManifest(args) => {
            init_stderr_logging();
            run_manifest(args)
        }
    }
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn init_file_logging(log_dir: &Path) -> miette::Result<PathBuf> {
    fs::create_dir_all(log_dir).into_diagnostic()?;
    let log_path = log_dir.join(format!(
        "auto_archive_{}.log",
        chrono::Local::now().format("%Y-%m-%d_%H%M")
    ));
    let file = fs::File::create(&log_path).into_diagnostic()?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(log_path)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn load_config(path: &Path) -> miette::Result<ResolvedConfig> {
    ConfigLoader::resolve(path).map_err(|err| {
        tracing::error!("{err}, exiting");
        miette::Report::new(err)
    })
}

fn preflight(config: &ResolvedConfig) -> miette::Result<()> {
    let missing = config
        .tools
        .missing_tools(config.threads, config.calculate_checksums);
    if missing.is_empty() {
        return Ok(());
    }
    let err = ArchiveError::MissingTool(missing.join(", "));
    tracing::error!("{err}, exiting");
    Err(err.into())
}

fn run_pass(args: RunArgs) -> miette::Result<ExitCode> {
    let log_path = init_file_logging(&args.log_dir)?;
    let mut config = load_config(&args.config)?;
    if !args.file_types.is_empty() {
        config.file_types = args.file_types;
    }
    preflight(&config)?;

    let runner = SystemRunner::new();
    let orchestrator = Orchestrator::new(&config, &runner, &TracingSink);
    let summary = orchestrator.run_pass().map_err(|err| {
        tracing::error!("{err}");
        miette::Report::new(err)
    })?;

    if args.json {
        JsonOutput::print_summary(&summary).into_diagnostic()?;
    } else {
        print_summary_text(&summary);
        println!("log: {}", log_path.display());
    }

    if args.strict && summary.has_failures() {
        return Ok(ExitCode::from(4));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_check(args: CheckArgs) -> miette::Result<ExitCode> {
    let config = load_config(&args.config)?;
    preflight(&config)?;

    let runner = SystemRunner::new();
    let orchestrator = Orchestrator::new(&config, &runner, &TracingSink);
    let statuses = orchestrator.survey()?;

    if args.json {
        JsonOutput::print_survey(&statuses).into_diagnostic()?;
    } else {
        for status in &statuses {
            let state = match status.state {
                RunState::NotFinished => "not finished".to_string(),
                RunState::TooRecent => format!(
                    "finished {}s ago, waiting for {}s",
                    status.age_secs.unwrap_or_default(),
                    config.time_delay.as_secs()
                ),
                RunState::Eligible => "ready to archive".to_string(),
                RunState::Unreadable => "unreadable".to_string(),
            };
            println!(
                "{}/{}/{}: {state}",
                status.project, status.sample, status.run
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_manifest(args: ManifestArgs) -> miette::Result<ExitCode> {
    let config = load_config(&args.config)?;
    let projects = config
        .matcher()?
        .select_projects(&config.data_dir, &TracingSink)?;
    let request = TransferRequest {
        source_endpoint: args.source_endpoint,
        dest_endpoint: args.dest_endpoint,
        dest_path: args.dest_path,
    };
    let descriptors = collect_descriptors(&projects, &config.transfer_dir, &request)?;
    let written = write_descriptors(&descriptors, &args.out_dir)?;
    JsonOutput::print_written(&written).into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}
