use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;
use crate::events::{ArchiveEvent, EventSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn(&self, cmd: &mut Command) -> Result<Child, ArchiveError> {
        cmd.spawn().map_err(|err| ArchiveError::Spawn {
            program: self.program.clone(),
            message: err.to_string(),
        })
    }
}

/// Exit code of a finished process; `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    code: Option<i32>,
}

impl ProcessExit {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn signalled() -> Self {
        Self { code: None }
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// `source | sink > output`. Only the sink's exit decides success; a
/// failing source is reported but does not fail the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub source: Invocation,
    pub sink: Invocation,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineExit {
    pub source: ProcessExit,
    pub sink: ProcessExit,
}

impl PipelineExit {
    pub fn success(&self) -> bool {
        self.sink.success()
    }
}

pub trait CommandRunner: Send + Sync {
    /// Streams stdout and stderr to the sink line by line.
    fn run(&self, command: &Invocation, sink: &dyn EventSink)
    -> Result<ProcessExit, ArchiveError>;

    /// Writes stdout to `output`, streaming stderr to the sink.
    fn run_to_file(
        &self,
        command: &Invocation,
        output: &Path,
        append: bool,
        sink: &dyn EventSink,
    ) -> Result<ProcessExit, ArchiveError>;

    fn run_pipeline(
        &self,
        pipeline: &Pipeline,
        sink: &dyn EventSink,
    ) -> Result<PipelineExit, ArchiveError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        command: &Invocation,
        sink: &dyn EventSink,
    ) -> Result<ProcessExit, ArchiveError> {
        let mut cmd = command.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command.spawn(&mut cmd)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        thread::scope(|scope| {
            scope.spawn(|| forward_lines(stderr, &command.program, true, sink));
            forward_lines(stdout, &command.program, false, sink);
        });

        wait(&mut child, &command.program)
    }

    fn run_to_file(
        &self,
        command: &Invocation,
        output: &Path,
        append: bool,
        sink: &dyn EventSink,
    ) -> Result<ProcessExit, ArchiveError> {
        let file = open_output(output, append)?;
        let mut cmd = command.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(file))
            .stderr(Stdio::piped());
        let mut child = command.spawn(&mut cmd)?;
        let stderr = child.stderr.take();
        forward_lines(stderr, &command.program, true, sink);
        wait(&mut child, &command.program)
    }

    fn run_pipeline(
        &self,
        pipeline: &Pipeline,
        sink: &dyn EventSink,
    ) -> Result<PipelineExit, ArchiveError> {
        let mut source_cmd = pipeline.source.command();
        source_cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut source = pipeline.source.spawn(&mut source_cmd)?;
        let Some(stream) = source.stdout.take() else {
            let _ = source.kill();
            let _ = source.wait();
            return Err(ArchiveError::Spawn {
                program: pipeline.source.program.clone(),
                message: "stdout was not captured".to_string(),
            });
        };

        let spawned_sink = open_output(&pipeline.output, false).and_then(|file| {
            let mut sink_cmd = pipeline.sink.command();
            sink_cmd
                .stdin(Stdio::from(stream))
                .stdout(Stdio::from(file))
                .stderr(Stdio::piped());
            pipeline.sink.spawn(&mut sink_cmd)
        });
        let mut compressor = match spawned_sink {
            Ok(child) => child,
            Err(err) => {
                let _ = source.kill();
                let _ = source.wait();
                return Err(err);
            }
        };

        let source_stderr = source.stderr.take();
        let sink_stderr = compressor.stderr.take();
        thread::scope(|scope| {
            scope.spawn(|| forward_lines(source_stderr, &pipeline.source.program, true, sink));
            forward_lines(sink_stderr, &pipeline.sink.program, true, sink);
        });

        let sink_exit = wait(&mut compressor, &pipeline.sink.program)?;
        let source_exit = wait(&mut source, &pipeline.source.program)?;
        if !source_exit.success() {
            sink.event(ArchiveEvent::SourceStageFailed {
                program: pipeline.source.program.clone(),
                code: source_exit.code(),
            });
        }
        Ok(PipelineExit {
            source: source_exit,
            sink: sink_exit,
        })
    }
}

fn open_output(path: &Path, append: bool) -> Result<fs::File, ArchiveError> {
    let mut options = OpenOptions::new();
    if append {
        options.append(true).create(true);
    } else {
        options.write(true).create(true).truncate(true);
    }
    options
        .open(path)
        .map_err(|err| ArchiveError::Filesystem(format!("open {}: {err}", path.display())))
}

fn wait(child: &mut Child, program: &str) -> Result<ProcessExit, ArchiveError> {
    child
        .wait()
        .map(ProcessExit::from)
        .map_err(|err| ArchiveError::Spawn {
            program: program.to_string(),
            message: err.to_string(),
        })
}

fn forward_lines<R: Read>(stream: Option<R>, program: &str, stderr: bool, sink: &dyn EventSink) {
    let Some(stream) = stream else {
        return;
    };
    for line in BufReader::new(stream).split(b'\n') {
        let Ok(line) = line else {
            break;
        };
        let text = String::from_utf8_lossy(&line).trim().to_string();
        if text.is_empty() {
            continue;
        }
        sink.event(ArchiveEvent::ToolOutput {
            program: program.to_string(),
            line: text,
            stderr,
        });
    }
}

/// External programs the archiver drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    #[serde(default = "default_tar")]
    pub tar: String,
    #[serde(default = "default_compressor")]
    pub compressor: String,
    #[serde(default = "default_hasher")]
    pub hasher: Vec<String>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            tar: default_tar(),
            compressor: default_compressor(),
            hasher: default_hasher(),
        }
    }
}

impl Toolchain {
    pub fn missing_tools(&self, threads: usize, checksums: bool) -> Vec<String> {
        let mut required = vec![self.tar.as_str()];
        if threads > 1 {
            required.push(self.compressor.as_str());
        }
        if checksums {
            if let Some(hasher) = self.hasher.first() {
                required.push(hasher.as_str());
            }
        }
        required
            .into_iter()
            .filter(|program| find_in_path(program).is_none())
            .map(str::to_string)
            .collect()
    }
}

fn default_tar() -> String {
    "tar".to_string()
}

fn default_compressor() -> String {
    "pigz".to_string()
}

fn default_hasher() -> Vec<String> {
    vec!["shasum".to_string(), "-a".to_string(), "1".to_string()]
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}
