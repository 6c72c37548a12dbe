use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::FileFamily;
use crate::error::ArchiveError;
use crate::gate::{CompletionGate, DEFAULT_END_OF_RUN_PATTERN};
use crate::matcher::{DEFAULT_PROJECT_PATTERN, PathMatcher};
use crate::process::Toolchain;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub data_dir: PathBuf,
    pub transfer_dir: String,
    /// Seconds the end-of-run file must have existed; no default.
    pub time_delay: u64,
    #[serde(default)]
    pub extra_dirs: Option<serde_yaml::Value>,
    #[serde(default)]
    pub file_types: Option<Vec<FileFamily>>,
    #[serde(default)]
    pub proj_dir_regex: Option<String>,
    #[serde(default)]
    pub end_of_run_regex: Option<String>,
    #[serde(default)]
    pub calculate_checksums: bool,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub tools: Toolchain,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub transfer_dir: String,
    pub time_delay: Duration,
    pub extra_dirs: Vec<String>,
    pub file_types: Vec<FileFamily>,
    pub proj_dir_regex: String,
    pub end_of_run_regex: String,
    pub calculate_checksums: bool,
    pub threads: usize,
    pub tools: Toolchain,
}

impl ResolvedConfig {
    pub fn matcher(&self) -> Result<PathMatcher, ArchiveError> {
        PathMatcher::new(&self.proj_dir_regex, self.extra_dirs.clone())
    }

    pub fn gate(&self) -> Result<CompletionGate, ArchiveError> {
        CompletionGate::new(&self.end_of_run_regex, self.time_delay)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: &Path) -> Result<ResolvedConfig, ArchiveError> {
        if !path.exists() {
            return Err(ArchiveError::MissingConfig(path.to_path_buf()));
        }
        let content =
            fs::read_to_string(path).map_err(|_| ArchiveError::ConfigRead(path.to_path_buf()))?;
        Self::resolve_str(&content)
    }

    pub fn resolve_str(content: &str) -> Result<ResolvedConfig, ArchiveError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|err| ArchiveError::ConfigParse(err.to_string()))?;
        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ArchiveError> {
        if !config.data_dir.is_dir() {
            return Err(ArchiveError::MissingDataDir(config.data_dir));
        }

        let mut components = Path::new(&config.transfer_dir).components();
        let single_component = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_component {
            return Err(ArchiveError::InvalidConfig(format!(
                "transfer_dir must be a single directory name, got `{}`",
                config.transfer_dir
            )));
        }

        let extra_dirs = resolve_extra_dirs(config.extra_dirs)?;

        let file_types = config
            .file_types
            .unwrap_or_else(|| FileFamily::ALL.to_vec());
        if file_types.is_empty() {
            return Err(ArchiveError::InvalidConfig(
                "file_types must list at least one file type".to_string(),
            ));
        }

        let threads = config.threads.unwrap_or(1);
        if threads == 0 {
            return Err(ArchiveError::InvalidConfig(
                "threads must be at least 1".to_string(),
            ));
        }

        if config.tools.hasher.is_empty() {
            return Err(ArchiveError::InvalidConfig(
                "tools.hasher must name a program".to_string(),
            ));
        }

        let resolved = ResolvedConfig {
            data_dir: config.data_dir,
            transfer_dir: config.transfer_dir,
            time_delay: Duration::from_secs(config.time_delay),
            extra_dirs,
            file_types,
            proj_dir_regex: config
                .proj_dir_regex
                .unwrap_or_else(|| DEFAULT_PROJECT_PATTERN.to_string()),
            end_of_run_regex: config
                .end_of_run_regex
                .unwrap_or_else(|| DEFAULT_END_OF_RUN_PATTERN.to_string()),
            calculate_checksums: config.calculate_checksums,
            threads,
            tools: config.tools,
        };

        // Both patterns must compile before any scanning.
        resolved.matcher()?;
        resolved.gate()?;
        Ok(resolved)
    }
}

fn resolve_extra_dirs(value: Option<serde_yaml::Value>) -> Result<Vec<String>, ArchiveError> {
    let invalid = || {
        ArchiveError::InvalidConfig("extra_dirs must be a list of directory names".to_string())
    };
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(Vec::new()),
        Some(serde_yaml::Value::Sequence(items)) => items
            .into_iter()
            .map(|item| match item {
                serde_yaml::Value::String(name) if !name.trim().is_empty() => Ok(name),
                _ => Err(invalid()),
            })
            .collect(),
        Some(_) => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn extra_dirs_must_be_a_list() {
        let value: serde_yaml::Value = serde_yaml::from_str("TEST_b").unwrap();
        assert_matches!(
            resolve_extra_dirs(Some(value)),
            Err(ArchiveError::InvalidConfig(_))
        );
        assert_eq!(resolve_extra_dirs(None).unwrap(), Vec::<String>::new());

        let value: serde_yaml::Value = serde_yaml::from_str("[TEST_b, TEST_c]").unwrap();
        assert_eq!(
            resolve_extra_dirs(Some(value)).unwrap(),
            vec!["TEST_b".to_string(), "TEST_c".to_string()]
        );
    }
}
