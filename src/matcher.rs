use std::fs;
use std::path::Path;

use regex::Regex;

use crate::domain::{ProjectDirectory, ProjectFields, ProjectKind};
use crate::error::ArchiveError;
use crate::events::{ArchiveEvent, EventSink};

pub const DEFAULT_PROJECT_PATTERN: &str = r"^(\d{8})_([\w-]+)_([\w-]+)_([\w-]+)$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Matched(ProjectFields),
    Unmatched,
}

#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: Regex,
    extra: Vec<String>,
}

impl PathMatcher {
    pub fn new(pattern: &str, extra: Vec<String>) -> Result<Self, ArchiveError> {
        let pattern = Regex::new(pattern).map_err(|err| ArchiveError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })?;
        if pattern.captures_len() < 5 {
            return Err(ArchiveError::InvalidPattern {
                pattern: pattern.as_str().to_string(),
                message: "expected four capture groups (date, affiliation, lab, name)"
                    .to_string(),
            });
        }
        Ok(Self { pattern, extra })
    }

    pub fn with_default_pattern(extra: Vec<String>) -> Self {
        Self {
            pattern: Regex::new(DEFAULT_PROJECT_PATTERN).expect("default pattern compiles"),
            extra,
        }
    }

    pub fn extra(&self) -> &[String] {
        &self.extra
    }

    pub fn classify(&self, name: &str) -> Classification {
        let Some(caps) = self.pattern.captures(name) else {
            return Classification::Unmatched;
        };
        let group = |idx: usize| {
            caps.get(idx)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };
        Classification::Matched(ProjectFields {
            date: group(1),
            affiliation: group(2),
            lab: group(3),
            name: group(4),
        })
    }

    /// Pattern-matched directories of `data_dir` followed by the extra
    /// names. Duplicates between the two are kept.
    pub fn select_projects(
        &self,
        data_dir: &Path,
        sink: &dyn EventSink,
    ) -> Result<Vec<ProjectDirectory>, ArchiveError> {
        let entries = fs::read_dir(data_dir).map_err(|err| {
            ArchiveError::Filesystem(format!("read {}: {err}", data_dir.display()))
        })?;

        let mut projects = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| ArchiveError::Filesystem(err.to_string()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Classification::Matched(fields) = self.classify(&name) else {
                continue;
            };
            let path = entry.path();
            if !path.is_dir() {
                sink.event(ArchiveEvent::ProjectIgnored {
                    name,
                    reason: "not a directory".to_string(),
                });
                continue;
            }
            sink.event(ArchiveEvent::ProjectFound { name: name.clone() });
            projects.push(ProjectDirectory {
                name,
                path,
                kind: ProjectKind::Structured(fields),
            });
        }

        for name in &self.extra {
            projects.push(ProjectDirectory {
                name: name.clone(),
                path: data_dir.join(name),
                kind: ProjectKind::Extra,
            });
        }
        Ok(projects)
    }
}
