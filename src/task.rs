//! Task descriptors for scheduled console runs.

use std::path::{Path, PathBuf};

/// Immutable record describing one scheduled invocation of the console
/// application.
///
/// Descriptors are created once per job submission and never mutated.
/// The `id` doubles as the task's result index: completion order is
/// unconstrained, result placement is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Stable ordering index, unique within one job.
    pub id: usize,
    /// Directory the script is materialized and executed in.
    pub working_dir: PathBuf,
    /// Ordered command lines written to the script file.
    pub commands: Vec<String>,
    /// Output variable names to collect, order preserved for result
    /// shaping.
    pub output_vars: Vec<String>,
    /// Keep the captured log even when the run succeeds.
    pub keep_log: bool,
    /// Display name used in progress reporting.
    pub name: String,
}

impl TaskDescriptor {
    pub fn new(id: usize, working_dir: impl Into<PathBuf>, commands: Vec<String>) -> Self {
        let working_dir = working_dir.into();
        let name = derive_name(&working_dir);
        Self {
            id,
            working_dir,
            commands,
            output_vars: Vec::new(),
            keep_log: false,
            name,
        }
    }

    pub fn with_outputs(mut self, output_vars: Vec<String>) -> Self {
        self.output_vars = output_vars;
        self
    }

    pub fn with_keep_log(mut self, keep_log: bool) -> Self {
        self.keep_log = keep_log;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Default task name: `<parent>/<dirname>` of the working directory.
fn derive_name(dir: &Path) -> String {
    let leaf = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = dir
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if parent.is_empty() {
        leaf
    } else {
        format!("{}/{}", parent, leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_derived_from_working_dir() {
        let task = TaskDescriptor::new(0, "/data/models/arm2d", vec![]);
        assert_eq!(task.name, "models/arm2d");
    }

    #[test]
    fn builder_flags() {
        let task = TaskDescriptor::new(3, "/tmp", vec!["exit".to_string()])
            .with_outputs(vec!["Main.Out".to_string()])
            .with_keep_log(true)
            .with_name("custom");
        assert_eq!(task.id, 3);
        assert_eq!(task.output_vars, vec!["Main.Out".to_string()]);
        assert!(task.keep_log);
        assert_eq!(task.name, "custom");
    }
}
