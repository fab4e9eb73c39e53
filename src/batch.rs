//! Caller-facing batch, parameter and perturbation jobs.
//!
//! [`BatchRunner`] is the main entry point for running the console
//! application from Rust. It supports three kinds of batch processing:
//!
//! - **Batch job**: running the same macro across many working
//!   directories.
//! - **Parameter job**: running one model repeatedly with different
//!   input-variable values, useful for sensitivity studies.
//! - **Perturbation job**: a parameter job structured as baseline plus
//!   one-variable-at-a-time perturbations, useful for estimating the
//!   gradient when wrapping models in an optimization loop.

use std::collections::BTreeMap;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::macros::{self, MacroGenerator};
use crate::output::{self, ParsedOutput};
use crate::results::{self, AggregatedResults, PerturbationResults};
use crate::sched::{ConsoleApp, ProcessScheduler, RunStatus, ScheduleOptions};
use crate::task::TaskDescriptor;
use crate::util;
use crate::value::Value;
use crate::Float;

/// Default per-task wall-clock budget, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Tunable settings for batch runs. Loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Number of console processes started in parallel. Defaults to the
    /// machine's CPU count.
    pub concurrency: usize,
    /// Maximum time a single run may take before it is terminated.
    pub timeout_secs: u64,
    /// Stop launching queued tasks once a completed task reports errors.
    /// In-flight tasks run to completion and completed results are kept.
    pub stop_on_error: bool,
    /// Keep captured logs for successful runs too.
    pub keep_logfiles: bool,
    /// Print per-task completion lines.
    pub verbose: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            concurrency: util::default_concurrency(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            stop_on_error: true,
            keep_logfiles: false,
            verbose: true,
        }
    }
}

impl RunSettings {
    pub fn from_path(path: &Path) -> Result<Self> {
        util::deser_struct_from_path(path)
    }
}

/// Outcome summary of one scheduled task.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub task_id: usize,
    pub name: String,
    pub status: RunStatus,
    pub elapsed: Duration,
    /// Diagnostic lines reported by the console, benign warnings
    /// excluded.
    pub errors: Vec<String>,
    pub log_file: Option<PathBuf>,
}

impl RunRecord {
    pub fn is_ok(&self) -> bool {
        self.status.is_completed() && self.errors.is_empty()
    }
}

/// Job layer driving the console application.
pub struct BatchRunner {
    console: ConsoleApp,
    settings: RunSettings,
}

impl BatchRunner {
    pub fn new(console: ConsoleApp) -> Self {
        Self::with_settings(console, RunSettings::default())
    }

    pub fn with_settings(console: ConsoleApp, settings: RunSettings) -> Self {
        Self { console, settings }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Runs one macro across many working directories, one task per
    /// directory. Returns per-task run records in task order.
    pub fn run_batch_job(
        &self,
        macro_lines: &[String],
        folders: &[PathBuf],
    ) -> Result<Vec<RunRecord>> {
        let tasks = folders
            .iter()
            .enumerate()
            .map(|(id, dir)| {
                TaskDescriptor::new(id, dir, macro_lines.to_vec())
                    .with_keep_log(self.settings.keep_logfiles)
            })
            .collect::<Vec<TaskDescriptor>>();
        info!("starting batch job, {} instances", tasks.len());
        let (_parsed, records) = self.execute(tasks)?;
        Ok(records)
    }

    /// Runs the same model repeatedly with different input-variable
    /// values. Input value lists of length one broadcast to all tasks,
    /// all others must share one length N; N tasks are scheduled.
    pub fn run_param_job(
        &self,
        load_macro: &[String],
        main_macro: &[String],
        inputs: &[(String, Vec<Value>)],
        outputs: &[String],
        working_dir: &Path,
    ) -> Result<AggregatedResults> {
        let n_tasks = param_task_count(inputs)?;
        let mut gen = MacroGenerator::new(n_tasks);
        gen.add_macro(load_macro.iter().cloned());
        for (name, values) in inputs {
            if values.len() == 1 {
                gen.add_set_value(name, values[0].clone());
            } else {
                gen.add_set_value_per_macro(name, values.clone())?;
            }
        }
        gen.add_macro(main_macro.iter().cloned());
        gen.add_macro(outputs.iter().map(|name| macros::dump_line(name)));
        gen.add_macro(vec!["exit".to_string()]);

        let tasks = gen
            .generate_macros()
            .into_iter()
            .enumerate()
            .map(|(id, commands)| {
                TaskDescriptor::new(id, working_dir, commands)
                    .with_outputs(outputs.to_vec())
                    .with_keep_log(self.settings.keep_logfiles)
            })
            .collect::<Vec<TaskDescriptor>>();
        info!("starting parameter job, {} instances", tasks.len());
        let (parsed, _records) = self.execute(tasks)?;
        Ok(results::aggregate(outputs, n_tasks, &parsed))
    }

    /// Runs a model at a shared baseline and once per input with that
    /// input perturbed by the relative `factor`, scheduling M+1 tasks
    /// for M inputs. The result is split into the baseline objective and
    /// the per-input perturbation responses.
    pub fn run_perturbation_job(
        &self,
        load_macro: &[String],
        main_macro: &[String],
        inputs: &[(String, Value)],
        outputs: &[String],
        working_dir: &Path,
        factor: Float,
    ) -> Result<PerturbationResults> {
        let columns = perturbation_columns(inputs, factor)?;
        let aggregated =
            self.run_param_job(load_macro, main_macro, &columns, outputs, working_dir)?;
        results::split_perturbations(aggregated)
    }

    /// Common schedule-and-parse path.
    fn execute(
        &self,
        tasks: Vec<TaskDescriptor>,
    ) -> Result<(BTreeMap<usize, ParsedOutput>, Vec<RunRecord>)> {
        let scheduler = ProcessScheduler::new(self.console.clone());
        let opts = ScheduleOptions {
            concurrency: self.settings.concurrency,
            timeout: Duration::from_secs(self.settings.timeout_secs),
            verbose: self.settings.verbose,
        };
        let names = tasks.iter().map(|t| t.name.clone()).collect::<Vec<String>>();
        let halt = scheduler.halt_handle();
        let stop_on_error = self.settings.stop_on_error;

        type Accumulator = (BTreeMap<usize, ParsedOutput>, Vec<RunRecord>);
        let accumulated: Arc<Mutex<Accumulator>> =
            Arc::new(Mutex::new((BTreeMap::new(), Vec::new())));
        let sink = accumulated.clone();
        scheduler.schedule(tasks, &opts, move |task_id, result| {
            let parsed = output::parse(&result.output);
            if stop_on_error && (parsed.has_errors() || !result.status.is_completed()) {
                halt.store(true, Ordering::SeqCst);
            }
            let record = RunRecord {
                task_id,
                name: names.get(task_id).cloned().unwrap_or_default(),
                status: result.status.clone(),
                elapsed: result.elapsed,
                errors: parsed.errors.clone(),
                log_file: result.log_file.clone(),
            };
            let mut accumulated = sink.lock().unwrap_or_else(|e| e.into_inner());
            accumulated.0.insert(task_id, parsed);
            accumulated.1.push(record);
        })?;

        let mut accumulated = accumulated.lock().unwrap_or_else(|e| e.into_inner());
        let parsed = mem::take(&mut accumulated.0);
        let mut records = mem::take(&mut accumulated.1);
        records.sort_by_key(|record| record.task_id);
        Ok((parsed, records))
    }
}

/// Resolves the task count from input specs. Single values broadcast,
/// everything else must agree on one length.
fn param_task_count(inputs: &[(String, Vec<Value>)]) -> Result<usize> {
    let mut n_tasks = None;
    for (name, values) in inputs {
        if values.is_empty() {
            return Err(Error::SizeMismatch {
                name: name.clone(),
                expected: n_tasks.unwrap_or(1),
                found: 0,
            });
        }
        if values.len() == 1 {
            continue;
        }
        match n_tasks {
            None => n_tasks = Some(values.len()),
            Some(expected) if expected != values.len() => {
                return Err(Error::SizeMismatch {
                    name: name.clone(),
                    expected,
                    found: values.len(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(n_tasks.unwrap_or(1))
}

/// Builds the per-input value columns of a perturbation job: task 0 is
/// the shared baseline, task i+1 perturbs input i by `value * (1 +
/// factor)` with all other inputs held at baseline.
fn perturbation_columns(
    inputs: &[(String, Value)],
    factor: Float,
) -> Result<Vec<(String, Vec<Value>)>> {
    let mut columns = Vec::with_capacity(inputs.len());
    for (index, (name, baseline)) in inputs.iter().enumerate() {
        let mut column = Vec::with_capacity(inputs.len() + 1);
        column.push(baseline.clone());
        for perturbed in 0..inputs.len() {
            if perturbed == index {
                column.push(baseline.scaled(1.0 + factor)?);
            } else {
                column.push(baseline.clone());
            }
        }
        columns.push((name.clone(), column));
    }
    Ok(columns)
}
