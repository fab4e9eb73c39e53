//! Bounded-concurrency scheduling of console processes.
//!
//! The scheduler runs a list of [`TaskDescriptor`]s against the external
//! console application. With a concurrency bound above one it maintains a
//! bounded pool of worker threads, each owning exactly one console
//! process at a time; otherwise it falls back to a sequential fast path
//! with no worker infrastructure.
//!
//! Per task the worker materializes the command lines into a temporary
//! script file inside the task's working directory, launches the console
//! with the script path and the non-interactive flag, and captures
//! combined stdout/stderr through a shared anonymous file handle. Process
//! completion is polled at a bounded interval; a task running past its
//! wall-clock budget is forcibly terminated and flagged. Every live
//! process id sits in the scheduler's [`ProcessRegistry`] so cancellation
//! and the interrupt hook can guarantee that no console process outlives
//! the run.

pub mod registry;

pub use registry::ProcessRegistry;

use std::collections::VecDeque;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::output;
use crate::task::TaskDescriptor;

/// Interval between completion polls on a running console process.
pub const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(300);
/// Interval between worker-retire polls in the pool loop.
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Marker appended to the captured output of a timed out task.
const TIMEOUT_MARKER: &str = "ERROR: Timeout. Terminated by batch processor.";

/// Serializes human-readable progress lines across workers.
static PRINT_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Invocation recipe for the external console application.
///
/// The console is treated as a black box invoked as
/// `<executable> <script-flag> <script-path> <extra-args...>`, reading
/// its commands from the script file and writing human-readable lines to
/// stdout/stderr.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleApp {
    /// Path to the console executable.
    pub executable: PathBuf,
    /// Flag preceding the script file path.
    pub script_flag: String,
    /// Trailing arguments, non-interactive flag included.
    pub extra_args: Vec<String>,
}

impl ConsoleApp {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            script_flag: "--macro=".to_string(),
            extra_args: vec!["/ni".to_string()],
        }
    }

    fn command(&self, script: &Path, working_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(&self.script_flag)
            .arg(script)
            .args(&self.extra_args)
            .current_dir(working_dir);
        cmd
    }
}

/// Options for a single `schedule` call.
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    /// Maximum number of console processes running at once.
    pub concurrency: usize,
    /// Per-task wall-clock budget.
    pub timeout: Duration,
    /// Print per-task completion lines.
    pub verbose: bool,
}

impl ScheduleOptions {
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            concurrency,
            timeout,
            verbose: true,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidParam(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.timeout.as_millis() == 0 {
            return Err(Error::InvalidParam("timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Exit status of one scheduled task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Process ran to completion on its own.
    Completed { exit_code: Option<i32> },
    /// Wall-clock budget exceeded, process forcibly terminated.
    TimedOut,
    /// Process never started.
    LaunchFailed { reason: String },
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        match self {
            RunStatus::Completed { .. } => true,
            _ => false,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        match self {
            RunStatus::TimedOut => true,
            _ => false,
        }
    }

    pub fn is_launch_failed(&self) -> bool {
        match self {
            RunStatus::LaunchFailed { .. } => true,
            _ => false,
        }
    }
}

/// Raw captured outcome of one scheduled task.
#[derive(Debug, Clone)]
pub struct RawCaptureResult {
    pub task_id: usize,
    /// Combined stdout/stderr text.
    pub output: String,
    /// Wall time from launch to completion.
    pub elapsed: Duration,
    pub status: RunStatus,
    /// Persisted log file, present when retention was requested or the
    /// run failed.
    pub log_file: Option<PathBuf>,
}

/// Bounded-pool scheduler owning the process registry for one job.
pub struct ProcessScheduler {
    console: ConsoleApp,
    registry: ProcessRegistry,
    cancel: Arc<AtomicBool>,
    halt: Arc<AtomicBool>,
}

impl ProcessScheduler {
    pub fn new(console: ConsoleApp) -> Self {
        registry::install_interrupt_hook();
        Self {
            console,
            registry: ProcessRegistry::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            halt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Cooperative cancellation handle: raising it kills in-flight
    /// processes and drops queued tasks.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Soft-stop handle: raising it stops launching queued tasks while
    /// in-flight tasks run to completion.
    pub fn halt_handle(&self) -> Arc<AtomicBool> {
        self.halt.clone()
    }

    /// Runs every task to completion, invoking `on_complete(task_id,
    /// result)` exactly once per completed task. Submission order
    /// determines task ids, completion order is unconstrained.
    ///
    /// Returns `Error::Cancelled` when the run is interrupted; queued and
    /// in-flight tasks produce no results then, and the registry is
    /// emptied before the call returns.
    pub fn schedule<F>(
        &self,
        tasks: Vec<TaskDescriptor>,
        opts: &ScheduleOptions,
        on_complete: F,
    ) -> Result<()>
    where
        F: Fn(usize, RawCaptureResult) + Send + Sync + 'static,
    {
        opts.validate()?;
        if tasks.is_empty() {
            return Ok(());
        }
        let on_complete = Arc::new(on_complete);
        if opts.concurrency <= 1 || tasks.len() <= 1 {
            self.run_sequential(tasks, opts, on_complete)
        } else {
            self.run_pool(tasks, opts, on_complete)
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst) || registry::interrupted()
    }

    fn worker(&self, opts: &ScheduleOptions) -> Worker {
        Worker {
            console: self.console.clone(),
            registry: self.registry.clone(),
            cancel: self.cancel.clone(),
            timeout: opts.timeout,
            verbose: opts.verbose,
        }
    }

    fn run_sequential(
        &self,
        tasks: Vec<TaskDescriptor>,
        opts: &ScheduleOptions,
        on_complete: Arc<dyn Fn(usize, RawCaptureResult) + Send + Sync>,
    ) -> Result<()> {
        debug!("running {} tasks sequentially", tasks.len());
        for task in tasks {
            if self.cancelled() {
                break;
            }
            if self.halt.load(Ordering::SeqCst) {
                debug!("stopping before task {}: halt requested", task.id);
                break;
            }
            let worker = self.worker(opts);
            let id = task.id;
            if let Some(result) = worker.run(&task) {
                on_complete(id, result);
            }
        }
        if self.cancelled() {
            self.registry.kill_all();
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn run_pool(
        &self,
        tasks: Vec<TaskDescriptor>,
        opts: &ScheduleOptions,
        on_complete: Arc<dyn Fn(usize, RawCaptureResult) + Send + Sync>,
    ) -> Result<()> {
        debug!(
            "running {} tasks, concurrency bound {}",
            tasks.len(),
            opts.concurrency
        );
        let mut queue: VecDeque<TaskDescriptor> = tasks.into();
        let mut workers: Vec<thread::JoinHandle<()>> = Vec::new();
        let mut killed_on_cancel = false;

        while !queue.is_empty() || !workers.is_empty() {
            if self.cancelled() {
                queue.clear();
                if !killed_on_cancel {
                    let killed = self.registry.kill_all();
                    debug!("cancellation: killed {} in-flight processes", killed);
                    killed_on_cancel = true;
                }
            } else if self.halt.load(Ordering::SeqCst) && !queue.is_empty() {
                debug!("halt requested, dropping {} queued tasks", queue.len());
                queue.clear();
            }

            if !self.cancelled() && workers.len() < opts.concurrency && !queue.is_empty() {
                // a slot is free and tasks remain, spawn the next worker
                if let Some(task) = queue.pop_front() {
                    let worker = self.worker(opts);
                    let callback = on_complete.clone();
                    let spawned = thread::Builder::new()
                        .name(format!("console-worker-{}", task.id))
                        .spawn(move || {
                            let id = task.id;
                            if let Some(result) = worker.run(&task) {
                                callback(id, result);
                            }
                        });
                    match spawned {
                        Ok(handle) => workers.push(handle),
                        Err(e) => {
                            error!("failed spawning worker thread: {}", e);
                            self.registry.kill_all();
                            for handle in workers {
                                let _ = handle.join();
                            }
                            return Err(e.into());
                        }
                    }
                }
            } else {
                // all slots busy or queue drained, retire finished workers
                workers.retain(|handle| !handle.is_finished());
                if !workers.is_empty() || !queue.is_empty() {
                    thread::sleep(WORKER_POLL_INTERVAL);
                }
            }
        }

        if self.cancelled() {
            self.registry.kill_all();
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

impl Drop for ProcessScheduler {
    /// Last-resort cleanup for teardown paths that skip the normal
    /// return, unwinding included.
    fn drop(&mut self) {
        let leaked = self.registry.kill_all();
        if leaked > 0 {
            warn!("scheduler dropped with {} live processes, killed", leaked);
        }
    }
}

/// Per-task execution state moved into one worker thread.
struct Worker {
    console: ConsoleApp,
    registry: ProcessRegistry,
    cancel: Arc<AtomicBool>,
    timeout: Duration,
    verbose: bool,
}

impl Worker {
    /// Runs a single task to completion. Returns `None` when the run was
    /// cancelled mid-flight; cancelled tasks produce no results.
    fn run(&self, task: &TaskDescriptor) -> Option<RawCaptureResult> {
        let script = match write_script(task) {
            Ok(path) => path,
            Err(e) => {
                let result = self.launch_failure(task, format!("failed writing script file: {}", e));
                return Some(self.finalize(task, result));
            }
        };
        let result = self.run_with_script(task, &script);
        if let Err(e) = fs::remove_file(&script) {
            warn!("failed removing script file {}: {}", script.display(), e);
        }
        let result = result?;
        Some(self.finalize(task, result))
    }

    fn run_with_script(&self, task: &TaskDescriptor, script: &Path) -> Option<RawCaptureResult> {
        let mut logfile = match tempfile::tempfile_in(&task.working_dir) {
            Ok(file) => file,
            Err(e) => {
                return Some(self.launch_failure(task, format!("failed creating log buffer: {}", e)))
            }
        };
        let mut cmd = self.console.command(script, &task.working_dir);
        match (logfile.try_clone(), logfile.try_clone()) {
            (Ok(out), Ok(err)) => {
                cmd.stdout(Stdio::from(out)).stderr(Stdio::from(err));
            }
            _ => {
                return Some(self.launch_failure(task, "failed cloning log handle".to_string()))
            }
        }
        cmd.stdin(Stdio::null());

        let launched = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Some(self.launch_failure(
                    task,
                    format!("failed launching {}: {}", self.console.executable.display(), e),
                ))
            }
        };
        let pid = child.id();
        self.registry.add(pid);
        ProcessRegistry::global().add(pid);
        trace!("task {}: launched console process, pid {}", task.id, pid);

        let deadline = launched + self.timeout;
        let mut timed_out = false;
        let mut cancelled = false;
        let exit = loop {
            if self.cancel.load(Ordering::SeqCst) || registry::interrupted() {
                force_kill(&mut child);
                cancelled = true;
                break None;
            }
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!("task {}: timeout after {:?}, terminating", task.id, self.timeout);
                        force_kill(&mut child);
                        timed_out = true;
                        break None;
                    }
                    thread::sleep(PROCESS_POLL_INTERVAL);
                }
                Err(e) => {
                    warn!("task {}: failed polling console process: {}", task.id, e);
                    force_kill(&mut child);
                    break None;
                }
            }
        };
        self.registry.remove(pid);
        ProcessRegistry::global().remove(pid);
        if cancelled {
            return None;
        }

        let mut raw = read_capture(&mut logfile);
        if timed_out {
            if !raw.is_empty() && !raw.ends_with('\n') {
                raw.push('\n');
            }
            raw.push_str(TIMEOUT_MARKER);
        }
        let status = if timed_out {
            RunStatus::TimedOut
        } else {
            RunStatus::Completed {
                exit_code: exit.and_then(|s| s.code()),
            }
        };
        Some(RawCaptureResult {
            task_id: task.id,
            output: raw,
            elapsed: launched.elapsed(),
            status,
            log_file: None,
        })
    }

    fn launch_failure(&self, task: &TaskDescriptor, reason: String) -> RawCaptureResult {
        warn!("task {}: {}", task.id, reason);
        RawCaptureResult {
            task_id: task.id,
            output: String::new(),
            elapsed: Duration::from_secs(0),
            status: RunStatus::LaunchFailed { reason },
            log_file: None,
        }
    }

    /// Applies the log retention rule and emits the progress line.
    fn finalize(&self, task: &TaskDescriptor, mut result: RawCaptureResult) -> RawCaptureResult {
        let failed = !result.status.is_completed()
            || !output::collect_errors(&result.output).is_empty();
        if !result.output.is_empty() && (task.keep_log || failed) {
            match persist_log(&task.working_dir, &result.output) {
                Ok(path) => result.log_file = Some(path),
                Err(e) => warn!("task {}: failed persisting log: {}", task.id, e),
            }
        }
        self.report(task, &result, failed);
        result
    }

    fn report(&self, task: &TaskDescriptor, result: &RawCaptureResult, failed: bool) {
        if !self.verbose && !failed {
            return;
        }
        let status = if failed { "Error:" } else { "Completed:" };
        let log_note = result
            .log_file
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| format!("( {} )", n.to_string_lossy()))
            .unwrap_or_default();
        let _guard = PRINT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        println!(
            "{} n= {} : {} sec. : {} {}",
            status,
            task.id,
            result.elapsed.as_secs(),
            task.name,
            log_note
        );
    }
}

/// Materializes the task's command lines into a temporary script file in
/// its working directory.
fn write_script(task: &TaskDescriptor) -> Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("macro_")
        .suffix(".anymcr")
        .tempfile_in(&task.working_dir)?;
    let (mut file, path) = file.keep().map_err(|e| Error::IoError(e.to_string()))?;
    file.write_all(task.commands.join("\n").as_bytes())?;
    Ok(path)
}

/// Persists captured output to a stable log file in the task's working
/// directory.
fn persist_log(dir: &Path, contents: &str) -> Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("output_")
        .suffix(".log")
        .tempfile_in(dir)?;
    let (mut file, path) = file.keep().map_err(|e| Error::IoError(e.to_string()))?;
    file.write_all(contents.as_bytes())?;
    Ok(path)
}

/// Reads the combined capture buffer back from the start.
fn read_capture(logfile: &mut fs::File) -> String {
    let mut bytes = Vec::new();
    if let Err(e) = logfile.seek(SeekFrom::Start(0)) {
        warn!("failed rewinding log buffer: {}", e);
        return String::new();
    }
    if let Err(e) = logfile.read_to_end(&mut bytes) {
        warn!("failed reading log buffer: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn force_kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("failed killing console process {}: {}", child.id(), e);
    }
    if let Err(e) = child.wait() {
        debug!("failed reaping console process {}: {}", child.id(), e);
    }
}
