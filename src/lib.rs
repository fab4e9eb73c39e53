//! This library drives repeated, parameterized invocations of an external
//! batch-capable console application.
//!
//! Programming interface is centered around the [`BatchRunner`] structure,
//! which ties the three core pieces together: the macro generator turning
//! variable sweeps into ordered command scripts, the bounded-concurrency
//! process scheduler launching and supervising console processes, and the
//! output parser converting captured text into typed value mappings.
//!
//! The console application itself is treated as a black box. It is invoked
//! with a script file path and a non-interactive flag, reads its commands
//! from the script, and writes human-readable lines to its standard output
//! and error streams. Locating the executable on the host system is the
//! caller's job; see [`ConsoleApp`].
//!
//! ## Example
//!
//! Here's a very simple example of how the library can be used inside your
//! program:
//!
//! ```ignore
//! use anybatch::{BatchRunner, ConsoleApp, Value};
//!
//! pub fn main() {
//!     let runner = BatchRunner::new(ConsoleApp::new("/opt/console/bin/console"));
//!     let results = runner
//!         .run_param_job(
//!             &["load \"model.main.any\"".to_string()],
//!             &["operation Main.Study.InverseDynamics".to_string(), "run".to_string()],
//!             &[("Main.Study.Param".to_string(), vec![Value::from(1.4), Value::from(1.6)])],
//!             &["Main.Study.Output.MaxActivity".to_string()],
//!             std::env::current_dir().unwrap().as_path(),
//!         )
//!         .unwrap();
//! }
//! ```
//!
//! You might also want to select a set of crate features to enable. The
//! default `sampling` feature pulls in the seeded random and stratified
//! sample strategies for macro variables.

#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

// reexports
pub use batch::{BatchRunner, RunRecord, RunSettings};
pub use error::{Error, Result};
pub use macros::MacroGenerator;
pub use output::ParsedOutput;
pub use results::{AggregatedResults, PerturbationResults};
pub use sched::{ConsoleApp, ProcessScheduler, RawCaptureResult, RunStatus, ScheduleOptions};
pub use task::TaskDescriptor;
pub use value::{Value, ValueType};

pub mod batch;
pub mod error;
pub mod macros;
pub mod output;
pub mod results;
pub mod sched;
pub mod task;
pub mod value;

mod util;

/// Floating point number type used for all numeric payloads.
pub type Float = f64;

// features
pub const FEATURE_NAME_SAMPLING: &str = "sampling";
#[cfg(not(feature = "sampling"))]
pub const FEATURE_SAMPLING: bool = false;
#[cfg(feature = "sampling")]
pub const FEATURE_SAMPLING: bool = true;
