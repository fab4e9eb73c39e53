//! Console output parsing.
//!
//! The console application reports values as `name = literal;` lines and
//! diagnostics as `ERROR`/`Error`-prefixed lines, all interleaved with
//! free-form progress text. Parsing is line oriented and tolerant:
//! malformed literals are skipped, never fatal.

pub mod literal;

use fnv::FnvHashMap;

use crate::value::Value;

/// Prefixes marking diagnostic lines.
const ERROR_PREFIXES: [&str; 2] = ["ERROR", "Error"];
/// Benign path warning the console emits on every run; filtered from
/// error lists.
const BENIGN_PATH_WARNING: &str = "Path does not exist.";

/// Parsed output of a single task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOutput {
    /// Recognized variable assignments.
    pub values: FnvHashMap<String, Value>,
    /// Diagnostic lines, benign path warning excluded.
    pub errors: Vec<String>,
}

impl ParsedOutput {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Parses raw captured console output line by line.
///
/// A line ending in `;` and containing exactly one `=` declares a value:
/// the right-hand side is trimmed of whitespace and semicolons and
/// evaluated through the strict literal grammar. Diagnostic lines are
/// collected separately.
pub fn parse(raw: &str) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    for line in raw.lines() {
        let line = line.trim_end();
        if line.ends_with(';') && line.matches('=').count() == 1 {
            if let Some(eq) = line.find('=') {
                let name = line[..eq].trim();
                let lit = line[eq + 1..].trim_matches(|c: char| c == ';' || c.is_whitespace());
                if !name.is_empty() {
                    match literal::parse(lit) {
                        Ok(value) => {
                            out.values.insert(name.to_string(), value);
                        }
                        Err(e) => debug!("skipping malformed literal for \"{}\": {}", name, e),
                    }
                }
            }
        }
        if is_error_line(line) {
            out.errors.push(line.to_string());
        }
    }
    out
}

/// Collects retained diagnostic lines without evaluating assignments.
pub fn collect_errors(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| line.trim_end())
        .filter(|line| is_error_line(line))
        .map(String::from)
        .collect()
}

fn is_error_line(line: &str) -> bool {
    ERROR_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
        && !line.ends_with(BENIGN_PATH_WARNING)
}
