//! Result aggregation.
//!
//! Per-task parser output is merged, keyed by task id, into job-scoped
//! tables the caller can consume directly. Placement always follows the
//! task id, never completion order.

use std::collections::BTreeMap;

use linked_hash_map::LinkedHashMap;

use crate::error::{Error, Result};
use crate::output::ParsedOutput;
use crate::value::Value;

/// Job-scoped result table: one index-aligned column of length N per
/// requested output variable, in request order.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResults {
    n_tasks: usize,
    columns: LinkedHashMap<String, Vec<Option<Value>>>,
}

impl AggregatedResults {
    pub fn n_tasks(&self) -> usize {
        self.n_tasks
    }

    /// Column for one output variable; entry `k` belongs to task `k`.
    pub fn get(&self, name: &str) -> Option<&Vec<Option<Value>>> {
        self.columns.get(name)
    }

    pub fn columns(&self) -> &LinkedHashMap<String, Vec<Option<Value>>> {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Merges per-task parser output into caller-facing columns. Entry `k`
/// of a column holds the parsed value from task `k` when the task
/// produced one and reported no errors, and is absent otherwise.
pub fn aggregate(
    output_vars: &[String],
    n_tasks: usize,
    parsed: &BTreeMap<usize, ParsedOutput>,
) -> AggregatedResults {
    let mut columns = LinkedHashMap::new();
    for name in output_vars {
        let column = (0..n_tasks)
            .map(|task_id| {
                parsed
                    .get(&task_id)
                    .filter(|output| !output.has_errors())
                    .and_then(|output| output.get(name))
                    .cloned()
            })
            .collect::<Vec<Option<Value>>>();
        columns.insert(name.clone(), column);
    }
    AggregatedResults { n_tasks, columns }
}

/// Objective/perturbation split of a perturbation job.
///
/// Entry 0 of every column is the baseline evaluation; entries 1..M hold
/// the response to perturbing one input at a time, in input registration
/// order.
#[derive(Debug, Clone, Serialize)]
pub struct PerturbationResults {
    /// Baseline evaluation per output variable.
    pub objective: LinkedHashMap<String, Option<Value>>,
    /// Per output variable, one entry per perturbed input.
    pub perturbations: LinkedHashMap<String, Vec<Option<Value>>>,
}

/// Splits an aggregated perturbation run (baseline task plus M
/// perturbation tasks) into objective and perturbation parts.
pub fn split_perturbations(results: AggregatedResults) -> Result<PerturbationResults> {
    if results.n_tasks() == 0 {
        return Err(Error::InvalidParam(
            "perturbation split needs at least the baseline task".to_string(),
        ));
    }
    let mut objective = LinkedHashMap::new();
    let mut perturbations = LinkedHashMap::new();
    for (name, mut column) in results.columns {
        let rest = column.split_off(1);
        let baseline = column.into_iter().next().unwrap_or(None);
        objective.insert(name.clone(), baseline);
        perturbations.insert(name, rest);
    }
    Ok(PerturbationResults {
        objective,
        perturbations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnv::FnvHashMap;

    fn parsed_with(pairs: &[(&str, Value)]) -> ParsedOutput {
        let mut values = FnvHashMap::default();
        for (name, value) in pairs {
            values.insert(name.to_string(), value.clone());
        }
        ParsedOutput {
            values,
            errors: Vec::new(),
        }
    }

    #[test]
    fn columns_are_index_aligned() {
        let mut parsed = BTreeMap::new();
        // task 1 finished first, task 0 second; order must not matter
        parsed.insert(1, parsed_with(&[("Main.Out", Value::from(2.0))]));
        parsed.insert(0, parsed_with(&[("Main.Out", Value::from(1.0))]));

        let outputs = vec!["Main.Out".to_string()];
        let results = aggregate(&outputs, 3, &parsed);
        assert_eq!(
            results.get("Main.Out").unwrap(),
            &vec![Some(Value::from(1.0)), Some(Value::from(2.0)), None]
        );
    }

    #[test]
    fn errored_tasks_yield_absent_entries() {
        let mut failing = parsed_with(&[("Main.Out", Value::from(9.0))]);
        failing.errors.push("ERROR: singular matrix".to_string());
        let mut parsed = BTreeMap::new();
        parsed.insert(0, failing);
        parsed.insert(1, parsed_with(&[("Main.Out", Value::from(2.0))]));

        let outputs = vec!["Main.Out".to_string()];
        let results = aggregate(&outputs, 2, &parsed);
        assert_eq!(
            results.get("Main.Out").unwrap(),
            &vec![None, Some(Value::from(2.0))]
        );
    }

    #[test]
    fn missing_variables_yield_absent_entries() {
        let mut parsed = BTreeMap::new();
        parsed.insert(0, parsed_with(&[("Main.A", Value::from(1.0))]));

        let outputs = vec!["Main.A".to_string(), "Main.B".to_string()];
        let results = aggregate(&outputs, 1, &parsed);
        assert_eq!(results.get("Main.A").unwrap(), &vec![Some(Value::from(1.0))]);
        assert_eq!(results.get("Main.B").unwrap(), &vec![None]);
    }

    #[test]
    fn request_order_is_preserved() {
        let parsed = BTreeMap::new();
        let outputs = vec!["Z".to_string(), "A".to_string(), "M".to_string()];
        let results = aggregate(&outputs, 1, &parsed);
        let names = results
            .columns()
            .keys()
            .cloned()
            .collect::<Vec<String>>();
        assert_eq!(names, outputs);
    }

    #[test]
    fn perturbation_split_shapes() {
        let mut parsed = BTreeMap::new();
        for task_id in 0..3 {
            parsed.insert(
                task_id,
                parsed_with(&[("Main.Out", Value::from(task_id as f64))]),
            );
        }
        let outputs = vec!["Main.Out".to_string()];
        let results = aggregate(&outputs, 3, &parsed);
        let split = split_perturbations(results).unwrap();
        assert_eq!(split.objective.get("Main.Out").unwrap(), &Some(Value::from(0.0)));
        assert_eq!(
            split.perturbations.get("Main.Out").unwrap(),
            &vec![Some(Value::from(1.0)), Some(Value::from(2.0))]
        );
    }

    #[test]
    fn perturbation_split_needs_a_baseline() {
        let results = aggregate(&[], 0, &BTreeMap::new());
        assert!(split_perturbations(results).is_err());
    }
}
