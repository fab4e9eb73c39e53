//! Macro script generation.
//!
//! A "macro" is the ordered sequence of textual commands submitted to the
//! console application for one run. [`MacroGenerator`] builds N such
//! sequences at a time from fixed command lines and per-variable value
//! specifications: broadcast single values, per-macro value lists, and
//! evenly spaced ranges. The seeded random and stratified strategies live
//! in [`sampling`] behind the `sampling` feature and differ only in how
//! the N samples per variable are drawn.
//!
//! All size and shape checking happens at registration time, so a job
//! never reaches the scheduler with mismatched variable lengths.

#[cfg(feature = "sampling")]
pub mod sampling;

use crate::error::{Error, Result};
use crate::value::Value;

/// Per-variable value source resolved at registration time.
#[derive(Debug, Clone)]
enum ValueSeq {
    /// Same value in every generated macro.
    Broadcast(Value),
    /// One value per generated macro.
    PerMacro(Vec<Value>),
}

impl ValueSeq {
    fn at(&self, index: usize) -> &Value {
        match self {
            ValueSeq::Broadcast(value) => value,
            ValueSeq::PerMacro(values) => &values[index],
        }
    }
}

#[derive(Debug, Clone)]
enum MacroOp {
    /// Fixed command line, repeated verbatim in every macro.
    Command(String),
    /// `Set Value` class operation on a single variable.
    SetValue { name: String, values: ValueSeq },
}

/// Generates ordered command sequences for batch runs.
///
/// Operations are rendered in registration order, one `Set Value` line
/// per variable per macro.
///
/// ```ignore
/// let mut gen = MacroGenerator::new(3);
/// gen.add_macro(vec!["load \"main.any\""]);
/// gen.add_set_value_per_macro("Main.Param", vec![2.0.into(), 2.5.into(), 3.0.into()])?;
/// gen.add_macro(vec!["operation Main.RunApplication", "run", "exit"]);
/// let macros = gen.generate_macros();
/// assert_eq!(macros.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct MacroGenerator {
    n_macros: usize,
    ops: Vec<MacroOp>,
}

impl MacroGenerator {
    /// Creates a generator producing `n_macros` scripts. A count of zero
    /// is treated as one.
    pub fn new(n_macros: usize) -> Self {
        Self {
            n_macros: n_macros.max(1),
            ops: Vec::new(),
        }
    }

    pub fn number_of_macros(&self) -> usize {
        self.n_macros
    }

    /// Appends fixed command lines to every generated macro.
    pub fn add_macro<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.ops.push(MacroOp::Command(line.into()));
        }
    }

    /// Registers a variable assignment broadcast to all macros.
    pub fn add_set_value(&mut self, name: &str, value: impl Into<Value>) {
        self.ops.push(MacroOp::SetValue {
            name: name.to_string(),
            values: ValueSeq::Broadcast(value.into()),
        });
    }

    /// Registers a group of co-varying variables, each broadcast to all
    /// macros, in the given order.
    pub fn add_set_value_group(&mut self, pairs: Vec<(&str, Value)>) {
        for (name, value) in pairs {
            self.add_set_value(name, value);
        }
    }

    /// Registers a variable assignment with one value per macro. The
    /// value count must match the macro count.
    pub fn add_set_value_per_macro(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.n_macros {
            return Err(Error::SizeMismatch {
                name: name.to_string(),
                expected: self.n_macros,
                found: values.len(),
            });
        }
        self.push_samples(name, values);
        Ok(())
    }

    /// Registers N evenly spaced samples over `[start, stop]` inclusive,
    /// elementwise for vector and matrix bounds.
    pub fn add_set_value_range(
        &mut self,
        name: &str,
        start: impl Into<Value>,
        stop: impl Into<Value>,
    ) -> Result<()> {
        let samples = linspace(&start.into(), &stop.into(), self.n_macros)?;
        self.push_samples(name, samples);
        Ok(())
    }

    pub(crate) fn push_samples(&mut self, name: &str, values: Vec<Value>) {
        self.ops.push(MacroOp::SetValue {
            name: name.to_string(),
            values: ValueSeq::PerMacro(values),
        });
    }

    /// Returns the N generated macros, each an ordered list of command
    /// lines.
    pub fn generate_macros(&self) -> Vec<Vec<String>> {
        (0..self.n_macros)
            .map(|index| self.render_macro(index))
            .collect()
    }

    fn render_macro(&self, index: usize) -> Vec<String> {
        self.ops
            .iter()
            .map(|op| match op {
                MacroOp::Command(line) => line.clone(),
                MacroOp::SetValue { name, values } => set_value_line(name, values.at(index)),
            })
            .collect()
    }
}

/// Renders a `Set Value` class operation line.
pub fn set_value_line(name: &str, value: &Value) -> String {
    format!(
        "classoperation {} \"Set Value\" --value=\"{}\"",
        name,
        value.to_literal()
    )
}

/// Renders a `Dump All` class operation line for an output variable.
pub fn dump_line(name: &str) -> String {
    format!("classoperation {} \"Dump All\"", name)
}

/// Renders a `load` command for a model file.
pub fn load_line(path: &str) -> String {
    format!("load \"{}\"", path)
}

/// Renders the define arguments of a `load` command from an ordered
/// name/value mapping. Text values are wrapped in escaped quotes, numeric
/// values render as their literal form.
pub fn define_load_string(defines: &[(&str, Value)]) -> String {
    defines
        .iter()
        .map(|(name, value)| match value {
            Value::Text(text) => format!("-def {}=---\"\\\"{}\\\"\"", name, text),
            other => format!("-def {}=\"{}\"", name, other.to_literal()),
        })
        .collect::<Vec<String>>()
        .join(",")
}

/// Renders the path arguments of a `load` command from an ordered
/// name/directory mapping.
pub fn path_load_string(paths: &[(&str, &str)]) -> String {
    paths
        .iter()
        .map(|(name, path)| format!("-p {}=---\"{}\"", name, path.replace('\\', "\\\\")))
        .collect::<Vec<String>>()
        .join(",")
}

/// N evenly spaced samples over `[start, stop]` inclusive. A single
/// sample yields `start`.
pub(crate) fn linspace(start: &Value, stop: &Value, n: usize) -> Result<Vec<Value>> {
    (0..n)
        .map(|k| {
            let t = if n <= 1 {
                0.0
            } else {
                k as f64 / (n - 1) as f64
            };
            start.lerp(stop, t)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_macro() {
        let mut gen = MacroGenerator::new(1);
        gen.add_macro(vec!["load \"main.any\"", "operation Main.RunApplication"]);
        let macros = gen.generate_macros();
        assert_eq!(
            macros[0],
            vec![
                "load \"main.any\"".to_string(),
                "operation Main.RunApplication".to_string()
            ]
        );
    }

    #[test]
    fn set_value() {
        let mut gen = MacroGenerator::new(1);
        gen.add_set_value("val0", 23.1);
        gen.add_set_value("val1", -0.123010929395);
        gen.add_set_value("val2", "hallo world");
        gen.add_set_value_group(vec![("val3", Value::from(3.0)), ("val4", Value::from(4))]);
        gen.add_set_value("val5", vec![1.0, 2.0, 3.0, 4.0]);
        gen.add_set_value("val6", vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let macros = gen.generate_macros();
        assert_eq!(macros[0][0], "classoperation val0 \"Set Value\" --value=\"23.1\"");
        assert_eq!(
            macros[0][1],
            "classoperation val1 \"Set Value\" --value=\"-0.123010929395\""
        );
        assert_eq!(
            macros[0][2],
            "classoperation val2 \"Set Value\" --value=\"hallo world\""
        );
        assert_eq!(macros[0][3], "classoperation val3 \"Set Value\" --value=\"3\"");
        assert_eq!(macros[0][4], "classoperation val4 \"Set Value\" --value=\"4\"");
        assert_eq!(
            macros[0][5],
            "classoperation val5 \"Set Value\" --value=\"{1,2,3,4}\""
        );
        assert_eq!(
            macros[0][6],
            "classoperation val6 \"Set Value\" --value=\"{{1,0},{0,1}}\""
        );
    }

    #[test]
    fn set_value_multiple() {
        let mut gen = MacroGenerator::new(3);
        gen.add_set_value_per_macro(
            "val0",
            vec![Value::from(2.0), Value::from(2.5), Value::from(3.0)],
        )
        .unwrap();
        let macros = gen.generate_macros();
        assert_eq!(macros.len(), 3);
        assert_eq!(
            macros[0],
            vec!["classoperation val0 \"Set Value\" --value=\"2\"".to_string()]
        );
        assert_eq!(
            macros[1],
            vec!["classoperation val0 \"Set Value\" --value=\"2.5\"".to_string()]
        );
        assert_eq!(
            macros[2],
            vec!["classoperation val0 \"Set Value\" --value=\"3\"".to_string()]
        );
    }

    #[test]
    fn set_value_size_mismatch() {
        let mut gen = MacroGenerator::new(3);
        let result = gen.add_set_value_per_macro("val0", vec![Value::from(2.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn set_value_range() {
        let mut gen = MacroGenerator::new(4);
        gen.add_set_value_range("testvar", 0.0, 3.0).unwrap();
        let macros = gen.generate_macros();
        assert_eq!(
            macros[0],
            vec!["classoperation testvar \"Set Value\" --value=\"0\"".to_string()]
        );
        assert_eq!(
            macros[1],
            vec!["classoperation testvar \"Set Value\" --value=\"1\"".to_string()]
        );
        assert_eq!(
            macros[2],
            vec!["classoperation testvar \"Set Value\" --value=\"2\"".to_string()]
        );
        assert_eq!(
            macros[3],
            vec!["classoperation testvar \"Set Value\" --value=\"3\"".to_string()]
        );
    }

    #[test]
    fn set_value_range_matrix() {
        let mut gen = MacroGenerator::new(4);
        gen.add_set_value_range(
            "testvar",
            vec![vec![1.0, 0.0], vec![0.0, 1.5]],
            vec![vec![10.0, -0.5], vec![10.5, 100.5]],
        )
        .unwrap();
        let macros = gen.generate_macros();
        assert_eq!(
            macros[0],
            vec!["classoperation testvar \"Set Value\" --value=\"{{1,0},{0,1.5}}\"".to_string()]
        );
        assert_eq!(
            macros[3],
            vec![
                "classoperation testvar \"Set Value\" --value=\"{{10,-0.5},{10.5,100.5}}\""
                    .to_string()
            ]
        );
    }

    #[test]
    fn set_value_range_shape_mismatch() {
        let mut gen = MacroGenerator::new(4);
        let result = gen.add_set_value_range("testvar", vec![1.0, 2.0], 3.0);
        assert!(result.is_err());
    }

    #[test]
    fn single_macro_range_yields_start() {
        let mut gen = MacroGenerator::new(1);
        gen.add_set_value_range("testvar", 5.0, 9.0).unwrap();
        let macros = gen.generate_macros();
        assert_eq!(
            macros[0],
            vec!["classoperation testvar \"Set Value\" --value=\"5\"".to_string()]
        );
    }

    #[test]
    fn load_string_helpers() {
        assert_eq!(load_line("main.any"), "load \"main.any\"");
        assert_eq!(dump_line("Main.Out"), "classoperation Main.Out \"Dump All\"");
        assert_eq!(
            define_load_string(&[
                ("CONFIG", Value::from("hi")),
                ("N_STEP", Value::from(20.0))
            ]),
            "-def CONFIG=---\"\\\"hi\\\"\",-def N_STEP=\"20\""
        );
        assert_eq!(
            path_load_string(&[("DATA", "c:\\models\\data")]),
            "-p DATA=---\"c:\\\\models\\\\data\""
        );
    }
}
