//! Value types and their transformations.
//!
//! Everything the console application accepts or emits is represented by
//! the [`Value`] variant: a bare number, a vector, a matrix, or a piece of
//! text. Each variant has exactly one rendering rule and one interpolation
//! rule.

use std::fmt;

use crate::error::{Error, Result};
use crate::Float;

const SCALAR_TYPE_NAME: &str = "scalar";
const VECTOR_TYPE_NAME: &str = "vector";
const MATRIX_TYPE_NAME: &str = "matrix";
const TEXT_TYPE_NAME: &str = "text";

/// Defines all possible types of values.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Scalar,
    Vector,
    Matrix,
    Text,
}

impl ValueType {
    pub fn to_str(&self) -> &str {
        match self {
            ValueType::Scalar => SCALAR_TYPE_NAME,
            ValueType::Vector => VECTOR_TYPE_NAME,
            ValueType::Matrix => MATRIX_TYPE_NAME,
            ValueType::Text => TEXT_TYPE_NAME,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> std::result::Result<(), fmt::Error> {
        write!(formatter, "{}", self.to_str())
    }
}

/// Shape of a numeric payload. Matrix rows keep their individual lengths.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Scalar,
    Vector(usize),
    Matrix(Vec<usize>),
}

impl Shape {
    /// Total number of elements.
    pub fn len(&self) -> usize {
        match self {
            Shape::Scalar => 1,
            Shape::Vector(n) => *n,
            Shape::Matrix(rows) => rows.iter().sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Abstraction over all value shapes exchanged with the console
/// application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Scalar(Float),
    Vector(Vec<Float>),
    Matrix(Vec<Vec<Float>>),
    Text(String),
}

impl Value {
    pub fn get_type(&self) -> ValueType {
        match self {
            Value::Scalar(_) => ValueType::Scalar,
            Value::Vector(_) => ValueType::Vector,
            Value::Matrix(_) => ValueType::Matrix,
            Value::Text(_) => ValueType::Text,
        }
    }

    pub fn is_scalar(&self) -> bool {
        match self {
            Value::Scalar(_) => true,
            _ => false,
        }
    }

    pub fn is_vector(&self) -> bool {
        match self {
            Value::Vector(_) => true,
            _ => false,
        }
    }

    pub fn is_matrix(&self) -> bool {
        match self {
            Value::Matrix(_) => true,
            _ => false,
        }
    }

    pub fn is_text(&self) -> bool {
        match self {
            Value::Text(_) => true,
            _ => false,
        }
    }

    pub fn as_scalar(&self) -> Result<Float> {
        match self {
            Value::Scalar(v) => Ok(*v),
            _ => Err(Error::NotNumeric(format!(
                "expected scalar, got {}",
                self.get_type().to_str()
            ))),
        }
    }

    pub fn as_vector(&self) -> Result<&Vec<Float>> {
        match self {
            Value::Vector(v) => Ok(v),
            _ => Err(Error::NotNumeric(format!(
                "expected vector, got {}",
                self.get_type().to_str()
            ))),
        }
    }

    pub fn as_matrix(&self) -> Result<&Vec<Vec<Float>>> {
        match self {
            Value::Matrix(v) => Ok(v),
            _ => Err(Error::NotNumeric(format!(
                "expected matrix, got {}",
                self.get_type().to_str()
            ))),
        }
    }

    pub fn as_text(&self) -> Result<&str> {
        match self {
            Value::Text(v) => Ok(v),
            _ => Err(Error::Other(format!(
                "expected text, got {}",
                self.get_type().to_str()
            ))),
        }
    }

    /// Renders the value into the brace-delimited literal form consumed by
    /// the console application. Scalars render as bare numbers, nesting
    /// depth mirrors the value shape, text passes through verbatim.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Scalar(v) => format!("{}", v),
            Value::Vector(v) => format!("{{{}}}", join_numbers(v)),
            Value::Matrix(m) => {
                let rows = m
                    .iter()
                    .map(|row| format!("{{{}}}", join_numbers(row)))
                    .collect::<Vec<String>>();
                format!("{{{}}}", rows.join(","))
            }
            Value::Text(s) => s.clone(),
        }
    }

    /// Shape of the numeric payload. Text values have no shape.
    pub fn shape(&self) -> Result<Shape> {
        match self {
            Value::Scalar(_) => Ok(Shape::Scalar),
            Value::Vector(v) => Ok(Shape::Vector(v.len())),
            Value::Matrix(m) => Ok(Shape::Matrix(m.iter().map(|row| row.len()).collect())),
            Value::Text(_) => Err(Error::NotNumeric(TEXT_TYPE_NAME.to_string())),
        }
    }

    /// Flattens the numeric payload into a row-major element list.
    pub(crate) fn flatten(&self) -> Result<(Shape, Vec<Float>)> {
        let shape = self.shape()?;
        let elems = match self {
            Value::Scalar(v) => vec![*v],
            Value::Vector(v) => v.clone(),
            Value::Matrix(m) => m.iter().flatten().copied().collect(),
            Value::Text(_) => unreachable!(),
        };
        Ok((shape, elems))
    }

    /// Rebuilds a value of the given shape from a row-major element list.
    pub(crate) fn from_flat(shape: &Shape, elems: &[Float]) -> Value {
        match shape {
            Shape::Scalar => Value::Scalar(elems[0]),
            Shape::Vector(_) => Value::Vector(elems.to_vec()),
            Shape::Matrix(rows) => {
                let mut out = Vec::with_capacity(rows.len());
                let mut offset = 0;
                for len in rows {
                    out.push(elems[offset..offset + len].to_vec());
                    offset += len;
                }
                Value::Matrix(out)
            }
        }
    }

    /// Elementwise linear interpolation towards `stop` at parameter `t`.
    /// Both values must share the same shape.
    pub fn lerp(&self, stop: &Value, t: Float) -> Result<Value> {
        let (shape, start) = self.flatten()?;
        let (stop_shape, stop) = stop.flatten()?;
        if shape != stop_shape {
            return Err(Error::ShapeMismatch(format!(
                "{:?} vs {:?}",
                shape, stop_shape
            )));
        }
        let elems = start
            .iter()
            .zip(&stop)
            .map(|(a, b)| a + t * (b - a))
            .collect::<Vec<Float>>();
        Ok(Value::from_flat(&shape, &elems))
    }

    /// Elementwise multiplication by a factor.
    pub fn scaled(&self, factor: Float) -> Result<Value> {
        let (shape, elems) = self.flatten()?;
        let elems = elems.iter().map(|v| v * factor).collect::<Vec<Float>>();
        Ok(Value::from_flat(&shape, &elems))
    }
}

fn join_numbers(numbers: &[Float]) -> String {
    numbers
        .iter()
        .map(|v| format!("{}", v))
        .collect::<Vec<String>>()
        .join(",")
}

impl fmt::Display for Value {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> std::result::Result<(), fmt::Error> {
        write!(formatter, "{}", self.to_literal())
    }
}

impl From<Float> for Value {
    fn from(v: Float) -> Self {
        Value::Scalar(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Scalar(v as Float)
    }
}

impl From<Vec<Float>> for Value {
    fn from(v: Vec<Float>) -> Self {
        Value::Vector(v)
    }
}

impl From<Vec<Vec<Float>>> for Value {
    fn from(v: Vec<Vec<Float>>) -> Self {
        Value::Matrix(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_rendering() {
        assert_eq!(Value::from(23.1).to_literal(), "23.1");
        assert_eq!(Value::from(-0.123010929395).to_literal(), "-0.123010929395");
        assert_eq!(Value::from(1.0).to_literal(), "1");
        assert_eq!(Value::from("hallo world").to_literal(), "hallo world");
        assert_eq!(
            Value::from(vec![1.0, 2.0, 3.0, 4.0]).to_literal(),
            "{1,2,3,4}"
        );
        assert_eq!(
            Value::from(vec![vec![1.0, 0.0], vec![0.0, 1.5]]).to_literal(),
            "{{1,0},{0,1.5}}"
        );
    }

    #[test]
    fn lerp_scalar() {
        let start = Value::from(0.0);
        let stop = Value::from(3.0);
        assert_eq!(start.lerp(&stop, 0.5).unwrap(), Value::Scalar(1.5));
        assert_eq!(start.lerp(&stop, 1.0).unwrap(), Value::Scalar(3.0));
    }

    #[test]
    fn lerp_matrix_elementwise() {
        let start = Value::from(vec![vec![1.0, 0.0], vec![0.0, 1.5]]);
        let stop = Value::from(vec![vec![10.0, -0.5], vec![10.5, 100.5]]);
        assert_eq!(start.lerp(&stop, 0.0).unwrap(), start);
        assert_eq!(start.lerp(&stop, 1.0).unwrap(), stop);
    }

    #[test]
    fn lerp_shape_mismatch() {
        let start = Value::from(vec![1.0, 2.0]);
        let stop = Value::from(vec![1.0, 2.0, 3.0]);
        assert!(start.lerp(&stop, 0.5).is_err());
    }

    #[test]
    fn text_is_not_numeric() {
        assert!(Value::from("abc").shape().is_err());
        assert!(Value::from("abc").scaled(2.0).is_err());
    }

    #[test]
    fn scaled_vector() {
        let v = Value::from(vec![1.0, -2.0]).scaled(2.0).unwrap();
        assert_eq!(v, Value::from(vec![2.0, -4.0]));
    }

    #[test]
    fn flat_roundtrip() {
        let m = Value::from(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let (shape, elems) = m.flatten().unwrap();
        assert_eq!(elems, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(Value::from_flat(&shape, &elems), m);
    }
}
