//! Strict literal grammar for console output values.
//!
//! Accepts numbers, nested brace- or bracket-delimited arrays of numbers,
//! and quoted or bare strings. Output text is never evaluated as code;
//! anything outside the grammar is an error the caller can skip.

use crate::error::{Error, Result};
use crate::value::Value;
use crate::Float;

/// Evaluates a trimmed literal into a [`Value`].
///
/// Structured input (an array or a quoted string) must parse completely.
/// Unstructured input falls back to a number when the whole of it is
/// numeric, otherwise to bare text.
pub fn parse(input: &str) -> Result<Value> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::LiteralParse("empty literal".to_string()));
    }
    let mut cursor = Cursor::new(trimmed);
    match cursor.peek() {
        Some('{') | Some('[') => {
            let value = cursor.parse_array(0)?;
            cursor.skip_ws();
            if !cursor.at_end() {
                return Err(Error::LiteralParse(format!(
                    "trailing input after array: \"{}\"",
                    trimmed
                )));
            }
            Ok(value)
        }
        Some('"') => {
            let text = cursor.parse_quoted()?;
            cursor.skip_ws();
            if !cursor.at_end() {
                return Err(Error::LiteralParse(format!(
                    "trailing input after string: \"{}\"",
                    trimmed
                )));
            }
            Ok(Value::Text(text))
        }
        _ => match trimmed.parse::<Float>() {
            Ok(number) => Ok(Value::Scalar(number)),
            Err(_) => Ok(Value::Text(trimmed.to_string())),
        },
    }
}

/// Maximum array nesting depth: a matrix of numbers.
const MAX_DEPTH: usize = 2;

struct Cursor<'a> {
    chars: Vec<char>,
    input: &'a str,
    pos: usize,
}

/// Element of an array being parsed, before shape classification.
enum Element {
    Number(Float),
    Row(Vec<Float>),
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().collect(),
            input,
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let character = self.peek();
        if character.is_some() {
            self.pos += 1;
        }
        character
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while let Some(character) = self.peek() {
            if character.is_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn fail(&self, message: &str) -> Error {
        Error::LiteralParse(format!("{} at position {} in \"{}\"", message, self.pos, self.input))
    }

    /// Parses a `{...}` or `[...]` array into a vector or matrix.
    fn parse_array(&mut self, depth: usize) -> Result<Value> {
        if depth >= MAX_DEPTH {
            return Err(self.fail("array nesting deeper than a matrix"));
        }
        let close = match self.next() {
            Some('{') => '}',
            Some('[') => ']',
            _ => return Err(self.fail("expected array opener")),
        };
        let mut elements = Vec::new();
        self.skip_ws();
        if self.peek() == Some(close) {
            self.pos += 1;
            return Ok(Value::Vector(Vec::new()));
        }
        loop {
            self.skip_ws();
            let element = match self.peek() {
                Some('{') | Some('[') => match self.parse_array(depth + 1)? {
                    Value::Vector(row) => Element::Row(row),
                    // depth limit keeps nested arrays one-dimensional
                    _ => return Err(self.fail("unexpected nested shape")),
                },
                _ => Element::Number(self.parse_number()?),
            };
            elements.push(element);
            self.skip_ws();
            match self.next() {
                Some(',') => continue,
                Some(c) if c == close => break,
                _ => return Err(self.fail("expected ',' or array closer")),
            }
        }
        classify(elements).map_err(|message| self.fail(&message))
    }

    /// Scans one numeric token.
    fn parse_number(&mut self) -> Result<Float> {
        let start = self.pos;
        while let Some(character) = self.peek() {
            match character {
                '0'..='9' | '+' | '-' | '.' | 'e' | 'E' => self.pos += 1,
                _ => break,
            }
        }
        if start == self.pos {
            return Err(self.fail("expected a number"));
        }
        let token = self.chars[start..self.pos].iter().collect::<String>();
        token
            .parse::<Float>()
            .map_err(|_| self.fail(&format!("invalid number \"{}\"", token)))
    }

    /// Parses a double-quoted string; no escape handling.
    fn parse_quoted(&mut self) -> Result<String> {
        if self.next() != Some('"') {
            return Err(self.fail("expected opening quote"));
        }
        let start = self.pos;
        while let Some(character) = self.peek() {
            if character == '"' {
                let text = self.chars[start..self.pos].iter().collect::<String>();
                self.pos += 1;
                return Ok(text);
            }
            self.pos += 1;
        }
        Err(self.fail("missing end quotes"))
    }
}

/// Classifies array elements into a vector or a matrix.
fn classify(elements: Vec<Element>) -> core::result::Result<Value, String> {
    let rows = elements.iter().any(|e| matches!(e, Element::Row(_)));
    if !rows {
        let numbers = elements
            .into_iter()
            .map(|e| match e {
                Element::Number(v) => v,
                Element::Row(_) => unreachable!(),
            })
            .collect();
        return Ok(Value::Vector(numbers));
    }
    let mut matrix = Vec::with_capacity(elements.len());
    for element in elements {
        match element {
            Element::Row(row) => matrix.push(row),
            Element::Number(_) => {
                return Err("array mixes numbers and rows".to_string());
            }
        }
    }
    Ok(Value::Matrix(matrix))
}
