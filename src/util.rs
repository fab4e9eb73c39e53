//! Contains a collection of useful utility functions.

use std::fs::read;
use std::path::Path;

use crate::error::Result;

/// Create a static deser object from given path using serde.
pub fn deser_struct_from_path<T>(file_path: &Path) -> Result<T>
where
    for<'de> T: serde::Deserialize<'de>,
{
    let bytes = read(file_path)?;
    let d: T = toml::from_slice(&bytes)?;
    Ok(d)
}

/// Number of worker slots to use when the caller does not specify one.
pub fn default_concurrency() -> usize {
    num_cpus::get()
}
