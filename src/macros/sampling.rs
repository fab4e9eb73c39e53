//! Seeded sample strategies for macro variables.
//!
//! All strategies share the range interface of
//! [`MacroGenerator::add_set_value_range`]: per-element bounds (or
//! moments) plus an explicit seed, producing one sample per generated
//! macro. Equal seeds reproduce equal macros.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::MacroGenerator;
use crate::error::{Error, Result};
use crate::value::Value;
use crate::Float;

impl MacroGenerator {
    /// Registers N independent uniform samples drawn from
    /// `[lower, upper)`, elementwise for vector and matrix bounds.
    pub fn add_set_value_uniform(
        &mut self,
        name: &str,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
        seed: u64,
    ) -> Result<()> {
        let samples = uniform_samples(&lower.into(), &upper.into(), self.number_of_macros(), seed)?;
        self.push_samples(name, samples);
        Ok(())
    }

    /// Registers N independent normal samples with elementwise mean and
    /// standard deviation.
    pub fn add_set_value_normal(
        &mut self,
        name: &str,
        mean: impl Into<Value>,
        deviation: impl Into<Value>,
        seed: u64,
    ) -> Result<()> {
        let samples = normal_samples(&mean.into(), &deviation.into(), self.number_of_macros(), seed)?;
        self.push_samples(name, samples);
        Ok(())
    }

    /// Registers N latin-hypercube samples over `[lower, upper)`: the
    /// interval is split into N equal strata, one sample is drawn per
    /// stratum, and the stratum order is shuffled independently per
    /// element to decorrelate variable pairs.
    pub fn add_set_value_latin_hypercube(
        &mut self,
        name: &str,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
        seed: u64,
    ) -> Result<()> {
        let samples =
            latin_hypercube_samples(&lower.into(), &upper.into(), self.number_of_macros(), seed)?;
        self.push_samples(name, samples);
        Ok(())
    }
}

/// Flattens a bounds pair into matching element lists.
fn flatten_pair(
    a: &Value,
    b: &Value,
) -> Result<(crate::value::Shape, Vec<Float>, Vec<Float>)> {
    let (shape, a_elems) = a.flatten()?;
    let (b_shape, b_elems) = b.flatten()?;
    if shape != b_shape {
        return Err(Error::ShapeMismatch(format!("{:?} vs {:?}", shape, b_shape)));
    }
    Ok((shape, a_elems, b_elems))
}

/// Assembles per-element sample columns back into N values.
fn assemble(shape: &crate::value::Shape, columns: Vec<Vec<Float>>, n: usize) -> Vec<Value> {
    (0..n)
        .map(|k| {
            let elems = columns.iter().map(|column| column[k]).collect::<Vec<Float>>();
            Value::from_flat(shape, &elems)
        })
        .collect()
}

pub(crate) fn uniform_samples(
    lower: &Value,
    upper: &Value,
    n: usize,
    seed: u64,
) -> Result<Vec<Value>> {
    let (shape, lo, up) = flatten_pair(lower, upper)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let columns = lo
        .iter()
        .zip(&up)
        .map(|(a, b)| (0..n).map(|_| a + rng.gen::<Float>() * (b - a)).collect())
        .collect::<Vec<Vec<Float>>>();
    Ok(assemble(&shape, columns, n))
}

pub(crate) fn normal_samples(
    mean: &Value,
    deviation: &Value,
    n: usize,
    seed: u64,
) -> Result<Vec<Value>> {
    let (shape, means, deviations) = flatten_pair(mean, deviation)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut columns = Vec::with_capacity(means.len());
    for (m, s) in means.iter().zip(&deviations) {
        let dist = Normal::new(*m, *s)
            .map_err(|e| Error::InvalidParam(format!("normal distribution: {:?}", e)))?;
        columns.push((0..n).map(|_| dist.sample(&mut rng)).collect::<Vec<Float>>());
    }
    Ok(assemble(&shape, columns, n))
}

pub(crate) fn latin_hypercube_samples(
    lower: &Value,
    upper: &Value,
    n: usize,
    seed: u64,
) -> Result<Vec<Value>> {
    let (shape, lo, up) = flatten_pair(lower, upper)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut columns = Vec::with_capacity(lo.len());
    for (a, b) in lo.iter().zip(&up) {
        // one point per stratum of [0,1), then shuffle the stratum order
        let mut strata = (0..n)
            .map(|k| (k as Float + rng.gen::<Float>()) / n as Float)
            .collect::<Vec<Float>>();
        strata.shuffle(&mut rng);
        columns.push(strata.iter().map(|s| a + s * (b - a)).collect::<Vec<Float>>());
    }
    Ok(assemble(&shape, columns, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_within_bounds() {
        let samples = uniform_samples(&Value::from(-2.0), &Value::from(3.0), 100, 7).unwrap();
        assert_eq!(samples.len(), 100);
        for sample in samples {
            let v = sample.as_scalar().unwrap();
            assert!(v >= -2.0 && v < 3.0);
        }
    }

    #[test]
    fn seeded_draws_reproduce() {
        let a = uniform_samples(&Value::from(0.0), &Value::from(1.0), 10, 42).unwrap();
        let b = uniform_samples(&Value::from(0.0), &Value::from(1.0), 10, 42).unwrap();
        let c = uniform_samples(&Value::from(0.0), &Value::from(1.0), 10, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn normal_zero_deviation_is_constant() {
        let samples = normal_samples(&Value::from(1.5), &Value::from(0.0), 5, 1).unwrap();
        for sample in samples {
            assert_eq!(sample.as_scalar().unwrap(), 1.5);
        }
    }

    #[test]
    fn normal_negative_deviation_fails() {
        assert!(normal_samples(&Value::from(0.0), &Value::from(-1.0), 5, 1).is_err());
    }

    #[test]
    fn latin_hypercube_covers_every_stratum() {
        let n = 8;
        let samples =
            latin_hypercube_samples(&Value::from(10.0), &Value::from(20.0), n, 99).unwrap();
        let mut hit = vec![false; n];
        for sample in &samples {
            let unit = (sample.as_scalar().unwrap() - 10.0) / 10.0;
            let stratum = (unit * n as Float).floor() as usize;
            assert!(stratum < n);
            assert!(!hit[stratum], "stratum {} sampled twice", stratum);
            hit[stratum] = true;
        }
        assert!(hit.iter().all(|h| *h));
    }

    #[test]
    fn elementwise_vector_bounds() {
        let lower = Value::from(vec![0.0, 100.0]);
        let upper = Value::from(vec![1.0, 200.0]);
        let samples = latin_hypercube_samples(&lower, &upper, 4, 5).unwrap();
        for sample in samples {
            let v = sample.as_vector().unwrap().clone();
            assert!(v[0] >= 0.0 && v[0] < 1.0);
            assert!(v[1] >= 100.0 && v[1] < 200.0);
        }
    }

    #[test]
    fn generator_methods_register_samples() {
        let mut gen = MacroGenerator::new(4);
        gen.add_set_value_uniform("a", 0.0, 1.0, 3).unwrap();
        gen.add_set_value_normal("b", 0.0, 1.0, 3).unwrap();
        gen.add_set_value_latin_hypercube("c", 0.0, 1.0, 3).unwrap();
        let macros = gen.generate_macros();
        assert_eq!(macros.len(), 4);
        for macro_lines in macros {
            assert_eq!(macro_lines.len(), 3);
        }
    }
}
