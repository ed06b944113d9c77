//! Certainty models
//!
//! A model folds a multi-hop path's edge weights into one number in
//! `[0.0, 1.0]`. The ranker places that number below every direct edge.

use std::fmt;

use crate::error::{Error, Result};

/// Combines per-edge weights of a chain into one score
pub trait CertaintyModel: Send + Sync + fmt::Debug {
    /// Name used in configuration
    fn name(&self) -> &'static str;

    /// Combine weights in `[0.0, 1.0]`; never called with an empty slice
    fn combine(&self, weights: &[f64]) -> f64;
}

/// Weakest link decides (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct Bottleneck;

impl CertaintyModel for Bottleneck {
    fn name(&self) -> &'static str {
        "bottleneck"
    }

    fn combine(&self, weights: &[f64]) -> f64 {
        weights.iter().copied().fold(1.0, f64::min)
    }
}

/// Independent-evidence product; longer chains decay
#[derive(Debug, Clone, Copy, Default)]
pub struct Product;

impl CertaintyModel for Product {
    fn name(&self) -> &'static str {
        "product"
    }

    fn combine(&self, weights: &[f64]) -> f64 {
        weights.iter().product()
    }
}

/// Harmonic mean of the weights
#[derive(Debug, Clone, Copy, Default)]
pub struct HarmonicMean;

impl CertaintyModel for HarmonicMean {
    fn name(&self) -> &'static str {
        "harmonic"
    }

    fn combine(&self, weights: &[f64]) -> f64 {
        if weights.iter().any(|&w| w <= 0.0) {
            return 0.0;
        }
        let inverse_sum: f64 = weights.iter().map(|w| 1.0 / w).sum();
        weights.len() as f64 / inverse_sum
    }
}

/// Look up a model by its configuration name
pub fn model_by_name(name: &str) -> Result<Box<dyn CertaintyModel>> {
    match name {
        "bottleneck" => Ok(Box::new(Bottleneck)),
        "product" => Ok(Box::new(Product)),
        "harmonic" => Ok(Box::new(HarmonicMean)),
        other => Err(Error::InvalidInput(format!(
            "Unknown certainty model '{}'. Valid options: bottleneck, product, harmonic",
            other
        ))),
    }
}
