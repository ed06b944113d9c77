//! Certainty ranking
//!
//! Turns discovered paths into a total order of [`InferenceResult`]s.
//! Certainty lives in two bands: direct edges map into `(0.5, 1.0]` and
//! chains into `[0.0, 0.5]`, so any direct edge with positive weight
//! outranks every chain whatever the combination model. Within the chain
//! band each hop past the second costs [`LENGTH_PENALTY`] of the combined
//! weight. Ties break on hop count, then on the term sequence, then on the
//! relation sequence.

mod certainty;

pub use certainty::{Bottleneck, CertaintyModel, HarmonicMean, Product, model_by_name};

use std::cmp::Ordering;

use crate::domain::{InferenceKind, InferenceResult, Path, RelationType};

/// Fraction of a chain's combined weight lost per hop beyond two
pub const LENGTH_PENALTY: f64 = 0.05;

/// Scores and orders paths
#[derive(Debug)]
pub struct CertaintyRanker {
    model: Box<dyn CertaintyModel>,
}

impl Default for CertaintyRanker {
    fn default() -> Self {
        Self::new(Box::new(Bottleneck))
    }
}

impl CertaintyRanker {
    pub fn new(model: Box<dyn CertaintyModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Certainty of one path in `[0.0, 1.0]`
    pub fn certainty(&self, path: &Path) -> f64 {
        let weights: Vec<f64> = path.weights().collect();
        if path.is_direct() {
            let weight = weights[0];
            if weight > 0.0 { 0.5 + 0.5 * weight } else { 0.0 }
        } else {
            let extra_hops = weights.len().saturating_sub(2) as f64;
            let length_factor = (1.0 - LENGTH_PENALTY * extra_hops).max(0.0);
            0.5 * self.model.combine(&weights).clamp(0.0, 1.0) * length_factor
        }
    }

    /// Score, dedupe and order paths for a query on `relation`
    pub fn rank(&self, paths: Vec<Path>, relation: &RelationType) -> Vec<InferenceResult> {
        let mut scored: Vec<(f64, Path)> = paths
            .into_iter()
            .map(|path| (self.certainty(&path), path))
            .collect();

        scored.sort_by(|(ca, a), (cb, b)| compare(*ca, a, *cb, b));
        scored.dedup_by(|(_, a), (_, b)| a == b);

        scored
            .into_iter()
            .enumerate()
            .map(|(index, (certainty, path))| InferenceResult {
                rank: index + 1,
                certainty,
                kind: InferenceKind::classify(&path, relation),
                ordering_key: path.ordering_key(),
                path,
            })
            .collect()
    }
}

fn compare(ca: f64, a: &Path, cb: f64, b: &Path) -> Ordering {
    cb.total_cmp(&ca)
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| a.ordering_key().cmp(&b.ordering_key()))
        .then_with(|| {
            let relations = |p: &Path| -> Vec<RelationType> {
                p.edges().iter().map(|e| e.relation.clone()).collect()
            };
            relations(a).cmp(&relations(b))
        })
        .then_with(|| {
            // Same terms and relations, different weights: keep stronger first
            b.weights().map(|w| w.to_bits()).cmp(a.weights().map(|w| w.to_bits()))
        })
}
