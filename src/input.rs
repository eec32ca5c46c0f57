//! Circuit input preparation
//!
//! Turns one standardized sample into the `input.json` the witness
//! generator reads: `{"features": [...]}` in feature-set order, encoded with
//! the same scale and binary rules as the thresholds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compiler::CompilerOptions;
use crate::error::{CompileError, Result};
use crate::fixed_point::ThresholdResolver;
use crate::tree::FeatureSet;

/// Body of the circuit's `input.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitInput {
    pub features: Vec<i128>,
}

impl CircuitInput {
    /// Encode `sample` (feature name → standardized value).
    ///
    /// Every feature of `features` must be present; extra names are rejected
    /// so a typo cannot silently drop a value.
    pub fn prepare(
        features: &FeatureSet,
        sample: &BTreeMap<String, f64>,
        options: &CompilerOptions,
    ) -> Result<Self> {
        if let Some(unknown) = sample.keys().find(|name| features.index_of(name).is_none()) {
            return Err(CompileError::InvalidInput(format!("unknown feature {}", unknown)));
        }

        let resolver = ThresholdResolver::new(&options.fixed_point, &options.binary_features);
        let encoded = features
            .iter()
            .map(|name| {
                let value = sample.get(name).ok_or_else(|| {
                    CompileError::InvalidInput(format!("missing feature {}", name))
                })?;
                resolver.encode_input(name, *value)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(features = ?encoded, "Prepared circuit input");
        Ok(Self { features: encoded })
    }

    /// Encode values already in feature-set order.
    pub fn prepare_ordered(
        features: &FeatureSet,
        values: &[f64],
        options: &CompilerOptions,
    ) -> Result<Self> {
        if values.len() != features.len() {
            return Err(CompileError::InvalidInput(format!(
                "expected {} feature values, got {}",
                features.len(),
                values.len()
            )));
        }
        let sample = features
            .iter()
            .zip(values)
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        Self::prepare(features, &sample, options)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
