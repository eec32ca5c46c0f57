//! Configuration management

use anyhow::{Context, Result};
use std::env;

use dt_circom::compiler::{DEFAULT_INCLUDE_PATH, DEFAULT_TEMPLATE_NAME};
use dt_circom::fixed_point::{
    DEFAULT_BINARY_EPSILON, DEFAULT_BINARY_FEATURES, DEFAULT_COMPARATOR_BITS, DEFAULT_MULTIPLIER,
};
use dt_circom::{BinaryFeatures, CompilerOptions, FixedPointConfig};

#[derive(Clone, Debug)]
pub struct Config {
    pub multiplier: u64,
    pub comparator_bits: u32,
    pub binary_features: Vec<String>,
    pub binary_epsilon: f64,
    pub threshold_offset: u64,
    pub include_path: String,
    pub template_name: String,
    pub assert_single_leaf: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            multiplier: env::var("DT_FIXED_POINT_MULTIPLIER")
                .unwrap_or_else(|_| DEFAULT_MULTIPLIER.to_string())
                .parse()
                .context("Invalid DT_FIXED_POINT_MULTIPLIER")?,

            comparator_bits: env::var("DT_COMPARATOR_BITS")
                .unwrap_or_else(|_| DEFAULT_COMPARATOR_BITS.to_string())
                .parse()
                .context("Invalid DT_COMPARATOR_BITS")?,

            // comma separated; empty disables binary handling
            binary_features: env::var("DT_BINARY_FEATURES")
                .map(|list| split_list(&list))
                .unwrap_or_else(|_| {
                    DEFAULT_BINARY_FEATURES
                        .iter()
                        .map(|s| s.to_string())
                        .collect()
                }),

            binary_epsilon: env::var("DT_BINARY_EPSILON")
                .unwrap_or_else(|_| DEFAULT_BINARY_EPSILON.to_string())
                .parse()
                .context("Invalid DT_BINARY_EPSILON")?,

            threshold_offset: env::var("DT_THRESHOLD_OFFSET")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .context("Invalid DT_THRESHOLD_OFFSET")?,

            include_path: env::var("DT_CIRCOMLIB_INCLUDE")
                .unwrap_or_else(|_| DEFAULT_INCLUDE_PATH.to_string()),

            template_name: env::var("DT_TEMPLATE_NAME")
                .unwrap_or_else(|_| DEFAULT_TEMPLATE_NAME.to_string()),

            assert_single_leaf: env::var("DT_ASSERT_SINGLE_LEAF")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("Invalid DT_ASSERT_SINGLE_LEAF")?,
        })
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            fixed_point: FixedPointConfig::new(self.multiplier, self.comparator_bits)
                .with_offset(self.threshold_offset),
            binary_features: BinaryFeatures::new(
                self.binary_features.iter().cloned(),
                self.binary_epsilon,
            ),
            template_name: self.template_name.clone(),
            include_path: self.include_path.clone(),
            assert_single_leaf: self.assert_single_leaf,
            ..CompilerOptions::default()
        }
    }
}

pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
