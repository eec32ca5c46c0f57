//! ╔══════════════════════════════════════════════════════════════════╗
//! ║   FIXED-POINT THRESHOLDS FOR FIELD COMPARATORS                   ║
//! ║                                                                  ║
//! ║   t_fixed = round(t * multiplier) + offset                       ║
//! ║   one-hot  "x <= 0.5"  =>  t_fixed = 0   (x == 0)                 ║
//! ╚══════════════════════════════════════════════════════════════════╝

use std::collections::BTreeSet;

use crate::error::{CompileError, Result};
use crate::tree::NodeId;

pub const DEFAULT_MULTIPLIER: u64 = 10_000;
pub const DEFAULT_COMPARATOR_BITS: u32 = 32;
/// circomlib's `LessThan(n)` asserts `n <= 252`
pub const MAX_COMPARATOR_BITS: u32 = 252;
pub const DEFAULT_BINARY_EPSILON: f64 = 1e-6;
/// One-hot encoded machine `Type` columns
pub const DEFAULT_BINARY_FEATURES: &[&str] = &["Type_H", "Type_L", "Type_M"];

/// Scale shared by every threshold and input of one compilation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedPointConfig {
    /// Power of ten applied to real values
    pub multiplier: u64,
    /// Operand width of the `LessEqThan` comparator
    pub comparator_bit_width: u32,
    /// Added to scaled (non-binary) thresholds and inputs so negative values
    /// land in the unsigned comparator domain
    pub offset: u64,
}

impl Default for FixedPointConfig {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
            comparator_bit_width: DEFAULT_COMPARATOR_BITS,
            offset: 0,
        }
    }
}

impl FixedPointConfig {
    pub fn new(multiplier: u64, comparator_bit_width: u32) -> Self {
        Self {
            multiplier,
            comparator_bit_width,
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !is_power_of_ten(self.multiplier) {
            return Err(CompileError::InvalidConfig(format!(
                "multiplier {} is not a power of ten",
                self.multiplier
            )));
        }
        if self.comparator_bit_width == 0 || self.comparator_bit_width > MAX_COMPARATOR_BITS {
            return Err(CompileError::InvalidConfig(format!(
                "comparator bit width {} outside 1..={}",
                self.comparator_bit_width, MAX_COMPARATOR_BITS
            )));
        }
        if !self.fits(self.offset as i128) {
            return Err(CompileError::InvalidConfig(format!(
                "offset {} does not fit in {} bits",
                self.offset, self.comparator_bit_width
            )));
        }
        Ok(())
    }

    /// Does `value` fit in `comparator_bit_width` unsigned bits?
    pub fn fits(&self, value: i128) -> bool {
        fits_in_bits(value, self.comparator_bit_width)
    }

    /// `round(value * multiplier) + offset`, rounding half to even like the
    /// upstream scaler. `None` when the product is not representable.
    pub fn scale(&self, value: f64) -> Option<i128> {
        let scaled = (value * self.multiplier as f64).round_ties_even();
        if !scaled.is_finite() || scaled.abs() >= i128::MAX as f64 {
            return None;
        }
        (scaled as i128).checked_add(self.offset as i128)
    }
}

/// Is `value` representable as a `bits`-wide unsigned integer?
pub fn fits_in_bits(value: i128, bits: u32) -> bool {
    if value < 0 {
        return false;
    }
    // i128 cannot hold 2^bits past 126; every non-negative i128 fits then
    bits >= 127 || value < (1i128 << bits)
}

fn is_power_of_ten(mut n: u64) -> bool {
    if n == 0 {
        return false;
    }
    while n % 10 == 0 {
        n /= 10;
    }
    n == 1
}

/// Features that carry raw 0/1 values and are never scaled
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryFeatures {
    names: BTreeSet<String>,
    epsilon: f64,
}

impl Default for BinaryFeatures {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY_FEATURES.iter().copied(), DEFAULT_BINARY_EPSILON)
    }
}

impl BinaryFeatures {
    pub fn new<I, S>(names: I, epsilon: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            epsilon,
        }
    }

    /// No binary features: every threshold is scaled
    pub fn none() -> Self {
        Self::new(std::iter::empty::<String>(), DEFAULT_BINARY_EPSILON)
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.names.contains(feature)
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Is `value` within epsilon of `target`?
    fn near(&self, value: f64, target: f64) -> bool {
        (value - target).abs() < self.epsilon
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdKind {
    /// `round(t * multiplier) + offset`
    Scaled,
    /// One-hot split at 0.5, compared as `x <= 0`
    BinaryZero,
}

/// A split threshold in comparator units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedThreshold {
    pub raw: f64,
    pub fixed: i128,
    pub kind: ThresholdKind,
}

/// Maps real thresholds and inputs onto comparator integers
#[derive(Clone, Copy, Debug)]
pub struct ThresholdResolver<'a> {
    fixed_point: &'a FixedPointConfig,
    binary: &'a BinaryFeatures,
}

impl<'a> ThresholdResolver<'a> {
    pub fn new(fixed_point: &'a FixedPointConfig, binary: &'a BinaryFeatures) -> Self {
        Self {
            fixed_point,
            binary,
        }
    }

    /// Resolve the threshold of split `node` on `feature`.
    ///
    /// A one-hot feature holds 0 or 1, so `x <= 0.5` means `x == 0`; scaling
    /// 0.5 would give a threshold both 0 and 1 pass, so it becomes `0`.
    pub fn resolve(
        &self,
        node: NodeId,
        feature: &str,
        threshold: f64,
    ) -> Result<ResolvedThreshold> {
        if self.binary.contains(feature) && self.binary.near(threshold, 0.5) {
            return Ok(ResolvedThreshold {
                raw: threshold,
                fixed: 0,
                kind: ThresholdKind::BinaryZero,
            });
        }

        let bits = self.fixed_point.comparator_bit_width;
        let fixed = self.fixed_point.scale(threshold).ok_or_else(|| {
            CompileError::malformed(node, format!("threshold {} cannot be scaled", threshold))
        })?;

        if !self.fixed_point.fits(fixed) {
            return Err(CompileError::ThresholdOverflow {
                node,
                feature: feature.to_string(),
                raw: threshold,
                resolved: fixed,
                bits,
            });
        }

        Ok(ResolvedThreshold {
            raw: threshold,
            fixed,
            kind: ThresholdKind::Scaled,
        })
    }

    /// Convert one sample value into the integer the circuit expects for
    /// `feature`: raw 0/1 for binary features, scaled otherwise.
    pub fn encode_input(&self, feature: &str, value: f64) -> Result<i128> {
        let encoded = if self.binary.contains(feature) {
            if self.binary.near(value, 0.0) {
                0
            } else if self.binary.near(value, 1.0) {
                1
            } else {
                return Err(CompileError::InvalidInput(format!(
                    "binary feature {} must be 0 or 1, got {}",
                    feature, value
                )));
            }
        } else {
            self.fixed_point.scale(value).ok_or_else(|| {
                CompileError::InvalidInput(format!("{} = {} cannot be scaled", feature, value))
            })?
        };

        if !self.fixed_point.fits(encoded) {
            return Err(CompileError::InvalidInput(format!(
                "{} = {} encodes to {}, outside {} bits",
                feature, value, encoded, self.fixed_point.comparator_bit_width
            )));
        }
        Ok(encoded)
    }
}
