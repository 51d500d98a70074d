//! Fixed-point math utilities for deterministic decisions.
//!
//! Every score the engine compares is fixed point so that two clients
//! resolving the same battle pick the same targets and paths.

use fixed::types::{I32F32, I64F64};

/// Fixed-point number for per-pair quantities (kill fraction, unit value).
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Wide fixed-point number for aggregated products.
///
/// Desirability and force sums multiply several [`Fixed`] values together;
/// the 64 integer bits keep large fleets from overflowing.
pub type WideFixed = I64F64;

/// Widen a [`Fixed`] into a [`WideFixed`].
#[inline]
#[must_use]
pub fn widen(value: Fixed) -> WideFixed {
    WideFixed::from_num(value)
}

/// Clamp a fraction into `[0, 1]`.
#[inline]
#[must_use]
pub fn clamp_unit(value: Fixed) -> Fixed {
    value.clamp(Fixed::ZERO, Fixed::ONE)
}

/// `numerator / denominator`, or zero when the denominator is not positive.
#[must_use]
pub fn ratio(numerator: Fixed, denominator: Fixed) -> Fixed {
    if denominator <= Fixed::ZERO {
        Fixed::ZERO
    } else {
        numerator / denominator
    }
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for fixed-point numbers written as plain decimals.
///
/// Used by hand-edited configuration where raw bits would be unreadable.
pub mod decimal_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize as an `f64`.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize from an `f64`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| serde::de::Error::custom(format!("{value} out of fixed-point range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_guards_zero_denominator() {
        assert_eq!(ratio(Fixed::from_num(3), Fixed::ZERO), Fixed::ZERO);
        assert_eq!(
            ratio(Fixed::from_num(3), Fixed::from_num(2)),
            Fixed::from_num(1.5)
        );
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(Fixed::from_num(2)), Fixed::ONE);
        assert_eq!(clamp_unit(Fixed::from_num(-1)), Fixed::ZERO);
        assert_eq!(clamp_unit(Fixed::from_num(0.25)), Fixed::from_num(0.25));
    }

    #[test]
    fn test_widen_preserves_value() {
        let v = Fixed::from_num(1234.5);
        assert_eq!(widen(v), WideFixed::from_num(1234.5));
    }

    #[test]
    fn test_wide_products_do_not_overflow() {
        let big = widen(Fixed::from_num(2_000_000));
        let product = big * big;
        assert!(product > WideFixed::from_num(1_000_000_000_000_i64));
    }
}
