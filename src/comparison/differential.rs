use std::fmt;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::RateError;

/// Positive symmetric differentials are capped at this many percent.
pub const MAX_POSITIVE_DIFFERENTIAL: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSign {
    Positive,
    Negative,
    /// Differential could not be computed.
    NotAvailable,
}

impl RateSign {
    pub fn of(diff: f64) -> Self {
        if diff >= 0.0 { Self::Positive } else { Self::Negative }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::NotAvailable => "N/A",
        }
    }
}

impl fmt::Display for RateSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Differential {
    /// Percent deviation; `None` only when undefined.
    pub percent: Option<f64>,
    pub sign: RateSign,
}

/// `(reference - market) / mean(reference, market) * 100`.
pub fn symmetric_percent(reference: f64, market: f64) -> Result<f64, RateError> {
    let sum = reference + market;
    if sum == 0.0 {
        return Err(RateError::UndefinedDifferential);
    }
    Ok((reference - market) / (sum / 2.0) * 100.0)
}

/// `(reference - market) / market * 100`, or 0 when there is no usable
/// reference (or no market price to divide by).
pub fn simple_percent(reference: f64, market: f64) -> f64 {
    if reference > 0.0 && market != 0.0 {
        (reference - market) / market * 100.0
    } else {
        0.0
    }
}

/// Caps positive values at [`MAX_POSITIVE_DIFFERENTIAL`]; negatives pass through.
pub fn clamp_positive(diff: f64) -> f64 {
    if diff > 0.0 { diff.min(MAX_POSITIVE_DIFFERENTIAL) } else { diff }
}

/// Crypto/fiat comparison: symmetric percent, clamped, `N/A` when undefined.
pub fn symmetric_differential(reference: f64, market: f64) -> Differential {
    match symmetric_percent(reference, market) {
        Ok(diff) => Differential {
            percent: Some(clamp_positive(diff)),
            sign: RateSign::of(diff),
        },
        Err(_) => Differential {
            percent: None,
            sign: RateSign::NotAvailable,
        },
    }
}

/// Peer/USDT comparison: simple percent, never clamped.
pub fn simple_differential(reference: f64, market: f64) -> Differential {
    let diff = simple_percent(reference, market);
    Differential {
        percent: Some(diff),
        sign: RateSign::of(diff),
    }
}

/// Two-decimal rounding for emitted values.
pub fn round2(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_symmetric_positive_is_clamped() {
        let raw = symmetric_percent(110.0, 100.0).unwrap();
        assert!(approx(raw, 9.52));

        let d = symmetric_differential(110.0, 100.0);
        assert_eq!(d.percent, Some(3.0));
        assert_eq!(d.sign, RateSign::Positive);
    }

    #[test]
    fn test_symmetric_small_positive_untouched() {
        let d = symmetric_differential(101.0, 100.0);
        assert!(approx(d.percent.unwrap(), 0.995));
        assert_eq!(d.sign, RateSign::Positive);
    }

    #[test]
    fn test_symmetric_negative_unclamped() {
        let d = symmetric_differential(90.0, 100.0);
        assert!(approx(d.percent.unwrap(), -10.53));
        assert_eq!(d.sign, RateSign::Negative);
    }

    #[test]
    fn test_symmetric_zero_pair_is_undefined() {
        assert!(matches!(symmetric_percent(0.0, 0.0), Err(RateError::UndefinedDifferential)));

        let d = symmetric_differential(0.0, 0.0);
        assert_eq!(d.percent, None);
        assert_eq!(d.sign, RateSign::NotAvailable);
        assert_eq!(d.sign.to_string(), "N/A");
    }

    #[test]
    fn test_symmetric_equal_prices_is_positive_zero() {
        let d = symmetric_differential(100.0, 100.0);
        assert_eq!(d.percent, Some(0.0));
        assert_eq!(d.sign, RateSign::Positive);
    }

    #[test]
    fn test_simple_zero_reference() {
        let d = simple_differential(0.0, 122.0);
        assert_eq!(d.percent, Some(0.0));
        assert_eq!(d.sign, RateSign::Positive);
    }

    #[test]
    fn test_simple_is_never_clamped() {
        let d = simple_differential(130.0, 100.0);
        assert!(approx(d.percent.unwrap(), 30.0));

        let d = simple_differential(95.0, 100.0);
        assert!(approx(d.percent.unwrap(), -5.0));
        assert_eq!(d.sign, RateSign::Negative);
    }

    #[test]
    fn test_simple_zero_market_does_not_divide() {
        assert_eq!(simple_percent(120.0, 0.0), 0.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(9.5238), 9.52);
        assert_eq!(round2(-10.526), -10.53);
        assert!(round2(f64::NAN).is_nan());
    }
}
