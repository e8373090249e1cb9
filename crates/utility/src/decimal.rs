use std::str::FromStr as _;

use rust_decimal::{
    prelude::{FromPrimitive as _, ToPrimitive as _},
    Decimal, RoundingStrategy,
};

/// Rounds to `scale` fractional digits, ties away from zero, and pads the
/// result to exactly `scale` digits.
pub fn round_half_up(value: Decimal, scale: u32) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale);
    rounded
}

/// Converts a float through its shortest decimal representation, so that
/// `2.675_f64` becomes `2.675` rather than `2.67499999...`.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
}

/// Half-up rounding of a float at `scale` fractional digits.
pub fn round_f64_half_up(value: f64, scale: u32) -> Option<f64> {
    decimal_from_f64(value)
        .map(|value| round_half_up(value, scale))
        .and_then(|value| value.to_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn ties_round_away_from_zero() {
        assert_eq!(round_half_up(dec("41.6611805"), 6), dec("41.661181"));
        assert_eq!(round_half_up(dec("-71.3862015"), 6), dec("-71.386202"));
        assert_eq!(round_half_up(dec("0.0000005"), 6), dec("0.000001"));
        assert_eq!(round_half_up(dec("-0.0000005"), 6), dec("-0.000001"));
    }

    #[test]
    fn pads_to_scale() {
        assert_eq!(round_half_up(dec("34.0522"), 6).to_string(), "34.052200");
    }

    #[test]
    fn floats_round_from_their_shortest_representation() {
        assert_eq!(round_f64_half_up(2.675, 2), Some(2.68));
        assert_eq!(round_f64_half_up(1.005, 2), Some(1.01));
        assert_eq!(round_f64_half_up(4.994999, 2), Some(4.99));
        assert_eq!(round_f64_half_up(f64::NAN, 2), None);
    }
}
