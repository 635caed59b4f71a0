use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::U256;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UnitsError {
    #[error("unparseable token amount: {0}")]
    Parse(String),
}

/// Converts a decimal token amount (e.g. "0.01") to an integer amount of
/// base units at the given precision. Rejects amounts with more fractional
/// digits than the token carries.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256, UnitsError> {
    parse_units(amount, decimals)
        .map(|v| v.get_absolute())
        .map_err(|e| UnitsError::Parse(e.to_string()))
}

/// Inverse of [`to_base_units`]. Trailing fractional zeros are trimmed so
/// that the conversion round-trips for any representable amount.
pub fn from_base_units(amount: U256, decimals: u8) -> String {
    let rendered = match format_units(amount, decimals) {
        Ok(s) => s,
        Err(_) => return amount.to_string(),
    };
    match rendered.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{frac}")
            }
        }
        None => rendered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_fractional_amount_to_base_units() {
        let wei = to_base_units("0.01", 18).unwrap();
        assert_eq!(wei, U256::from(10_000_000_000_000_000u64));
    }

    #[test]
    fn round_trips_at_configured_precision() {
        for amount in ["0.01", "1", "0.000000000000000001", "123.456789", "0"] {
            let wei = to_base_units(amount, 18).unwrap();
            assert_eq!(from_base_units(wei, 18), amount);
        }
    }

    #[test]
    fn round_trips_at_low_precision() {
        let wei = to_base_units("2.5", 6).unwrap();
        assert_eq!(wei, U256::from(2_500_000u64));
        assert_eq!(from_base_units(wei, 6), "2.5");
    }

    #[test]
    fn rejects_excess_precision() {
        assert!(to_base_units("0.1234567", 6).is_err());
        assert!(to_base_units("not a number", 18).is_err());
    }
}
