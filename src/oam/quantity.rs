//! Kubernetes-style resource quantities.
//!
//! OAM schematics express CPU as cores (`0.5`, `500m`) and memory as bytes
//! with decimal or binary suffixes (`128M`, `512Mi`, `1Gi`). Quantities are
//! held as milli-units so CPU and memory sums stay in integer arithmetic.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::LoadError;

/// A parsed resource quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantity {
    raw: String,
    milli: u64,
}

impl Quantity {
    /// Parses a quantity such as `0.25`, `250m`, `128Mi` or `1e3`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a non-negative quantity.
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let raw = text.trim();
        let invalid = || LoadError::InvalidQuantity {
            value: text.to_string(),
        };

        let split = raw
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+'))
            .unwrap_or(raw.len());
        let (number, suffix) = raw.split_at(split);
        let number = number.strip_prefix('+').unwrap_or(number);
        if number.is_empty() || number == "." {
            return Err(invalid());
        }

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if fraction.contains('.') {
            return Err(invalid());
        }
        let digits = format!("{whole}{fraction}");
        let mantissa: u128 = digits.parse().map_err(|_| invalid())?;
        let fraction_len = u32::try_from(fraction.len()).map_err(|_| invalid())?;

        let (scale_num, scale_den) = suffix_scale(suffix).ok_or_else(invalid)?;

        // milli = ceil(mantissa * 1000 * scale_num / (10^fraction_len * scale_den))
        let numerator = mantissa
            .checked_mul(1000)
            .and_then(|n| n.checked_mul(scale_num))
            .ok_or_else(invalid)?;
        let denominator = 10u128
            .checked_pow(fraction_len)
            .and_then(|d| d.checked_mul(scale_den))
            .ok_or_else(invalid)?;
        let milli = numerator.div_ceil(denominator);

        Ok(Self {
            raw: raw.to_string(),
            milli: u64::try_from(milli).map_err(|_| invalid())?,
        })
    }

    /// Returns the value in thousandths of a unit, rounded up.
    #[must_use]
    pub const fn milli_value(&self) -> u64 {
        self.milli
    }

    /// Returns the value in whole units, rounded up.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.milli.div_ceil(1000)
    }

    /// Returns the text the quantity was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Returns the (numerator, denominator) multiplier for a suffix.
fn suffix_scale(suffix: &str) -> Option<(u128, u128)> {
    const KI: u128 = 1024;
    let scale = match suffix {
        "" => (1, 1),
        "n" => (1, 1_000_000_000),
        "u" => (1, 1_000_000),
        "m" => (1, 1000),
        "k" => (1000, 1),
        "M" => (1_000_000, 1),
        "G" => (1_000_000_000, 1),
        "T" => (1_000_000_000_000, 1),
        "P" => (1_000_000_000_000_000, 1),
        "E" => (1_000_000_000_000_000_000, 1),
        "Ki" => (KI, 1),
        "Mi" => (KI.pow(2), 1),
        "Gi" => (KI.pow(3), 1),
        "Ti" => (KI.pow(4), 1),
        "Pi" => (KI.pow(5), 1),
        "Ei" => (KI.pow(6), 1),
        exponent => {
            let power = exponent
                .strip_prefix('e')
                .or_else(|| exponent.strip_prefix('E'))?;
            let power: i32 = power.parse().ok()?;
            let magnitude = 10u128.checked_pow(power.unsigned_abs())?;
            if power >= 0 { (magnitude, 1) } else { (1, magnitude) }
        }
    };
    Some(scale)
}

impl FromStr for Quantity {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawQuantity {
            Text(String),
            Unsigned(u64),
            Float(f64),
        }

        let text = match RawQuantity::deserialize(deserializer)? {
            RawQuantity::Text(text) => text,
            RawQuantity::Unsigned(n) => n.to_string(),
            RawQuantity::Float(f) => f.to_string(),
        };
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_quantities() {
        assert_eq!(Quantity::parse("0.5").unwrap().milli_value(), 500);
        assert_eq!(Quantity::parse("250m").unwrap().milli_value(), 250);
        assert_eq!(Quantity::parse("2").unwrap().milli_value(), 2000);
        assert_eq!(Quantity::parse(".25").unwrap().milli_value(), 250);
    }

    #[test]
    fn test_parse_memory_quantities() {
        assert_eq!(Quantity::parse("128Mi").unwrap().value(), 128 * 1024 * 1024);
        assert_eq!(Quantity::parse("1G").unwrap().value(), 1_000_000_000);
        assert_eq!(Quantity::parse("1Gi").unwrap().value(), 1 << 30);
        assert_eq!(Quantity::parse("1e3").unwrap().value(), 1000);
        assert_eq!(Quantity::parse("4k").unwrap().value(), 4000);
    }

    #[test]
    fn test_parse_rounds_up() {
        assert_eq!(Quantity::parse("1n").unwrap().milli_value(), 1);
        assert_eq!(Quantity::parse("0.0001").unwrap().milli_value(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Quantity::parse("").is_err());
        assert!(Quantity::parse("lots").is_err());
        assert!(Quantity::parse("1.2.3").is_err());
        assert!(Quantity::parse("-1").is_err());
        assert!(Quantity::parse("12Zi").is_err());
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let cpu: Quantity = serde_yaml::from_str("0.5").unwrap();
        assert_eq!(cpu.milli_value(), 500);

        let memory: Quantity = serde_yaml::from_str("\"512Mi\"").unwrap();
        assert_eq!(memory.value(), 512 * 1024 * 1024);
        assert_eq!(memory.as_str(), "512Mi");

        let whole: Quantity = serde_yaml::from_str("2").unwrap();
        assert_eq!(whole.milli_value(), 2000);
    }
}
