use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary value as it arrives from the backend or a form field: a JSON
/// number, free text, or nothing at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
    Missing,
}

impl RawAmount {
    /// Coerces the raw value the way a lenient numeric parse does: leading
    /// whitespace is skipped and the longest numeric prefix is taken, so
    /// `"500 USD"` yields `500` while `"invalid"` yields `None`.
    pub fn coerce(&self) -> Option<Decimal> {
        match self {
            Self::Number(value) => {
                if value.is_finite() {
                    Decimal::from_f64(*value)
                } else {
                    None
                }
            }
            Self::Text(text) => parse_numeric_prefix(text),
            Self::Missing => None,
        }
    }

    /// Coerced value if it is strictly greater than zero.
    pub fn positive(&self) -> Option<Decimal> {
        self.coerce().filter(|value| *value > Decimal::ZERO)
    }

    pub fn display(&self) -> String {
        self.coerce().map(|value| value.normalize().to_string()).unwrap_or_else(|| "N/A".to_owned())
    }
}

impl Default for RawAmount {
    fn default() -> Self {
        Self::Missing
    }
}

impl From<Decimal> for RawAmount {
    fn from(value: Decimal) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<f64> for RawAmount {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl fmt::Display for RawAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

fn parse_numeric_prefix(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    for (index, ch) in trimmed.char_indices() {
        match ch {
            '+' | '-' if index == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = index + ch.len_utf8();
    }

    if !seen_digit {
        return None;
    }

    let candidate = trimmed[..end].trim_end_matches('.');
    Decimal::from_str(candidate).ok()
}
