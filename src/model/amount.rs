//! Amount type for handling monetary values with optional currency symbols.
//!
//! This module provides the `Amount` type which wraps `Decimal` and handles parsing values that may
//! or may not include a currency symbol and thousands separators, which is how a spreadsheet
//! renders a formatted number cell.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Currency symbols that are recognized, and removed, when parsing an `Amount`.
const CURRENCY_SYMBOLS: &[char] = &['$', '฿'];

/// Represents how an amount was (or should be) formatted.
///
/// # Examples
///  - `AmountFormat{ symbol: Some('฿'), commas: true }` -> `-฿60,000.00`
///  - `AmountFormat{ symbol: None, commas: true }` -> `-60,000.00`
///  - `AmountFormat{ symbol: None, commas: false }` -> `-60000`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AmountFormat {
    /// The currency symbol that was present, if any.
    symbol: Option<char>,
    /// Whether commas are present as thousands separators in the formatting.
    commas: bool,
}

impl Default for AmountFormat {
    fn default() -> Self {
        DEFAULT_FORMAT
    }
}

/// The default format has no currency symbol and has commas: e.g. `-60,000.00`.
const DEFAULT_FORMAT: AmountFormat = AmountFormat {
    symbol: None,
    commas: true,
};

/// Represents an amount of money in the single, implied, currency of the ledger.
///
/// Formatting is considered significant for the purposes of equality, so for numeric comparisons,
/// you should access the `Decimal` value and use that.
///
/// ```
/// # use expense_sheet::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("5000").unwrap();
/// let b = Amount::from_str("฿5,000.00").unwrap();
/// assert_ne!(a, b);
/// assert_eq!(a.value(), b.value());
/// assert_eq!(b.to_string(), "฿5,000.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    /// The parsed numerical value.
    value: Decimal,
    /// The way the numerical value was parsed from, or should be written to, a `String`.
    format: AmountFormat,
}

impl Amount {
    /// Creates a new Amount from a Decimal value with default `String` formatting.
    pub const fn new(value: Decimal) -> Self {
        Self {
            value,
            format: DEFAULT_FORMAT,
        }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value().is_zero()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value().is_sign_negative()
    }
}

/// An error that can occur when parsing strings into `Decimal` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };

        // The symbol may lead ("฿50") or trail ("50 ฿") the number.
        let mut symbol = None;
        let mut number = unsigned;
        if let Some(c) = number.chars().next().filter(|c| CURRENCY_SYMBOLS.contains(c)) {
            symbol = Some(c);
            number = number[c.len_utf8()..].trim_start();
        } else if let Some(c) = number
            .chars()
            .next_back()
            .filter(|c| CURRENCY_SYMBOLS.contains(c))
        {
            symbol = Some(c);
            number = number[..number.len() - c.len_utf8()].trim_end();
        }

        // Remove commas (thousand separators)
        let without_commas = number.replace(',', "");
        let commas = without_commas.len() < number.len();

        let mut value = Decimal::from_str(&without_commas).map_err(AmountError)?;
        if negative {
            value.set_sign_negative(true);
        }
        Ok(Amount {
            value,
            format: AmountFormat { symbol, commas },
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = self.format.symbol.map(String::from).unwrap_or_default();
        if self.format.commas {
            let cents = self
                .value()
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            // Something like -0.004 shows as 0.00, not -0.00.
            let sign = if cents.is_zero() || cents.is_sign_positive() { "" } else { "-" };
            write!(f, "{sign}{symbol}{}", with_commas(cents.abs()))
        } else {
            let sign = if self.is_negative() { "-" } else { "" };
            write!(f, "{sign}{symbol}{}", self.value().abs())
        }
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

/// Writes a non-negative `value` that is already rounded to cents with its whole part grouped in
/// thousands: `12345.6` -> `12,345.60`.
fn with_commas(value: Decimal) -> String {
    let text = format!("{value:.2}");
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let digits = whole.len();
    let mut grouped = String::with_capacity(digits + digits / 3);
    for (ix, c) in whole.chars().enumerate() {
        if ix > 0 && (digits - ix) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{grouped}.{cents}")
}

/// Formats a `Decimal` the way totals are shown in reports: `-1,234.50`.
pub(crate) fn format_decimal(value: Decimal) -> String {
    Amount::new(value).to_string()
}
