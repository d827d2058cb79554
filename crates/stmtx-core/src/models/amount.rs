//! Monetary amount parsing and formatting.
//!
//! Statements come from many locales, so amounts arrive as "1,234.56",
//! "1.234,56", "1 234,56" or "(12.50)". Everything is normalized to
//! [`Decimal`].

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::de::{self, Deserializer, Visitor};

lazy_static! {
    static ref AMOUNT_TOKEN: Regex =
        Regex::new(r"[0-9][0-9.,'\s\u{00a0}]*").unwrap();
}

/// Parse a locale-formatted amount.
///
/// A lone separator followed by exactly three digits is read as digit
/// grouping ("1.500" is fifteen hundred); otherwise the last separator is the
/// decimal point. Returns `None` for empty input or placeholders like "-".
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    let token = AMOUNT_TOKEN.find(trimmed)?;

    let negative = trimmed[..token.start()].contains('-')
        || trimmed[token.end()..].trim_start().starts_with('-')
        || (trimmed.starts_with('(') && trimmed.ends_with(')'));

    let digits: String = token
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let digits = digits.trim_end_matches([',', '.']);

    let normalized = normalize_separators(digits);
    let value = Decimal::from_str(&normalized).ok()?;

    Some(if negative { -value } else { value })
}

fn normalize_separators(s: &str) -> String {
    let commas = s.matches(',').count();
    let dots = s.matches('.').count();

    match (commas, dots) {
        (0, 0) => s.to_string(),
        (c, d) if c > 0 && d > 0 => {
            let last_comma = s.rfind(',').unwrap_or(0);
            let last_dot = s.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                s.replace('.', "").replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
        (1, 0) | (0, 1) => {
            let sep = if commas == 1 { ',' } else { '.' };
            let pos = s.rfind(sep).unwrap_or(0);
            let (whole, fraction) = (&s[..pos], &s[pos + 1..]);
            // A group never starts with 0, so "0.125" keeps its decimals.
            if fraction.len() == 3 && !whole.is_empty() && !whole.starts_with('0') {
                s.replace(sep, "")
            } else {
                s.replace(sep, ".")
            }
        }
        _ => s.replace([',', '.'], ""),
    }
}

/// Format an amount with two decimals and comma grouping (1,234.56).
pub fn format_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount.abs());
    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((&s, "00"));

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    if amount.is_sign_negative() && !amount.is_zero() {
        formatted.push('-');
    }
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(*c);
    }

    format!("{}.{}", formatted, decimal_part)
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Option<Decimal>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, a numeric string, or null")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(Decimal::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(Decimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(E::custom(format!("non-finite amount {}", v)));
        }
        // Display prints the shortest round-trip form, so 0.1 stays 0.1.
        Decimal::from_str(&v.to_string())
            .map(Some)
            .map_err(|e| E::custom(format!("amount {} out of range: {}", v, e)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let trimmed = v.trim();
        if trimmed.is_empty() || trimmed == "-" {
            return Ok(None);
        }
        parse_amount(trimmed)
            .map(Some)
            .ok_or_else(|| E::custom(format!("invalid amount: {:?}", v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(AmountVisitor)
    }
}

/// Deserialize a required amount; null and blank become zero.
pub fn deserialize_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Decimal, D::Error> {
    Ok(d.deserialize_any(AmountVisitor)?.unwrap_or_default())
}

/// Deserialize an optional amount; null and blank become `None`.
pub fn deserialize_opt_amount<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<Decimal>, D::Error> {
    d.deserialize_any(AmountVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount_locales() {
        assert_eq!(parse_amount("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1 234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("12.50"), Some(dec("12.50")));
        assert_eq!(parse_amount("12,5"), Some(dec("12.5")));
        assert_eq!(parse_amount("1.000.000"), Some(dec("1000000")));
        assert_eq!(parse_amount("1.500"), Some(dec("1500")));
        assert_eq!(parse_amount("USD 2,000"), Some(dec("2000")));
    }

    #[test]
    fn test_parse_amount_leading_zero_is_decimal() {
        assert_eq!(parse_amount("0.125"), Some(dec("0.125")));
        assert_eq!(parse_amount("0,500"), Some(dec("0.5")));
        assert_eq!(parse_amount("-0.250"), Some(dec("-0.25")));
    }

    #[test]
    fn test_parse_amount_negative() {
        assert_eq!(parse_amount("-45.00"), Some(dec("-45.00")));
        assert_eq!(parse_amount("(12.50)"), Some(dec("-12.50")));
        assert_eq!(parse_amount("30.00-"), Some(dec("-30.00")));
    }

    #[test]
    fn test_parse_amount_rejects_blank() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("-"), None);
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec("1234.5")), "1,234.50");
        assert_eq!(format_amount(dec("12345678.90")), "12,345,678.90");
        assert_eq!(format_amount(dec("-100")), "-100.00");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
    }
}
