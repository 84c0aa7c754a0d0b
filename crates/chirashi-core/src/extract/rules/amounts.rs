//! Reading numeric tokens as yen amounts.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::patterns::{DANGLING_GROUP, NUMERIC_TOKEN, SEPARATED_DIGITS};

/// A numeric token that reads as a possible price.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericReading {
    pub value: Decimal,
    /// Digits before the decimal point.
    pub integer_digits: usize,
    /// "円" suffix or "¥" prefix inside the token itself.
    pub has_currency: bool,
    /// Plain 1-3 digit run without separators, a candidate for a split
    /// thousands group.
    pub bare_group: bool,
}

/// Why a numeric token is not a price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonPrice {
    /// Digits joined by `/`, `:`, `-` or `.` ("2024/03/15", "10:00").
    DateOrTime,
    /// Long or zero-led digit run.
    PhoneNumber,
    /// "%" or "割" suffix.
    Percentage,
    /// Quantity suffix such as "2L" or "3本".
    Quantity(String),
    /// A thousands group with nothing after its comma ("1,").
    DanglingGroup,
    /// Does not read as a number at all.
    Unreadable,
}

impl fmt::Display for NonPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NonPrice::DateOrTime => write!(f, "date or time"),
            NonPrice::PhoneNumber => write!(f, "phone number"),
            NonPrice::Percentage => write!(f, "percentage"),
            NonPrice::Quantity(unit) => write!(f, "quantity in {}", unit),
            NonPrice::DanglingGroup => write!(f, "dangling thousands group"),
            NonPrice::Unreadable => write!(f, "not a number"),
        }
    }
}

/// Classify a normalized numeric token.
pub fn read_numeric(text: &str, max_digits: usize) -> Result<NumericReading, NonPrice> {
    if DANGLING_GROUP.is_match(text) {
        return Err(NonPrice::DanglingGroup);
    }
    if SEPARATED_DIGITS.is_match(text) {
        let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
        if text.contains('-') && digits > max_digits {
            return Err(NonPrice::PhoneNumber);
        }
        return Err(NonPrice::DateOrTime);
    }

    let caps = NUMERIC_TOKEN.captures(text).ok_or(NonPrice::Unreadable)?;
    let number = &caps["num"];
    let suffix = caps.name("suffix").map(|m| m.as_str());

    match suffix {
        Some("%") | Some("割") => return Err(NonPrice::Percentage),
        Some("円") | None => {}
        Some(unit) => return Err(NonPrice::Quantity(unit.to_string())),
    }

    let integer_part: String = number
        .split('.')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if integer_part.len() > max_digits {
        return Err(NonPrice::PhoneNumber);
    }
    if integer_part.len() > 1 && integer_part.starts_with('0') {
        return Err(NonPrice::PhoneNumber);
    }

    let value = parse_yen_amount(number).ok_or(NonPrice::Unreadable)?;
    let has_currency = suffix == Some("円") || caps.name("yen").is_some();

    Ok(NumericReading {
        value,
        integer_digits: integer_part.len(),
        has_currency,
        bare_group: !has_currency && number.chars().all(|c| c.is_ascii_digit()) && number.len() <= 3,
    })
}

/// Parse a yen amount such as "1,980" or "213.84".
pub fn parse_yen_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() || cleaned.matches('.').count() > 1 {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Whole yen, truncating any fractional part.
pub fn whole_yen(value: Decimal) -> Option<i64> {
    value.trunc().to_i64()
}

/// Format an amount the way flyers print it (1,980円).
pub fn format_yen(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}{}円", sign, grouped)
}
