//! Text normalization for scraped field values.
//!
//! Every parser here is total: malformed input degrades to `None` rather
//! than failing the surrounding record.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d(?:[\d.,]*\d)?").expect("valid price regex"));
static RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)").expect("valid rating regex"));

/// Collapses runs of whitespace into single spaces and trims the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a displayed price such as `"$1,299.99"` into a [`Decimal`].
///
/// The first numeric token wins, so surrounding words, currency symbols and
/// ranges (`"$19.99 - $24.99"`) are ignored. Both `1,299.99` and `1.299,99`
/// groupings are understood. The amount is negative only when a `-` sits
/// directly before the number or its currency symbol; negative, empty or
/// unparseable input yields `None`.
#[must_use]
pub fn parse_price(text: &str) -> Option<Decimal> {
    let token = PRICE_RE.find(text)?;
    let value = Decimal::from_str(&canonical_amount(token.as_str())).ok()?;

    let before_symbol = text[..token.start()].trim_end_matches(|c: char| {
        !c.is_alphanumeric() && !c.is_whitespace() && !matches!(c, '-' | '.' | ',')
    });
    if before_symbol.ends_with('-') && !value.is_zero() {
        return None;
    }
    Some(value.round_dp(2))
}

/// Rewrites a grouped number with `.` as the only decimal separator.
///
/// With both separators present the last one is the decimal mark. A lone
/// `,` is a thousands separator when every group after it has three digits,
/// as are repeated `.`s.
fn canonical_amount(token: &str) -> String {
    let last_dot = token.rfind('.');
    let last_comma = token.rfind(',');

    match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => token.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => token.replace(',', ""),
        (None, Some(_)) => {
            if token.split(',').skip(1).all(|group| group.len() == 3) {
                token.replace(',', "")
            } else {
                token.replace(',', ".")
            }
        }
        (Some(_), None) if token.matches('.').count() > 1 => token.replace('.', ""),
        _ => token.to_owned(),
    }
}

/// Parses the leading number of a rating string such as
/// `"4.5 out of 5 stars"`.
///
/// Values outside `0..=5` are rejected.
#[must_use]
pub fn parse_rating(text: &str) -> Option<Decimal> {
    let caps = RATING_RE.captures(text)?;
    let value = Decimal::from_str(caps.get(1)?.as_str()).ok()?;
    if value > Decimal::from(5) {
        return None;
    }
    Some(value.round_dp(2))
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
