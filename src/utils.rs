use crate::schema::{CellValue, Thresholds};
use chrono::{Datelike, Local, NaiveDate};

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹'];

/// Parses a free-form amount such as `"$1,234.56"`, `"(1,200)"` or `"-42"`.
///
/// A value wrapped in parentheses is negative. Anything that still fails to
/// parse after currency symbols, thousands separators and quotes are removed
/// yields `0.0`, as does a non-finite result.
pub fn parse_amount(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| {
            !CURRENCY_SYMBOLS.contains(c) && *c != ',' && *c != '"' && !c.is_whitespace()
        })
        .collect();

    let wrapped = cleaned.starts_with('(') && cleaned.ends_with(')');
    let digits: String = cleaned.chars().filter(|c| *c != '(' && *c != ')').collect();

    let value = digits
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);

    if wrapped {
        -value
    } else {
        value
    }
}

/// Normalizes a raw cell: numbers pass through untouched, text goes through
/// [`parse_amount`].
pub fn normalize_cell(cell: &CellValue) -> f64 {
    match cell {
        CellValue::Number(n) if n.is_finite() => *n,
        CellValue::Number(_) => 0.0,
        CellValue::Text(s) => parse_amount(s),
    }
}

/// Percent variance with the fixed division-by-zero policy: a zero budget
/// always reports 0%.
pub fn percent_variance(budget: f64, dollar_variance: f64) -> f64 {
    if budget == 0.0 {
        0.0
    } else {
        dollar_variance / budget * 100.0
    }
}

/// Either threshold alone flags the variance.
pub fn exceeds_thresholds(dollar_variance: f64, percent_variance: f64, thresholds: &Thresholds) -> bool {
    percent_variance.abs() > thresholds.variance_threshold_percent
        || dollar_variance.abs() > thresholds.variance_threshold_dollar
}

pub fn current_month() -> i32 {
    Local::now().month() as i32
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Strips one layer of matching single or double quotes.
pub fn strip_quotes(field: &str) -> &str {
    for quote in ['"', '\''] {
        if field.len() >= 2 && field.starts_with(quote) && field.ends_with(quote) {
            return &field[1..field.len() - 1];
        }
    }
    field
}
