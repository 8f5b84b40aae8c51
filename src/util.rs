// Utility helpers for parsing and basic statistics.
//
// CSV number/flag handling and locale-aware formatting live here so the rest
// of the code can assume clean, typed values.
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed or is not finite.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an integer quantity. Decimal quantities are truncated the way the
/// export's integer column is read.
pub fn parse_quantity(s: Option<&str>) -> Option<i64> {
    let v = parse_f64_safe(s)?;
    Some(v.trunc() as i64)
}

/// Read a yes/no flag. Unknown spellings yield `None` rather than `false`.
pub fn parse_flag(s: Option<&str>) -> Option<bool> {
    match s?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "si" | "sí" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Value-weighted mean of `(weight, value)` pairs; 0 when the total weight is 0.
pub fn weighted_mean<I>(pairs: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (total, weighted) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(t, w), (weight, value)| (t + weight, w + weight * value));
    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Counts in console messages, e.g. `9,855 rows loaded`.
    n.to_formatted_string(&Locale::en)
}

/// Chilean peso amount with no decimals, e.g. `$1.234.567`.
pub fn format_clp(n: f64) -> String {
    let rounded = n.round();
    let int_val = rounded.abs() as i64;
    let body = int_val.to_formatted_string(&Locale::es);
    if rounded < 0.0 {
        format!("-${}", body)
    } else {
        format!("${}", body)
    }
}

/// Percentage with one decimal, e.g. `12.5%`.
pub fn format_percent(p: f64) -> String {
    format!("{:.1}%", p)
}
