// Parsing and formatting helpers.
//
// Raw cell values from CSV or loosely-typed JSON are cleaned here so the
// normalizer can hand typed values to the rest of the crate.
use num_format::{Locale, ToFormattedString};

/// Parse a currency-ish cell into `f64`.
///
/// Everything except ASCII digits, `.` and `-` is stripped first, so
/// `"$12,500"` and `" 12500 "` both read as `12500.0`. Blank input, or
/// input with nothing numeric left after stripping, is `None` rather than
/// zero so "not entered" stays distinguishable from "entered as 0".
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// True when the cell holds anything other than whitespace.
pub fn is_present(s: Option<&str>) -> bool {
    s.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Trimmed owned text, empty when missing.
pub fn text(s: Option<&str>) -> String {
    s.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Split a comma-separated multi-value cell into trimmed, non-empty,
/// de-duplicated tokens in first-seen order.
pub fn split_multi(s: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in s.unwrap_or("").split(',') {
        let token = token.trim();
        if token.is_empty() || out.iter().any(|t| t == token) {
            continue;
        }
        out.push(token.to_string());
    }
    out
}

pub fn parse_bool(s: Option<&str>) -> Option<bool> {
    let s = s?.trim();
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Render an optional number for CSV: unset is an empty cell, never `0`
/// or `NaN`.
pub fn format_optional(n: Option<f64>) -> String {
    match n {
        Some(v) if v.is_finite() => format!("{}", v),
        _ => String::new(),
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with locale thousands separators, e.g. `1,234,567.89`.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_val: i64 = parts.next().unwrap_or("0").parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = parts.next() {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_currency_formatting() {
        assert_eq!(parse_f64_safe(Some("$12,500")), Some(12500.0));
        assert_eq!(parse_f64_safe(Some(" 3.5 ")), Some(3.5));
        assert_eq!(parse_f64_safe(Some("-40")), Some(-40.0));
    }

    #[test]
    fn blank_or_garbage_is_unset_not_zero() {
        assert_eq!(parse_f64_safe(None), None);
        assert_eq!(parse_f64_safe(Some("   ")), None);
        assert_eq!(parse_f64_safe(Some("TBD")), None);
        assert_eq!(parse_f64_safe(Some("0")), Some(0.0));
    }

    #[test]
    fn multi_values_are_trimmed_and_deduplicated() {
        assert_eq!(
            split_multi(Some(" a, b ,,a, c ")),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(split_multi(None).is_empty());
    }

    #[test]
    fn optional_numbers_render_empty_when_unset() {
        assert_eq!(format_optional(None), "");
        assert_eq!(format_optional(Some(f64::NAN)), "");
        assert_eq!(format_optional(Some(1500.0)), "1500");
        assert_eq!(format_optional(Some(12.25)), "12.25");
    }

    #[test]
    fn formats_with_thousands_separators() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-500.0, 0), "-500");
        assert_eq!(format_int(9855), "9,855");
    }
}
