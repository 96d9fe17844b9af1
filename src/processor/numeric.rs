use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Unit and symbol tokens removed before extracting the number, in removal order.
pub const NUMERIC_CLEAN_TOKENS: [&str; 12] = [
    "kcal", "kj", "cal", "g", "mg", "kg", "l", "ml", "cl", "€", "%", "x",
];

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d*\.?\d+").expect("valid number regex"));

// "1.580", "2.000.000": dot-grouped integers with a non-zero leading group
static DOT_THOUSANDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[1-9]\d{0,2}(?:\.\d{3})+\b").expect("valid thousands regex"));

/// Parses a JSON scalar into a number. Strings may use a decimal comma,
/// thousands separators and trailing units; anything unparseable is `None`.
pub fn clean_numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => clean_numeric_str(s),
        _ => None,
    }
}

pub fn clean_numeric_str(raw: &str) -> Option<f64> {
    let mut text = raw.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }

    // Units go first so that a glued "kj" cannot hide a thousands group
    for token in NUMERIC_CLEAN_TOKENS {
        text = text.replace(token, "");
    }
    let text = resolve_separators(&text);

    NUMBER_RE
        .find(&text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Rewrites the string so that `.` is the only decimal separator.
fn resolve_separators(text: &str) -> String {
    let last_dot = text.rfind('.');
    let last_comma = text.rfind(',');

    match (last_dot, last_comma) {
        // Both present: whichever comes last is the decimal separator
        (Some(dot), Some(comma)) if comma > dot => text.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => text.replace(',', ""),
        (Some(_), None) => DOT_THOUSANDS_RE
            .replace_all(text, |caps: &regex::Captures| caps[0].replace('.', ""))
            .into_owned(),
        (None, Some(_)) => text.replace(',', "."),
        (None, None) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(clean_numeric_value(&Value::Null), None);
        assert_eq!(clean_numeric_value(&json!(3)), Some(3.0));
        assert_eq!(clean_numeric_value(&json!(2.5)), Some(2.5));
        assert_eq!(clean_numeric_value(&json!("abc")), None);
        assert_eq!(clean_numeric_value(&json!(true)), None);
        assert_eq!(clean_numeric_value(&json!([1, 2])), None);
        assert_eq!(clean_numeric_value(&json!({"v": 1})), None);
        assert_eq!(clean_numeric_value(&json!("")), None);
        assert_eq!(clean_numeric_value(&json!("   ")), None);
    }

    #[test]
    fn test_european_decimal_with_units() {
        let cases = [
            ("12,5 kg", 12.5),
            ("0,5 l", 0.5),
            ("3,25 €", 3.25),
            ("1,2 g", 1.2),
            ("45,8 kcal", 45.8),
            ("7,5 %", 7.5),
            ("250 ml", 250.0),
        ];

        for (raw, expected) in cases {
            assert_eq!(clean_numeric_str(raw), Some(expected), "input {:?}", raw);
            let dotted = expected.to_string();
            assert_eq!(clean_numeric_str(raw), clean_numeric_str(&dotted));
        }
    }

    #[test]
    fn test_unit_glued_to_number() {
        assert_eq!(clean_numeric_str("120g"), Some(120.0));
        assert_eq!(clean_numeric_str("2x"), Some(2.0));
        assert_eq!(clean_numeric_str("1580kJ"), Some(1580.0));
    }

    #[test]
    fn test_thousands_with_glued_unit() {
        assert_eq!(clean_numeric_str("1.580kJ"), Some(1580.0));
        assert_eq!(clean_numeric_str("1.580kJ"), clean_numeric_str("1.580 kJ"));
        assert_eq!(clean_numeric_str("2.000g"), Some(2000.0));
        assert_eq!(clean_numeric_str("2.000g"), clean_numeric_str("2.000 g"));
        assert_eq!(clean_numeric_str("1,5g"), Some(1.5));
    }

    #[test]
    fn test_thousands_separators() {
        assert_eq!(clean_numeric_str("1.580"), Some(1580.0));
        assert_eq!(clean_numeric_str("2.000.000"), Some(2_000_000.0));
        assert_eq!(clean_numeric_str("1.234,56"), Some(1234.56));
        assert_eq!(clean_numeric_str("1,234.56"), Some(1234.56));
        assert_eq!(clean_numeric_str("0.125"), Some(0.125));
        assert_eq!(clean_numeric_str("1.5"), Some(1.5));
        assert_eq!(clean_numeric_str("12.34"), Some(12.34));
    }

    #[test]
    fn test_signs_and_leading_dot() {
        assert_eq!(clean_numeric_str("-3,5"), Some(-3.5));
        assert_eq!(clean_numeric_str(".5"), Some(0.5));
        assert_eq!(clean_numeric_str("< 0,5 g"), Some(0.5));
    }
}
