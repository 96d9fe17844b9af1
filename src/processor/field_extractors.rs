use serde_json::{Map, Value};

use super::numeric::clean_numeric_value;

/// Separator OpenFoodFacts appends before the site name in page titles.
const OFF_TITLE_SEPARATOR: &str = " – ";

/// A text field that may be missing, a single string, or a list of strings.
#[derive(Debug, Clone, PartialEq)]
pub enum TextField {
    Absent,
    Single(String),
    List(Vec<String>),
}

impl TextField {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => match non_blank(s) {
                Some(s) => TextField::Single(s),
                None => TextField::Absent,
            },
            Some(Value::Number(n)) => TextField::Single(n.to_string()),
            Some(Value::Array(items)) => {
                let items: Vec<String> = items.iter().filter_map(scalar_text).collect();
                if items.is_empty() {
                    TextField::Absent
                } else {
                    TextField::List(items)
                }
            }
            _ => TextField::Absent,
        }
    }

    /// Comma-split, trimmed, non-empty items.
    pub fn into_list(self) -> Option<Vec<String>> {
        let items: Vec<String> = match self {
            TextField::Absent => return None,
            TextField::Single(s) => split_items(&s),
            TextField::List(items) => items.iter().flat_map(|s| split_items(s)).collect(),
        };

        if items.is_empty() { None } else { Some(items) }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            TextField::Absent => None,
            TextField::Single(s) => Some(s),
            TextField::List(items) => Some(items.join(", ")),
        }
    }
}

fn split_items(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A trimmed, non-blank string (numbers are rendered as text).
pub fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(scalar_text)
}

/// First key in `keys` holding a non-blank value.
pub fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text_field(obj, key))
}

/// First key in `keys` holding any usable value, as a `TextField`.
pub fn first_text_field(obj: &Map<String, Value>, keys: &[&str]) -> TextField {
    keys.iter()
        .map(|key| TextField::from_value(obj.get(*key)))
        .find(|field| *field != TextField::Absent)
        .unwrap_or(TextField::Absent)
}

/// Drops the " – site name" suffix from an OpenFoodFacts page title.
pub fn clean_off_title(title: &str) -> Option<String> {
    let head = title.split(OFF_TITLE_SEPARATOR).next().unwrap_or(title);
    non_blank(head)
}

/// Integer part of a serving count; zero or negative counts are treated as missing.
pub fn extract_serving_count(value: Option<&Value>) -> Option<i64> {
    let count = clean_numeric_value(value?)?.trunc() as i64;
    (count > 0).then_some(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_field_shapes() {
        assert_eq!(TextField::from_value(None), TextField::Absent);
        assert_eq!(TextField::from_value(Some(&json!(null))), TextField::Absent);
        assert_eq!(TextField::from_value(Some(&json!("  "))), TextField::Absent);
        assert_eq!(TextField::from_value(Some(&json!([]))), TextField::Absent);
        assert_eq!(TextField::from_value(Some(&json!({"a": 1}))), TextField::Absent);
        assert_eq!(
            TextField::from_value(Some(&json!(" Lácteos "))),
            TextField::Single("Lácteos".to_string())
        );
        assert_eq!(
            TextField::from_value(Some(&json!(["a", null, " b "]))),
            TextField::List(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_list_normalization() {
        let single = TextField::Single("Lácteos, Leches ,, Leches enteras".to_string());
        assert_eq!(
            single.into_list(),
            Some(vec![
                "Lácteos".to_string(),
                "Leches".to_string(),
                "Leches enteras".to_string()
            ])
        );

        let list = TextField::List(vec!["Leche, Soja".to_string(), "Gluten".to_string()]);
        assert_eq!(
            list.into_list(),
            Some(vec!["Leche".to_string(), "Soja".to_string(), "Gluten".to_string()])
        );

        assert_eq!(TextField::Single(" , ".to_string()).into_list(), None);
        assert_eq!(TextField::Absent.into_list(), None);
    }

    #[test]
    fn test_into_text() {
        let list = TextField::List(vec!["Pascual".to_string(), "Hacendado".to_string()]);
        assert_eq!(list.into_text(), Some("Pascual, Hacendado".to_string()));
        assert_eq!(TextField::Absent.into_text(), None);
    }

    #[test]
    fn test_first_text_skips_blank() {
        let obj = json!({"pais_origen": "", "lugar_procedencia": "España"});
        let obj = obj.as_object().unwrap();
        assert_eq!(
            first_text(obj, &["pais_origen", "lugar_procedencia"]),
            Some("España".to_string())
        );
        assert_eq!(first_text(obj, &["otro"]), None);
    }

    #[test]
    fn test_clean_off_title() {
        assert_eq!(
            clean_off_title("Leche entera – Open Food Facts"),
            Some("Leche entera".to_string())
        );
        assert_eq!(clean_off_title("Yogur natural"), Some("Yogur natural".to_string()));
        assert_eq!(clean_off_title(" – Open Food Facts"), None);
    }

    #[test]
    fn test_serving_count() {
        assert_eq!(extract_serving_count(Some(&json!("4"))), Some(4));
        assert_eq!(extract_serving_count(Some(&json!(2.7))), Some(2));
        assert_eq!(extract_serving_count(Some(&json!("0"))), None);
        assert_eq!(extract_serving_count(Some(&json!("aprox. 6 raciones"))), Some(6));
        assert_eq!(extract_serving_count(None), None);
    }
}
