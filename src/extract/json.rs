//! Dot-path access into structured payloads.

use serde_json::Value;

use super::rules::parse_amount;

/// Extract a value from nested JSON using dot-notation path.
///
/// Numeric segments index arrays. Missing keys yield `Value::Null`.
pub fn extract_path<'a>(data: &'a Value, path: &str) -> &'a Value {
    if path.is_empty() {
        return data;
    }

    let mut current = data;
    for key in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(key).unwrap_or(&Value::Null),
            Value::Array(arr) => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| arr.get(idx))
                .unwrap_or(&Value::Null),
            _ => &Value::Null,
        };
    }

    current
}

/// A monetary amount, given as a JSON number or a formatted string.
pub fn as_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

/// Amount at `path`, looking inside `{ "amount": .. }` wrappers.
pub fn amount_at(data: &Value, path: &str) -> Option<f64> {
    let value = extract_path(data, path);
    as_amount(value).or_else(|| as_amount(&value["amount"]))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn walks_objects_and_arrays() {
        let data = json!({"a": {"items": [{"price": 10}, {"price": "1,250.50"}]}});
        assert_eq!(extract_path(&data, "a.items.0.price"), &json!(10));
        assert_eq!(amount_at(&data, "a.items.1.price"), Some(1250.5));
        assert!(extract_path(&data, "a.items.5.price").is_null());
        assert!(extract_path(&data, "a.missing.deep").is_null());
    }

    #[test]
    fn amount_unwraps_money_objects() {
        let data = json!({"total": {"amount": 99.5, "currency": "USD"}});
        assert_eq!(amount_at(&data, "total"), Some(99.5));
    }
}
