use regex::Regex;
use serde_json::{Map, Value};

/// Clear every form control in the tree: input `value` becomes `""`, switch
/// `value` becomes `false`, slider `value` snaps back to `min` (or 0).
pub fn reset_form(tree: &Value) -> Value {
    match tree {
        Value::Array(items) => Value::Array(items.iter().map(reset_form).collect()),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let reset = match (key.as_str(), value) {
                    ("input", Value::Object(props)) => with_value(props, Value::String(String::new())),
                    ("switch", Value::Object(props)) => with_value(props, Value::Bool(false)),
                    ("slider", Value::Object(props)) => {
                        let min = props
                            .get("min")
                            .filter(|m| m.as_f64().map_or(false, |n| n != 0.0))
                            .cloned()
                            .unwrap_or_else(|| Value::from(0));
                        with_value(props, min)
                    }
                    _ => reset_form(value),
                };
                out.insert(key.clone(), reset);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn with_value(props: &Map<String, Value>, value: Value) -> Value {
    let mut props = props.clone();
    props.insert("value".to_string(), value);
    Value::Object(props)
}

/// Gather `{label: value}` pairs from every labelled control in the tree.
///
/// Inputs always contribute (missing value reads as `""`); switches and
/// sliders only when they carry a value. Later controls override earlier
/// ones with the same label.
pub fn collect_form_data(tree: &Value) -> Map<String, Value> {
    let mut data = Map::new();
    collect_into(tree, &mut data);
    data
}

fn collect_into(node: &Value, data: &mut Map<String, Value>) {
    let Value::Object(map) = node else {
        if let Value::Array(items) = node {
            items.iter().for_each(|item| collect_into(item, data));
        }
        return;
    };

    if let Some((label, props)) = labelled(map, "input") {
        let value = props
            .get("value")
            .filter(|v| truthy(v))
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()));
        data.insert(label, value);
    }
    for tag in ["switch", "slider"] {
        if let Some((label, props)) = labelled(map, tag) {
            if let Some(value) = props.get("value").filter(|v| !v.is_null()) {
                data.insert(label, value.clone());
            }
        }
    }

    for value in map.values() {
        match value {
            Value::Array(items) => items.iter().for_each(|item| collect_into(item, data)),
            Value::Object(_) => collect_into(value, data),
            _ => {}
        }
    }
}

fn labelled<'m>(map: &'m Map<String, Value>, tag: &str) -> Option<(String, &'m Map<String, Value>)> {
    let props = map.get(tag)?.as_object()?;
    let label = props.get("label")?.as_str().filter(|l| !l.is_empty())?;
    Some((label.to_string(), props))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Check an input's current value against its `validation` rules.
///
/// Returns the first failing rule's message, or `None` when the value passes
/// or the input declares no rules.
pub fn check_input(props: &Map<String, Value>) -> Option<String> {
    let rules = props.get("validation")?.as_object()?;
    let value = props.get("value").and_then(Value::as_str).unwrap_or("");
    let custom = rules.get("errorMessage").and_then(Value::as_str).filter(|m| !m.is_empty());
    let length = value.chars().count();

    if rules.get("required").and_then(Value::as_bool).unwrap_or(false) && value.trim().is_empty() {
        return Some(custom.unwrap_or("This field is required").to_string());
    }
    if let Some(min) = positive_limit(rules.get("minLength")) {
        if (length as f64) < min {
            return Some(format!("Minimum {} characters required", min));
        }
    }
    if let Some(max) = positive_limit(rules.get("maxLength")) {
        if (length as f64) > max {
            return Some(format!("Maximum {} characters allowed", max));
        }
    }
    if let Some(pattern) = rules.get("pattern").and_then(Value::as_str).filter(|p| !p.is_empty()) {
        match Regex::new(pattern) {
            Ok(re) if !re.is_match(value) => {
                return Some(custom.unwrap_or("Invalid format").to_string());
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(pattern, error = %err, "ignoring invalid validation pattern"),
        }
    }
    None
}

fn positive_limit(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|n| *n > 0.0)
}
