//! Dot-path addressing into a UI tree and copy-on-write patching.
//!
//! Paths are rooted at the sentinel `root`: `root.container.children.0.button`
//! addresses the props of the first child. Numeric segments index arrays,
//! other segments look up object keys. Patches never mutate their input; each
//! returns a new tree.

use serde_json::{Map, Value};

use crate::components::ComponentTag;
use crate::error::{type_name, TreeError, TreeResult};

pub const ROOT: &str = "root";

/// Strip the leading `root` sentinel. The empty string addresses the tree root.
pub fn normalize(path: &str) -> &str {
    if path == ROOT {
        ""
    } else if let Some(rest) = path.strip_prefix("root.") {
        rest
    } else {
        path
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    normalize(path).split('.').filter(|s| !s.is_empty())
}

fn index_of(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Resolve `path` against `tree`.
pub fn get_by_path<'t>(tree: &'t Value, path: &str) -> Option<&'t Value> {
    segments(path).try_fold(tree, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => index_of(segment).and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Return a copy of `tree` with `value` written at `path`.
///
/// Missing or scalar intermediates become arrays for numeric segments and
/// objects otherwise. Writing past the end of an array pads with `null`.
pub fn set_by_path(tree: &Value, path: &str, value: Value) -> Value {
    let segs: Vec<&str> = segments(path).collect();
    set_segments(Some(tree), &segs, value)
}

fn set_segments(current: Option<&Value>, segs: &[&str], value: Value) -> Value {
    let Some((segment, rest)) = segs.split_first() else {
        return value;
    };

    match current {
        Some(Value::Array(items)) => match index_of(segment) {
            Some(i) => Value::Array(write_index(items.clone(), i, rest, value)),
            // A key on an array cannot be represented; turn it into an object.
            None => write_key(Map::new(), segment, rest, value),
        },
        Some(Value::Object(map)) => write_key(map.clone(), segment, rest, value),
        _ => match index_of(segment) {
            Some(i) => Value::Array(write_index(Vec::new(), i, rest, value)),
            None => write_key(Map::new(), segment, rest, value),
        },
    }
}

fn write_index(mut items: Vec<Value>, i: usize, rest: &[&str], value: Value) -> Vec<Value> {
    let child = set_segments(items.get(i), rest, value);
    if i < items.len() {
        items[i] = child;
    } else {
        items.resize(i, Value::Null);
        items.push(child);
    }
    items
}

fn write_key(mut map: Map<String, Value>, key: &str, rest: &[&str], value: Value) -> Value {
    let child = set_segments(map.get(key), rest, value);
    map.insert(key.to_string(), child);
    Value::Object(map)
}

/// Shallow-merge `partial` into the object at `path`.
pub fn merge_at_path(tree: &Value, path: &str, partial: &Map<String, Value>) -> TreeResult<Value> {
    let existing = get_by_path(tree, path).ok_or_else(|| TreeError::PathNotFound {
        path: path.to_string(),
    })?;
    let Value::Object(existing) = existing else {
        return Err(TreeError::NotAnObject {
            path: path.to_string(),
            found: type_name(existing),
        });
    };

    let mut merged = existing.clone();
    for (key, value) in partial {
        merged.insert(key.clone(), value.clone());
    }
    Ok(set_by_path(tree, path, Value::Object(merged)))
}

/// Splice a replacement node into `tree`.
///
/// When `path` ends in a component tag it addresses props. A replacement
/// under the same tag writes only its props there; one under a different
/// tag replaces the whole node at the parent path; anything else is taken
/// as bare props. Other paths get the whole replacement.
pub fn splice_node(tree: &Value, path: &str, replacement: Value) -> Value {
    if normalize(path).is_empty() {
        return replacement;
    }
    let Some(tag) = tag_at(path) else {
        return set_by_path(tree, path, replacement);
    };

    let replacement_tag = match &replacement {
        Value::Object(node) if node.len() == 1 => {
            node.keys().next().and_then(|key| ComponentTag::from_key(key))
        }
        _ => None,
    };
    match (replacement_tag, replacement) {
        (Some(new_tag), Value::Object(node)) if new_tag == tag => {
            let props = node.into_iter().next().map(|(_, props)| props).unwrap_or(Value::Null);
            set_by_path(tree, path, props)
        }
        (Some(_), node) => match parent(path) {
            Some(node_path) => set_by_path(tree, &node_path, node),
            None => node,
        },
        (None, props) => set_by_path(tree, path, props),
    }
}

/// Component tag named by the last segment, when it names one.
pub fn tag_at(path: &str) -> Option<ComponentTag> {
    segments(path).last().and_then(ComponentTag::from_key)
}

/// Drop the last segment. The parent of a top-level segment is `root`.
pub fn parent(path: &str) -> Option<String> {
    let normalized = normalize(path);
    if normalized.is_empty() {
        return None;
    }
    match normalized.rsplit_once('.') {
        Some((head, _)) => Some(join(ROOT, head)),
        None => Some(ROOT.to_string()),
    }
}

pub fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else if segment.is_empty() {
        path.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Value {
        json!({"container": {"children": [
            {"text": {"content": "a"}},
            {"button": {"label": "Go"}}
        ]}})
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("root"), "");
        assert_eq!(normalize("root.container"), "container");
        assert_eq!(normalize("container.children"), "container.children");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_get_by_path() {
        let t = tree();
        assert_eq!(get_by_path(&t, "root"), Some(&t));
        assert_eq!(
            get_by_path(&t, "root.container.children.1.button.label"),
            Some(&json!("Go"))
        );
        assert_eq!(get_by_path(&t, "root.container.children.7"), None);
        assert_eq!(get_by_path(&t, "root.container.children.x"), None);
        assert_eq!(get_by_path(&t, "root.card.title"), None);
    }

    #[test]
    fn test_set_by_path_is_copy_on_write() {
        let t = tree();
        let next = set_by_path(&t, "root.container.children.0.text.content", json!("b"));
        assert_eq!(get_by_path(&t, "container.children.0.text.content"), Some(&json!("a")));
        assert_eq!(get_by_path(&next, "container.children.0.text.content"), Some(&json!("b")));
        assert_eq!(get_by_path(&next, "container.children.1"), get_by_path(&t, "container.children.1"));
    }

    #[test]
    fn test_set_creates_intermediates_and_pads() {
        let next = set_by_path(&json!({}), "a.2.b", json!(1));
        assert_eq!(next, json!({"a": [null, null, {"b": 1}]}));
        let replaced = set_by_path(&json!({"a": 5}), "a.k", json!(true));
        assert_eq!(replaced, json!({"a": {"k": true}}));
    }

    #[test]
    fn test_set_empty_path_replaces_tree() {
        assert_eq!(set_by_path(&tree(), "root", json!({"badge": {}})), json!({"badge": {}}));
    }

    #[test]
    fn test_set_of_get_is_noop() {
        let t = tree();
        for path in ["root", "root.container", "root.container.children.1.button", "container.children.0"] {
            let current = get_by_path(&t, path).cloned().unwrap();
            assert_eq!(set_by_path(&t, path, current), t);
        }
    }

    #[test]
    fn test_merge_at_path() {
        let t = tree();
        let mut partial = Map::new();
        partial.insert("label".into(), json!("Stop"));
        partial.insert("variant".into(), json!("danger"));
        let next = merge_at_path(&t, "root.container.children.1.button", &partial).unwrap();
        assert_eq!(
            get_by_path(&next, "container.children.1.button"),
            Some(&json!({"label": "Stop", "variant": "danger"}))
        );
    }

    #[test]
    fn test_merge_errors() {
        let t = tree();
        let partial = Map::new();
        assert_eq!(
            merge_at_path(&t, "root.card", &partial),
            Err(TreeError::PathNotFound { path: "root.card".into() })
        );
        assert_eq!(
            merge_at_path(&t, "root.container.children.0.text.content", &partial),
            Err(TreeError::NotAnObject {
                path: "root.container.children.0.text.content".into(),
                found: "string"
            })
        );
    }

    #[test]
    fn test_splice_node_at_props_and_node_paths() {
        let t = tree();
        let fixed = json!({"button": {"label": "Fixed"}});
        let at_props = splice_node(&t, "root.container.children.1.button", fixed.clone());
        let at_node = splice_node(&t, "root.container.children.1", fixed.clone());
        assert_eq!(at_props, at_node);
        assert_eq!(get_by_path(&at_node, "container.children.1"), Some(&fixed));
        assert_eq!(splice_node(&t, "root", fixed.clone()), fixed);
    }

    #[test]
    fn test_splice_node_keeps_a_changed_tag() {
        let t = tree();
        let card = json!({"card": {"title": "Fresh"}});
        let next = splice_node(&t, "root.container.children.1.button", card.clone());
        assert_eq!(get_by_path(&next, "container.children.1"), Some(&card));
        assert_eq!(get_by_path(&next, "container.children.1.button"), None);
        assert_eq!(
            get_by_path(&next, "container.children.0"),
            get_by_path(&t, "container.children.0")
        );

        let top = json!({"text": {"content": "x"}});
        let root_level = splice_node(&json!({"button": {"label": "Go"}}), "root.button", top.clone());
        assert_eq!(root_level, top);
    }

    #[test]
    fn test_splice_node_bare_props() {
        let t = tree();
        let next = splice_node(&t, "root.container.children.1.button", json!({"label": "Only"}));
        assert_eq!(
            get_by_path(&next, "container.children.1"),
            Some(&json!({"button": {"label": "Only"}}))
        );
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(tag_at("root.container.children.0.button"), Some(ComponentTag::Button));
        assert_eq!(tag_at("root.container.children.0"), None);
        assert_eq!(parent("root.container.children.0").as_deref(), Some("root.container.children"));
        assert_eq!(parent("root.container").as_deref(), Some("root"));
        assert_eq!(parent("root"), None);
        assert_eq!(join("root", "card"), "root.card");
    }
}
