use serde_json::{Map, Value};

use crate::components::{ComponentTag, UiNode};
use crate::error::{type_name, Issue, NodeError};
use crate::registry::{self, Field, Kind, Presence};

pub const MAX_NESTING_DEPTH: usize = 32;

/// Outcome of validating one candidate node.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(UiNode),
    /// `null` or `{}`: renders as nothing, never an error.
    Empty,
    Invalid(NodeError),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    pub fn node(&self) -> Option<&UiNode> {
        match self {
            Validation::Valid(node) => Some(node),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&NodeError> {
        match self {
            Validation::Invalid(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Option<UiNode>, NodeError> {
        match self {
            Validation::Valid(node) => Ok(Some(node)),
            Validation::Empty => Ok(None),
            Validation::Invalid(err) => Err(err),
        }
    }
}

/// A nested node position left unvalidated by a shallow pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Dot path relative to the owning node's props, e.g. `children.2` or
    /// `items.0.content.1`.
    pub path: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Nested nodes are validated and normalized recursively.
    Deep,
    /// Nested nodes are collected as slots for the caller.
    Shallow,
}

/// Validate a candidate node and every node nested under it.
///
/// Total over any JSON input: never panics, always returns a classification.
pub fn validate(candidate: &Value) -> Validation {
    validate_node(candidate, 0, Mode::Deep).0
}

/// Validate only the node's own props; nested nodes come back as slots.
pub fn validate_shallow(candidate: &Value) -> (Validation, Vec<Slot>) {
    validate_node(candidate, 0, Mode::Shallow)
}

/// Shallow validation at an explicit depth, for tree walkers that track it.
pub(crate) fn validate_shallow_at(candidate: &Value, depth: usize) -> (Validation, Vec<Slot>) {
    validate_node(candidate, depth, Mode::Shallow)
}

fn validate_node(candidate: &Value, depth: usize, mode: Mode) -> (Validation, Vec<Slot>) {
    if depth > MAX_NESTING_DEPTH {
        return (
            Validation::Invalid(NodeError::MaxNestingDepthExceeded {
                max_depth: MAX_NESTING_DEPTH,
            }),
            Vec::new(),
        );
    }

    let object = match candidate {
        Value::Null => return (Validation::Empty, Vec::new()),
        Value::Object(object) if object.is_empty() => return (Validation::Empty, Vec::new()),
        Value::Object(object) => object,
        other => {
            return (
                Validation::Invalid(NodeError::NotAnObject {
                    found: type_name(other),
                }),
                Vec::new(),
            )
        }
    };

    let keys: Vec<String> = object.keys().cloned().collect();
    let Some(tag) = keys.iter().find_map(|k| ComponentTag::from_key(k)) else {
        let tag = keys.first().cloned().unwrap_or_default();
        tracing::debug!(tag = %tag, "unknown component");
        return (
            Validation::Invalid(NodeError::UnknownComponent { tag, keys }),
            Vec::new(),
        );
    };

    let mut walker = Walker {
        depth,
        mode,
        issues: Vec::new(),
        slots: Vec::new(),
    };
    let props = walker.props(tag, &object[tag.as_str()]);

    if !walker.issues.is_empty() {
        let issues = walker
            .issues
            .into_iter()
            .map(|issue| Issue::new(qualify(tag.as_str(), &issue.path), issue.message))
            .collect();
        return (
            Validation::Invalid(NodeError::InvalidProps { tag, keys, issues }),
            Vec::new(),
        );
    }

    let ignored_keys: Vec<String> = keys.into_iter().filter(|k| k != tag.as_str()).collect();
    if !ignored_keys.is_empty() {
        tracing::debug!(tag = %tag, ignored = ?ignored_keys, "multi-key node, extra keys ignored");
    }
    (
        Validation::Valid(UiNode {
            tag,
            props,
            ignored_keys,
        }),
        walker.slots,
    )
}

fn qualify(prefix: &str, path: &str) -> String {
    if path.is_empty() {
        prefix.to_string()
    } else {
        format!("{}.{}", prefix, path)
    }
}

/// Walks one node's props against its schema. Paths are relative to the props.
struct Walker {
    depth: usize,
    mode: Mode,
    issues: Vec<Issue>,
    slots: Vec<Slot>,
}

impl Walker {
    fn issue(&mut self, path: &str, message: impl Into<String>) {
        self.issues.push(Issue::new(path, message));
    }

    fn props(&mut self, tag: ComponentTag, raw: &Value) -> Map<String, Value> {
        let Value::Object(map) = raw else {
            self.issue("", format!("expected props object, found {}", type_name(raw)));
            return Map::new();
        };
        let mut props = self.object("", map, registry::props_schema(tag));
        if let Some(animation) = map.get("animation").filter(|v| !v.is_null()) {
            let checked = self.value("animation", animation, Kind::Object(registry::ANIMATION));
            props.insert("animation".to_string(), checked);
        }
        props
    }

    /// Check declared fields, fill defaults, and pass unknown fields through.
    fn object(&mut self, path: &str, map: &Map<String, Value>, fields: &[Field]) -> Map<String, Value> {
        let mut out = map.clone();
        for field in fields {
            let field_path = child_path(path, field.name);
            match map.get(field.name).filter(|v| !v.is_null()) {
                None => match field.presence {
                    Presence::Required => self.issue(&field_path, "required"),
                    Presence::Default(fallback) => {
                        out.insert(field.name.to_string(), fallback.to_value());
                    }
                    Presence::Optional => {}
                },
                Some(value) => {
                    let checked = self.value(&field_path, value, field.kind);
                    out.insert(field.name.to_string(), checked);
                }
            }
        }
        out
    }

    fn value(&mut self, path: &str, value: &Value, kind: Kind) -> Value {
        match kind {
            Kind::Any => value.clone(),
            Kind::Str => self.expect(path, value, value.is_string(), "string"),
            Kind::Num => self.expect(path, value, value.is_number(), "number"),
            Kind::Bool => self.expect(path, value, value.is_boolean(), "boolean"),
            Kind::NonNegativeNum => match value.as_f64() {
                Some(n) if n >= 0.0 => value.clone(),
                Some(n) => {
                    self.issue(path, format!("must be non-negative, got {}", n));
                    value.clone()
                }
                None => self.expect(path, value, false, "number"),
            },
            Kind::Enum(options) => {
                match value.as_str() {
                    Some(s) if options.contains(&s) => {}
                    Some(s) => self.issue(
                        path,
                        format!("invalid value '{}', expected one of: {}", s, options.join(", ")),
                    ),
                    None => self.issue(path, format!("expected string, found {}", type_name(value))),
                }
                value.clone()
            }
            Kind::StrList => {
                if let Some(items) = self.array(path, value) {
                    for (i, item) in items.iter().enumerate() {
                        if !item.is_string() {
                            let item_path = child_path(path, &i.to_string());
                            self.issue(&item_path, format!("expected string, found {}", type_name(item)));
                        }
                    }
                }
                value.clone()
            }
            Kind::Nodes => match self.array(path, value) {
                Some(items) => Value::Array(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| self.nested(&child_path(path, &i.to_string()), item))
                        .collect(),
                ),
                None => value.clone(),
            },
            Kind::Cells => match self.array(path, value) {
                Some(rows) => Value::Array(
                    rows.iter()
                        .enumerate()
                        .map(|(r, row)| self.row(&child_path(path, &r.to_string()), row))
                        .collect(),
                ),
                None => value.clone(),
            },
            Kind::KanbanItems => match self.array(path, value) {
                Some(items) => Value::Array(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| {
                            let item_path = child_path(path, &i.to_string());
                            match item {
                                Value::String(_) => item.clone(),
                                Value::Object(map) => {
                                    Value::Object(self.object(&item_path, map, registry::KANBAN_ITEM))
                                }
                                other => {
                                    self.issue(
                                        &item_path,
                                        format!("expected string or item object, found {}", type_name(other)),
                                    );
                                    other.clone()
                                }
                            }
                        })
                        .collect(),
                ),
                None => value.clone(),
            },
            Kind::Object(fields) => match value {
                Value::Object(map) => Value::Object(self.object(path, map, fields)),
                other => self.expect(path, other, false, "object"),
            },
            Kind::List(fields) => match self.array(path, value) {
                Some(items) => Value::Array(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| {
                            let item_path = child_path(path, &i.to_string());
                            match item {
                                Value::Object(map) => Value::Object(self.object(&item_path, map, fields)),
                                other => self.expect(&item_path, other, false, "object"),
                            }
                        })
                        .collect(),
                ),
                None => value.clone(),
            },
        }
    }

    fn expect(&mut self, path: &str, value: &Value, ok: bool, expected: &str) -> Value {
        if !ok {
            self.issue(path, format!("expected {}, found {}", expected, type_name(value)));
        }
        value.clone()
    }

    fn array<'v>(&mut self, path: &str, value: &'v Value) -> Option<&'v Vec<Value>> {
        match value {
            Value::Array(items) => Some(items),
            other => {
                self.issue(path, format!("expected array, found {}", type_name(other)));
                None
            }
        }
    }

    fn row(&mut self, path: &str, row: &Value) -> Value {
        let Some(cells) = self.array(path, row) else {
            return row.clone();
        };
        Value::Array(
            cells
                .iter()
                .enumerate()
                .map(|(c, cell)| {
                    let cell_path = child_path(path, &c.to_string());
                    match cell {
                        Value::Object(_) => self.nested(&cell_path, cell),
                        Value::Array(_) => self.expect(&cell_path, cell, false, "primitive or node"),
                        _ => cell.clone(),
                    }
                })
                .collect(),
        )
    }

    /// A nested node position: recurse in deep mode, record a slot otherwise.
    fn nested(&mut self, path: &str, item: &Value) -> Value {
        if self.mode == Mode::Shallow {
            self.slots.push(Slot {
                path: path.to_string(),
                value: item.clone(),
            });
            return item.clone();
        }

        match validate_node(item, self.depth + 1, Mode::Deep).0 {
            Validation::Valid(node) => node.into_value(),
            Validation::Empty => item.clone(),
            Validation::Invalid(NodeError::InvalidProps { issues, .. }) => {
                for issue in issues {
                    self.issues.push(Issue::new(child_path(path, &issue.path), issue.message));
                }
                item.clone()
            }
            Validation::Invalid(err) => {
                self.issue(path, err.to_string());
                item.clone()
            }
        }
    }
}

fn child_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}
