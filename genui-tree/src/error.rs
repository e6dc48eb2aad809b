use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::components::ComponentTag;

pub type TreeResult<T> = Result<T, TreeError>;

/// Failures of the path/patch engine and of document-level parsing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Path '{path}' does not resolve to a value")]
    PathNotFound { path: String },

    #[error("Value at path '{path}' is not an object (found {found})")]
    NotAnObject { path: String, found: &'static str },

    #[error("Unparseable document: {0}")]
    Unparseable(String),

    #[error("Invalid node: {0}")]
    InvalidNode(#[from] NodeError),
}

/// One shape problem found inside a node, addressed relative to the node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// Dot path relative to the validated node, e.g. `button.label` or
    /// `container.children.0.text.content`.
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Structured validation diagnostic for a single candidate node.
///
/// Distinguishes a wrong-shaped value from a shape-valid node whose tag is
/// unknown, so the renderer can show different placeholders for each.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Expected a component object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("Unknown component '{tag}'. Known components: {}", ComponentTag::known_list())]
    UnknownComponent { tag: String, keys: Vec<String> },

    #[error("Invalid props for component '{tag}' ({} issue(s))", .issues.len())]
    InvalidProps {
        tag: ComponentTag,
        keys: Vec<String>,
        issues: Vec<Issue>,
    },

    #[error("Maximum nesting depth ({max_depth}) exceeded")]
    MaxNestingDepthExceeded { max_depth: usize },
}

impl NodeError {
    /// Top-level keys present on the offending object.
    pub fn keys(&self) -> &[String] {
        match self {
            NodeError::UnknownComponent { keys, .. } | NodeError::InvalidProps { keys, .. } => keys,
            _ => &[],
        }
    }

    pub fn issues(&self) -> &[Issue] {
        match self {
            NodeError::InvalidProps { issues, .. } => issues,
            _ => &[],
        }
    }

    /// True when the node carried a tag outside the registry.
    pub fn is_unknown_component(&self) -> bool {
        matches!(self, NodeError::UnknownComponent { .. })
    }

    /// Multi-line description suitable for an inline diagnostic panel.
    pub fn format(&self) -> String {
        let mut out = self.to_string();
        let keys = self.keys();
        if !keys.is_empty() {
            out.push_str("\nNode keys: ");
            out.push_str(&keys.join(", "));
        }
        for issue in self.issues() {
            out.push_str("\n  - ");
            out.push_str(&issue.to_string());
        }
        out
    }
}

/// Human name of a JSON value's type, for diagnostics.
pub fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
