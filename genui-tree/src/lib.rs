//! # GenUI Tree
//!
//! Data layer for model-generated user interfaces: a JSON tree of single-key
//! UI nodes that may still be arriving from a stream.
//!
//! ## Features
//! - Best-effort repair of truncated JSON frames
//! - Permissive schema validation with structured, path-addressed diagnostics
//! - Fail-soft render planning that classifies every node on its own
//! - Dot-path addressing with copy-on-write patches
//! - Form helpers (reset, collect, field validation)
//!
//! ## Example
//! ```ignore
//! use genui_tree::{parse_tree, plan};
//!
//! let tree = parse_tree(r#"{"container":{"children":[{"text":{"content":"Hi"#)?;
//! if let Some(root) = plan(&tree) {
//!     for diagnostic in root.diagnostics() {
//!         eprintln!("{}", diagnostic.describe());
//!     }
//! }
//! ```

pub mod action;
pub mod components;
pub mod error;
pub mod forms;
pub mod path;
pub mod registry;
pub mod render;
pub mod stream;
pub mod validator;

// --- Core types ---
pub use action::{Action, ActionKind};
pub use components::{ComponentTag, UiNode};
pub use error::{Issue, NodeError, TreeError, TreeResult};
pub use render::{plan, PlanStats, RenderNode};
pub use stream::{repair, repair_parse, StreamAccumulator};
pub use validator::{validate, validate_shallow, Validation, MAX_NESTING_DEPTH};

/// Parse a complete or truncated JSON document into a tree.
pub fn parse_tree(text: &str) -> TreeResult<serde_json::Value> {
    repair_parse(text).ok_or_else(|| {
        let preview: String = text.chars().take(40).collect();
        TreeError::Unparseable(format!("no JSON value could be recovered from '{}'", preview))
    })
}

/// A document that renders every registered component once, with buttons
/// wired to the toast, effect, sequence and cycle actions.
pub const DIAGNOSTIC_SUITE: &str = include_str!("../fixtures/all_components.json");

pub fn diagnostic_suite() -> TreeResult<serde_json::Value> {
    parse_tree(DIAGNOSTIC_SUITE)
}

/// Parse and deep-validate a document, returning the normalized root node.
///
/// An empty root is reported as `Ok(None)`.
pub fn parse_node(text: &str) -> TreeResult<Option<UiNode>> {
    let tree = parse_tree(text)?;
    Ok(validate(&tree).into_result()?)
}
