use serde::Serialize;
use serde_json::{Map, Value};

use crate::components::ComponentTag;
use crate::error::NodeError;
use crate::forms;
use crate::path::{self, ROOT};
use crate::validator::{validate_shallow_at, Validation};

/// One planned node. Every node is classified on its own, so a bad child
/// never hides its valid siblings or parent.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
    Component {
        tag: ComponentTag,
        /// Props path, e.g. `root.container.children.0.button`.
        path: String,
        props: Map<String, Value>,
        /// Nested nodes in document order.
        slots: Vec<RenderNode>,
        /// Input validation message for the current value.
        field_error: Option<String>,
    },
    /// Recognised shape problem; `path` addresses the whole node.
    Invalid {
        path: String,
        keys: Vec<String>,
        error: NodeError,
    },
    /// Tag outside the registry; `path` addresses the whole node.
    Unknown {
        path: String,
        tag: String,
        known: Vec<&'static str>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanStats {
    pub components: usize,
    pub invalid: usize,
    pub unknown: usize,
}

impl PlanStats {
    pub fn hallucinations(&self) -> usize {
        self.invalid + self.unknown
    }
}

/// Plan the whole tree. `None` when the root itself is empty.
pub fn plan(tree: &Value) -> Option<RenderNode> {
    plan_at(tree, ROOT, 0)
}

/// Plan a subtree whose node lives at `node_path`.
pub fn plan_at(node: &Value, node_path: &str, depth: usize) -> Option<RenderNode> {
    let (validation, slots) = validate_shallow_at(node, depth);
    match validation {
        Validation::Empty => None,
        Validation::Valid(node) => {
            let props_path = path::join(node_path, node.tag.as_str());
            let slots = slots
                .iter()
                .filter_map(|slot| plan_at(&slot.value, &path::join(&props_path, &slot.path), depth + 1))
                .collect();
            let field_error = match node.tag {
                ComponentTag::Input => forms::check_input(&node.props),
                _ => None,
            };
            Some(RenderNode::Component {
                tag: node.tag,
                path: props_path,
                props: node.props,
                slots,
                field_error,
            })
        }
        Validation::Invalid(NodeError::UnknownComponent { tag, .. }) => {
            tracing::debug!(path = node_path, tag = %tag, "planned unknown component");
            Some(RenderNode::Unknown {
                path: node_path.to_string(),
                tag,
                known: ComponentTag::known().collect(),
            })
        }
        Validation::Invalid(error) => {
            tracing::debug!(path = node_path, error = %error, "planned invalid node");
            Some(RenderNode::Invalid {
                path: node_path.to_string(),
                keys: error.keys().to_vec(),
                error,
            })
        }
    }
}

impl RenderNode {
    pub fn path(&self) -> &str {
        match self {
            RenderNode::Component { path, .. }
            | RenderNode::Invalid { path, .. }
            | RenderNode::Unknown { path, .. } => path,
        }
    }

    pub fn is_diagnostic(&self) -> bool {
        !matches!(self, RenderNode::Component { .. })
    }

    /// Depth-first, parents before children.
    pub fn nodes(&self) -> Vec<&RenderNode> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a RenderNode>) {
        out.push(self);
        if let RenderNode::Component { slots, .. } = self {
            for slot in slots {
                slot.collect(out);
            }
        }
    }

    /// Invalid and unknown nodes anywhere in the plan.
    pub fn diagnostics(&self) -> impl Iterator<Item = &RenderNode> {
        self.nodes().into_iter().filter(|n| n.is_diagnostic())
    }

    pub fn stats(&self) -> PlanStats {
        self.nodes().into_iter().fold(PlanStats::default(), |mut stats, node| {
            match node {
                RenderNode::Component { .. } => stats.components += 1,
                RenderNode::Invalid { .. } => stats.invalid += 1,
                RenderNode::Unknown { .. } => stats.unknown += 1,
            }
            stats
        })
    }

    /// One-line description used by diagnostics panels and the CLI.
    pub fn describe(&self) -> String {
        match self {
            RenderNode::Component { tag, path, field_error, .. } => match field_error {
                Some(message) => format!("{} <{}> field error: {}", path, tag, message),
                None => format!("{} <{}>", path, tag),
            },
            RenderNode::Invalid { path, error, .. } => format!("{} invalid: {}", path, error.format()),
            RenderNode::Unknown { path, tag, .. } => format!("{} unknown component '{}'", path, tag),
        }
    }
}
