use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Closed set of component tags a UI node may carry as its single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentTag {
    Container,
    Text,
    Button,
    Card,
    Table,
    Stat,
    Progress,
    Alert,
    Avatar,
    Image,
    Map,
    Accordion,
    Input,
    Textarea,
    Badge,
    Separator,
    BentoContainer,
    BentoCard,
    Kanban,
    Switch,
    Slider,
    Tabs,
    Stepper,
    Timeline,
    #[serde(rename = "codeblock")]
    CodeBlock,
    SplitPane,
    Calendar,
    VnStage,
}

impl ComponentTag {
    pub const ALL: [ComponentTag; 28] = [
        ComponentTag::Container,
        ComponentTag::Text,
        ComponentTag::Button,
        ComponentTag::Card,
        ComponentTag::Table,
        ComponentTag::Stat,
        ComponentTag::Progress,
        ComponentTag::Alert,
        ComponentTag::Avatar,
        ComponentTag::Image,
        ComponentTag::Map,
        ComponentTag::Accordion,
        ComponentTag::Input,
        ComponentTag::Textarea,
        ComponentTag::Badge,
        ComponentTag::Separator,
        ComponentTag::BentoContainer,
        ComponentTag::BentoCard,
        ComponentTag::Kanban,
        ComponentTag::Switch,
        ComponentTag::Slider,
        ComponentTag::Tabs,
        ComponentTag::Stepper,
        ComponentTag::Timeline,
        ComponentTag::CodeBlock,
        ComponentTag::SplitPane,
        ComponentTag::Calendar,
        ComponentTag::VnStage,
    ];

    /// The JSON key used for this tag.
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentTag::Container => "container",
            ComponentTag::Text => "text",
            ComponentTag::Button => "button",
            ComponentTag::Card => "card",
            ComponentTag::Table => "table",
            ComponentTag::Stat => "stat",
            ComponentTag::Progress => "progress",
            ComponentTag::Alert => "alert",
            ComponentTag::Avatar => "avatar",
            ComponentTag::Image => "image",
            ComponentTag::Map => "map",
            ComponentTag::Accordion => "accordion",
            ComponentTag::Input => "input",
            ComponentTag::Textarea => "textarea",
            ComponentTag::Badge => "badge",
            ComponentTag::Separator => "separator",
            ComponentTag::BentoContainer => "bento_container",
            ComponentTag::BentoCard => "bento_card",
            ComponentTag::Kanban => "kanban",
            ComponentTag::Switch => "switch",
            ComponentTag::Slider => "slider",
            ComponentTag::Tabs => "tabs",
            ComponentTag::Stepper => "stepper",
            ComponentTag::Timeline => "timeline",
            ComponentTag::CodeBlock => "codeblock",
            ComponentTag::SplitPane => "split_pane",
            ComponentTag::Calendar => "calendar",
            ComponentTag::VnStage => "vn_stage",
        }
    }

    /// Look a JSON key up in the registry.
    pub fn from_key(key: &str) -> Option<ComponentTag> {
        ComponentTag::ALL.iter().copied().find(|tag| tag.as_str() == key)
    }

    /// Every known tag key, in registry order.
    pub fn known() -> impl Iterator<Item = &'static str> {
        ComponentTag::ALL.iter().map(|tag| tag.as_str())
    }

    /// Comma-separated list of known tags, for diagnostics.
    pub fn known_list() -> String {
        ComponentTag::known().collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentTag::from_key(s).ok_or_else(|| format!("unknown component '{}'", s))
    }
}

/// A validated UI node: one known tag plus its normalized props.
///
/// Serializes back to the single-key wire shape `{ "<tag>": { ...props } }`.
#[derive(Debug, Clone, PartialEq)]
pub struct UiNode {
    pub tag: ComponentTag,
    pub props: Map<String, Value>,
    /// Extra top-level keys dropped because an earlier key already named a tag.
    pub ignored_keys: Vec<String>,
}

impl UiNode {
    pub fn new(tag: ComponentTag, props: Map<String, Value>) -> Self {
        Self {
            tag,
            props,
            ignored_keys: Vec::new(),
        }
    }

    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }

    /// The node's `children` list, empty when absent or not a list.
    pub fn children(&self) -> &[Value] {
        match self.props.get("children") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    pub fn to_value(&self) -> Value {
        let mut node = Map::new();
        node.insert(self.tag.as_str().to_string(), Value::Object(self.props.clone()));
        Value::Object(node)
    }

    pub fn into_value(self) -> Value {
        let mut node = Map::new();
        node.insert(self.tag.as_str().to_string(), Value::Object(self.props));
        Value::Object(node)
    }
}

impl Serialize for UiNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.tag.as_str(), &self.props)?;
        map.end()
    }
}

/// Animation descriptor accepted on any node.
pub const ANIMATION_TYPES: &[&str] = &[
    "FADE_IN",
    "FADE_IN_UP",
    "SLIDE_FROM_LEFT",
    "SLIDE_FROM_RIGHT",
    "SCALE_IN",
    "SCALE_ELASTIC",
    "BLUR_IN",
    "STAGGER_CONTAINER",
    "PULSE",
    "SHIMMER",
    "SHAKE",
    "GLOW",
    "BOUNCE",
    "TYPEWRITER",
    "SCRAMBLE",
    "GRADIENT_FLOW",
    "WIGGLE",
    "POP",
    "HOVER_GROW",
    "NONE",
];

pub const ANIMATION_DURATIONS: &[&str] = &["FAST", "NORMAL", "SLOW"];

pub const ANIMATION_TRIGGERS: &[&str] = &["ON_MOUNT", "ON_HOVER", "ON_VIEW"];
