use serde_json::Value;

use crate::components::{ComponentTag, ANIMATION_DURATIONS, ANIMATION_TRIGGERS, ANIMATION_TYPES};

/// Shape expected for one prop value.
#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Any,
    Str,
    Num,
    NonNegativeNum,
    Bool,
    Enum(&'static [&'static str]),
    StrList,
    /// Ordered list of UI nodes (`children`, item `content`).
    Nodes,
    /// Table rows: arrays of primitive-or-node cells.
    Cells,
    /// Kanban column items: bare strings or `{content, id?, tag?}` records.
    KanbanItems,
    Object(&'static [Field]),
    /// Array of objects sharing one shape.
    List(&'static [Field]),
}

#[derive(Debug, Clone, Copy)]
pub enum Presence {
    Optional,
    Required,
    Default(Fallback),
}

/// Value filled in when a defaulted field is absent.
#[derive(Debug, Clone, Copy)]
pub enum Fallback {
    Num(f64),
    Bool(bool),
    Str(&'static str),
    EmptyList,
}

impl Fallback {
    pub fn to_value(self) -> Value {
        match self {
            Fallback::Num(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Fallback::Bool(b) => Value::Bool(b),
            Fallback::Str(s) => Value::String(s.to_string()),
            Fallback::EmptyList => Value::Array(Vec::new()),
        }
    }
}

/// One declared prop of a component or nested record.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
    pub presence: Presence,
}

impl Field {
    pub const fn optional(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional,
        }
    }

    pub const fn required(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Required,
        }
    }

    pub const fn defaulted(name: &'static str, kind: Kind, fallback: Fallback) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Default(fallback),
        }
    }
}

const fn text(name: &'static str) -> Field {
    Field::optional(name, Kind::Str)
}

const fn node_list(name: &'static str) -> Field {
    Field::defaulted(name, Kind::Nodes, Fallback::EmptyList)
}

const fn list(name: &'static str, item: &'static [Field]) -> Field {
    Field::defaulted(name, Kind::List(item), Fallback::EmptyList)
}

// ─── Shared records ──────────────────────────────────────────────────────────

pub const ACTION: &[Field] = &[
    Field::required("type", Kind::Str),
    Field::optional("payload", Kind::Any),
    text("path"),
];

/// Checked on every node regardless of tag.
pub const ANIMATION: &[Field] = &[
    Field::optional("type", Kind::Enum(ANIMATION_TYPES)),
    Field::optional("duration", Kind::Enum(ANIMATION_DURATIONS)),
    Field::optional("delay", Kind::NonNegativeNum),
    Field::optional("trigger", Kind::Enum(ANIMATION_TRIGGERS)),
];

pub const KANBAN_ITEM: &[Field] = &[
    text("id"),
    Field::required("content", Kind::Str),
    text("tag"),
];

const INPUT_VALIDATION: &[Field] = &[
    Field::optional("required", Kind::Bool),
    text("pattern"),
    Field::optional("minLength", Kind::Num),
    Field::optional("maxLength", Kind::Num),
    text("errorMessage"),
];

const MAP_MARKER: &[Field] = &[
    Field::required("title", Kind::Str),
    Field::required("lat", Kind::Num),
    Field::required("lng", Kind::Num),
];

const ACCORDION_ITEM: &[Field] = &[Field::required("title", Kind::Str), node_list("content")];

const KANBAN_COLUMN: &[Field] = &[
    Field::required("title", Kind::Str),
    text("color"),
    Field::defaulted("items", Kind::KanbanItems, Fallback::EmptyList),
];

const TAB_ITEM: &[Field] = &[
    Field::required("id", Kind::Str),
    Field::required("label", Kind::Str),
    node_list("content"),
];

const STEPPER_ITEM: &[Field] = &[
    Field::required("id", Kind::Str),
    Field::required("title", Kind::Str),
    node_list("content"),
];

const TIMELINE_ITEM: &[Field] = &[
    Field::required("title", Kind::Str),
    text("description"),
    text("time"),
    Field::optional("status", Kind::Enum(&["COMPLETED", "ACTIVE", "PENDING"])),
    text("icon"),
];

const IMAGE_ASSET: &[Field] = &[
    Field::required("source", Kind::Enum(&["EXTERNAL_URL", "GENERATED"])),
    Field::required("value", Kind::Str),
    text("style"),
];

const VN_CHARACTER_ANIMATION: &[Field] = &[
    Field::required("type", Kind::Str),
    Field::optional("delay", Kind::Num),
];

const VN_CHARACTER: &[Field] = &[
    Field::required("id", Kind::Str),
    Field::required("name", Kind::Str),
    Field::required("avatar", Kind::Object(IMAGE_ASSET)),
    Field::required("position", Kind::Enum(&["LEFT", "CENTER", "RIGHT", "CLOSE_UP"])),
    Field::required(
        "expression",
        Kind::Enum(&["NEUTRAL", "SMILE", "ANGRY", "BLUSH", "SAD", "SHOCKED"]),
    ),
    Field::optional("animation", Kind::Object(VN_CHARACTER_ANIMATION)),
];

const VN_DIALOGUE: &[Field] = &[
    Field::required("speaker", Kind::Str),
    Field::required("content", Kind::Str),
    text("voice_id"),
    Field::optional("speed", Kind::Enum(&["SLOW", "NORMAL", "FAST"])),
];

const VN_CHOICE: &[Field] = &[
    Field::required("label", Kind::Str),
    Field::required("action", Kind::Object(ACTION)),
    text("style"),
];

// ─── Component props ─────────────────────────────────────────────────────────

const CONTAINER: &[Field] = &[
    text("layout"),
    text("gap"),
    Field::optional("padding", Kind::Bool),
    text("background"),
    text("bgImage"),
    text("className"),
    node_list("children"),
];

const TEXT: &[Field] = &[
    Field::defaulted("content", Kind::Str, Fallback::Str("")),
    text("variant"),
    text("color"),
    text("font"),
];

const BUTTON: &[Field] = &[
    text("label"),
    text("variant"),
    text("icon"),
    Field::optional("disabled", Kind::Bool),
    Field::optional("action", Kind::Object(ACTION)),
];

const CARD: &[Field] = &[text("title"), text("variant"), node_list("children")];

const TABLE: &[Field] = &[
    Field::optional("headers", Kind::StrList),
    Field::optional("rows", Kind::Cells),
];

const STAT: &[Field] = &[
    text("label"),
    text("value"),
    text("trend"),
    Field::optional("trendDirection", Kind::Enum(&["UP", "DOWN", "NEUTRAL"])),
];

const PROGRESS: &[Field] = &[
    text("label"),
    Field::defaulted("value", Kind::Num, Fallback::Num(0.0)),
    text("color"),
];

const ALERT: &[Field] = &[text("title"), text("description"), text("variant")];

const AVATAR: &[Field] = &[text("initials"), text("src"), text("status")];

const IMAGE: &[Field] = &[text("src"), text("alt"), text("caption"), text("aspectRatio")];

const MAP: &[Field] = &[
    text("label"),
    Field::optional("defaultZoom", Kind::Num),
    text("style"),
    list("markers", MAP_MARKER),
];

const ACCORDION: &[Field] = &[text("variant"), list("items", ACCORDION_ITEM)];

const INPUT: &[Field] = &[
    text("label"),
    text("placeholder"),
    text("inputType"),
    text("value"),
    Field::optional("validation", Kind::Object(INPUT_VALIDATION)),
];

const TEXTAREA: &[Field] = &[text("label"), text("placeholder"), text("value")];

const BADGE: &[Field] = &[text("label"), text("color")];

const SEPARATOR: &[Field] = &[];

const BENTO_CONTAINER: &[Field] = &[node_list("children")];

const BENTO_CARD: &[Field] = &[
    text("title"),
    Field::optional("colSpan", Kind::Num),
    Field::optional("rowSpan", Kind::Num),
    text("bgImage"),
    node_list("children"),
];

const KANBAN: &[Field] = &[list("columns", KANBAN_COLUMN)];

const SWITCH: &[Field] = &[
    text("label"),
    Field::defaulted("value", Kind::Bool, Fallback::Bool(false)),
];

const SLIDER: &[Field] = &[
    text("label"),
    Field::defaulted("min", Kind::Num, Fallback::Num(0.0)),
    Field::defaulted("max", Kind::Num, Fallback::Num(100.0)),
    Field::defaulted("value", Kind::Num, Fallback::Num(50.0)),
    Field::defaulted("step", Kind::Num, Fallback::Num(1.0)),
];

const TABS: &[Field] = &[text("defaultValue"), text("variant"), list("items", TAB_ITEM)];

const STEPPER: &[Field] = &[
    Field::defaulted("currentStep", Kind::Num, Fallback::Num(0.0)),
    list("items", STEPPER_ITEM),
];

const TIMELINE: &[Field] = &[list("items", TIMELINE_ITEM), text("variant")];

const CODE_BLOCK: &[Field] = &[
    Field::required("code", Kind::Str),
    text("language"),
    text("filename"),
];

const SPLIT_PANE: &[Field] = &[
    Field::optional("direction", Kind::Enum(&["ROW", "COL"])),
    Field::optional("initialSize", Kind::Num),
    node_list("children"),
];

const CALENDAR: &[Field] = &[text("label"), text("selectedDate")];

const VN_STAGE: &[Field] = &[
    Field::required("background", Kind::Object(IMAGE_ASSET)),
    text("bgm"),
    text("sfx"),
    list("characters", VN_CHARACTER),
    Field::required("dialogue", Kind::Object(VN_DIALOGUE)),
    Field::optional("choices", Kind::List(VN_CHOICE)),
];

/// Declared props for a component tag. `animation` is checked separately
/// for every tag.
pub fn props_schema(tag: ComponentTag) -> &'static [Field] {
    match tag {
        ComponentTag::Container => CONTAINER,
        ComponentTag::Text => TEXT,
        ComponentTag::Button => BUTTON,
        ComponentTag::Card => CARD,
        ComponentTag::Table => TABLE,
        ComponentTag::Stat => STAT,
        ComponentTag::Progress => PROGRESS,
        ComponentTag::Alert => ALERT,
        ComponentTag::Avatar => AVATAR,
        ComponentTag::Image => IMAGE,
        ComponentTag::Map => MAP,
        ComponentTag::Accordion => ACCORDION,
        ComponentTag::Input => INPUT,
        ComponentTag::Textarea => TEXTAREA,
        ComponentTag::Badge => BADGE,
        ComponentTag::Separator => SEPARATOR,
        ComponentTag::BentoContainer => BENTO_CONTAINER,
        ComponentTag::BentoCard => BENTO_CARD,
        ComponentTag::Kanban => KANBAN,
        ComponentTag::Switch => SWITCH,
        ComponentTag::Slider => SLIDER,
        ComponentTag::Tabs => TABS,
        ComponentTag::Stepper => STEPPER,
        ComponentTag::Timeline => TIMELINE,
        ComponentTag::CodeBlock => CODE_BLOCK,
        ComponentTag::SplitPane => SPLIT_PANE,
        ComponentTag::Calendar => CALENDAR,
        ComponentTag::VnStage => VN_STAGE,
    }
}

/// Whether a tag lays out a `children` list.
pub fn has_children(tag: ComponentTag) -> bool {
    props_schema(tag)
        .iter()
        .any(|f| f.name == "children" && matches!(f.kind, Kind::Nodes))
}
