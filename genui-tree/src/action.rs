use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// UI-emitted intent, as carried by buttons, choices and cycle states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            path: None,
            extra: Map::new(),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn kind(&self) -> ActionKind {
        ActionKind::parse(&self.kind)
    }

    /// Look up a field of an object payload.
    pub fn payload_field(&self, name: &str) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.get(name))
    }

    pub fn payload_str(&self, name: &str) -> Option<&str> {
        self.payload_field(name).and_then(Value::as_str)
    }

    /// Parse an action out of arbitrary JSON; `None` when it has no string `type`.
    pub fn from_value(value: &Value) -> Option<Action> {
        if !value.get("type").map_or(false, Value::is_string) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Closed set of action kinds the dispatcher understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Sequence,
    Delay,
    GoBack,
    ShowToast,
    TriggerEffect,
    CopyToClipboard,
    Download,
    Navigate,
    OpenModal,
    CloseModal,
    PatchState,
    CycleState,
    ResetForm,
    SubmitForm,
    /// Anything else; carried through so it can be logged.
    Custom(String),
}

impl ActionKind {
    pub fn parse(kind: &str) -> ActionKind {
        match kind {
            "SEQUENCE" => ActionKind::Sequence,
            "DELAY" => ActionKind::Delay,
            "GO_BACK" => ActionKind::GoBack,
            "SHOW_TOAST" => ActionKind::ShowToast,
            "TRIGGER_EFFECT" => ActionKind::TriggerEffect,
            "COPY_TO_CLIPBOARD" => ActionKind::CopyToClipboard,
            "DOWNLOAD" => ActionKind::Download,
            "NAVIGATE" => ActionKind::Navigate,
            "OPEN_MODAL" => ActionKind::OpenModal,
            "CLOSE_MODAL" => ActionKind::CloseModal,
            "PATCH_STATE" => ActionKind::PatchState,
            "CYCLE_STATE" => ActionKind::CycleState,
            "RESET_FORM" => ActionKind::ResetForm,
            "SUBMIT_FORM" => ActionKind::SubmitForm,
            other => ActionKind::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Sequence => "SEQUENCE",
            ActionKind::Delay => "DELAY",
            ActionKind::GoBack => "GO_BACK",
            ActionKind::ShowToast => "SHOW_TOAST",
            ActionKind::TriggerEffect => "TRIGGER_EFFECT",
            ActionKind::CopyToClipboard => "COPY_TO_CLIPBOARD",
            ActionKind::Download => "DOWNLOAD",
            ActionKind::Navigate => "NAVIGATE",
            ActionKind::OpenModal => "OPEN_MODAL",
            ActionKind::CloseModal => "CLOSE_MODAL",
            ActionKind::PatchState => "PATCH_STATE",
            ActionKind::CycleState => "CYCLE_STATE",
            ActionKind::ResetForm => "RESET_FORM",
            ActionKind::SubmitForm => "SUBMIT_FORM",
            ActionKind::Custom(kind) => kind,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
