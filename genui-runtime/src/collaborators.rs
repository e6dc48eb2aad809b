//! Seams to the outside world: the model, auxiliary tools, component
//! refinement and user-visible side effects.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::Stream;

use crate::config::Settings;
use crate::error::CollaboratorError;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, CollaboratorError>> + Send>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Desktop,
    #[default]
    Mobile,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Default,
    Galgame,
}

/// Who the UI is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub role: UserRole,
    pub device: Device,
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

impl Default for UserContext {
    fn default() -> Self {
        Self {
            role: UserRole::User,
            device: Device::Mobile,
            theme: Theme::Dark,
            mode: Some(Mode::Default),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub context: UserContext,
    pub config: Settings,
    /// Active tree at request time, for modification requests.
    pub previous: Option<Arc<Value>>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<ChunkStream, CollaboratorError>;
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, args: &Value) -> Result<Value, CollaboratorError>;
}

/// Produces replacement single-key nodes.
#[async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(&self, instruction: &str, node: &Value, config: &Settings) -> Result<Value, CollaboratorError>;

    async fn fix(&self, error: &str, node: &Value, config: &Settings) -> Result<Value, CollaboratorError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ToastKind {
    Success,
    Error,
    #[default]
    Info,
    Warning,
}

impl ToastKind {
    pub fn parse(kind: &str) -> ToastKind {
        match kind {
            "SUCCESS" => ToastKind::Success,
            "ERROR" => ToastKind::Error,
            "WARNING" => ToastKind::Warning,
            _ => ToastKind::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toast {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ToastKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Toast {
    pub fn new(kind: ToastKind, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind,
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// User-visible side effects of dispatched actions.
#[async_trait]
pub trait Effects: Send + Sync {
    fn toast(&self, toast: Toast);

    fn trigger_effect(&self, effect: &Value);

    async fn copy_to_clipboard(&self, text: &str) -> Result<(), CollaboratorError>;

    async fn download(&self, filename: &str, content: &str) -> Result<(), CollaboratorError>;

    /// Open `url` in a new context, never replacing the current one.
    fn navigate(&self, url: &str);
}

/// Effects sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEffects;

#[async_trait]
impl Effects for LogEffects {
    fn toast(&self, toast: Toast) {
        tracing::info!(kind = ?toast.kind, title = %toast.title, description = ?toast.description, "toast");
    }

    fn trigger_effect(&self, effect: &Value) {
        tracing::info!(%effect, "visual effect");
    }

    async fn copy_to_clipboard(&self, text: &str) -> Result<(), CollaboratorError> {
        tracing::info!(len = text.len(), "copy to clipboard");
        Ok(())
    }

    async fn download(&self, filename: &str, content: &str) -> Result<(), CollaboratorError> {
        tracing::info!(filename, len = content.len(), "download");
        Ok(())
    }

    fn navigate(&self, url: &str) {
        tracing::info!(url, "navigate");
    }
}

/// Tool executor for sessions without tool support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTools;

#[async_trait]
impl ToolExecutor for NoTools {
    async fn execute(&self, name: &str, _args: &Value) -> Result<Value, CollaboratorError> {
        Err(CollaboratorError::Tool {
            name: name.to_string(),
            message: "no tool executor configured".to_string(),
        })
    }
}

/// Refiner for sessions without refinement support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRefiner;

#[async_trait]
impl Refiner for NoRefiner {
    async fn refine(&self, _instruction: &str, _node: &Value, _config: &Settings) -> Result<Value, CollaboratorError> {
        Err(CollaboratorError::Refinement("no refiner configured".to_string()))
    }

    async fn fix(&self, _error: &str, _node: &Value, _config: &Settings) -> Result<Value, CollaboratorError> {
        Err(CollaboratorError::Refinement("no refiner configured".to_string()))
    }
}

/// Replays canned responses as fixed-size chunk streams, one response per call.
/// The last response repeats once the script runs out.
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    responses: Vec<String>,
    chunk_size: usize,
    calls: Arc<AtomicUsize>,
}

impl ScriptedGenerator {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>, chunk_size: usize) -> Self {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            chunk_size: chunk_size.max(1),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Split on char boundaries into pieces of at most `size` bytes (at least one char each).
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if !current.is_empty() && current.len() + ch.len_utf8() > size {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<ChunkStream, CollaboratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .responses
            .get(call)
            .or_else(|| self.responses.last())
            .ok_or_else(|| CollaboratorError::Generation("empty script".to_string()))?;
        let chunks = chunk_text(response, self.chunk_size).into_iter().map(Ok);
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }
}
