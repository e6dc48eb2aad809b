//! The interactive session: conversation history, action dispatch,
//! streaming generation and collaborator-backed edits.
//!
//! State lives behind one mutex that is never held across an `.await`. Every
//! mutation re-reads the latest snapshot under the lock, so concurrent
//! patches resolve last-writer-wins. Generations carry a monotonically
//! increasing id; a generation that is no longer the latest never writes.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use genui_tree::forms::{collect_form_data, reset_form};
use genui_tree::path::{self, get_by_path, merge_at_path, set_by_path, splice_node, ROOT};
use genui_tree::{plan, Action, ActionKind, RenderNode, StreamAccumulator, TreeError};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio_stream::StreamExt;

use crate::collaborators::{
    Effects, GenerationRequest, Generator, LogEffects, NoRefiner, NoTools, Refiner, Toast, ToastKind,
    ToolExecutor, UserContext,
};
use crate::config::{Settings, SettingsStore};
use crate::conversation::{Conversation, Message};
use crate::error::{CollaboratorError, DispatchError, RuntimeError, RuntimeResult};
use crate::history::History;
use crate::telemetry::{names, Telemetry};

/// Tool calls honoured per generation before giving up.
pub const MAX_TOOL_ROUNDS: usize = 4;
pub const DEFAULT_DELAY_MS: u64 = 500;
pub const MAX_DELAY_MS: u64 = 60_000;

pub const DIAGNOSTICS_COMMAND: &str = "/system_diagnostics";

const STREAM_ERROR: &str = "Error rendering stream. Check settings.";
const NO_UI: &str = "The model did not return a renderable UI.";
const VARIATION_INSTRUCTION: &str = "Create a distinct visual variation of this component. \
    Change the style, layout, or colors while keeping the functionality. Make it look fresh.";
const RENDER_TRACE: &str = "render_validation";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a dispatched action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    TreeUpdated,
    EffectRan,
    Unchanged,
}

impl Dispatched {
    fn rank(self) -> u8 {
        match self {
            Dispatched::Unchanged => 0,
            Dispatched::EffectRan => 1,
            Dispatched::TreeUpdated => 2,
        }
    }

    fn combine(self, other: Dispatched) -> Dispatched {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Modal {
    pub title: Option<String>,
    pub content: Value,
}

pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub tools: Arc<dyn ToolExecutor>,
    pub refiner: Arc<dyn Refiner>,
    pub effects: Arc<dyn Effects>,
}

impl Collaborators {
    /// Generator only; tools and refinement are unavailable and effects are logged.
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            tools: Arc::new(NoTools),
            refiner: Arc::new(NoRefiner),
            effects: Arc::new(LogEffects),
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_refiner(mut self, refiner: Arc<dyn Refiner>) -> Self {
        self.refiner = refiner;
        self
    }

    pub fn with_effects(mut self, effects: Arc<dyn Effects>) -> Self {
        self.effects = effects;
        self
    }
}

struct SessionState {
    history: History<Conversation>,
    /// Id of the generation holding the loading flag.
    loading: Option<u64>,
    modal: Option<Modal>,
    edit_mode: bool,
    selected: Option<String>,
    context: UserContext,
    settings: Settings,
}

impl SessionState {
    /// Run a history step that may move the cursor. Only the entry at the
    /// cursor ever holds a preview: it is lifted off before the step and
    /// re-applied to the new current entry while a generation is loading.
    fn step<R>(&mut self, op: impl FnOnce(&mut History<Conversation>) -> R) -> R {
        let preview = self.history.current().preview().cloned();
        if preview.is_some() {
            self.history.overwrite_with(|c| c.with_preview(None));
        }
        let result = op(&mut self.history);
        if let Some(preview) = preview.filter(|_| self.loading.is_some()) {
            self.history.overwrite_with(|c| c.with_preview(Some(preview)));
        }
        result
    }
}

enum RoundOutcome {
    Tree(Value),
    ToolCall { name: String, args: Value },
    Nothing,
    Superseded,
}

#[derive(Debug, Clone, Copy)]
enum RefineRequest<'a> {
    Prompt(&'a str),
    Variation,
}

pub struct Session {
    state: Mutex<SessionState>,
    collaborators: Collaborators,
    telemetry: Arc<Telemetry>,
    store: Option<SettingsStore>,
    generation: AtomicU64,
    editing: DashSet<String>,
}

/// Clears the loading flag (and any stale preview) when a generation ends,
/// however it ends.
struct LoadingGuard<'a> {
    session: &'a Session,
    generation: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.session.state.lock();
        if state.loading == Some(self.generation) {
            state.loading = None;
            if state.history.current().preview().is_some() {
                state.history.overwrite_with(|c| c.with_preview(None));
            }
        }
    }
}

/// Holds a node path in the in-flight edit set.
struct EditGuard<'a> {
    editing: &'a DashSet<String>,
    key: String,
}

impl Drop for EditGuard<'_> {
    fn drop(&mut self) {
        self.editing.remove(&self.key);
    }
}

/// Canonical `root.`-prefixed form of a path.
fn edit_key(path: &str) -> String {
    path::join(ROOT, path::normalize(path))
}

/// The single-key node addressed by `path`. Props paths are re-wrapped
/// under their tag.
fn node_at(tree: &Value, path: &str) -> Option<Value> {
    let target = get_by_path(tree, path)?;
    match path::tag_at(path) {
        Some(tag) => {
            let mut node = Map::new();
            node.insert(tag.as_str().to_string(), target.clone());
            Some(Value::Object(node))
        }
        None => Some(target.clone()),
    }
}

/// `DELAY` duration: fractional values are rounded, missing, zero or
/// non-numeric values fall back to the default.
fn delay_ms(ms: Option<&Value>) -> u64 {
    match ms.and_then(Value::as_f64) {
        Some(ms) if ms.is_finite() && ms > 0.0 => (ms.round() as u64).min(MAX_DELAY_MS),
        _ => DEFAULT_DELAY_MS,
    }
}

fn clipboard_preview(text: &str) -> String {
    if text.chars().count() > 30 {
        format!("\"{}...\"", text.chars().take(30).collect::<String>())
    } else {
        format!("\"{}\"", text)
    }
}

impl Session {
    pub fn new(collaborators: Collaborators, telemetry: Arc<Telemetry>) -> Self {
        Self {
            state: Mutex::new(SessionState {
                history: History::new(Conversation::greeting()),
                loading: None,
                modal: None,
                edit_mode: false,
                selected: None,
                context: UserContext::default(),
                settings: Settings::default(),
            }),
            collaborators,
            telemetry,
            store: None,
            generation: AtomicU64::new(0),
            editing: DashSet::new(),
        }
    }

    /// Load settings from `store` and persist later changes to it.
    pub fn with_settings_store(mut self, store: SettingsStore) -> Self {
        let settings = store.load();
        self.state.get_mut().settings = settings;
        self.store = Some(store);
        self
    }

    // ─── Observers ───────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<Conversation> {
        self.state.lock().history.current_arc()
    }

    pub fn active_tree(&self) -> Option<Arc<Value>> {
        self.snapshot().active_tree().cloned()
    }

    pub fn preview(&self) -> Option<Arc<Value>> {
        self.snapshot().preview().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading.is_some()
    }

    pub fn modal(&self) -> Option<Modal> {
        self.state.lock().modal.clone()
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    pub fn settings(&self) -> Settings {
        self.state.lock().settings.clone()
    }

    pub fn context(&self) -> UserContext {
        self.state.lock().context
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn can_undo(&self) -> bool {
        self.state.lock().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state.lock().history.can_redo()
    }

    /// Plan whatever is on screen: the streaming preview if any, else the
    /// active tree. Each invalid or unknown node is reported as a hallucination.
    pub fn render_plan(&self) -> Option<RenderNode> {
        let snapshot = self.snapshot();
        let tree = snapshot.preview().or_else(|| snapshot.active_tree())?;
        let root = plan(tree)?;
        for node in root.diagnostics() {
            self.telemetry.log_event(
                RENDER_TRACE,
                names::HALLUCINATION,
                json!({"path": node.path(), "detail": node.describe()}),
            );
        }
        Some(root)
    }

    // ─── Plain state changes ─────────────────────────────────────────────────

    pub fn set_context(&self, context: UserContext) {
        self.state.lock().context = context;
    }

    pub fn set_settings(&self, settings: Settings) -> RuntimeResult<()> {
        self.state.lock().settings = settings.clone();
        if let Some(store) = &self.store {
            store.save(&settings)?;
        }
        Ok(())
    }

    pub fn set_edit_mode(&self, enabled: bool) {
        self.state.lock().edit_mode = enabled;
    }

    pub fn edit_mode(&self) -> bool {
        self.state.lock().edit_mode
    }

    pub fn select(&self, path: Option<String>) {
        self.state.lock().selected = path;
    }

    pub fn selected(&self) -> Option<String> {
        self.state.lock().selected.clone()
    }

    pub fn close_modal(&self) {
        self.state.lock().modal = None;
    }

    pub fn undo(&self) -> bool {
        self.state.lock().step(|history| history.undo())
    }

    pub fn redo(&self) -> bool {
        self.state.lock().step(|history| history.redo())
    }

    /// Append an assistant message carrying `tree`, making it the active tree.
    pub fn show_tree(&self, content: &str, tree: Value) {
        self.push_message(Message::assistant(content, tree));
    }

    /// Show the diagnostic suite as one undoable step.
    pub fn run_diagnostics(&self) -> RuntimeResult<()> {
        let suite = genui_tree::diagnostic_suite()?;
        self.state.lock().step(|history| {
            history.push_with(|c| {
                c.with_messages([
                    Message::user(DIAGNOSTICS_COMMAND),
                    Message::system("Initializing System Diagnostics..."),
                    Message::assistant("Generating Test Suite...", suite),
                ])
            })
        });
        self.collaborators.effects.toast(
            Toast::new(ToastKind::Success, "Diagnostics Started").describe("Rendering full component suite."),
        );
        Ok(())
    }

    fn push_message(&self, message: Message) {
        self.state.lock().step(|history| history.push_with(|c| c.with_message(message)));
    }

    /// Push one snapshot whose active tree is `f(active tree)`, optionally
    /// with a message appended. History is untouched on failure.
    fn update_active_tree(
        &self,
        note: Option<Message>,
        f: impl FnOnce(&Value) -> RuntimeResult<Value>,
    ) -> RuntimeResult<()> {
        let mut state = self.state.lock();
        state.step(|history| {
            history.try_push_with(|conversation| {
                let tree = conversation.active_tree().ok_or(RuntimeError::NoActiveTree)?;
                let next = f(tree)?;
                let updated = conversation
                    .with_active_tree(next)
                    .ok_or(RuntimeError::NoActiveTree)?;
                Ok(match note {
                    Some(message) => updated.with_message(message),
                    None => updated,
                })
            })
        })
    }

    fn begin_loading(&self) -> Option<LoadingGuard<'_>> {
        let mut state = self.state.lock();
        if state.loading.is_some() {
            return None;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        state.loading = Some(generation);
        Some(LoadingGuard {
            session: self,
            generation,
        })
    }

    fn begin_edit(&self, path: &str) -> RuntimeResult<EditGuard<'_>> {
        let key = edit_key(path);
        if !self.editing.insert(key.clone()) {
            return Err(RuntimeError::EditInProgress { path: key });
        }
        Ok(EditGuard {
            editing: &self.editing,
            key,
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    // ─── Generation ──────────────────────────────────────────────────────────

    /// Handle a prompt from the user. Ignored when blank or while a generation
    /// is running. In edit mode with a selection, refines the selected node.
    pub async fn submit_prompt(&self, text: &str) -> RuntimeResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let selection = {
            let state = self.state.lock();
            if state.loading.is_some() {
                tracing::debug!("prompt ignored while loading");
                return Ok(());
            }
            if state.edit_mode {
                state.selected.clone()
            } else {
                None
            }
        };
        if let Some(path) = selection {
            return self.refine(&path, RefineRequest::Prompt(text)).await;
        }

        let Some(guard) = self.begin_loading() else {
            return Ok(());
        };
        self.push_message(Message::user(text));
        self.generate(text, text, guard.generation).await;
        Ok(())
    }

    /// Supersede the running generation. Its remaining chunks are discarded.
    pub fn cancel_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.loading = None;
        if state.history.current().preview().is_some() {
            state.history.overwrite_with(|c| c.with_preview(None));
        }
    }

    async fn generate(&self, prompt: &str, original: &str, generation: u64) {
        let mut prompt = prompt.to_string();

        for round in 0..=MAX_TOOL_ROUNDS {
            let outcome = match self.stream_round(generation, &prompt).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(error = %err, "generation stream failed");
                    self.finish(generation, Message::system(STREAM_ERROR));
                    return;
                }
            };

            match outcome {
                RoundOutcome::Superseded => {
                    tracing::debug!(generation, "generation superseded");
                    return;
                }
                RoundOutcome::Tree(tree) => {
                    self.finish(generation, Message::assistant("", tree));
                    return;
                }
                RoundOutcome::Nothing => {
                    self.finish(generation, Message::system(NO_UI));
                    return;
                }
                RoundOutcome::ToolCall { name, args } => {
                    if round == MAX_TOOL_ROUNDS {
                        tracing::warn!(tool = %name, "tool round limit reached");
                        self.finish(
                            generation,
                            Message::system(format!("Stopped after {} tool calls.", MAX_TOOL_ROUNDS)),
                        );
                        return;
                    }
                    if !self.is_current(generation) {
                        return;
                    }
                    self.push_message(Message::system(format!(
                        "Orchestrating: {} with args {}",
                        name, args
                    )));

                    let result = match self.collaborators.tools.execute(&name, &args).await {
                        Ok(result) => result,
                        Err(err) => {
                            tracing::warn!(tool = %name, error = %err, "tool failed");
                            json!({"error": true, "message": err.to_string()})
                        }
                    };
                    prompt = format!(
                        "ORIGINAL REQUEST: {}\nTOOL RESULT ({}): {}\nINSTRUCTIONS: Generate UI.",
                        original, name, result
                    );
                }
            }
        }
    }

    /// Clear the preview in place, then append exactly one message.
    fn finish(&self, generation: u64, message: Message) {
        let mut state = self.state.lock();
        if !self.is_current(generation) {
            return;
        }
        if state.history.current().preview().is_some() {
            state.history.overwrite_with(|c| c.with_preview(None));
        }
        state.history.push_with(|c| c.with_message(message));
    }

    async fn stream_round(&self, generation: u64, prompt: &str) -> Result<RoundOutcome, CollaboratorError> {
        let request = {
            let state = self.state.lock();
            GenerationRequest {
                prompt: prompt.to_string(),
                context: state.context,
                config: state.settings.clone(),
                previous: state.history.current().active_tree().cloned(),
            }
        };

        let trace = self.telemetry.start_trace("generate_ui_stream");
        let result = self.consume(generation, &trace, request).await;
        if let Err(err) = &result {
            self.telemetry
                .log_event(&trace, names::ERROR, json!({"error": err.to_string()}));
        }
        self.telemetry.end_trace(&trace);
        result
    }

    async fn consume(
        &self,
        generation: u64,
        trace: &str,
        request: GenerationRequest,
    ) -> Result<RoundOutcome, CollaboratorError> {
        let mut stream = self.collaborators.generator.generate(request).await?;
        let mut accumulator = StreamAccumulator::new();
        let mut tool_mode = false;
        let mut size = 0usize;

        let streamed = loop {
            let chunk = match stream.next().await {
                None => break Ok(()),
                Some(Err(err)) => break Err(err),
                Some(Ok(chunk)) => chunk,
            };
            if chunk.is_empty() {
                continue;
            }
            if size == 0 {
                if let Some(ttft) = self.telemetry.elapsed_ms(trace) {
                    self.telemetry.log_metric(trace, names::TTFT, ttft);
                }
            }
            size += chunk.len();

            if !self.is_current(generation) {
                self.telemetry.log_metric(trace, names::SIZE, size as f64);
                return Ok(RoundOutcome::Superseded);
            }

            let Some(frame) = accumulator.push(&chunk) else {
                continue;
            };
            if frame.get("tool_call").is_some() {
                tool_mode = true;
                continue;
            }
            if !tool_mode && frame.is_object() {
                let preview = Arc::new(frame.clone());
                let mut state = self.state.lock();
                if self.is_current(generation) {
                    state.history.overwrite_with(|c| c.with_preview(Some(preview)));
                }
            }
        };
        self.telemetry.log_metric(trace, names::SIZE, size as f64);
        streamed?;

        if !self.is_current(generation) {
            return Ok(RoundOutcome::Superseded);
        }

        let Some(response) = accumulator.finish() else {
            return Ok(RoundOutcome::Nothing);
        };
        if let Some(call) = response.get("tool_call") {
            return Ok(match call.get("name").and_then(Value::as_str) {
                Some(name) => RoundOutcome::ToolCall {
                    name: name.to_string(),
                    args: call.get("arguments").cloned().unwrap_or(Value::Null),
                },
                None => {
                    tracing::warn!(%call, "tool_call without a name");
                    RoundOutcome::Nothing
                }
            });
        }
        if tool_mode || !response.is_object() {
            return Ok(RoundOutcome::Nothing);
        }
        Ok(RoundOutcome::Tree(response))
    }

    // ─── Collaborator edits ──────────────────────────────────────────────────

    fn node_for_edit(&self, path: &str) -> RuntimeResult<(Value, Settings)> {
        let state = self.state.lock();
        let conversation = state.history.current();
        let tree = conversation.active_tree().ok_or(RuntimeError::NoActiveTree)?;
        let node = node_at(tree, path).ok_or_else(|| RuntimeError::PathNotFound {
            path: path.to_string(),
        })?;
        Ok((node, state.settings.clone()))
    }

    /// Replace a node that failed to render with a collaborator-provided fix.
    pub async fn heal(&self, path: &str, error: &str) -> RuntimeResult<()> {
        let _edit = self.begin_edit(path)?;
        let (node, settings) = self.node_for_edit(path)?;
        tracing::info!(path, "attempting to heal node");

        match self.collaborators.refiner.fix(error, &node, &settings).await {
            Ok(fixed) => self.update_active_tree(
                Some(Message::system(format!("Auto-Healed component at {}", path))),
                |tree| Ok(splice_node(tree, path, fixed)),
            ),
            Err(err) => {
                tracing::warn!(path, error = %err, "heal failed");
                self.push_message(Message::system(format!("Auto-Healing failed: {}", err)));
                Err(err.into())
            }
        }
    }

    /// Ask for a fresh visual variation of the selected node.
    pub async fn create_variation(&self) -> RuntimeResult<()> {
        let path = self.selected().ok_or(RuntimeError::NoSelection)?;
        self.refine(&path, RefineRequest::Variation).await
    }

    async fn refine(&self, path: &str, request: RefineRequest<'_>) -> RuntimeResult<()> {
        let _edit = self.begin_edit(path)?;
        let Some(_loading) = self.begin_loading() else {
            return Err(RuntimeError::Busy);
        };
        let (node, settings) = self.node_for_edit(path)?;

        let instruction = match request {
            RefineRequest::Prompt(text) => {
                self.push_message(Message::user(format!("Refine selected component: {}", text)));
                text
            }
            RefineRequest::Variation => {
                self.push_message(Message::system("Generating variation..."));
                VARIATION_INSTRUCTION
            }
        };

        match self.collaborators.refiner.refine(instruction, &node, &settings).await {
            Ok(replacement) => {
                let note = match request {
                    RefineRequest::Prompt(_) => Some(Message::system("Component updated successfully.")),
                    RefineRequest::Variation => None,
                };
                self.update_active_tree(note, |tree| Ok(splice_node(tree, path, replacement)))
            }
            Err(err) => {
                tracing::warn!(path, error = %err, "refinement failed");
                let notice = match request {
                    RefineRequest::Prompt(_) => "Failed to refine component.",
                    RefineRequest::Variation => "Failed to create variation.",
                };
                self.push_message(Message::system(notice));
                Err(err.into())
            }
        }
    }

    // ─── Dispatch ────────────────────────────────────────────────────────────

    /// Run one action. Recoverable problems (bad path, no active tree) are
    /// logged and reported as `Unchanged`; collaborator failures are errors so
    /// an enclosing `SEQUENCE` halts.
    pub fn dispatch<'a>(&'a self, action: &'a Action) -> BoxFuture<'a, Result<Dispatched, DispatchError>> {
        Box::pin(async move {
            tracing::debug!(kind = %action.kind, path = ?action.path, "dispatch");
            match action.kind() {
                ActionKind::Sequence => self.run_sequence(action).await,
                ActionKind::Delay => {
                    let ms = delay_ms(action.payload_field("ms"));
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(Dispatched::Unchanged)
                }
                ActionKind::GoBack => {
                    if self.undo() {
                        Ok(Dispatched::TreeUpdated)
                    } else {
                        self.collaborators.effects.toast(
                            Toast::new(ToastKind::Info, "Start of History").describe("Cannot go back further."),
                        );
                        Ok(Dispatched::EffectRan)
                    }
                }
                ActionKind::ShowToast => Ok(self.show_toast(action)),
                ActionKind::TriggerEffect => match action.payload_field("effect") {
                    Some(effect) => {
                        self.collaborators.effects.trigger_effect(effect);
                        Ok(Dispatched::EffectRan)
                    }
                    None => Ok(Dispatched::Unchanged),
                },
                ActionKind::CopyToClipboard => {
                    let Some(text) = action.payload_str("text").filter(|t| !t.is_empty()) else {
                        return Ok(Dispatched::Unchanged);
                    };
                    self.collaborators.effects.copy_to_clipboard(text).await?;
                    self.collaborators.effects.toast(
                        Toast::new(ToastKind::Success, "Copied to Clipboard").describe(clipboard_preview(text)),
                    );
                    Ok(Dispatched::EffectRan)
                }
                ActionKind::Download => {
                    let filename = action.payload_str("filename").filter(|f| !f.is_empty());
                    let content = action.payload_str("content").unwrap_or("");
                    self.collaborators
                        .effects
                        .download(filename.unwrap_or("download.txt"), content)
                        .await?;
                    self.collaborators.effects.toast(
                        Toast::new(ToastKind::Success, "Download Started")
                            .describe(format!("Saving {}...", filename.unwrap_or("file"))),
                    );
                    Ok(Dispatched::EffectRan)
                }
                ActionKind::Navigate => match action.payload_str("url").filter(|u| !u.is_empty()) {
                    Some(url) => {
                        self.collaborators.effects.navigate(url);
                        Ok(Dispatched::EffectRan)
                    }
                    None => Ok(Dispatched::Unchanged),
                },
                ActionKind::OpenModal => Ok(self.open_modal(action)),
                ActionKind::CloseModal => {
                    self.close_modal();
                    Ok(Dispatched::EffectRan)
                }
                ActionKind::PatchState => Ok(self.patch_state(action)),
                ActionKind::CycleState => Ok(self.cycle_state(action)),
                ActionKind::ResetForm => Ok(self.reset_form()),
                ActionKind::SubmitForm => Ok(self.submit_form().await),
                ActionKind::Custom(kind) => {
                    tracing::debug!(kind = %kind, "ignoring unhandled action");
                    Ok(Dispatched::Unchanged)
                }
            }
        })
    }

    async fn run_sequence(&self, action: &Action) -> Result<Dispatched, DispatchError> {
        let actions = action
            .payload_field("actions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut outcome = Dispatched::Unchanged;
        for raw in &actions {
            let Some(step) = Action::from_value(raw) else {
                tracing::warn!(step = %raw, "skipping malformed action in sequence");
                continue;
            };
            outcome = outcome.combine(self.dispatch(&step).await?);
        }
        Ok(outcome)
    }

    fn show_toast(&self, action: &Action) -> Dispatched {
        if action.payload.is_none() {
            return Dispatched::Unchanged;
        }
        let title = action
            .payload_str("title")
            .or_else(|| action.payload_str("message"))
            .filter(|t| !t.is_empty())
            .unwrap_or("Notification");
        let kind = action
            .payload_str("type")
            .map(ToastKind::parse)
            .unwrap_or_default();
        let mut toast = Toast::new(kind, title);
        if let Some(description) = action.payload_str("description") {
            toast = toast.describe(description);
        }
        self.collaborators.effects.toast(toast);
        Dispatched::EffectRan
    }

    fn open_modal(&self, action: &Action) -> Dispatched {
        let Some(payload) = action.payload.as_ref() else {
            tracing::warn!("OPEN_MODAL without payload");
            return Dispatched::Unchanged;
        };
        let content = payload
            .get("content")
            .filter(|c| !c.is_null())
            .cloned()
            .unwrap_or_else(|| payload.clone());
        let title = payload.get("title").and_then(Value::as_str).map(str::to_string);
        self.state.lock().modal = Some(Modal { title, content });
        Dispatched::EffectRan
    }

    fn patch_state(&self, action: &Action) -> Dispatched {
        let Some(path) = action.path.as_deref() else {
            tracing::warn!("PATCH_STATE without path");
            return Dispatched::Unchanged;
        };
        let Some(partial) = action.payload.as_ref().and_then(Value::as_object) else {
            tracing::warn!(path, "PATCH_STATE without an object payload");
            return Dispatched::Unchanged;
        };
        match self.update_active_tree(None, |tree| Ok(merge_at_path(tree, path, partial)?)) {
            Ok(()) => Dispatched::TreeUpdated,
            Err(err) => {
                tracing::warn!(path, error = %err, "PATCH_STATE ignored");
                Dispatched::Unchanged
            }
        }
    }

    /// Merge the first pending state into the props and hand the rest of
    /// the cycle to the next click.
    fn cycle_state(&self, action: &Action) -> Dispatched {
        let Some(path) = action.path.as_deref() else {
            tracing::warn!("CYCLE_STATE without path");
            return Dispatched::Unchanged;
        };
        let Some(states) = action
            .payload_field("next")
            .and_then(Value::as_array)
            .filter(|states| !states.is_empty())
        else {
            tracing::warn!(path, "CYCLE_STATE without pending states");
            return Dispatched::Unchanged;
        };

        let next_state = states[0].as_object().cloned().unwrap_or_default();
        let remaining = &states[1..];
        let derived = if remaining.is_empty() {
            next_state.get("action").cloned()
        } else {
            Some(
                Action::new(ActionKind::CycleState.as_str())
                    .with_path(path)
                    .with_payload(json!({ "next": remaining }))
                    .to_value(),
            )
        };

        let result = self.update_active_tree(None, |tree| {
            let current = get_by_path(tree, path).ok_or_else(|| TreeError::PathNotFound {
                path: path.to_string(),
            })?;
            let Value::Object(current) = current else {
                return Err(TreeError::NotAnObject {
                    path: path.to_string(),
                    found: genui_tree::error::type_name(current),
                }
                .into());
            };
            let mut props: Map<String, Value> = current
                .iter()
                .filter(|(key, _)| derived.is_some() || key.as_str() != "action")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            for (key, value) in next_state {
                if key != "action" {
                    props.insert(key, value);
                }
            }
            if let Some(derived) = derived {
                props.insert("action".to_string(), derived);
            }
            Ok(set_by_path(tree, path, Value::Object(props)))
        });

        match result {
            Ok(()) => Dispatched::TreeUpdated,
            Err(err) => {
                tracing::warn!(path, error = %err, "CYCLE_STATE ignored");
                Dispatched::Unchanged
            }
        }
    }

    fn reset_form(&self) -> Dispatched {
        match self.update_active_tree(None, |tree| Ok(reset_form(tree))) {
            Ok(()) => {
                self.collaborators
                    .effects
                    .toast(Toast::new(ToastKind::Info, "Reset").describe("Form fields cleared."));
                Dispatched::TreeUpdated
            }
            Err(err) => {
                tracing::warn!(error = %err, "RESET_FORM ignored");
                Dispatched::Unchanged
            }
        }
    }

    async fn submit_form(&self) -> Dispatched {
        let Some(guard) = self.begin_loading() else {
            tracing::warn!("SUBMIT_FORM ignored while a generation is running");
            return Dispatched::Unchanged;
        };
        let Some(tree) = self.active_tree() else {
            tracing::warn!("SUBMIT_FORM without an active tree");
            return Dispatched::Unchanged;
        };

        let data = Value::Object(collect_form_data(&tree));
        let record = serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());
        self.push_message(Message::system("Submitting form data..."));
        self.generate(
            &format!("User Submitted Form Data: {}", record),
            "Form Submission",
            guard.generation,
        )
        .await;
        Dispatched::TreeUpdated
    }
}
