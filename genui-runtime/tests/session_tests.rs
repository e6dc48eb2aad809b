use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use genui_runtime::telemetry::names;
use genui_runtime::{
    ChunkStream, CollaboratorError, Collaborators, DispatchError, Dispatched, Effects,
    GenerationRequest, Generator, Metrics, Modal, Refiner, Role, RuntimeError, ScriptedGenerator,
    Session, Settings, SettingsStore, Telemetry, Toast, ToastKind, ToolExecutor, DIAGNOSTICS_COMMAND,
    MAX_HISTORY,
};
use genui_tree::Action;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::ReceiverStream;

// Fakes

#[derive(Default)]
struct RecordingEffects {
    toasts: Mutex<Vec<Toast>>,
    copied: Mutex<Vec<String>>,
    downloads: Mutex<Vec<(String, String)>>,
    navigated: Mutex<Vec<String>>,
    effects: Mutex<Vec<Value>>,
    fail_clipboard: bool,
}

impl RecordingEffects {
    fn failing_clipboard() -> Self {
        Self {
            fail_clipboard: true,
            ..Self::default()
        }
    }

    fn toast_titles(&self) -> Vec<String> {
        self.toasts.lock().iter().map(|t| t.title.clone()).collect()
    }

    fn last_toast(&self) -> Toast {
        self.toasts.lock().last().cloned().unwrap()
    }
}

#[async_trait]
impl Effects for RecordingEffects {
    fn toast(&self, toast: Toast) {
        self.toasts.lock().push(toast);
    }

    fn trigger_effect(&self, effect: &Value) {
        self.effects.lock().push(effect.clone());
    }

    async fn copy_to_clipboard(&self, text: &str) -> Result<(), CollaboratorError> {
        if self.fail_clipboard {
            return Err(CollaboratorError::Effect {
                effect: "clipboard".to_string(),
                message: "denied".to_string(),
            });
        }
        self.copied.lock().push(text.to_string());
        Ok(())
    }

    async fn download(&self, filename: &str, content: &str) -> Result<(), CollaboratorError> {
        self.downloads
            .lock()
            .push((filename.to_string(), content.to_string()));
        Ok(())
    }

    fn navigate(&self, url: &str) {
        self.navigated.lock().push(url.to_string());
    }
}

/// Scripted responses that also records every request.
struct RecordingGenerator {
    responses: Vec<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl RecordingGenerator {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: responses.iter().map(|r| r.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.prompt.clone()).collect()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<ChunkStream, CollaboratorError> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(request);
            requests.len() - 1
        };
        let response = self
            .responses
            .get(call)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default();
        let chunks = genui_runtime::collaborators::chunk_text(&response, 8)
            .into_iter()
            .map(Ok)
            .collect::<Vec<_>>();
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }
}

/// Sends a partial frame, then fails mid-stream.
struct BrokenGenerator;

#[async_trait]
impl Generator for BrokenGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<ChunkStream, CollaboratorError> {
        let items = vec![
            Ok(r#"{"text":{"content":"Par"#.to_string()),
            Err(CollaboratorError::Stream("connection reset".to_string())),
        ];
        Ok(Box::pin(tokio_stream::iter(items)))
    }
}

/// Holds `generate` open until released.
#[derive(Default)]
struct GatedGenerator {
    gate: Notify,
    waiting: AtomicBool,
}

#[async_trait]
impl Generator for GatedGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<ChunkStream, CollaboratorError> {
        self.waiting.store(true, Ordering::SeqCst);
        self.gate.notified().await;
        let chunks = vec![Ok(r#"{"text":{"content":"late"}}"#.to_string())];
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }
}

/// Streams whatever the test sends until the sender is dropped.
struct ChannelGenerator {
    chunks: Mutex<Option<mpsc::Receiver<Result<String, CollaboratorError>>>>,
}

impl ChannelGenerator {
    fn new() -> (Self, mpsc::Sender<Result<String, CollaboratorError>>) {
        let (tx, rx) = mpsc::channel(8);
        let generator = Self {
            chunks: Mutex::new(Some(rx)),
        };
        (generator, tx)
    }
}

#[async_trait]
impl Generator for ChannelGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<ChunkStream, CollaboratorError> {
        let rx = self
            .chunks
            .lock()
            .take()
            .ok_or_else(|| CollaboratorError::Stream("already streamed".to_string()))?;
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

struct FakeRefiner {
    reply: Result<Value, CollaboratorError>,
    gate: Option<Arc<Notify>>,
    seen: Mutex<Vec<(String, Value)>>,
}

impl FakeRefiner {
    fn replying(reply: Value) -> Self {
        Self {
            reply: Ok(reply),
            gate: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn gated(reply: Value, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::replying(reply)
        }
    }

    async fn answer(&self, text: &str, node: &Value) -> Result<Value, CollaboratorError> {
        self.seen.lock().push((text.to_string(), node.clone()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.reply.clone()
    }
}

#[async_trait]
impl Refiner for FakeRefiner {
    async fn refine(&self, instruction: &str, node: &Value, _config: &Settings) -> Result<Value, CollaboratorError> {
        self.answer(instruction, node).await
    }

    async fn fix(&self, error: &str, node: &Value, _config: &Settings) -> Result<Value, CollaboratorError> {
        self.answer(error, node).await
    }
}

struct FakeTools {
    result: Value,
    calls: AtomicUsize,
}

#[async_trait]
impl ToolExecutor for FakeTools {
    async fn execute(&self, _name: &str, _args: &Value) -> Result<Value, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

fn session(collaborators: Collaborators) -> Session {
    Session::new(collaborators, Arc::new(Telemetry::new()))
}

fn idle_session() -> Session {
    session(Collaborators::new(Arc::new(ScriptedGenerator::new(["{}"], 8))))
}

fn session_with_effects(effects: Arc<RecordingEffects>) -> Session {
    session(Collaborators::new(Arc::new(ScriptedGenerator::new(["{}"], 8))).with_effects(effects))
}

fn tree(session: &Session) -> Value {
    session.active_tree().map(|t| t.as_ref().clone()).unwrap()
}

fn last_content(session: &Session) -> String {
    session.snapshot().last_message().unwrap().content.clone()
}

fn action(value: Value) -> Action {
    Action::from_value(&value).unwrap()
}

// Generation

#[tokio::test]
async fn test_prompt_streams_tree_into_history() {
    let response = r#"{"container":{"children":[{"text":{"content":"Hello"}},{"progress":{"value":40}}]}}"#;
    let session = session(Collaborators::new(Arc::new(ScriptedGenerator::new([response], 7))));
    let mut events = session.telemetry().subscribe();

    session.submit_prompt("Build a status panel").await.unwrap();

    let snapshot = session.snapshot();
    let messages = snapshot.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content, "Build a status panel");
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(tree(&session), serde_json::from_str::<Value>(response).unwrap());
    assert!(session.preview().is_none());
    assert!(!session.is_loading());
    assert_eq!(session.history_len(), 3);

    let names: Vec<String> = events.drain().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["STREAM_START", "TTFT", "SIZE", "LATENCY", "STREAM_COMPLETE"]);
}

#[tokio::test]
async fn test_blank_prompt_is_ignored() {
    let generator = ScriptedGenerator::new(["{}"], 8);
    let session = session(Collaborators::new(Arc::new(generator.clone())));

    session.submit_prompt("   ").await.unwrap();

    assert_eq!(session.history_len(), 1);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_previous_tree_is_sent_with_request() {
    let generator = Arc::new(RecordingGenerator::new(&[r#"{"text":{"content":"v2"}}"#]));
    let session = session(Collaborators::new(generator.clone()));
    let first = json!({"text": {"content": "v1"}});
    session.show_tree("", first.clone());

    session.submit_prompt("Make it say v2").await.unwrap();

    let requests = generator.requests.lock();
    assert_eq!(requests[0].previous.as_deref(), Some(&first));
    assert_eq!(tree(&session), json!({"text": {"content": "v2"}}));
}

#[tokio::test]
async fn test_empty_response_posts_notice() {
    let session = session(Collaborators::new(Arc::new(ScriptedGenerator::new([""], 8))));

    session.submit_prompt("Anything").await.unwrap();

    assert!(session.active_tree().is_none());
    assert_eq!(last_content(&session), "The model did not return a renderable UI.");
}

#[tokio::test]
async fn test_stream_error_posts_notice_and_clears_preview() {
    let session = session(Collaborators::new(Arc::new(BrokenGenerator)));
    let mut events = session.telemetry().subscribe();

    session.submit_prompt("Break").await.unwrap();

    assert_eq!(last_content(&session), "Error rendering stream. Check settings.");
    assert!(session.preview().is_none());
    assert!(session.active_tree().is_none());
    assert!(!session.is_loading());
    assert!(events.drain().iter().any(|e| e.name == names::ERROR));
}

#[tokio::test]
async fn test_cancelled_generation_never_writes() {
    let generator = Arc::new(GatedGenerator::default());
    let session = session(Collaborators::new(generator.clone()));

    let run = session.submit_prompt("Slow one");
    let cancel = async {
        while !generator.waiting.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        // Busy sessions drop new prompts.
        session.submit_prompt("Impatient").await.unwrap();
        session.cancel_generation();
        generator.gate.notify_one();
    };
    let (result, ()) = tokio::join!(run, cancel);
    result.unwrap();

    let snapshot = session.snapshot();
    let contents: Vec<&str> = snapshot.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[1], "Slow one");
    assert!(session.active_tree().is_none());
    assert!(session.preview().is_none());
    assert!(!session.is_loading());
}

// Tool calls

#[tokio::test]
async fn test_tool_call_round_trip() {
    let generator = Arc::new(RecordingGenerator::new(&[
        r#"{"tool_call":{"name":"weather","arguments":{"city":"Oslo"}}}"#,
        r#"{"text":{"content":"Sunny in Oslo"}}"#,
    ]));
    let tools = Arc::new(FakeTools {
        result: json!({"temp": 21}),
        calls: AtomicUsize::new(0),
    });
    let session = session(Collaborators::new(generator.clone()).with_tools(tools.clone()));

    session.submit_prompt("Weather in Oslo").await.unwrap();

    let snapshot = session.snapshot();
    let contents: Vec<&str> = snapshot.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents[2], r#"Orchestrating: weather with args {"city":"Oslo"}"#);
    assert_eq!(tree(&session), json!({"text": {"content": "Sunny in Oslo"}}));
    assert_eq!(tools.calls.load(Ordering::SeqCst), 1);

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(
        prompts[1],
        "ORIGINAL REQUEST: Weather in Oslo\nTOOL RESULT (weather): {\"temp\":21}\nINSTRUCTIONS: Generate UI."
    );
}

#[tokio::test]
async fn test_undo_across_tool_round_leaves_no_preview() {
    // Small chunks put a preview on screen before the tool call is recognised.
    let generator = ScriptedGenerator::new(
        [
            r#"{ "tool_call":{"name":"weather","arguments":{"city":"Oslo"}}}"#,
            r#"{"text":{"content":"Sunny"}}"#,
        ],
        2,
    );
    let tools = Arc::new(FakeTools {
        result: json!({"temp": 21}),
        calls: AtomicUsize::new(0),
    });
    let session = session(Collaborators::new(Arc::new(generator)).with_tools(tools));

    session.submit_prompt("Weather in Oslo").await.unwrap();
    assert_eq!(tree(&session), json!({"text": {"content": "Sunny"}}));
    assert!(session.preview().is_none());

    let mut steps = 0;
    while session.undo() {
        steps += 1;
        assert!(session.preview().is_none(), "preview visible after {} undo steps", steps);
        assert!(session.render_plan().is_none());
    }
    assert_eq!(steps, 3);
    while session.redo() {
        assert!(session.preview().is_none());
    }
}

#[tokio::test]
async fn test_patch_during_stream_keeps_preview_on_the_head() {
    let (generator, chunks) = ChannelGenerator::new();
    let session = session(Collaborators::new(Arc::new(generator)));
    session.show_tree("", json!({"progress": {"value": 10}}));
    chunks
        .send(Ok(r#"{"text":{"content":"Par"#.to_string()))
        .await
        .unwrap();

    let run = session.submit_prompt("Replace it");
    let patch_mid_stream = async {
        while session.preview().is_none() {
            tokio::task::yield_now().await;
        }
        let patch = action(json!({"type": "PATCH_STATE", "path": "root.progress", "payload": {"value": 90}}));
        assert_eq!(session.dispatch(&patch).await.unwrap(), Dispatched::TreeUpdated);
        assert_eq!(session.preview().as_deref(), Some(&json!({"text": {"content": "Par"}})));
        chunks.send(Ok(r#"tial"}}"#.to_string())).await.unwrap();
        drop(chunks);
    };
    let (result, ()) = tokio::join!(run, patch_mid_stream);
    result.unwrap();

    assert_eq!(tree(&session), json!({"text": {"content": "Partial"}}));
    assert!(session.preview().is_none());
    while session.undo() {
        assert!(session.preview().is_none());
    }
}

#[tokio::test]
async fn test_tool_failure_is_fed_back_to_model() {
    let generator = Arc::new(RecordingGenerator::new(&[
        r#"{"tool_call":{"name":"weather","arguments":{}}}"#,
        r#"{"text":{"content":"No data"}}"#,
    ]));
    let session = session(Collaborators::new(generator.clone()));

    session.submit_prompt("Weather").await.unwrap();

    let prompts = generator.prompts();
    assert!(prompts[1].contains(r#""error":true"#));
    assert!(prompts[1].contains("no tool executor configured"));
    assert_eq!(tree(&session), json!({"text": {"content": "No data"}}));
}

#[tokio::test]
async fn test_tool_rounds_are_bounded() {
    let generator = Arc::new(RecordingGenerator::new(&[r#"{"tool_call":{"name":"loop","arguments":{}}}"#]));
    let tools = Arc::new(FakeTools {
        result: json!({}),
        calls: AtomicUsize::new(0),
    });
    let session = session(Collaborators::new(generator.clone()).with_tools(tools.clone()));

    session.submit_prompt("Forever").await.unwrap();

    assert_eq!(generator.prompts().len(), genui_runtime::MAX_TOOL_ROUNDS + 1);
    assert_eq!(tools.calls.load(Ordering::SeqCst), genui_runtime::MAX_TOOL_ROUNDS);
    assert_eq!(last_content(&session), "Stopped after 4 tool calls.");
    assert!(!session.is_loading());
}

// Actions

#[tokio::test]
async fn test_cycle_state_walks_the_chain() {
    let session = idle_session();
    session.show_tree(
        "",
        json!({"button": {"label": "A", "action": {
            "type": "CYCLE_STATE",
            "path": "root.button",
            "payload": {"next": [{"label": "B"}, {"label": "C", "action": {"type": "DONE"}}]}
        }}}),
    );

    let first = action(tree(&session)["button"]["action"].clone());
    assert_eq!(session.dispatch(&first).await.unwrap(), Dispatched::TreeUpdated);
    let current = tree(&session);
    assert_eq!(current["button"]["label"], json!("B"));
    assert_eq!(
        current["button"]["action"],
        json!({
            "type": "CYCLE_STATE",
            "path": "root.button",
            "payload": {"next": [{"label": "C", "action": {"type": "DONE"}}]}
        })
    );

    let second = action(current["button"]["action"].clone());
    session.dispatch(&second).await.unwrap();
    let current = tree(&session);
    assert_eq!(current["button"], json!({"label": "C", "action": {"type": "DONE"}}));

    let done = action(current["button"]["action"].clone());
    assert_eq!(session.dispatch(&done).await.unwrap(), Dispatched::Unchanged);
}

#[tokio::test]
async fn test_cycle_state_last_state_without_action_drops_it() {
    let session = idle_session();
    session.show_tree(
        "",
        json!({"button": {"label": "On", "action": {
            "type": "CYCLE_STATE",
            "path": "root.button",
            "payload": {"next": [{"label": "Off"}]}
        }}}),
    );

    let cycle = action(tree(&session)["button"]["action"].clone());
    session.dispatch(&cycle).await.unwrap();

    assert_eq!(tree(&session), json!({"button": {"label": "Off"}}));
}

#[tokio::test]
async fn test_reset_form_clears_controls() {
    let effects = Arc::new(RecordingEffects::default());
    let session = session_with_effects(effects.clone());
    session.show_tree(
        "",
        json!({"card": {"children": [
            {"input": {"label": "Name", "value": "Ada"}},
            {"switch": {"label": "News", "value": true}},
            {"slider": {"label": "Rating", "min": 1, "max": 5, "value": 4}},
            {"button": {"label": "Clear", "action": {"type": "RESET_FORM"}}}
        ]}}),
    );

    let reset = action(json!({"type": "RESET_FORM"}));
    assert_eq!(session.dispatch(&reset).await.unwrap(), Dispatched::TreeUpdated);

    let children = tree(&session)["card"]["children"].clone();
    assert_eq!(children[0]["input"]["value"], json!(""));
    assert_eq!(children[1]["switch"]["value"], json!(false));
    assert_eq!(children[2]["slider"]["value"], json!(1));
    let toast = effects.last_toast();
    assert_eq!(toast.title, "Reset");
    assert_eq!(toast.kind, ToastKind::Info);
    assert_eq!(toast.description.as_deref(), Some("Form fields cleared."));
}

#[tokio::test]
async fn test_submit_form_sends_collected_values() {
    let generator = Arc::new(RecordingGenerator::new(&[r#"{"text":{"content":"Thanks, Ada"}}"#]));
    let session = session(Collaborators::new(generator.clone()));
    session.show_tree(
        "",
        json!({"card": {"children": [
            {"input": {"label": "Name", "value": "Ada"}},
            {"switch": {"label": "News", "value": true}},
            {"button": {"label": "Send", "action": {"type": "SUBMIT_FORM"}}}
        ]}}),
    );

    let submit = action(json!({"type": "SUBMIT_FORM"}));
    assert_eq!(session.dispatch(&submit).await.unwrap(), Dispatched::TreeUpdated);

    let prompts = generator.prompts();
    assert!(prompts[0].starts_with("User Submitted Form Data: "));
    assert!(prompts[0].contains(r#""Name": "Ada""#));
    assert!(prompts[0].contains(r#""News": true"#));

    let snapshot = session.snapshot();
    assert!(snapshot
        .messages()
        .iter()
        .any(|m| m.content == "Submitting form data..."));
    assert_eq!(tree(&session), json!({"text": {"content": "Thanks, Ada"}}));
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_patch_after_streaming() {
    let response = r#"{"container":{"children":[{"progress":{"value":10,"label":"Upload"}}]}}"#;
    let session = session(Collaborators::new(Arc::new(ScriptedGenerator::new([response], 5))));
    session.submit_prompt("Upload progress").await.unwrap();

    let patch = action(json!({
        "type": "PATCH_STATE",
        "path": "root.container.children.0.progress",
        "payload": {"value": 80}
    }));
    assert_eq!(session.dispatch(&patch).await.unwrap(), Dispatched::TreeUpdated);
    assert_eq!(
        tree(&session)["container"]["children"][0]["progress"],
        json!({"value": 80, "label": "Upload"})
    );

    assert!(session.undo());
    assert_eq!(tree(&session)["container"]["children"][0]["progress"]["value"], json!(10));
    assert!(session.redo());
    assert_eq!(tree(&session)["container"]["children"][0]["progress"]["value"], json!(80));
}

#[tokio::test]
async fn test_patch_on_missing_path_is_ignored() {
    let session = idle_session();
    let patch = action(json!({"type": "PATCH_STATE", "path": "root.text", "payload": {"content": "x"}}));

    // No tree yet.
    assert_eq!(session.dispatch(&patch).await.unwrap(), Dispatched::Unchanged);

    session.show_tree("", json!({"button": {"label": "Go"}}));
    let len = session.history_len();
    assert_eq!(session.dispatch(&patch).await.unwrap(), Dispatched::Unchanged);
    assert_eq!(session.history_len(), len);
    assert_eq!(tree(&session), json!({"button": {"label": "Go"}}));
}

#[tokio::test]
async fn test_history_stays_bounded() {
    let session = idle_session();
    session.show_tree("", json!({"progress": {"value": 0}}));

    for value in 0..60 {
        let patch = action(json!({"type": "PATCH_STATE", "path": "root.progress", "payload": {"value": value}}));
        session.dispatch(&patch).await.unwrap();
    }

    assert_eq!(session.history_len(), MAX_HISTORY);
    assert_eq!(tree(&session), json!({"progress": {"value": 59}}));
    assert!(session.can_undo());
    assert!(!session.can_redo());
}

#[tokio::test]
async fn test_sequence_runs_in_order_with_delay() {
    let session = idle_session();
    session.show_tree("", json!({"text": {"content": "a"}}));

    let sequence = action(json!({"type": "SEQUENCE", "payload": {"actions": [
        {"type": "PATCH_STATE", "path": "root.text", "payload": {"content": "b"}},
        {"type": "DELAY", "payload": {"ms": 1}},
        {"type": "PATCH_STATE", "path": "root.text", "payload": {"variant": "h1"}}
    ]}}));

    assert_eq!(session.dispatch(&sequence).await.unwrap(), Dispatched::TreeUpdated);
    assert_eq!(tree(&session), json!({"text": {"content": "b", "variant": "h1"}}));
}

#[tokio::test]
async fn test_patch_during_sequence_delay_is_kept() {
    let session = idle_session();
    session.show_tree("", json!({"text": {"content": "x"}}));

    let sequence = action(json!({"type": "SEQUENCE", "payload": {"actions": [
        {"type": "PATCH_STATE", "path": "root.text", "payload": {"content": "a"}},
        {"type": "DELAY", "payload": {"ms": 20}},
        {"type": "PATCH_STATE", "path": "root.text", "payload": {"variant": "h1"}}
    ]}}));
    let direct = action(json!({"type": "PATCH_STATE", "path": "root.text", "payload": {"color": "MUTED"}}));

    let (sequenced, patched) = tokio::join!(session.dispatch(&sequence), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        session.dispatch(&direct).await
    });

    assert_eq!(sequenced.unwrap(), Dispatched::TreeUpdated);
    assert_eq!(patched.unwrap(), Dispatched::TreeUpdated);
    assert_eq!(
        tree(&session),
        json!({"text": {"content": "a", "color": "MUTED", "variant": "h1"}})
    );
}

#[tokio::test]
async fn test_sequence_halts_on_collaborator_error() {
    let effects = Arc::new(RecordingEffects::failing_clipboard());
    let session = session_with_effects(effects.clone());

    let sequence = action(json!({"type": "SEQUENCE", "payload": {"actions": [
        {"type": "SHOW_TOAST", "payload": {"title": "first"}},
        {"type": "COPY_TO_CLIPBOARD", "payload": {"text": "secret"}},
        {"type": "SHOW_TOAST", "payload": {"title": "never"}}
    ]}}));

    let err = session.dispatch(&sequence).await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::Collaborator(CollaboratorError::Effect {
            effect: "clipboard".to_string(),
            message: "denied".to_string(),
        })
    );
    assert_eq!(effects.toast_titles(), vec!["first"]);
}

#[tokio::test]
async fn test_go_back_at_start_of_history_toasts() {
    let effects = Arc::new(RecordingEffects::default());
    let session = session_with_effects(effects.clone());
    let go_back = action(json!({"type": "GO_BACK"}));

    assert_eq!(session.dispatch(&go_back).await.unwrap(), Dispatched::EffectRan);
    assert_eq!(effects.last_toast().title, "Start of History");

    session.show_tree("", json!({"text": {"content": "x"}}));
    assert_eq!(session.dispatch(&go_back).await.unwrap(), Dispatched::TreeUpdated);
    assert!(session.active_tree().is_none());
}

#[tokio::test]
async fn test_toast_defaults() {
    let effects = Arc::new(RecordingEffects::default());
    let session = session_with_effects(effects.clone());

    session
        .dispatch(&action(json!({"type": "SHOW_TOAST", "payload": {"message": "Saved"}})))
        .await
        .unwrap();
    assert_eq!(effects.last_toast(), Toast::new(ToastKind::Info, "Saved"));

    session
        .dispatch(&action(json!({"type": "SHOW_TOAST", "payload": {}})))
        .await
        .unwrap();
    assert_eq!(effects.last_toast().title, "Notification");

    session
        .dispatch(&action(json!({"type": "SHOW_TOAST", "payload": {
            "title": "Oops", "type": "ERROR", "description": "bad"
        }})))
        .await
        .unwrap();
    assert_eq!(
        effects.last_toast(),
        Toast::new(ToastKind::Error, "Oops").describe("bad")
    );

    let bare = action(json!({"type": "SHOW_TOAST"}));
    assert_eq!(session.dispatch(&bare).await.unwrap(), Dispatched::Unchanged);
    assert_eq!(effects.toasts.lock().len(), 3);
}

#[tokio::test]
async fn test_effect_actions_reach_the_sink() {
    let effects = Arc::new(RecordingEffects::default());
    let session = session_with_effects(effects.clone());
    let long = "abcdefghij".repeat(4);

    session
        .dispatch(&action(json!({"type": "COPY_TO_CLIPBOARD", "payload": {"text": long.as_str()}})))
        .await
        .unwrap();
    assert_eq!(effects.copied.lock().clone(), vec![long.clone()]);
    let toast = effects.last_toast();
    assert_eq!(toast.kind, ToastKind::Success);
    assert_eq!(toast.description, Some(format!("\"{}...\"", &long[..30])));

    session
        .dispatch(&action(json!({"type": "DOWNLOAD", "payload": {"content": "a,b"}})))
        .await
        .unwrap();
    assert_eq!(
        effects.downloads.lock().clone(),
        vec![("download.txt".to_string(), "a,b".to_string())]
    );
    assert_eq!(effects.last_toast().description.as_deref(), Some("Saving file..."));

    session
        .dispatch(&action(json!({"type": "NAVIGATE", "payload": {"url": "https://example.com"}})))
        .await
        .unwrap();
    assert_eq!(effects.navigated.lock().clone(), vec!["https://example.com".to_string()]);

    session
        .dispatch(&action(json!({"type": "TRIGGER_EFFECT", "payload": {"effect": "confetti"}})))
        .await
        .unwrap();
    assert_eq!(effects.effects.lock().clone(), vec![json!("confetti")]);
}

#[tokio::test]
async fn test_modal_open_and_close() {
    let session = idle_session();

    let open = action(json!({"type": "OPEN_MODAL", "payload": {
        "title": "Details",
        "content": {"text": {"content": "Hi"}}
    }}));
    assert_eq!(session.dispatch(&open).await.unwrap(), Dispatched::EffectRan);
    assert_eq!(
        session.modal(),
        Some(Modal {
            title: Some("Details".to_string()),
            content: json!({"text": {"content": "Hi"}}),
        })
    );

    session.dispatch(&action(json!({"type": "CLOSE_MODAL"}))).await.unwrap();
    assert!(session.modal().is_none());

    let raw = action(json!({"type": "OPEN_MODAL", "payload": {"text": {"content": "Inline"}}}));
    session.dispatch(&raw).await.unwrap();
    assert_eq!(session.modal().unwrap().content, json!({"text": {"content": "Inline"}}));
}

#[tokio::test]
async fn test_unknown_action_is_ignored() {
    let session = idle_session();
    let custom = action(json!({"type": "LAUNCH_ROCKET"}));
    assert_eq!(session.dispatch(&custom).await.unwrap(), Dispatched::Unchanged);
}

// Heal and refine

fn broken_card() -> Value {
    json!({"card": {"children": [{"progress": {"value": "most"}}, {"text": {"content": "ok"}}]}})
}

#[tokio::test]
async fn test_heal_splices_fixed_node() {
    let refiner = Arc::new(FakeRefiner::replying(json!({"progress": {"value": 50}})));
    let session = session(Collaborators::new(Arc::new(ScriptedGenerator::new(["{}"], 8))).with_refiner(refiner.clone()));
    session.show_tree("", broken_card());

    session
        .heal("root.card.children.0.progress", "value must be a number")
        .await
        .unwrap();

    assert_eq!(
        tree(&session),
        json!({"card": {"children": [{"progress": {"value": 50}}, {"text": {"content": "ok"}}]}})
    );
    assert_eq!(last_content(&session), "Auto-Healed component at root.card.children.0.progress");
    let seen = refiner.seen.lock();
    assert_eq!(seen[0].0, "value must be a number");
    assert_eq!(seen[0].1, json!({"progress": {"value": "most"}}));
}

#[tokio::test]
async fn test_heal_failure_keeps_tree() {
    let session = idle_session();
    session.show_tree("", broken_card());

    let err = session.heal("root.card.children.0.progress", "bad").await.unwrap_err();

    assert!(matches!(err, RuntimeError::Collaborator(_)));
    assert_eq!(tree(&session), broken_card());
    assert!(last_content(&session).starts_with("Auto-Healing failed:"));
}

#[tokio::test]
async fn test_heal_requires_resolvable_path() {
    let session = idle_session();
    assert!(matches!(
        session.heal("root.card", "x").await,
        Err(RuntimeError::NoActiveTree)
    ));

    session.show_tree("", broken_card());
    assert!(matches!(
        session.heal("root.card.children.7", "x").await,
        Err(RuntimeError::PathNotFound { .. })
    ));
}

#[tokio::test]
async fn test_concurrent_edit_on_same_path_is_rejected() {
    let gate = Arc::new(Notify::new());
    let refiner = Arc::new(FakeRefiner::gated(json!({"progress": {"value": 50}}), gate.clone()));
    let session = session(Collaborators::new(Arc::new(ScriptedGenerator::new(["{}"], 8))).with_refiner(refiner));
    session.show_tree("", broken_card());
    let path = "root.card.children.0.progress";

    let first = session.heal(path, "first");
    let second = async {
        tokio::task::yield_now().await;
        let result = session.heal(path, "second").await;
        gate.notify_one();
        result
    };
    let (first, second) = tokio::join!(first, second);

    first.unwrap();
    assert!(matches!(second, Err(RuntimeError::EditInProgress { .. })));

    // The guard is released once the first edit finishes.
    gate.notify_one();
    session.heal(path, "third").await.unwrap();
}

#[tokio::test]
async fn test_prompt_in_edit_mode_refines_selection() {
    let generator = ScriptedGenerator::new(["{}"], 8);
    let refiner = Arc::new(FakeRefiner::replying(json!({"button": {"label": "Refined", "variant": "primary"}})));
    let session = session(Collaborators::new(Arc::new(generator.clone())).with_refiner(refiner.clone()));
    session.show_tree("", json!({"card": {"children": [{"button": {"label": "Go"}}]}}));
    session.set_edit_mode(true);
    session.select(Some("root.card.children.0.button".to_string()));

    session.submit_prompt("make it bold").await.unwrap();

    assert_eq!(
        tree(&session),
        json!({"card": {"children": [{"button": {"label": "Refined", "variant": "primary"}}]}})
    );
    let snapshot = session.snapshot();
    let contents: Vec<&str> = snapshot.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents[contents.len() - 2..].to_vec(),
        vec!["Refine selected component: make it bold", "Component updated successfully."]
    );
    assert_eq!(generator.calls(), 0);
    assert_eq!(refiner.seen.lock()[0].0, "make it bold");
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_create_variation() {
    let refiner = Arc::new(FakeRefiner::replying(json!({"text": {"content": "Hi", "variant": "h1"}})));
    let session = session(Collaborators::new(Arc::new(ScriptedGenerator::new(["{}"], 8))).with_refiner(refiner.clone()));
    session.show_tree("", json!({"text": {"content": "Hi"}}));

    assert!(matches!(session.create_variation().await, Err(RuntimeError::NoSelection)));

    session.select(Some("root.text".to_string()));
    session.create_variation().await.unwrap();

    assert_eq!(tree(&session), json!({"text": {"content": "Hi", "variant": "h1"}}));
    assert!(refiner.seen.lock()[0].0.starts_with("Create a distinct visual variation"));
    assert!(session
        .snapshot()
        .messages()
        .iter()
        .any(|m| m.content == "Generating variation..."));
}

#[tokio::test]
async fn test_variation_may_change_the_tag() {
    let refiner = Arc::new(FakeRefiner::replying(json!({"card": {"title": "Fresh"}})));
    let session = session(Collaborators::new(Arc::new(ScriptedGenerator::new(["{}"], 8))).with_refiner(refiner));
    session.show_tree("", json!({"container": {"children": [{"button": {"label": "Go"}}]}}));

    session.select(Some("root.container.children.0.button".to_string()));
    session.create_variation().await.unwrap();

    assert_eq!(
        tree(&session),
        json!({"container": {"children": [{"card": {"title": "Fresh"}}]}})
    );
}

#[tokio::test]
async fn test_failed_variation_posts_notice() {
    let session = idle_session();
    session.show_tree("", json!({"text": {"content": "Hi"}}));
    session.select(Some("root.text".to_string()));

    assert!(session.create_variation().await.is_err());
    assert_eq!(last_content(&session), "Failed to create variation.");
    assert_eq!(tree(&session), json!({"text": {"content": "Hi"}}));
}

// Rendering and settings

#[tokio::test]
async fn test_run_diagnostics_shows_every_component() {
    let effects = Arc::new(RecordingEffects::default());
    let session = session_with_effects(effects.clone());

    session.run_diagnostics().unwrap();

    let snapshot = session.snapshot();
    let contents: Vec<&str> = snapshot.messages()[1..].iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![DIAGNOSTICS_COMMAND, "Initializing System Diagnostics...", "Generating Test Suite..."]
    );
    assert_eq!(session.history_len(), 2);
    assert_eq!(effects.toasts.lock()[0].title, "Diagnostics Started");

    let root = session.render_plan().unwrap();
    assert_eq!(root.stats().hallucinations(), 0);
    assert_eq!(root.stats().components, root.nodes().len());

    let toast = action(json!({"type": "SHOW_TOAST", "payload": {"type": "SUCCESS", "title": "System Operational"}}));
    assert_eq!(session.dispatch(&toast).await.unwrap(), Dispatched::EffectRan);

    assert!(session.undo());
    assert!(session.active_tree().is_none());
}

#[tokio::test]
async fn test_render_plan_reports_hallucinations() {
    let session = idle_session();
    session.show_tree(
        "",
        json!({"card": {"children": [{"hero": {"title": "X"}}, {"text": {"content": "ok"}}]}}),
    );
    let mut events = session.telemetry().subscribe();

    let root = session.render_plan().unwrap();

    assert_eq!(root.stats().unknown, 1);
    let metrics = Metrics::from_events(&events.drain());
    assert_eq!(metrics.hallucinations, 1);
}

#[test]
fn test_settings_persist_through_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genui").join("settings.json");
    let session = idle_session().with_settings_store(SettingsStore::new(&path));
    assert_eq!(session.settings(), Settings::default());

    let updated = Settings {
        model: "gemini-3-pro-preview".to_string(),
        sound_enabled: false,
    };
    session.set_settings(updated.clone()).unwrap();

    assert_eq!(SettingsStore::new(&path).load(), updated);
    let reopened = idle_session().with_settings_store(SettingsStore::new(&path));
    assert_eq!(reopened.settings(), updated);
}
