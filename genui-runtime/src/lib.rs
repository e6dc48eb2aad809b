//! # GenUI Runtime
//!
//! Interactive session around a [`genui_tree`] document: the model streams a
//! tree, the user clicks, and actions rewrite the tree with undoable history.
//!
//! ## Features
//! - Bounded undo/redo over immutable conversation snapshots
//! - Streaming generation with live previews, tool calls and cancellation
//! - Action dispatcher for state patches, cycles, forms, effects and sequences
//! - Collaborator-backed heal and refinement of single nodes
//! - Telemetry traces on a broadcast channel
//! - JSON settings persisted under the user config directory
//!
//! ## Example
//! ```ignore
//! use std::sync::Arc;
//! use genui_runtime::{Collaborators, ScriptedGenerator, Session, Telemetry};
//!
//! let generator = ScriptedGenerator::new([r#"{"text":{"content":"Hi"}}"#], 8);
//! let session = Session::new(Collaborators::new(Arc::new(generator)), Arc::new(Telemetry::new()));
//! session.submit_prompt("Say hi").await?;
//! assert!(session.active_tree().is_some());
//! ```

pub mod collaborators;
pub mod config;
pub mod conversation;
pub mod error;
pub mod history;
pub mod logging;
pub mod session;
pub mod telemetry;

pub use collaborators::{
    ChunkStream, Effects, GenerationRequest, Generator, LogEffects, NoRefiner, NoTools, Refiner,
    ScriptedGenerator, Toast, ToastKind, ToolExecutor, UserContext,
};
pub use config::{Settings, SettingsStore};
pub use conversation::{Conversation, Message, Role};
pub use error::{CollaboratorError, DispatchError, RuntimeError, RuntimeResult, SettingsError};
pub use history::{History, MAX_HISTORY};
pub use session::{Collaborators, Dispatched, Modal, Session, DIAGNOSTICS_COMMAND, MAX_TOOL_ROUNDS};
pub use telemetry::{Metrics, Subscription, Telemetry, TelemetryEvent};
