use genui_tree::TreeError;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failure reported by an external collaborator (model, tool, effect sink).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Stream interrupted: {0}")]
    Stream(String),

    #[error("Tool '{name}' failed: {message}")]
    Tool { name: String, message: String },

    #[error("Refinement failed: {0}")]
    Refinement(String),

    #[error("Effect '{effect}' failed: {message}")]
    Effect { effect: String, message: String },
}

/// Error that halts an action chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("No configuration directory available on this platform")]
    NoConfigDir,

    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("An edit is already in progress for '{path}'")]
    EditInProgress { path: String },

    #[error("No active UI tree")]
    NoActiveTree,

    #[error("Nothing selected in edit mode")]
    NoSelection,

    #[error("Path '{path}' does not resolve in the active tree")]
    PathNotFound { path: String },

    #[error("A generation is already running")]
    Busy,

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}
