//! Plugin error taxonomy. See spec §7, `PluginFault`.

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin initialization failed: {0}")]
    InitializationFailed(String),
    #[error("plugin execution error: {0}")]
    ExecutionError(String),
    #[error("plugin not found: {0}")]
    NotFound(String),
    #[error("plugin id or namespace already registered: {0}")]
    DuplicateRegistration(String),
    #[error("event payload failed validation: {0}")]
    InvalidPayload(String),
}
