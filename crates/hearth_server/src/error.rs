//! Error types for the server crate. See spec §7 — this enumerates the
//! same taxonomy (Validation, NotFound, StateViolation, TransientExternal,
//! PluginFault) but as an actual typed enum rather than the source's ad hoc
//! string-tagged errors.

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("network error: {0}")]
    Network(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Raised by [`crate::lifecycle::LifecycleCoordinator`] while handling one
/// inbound frame. Every variant maps to exactly one `error` frame sent back
/// to the originator — see [`LifecycleError::code`].
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {message} ({code})")]
    NotFound { message: String, code: &'static str },
    #[error("not allowed in current state: {message} ({code})")]
    StateViolation { message: String, code: &'static str },
    #[error("plugin error: {0}")]
    PluginFault(String),
    #[error("not in a room")]
    NotInRoom,
    #[error("only the host may do that")]
    NotHost,
}

impl LifecycleError {
    /// Stable machine-readable code carried in the `error` frame's
    /// `payload.code`, per spec §7.
    pub fn code(&self) -> &'static str {
        use hearth_core::events::error_codes::*;
        match self {
            LifecycleError::Validation(_) => VALIDATION_FAILED,
            LifecycleError::NotFound { code, .. } => code,
            LifecycleError::StateViolation { code, .. } => code,
            LifecycleError::PluginFault(_) => INTERNAL_ERROR,
            LifecycleError::NotInRoom => NOT_IN_ROOM,
            LifecycleError::NotHost => NOT_HOST,
        }
    }
}

impl From<hearth_core::validator::ValidationError> for LifecycleError {
    fn from(err: hearth_core::validator::ValidationError) -> Self {
        LifecycleError::Validation(err.to_string())
    }
}

impl From<hearth_core::JoinError> for LifecycleError {
    fn from(err: hearth_core::JoinError) -> Self {
        use hearth_core::events::error_codes::*;
        match err {
            hearth_core::JoinError::RoomNotFound => LifecycleError::NotFound {
                message: "room not found".into(),
                code: ROOM_NOT_FOUND,
            },
            hearth_core::JoinError::RoomFull => LifecycleError::StateViolation {
                message: "room is full".into(),
                code: ROOM_FULL,
            },
            hearth_core::JoinError::WrongPhase => LifecycleError::StateViolation {
                message: "room is not accepting new players".into(),
                code: WRONG_PHASE,
            },
        }
    }
}

impl From<hearth_plugins::PluginError> for LifecycleError {
    fn from(err: hearth_plugins::PluginError) -> Self {
        LifecycleError::PluginFault(err.to_string())
    }
}
