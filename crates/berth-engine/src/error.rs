//! Errors reported by a container engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure returned by a [`ContainerEngine`](crate::ContainerEngine) call.
///
/// `NotFound` is a branch condition for most callers (a missing container
/// selects the create path, a missing image triggers a pull), so it is kept
/// apart from every other failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The named container or image does not exist on the engine.
    #[error("no such {kind}: {id}")]
    NotFound {
        /// Type of the missing resource ("container" or "image").
        kind: &'static str,
        /// Name or identifier that was looked up.
        id: String,
    },

    /// A container with the requested name already exists.
    #[error("container name {name:?} is already in use")]
    Conflict {
        /// Name that collided.
        name: String,
    },

    /// The engine refused or failed the request.
    #[error("{operation} failed: {message}")]
    Rejected {
        /// Engine operation that failed.
        operation: &'static str,
        /// Engine-provided reason.
        message: String,
    },
}

impl EngineError {
    /// Shorthand for a missing container.
    #[must_use]
    pub fn container_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "container",
            id: id.into(),
        }
    }

    /// Shorthand for a missing image.
    #[must_use]
    pub fn image_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "image",
            id: id.into(),
        }
    }

    /// Shorthand for a generic engine failure.
    #[must_use]
    pub fn rejected(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            message: message.into(),
        }
    }

    /// Returns whether this is the not-found sentinel.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
