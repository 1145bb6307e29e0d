//! Errors surfaced by `apply` and `apply_graph`.

use std::fmt;

use berth_engine::EngineError;
use thiserror::Error;

/// Result type alias for reconciliation.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Error returned by an `after_create` hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// The configuration axis on which a live container diverged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffAxis {
    /// Image content ID.
    Image,
    /// DNS server list.
    Dns,
    /// Command arguments.
    Command,
    /// Environment variables.
    Env,
    /// Bind mounts.
    Binds,
}

impl fmt::Display for DiffAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Dns => write!(f, "dns"),
            Self::Command => write!(f, "command"),
            Self::Env => write!(f, "env"),
            Self::Binds => write!(f, "binds"),
        }
    }
}

/// Everything that can stop a reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A container spec was built without a name.
    #[error("container name is required")]
    MissingName,

    /// A builder option was given a malformed value.
    #[error("invalid {option} {value:?}: {reason}")]
    InvalidOption {
        /// Option that was rejected.
        option: &'static str,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Two specs in one graph share a name.
    #[error("container {name:?} is declared more than once")]
    DuplicateName {
        /// Repeated name.
        name: String,
    },

    /// A link points at a container that is not part of the graph.
    #[error("{name} expects unknown link {link}")]
    UnknownLink {
        /// Container declaring the link.
        name: String,
        /// The link as declared.
        link: String,
    },

    /// The remaining containers wait on each other and can never start.
    #[error("link cycle between containers: {}", names.join(", "))]
    LinkCycle {
        /// Containers on the cycle.
        names: Vec<String>,
    },

    /// The live container differs from the desired one and may not be removed.
    #[error("container {name:?} {axis} mismatch: running with {current} but desired is {desired}")]
    ConfigMismatch {
        /// Container name.
        name: String,
        /// Axis that diverged.
        axis: DiffAxis,
        /// Observed value.
        current: String,
        /// Desired value.
        desired: String,
    },

    /// An image could not be found locally even after pulling it.
    #[error("image named {image:?} could not be identified")]
    ImageNotIdentified {
        /// Image reference that was resolved.
        image: String,
    },

    /// An engine call failed.
    #[error("{operation} {target}: {source}")]
    Engine {
        /// Engine operation that failed.
        operation: &'static str,
        /// Container or image the call was about.
        target: String,
        /// Underlying engine error.
        source: EngineError,
    },

    /// The `after_create` hook failed; the new container was removed.
    #[error("after-create hook for container {name:?} failed: {source}")]
    AfterCreate {
        /// Container name.
        name: String,
        /// Error returned by the hook.
        source: HookError,
    },

    /// A reconciliation task panicked or was cancelled.
    #[error("reconciliation task failed: {message}")]
    Task {
        /// Description of the failure.
        message: String,
    },
}

impl ReconcileError {
    /// Wraps an engine failure with the operation and target it concerned.
    #[must_use]
    pub fn engine(operation: &'static str, target: impl Into<String>, source: EngineError) -> Self {
        Self::Engine {
            operation,
            target: target.into(),
            source,
        }
    }

    /// Returns whether the error was detected before any engine mutation.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingName
                | Self::InvalidOption { .. }
                | Self::DuplicateName { .. }
                | Self::UnknownLink { .. }
                | Self::LinkCycle { .. }
        )
    }

    /// Returns the underlying engine error, if any.
    #[must_use]
    pub const fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Self::Engine { source, .. } => Some(source),
            _ => None,
        }
    }
}
