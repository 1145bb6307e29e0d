//! Workspace-wide constants and defaults.

/// Binary name for the CLI.
pub const BIN_NAME: &str = "berth";

/// Manifest file looked up when none is given on the command line.
pub const DEFAULT_MANIFEST: &str = "berth.yaml";

/// Upper bound on containers reconciled concurrently within one round.
pub const DEFAULT_MAX_PARALLEL: usize = 8;

/// Separator between the target name and the alias in a link.
pub const LINK_SEPARATOR: char = ':';

/// Separator between the source and the destination in a bind.
pub const BIND_SEPARATOR: char = ':';

/// Prefix the engine uses for content-addressed image identifiers.
pub const IMAGE_ID_PREFIX: &str = "sha256:";
