//! Stores the current revision.

/// The current revision.
pub const REVISION: Option<&str> = None;
