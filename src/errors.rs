//! Error Types
//!
//! This module defines the recoverable error type used by the core.
//!
//! # Overview
//!
//! Most runtime conditions in the core are not errors at all:
//! - Caller bugs (double registration, releasing an unassigned instance slot)
//!   are fatal assertions and panic with a diagnostic.
//! - Expected absence (unregistered entity, joint missing from a skeleton)
//!   is logged and treated as a no-op.
//! - Capacity pressure is recovered by growing the affected buffer.
//!
//! [`CoreError`] covers what remains: configuration problems and fallible
//! API calls that name something which does not exist.
//!
//! ```rust,ignore
//! use nbcore::errors::{CoreError, Result};
//!
//! fn load() -> Result<CoreSettings> {
//!     CoreSettings::from_json_str(text)
//! }
//! ```

use thiserror::Error;

/// The main error type for the core.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// The settings document could not be parsed.
    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] serde_json::Error),

    /// A settings value is outside its valid range.
    #[error("Invalid setting `{field}`: {reason}")]
    InvalidSetting {
        /// Name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// The node handle does not refer to a live node.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// No clip with this name is attached to the animation component.
    #[error("Animation clip not found: {0}")]
    ClipNotFound(String),

    /// The node lacks a component the operation needs.
    #[error("Node `{node}` has no {component} component")]
    MissingComponent {
        /// Node name
        node: String,
        /// Component kind name
        component: &'static str,
    },

    // ========================================================================
    // Hierarchy Errors
    // ========================================================================
    /// Attaching would make a node its own ancestor.
    #[error("Attaching `{child}` under `{parent}` would create a cycle")]
    HierarchyCycle {
        /// Name of the node being moved
        child: String,
        /// Name of the requested parent
        parent: String,
    },
}

/// Alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;
