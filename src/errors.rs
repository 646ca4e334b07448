//! Error Types
//!
//! This module defines the error types used throughout the engine core.
//!
//! # Overview
//!
//! The main error type [`EngineError`] covers the failure modes of the core:
//! - Stale or unknown scene handles
//! - Missing collaborators at render time (no main camera, empty viewport)
//! - Invalid renderer configuration
//! - Graphics device failures reported by the device implementation
//!
//! Capacity overruns (too many lights, shadow slots past the atlas budget)
//! are *not* errors: they degrade softly and are reported through `log`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ember::errors::{EngineError, Result};
//!
//! fn reparent(scene: &mut Scene, child: NodeHandle, parent: NodeHandle) -> Result<()> {
//!     scene.set_parent(child, Some(parent))?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the engine core.
#[derive(Error, Debug)]
pub enum EngineError {
    // ========================================================================
    // Scene Errors
    // ========================================================================
    /// The node handle does not refer to a live node.
    #[error("Scene node not found: {0}")]
    NodeNotFound(String),

    /// The object key does not refer to a live object.
    #[error("Scene object not found: {0}")]
    ObjectNotFound(String),

    /// The object exists but is not of the requested concrete type.
    #[error("Scene object {key} is not a {expected}")]
    ObjectTypeMismatch {
        /// Debug representation of the object key
        key: String,
        /// Name of the requested type
        expected: &'static str,
    },

    /// Re-parenting would create a cycle in the hierarchy.
    #[error("Cannot parent node {child} under its own descendant {parent}")]
    HierarchyCycle {
        /// Node being moved
        child: String,
        /// Requested new parent
        parent: String,
    },

    /// The scene root cannot be given a parent.
    #[error("The scene root cannot be re-parented")]
    RootReparent,

    // ========================================================================
    // Rendering Errors
    // ========================================================================
    /// No main camera is set, or the main camera object was removed.
    #[error("No main camera is set for the scene")]
    NoMainCamera,

    /// The render viewport has zero area.
    #[error("Invalid viewport: {width}x{height}")]
    InvalidViewport {
        /// Viewport width in pixels
        width: u32,
        /// Viewport height in pixels
        height: u32,
    },

    /// Failure reported by the graphics device implementation.
    #[error("Graphics device error: {0}")]
    Device(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Renderer settings failed validation.
    #[error("Invalid renderer settings: {0}")]
    InvalidSettings(String),

    /// Renderer settings could not be parsed.
    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] serde_json::Error),
}

/// Alias for `Result<T, EngineError>`.
pub type Result<T> = std::result::Result<T, EngineError>;
