//! Unified error type for the vfxupload crates.
//!
//! Every crate funnels its failures into [`Error`]. Pipeline stages convert
//! these into a job's `failed` status at the job boundary; they never abort a
//! batch.

use std::fmt;

/// Unified error type covering all failure modes in vfxupload.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "job", "project").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying serde_json error.
        #[from]
        source: serde_json::Error,
    },

    /// An external tool (ffmpeg, ffprobe, aws) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// A remote object-store operation failed.
    #[error("Remote error [{op}]: {message}")]
    Remote {
        /// The store operation that failed (list, upload, ...).
        op: String,
        /// Human-readable error description.
        message: String,
    },

    /// A job status change that the state machine does not allow.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Name of the current status.
        from: String,
        /// Name of the requested status.
        to: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Remote`].
    pub fn remote(op: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Remote {
            op: op.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::InvalidTransition`].
    pub fn invalid_transition(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Error::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
