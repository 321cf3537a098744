//! Core error types for runtrace-core.
//!
//! Uses `thiserror` for structured, matchable error variants. Only genuinely
//! unexpected conditions live here -- outcomes with a known, named cause
//! ("step not tracked", "default branch executed") are modeled as enum
//! results by their owning modules, not as errors.

use thiserror::Error;

/// Core errors produced by the runtrace-core crate.
///
/// Path resolution failures surface to the caller unchanged; the UI layer
/// turns them into a "unable to extract path, please report as a bug"
/// affordance rather than silently defaulting.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A non-numeric path segment named a key the current node does not have.
    #[error("key '{key}' not found while resolving '{path}'")]
    KeyNotFound { key: String, path: String },

    /// A nonzero numeric segment was applied to a value that is not a
    /// sequence. Index 0 on a non-sequence is an identity no-op and does
    /// not raise this.
    #[error("index {index} used against a non-sequence while resolving '{path}'")]
    InvalidIndexOnNonArray { index: usize, path: String },

    /// A numeric segment addressed past the end of a sequence.
    #[error("index {index} out of bounds (len {len}) while resolving '{path}'")]
    IndexOutOfBounds {
        index: usize,
        len: usize,
        path: String,
    },

    /// An edit operation expected a sequence at the addressed slot.
    #[error("cannot splice into non-sequence at '{path}'")]
    NotASequence { path: String },
}
