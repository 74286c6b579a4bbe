//! Error types for the ingestion domain.
//!
//! Each component owns one error enum. None of them escapes the pipeline as a
//! panic: normalization errors resolve to "drop this event", geofence errors
//! are raised only while fences are being loaded, and queue errors are
//! returned to the caller so a lost update is observable.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// A webhook message could not be turned into an [`crate::Event`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    /// The `message` body is not a JSON object.
    #[error("message body is not an object")]
    NotAnObject,

    /// A required field (or every one of its alternate names) is absent or null.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Primary name of the missing field.
        field: &'static str,
    },

    /// A field is present but its value cannot be coerced to the expected type.
    #[error("field '{field}' has invalid value {value}: expected {expected}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The raw JSON value, rendered for the log line.
        value: String,
        /// Human-readable description of the accepted shape.
        expected: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Geofences
// ---------------------------------------------------------------------------

/// A geofence definition was rejected at construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeofenceError {
    /// The geofence has an empty name.
    #[error("geofence name must not be empty")]
    EmptyName,

    /// Fewer than three vertices cannot enclose any area.
    #[error("geofence '{name}' has {count} vertices; at least 3 are required")]
    TooFewVertices {
        /// Name of the rejected geofence.
        name: String,
        /// Number of vertices supplied.
        count: usize,
    },

    /// A vertex coordinate is NaN or infinite.
    #[error("geofence '{name}' vertex {index} is not finite")]
    NonFiniteVertex {
        /// Name of the rejected geofence.
        name: String,
        /// Zero-based index of the offending vertex.
        index: usize,
    },

    /// Two geofences in the same set share a name.
    #[error("duplicate geofence name '{name}'")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// A dedup queue operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue is at capacity and the key is not already queued.
    ///
    /// The caller still owns the update and may retry once consumers catch up.
    #[error("queue is full ({capacity} entries)")]
    Full {
        /// Configured capacity.
        capacity: usize,
    },

    /// A thread panicked while holding the queue lock.
    ///
    /// This is the only fatal queue condition; the queue cannot be trusted
    /// afterwards.
    #[error("queue lock poisoned")]
    Poisoned,
}

impl QueueError {
    /// Returns `true` if retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Full { .. })
    }
}
