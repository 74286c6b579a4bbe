//! Core ingestion domain for geoalert.
//!
//! This crate turns location-tagged webhook payloads into canonical events,
//! filters them against named geofences, and coalesces them in a deduplicating
//! work queue that alert workers drain. Infrastructure crates (HTTP intake,
//! alert dispatch) build on the types defined here; they never add domain
//! rules.
//!
//! ## Architectural Layer
//!
//! **Business logic.** This crate has no network or file I/O. Normalization
//! and geofencing are pure functions of their inputs; the dedup queue is the
//! only shared mutable state.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`EventId`, `SpeciesId`, `EventKey`, etc.) |
//! | [`types`] | Value types (`Coordinates`, `Timestamp`, `IvPercentage`) |
//! | [`event`] | The canonical [`Event`] union |
//! | [`normalize`] | Webhook envelope → [`Event`] |
//! | [`geofence`] | Polygon containment and the loaded [`GeofenceSet`] |
//! | [`queue`] | The identity-deduplicating [`DedupQueue`] |
//! | [`ingestor`] | The composed pipeline, [`Ingestor`] |
//! | [`errors`] | Per-component error types |

pub mod errors;
pub mod event;
pub mod geofence;
pub mod identifiers;
pub mod ingestor;
pub mod normalize;
pub mod queue;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{GeofenceError, NormalizeError, QueueError};
pub use event::{Event, GymState, LureStop, Spawn};
pub use geofence::{BoundingBox, FenceVerdict, Geofence, GeofenceSet, Point};
pub use identifiers::{DeliveryId, EventId, EventKey, EventKind, MoveId, SpeciesId, TeamId};
pub use ingestor::{EventQueue, IngestOutcome, Ingestor};
pub use normalize::{
    google_maps_link, normalize, try_normalize, MapLink, Normalized, WebhookEnvelope, WebhookKind,
};
pub use queue::{AddOutcome, DedupQueue};
pub use types::{
    Coordinates, IvPercentage, OrUnknown, Timestamp, MAX_STAT_TOTAL, UNKNOWN_MARKER,
    UNMEASURED_MARKER,
};
