//! Linear composition of the ingestion stages.
//!
//! envelope → [`normalize`](crate::normalize::normalize) → [`GeofenceSet::check`]
//! → [`DedupQueue::add`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::QueueError;
use crate::event::Event;
use crate::geofence::{FenceVerdict, GeofenceSet};
use crate::identifiers::EventKey;
use crate::normalize::{self, MapLink, WebhookEnvelope};
use crate::queue::{AddOutcome, DedupQueue};

/// The queue type shared between the ingestor and alert workers.
pub type EventQueue = DedupQueue<EventKey, Event>;

/// What happened to one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Not alertable: unsupported, unknown, filtered, or malformed.
    Dropped,
    /// Normalized, but outside every configured geofence.
    OutsideGeofence { key: EventKey },
    /// Queued as a new entry.
    Queued { key: EventKey, fence: Option<String> },
    /// Merged into an entry that was already waiting.
    Coalesced { key: EventKey, fence: Option<String> },
}

/// Feeds webhook envelopes through normalization and geofencing into the
/// shared [`EventQueue`].
///
/// Cheap to clone; every clone shares the same fences and queue.
#[derive(Debug, Clone)]
pub struct Ingestor {
    geofences: Arc<GeofenceSet>,
    queue: Arc<EventQueue>,
    map_link: MapLink,
}

impl Ingestor {
    pub fn new(geofences: Arc<GeofenceSet>, queue: Arc<EventQueue>, map_link: MapLink) -> Self {
        Self {
            geofences,
            queue,
            map_link,
        }
    }

    /// Processes one envelope.
    ///
    /// Normalization and geofence failures are never errors; they resolve to
    /// [`IngestOutcome::Dropped`] or [`IngestOutcome::OutsideGeofence`].
    ///
    /// # Errors
    ///
    /// Returns the [`QueueError`] if the event could not be queued, so the
    /// caller can report the lost update upstream.
    pub fn ingest(&self, envelope: &WebhookEnvelope) -> Result<IngestOutcome, QueueError> {
        let Some(event) = normalize::normalize(envelope, self.map_link) else {
            return Ok(IngestOutcome::Dropped);
        };
        let key = event.key();

        let fence = match self.geofences.check(event.coordinates()) {
            FenceVerdict::Outside => {
                debug!(
                    %key,
                    coordinates = %event.coordinates(),
                    "event outside all geofences; ignoring"
                );
                return Ok(IngestOutcome::OutsideGeofence { key });
            }
            FenceVerdict::Unrestricted => None,
            FenceVerdict::Inside(name) => Some(name.to_owned()),
        };

        match self.queue.add(key.clone(), event)? {
            AddOutcome::Queued => {
                info!(%key, fence = fence.as_deref().unwrap_or("-"), "queued event");
                Ok(IngestOutcome::Queued { key, fence })
            }
            AddOutcome::Coalesced => Ok(IngestOutcome::Coalesced { key, fence }),
        }
    }
}
