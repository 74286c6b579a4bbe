//! Canonical event records.
//!
//! Producers disagree on field names and types; everything past the
//! [`crate::normalize`] boundary sees only these records. Optional fields are
//! `Option` at the type level, so consumers never probe for key presence.

use serde::Serialize;

use crate::identifiers::{EventId, EventKey, EventKind, MoveId, SpeciesId, TeamId};
use crate::types::{Coordinates, IvPercentage, Timestamp};

/// A wild spawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spawn {
    pub id: EventId,
    pub species: SpeciesId,
    /// When the spawn despawns.
    pub disappear_time: Timestamp,
    pub coordinates: Coordinates,
    pub move_1: Option<MoveId>,
    pub move_2: Option<MoveId>,
    pub attack: Option<u32>,
    pub defense: Option<u32>,
    pub stamina: Option<u32>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub gender: Option<u32>,
    /// Present if and only if all three stats are present.
    pub iv: Option<IvPercentage>,
    pub map_link: String,
}

impl Spawn {
    /// Derives [`Spawn::iv`] from the three stat fields.
    pub fn derive_iv(
        attack: Option<u32>,
        defense: Option<u32>,
        stamina: Option<u32>,
    ) -> Option<IvPercentage> {
        match (attack, defense, stamina) {
            (Some(a), Some(d), Some(s)) => Some(IvPercentage::from_stats(a, d, s)),
            _ => None,
        }
    }
}

/// A stop carrying an active lure.
///
/// Stops without a lure never become a [`LureStop`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LureStop {
    pub id: EventId,
    pub lure_expiration: Timestamp,
    pub coordinates: Coordinates,
    pub map_link: String,
}

/// A gym state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GymState {
    pub id: EventId,
    pub team: TeamId,
    /// Prestige points as reported, rendered to text.
    pub points: String,
    pub guard_species: Option<SpeciesId>,
    pub coordinates: Coordinates,
    pub map_link: String,
}

/// A normalized, alertable event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Spawn(Spawn),
    LureStop(LureStop),
    GymState(GymState),
}

impl Event {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Spawn(_) => EventKind::Spawn,
            Event::LureStop(_) => EventKind::LureStop,
            Event::GymState(_) => EventKind::GymState,
        }
    }

    /// Returns the producer identity.
    pub fn id(&self) -> &EventId {
        match self {
            Event::Spawn(s) => &s.id,
            Event::LureStop(l) => &l.id,
            Event::GymState(g) => &g.id,
        }
    }

    /// Returns the key this event is deduplicated under.
    pub fn key(&self) -> EventKey {
        EventKey::new(self.kind(), self.id().clone())
    }

    /// Returns where the event happened.
    pub fn coordinates(&self) -> Coordinates {
        match self {
            Event::Spawn(s) => s.coordinates,
            Event::LureStop(l) => l.coordinates,
            Event::GymState(g) => g.coordinates,
        }
    }

    pub fn map_link(&self) -> &str {
        match self {
            Event::Spawn(s) => &s.map_link,
            Event::LureStop(l) => &l.map_link,
            Event::GymState(g) => &g.map_link,
        }
    }
}
