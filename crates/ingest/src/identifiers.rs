//! Newtype domain identifiers.
//!
//! Every identity that flows through the ingestion pipeline is a distinct
//! newtype wrapping a primitive. This prevents accidentally interchanging, for
//! example, a [`SpeciesId`] with a [`MoveId`] even though both are `u32` under
//! the hood.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u32-wrapped newtypes (game-assigned integers).
// Generates: struct (Copy), new(), as_u32(), Display.
// ---------------------------------------------------------------------------
macro_rules! u32_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u32) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u32(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — producer-assigned
// ---------------------------------------------------------------------------

string_id! {
    /// Identity of a physical entity as reported by the map producer.
    ///
    /// Stable across repeated reports of the same spawn, stop, or gym, and
    /// unique within one [`EventKind`]. Producers send it either as a string
    /// (encounter ids are usually base64) or as a JSON integer; integers are
    /// kept as their decimal rendering.
    EventId
}

u32_id! {
    /// National dex number of a spawned or guarding species.
    SpeciesId
}

u32_id! {
    /// Identifies a move known by a spawned individual.
    MoveId
}

u32_id! {
    /// Identifies the faction controlling a gym (`0` means uncontested).
    TeamId
}

// ---------------------------------------------------------------------------
// Dedup key
// ---------------------------------------------------------------------------

/// The three event kinds the pipeline can normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A wild spawn with a disappearance time.
    Spawn,
    /// A stop with an active lure.
    LureStop,
    /// A gym state snapshot.
    GymState,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Spawn => "spawn",
            EventKind::LureStop => "lure_stop",
            EventKind::GymState => "gym_state",
        };
        f.write_str(s)
    }
}

/// Key under which an event is coalesced in the dedup queue.
///
/// [`EventId`] values are only unique within a kind, so the kind is part of
/// the key: a gym and a stop that happen to share an id never collapse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    /// Kind of the event.
    pub kind: EventKind,
    /// Producer identity within that kind.
    pub id: EventId,
}

impl EventKey {
    /// Creates a key for `id` within `kind`.
    pub fn new(kind: EventKind, id: EventId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single inbound webhook delivery.
///
/// Generated fresh for every HTTP request and attached to its tracing span so
/// every event normalized from one delivery can be correlated in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(Uuid);

impl DeliveryId {
    /// Generates a new random delivery identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_event_id_is_rejected() {
        assert!(EventId::new("").is_none());
        assert_eq!(EventId::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn keys_with_same_id_but_different_kind_differ() {
        let id = EventId::new("42").unwrap();
        let stop = EventKey::new(EventKind::LureStop, id.clone());
        let gym = EventKey::new(EventKind::GymState, id);
        assert_ne!(stop, gym);
        assert_eq!(stop.to_string(), "lure_stop:42");
    }
}
