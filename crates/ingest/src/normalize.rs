//! Webhook payload normalization.
//!
//! Turns a raw `{type, message}` envelope into one canonical [`Event`]. The
//! module holds no state: every function is a pure function of its inputs, so
//! any number of webhook handlers may call [`normalize`] concurrently.
//!
//! ## Outcomes
//!
//! | Input | [`try_normalize`] | [`normalize`] logs at |
//! |-------|-------------------|-----------------------|
//! | supported kind, valid message | `Ok(Normalized::Event(_))` | debug |
//! | `captcha` / `scheduler` | `Ok(Normalized::Unsupported)` | debug |
//! | any other kind | `Ok(Normalized::UnknownKind)` | error |
//! | stop without an active lure | `Ok(Normalized::Filtered)` | debug |
//! | missing or non-numeric required field | `Err(NormalizeError)` | error (+ detail at debug) |
//!
//! [`normalize`] flattens all of these to `Option<Event>`; one malformed event
//! never affects the next.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::errors::NormalizeError;
use crate::event::{Event, GymState, LureStop, Spawn};
use crate::identifiers::{EventId, MoveId, SpeciesId, TeamId};
use crate::types::{Coordinates, Timestamp};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The outer JSON object of every webhook delivery.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookEnvelope {
    /// Kind discriminator, e.g. `"spawn-report"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific body.
    #[serde(default)]
    pub message: Value,
}

/// Envelope discriminators the normalizer recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    Spawn,
    Lure,
    Gym,
    GymDetails,
    /// Recognized, but carries nothing alertable.
    Unsupported,
}

impl WebhookKind {
    /// Maps a wire discriminator to a kind.
    ///
    /// Both the current names and the legacy names older producers still
    /// send are accepted.
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "spawn-report" | "pokemon" => Some(WebhookKind::Spawn),
            "lure-report" | "pokestop" => Some(WebhookKind::Lure),
            "gym-report" | "gym" => Some(WebhookKind::Gym),
            "gym-detail-report" | "gym_details" => Some(WebhookKind::GymDetails),
            "captcha" | "scheduler" => Some(WebhookKind::Unsupported),
            _ => None,
        }
    }
}

/// Result of a successful normalization attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Event(Event),
    Unsupported,
    UnknownKind,
    /// Well-formed but not alertable (e.g. a stop with no lure).
    Filtered,
}

// ---------------------------------------------------------------------------
// Map links
// ---------------------------------------------------------------------------

/// Derives a map link from a location.
pub type MapLink = fn(Coordinates) -> String;

/// Default [`MapLink`]: a Google Maps query URL.
pub fn google_maps_link(coordinates: Coordinates) -> String {
    format!(
        "https://maps.google.com/maps?q={},{}",
        coordinates.lat, coordinates.lng
    )
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Best-effort normalization: logs every failure and returns `None` for
/// anything that is not an alertable event.
pub fn normalize(envelope: &WebhookEnvelope, map_link: MapLink) -> Option<Event> {
    match try_normalize(envelope, map_link) {
        Ok(Normalized::Event(event)) => Some(event),
        Ok(Normalized::Unsupported) => {
            debug!(kind = %envelope.kind, "webhook kind is not supported; ignoring");
            None
        }
        Ok(Normalized::UnknownKind) => {
            error!(
                kind = %envelope.kind,
                "invalid webhook type; is the producer configured for this map type?"
            );
            None
        }
        Ok(Normalized::Filtered) => None,
        Err(err) => {
            error!(kind = %envelope.kind, error = %err, "failed to normalize webhook");
            debug!(
                kind = %envelope.kind,
                error = ?err,
                body = %envelope.message,
                "rejected webhook message"
            );
            None
        }
    }
}

/// Normalizes `envelope`, exposing why an event was or was not produced.
pub fn try_normalize(
    envelope: &WebhookEnvelope,
    map_link: MapLink,
) -> Result<Normalized, NormalizeError> {
    let Some(kind) = WebhookKind::from_wire(&envelope.kind) else {
        return Ok(Normalized::UnknownKind);
    };
    if kind == WebhookKind::Unsupported {
        return Ok(Normalized::Unsupported);
    }

    let message = envelope.message.as_object().ok_or(NormalizeError::NotAnObject)?;
    debug!(kind = %envelope.kind, "converting webhook message");

    match kind {
        WebhookKind::Spawn => spawn(message, map_link).map(|s| Normalized::Event(Event::Spawn(s))),
        WebhookKind::Lure => match lure_stop(message, map_link)? {
            Some(stop) => Ok(Normalized::Event(Event::LureStop(stop))),
            None => {
                debug!("stop has no active lure; ignoring");
                Ok(Normalized::Filtered)
            }
        },
        WebhookKind::Gym | WebhookKind::GymDetails => {
            gym_state(message, map_link).map(|g| Normalized::Event(Event::GymState(g)))
        }
        WebhookKind::Unsupported => Ok(Normalized::Unsupported),
    }
}

// ---------------------------------------------------------------------------
// Per-kind conversion
// ---------------------------------------------------------------------------

fn spawn(msg: &Map<String, Value>, map_link: MapLink) -> Result<Spawn, NormalizeError> {
    let id = event_id("id", required(msg, &["id", "encounter_id"])?)?;
    let raw_species = required(msg, &["species_id", "pokemon_id"])?;
    let species = SpeciesId::new(to_u32("species_id", raw_species)?);
    let disappear_time = timestamp("disappear_time", required(msg, &["disappear_time"])?)?;
    let coordinates = coordinates(msg)?;

    let attack = optional_u32(msg, "individual_attack")?;
    let defense = optional_u32(msg, "individual_defense")?;
    let stamina = optional_u32(msg, "individual_stamina")?;

    Ok(Spawn {
        id,
        species,
        disappear_time,
        coordinates,
        move_1: optional_u32(msg, "move_1")?.map(MoveId::new),
        move_2: optional_u32(msg, "move_2")?.map(MoveId::new),
        attack,
        defense,
        stamina,
        height: optional_f64(msg, "height")?,
        weight: optional_f64(msg, "weight")?,
        gender: optional_u32(msg, "gender")?,
        iv: Spawn::derive_iv(attack, defense, stamina),
        map_link: map_link(coordinates),
    })
}

fn lure_stop(
    msg: &Map<String, Value>,
    map_link: MapLink,
) -> Result<Option<LureStop>, NormalizeError> {
    let Some(expiration) = field(msg, &["lure_expiration"]) else {
        return Ok(None);
    };
    let lure_expiration = timestamp("lure_expiration", expiration)?;
    let id = event_id("stop_id", required(msg, &["stop_id", "pokestop_id"])?)?;
    let coordinates = coordinates(msg)?;

    Ok(Some(LureStop {
        id,
        lure_expiration,
        coordinates,
        map_link: map_link(coordinates),
    }))
}

fn gym_state(msg: &Map<String, Value>, map_link: MapLink) -> Result<GymState, NormalizeError> {
    let id = event_id("gym_id", required(msg, &["gym_id", "id"])?)?;
    let team = TeamId::new(to_u32("team_id", required(msg, &["team_id", "team"])?)?);
    let points = text(required(msg, &["gym_points"])?);
    let coordinates = coordinates(msg)?;

    let guard_species = field(msg, &["guard_pokemon_id"]).and_then(|raw| {
        match to_u32("guard_pokemon_id", raw) {
            Ok(n) => Some(SpeciesId::new(n)),
            Err(err) => {
                warn!(
                    gym = %id,
                    guard = %raw,
                    error = %err,
                    "gym guard species is unreadable; dropping it"
                );
                None
            }
        }
    });

    Ok(GymState {
        id,
        team,
        points,
        guard_species,
        coordinates,
        map_link: map_link(coordinates),
    })
}

// ---------------------------------------------------------------------------
// Field access and coercion
// ---------------------------------------------------------------------------

/// Returns the first non-null value among `names`.
fn field<'a>(msg: &'a Map<String, Value>, names: &[&'static str]) -> Option<&'a Value> {
    names.iter().filter_map(|name| msg.get(*name)).find(|v| !v.is_null())
}

fn required<'a>(
    msg: &'a Map<String, Value>,
    names: &[&'static str],
) -> Result<&'a Value, NormalizeError> {
    field(msg, names).ok_or(NormalizeError::MissingField { field: names[0] })
}

fn invalid(field: &'static str, value: &Value, expected: &'static str) -> NormalizeError {
    NormalizeError::InvalidField {
        field,
        value: value.to_string(),
        expected,
    }
}

fn to_f64(field: &'static str, value: &Value) -> Result<f64, NormalizeError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .ok_or_else(|| invalid(field, value, "a finite number"))
}

fn to_u32(field: &'static str, value: &Value) -> Result<u32, NormalizeError> {
    let f = to_f64(field, value).map_err(|_| invalid(field, value, "a non-negative integer"))?;
    let whole = f.trunc();
    if (0.0..=f64::from(u32::MAX)).contains(&whole) {
        Ok(whole as u32)
    } else {
        Err(invalid(field, value, "a non-negative integer"))
    }
}

fn optional_u32(
    msg: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<u32>, NormalizeError> {
    field(msg, &[name]).map(|v| to_u32(name, v)).transpose()
}

fn optional_f64(
    msg: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<f64>, NormalizeError> {
    field(msg, &[name]).map(|v| to_f64(name, v)).transpose()
}

fn timestamp(field: &'static str, value: &Value) -> Result<Timestamp, NormalizeError> {
    let seconds = to_f64(field, value).map_err(|_| invalid(field, value, "epoch seconds"))?;
    Timestamp::from_epoch_seconds(seconds)
        .ok_or_else(|| invalid(field, value, "epoch seconds in range"))
}

fn coordinates(msg: &Map<String, Value>) -> Result<Coordinates, NormalizeError> {
    let raw_lat = required(msg, &["latitude"])?;
    let raw_lng = required(msg, &["longitude"])?;
    let lat = to_f64("latitude", raw_lat)?;
    let lng = to_f64("longitude", raw_lng)?;
    Coordinates::new(lat, lng).ok_or_else(|| invalid("latitude", raw_lat, "finite coordinates"))
}

fn event_id(field: &'static str, value: &Value) -> Result<EventId, NormalizeError> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        _ => return Err(invalid(field, value, "a string or integer identity")),
    };
    EventId::new(raw).ok_or_else(|| invalid(field, value, "a non-empty identity"))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
