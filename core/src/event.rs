//! Journal facts and their stored wire form.
//!
//! A fact is something that already happened to an aggregate: a seat was taken,
//! a claim moved off the waitlist, a course was called off. Facts are immutable
//! and are the only thing replayed when an aggregate is rebuilt.
//!
//! Facts are encoded with `bincode`. The payload is opaque in the database; the
//! `event_type` column carries a stable, versioned name for routing and for
//! operators reading the journal.
//!
//! # Example
//!
//! ```
//! use classbook_core::event::{Event, SerializedEvent};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
//! enum RoomEvent {
//!     Booked { room: String, seats: u32 },
//!     Released { room: String },
//! }
//!
//! impl Event for RoomEvent {
//!     fn event_type(&self) -> &'static str {
//!         match self {
//!             RoomEvent::Booked { .. } => "RoomBooked.v1",
//!             RoomEvent::Released { .. } => "RoomReleased.v1",
//!         }
//!     }
//! }
//!
//! let fact = RoomEvent::Released { room: "Studio A".into() };
//! let stored = SerializedEvent::from_event(&fact, None).unwrap();
//! assert_eq!(stored.event_type, "RoomReleased.v1");
//! assert_eq!(stored.decode::<RoomEvent>().unwrap(), fact);
//! ```

use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Failures while encoding or decoding a fact.
#[derive(Error, Debug)]
pub enum EventError {
    /// The fact could not be encoded.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// The stored bytes do not decode into the requested type.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// The stored type name is not one this build knows how to read.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// A fact that can be appended to a journal stream and replayed later.
///
/// `event_type()` must be stable across releases and carry a version suffix
/// (`"ClaimSeated.v1"`). Bump the suffix when the payload shape changes.
pub trait Event: Send + Sync + 'static {
    /// Stable, versioned name of this fact.
    fn event_type(&self) -> &'static str;

    /// Encode this fact with bincode.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if encoding fails.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Decode a fact from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] when the bytes are corrupt or
    /// were written by an incompatible schema.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// A fact in its stored form.
///
/// This is what crosses the boundary between the domain and a journal backend.
#[derive(Clone, Debug, PartialEq)]
pub struct SerializedEvent {
    /// Versioned type name (e.g. `"ClaimSeated.v1"`).
    pub event_type: String,

    /// Bincode payload.
    pub data: Vec<u8>,

    /// Optional JSON metadata (who triggered it, correlation ids).
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Create a stored event from raw parts.
    #[must_use]
    pub const fn new(
        event_type: String,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            data,
            metadata,
        }
    }

    /// Encode `event` into its stored form.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the payload cannot be encoded.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            data: event.to_bytes()?,
            metadata,
        })
    }

    /// Decode the payload back into a domain fact.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the payload does not match `E`.
    pub fn decode<E: Event + DeserializeOwned>(&self) -> Result<E, EventError> {
        E::from_bytes(&self.data)
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}
