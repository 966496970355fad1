//! Shared types for the voxbook call front-end.
//!
//! This crate holds the wire types exchanged with the token/summary backend
//! and the small domain enums used by the call controller. Both the client
//! (`voxbook-session`) and the backend (`voxbook-server`) depend on it, so
//! the JSON shapes are defined exactly once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Narrative used when no summary could be retrieved from the backend.
pub const FALLBACK_SUMMARY_TEXT: &str =
    "The conversation has ended. Thank you for using our AI booking assistant.";

/// Lifecycle state of a single voice call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// No credential held, no room joined.
    Idle,
    /// Credential requested but not yet obtained.
    Connecting,
    /// Credential obtained and room joined.
    Active,
    /// Room left or agent departed; summary pending or on display.
    Ended,
}

impl CallState {
    /// Returns the string label for this state.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }

    /// Whether a session credential is held (or being acquired) in this state.
    pub fn holds_credential(self) -> bool {
        matches!(self, Self::Connecting | Self::Active)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque media-room join credential.
///
/// The inner value is never shown by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for handing to the media room.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Response body of `GET /api/token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Media-room join credential.
    pub token: Credential,
    /// Room the credential grants access to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Identity the local participant joins under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Media server URL, when the backend knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A booked appointment as reported by the booking backend.
///
/// Read-only: the front-end never mutates appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Slot date-time, e.g. `2026-01-20T10:00:00`.
    pub slot: String,
    /// Backend identifier; string or integer depending on the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    /// Booking status; absent means confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Appointment {
    pub fn new(slot: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            id: None,
            name: None,
            contact_number: None,
            status: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == "confirmed")
    }
}

/// Post-call report produced by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSummary {
    /// Narrative description of the conversation.
    pub text: String,
    /// Appointments touched during the call, in backend order.
    #[serde(default)]
    pub appointments: Vec<Appointment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<String>,
    /// Creation time, ISO 8601.
    pub timestamp: String,
}

impl CallSummary {
    /// Builds the generic summary shown when the backend never answered.
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_SUMMARY_TEXT.to_string(),
            appointments: Vec::new(),
            preferences: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_parses_backend_body() {
        let body = r#"{
            "text": "Booked one appointment.",
            "appointments": [
                {"id": "1", "contact_number": "555", "slot": "2026-01-20T10:00:00",
                 "name": "Sam", "status": "confirmed"}
            ],
            "timestamp": "2026-01-19T09:00:00+00:00"
        }"#;

        let summary: CallSummary = serde_json::from_str(body).unwrap();
        assert_eq!(summary.appointments.len(), 1);
        assert_eq!(summary.appointments[0].slot, "2026-01-20T10:00:00");
        assert!(summary.appointments[0].is_confirmed());
        assert!(summary.preferences.is_none());
    }

    #[test]
    fn appointment_accepts_numeric_id() {
        let appointment: Appointment =
            serde_json::from_str(r#"{"id": 42, "slot": "2026-01-21T09:00:00"}"#).unwrap();
        assert_eq!(appointment.id, Some(serde_json::json!(42)));
    }

    #[test]
    fn summary_without_appointments_defaults_to_empty() {
        let summary: CallSummary =
            serde_json::from_str(r#"{"text": "Bye", "timestamp": "2026-01-19T09:00:00Z"}"#)
                .unwrap();
        assert!(summary.appointments.is_empty());
    }

    #[test]
    fn fallback_summary_has_no_appointments() {
        let summary = CallSummary::fallback();
        assert_eq!(summary.text, FALLBACK_SUMMARY_TEXT);
        assert!(summary.appointments.is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(&summary.timestamp).is_ok());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let response: TokenResponse = serde_json::from_str(r#"{"token": "secret-jwt"}"#).unwrap();
        assert_eq!(response.token.expose(), "secret-jwt");
        assert!(!format!("{:?}", response).contains("secret-jwt"));
        assert!(response.room.is_none());
    }

    #[test]
    fn cancelled_appointment_is_not_confirmed() {
        let mut appointment = Appointment::new("2026-01-20T10:00:00");
        assert!(appointment.is_confirmed());
        appointment.status = Some("cancelled".to_string());
        assert!(!appointment.is_confirmed());
    }

    #[test]
    fn call_state_credential_invariant() {
        assert!(!CallState::Idle.holds_credential());
        assert!(CallState::Connecting.holds_credential());
        assert!(CallState::Active.holds_credential());
        assert!(!CallState::Ended.holds_credential());
        assert_eq!(CallState::Ended.to_string(), "ended");
    }
}
