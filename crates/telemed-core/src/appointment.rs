//! Booked appointments.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an appointment, normalized across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    /// Booked and waiting to happen.
    Scheduled,
    /// Cancelled by the patient or the provider.
    Cancelled,
    /// The consultation took place.
    Completed,
}

impl AppointmentStatus {
    /// Maps a provider's raw status to the normalized set.
    ///
    /// Matching is case-insensitive and accepts the English and Portuguese
    /// spellings seen upstream. Unknown statuses return `None`.
    pub fn from_provider(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "scheduled" | "booked" | "confirmed" | "pending" | "agendado" | "agendada"
            | "confirmado" | "confirmada" => Some(Self::Scheduled),
            "cancelled" | "canceled" | "cancelado" | "cancelada" => Some(Self::Cancelled),
            "completed" | "finished" | "done" | "realizado" | "realizada" | "finalizado"
            | "finalizada" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Returns the canonical name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An appointment created by a successful scheduling call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Upstream appointment identifier.
    pub id: String,
    /// Scheduled date and time.
    pub date: DateTime<FixedOffset>,
    /// Current status.
    pub status: AppointmentStatus,
}

impl Appointment {
    /// Creates a new appointment.
    pub fn new(id: impl Into<String>, date: DateTime<FixedOffset>, status: AppointmentStatus) -> Self {
        Self {
            id: id.into(),
            date,
            status,
        }
    }

    /// Returns a copy of this appointment with another status.
    pub fn with_status(&self, status: AppointmentStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}
