//! Raw doctor and slot records from providers.
//!
//! Adapters decode their vendor payloads into these provider-agnostic
//! records. The [`aggregate`](crate::aggregate) pipeline then turns them into
//! domain entities. Dates stay as raw strings here because each vendor has
//! its own format; parsing is supplied by the adapter at aggregation time.

use serde::{Deserialize, Serialize};
use telemed_core::Doctor;

/// A professional as described by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProfessional {
    /// Upstream identifier.
    pub id: String,
    /// Full name.
    pub name: String,
    /// Council registration number, when the provider sends one.
    pub council_number: Option<String>,
    /// Photo URL, when the provider sends one.
    pub photo: Option<String>,
}

impl RawProfessional {
    /// Creates a raw professional with only id and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            council_number: None,
            photo: None,
        }
    }

    /// Builder method to set the council number.
    pub fn with_council_number(mut self, council_number: impl Into<String>) -> Self {
        self.council_number = Some(council_number.into());
        self
    }

    /// Builder method to set the photo.
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }

    /// Maps this record to a [`Doctor`] without slots.
    pub fn to_doctor(&self) -> Doctor {
        let doctor = Doctor::new(
            &self.id,
            self.name.trim(),
            self.council_number.clone().unwrap_or_default(),
        );
        match self.photo.as_deref().map(str::trim) {
            Some(photo) if !photo.is_empty() => doctor.with_photo(photo),
            _ => doctor,
        }
    }
}

/// A bookable slot as described by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSlot {
    /// Upstream slot identifier.
    pub id: String,
    /// Date-time in the provider's own format.
    pub date: String,
}

impl RawSlot {
    /// Creates a raw slot.
    pub fn new(id: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
        }
    }
}

/// One record of a doctors-with-slots response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProfessionalSlots {
    /// The professional.
    pub professional: RawProfessional,
    /// Their slots, possibly empty.
    pub slots: Vec<RawSlot>,
}

impl RawProfessionalSlots {
    /// Creates a record.
    pub fn new(professional: RawProfessional, slots: Vec<RawSlot>) -> Self {
        Self {
            professional,
            slots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_doctor_maps_all_fields() {
        let doctor = RawProfessional::new("12", " Dra. Ana Lima ")
            .with_council_number("CRM-SP 12345")
            .with_photo("https://cdn.example/ana.jpg")
            .to_doctor();

        assert_eq!(doctor.id, "12");
        assert_eq!(doctor.name, "Dra. Ana Lima");
        assert_eq!(doctor.council_number, "CRM-SP 12345");
        assert_eq!(doctor.photo.as_deref(), Some("https://cdn.example/ana.jpg"));
        assert!(doctor.slots.is_none());
    }

    #[test]
    fn blank_photo_is_dropped() {
        let doctor = RawProfessional::new("1", "A").with_photo("  ").to_doctor();
        assert!(doctor.photo.is_none());
        assert_eq!(doctor.council_number, "");
    }
}
