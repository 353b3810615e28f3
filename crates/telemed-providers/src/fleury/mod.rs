//! Fleury telemedicine provider implementation.
//!
//! This module provides a [`FleuryProvider`] that lists doctors and slots
//! and books appointments through the Fleury telemedicine API.
//!
//! # Features
//!
//! - Lazy authentication with the patient's own data
//! - Read-through caching of doctor listings and slot searches
//! - Local enforcement of the `until` bound and the 50-slot cap
//! - Pluggable translation of failed responses
//!
//! # Example
//!
//! ```ignore
//! use telemed_providers::fleury::{FleuryConfig, FleuryProvider};
//! use telemed_providers::{DoctorsWithSlotsQuery, SchedulingProvider};
//!
//! let config = FleuryConfig::from_toml_str(&std::fs::read_to_string("fleury.toml")?)?;
//! let provider = FleuryProvider::new(config)?.with_patient_data(patient);
//!
//! let doctors = provider
//!     .get_doctors_with_slots(DoctorsWithSlotsQuery::new().with_specialty("cardiology"))
//!     .await?;
//! ```

mod client;
mod config;
mod provider;

pub use client::{
    ApiAppointment, ApiPatient, AppointmentRequest, AuthRequest, FleuryClient, SlotSearchRequest,
};
pub use config::{FleuryConfig, FleurySettings, resolve_secret};
pub use provider::{FleuryProvider, PROVIDER_NAME};
