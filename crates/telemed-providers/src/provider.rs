//! SchedulingProvider trait definition.
//!
//! This module defines the [`SchedulingProvider`] trait, the core abstraction
//! over telemedicine vendors (Fleury, the in-memory fake, etc.).
//!
//! Providers are responsible for:
//! - Authenticating lazily with the patient data they were given
//! - Listing doctors and their bookable slots
//! - Booking slots and returning patient-facing links
//! - Caching list/search calls according to the selected [`CachePolicy`]

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, FixedOffset, Utc};
use telemed_core::{Appointment, AppointmentSlotCollection, DoctorCollection, PatientData};

use crate::cache::CachePolicy;
use crate::error::{ProviderError, ProviderResult};

/// Filters for listing doctors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorQuery {
    /// Only doctors of this specialty (exact match).
    pub specialty: Option<String>,
    /// Only doctors matching this name (adapter-defined matching).
    pub name: Option<String>,
}

impl DoctorQuery {
    /// Creates an unfiltered query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to filter by specialty.
    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    /// Builder method to filter by name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Filters for listing one doctor's slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotQuery {
    /// Only slots for this specialty.
    pub specialty: Option<String>,
    /// Inclusive upper bound: slots strictly after it are dropped.
    pub until: Option<DateTime<FixedOffset>>,
    /// Maximum number of slots to return.
    pub limit: Option<usize>,
}

impl SlotQuery {
    /// Creates an unfiltered query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to filter by specialty.
    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    /// Builder method to set the inclusive upper bound.
    pub fn with_until(mut self, until: DateTime<FixedOffset>) -> Self {
        self.until = Some(until);
        self
    }

    /// Builder method to set the maximum number of slots.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Filters for the composite doctors-with-slots query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorsWithSlotsQuery {
    /// Only doctors of this specialty.
    pub specialty: Option<String>,
    /// Only this doctor.
    pub doctor_id: Option<String>,
    /// Inclusive upper bound for slot dates.
    pub until: Option<DateTime<FixedOffset>>,
    /// Maximum number of slots per doctor.
    pub slot_limit: Option<usize>,
}

impl DoctorsWithSlotsQuery {
    /// Creates an unfiltered query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to filter by specialty.
    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    /// Builder method to restrict to one doctor.
    pub fn with_doctor_id(mut self, doctor_id: impl Into<String>) -> Self {
        self.doctor_id = Some(doctor_id.into());
        self
    }

    /// Builder method to set the inclusive upper bound.
    pub fn with_until(mut self, until: DateTime<FixedOffset>) -> Self {
        self.until = Some(until);
        self
    }

    /// Builder method to cap the slots per doctor.
    pub fn with_slot_limit(mut self, limit: usize) -> Self {
        self.slot_limit = Some(limit);
        self
    }

    /// Returns the query for the slots of a single doctor.
    pub fn for_doctor(doctor_id: &str, query: SlotQuery) -> Self {
        Self {
            specialty: query.specialty,
            doctor_id: Some(doctor_id.to_string()),
            until: query.until,
            slot_limit: query.limit,
        }
    }
}

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so callers can hold a
/// `Box<dyn SchedulingProvider>` and swap implementations freely.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core abstraction for telemedicine scheduling providers.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; state lives behind interior locks
/// - Every operation authenticates on demand with the patient data set via
///   [`set_patient_data_for_authentication`]; callers never call
///   [`authenticate`] themselves
/// - Only `get_doctors` and `get_doctors_with_slots` may be cached
/// - Preconditions fail before any network call and never leave partial state
///
/// [`set_patient_data_for_authentication`]: SchedulingProvider::set_patient_data_for_authentication
/// [`authenticate`]: SchedulingProvider::authenticate
pub trait SchedulingProvider: Send + Sync {
    /// Returns the name of this provider (e.g., "fleury", "fake").
    fn name(&self) -> &str;

    /// Records the patient data used by the next authentication.
    ///
    /// No network call is made.
    fn set_patient_data_for_authentication(&self, patient: PatientData);

    /// Establishes an authenticated session and returns the access token.
    ///
    /// # Errors
    ///
    /// Fails with `AuthenticationFailed` when no patient data was set.
    fn authenticate(&self) -> BoxFuture<'_, ProviderResult<String>>;

    /// Checks if a token is currently held.
    fn is_authenticated(&self) -> bool;

    /// Lists doctors, optionally filtered by specialty and name.
    fn get_doctors(&self, query: DoctorQuery) -> BoxFuture<'_, ProviderResult<DoctorCollection>>;

    /// Lists the available slots of one doctor.
    fn get_slots_for_doctor<'a>(
        &'a self,
        doctor_id: &'a str,
        query: SlotQuery,
    ) -> BoxFuture<'a, ProviderResult<AppointmentSlotCollection>>;

    /// Lists doctors that have at least one matching slot, with those slots attached.
    fn get_doctors_with_slots(
        &self,
        query: DoctorsWithSlotsQuery,
    ) -> BoxFuture<'_, ProviderResult<DoctorCollection>>;

    /// Books `slot_id` for `patient`.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidSlot` when the slot is unknown.
    fn schedule_using_patient_data<'a>(
        &'a self,
        specialty: &'a str,
        slot_id: &'a str,
        patient: &'a PatientData,
    ) -> BoxFuture<'a, ProviderResult<Appointment>>;

    /// Returns the patient-facing link of an appointment.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidAppointment` when the appointment is unknown.
    fn get_appointment_link<'a>(
        &'a self,
        appointment_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<String>>;

    /// Cancels an appointment.
    ///
    /// The default implementation reports unsupported operation.
    fn cancel_appointment<'a>(&'a self, _appointment_id: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
        let error = ProviderError::unsupported("appointment cancellation is not supported by this provider")
            .with_provider(self.name());
        Box::pin(async move { Err(error) })
    }

    /// Sets the cache policy for subsequent list/search calls.
    fn set_cache_policy(&self, policy: CachePolicy);

    /// Caches list/search results until `until`.
    fn cache_until(&self, until: DateTime<Utc>) {
        self.set_cache_policy(CachePolicy::Until(until));
    }

    /// Disables caching for subsequent list/search calls.
    fn without_cache(&self) {
        self.set_cache_policy(CachePolicy::Disabled);
    }
}
