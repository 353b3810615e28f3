//! SchedulingProvider trait and implementations.
//!
//! This crate provides the abstraction layer for telemedicine scheduling
//! backends:
//!
//! - [`SchedulingProvider`] - The core trait that all backends implement
//! - [`AuthSession`] - Lazy, per-instance authentication state
//! - [`ResponseCache`] - Read-through cache keyed by argument fingerprints
//! - [`aggregate_doctors_with_slots`] - Raw records to bookable doctors
//! - [`ErrorTranslator`] - Policy for failed upstream responses
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐
//! │   Fleury API    │    │ In-memory store │
//! └────────┬────────┘    └────────┬────────┘
//!          │                      │
//!          ▼                      ▼
//! ┌─────────────────┐    ┌─────────────────┐
//! │ FleuryProvider  │    │  FakeProvider   │
//! └────────┬────────┘    └────────┬────────┘
//!          │                      │
//!          │  SchedulingProvider  │
//!          └──────────┬───────────┘
//!                     │
//!                     ▼
//!         ┌───────────────────────┐
//!         │ Doctor / Slot /       │
//!         │ Appointment entities  │
//!         └───────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use telemed_providers::{DoctorsWithSlotsQuery, SchedulingProvider};
//!
//! async fn first_slot(provider: &dyn SchedulingProvider) -> ProviderResult<Option<AppointmentSlot>> {
//!     let doctors = provider
//!         .get_doctors_with_slots(DoctorsWithSlotsQuery::new().with_specialty("cardiology"))
//!         .await?;
//!     Ok(doctors.first().and_then(|d| d.slots().first().cloned()))
//! }
//! ```

pub mod aggregate;
pub mod cache;
pub mod error;
#[cfg(feature = "fake")]
pub mod fake;
#[cfg(feature = "fleury")]
pub mod fleury;
pub mod provider;
pub mod raw;
pub mod session;
pub mod translate;

// Re-export main types at crate root
pub use aggregate::{SlotFilter, aggregate_doctors_with_slots};
pub use cache::{CacheArgs, CacheBackend, CachePolicy, InMemoryCache, ResponseCache, fingerprint};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{BoxFuture, DoctorQuery, DoctorsWithSlotsQuery, SchedulingProvider, SlotQuery};
pub use raw::{RawProfessional, RawProfessionalSlots, RawSlot};
pub use session::{AuthSession, TokenInfo};
pub use translate::{DefaultErrorTranslator, ErrorTranslator, UpstreamResponse};
