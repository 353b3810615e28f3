//! In-memory provider for tests.
//!
//! [`FakeProvider`] implements [`SchedulingProvider`](crate::SchedulingProvider)
//! over in-memory stores, so code written against the trait can be tested
//! without a network. It enforces the same preconditions as the real
//! adapters: every operation needs patient data for authentication.
//!
//! # Example
//!
//! ```ignore
//! use telemed_providers::fake::FakeProvider;
//! use telemed_providers::{DoctorsWithSlotsQuery, SchedulingProvider};
//!
//! let fake = FakeProvider::new().with_patient_data(patient.clone());
//! let doctor = fake.mock_existing_doctor("cardiology", None);
//! let slot = fake.mock_existing_doctor_slot(&doctor.id, "cardiology", None);
//!
//! book_first_available(&fake, "cardiology", &patient).await?;
//!
//! fake.assert_appointment_created_matching(|_, slot_id, _, _| slot_id == slot.id);
//! ```

mod provider;
mod state;

pub use provider::FakeProvider;
pub use state::{CreatedAppointment, FakeResponse};

/// Name reported by [`FakeProvider`].
pub const FAKE_PROVIDER_NAME: &str = "fake";

/// Prefix of generated appointment links; the appointment id follows.
pub const FAKE_LINK_BASE: &str = "https://telemed.fake/appointments/";

/// Cancelling this id fails with `InvalidAppointment`.
pub const FAKE_CANCEL_NOT_FOUND_ID: &str = "fake-cancel-not-found";

/// Cancelling this id fails with `Upstream`.
pub const FAKE_CANCEL_UPSTREAM_FAILURE_ID: &str = "fake-cancel-upstream-failure";
