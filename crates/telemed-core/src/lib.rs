//! Core types: patients, doctors, slots, appointments, time helpers

pub mod appointment;
pub mod doctor;
pub mod patient;
pub mod slot;
pub mod time;
pub mod tracing;

pub use appointment::{Appointment, AppointmentStatus};
pub use doctor::{Doctor, DoctorCollection};
pub use patient::PatientData;
pub use slot::{AppointmentSlot, AppointmentSlotCollection};
pub use time::{brasilia_offset, format_api_date, format_api_datetime, parse_provider_datetime};
pub use crate::tracing::{LogFormat, TracingConfig, TracingError, init_tracing};
