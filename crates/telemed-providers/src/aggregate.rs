//! Raw records to doctors-with-slots aggregation.
//!
//! This module turns a flat provider response, where each record pairs a
//! professional with zero or more raw slots, into a [`DoctorCollection`]
//! holding only bookable doctors.
//!
//! The aggregation process, per record:
//! 1. Skip the record if it has no slots
//! 2. Parse every raw slot into an [`AppointmentSlot`]
//! 3. Apply the inclusive `until` bound and the per-doctor slot limit,
//!    skipping the record if nothing survives
//! 4. Map the professional to a [`Doctor`]
//! 5. Attach the slots to a fresh `Doctor`
//! 6. Append it, merging into an earlier entry with the same id
//!
//! Output order follows the upstream order of first appearance.

use chrono::{DateTime, FixedOffset};
use telemed_core::{AppointmentSlot, AppointmentSlotCollection, Doctor, DoctorCollection};
use tracing::{debug, trace};

use crate::error::{ProviderError, ProviderResult};
use crate::raw::{RawProfessionalSlots, RawSlot};

/// Filters applied to the slots of every record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotFilter {
    /// Inclusive upper bound for slot dates.
    pub until: Option<DateTime<FixedOffset>>,
    /// Maximum number of slots per doctor.
    pub limit: Option<usize>,
}

impl SlotFilter {
    /// Creates a filter that keeps every slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the inclusive upper bound.
    pub fn with_until(mut self, until: Option<DateTime<FixedOffset>>) -> Self {
        self.until = until;
        self
    }

    /// Builder method to set the per-doctor limit.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Applies the bound, then the limit.
    pub fn apply(&self, slots: AppointmentSlotCollection) -> AppointmentSlotCollection {
        let bounded = match self.until {
            Some(until) => slots.until(&until),
            None => slots,
        };
        match self.limit {
            Some(limit) => bounded.truncated(limit),
            None => bounded,
        }
    }
}

/// Builds the doctors-with-slots view from raw records.
///
/// `parse_date` is the provider-specific date parser.
///
/// # Errors
///
/// Returns `InvalidResponse` if any slot date cannot be parsed; no partial
/// collection is returned.
pub fn aggregate_doctors_with_slots<F>(
    records: Vec<RawProfessionalSlots>,
    filter: &SlotFilter,
    parse_date: F,
) -> ProviderResult<DoctorCollection>
where
    F: Fn(&str) -> Option<DateTime<FixedOffset>>,
{
    let mut doctors = DoctorCollection::new();

    for record in records {
        if record.slots.is_empty() {
            trace!(doctor = %record.professional.id, "Skipping professional without slots");
            continue;
        }

        let slots = convert_slots(&record.slots, &parse_date)?;
        let slots = filter.apply(slots);
        if slots.is_empty() {
            trace!(doctor = %record.professional.id, "No slot left after filtering");
            continue;
        }

        let doctor = record.professional.to_doctor();
        let existing = doctors
            .position(&doctor.id)
            .and_then(|index| doctors.get(index).map(|d| (index, merge_slots(d, slots.clone(), filter))));
        match existing {
            Some((index, merged)) => {
                debug!(doctor = %doctor.id, "Merging slots of repeated professional");
                doctors.replace(index, merged);
            }
            None => doctors.add(doctor.with_slots(slots)),
        }
    }

    debug!(count = doctors.len(), "Aggregated doctors with slots");
    Ok(doctors)
}

/// Parses raw slots, failing on the first unparsable date.
pub fn convert_slots<F>(raw: &[RawSlot], parse_date: &F) -> ProviderResult<AppointmentSlotCollection>
where
    F: Fn(&str) -> Option<DateTime<FixedOffset>>,
{
    raw.iter()
        .map(|slot| {
            parse_date(&slot.date)
                .map(|date| AppointmentSlot::new(&slot.id, date))
                .ok_or_else(|| {
                    ProviderError::invalid_response(format!(
                        "slot {} has an unparsable date: {:?}",
                        slot.id, slot.date
                    ))
                })
        })
        .collect()
}

/// Rebuilds `existing` with the unseen `extra` slots appended.
fn merge_slots(existing: &Doctor, extra: AppointmentSlotCollection, filter: &SlotFilter) -> Doctor {
    let mut slots = existing.slots();
    for slot in extra {
        if slots.find(&slot.id).is_none() {
            slots.add(slot);
        }
    }
    existing.with_slots(filter.apply(slots))
}
