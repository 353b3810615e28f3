//! In-memory stores behind [`FakeProvider`](super::FakeProvider).

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Duration, FixedOffset};
use telemed_core::{
    Appointment, AppointmentSlot, AppointmentSlotCollection, Doctor, DoctorCollection,
    PatientData,
};

use crate::cache::CachePolicy;
use crate::error::ProviderError;

/// A canned response queued with
/// [`FakeProvider::set_next_response`](super::FakeProvider::set_next_response).
#[derive(Debug)]
pub enum FakeResponse {
    /// Returned by the next `get_doctors` or `get_doctors_with_slots`.
    Doctors(DoctorCollection),
    /// Returned by the next `get_slots_for_doctor`.
    Slots(AppointmentSlotCollection),
    /// Returned (and recorded) by the next `schedule_using_patient_data`.
    Appointment(Appointment),
    /// Returned by the next `get_appointment_link`.
    Link(String),
    /// Returned by whichever operation runs next.
    Failure(ProviderError),
}

/// One successful scheduling call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAppointment {
    pub specialty: String,
    pub slot_id: String,
    pub patient: PatientData,
    pub appointment: Appointment,
}

/// Key of the appointment store.
pub(crate) fn appointment_key(specialty: &str, patient: &PatientData, slot_id: &str) -> String {
    format!("{}|{}|{}", specialty, patient.fingerprint(), slot_id)
}

/// First generated slot date: Monday 2030-01-07 09:00 in Brasília.
fn anchor_date() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2030-01-07T09:00:00-03:00").expect("valid anchor date")
}

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    /// specialty -> doctors in insertion order.
    doctors: BTreeMap<String, Vec<Doctor>>,
    /// doctor id -> specialty -> slots in insertion order.
    slots: HashMap<String, BTreeMap<String, Vec<AppointmentSlot>>>,
    appointments: HashMap<String, Appointment>,
    created: Vec<CreatedAppointment>,
    sequence: u64,
    responses: VecDeque<FakeResponse>,
    cache_policies: Vec<CachePolicy>,
}

impl FakeState {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    pub(crate) fn generate_doctor(&mut self) -> Doctor {
        let n = self.next_sequence();
        Doctor::new(
            format!("fake-doctor-{}", n),
            format!("Dr. Fake {}", n),
            format!("CRM-FAKE {}", n),
        )
    }

    /// Slots are spaced 30 minutes apart per doctor, from the anchor date.
    pub(crate) fn generate_slot(&mut self, doctor_id: &str) -> AppointmentSlot {
        let n = self.next_sequence();
        let existing = self
            .slots
            .get(doctor_id)
            .map(|by_specialty| by_specialty.values().map(Vec::len).sum::<usize>())
            .unwrap_or(0);
        let offset = Duration::minutes(30 * existing as i64);
        AppointmentSlot::new(format!("fake-slot-{}", n), anchor_date() + offset)
    }

    pub(crate) fn generate_appointment_id(&mut self) -> String {
        format!("fake-appointment-{}", self.next_sequence())
    }

    pub(crate) fn put_doctor(&mut self, specialty: &str, doctor: Doctor) {
        let listed = self.doctors.entry(specialty.to_string()).or_default();
        match listed.iter().position(|d| d.id == doctor.id) {
            Some(index) => listed[index] = doctor,
            None => listed.push(doctor),
        }
    }

    pub(crate) fn put_slot(&mut self, doctor_id: &str, specialty: &str, slot: AppointmentSlot) {
        let listed = self
            .slots
            .entry(doctor_id.to_string())
            .or_default()
            .entry(specialty.to_string())
            .or_default();
        match listed.iter().position(|s| s.id == slot.id) {
            Some(index) => listed[index] = slot,
            None => listed.push(slot),
        }
    }

    /// Doctors listed under `specialty`, or under every specialty.
    pub(crate) fn doctors_in<'a>(
        &'a self,
        specialty: Option<&'a str>,
    ) -> impl Iterator<Item = (&'a str, &'a Doctor)> + 'a {
        self.doctors
            .iter()
            .filter(move |(listed_under, _)| specialty.is_none_or(|s| s == listed_under.as_str()))
            .flat_map(|(listed_under, doctors)| {
                doctors.iter().map(move |d| (listed_under.as_str(), d))
            })
    }

    /// Slots of a doctor under `specialty`, or under every specialty.
    pub(crate) fn slots_of(&self, doctor_id: &str, specialty: Option<&str>) -> AppointmentSlotCollection {
        let mut collected = AppointmentSlotCollection::new();
        let Some(by_specialty) = self.slots.get(doctor_id) else {
            return collected;
        };
        for (listed_under, slots) in by_specialty {
            if specialty.is_some_and(|s| s != listed_under.as_str()) {
                continue;
            }
            for slot in slots {
                if collected.find(&slot.id).is_none() {
                    collected.add(slot.clone());
                }
            }
        }
        collected
    }

    /// Finds an open slot offered under `specialty` by any doctor.
    pub(crate) fn find_slot(&self, specialty: &str, slot_id: &str) -> Option<AppointmentSlot> {
        self.slots
            .values()
            .filter_map(|by_specialty| by_specialty.get(specialty))
            .flatten()
            .find(|slot| slot.id == slot_id)
            .cloned()
    }

    /// Removes a booked slot from every listing under `specialty`.
    pub(crate) fn take_slot(&mut self, specialty: &str, slot_id: &str) {
        for by_specialty in self.slots.values_mut() {
            if let Some(listed) = by_specialty.get_mut(specialty) {
                listed.retain(|slot| slot.id != slot_id);
            }
        }
    }

    pub(crate) fn appointment(&self, key: &str) -> Option<&Appointment> {
        self.appointments.get(key)
    }

    pub(crate) fn find_appointment(&self, appointment_id: &str) -> Option<&Appointment> {
        self.appointments.values().find(|a| a.id == appointment_id)
    }

    pub(crate) fn put_appointment(&mut self, key: String, appointment: Appointment) {
        self.appointments.insert(key, appointment);
    }

    /// Replaces every stored copy of an appointment, returning true if found.
    pub(crate) fn update_appointment(&mut self, updated: &Appointment) -> bool {
        let mut found = false;
        for stored in self.appointments.values_mut() {
            if stored.id == updated.id {
                *stored = updated.clone();
                found = true;
            }
        }
        for created in &mut self.created {
            if created.appointment.id == updated.id {
                created.appointment = updated.clone();
            }
        }
        found
    }

    pub(crate) fn record_created(&mut self, created: CreatedAppointment) {
        self.created.push(created);
    }

    pub(crate) fn created(&self) -> &[CreatedAppointment] {
        &self.created
    }

    pub(crate) fn push_response(&mut self, response: FakeResponse) {
        self.responses.push_back(response);
    }

    /// Pops the front response if it is a failure or `pick` accepts it.
    pub(crate) fn next_response<T>(
        &mut self,
        pick: fn(FakeResponse) -> Result<T, FakeResponse>,
    ) -> Option<Result<T, ProviderError>> {
        let response = self.responses.pop_front()?;
        if let FakeResponse::Failure(error) = response {
            return Some(Err(error));
        }
        match pick(response) {
            Ok(value) => Some(Ok(value)),
            Err(unmatched) => {
                self.responses.push_front(unmatched);
                None
            }
        }
    }

    pub(crate) fn record_cache_policy(&mut self, policy: CachePolicy) {
        self.cache_policies.push(policy);
    }

    pub(crate) fn cache_policies(&self) -> &[CachePolicy] {
        &self.cache_policies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    #[test]
    fn put_doctor_replaces_by_id() {
        let mut state = FakeState::default();
        state.put_doctor("cardiology", Doctor::new("1", "Dr. A", "CRM 1"));
        state.put_doctor("cardiology", Doctor::new("2", "Dr. B", "CRM 2"));
        state.put_doctor("cardiology", Doctor::new("1", "Dr. A Renamed", "CRM 1"));

        let names: Vec<_> = state.doctors_in(Some("cardiology")).map(|(_, d)| d.name.clone()).collect();
        assert_eq!(names, vec!["Dr. A Renamed", "Dr. B"]);
    }

    #[test]
    fn generated_slots_are_spaced_per_doctor() {
        let mut state = FakeState::default();
        let first = state.generate_slot("1");
        state.put_slot("1", "cardiology", first.clone());
        let second = state.generate_slot("1");
        let other = state.generate_slot("2");

        assert_eq!(first.date, anchor_date());
        assert_eq!(second.date - first.date, Duration::minutes(30));
        assert_eq!(other.date, anchor_date());
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn slots_of_merges_specialties_without_duplicates() {
        let mut state = FakeState::default();
        let slot = AppointmentSlot::new("s1", anchor_date());
        state.put_slot("1", "cardiology", slot.clone());
        state.put_slot("1", "general", slot);
        state.put_slot("1", "general", AppointmentSlot::new("s2", anchor_date()));

        assert_eq!(state.slots_of("1", None).len(), 2);
        assert_eq!(state.slots_of("1", Some("cardiology")).len(), 1);
        assert!(state.slots_of("1", Some("dermatology")).is_empty());
        assert!(state.slots_of("9", None).is_empty());
    }

    #[test]
    fn unmatched_responses_stay_queued() {
        let mut state = FakeState::default();
        state.push_response(FakeResponse::Link("https://x".into()));

        let doctors = state.next_response(|r| match r {
            FakeResponse::Doctors(d) => Ok(d),
            other => Err(other),
        });
        assert!(doctors.is_none());

        let link = state.next_response(|r| match r {
            FakeResponse::Link(l) => Ok(l),
            other => Err(other),
        });
        assert_eq!(link.unwrap().unwrap(), "https://x");
    }

    #[test]
    fn failures_match_any_operation() {
        let mut state = FakeState::default();
        state.push_response(FakeResponse::Failure(ProviderError::rate_limited("slow down")));

        let result = state.next_response(|r| match r {
            FakeResponse::Slots(s) => Ok(s),
            other => Err(other),
        });
        assert_eq!(result.unwrap().unwrap_err().code(), ProviderErrorCode::RateLimited);
        assert!(state.next_response(|r| Err::<(), _>(r)).is_none());
    }
}
