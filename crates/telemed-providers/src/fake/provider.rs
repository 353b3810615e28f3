//! In-memory [`SchedulingProvider`] for tests.

use std::sync::{Mutex, MutexGuard};

use telemed_core::{
    Appointment, AppointmentSlot, AppointmentSlotCollection, AppointmentStatus, Doctor,
    DoctorCollection, PatientData,
};
use tracing::{debug, instrument};

use crate::aggregate::SlotFilter;
use crate::cache::CachePolicy;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{
    BoxFuture, DoctorQuery, DoctorsWithSlotsQuery, SchedulingProvider, SlotQuery,
};
use crate::session::AuthSession;

use super::state::{CreatedAppointment, FakeResponse, FakeState, appointment_key};
use super::{
    FAKE_CANCEL_NOT_FOUND_ID, FAKE_CANCEL_UPSTREAM_FAILURE_ID, FAKE_LINK_BASE, FAKE_PROVIDER_NAME,
};

/// A provider backed by in-memory stores.
///
/// Seed it with the `mock_existing_*` helpers, run the code under test
/// against it through [`SchedulingProvider`], then check what was booked
/// with the `assert_appointment_*` helpers.
///
/// Intended for a single test context; concurrent use is memory safe but
/// interleavings are not specified.
#[derive(Debug, Default)]
pub struct FakeProvider {
    session: AuthSession,
    state: Mutex<FakeState>,
}

impl FakeProvider {
    /// Creates an empty fake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the patient data used for authentication.
    pub fn with_patient_data(self, patient: PatientData) -> Self {
        self.session.set_patient(patient);
        self
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lists `doctor` under `specialty`, replacing a doctor with the same id.
    ///
    /// Generates a deterministic doctor when `doctor` is `None`.
    pub fn mock_existing_doctor(&self, specialty: &str, doctor: Option<Doctor>) -> Doctor {
        let mut state = self.state();
        let doctor = doctor.unwrap_or_else(|| state.generate_doctor());
        state.put_doctor(specialty, doctor.clone());
        doctor
    }

    /// Offers `slot` for a doctor under `specialty`.
    ///
    /// Generates a deterministic slot when `slot` is `None`.
    pub fn mock_existing_doctor_slot(
        &self,
        doctor_id: &str,
        specialty: &str,
        slot: Option<AppointmentSlot>,
    ) -> AppointmentSlot {
        let mut state = self.state();
        let slot = slot.unwrap_or_else(|| state.generate_slot(doctor_id));
        state.put_slot(doctor_id, specialty, slot.clone());
        slot
    }

    /// Stores an appointment as if `patient` had already booked `slot_id`.
    ///
    /// Scheduling the same slot again for the same patient and specialty
    /// returns this appointment.
    pub fn mock_existing_appointment(
        &self,
        specialty: &str,
        slot_id: &str,
        patient: &PatientData,
    ) -> Appointment {
        let mut state = self.state();
        let date = state
            .find_slot(specialty, slot_id)
            .map(|slot| slot.date)
            .unwrap_or_else(|| state.generate_slot("").date);
        let appointment = Appointment::new(
            state.generate_appointment_id(),
            date,
            AppointmentStatus::Scheduled,
        );
        state.put_appointment(
            appointment_key(specialty, patient, slot_id),
            appointment.clone(),
        );
        appointment
    }

    /// Queues a canned response for the next matching operation.
    pub fn set_next_response(&self, response: FakeResponse) {
        self.state().push_response(response);
    }

    /// Returns every successful scheduling call, oldest first.
    pub fn created_appointments(&self) -> Vec<CreatedAppointment> {
        self.state().created().to_vec()
    }

    /// Returns the last cache policy set, if any.
    pub fn cache_policy(&self) -> Option<CachePolicy> {
        self.state().cache_policies().last().copied()
    }

    /// Panics unless at least one appointment was created.
    #[track_caller]
    pub fn assert_appointment_created(&self) {
        let count = self.state().created().len();
        assert!(count > 0, "expected an appointment to be created, but none was");
    }

    /// Panics unless a created appointment satisfies `predicate`.
    ///
    /// The predicate receives `(specialty, slot_id, patient, appointment)`.
    #[track_caller]
    pub fn assert_appointment_created_matching<P>(&self, predicate: P)
    where
        P: Fn(&str, &str, &PatientData, &Appointment) -> bool,
    {
        let created = self.created_appointments();
        assert!(
            created.iter().any(|c| predicate(&c.specialty, &c.slot_id, &c.patient, &c.appointment)),
            "expected a matching appointment to be created; created: {:?}",
            created.iter().map(|c| &c.appointment.id).collect::<Vec<_>>()
        );
    }

    /// Panics if any appointment was created.
    #[track_caller]
    pub fn assert_appointment_not_created(&self) {
        let created = self.created_appointments();
        assert!(
            created.is_empty(),
            "expected no appointment to be created; created: {:?}",
            created.iter().map(|c| &c.appointment.id).collect::<Vec<_>>()
        );
    }

    /// Panics if a created appointment satisfies `predicate`.
    #[track_caller]
    pub fn assert_appointment_not_created_matching<P>(&self, predicate: P)
    where
        P: Fn(&str, &str, &PatientData, &Appointment) -> bool,
    {
        let created = self.created_appointments();
        let matching: Vec<_> = created
            .iter()
            .filter(|c| predicate(&c.specialty, &c.slot_id, &c.patient, &c.appointment))
            .map(|c| &c.appointment.id)
            .collect();
        assert!(
            matching.is_empty(),
            "expected no matching appointment to be created; matching: {:?}",
            matching
        );
    }

    #[instrument(name = "authenticate", skip_all, fields(provider = FAKE_PROVIDER_NAME))]
    fn authenticate_impl(&self) -> ProviderResult<String> {
        let patient = self
            .session
            .patient()
            .map_err(|e| e.with_provider(FAKE_PROVIDER_NAME))?;
        let token = format!("fake-token-{}", &patient.fingerprint()[..16]);
        self.session.store_token(&token);
        debug!(provider = FAKE_PROVIDER_NAME, "authenticated");
        Ok(token)
    }

    fn ensure_authenticated(&self) -> ProviderResult<()> {
        if !self.session.is_authenticated() {
            self.authenticate_impl()?;
        }
        Ok(())
    }

    fn next_response<T>(
        &self,
        pick: fn(FakeResponse) -> Result<T, FakeResponse>,
    ) -> Option<ProviderResult<T>> {
        self.state()
            .next_response(pick)
            .map(|result| result.map_err(tag))
    }

    #[instrument(name = "get_doctors", skip(self), fields(provider = FAKE_PROVIDER_NAME))]
    fn get_doctors_impl(&self, query: &DoctorQuery) -> ProviderResult<DoctorCollection> {
        self.ensure_authenticated()?;
        if let Some(canned) = self.next_response(|r| match r {
            FakeResponse::Doctors(doctors) => Ok(doctors),
            other => Err(other),
        }) {
            return canned;
        }

        let state = self.state();
        let mut doctors = DoctorCollection::new();
        for (_, doctor) in state.doctors_in(query.specialty.as_deref()) {
            if query.name.as_deref().is_some_and(|name| name != doctor.name) {
                continue;
            }
            if doctors.find(&doctor.id).is_none() {
                doctors.add(Doctor {
                    slots: None,
                    ..doctor.clone()
                });
            }
        }
        Ok(doctors)
    }

    #[instrument(name = "get_doctors_with_slots", skip(self), fields(provider = FAKE_PROVIDER_NAME))]
    fn get_doctors_with_slots_impl(
        &self,
        query: &DoctorsWithSlotsQuery,
    ) -> ProviderResult<DoctorCollection> {
        self.ensure_authenticated()?;
        let filter = SlotFilter::new()
            .with_until(query.until)
            .with_limit(query.slot_limit);
        if let Some(canned) = self.next_response(|r| match r {
            FakeResponse::Doctors(doctors) => Ok(doctors),
            other => Err(other),
        }) {
            return canned.map(|doctors| bookable(doctors, &filter));
        }

        let state = self.state();
        let mut doctors = DoctorCollection::new();
        for (specialty, doctor) in state.doctors_in(query.specialty.as_deref()) {
            if query.doctor_id.as_deref().is_some_and(|id| id != doctor.id) {
                continue;
            }
            let offered = state.slots_of(&doctor.id, Some(specialty));
            let merged = match doctors.position(&doctor.id) {
                Some(index) => {
                    let mut slots = doctors.get(index).map(Doctor::slots).unwrap_or_default();
                    for slot in offered {
                        if slots.find(&slot.id).is_none() {
                            slots.add(slot);
                        }
                    }
                    doctors.replace(index, doctor.with_slots(slots));
                    continue;
                }
                None => offered,
            };
            doctors.add(doctor.with_slots(merged));
        }

        Ok(bookable(doctors, &filter))
    }

    #[instrument(name = "get_slots_for_doctor", skip(self), fields(provider = FAKE_PROVIDER_NAME))]
    fn get_slots_for_doctor_impl(
        &self,
        doctor_id: &str,
        query: &SlotQuery,
    ) -> ProviderResult<AppointmentSlotCollection> {
        self.ensure_authenticated()?;
        if let Some(canned) = self.next_response(|r| match r {
            FakeResponse::Slots(slots) => Ok(slots),
            other => Err(other),
        }) {
            return canned;
        }

        let slots = self.state().slots_of(doctor_id, query.specialty.as_deref());
        let filter = SlotFilter::new()
            .with_until(query.until)
            .with_limit(query.limit);
        Ok(filter.apply(slots))
    }

    #[instrument(name = "schedule", skip(self, patient), fields(provider = FAKE_PROVIDER_NAME))]
    fn schedule_impl(
        &self,
        specialty: &str,
        slot_id: &str,
        patient: &PatientData,
    ) -> ProviderResult<Appointment> {
        self.ensure_authenticated()?;
        let canned = self.next_response(|r| match r {
            FakeResponse::Appointment(appointment) => Ok(appointment),
            other => Err(other),
        });

        let mut state = self.state();
        let key = appointment_key(specialty, patient, slot_id);
        let appointment = match canned {
            Some(result) => result?,
            None => match state.appointment(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let slot = state.find_slot(specialty, slot_id).ok_or_else(|| {
                        tag(ProviderError::invalid_slot(format!(
                            "slot {} is not offered under {}",
                            slot_id, specialty
                        )))
                    })?;
                    state.take_slot(specialty, slot_id);
                    Appointment::new(
                        state.generate_appointment_id(),
                        slot.date,
                        AppointmentStatus::Scheduled,
                    )
                }
            },
        };

        state.put_appointment(key, appointment.clone());
        state.record_created(CreatedAppointment {
            specialty: specialty.to_string(),
            slot_id: slot_id.to_string(),
            patient: patient.clone(),
            appointment: appointment.clone(),
        });
        debug!(
            provider = FAKE_PROVIDER_NAME,
            appointment = %appointment.id,
            "appointment created"
        );
        Ok(appointment)
    }

    #[instrument(name = "get_appointment_link", skip(self), fields(provider = FAKE_PROVIDER_NAME))]
    fn get_appointment_link_impl(&self, appointment_id: &str) -> ProviderResult<String> {
        self.ensure_authenticated()?;
        if let Some(canned) = self.next_response(|r| match r {
            FakeResponse::Link(link) => Ok(link),
            other => Err(other),
        }) {
            return canned;
        }

        match self.state().find_appointment(appointment_id) {
            Some(appointment) => Ok(format!("{}{}", FAKE_LINK_BASE, appointment.id)),
            None => Err(tag(ProviderError::invalid_appointment(format!(
                "appointment {} not found",
                appointment_id
            )))),
        }
    }

    #[instrument(name = "cancel_appointment", skip(self), fields(provider = FAKE_PROVIDER_NAME))]
    fn cancel_appointment_impl(&self, appointment_id: &str) -> ProviderResult<()> {
        self.ensure_authenticated()?;
        if let Some(canned) = self.next_response(|r| Err::<(), _>(r)) {
            return canned;
        }

        match appointment_id {
            FAKE_CANCEL_NOT_FOUND_ID => Err(tag(ProviderError::invalid_appointment(format!(
                "appointment {} not found",
                appointment_id
            )))),
            FAKE_CANCEL_UPSTREAM_FAILURE_ID => Err(tag(ProviderError::upstream(
                500,
                "cancellation failed upstream",
            ))),
            _ => {
                let mut state = self.state();
                let cancelled = state
                    .find_appointment(appointment_id)
                    .map(|a| a.with_status(AppointmentStatus::Cancelled));
                if let Some(cancelled) = cancelled {
                    state.update_appointment(&cancelled);
                    debug!(provider = FAKE_PROVIDER_NAME, appointment = appointment_id, "appointment cancelled");
                }
                Ok(())
            }
        }
    }
}

/// Applies `filter` to every doctor's slots and drops doctors left without any.
fn bookable(doctors: DoctorCollection, filter: &SlotFilter) -> DoctorCollection {
    doctors
        .into_iter()
        .map(|doctor| {
            let slots = filter.apply(doctor.slots());
            doctor.with_slots(slots)
        })
        .filter(|doctor| !doctor.slots().is_empty())
        .collect()
}

/// Attributes an error to the fake unless it already names a provider.
fn tag(error: ProviderError) -> ProviderError {
    if error.provider().is_some() {
        error
    } else {
        error.with_provider(FAKE_PROVIDER_NAME)
    }
}

impl SchedulingProvider for FakeProvider {
    fn name(&self) -> &str {
        FAKE_PROVIDER_NAME
    }

    fn set_patient_data_for_authentication(&self, patient: PatientData) {
        self.session.set_patient(patient);
    }

    fn authenticate(&self) -> BoxFuture<'_, ProviderResult<String>> {
        Box::pin(async move { self.authenticate_impl() })
    }

    fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    fn get_doctors(&self, query: DoctorQuery) -> BoxFuture<'_, ProviderResult<DoctorCollection>> {
        Box::pin(async move { self.get_doctors_impl(&query) })
    }

    fn get_slots_for_doctor<'a>(
        &'a self,
        doctor_id: &'a str,
        query: SlotQuery,
    ) -> BoxFuture<'a, ProviderResult<AppointmentSlotCollection>> {
        Box::pin(async move { self.get_slots_for_doctor_impl(doctor_id, &query) })
    }

    fn get_doctors_with_slots(
        &self,
        query: DoctorsWithSlotsQuery,
    ) -> BoxFuture<'_, ProviderResult<DoctorCollection>> {
        Box::pin(async move { self.get_doctors_with_slots_impl(&query) })
    }

    fn schedule_using_patient_data<'a>(
        &'a self,
        specialty: &'a str,
        slot_id: &'a str,
        patient: &'a PatientData,
    ) -> BoxFuture<'a, ProviderResult<Appointment>> {
        Box::pin(async move { self.schedule_impl(specialty, slot_id, patient) })
    }

    fn get_appointment_link<'a>(
        &'a self,
        appointment_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move { self.get_appointment_link_impl(appointment_id) })
    }

    fn cancel_appointment<'a>(&'a self, appointment_id: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move { self.cancel_appointment_impl(appointment_id) })
    }

    fn set_cache_policy(&self, policy: CachePolicy) {
        self.state().record_cache_policy(policy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use chrono::{NaiveDate, TimeZone, Utc};
    use telemed_core::brasilia_offset;

    fn patient() -> PatientData {
        PatientData::new(
            "Maria Oliveira",
            "123.456.789-00",
            "F",
            NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            "+5511999990000",
            "maria@example.com",
        )
    }

    fn other_patient() -> PatientData {
        PatientData::new(
            "José Santos",
            "987.654.321-00",
            "M",
            NaiveDate::from_ymd_opt(1978, 11, 20).unwrap(),
            "+5521988887777",
            "jose@example.com",
        )
    }

    fn at(hour: u32, min: u32) -> chrono::DateTime<chrono::FixedOffset> {
        brasilia_offset().with_ymd_and_hms(2030, 1, 10, hour, min, 0).unwrap()
    }

    #[tokio::test]
    async fn requires_patient_data() {
        let fake = FakeProvider::new();
        let err = fake.get_doctors(DoctorQuery::new()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.provider(), Some("fake"));

        let err = fake.get_appointment_link("x").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(!fake.is_authenticated());
    }

    #[tokio::test]
    async fn authenticates_lazily() {
        let fake = FakeProvider::new().with_patient_data(patient());
        assert!(!fake.is_authenticated());
        fake.get_doctors(DoctorQuery::new()).await.unwrap();
        assert!(fake.is_authenticated());

        let token = fake.authenticate().await.unwrap();
        assert!(token.starts_with("fake-token-"));
    }

    #[tokio::test]
    async fn get_doctors_uses_exact_matches() {
        let fake = FakeProvider::new().with_patient_data(patient());
        fake.mock_existing_doctor("cardiology", Some(Doctor::new("1", "Dr. Ana", "CRM 1")));
        fake.mock_existing_doctor("cardiology", Some(Doctor::new("2", "Dr. Ana Maria", "CRM 2")));
        fake.mock_existing_doctor("dermatology", Some(Doctor::new("3", "Dr. Ana", "CRM 3")));

        let all = fake.get_doctors(DoctorQuery::new()).await.unwrap();
        assert_eq!(all.len(), 3);

        let cardiology = fake
            .get_doctors(DoctorQuery::new().with_specialty("cardiology"))
            .await
            .unwrap();
        assert_eq!(cardiology.len(), 2);

        let named = fake
            .get_doctors(DoctorQuery::new().with_specialty("cardiology").with_name("Dr. Ana"))
            .await
            .unwrap();
        assert_eq!(named.len(), 1);
        assert_eq!(named.first().unwrap().id, "1");

        let none = fake
            .get_doctors(DoctorQuery::new().with_specialty("Cardiology"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn generated_fixtures_are_deterministic() {
        let a = FakeProvider::new();
        let b = FakeProvider::new();
        let doctor_a = a.mock_existing_doctor("cardiology", None);
        let doctor_b = b.mock_existing_doctor("cardiology", None);
        assert_eq!(doctor_a.id, doctor_b.id);
        assert_eq!(doctor_a.name, doctor_b.name);

        let slot_a = a.mock_existing_doctor_slot(&doctor_a.id, "cardiology", None);
        let slot_b = b.mock_existing_doctor_slot(&doctor_b.id, "cardiology", None);
        assert_eq!(slot_a, slot_b);
    }

    #[tokio::test]
    async fn doctors_with_slots_omits_doctors_without_slots() {
        let fake = FakeProvider::new().with_patient_data(patient());
        let a = fake.mock_existing_doctor("cardiology", None);
        let b = fake.mock_existing_doctor("cardiology", None);
        fake.mock_existing_doctor_slot(&a.id, "cardiology", Some(AppointmentSlot::new("s1", at(9, 0))));
        fake.mock_existing_doctor_slot(&b.id, "cardiology", Some(AppointmentSlot::new("s2", at(15, 0))));

        let doctors = fake
            .get_doctors_with_slots(DoctorsWithSlotsQuery::new().with_specialty("cardiology"))
            .await
            .unwrap();
        assert_eq!(doctors.len(), 2);

        let doctors = fake
            .get_doctors_with_slots(
                DoctorsWithSlotsQuery::new()
                    .with_specialty("cardiology")
                    .with_until(at(12, 0)),
            )
            .await
            .unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors.first().unwrap().id, a.id);
        assert!(doctors.iter().all(|d| !d.slots().is_empty()));
    }

    #[tokio::test]
    async fn doctors_with_slots_filters_by_doctor() {
        let fake = FakeProvider::new().with_patient_data(patient());
        let a = fake.mock_existing_doctor("cardiology", None);
        let b = fake.mock_existing_doctor("cardiology", None);
        fake.mock_existing_doctor_slot(&a.id, "cardiology", None);
        fake.mock_existing_doctor_slot(&b.id, "cardiology", None);

        let doctors = fake
            .get_doctors_with_slots(DoctorsWithSlotsQuery::new().with_doctor_id(b.id.clone()))
            .await
            .unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors.first().unwrap().id, b.id);
    }

    #[tokio::test]
    async fn slots_for_doctor_until_is_inclusive_and_limit_exact() {
        let fake = FakeProvider::new().with_patient_data(patient());
        for (id, hour) in [("s1", 9), ("s2", 10), ("s3", 11), ("s4", 12)] {
            fake.mock_existing_doctor_slot("1", "cardiology", Some(AppointmentSlot::new(id, at(hour, 0))));
        }

        let slots = fake
            .get_slots_for_doctor("1", SlotQuery::new().with_until(at(11, 0)))
            .await
            .unwrap();
        let ids: Vec<_> = slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);

        let slots = fake
            .get_slots_for_doctor("1", SlotQuery::new().with_limit(2))
            .await
            .unwrap();
        assert_eq!(slots.len(), 2);

        let slots = fake
            .get_slots_for_doctor("1", SlotQuery::new().with_limit(80))
            .await
            .unwrap();
        assert_eq!(slots.len(), 4);
    }

    #[tokio::test]
    async fn schedule_books_slot_once() {
        let fake = FakeProvider::new().with_patient_data(patient());
        let doctor = fake.mock_existing_doctor("cardiology", None);
        let slot = fake.mock_existing_doctor_slot(&doctor.id, "cardiology", None);

        let appointment = fake
            .schedule_using_patient_data("cardiology", &slot.id, &patient())
            .await
            .unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
        assert_eq!(appointment.date, slot.date);

        let err = fake
            .schedule_using_patient_data("cardiology", &slot.id, &other_patient())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidSlot);

        fake.assert_appointment_created_matching(|specialty, slot_id, p, _| {
            specialty == "cardiology" && slot_id == slot.id && p == &patient()
        });
        fake.assert_appointment_not_created_matching(|_, _, p, _| p == &other_patient());
    }

    #[tokio::test]
    async fn schedule_unknown_slot() {
        let fake = FakeProvider::new().with_patient_data(patient());
        let doctor = fake.mock_existing_doctor("cardiology", None);
        let slot = fake.mock_existing_doctor_slot(&doctor.id, "cardiology", None);

        let err = fake
            .schedule_using_patient_data("dermatology", &slot.id, &patient())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidSlot);
        fake.assert_appointment_not_created();
    }

    #[tokio::test]
    async fn existing_appointment_is_returned() {
        let fake = FakeProvider::new().with_patient_data(patient());
        let existing = fake.mock_existing_appointment("cardiology", "s-old", &patient());

        let appointment = fake
            .schedule_using_patient_data("cardiology", "s-old", &patient())
            .await
            .unwrap();
        assert_eq!(appointment, existing);
        fake.assert_appointment_created();
    }

    #[tokio::test]
    async fn appointment_links() {
        let fake = FakeProvider::new().with_patient_data(patient());
        let appointment = fake.mock_existing_appointment("cardiology", "s1", &patient());

        let link = fake.get_appointment_link(&appointment.id).await.unwrap();
        assert_eq!(link, format!("https://telemed.fake/appointments/{}", appointment.id));

        let err = fake.get_appointment_link("missing").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidAppointment);
    }

    #[tokio::test]
    async fn canned_responses() {
        let fake = FakeProvider::new().with_patient_data(patient());
        fake.set_next_response(FakeResponse::Link("https://custom/link".into()));
        fake.set_next_response(FakeResponse::Failure(ProviderError::rate_limited("busy")));

        // The queued link is not consumed by an unrelated operation.
        let doctors = fake.get_doctors(DoctorQuery::new()).await.unwrap();
        assert!(doctors.is_empty());
        assert_eq!(
            fake.get_appointment_link("anything").await.unwrap(),
            "https://custom/link"
        );

        let err = fake.get_doctors(DoctorQuery::new()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::RateLimited);
        assert_eq!(err.provider(), Some("fake"));

        fake.get_doctors(DoctorQuery::new()).await.unwrap();
    }

    #[tokio::test]
    async fn canned_doctors_keep_slot_invariant() {
        let fake = FakeProvider::new().with_patient_data(patient());
        let with_slot = Doctor::new("1", "Dr. A", "CRM 1")
            .with_slots([AppointmentSlot::new("s1", at(9, 0))].into_iter().collect());
        let without_slot = Doctor::new("2", "Dr. B", "CRM 2");
        fake.set_next_response(FakeResponse::Doctors(
            [with_slot, without_slot].into_iter().collect(),
        ));

        let doctors = fake
            .get_doctors_with_slots(DoctorsWithSlotsQuery::new())
            .await
            .unwrap();
        assert_eq!(doctors.len(), 1);
    }

    #[tokio::test]
    async fn canned_doctors_honour_until_and_slot_limit() {
        let fake = FakeProvider::new().with_patient_data(patient());
        let early = Doctor::new("1", "Dr. A", "CRM 1").with_slots(
            [
                AppointmentSlot::new("s1", at(9, 0)),
                AppointmentSlot::new("s2", at(9, 30)),
                AppointmentSlot::new("s3", at(10, 0)),
                AppointmentSlot::new("s4", at(11, 0)),
            ]
            .into_iter()
            .collect(),
        );
        let late = Doctor::new("2", "Dr. B", "CRM 2")
            .with_slots([AppointmentSlot::new("s5", at(12, 0))].into_iter().collect());
        fake.set_next_response(FakeResponse::Doctors([early, late].into_iter().collect()));

        let doctors = fake
            .get_doctors_with_slots(
                DoctorsWithSlotsQuery::new()
                    .with_until(at(10, 0))
                    .with_slot_limit(2),
            )
            .await
            .unwrap();
        assert_eq!(doctors.len(), 1);
        let ids: Vec<_> = doctors.find("1").unwrap().slots().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, ["s1", "s2"]);
    }

    #[tokio::test]
    async fn canned_appointment_is_recorded() {
        let fake = FakeProvider::new().with_patient_data(patient());
        let canned = Appointment::new("A-1", at(9, 0), AppointmentStatus::Scheduled);
        fake.set_next_response(FakeResponse::Appointment(canned.clone()));

        let appointment = fake
            .schedule_using_patient_data("cardiology", "any", &patient())
            .await
            .unwrap();
        assert_eq!(appointment, canned);
        fake.assert_appointment_created_matching(|_, _, _, a| a.id == "A-1");
    }

    #[tokio::test]
    async fn cancellation() {
        let fake = FakeProvider::new().with_patient_data(patient());
        let doctor = fake.mock_existing_doctor("cardiology", None);
        let slot = fake.mock_existing_doctor_slot(&doctor.id, "cardiology", None);
        let appointment = fake
            .schedule_using_patient_data("cardiology", &slot.id, &patient())
            .await
            .unwrap();

        fake.cancel_appointment(&appointment.id).await.unwrap();
        fake.assert_appointment_created_matching(|_, _, _, a| {
            a.id == appointment.id && a.status == AppointmentStatus::Cancelled
        });

        fake.cancel_appointment("unknown-id").await.unwrap();

        let err = fake.cancel_appointment(FAKE_CANCEL_NOT_FOUND_ID).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidAppointment);

        let err = fake
            .cancel_appointment(FAKE_CANCEL_UPSTREAM_FAILURE_ID)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Upstream);
    }

    #[tokio::test]
    async fn cache_policy_is_recorded() {
        let fake = FakeProvider::new();
        assert_eq!(fake.cache_policy(), None);

        let until = Utc::now();
        fake.cache_until(until);
        assert_eq!(fake.cache_policy(), Some(CachePolicy::Until(until)));

        fake.without_cache();
        assert_eq!(fake.cache_policy(), Some(CachePolicy::Disabled));
    }

    #[test]
    #[should_panic(expected = "expected an appointment to be created")]
    fn assert_created_panics_when_nothing_was_booked() {
        FakeProvider::new().assert_appointment_created();
    }

    #[tokio::test]
    #[should_panic(expected = "expected no appointment to be created")]
    async fn assert_not_created_panics_after_booking() {
        let fake = FakeProvider::new().with_patient_data(patient());
        let doctor = fake.mock_existing_doctor("cardiology", None);
        let slot = fake.mock_existing_doctor_slot(&doctor.id, "cardiology", None);
        fake.schedule_using_patient_data("cardiology", &slot.id, &patient())
            .await
            .unwrap();
        fake.assert_appointment_not_created();
    }
}
