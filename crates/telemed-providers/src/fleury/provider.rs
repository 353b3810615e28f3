//! Fleury provider implementation.
//!
//! This module implements the [`SchedulingProvider`] trait for the Fleury
//! telemedicine API.

use std::sync::Arc;

use chrono::Utc;
use telemed_core::{
    Appointment, AppointmentSlotCollection, AppointmentStatus, DoctorCollection, PatientData,
    format_api_date, format_api_datetime, parse_provider_datetime,
};
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{SlotFilter, aggregate_doctors_with_slots};
use crate::cache::{CacheArgs, CacheBackend, CachePolicy, ResponseCache, fingerprint};
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{
    BoxFuture, DoctorQuery, DoctorsWithSlotsQuery, SchedulingProvider, SlotQuery,
};
use crate::session::AuthSession;
use crate::translate::ErrorTranslator;

use super::client::{ApiPatient, AppointmentRequest, AuthRequest, FleuryClient, SlotSearchRequest};
use super::config::FleuryConfig;

/// Name reported by [`FleuryProvider`].
pub const PROVIDER_NAME: &str = "fleury";

/// Fleury telemedicine provider.
///
/// Authenticates lazily with the patient data set on the provider, caches
/// doctor listings and slot searches, and books appointments.
#[derive(Debug)]
pub struct FleuryProvider {
    config: FleuryConfig,
    client: FleuryClient,
    session: AuthSession,
    cache: ResponseCache,
}

impl FleuryProvider {
    /// Creates a new provider with the given configuration.
    ///
    /// No network call is made until the first operation.
    pub fn new(config: FleuryConfig) -> ProviderResult<Self> {
        config.validate().map_err(|e| {
            ProviderError::configuration(e).with_provider(PROVIDER_NAME)
        })?;
        let client = FleuryClient::new(&config)?;

        Ok(Self {
            config,
            client,
            session: AuthSession::new(),
            cache: ResponseCache::default(),
        })
    }

    /// Sets the patient data used for authentication.
    pub fn with_patient_data(self, patient: PatientData) -> Self {
        self.session.set_patient(patient);
        self
    }

    /// Stores cached responses in `backend`, keeping the current policy.
    pub fn with_cache(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        let policy = self.cache.policy();
        self.cache = ResponseCache::new(backend);
        self.cache.set_policy(policy);
        self
    }

    /// Replaces the translator applied to failed responses.
    pub fn with_error_translator(mut self, translator: Arc<dyn ErrorTranslator>) -> Self {
        self.client = self.client.with_translator(translator);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FleuryConfig {
        &self.config
    }

    /// Returns the held token, authenticating first if needed.
    async fn ensure_authenticated(&self) -> ProviderResult<String> {
        match self.session.token() {
            Some(token) => Ok(token.access_token),
            None => self.authenticate_impl().await,
        }
    }

    #[instrument(name = "authenticate", skip_all, fields(provider = PROVIDER_NAME))]
    async fn authenticate_impl(&self) -> ProviderResult<String> {
        let patient = self
            .session
            .patient()
            .map_err(|e| e.with_provider(PROVIDER_NAME))?;

        info!(provider = PROVIDER_NAME, "authenticating");
        let request = AuthRequest {
            api_key: self.config.api_key.clone(),
            client: self.config.client_id.clone(),
            name: patient.name.clone(),
            document_number: patient.document_number.clone(),
            gender: patient.gender.clone(),
            birth: patient.birth_date_str(),
            phone: patient.phone.clone(),
            email: patient.email.clone(),
        };

        let token = self
            .client
            .authenticate(&request)
            .await
            .map_err(|e| e.with_provider(PROVIDER_NAME))?;
        self.session.store_token(&token);

        info!(provider = PROVIDER_NAME, "authentication successful");
        Ok(token)
    }

    #[instrument(name = "get_doctors", skip(self), fields(provider = PROVIDER_NAME))]
    async fn get_doctors_impl(&self, query: DoctorQuery) -> ProviderResult<DoctorCollection> {
        let token = self.ensure_authenticated().await?;

        let key = fingerprint(
            "fleury.doctors",
            &CacheArgs::new()
                .with_opt("specialty", query.specialty.clone())
                .with_opt("name", query.name.clone()),
        );

        let client = &self.client;
        self.cache
            .fetch_or_compute(&key, move || async move {
                let professionals = client
                    .list_professionals(&token, query.specialty.as_deref(), query.name.as_deref())
                    .await?;
                Ok(professionals.iter().map(|p| p.to_doctor()).collect())
            })
            .await
            .map_err(|e| e.with_provider(PROVIDER_NAME))
    }

    #[instrument(name = "get_doctors_with_slots", skip(self), fields(provider = PROVIDER_NAME))]
    async fn get_doctors_with_slots_impl(
        &self,
        query: DoctorsWithSlotsQuery,
    ) -> ProviderResult<DoctorCollection> {
        let token = self.ensure_authenticated().await?;

        let limit = query
            .slot_limit
            .map_or(FleuryConfig::MAX_SLOTS_PER_PROFESSIONAL, |n| {
                n.min(FleuryConfig::MAX_SLOTS_PER_PROFESSIONAL)
            });
        let date_init = format_api_date(&Utc::now().with_timezone(&self.config.utc_offset));
        let date_end = query
            .until
            .map(|until| format_api_datetime(&until.with_timezone(&self.config.utc_offset)));

        let key = fingerprint(
            "fleury.doctors_with_slots",
            &CacheArgs::new()
                .with("date_init", date_init.clone())
                .with("limit", limit)
                .with_opt("specialty", query.specialty.clone())
                .with_opt("doctor_id", query.doctor_id.clone())
                .with_opt("date_end", date_end.clone()),
        );

        let request = SlotSearchRequest {
            date_init,
            consultation_type: self.config.consultation_type.clone(),
            appointment_type: self.config.appointment_type.clone(),
            limit_for_professional: limit,
            specialty: query.specialty.clone(),
            professional_id: query.doctor_id.clone(),
            date_end,
        };
        let filter = SlotFilter::new()
            .with_until(query.until)
            .with_limit(Some(limit));
        let offset = self.config.utc_offset;
        let client = &self.client;

        let doctors = self
            .cache
            .fetch_or_compute(&key, move || async move {
                let records = client.professionals_with_slots(&token, &request).await?;
                aggregate_doctors_with_slots(records, &filter, |raw| {
                    parse_provider_datetime(raw, offset)
                })
            })
            .await
            .map_err(|e| e.with_provider(PROVIDER_NAME))?;

        debug!(
            provider = PROVIDER_NAME,
            count = doctors.len(),
            "doctors with slots"
        );
        Ok(doctors)
    }

    #[instrument(name = "get_slots_for_doctor", skip(self), fields(provider = PROVIDER_NAME))]
    async fn get_slots_for_doctor_impl(
        &self,
        doctor_id: &str,
        query: SlotQuery,
    ) -> ProviderResult<AppointmentSlotCollection> {
        let doctors = self
            .get_doctors_with_slots_impl(DoctorsWithSlotsQuery::for_doctor(doctor_id, query))
            .await?;
        Ok(doctors
            .find(doctor_id)
            .map(|doctor| doctor.slots())
            .unwrap_or_default())
    }

    #[instrument(name = "schedule", skip(self, patient), fields(provider = PROVIDER_NAME))]
    async fn schedule_impl(
        &self,
        specialty: &str,
        slot_id: &str,
        patient: &PatientData,
    ) -> ProviderResult<Appointment> {
        if slot_id.trim().is_empty() {
            return Err(ProviderError::invalid_slot("slot id is empty").with_provider(PROVIDER_NAME));
        }
        let token = self.ensure_authenticated().await?;

        info!(provider = PROVIDER_NAME, specialty, slot_id, "scheduling appointment");
        let request = AppointmentRequest {
            slot_id: slot_id.to_string(),
            patient: ApiPatient {
                name: patient.name.clone(),
                national_id: patient.document_number.clone(),
                gender: patient.gender.clone(),
                dob: patient.birth_date_str(),
                cellphone: patient.phone.clone(),
                email: patient.email.clone(),
            },
        };

        let created = self
            .client
            .create_appointment(&token, &request)
            .await
            .map_err(|e| e.with_provider(PROVIDER_NAME))?;

        let date = parse_provider_datetime(&created.date, self.config.utc_offset).ok_or_else(|| {
            ProviderError::invalid_response(format!(
                "appointment {} has an unparsable date: {:?}",
                created.id, created.date
            ))
            .with_provider(PROVIDER_NAME)
        })?;
        let status = match created.status.as_deref() {
            None => AppointmentStatus::Scheduled,
            Some(raw) => AppointmentStatus::from_provider(raw).ok_or_else(|| {
                ProviderError::invalid_response(format!(
                    "appointment {} has an unknown status: {:?}",
                    created.id, raw
                ))
                .with_provider(PROVIDER_NAME)
            })?,
        };

        info!(provider = PROVIDER_NAME, appointment = %created.id, "appointment created");
        Ok(Appointment::new(created.id, date, status))
    }

    #[instrument(name = "get_appointment_link", skip(self), fields(provider = PROVIDER_NAME))]
    async fn get_appointment_link_impl(&self, appointment_id: &str) -> ProviderResult<String> {
        if appointment_id.trim().is_empty() {
            return Err(ProviderError::invalid_appointment("appointment id is empty")
                .with_provider(PROVIDER_NAME));
        }
        let token = self.ensure_authenticated().await?;

        let link = self
            .client
            .appointment_link(&token, appointment_id)
            .await
            .map_err(|e| e.with_provider(PROVIDER_NAME))?;
        if let Some(link) = link {
            return Ok(link);
        }

        warn!(
            provider = PROVIDER_NAME,
            appointment = appointment_id,
            "attendance_link missing, using link base"
        );
        self.config
            .link_base
            .as_ref()
            .and_then(|base| base.join(&urlencoding::encode(appointment_id)).ok())
            .map(|url| url.to_string())
            .ok_or_else(|| {
                ProviderError::invalid_response(format!(
                    "appointment {} has no attendance_link",
                    appointment_id
                ))
                .with_provider(PROVIDER_NAME)
            })
    }
}

impl SchedulingProvider for FleuryProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn set_patient_data_for_authentication(&self, patient: PatientData) {
        self.session.set_patient(patient);
    }

    fn authenticate(&self) -> BoxFuture<'_, ProviderResult<String>> {
        Box::pin(async move { self.authenticate_impl().await })
    }

    fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    fn get_doctors(&self, query: DoctorQuery) -> BoxFuture<'_, ProviderResult<DoctorCollection>> {
        Box::pin(async move { self.get_doctors_impl(query).await })
    }

    fn get_slots_for_doctor<'a>(
        &'a self,
        doctor_id: &'a str,
        query: SlotQuery,
    ) -> BoxFuture<'a, ProviderResult<AppointmentSlotCollection>> {
        Box::pin(async move { self.get_slots_for_doctor_impl(doctor_id, query).await })
    }

    fn get_doctors_with_slots(
        &self,
        query: DoctorsWithSlotsQuery,
    ) -> BoxFuture<'_, ProviderResult<DoctorCollection>> {
        Box::pin(async move { self.get_doctors_with_slots_impl(query).await })
    }

    fn schedule_using_patient_data<'a>(
        &'a self,
        specialty: &'a str,
        slot_id: &'a str,
        patient: &'a PatientData,
    ) -> BoxFuture<'a, ProviderResult<Appointment>> {
        Box::pin(async move { self.schedule_impl(specialty, slot_id, patient).await })
    }

    fn get_appointment_link<'a>(
        &'a self,
        appointment_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move { self.get_appointment_link_impl(appointment_id).await })
    }

    fn set_cache_policy(&self, policy: CachePolicy) {
        debug!(provider = PROVIDER_NAME, ?policy, "cache policy changed");
        self.cache.set_policy(policy);
    }
}
