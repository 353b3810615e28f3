//! Fleury API client.
//!
//! This module provides a low-level HTTP client for the Fleury telemedicine
//! API, handling request building, bearer authentication, and response
//! parsing. Failed responses go through the configured [`ErrorTranslator`].

use std::sync::Arc;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::raw::{RawProfessional, RawProfessionalSlots, RawSlot};
use crate::translate::{DefaultErrorTranslator, ErrorTranslator, UpstreamResponse};

use super::config::FleuryConfig;

/// Fleury API client.
#[derive(Clone)]
pub struct FleuryClient {
    http_client: reqwest::Client,
    base_url: Url,
    translator: Arc<dyn ErrorTranslator>,
}

impl std::fmt::Debug for FleuryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleuryClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl FleuryClient {
    /// Creates a new client for the configured API.
    pub fn new(config: &FleuryConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
            translator: Arc::new(DefaultErrorTranslator),
        })
    }

    /// Replaces the error translator.
    pub fn with_translator(mut self, translator: Arc<dyn ErrorTranslator>) -> Self {
        self.translator = translator;
        self
    }

    /// Obtains an access token. `POST /auth`.
    pub async fn authenticate(&self, request: &AuthRequest) -> ProviderResult<String> {
        let url = self.endpoint("auth")?;
        let request = self.http_client.post(url).json(request);
        let response: AuthResponse = self.execute("authenticate", request, |_| None).await?;

        if response.access_token.trim().is_empty() {
            return Err(ProviderError::invalid_response(
                "authentication response has an empty access_token",
            ));
        }
        Ok(response.access_token)
    }

    /// Lists professionals. `GET /professionals`.
    pub async fn list_professionals(
        &self,
        token: &str,
        specialty: Option<&str>,
        name: Option<&str>,
    ) -> ProviderResult<Vec<RawProfessional>> {
        let url = self.endpoint("professionals")?;
        let mut request = self.http_client.get(url).bearer_auth(token);
        if let Some(specialty) = specialty {
            request = request.query(&[("specialty", specialty)]);
        }
        if let Some(name) = name {
            request = request.query(&[("name", name)]);
        }

        let envelope: ListEnvelope<ApiProfessional> =
            self.execute("list_professionals", request, |_| None).await?;
        let professionals: Vec<RawProfessional> = envelope
            .into_items()
            .into_iter()
            .map(ApiProfessional::into_raw)
            .collect();

        debug!(count = professionals.len(), "fetched professionals");
        Ok(professionals)
    }

    /// Searches professionals with their slots. `POST /professionals/slots`.
    pub async fn professionals_with_slots(
        &self,
        token: &str,
        request: &SlotSearchRequest,
    ) -> ProviderResult<Vec<RawProfessionalSlots>> {
        let url = self.endpoint("professionals/slots")?;
        let request = self.http_client.post(url).bearer_auth(token).json(request);

        let envelope: ListEnvelope<ApiProfessionalSlots> =
            self.execute("professionals_with_slots", request, |_| None).await?;
        let records: Vec<RawProfessionalSlots> = envelope
            .into_items()
            .into_iter()
            .map(ApiProfessionalSlots::into_raw)
            .collect();

        debug!(count = records.len(), "fetched professionals with slots");
        Ok(records)
    }

    /// Books a slot. `POST /appointments`.
    ///
    /// 404, 409 and 422 mean the slot is unknown or no longer available.
    pub async fn create_appointment(
        &self,
        token: &str,
        request: &AppointmentRequest,
    ) -> ProviderResult<ApiAppointment> {
        let url = self.endpoint("appointments")?;
        let slot_id = request.slot_id.clone();
        let http_request = self.http_client.post(url).bearer_auth(token).json(request);

        self.execute("schedule", http_request, |response| {
            matches!(response.status, 404 | 409 | 422).then(|| {
                ProviderError::invalid_slot(format!("slot {} is not available", slot_id))
                    .with_status(response.status)
            })
        })
        .await
    }

    /// Fetches an appointment's attendance link. `GET /appointments/{id}`.
    pub async fn appointment_link(
        &self,
        token: &str,
        appointment_id: &str,
    ) -> ProviderResult<Option<String>> {
        let url = self.endpoint(&format!(
            "appointments/{}",
            urlencoding::encode(appointment_id)
        ))?;
        let request = self.http_client.get(url).bearer_auth(token);

        let response: ApiAppointmentLink = self
            .execute("appointment_link", request, |response| {
                (response.status == 404).then(|| {
                    ProviderError::invalid_appointment(format!(
                        "appointment {} not found",
                        appointment_id
                    ))
                    .with_status(404)
                })
            })
            .await?;

        Ok(response
            .attendance_link
            .map(|link| link.trim().to_string())
            .filter(|link| !link.is_empty()))
    }

    fn endpoint(&self, path: &str) -> ProviderResult<Url> {
        self.base_url.join(path).map_err(|e| {
            ProviderError::configuration(format!("invalid endpoint {:?}: {}", path, e))
        })
    }

    /// Sends `request` and decodes the JSON body.
    ///
    /// `on_failure` sees non-success responses before the translator and may
    /// claim them with an operation-specific error.
    async fn execute<T, F>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
        on_failure: F,
    ) -> ProviderResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce(&UpstreamResponse) -> Option<ProviderError>,
    {
        trace!(operation, "sending Fleury request");
        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("{} request timeout", operation)
            } else if e.is_connect() {
                format!("{} connection failed: {}", operation, e)
            } else {
                format!("{} request failed: {}", operation, e)
            };
            ProviderError::network(message).with_source(e)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read {} response: {}", operation, e))
                .with_source(e)
        })?;
        debug!(operation, status, "Fleury response");

        let upstream = UpstreamResponse::new(status, body);
        if !upstream.is_success() {
            if let Some(error) = on_failure(&upstream) {
                return Err(error);
            }
            if let Some(error) = self.translator.translate(operation, &upstream) {
                return Err(error);
            }
            debug!(operation, status, "translator accepted failed response");
        }

        serde_json::from_str(&upstream.body).map_err(|e| {
            ProviderError::invalid_response(format!(
                "failed to parse {} response: {}",
                operation, e
            ))
            .with_status(status)
            .with_source(e)
        })
    }
}

/// Body of `POST /auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub api_key: String,
    pub client: String,
    pub name: String,
    pub document_number: String,
    pub gender: String,
    /// `YYYY-MM-DD`.
    pub birth: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
}

/// Body of `POST /professionals/slots`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSearchRequest {
    /// First day searched, `YYYY-MM-DD`.
    pub date_init: String,
    #[serde(rename = "type")]
    pub consultation_type: String,
    pub appointment_type: String,
    /// At most [`FleuryConfig::MAX_SLOTS_PER_PROFESSIONAL`].
    #[serde(rename = "limitForProfessional")]
    pub limit_for_professional: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub professional_id: Option<String>,
    /// Last date-time searched, `YYYY-MM-DD HH:MM:SS`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_end: Option<String>,
}

/// Body of `POST /appointments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentRequest {
    pub slot_id: String,
    pub patient: ApiPatient,
}

/// Patient as sent on scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiPatient {
    pub name: String,
    pub national_id: String,
    pub gender: String,
    /// `YYYY-MM-DD`.
    pub dob: String,
    pub cellphone: String,
    pub email: String,
}

/// An appointment as returned by `POST /appointments`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiAppointment {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub date: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiAppointmentLink {
    #[serde(default)]
    attendance_link: Option<String>,
}

/// List responses come either bare or wrapped in `data`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEnvelope<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListEnvelope<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { data: items } => items,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiProfessional {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    name: String,
    #[serde(default, alias = "crm", alias = "council")]
    council_number: Option<String>,
    #[serde(default, alias = "photo_url")]
    photo: Option<String>,
}

impl ApiProfessional {
    fn into_raw(self) -> RawProfessional {
        RawProfessional {
            id: self.id,
            name: self.name,
            council_number: self.council_number,
            photo: self.photo,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiSlot {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    date: String,
}

#[derive(Debug, Deserialize)]
struct ApiProfessionalSlots {
    professional: ApiProfessional,
    #[serde(default)]
    slots: Vec<ApiSlot>,
}

impl ApiProfessionalSlots {
    fn into_raw(self) -> RawProfessionalSlots {
        RawProfessionalSlots::new(
            self.professional.into_raw(),
            self.slots
                .into_iter()
                .map(|slot| RawSlot::new(slot.id, slot.date))
                .collect(),
        )
    }
}

/// Accepts ids sent as JSON strings or numbers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string or number id, got {}",
            other
        ))),
    }
}
