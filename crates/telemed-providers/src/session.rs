//! Per-provider authentication state.
//!
//! A session moves from unauthenticated to authenticated exactly once per
//! provider instance; there is no logout. Adapters call
//! [`AuthSession::token`] before every upstream call and authenticate only
//! when it returns `None`.
//!
//! Two callers racing through their first operation may both authenticate.
//! The upstream token is reusable, so the last stored token wins.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use telemed_core::PatientData;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// An access token and when it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// The bearer token for API requests.
    pub access_token: String,
    /// When the token was obtained.
    pub obtained_at: DateTime<Utc>,
}

impl TokenInfo {
    /// Creates token info stamped with the current time.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            obtained_at: Utc::now(),
        }
    }
}

/// Patient data and token held by one provider instance.
#[derive(Debug, Default)]
pub struct AuthSession {
    patient: RwLock<Option<PatientData>>,
    token: RwLock<Option<TokenInfo>>,
}

impl AuthSession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the patient data used by the next authentication.
    pub fn set_patient(&self, patient: PatientData) {
        debug!("patient data set for authentication");
        *self
            .patient
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(patient);
    }

    /// Returns the patient data, or `AuthenticationFailed` if none was set.
    pub fn patient(&self) -> ProviderResult<PatientData> {
        self.patient
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| {
                ProviderError::authentication(
                    "patient data must be set before authenticating",
                )
            })
    }

    /// Returns the held token, if any.
    pub fn token(&self) -> Option<TokenInfo> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Stores a freshly obtained token, replacing any previous one.
    pub fn store_token(&self, access_token: impl Into<String>) -> TokenInfo {
        let info = TokenInfo::new(access_token);
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(info.clone());
        info
    }

    /// Returns true if a token is held.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}
