//! Fleury provider configuration.

use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;
use telemed_core::brasilia_offset;
use url::Url;

use crate::error::{ProviderError, ProviderResult};

/// Configuration for the Fleury provider.
#[derive(Debug, Clone)]
pub struct FleuryConfig {
    /// Base URL of the Fleury API. Always ends with a slash.
    pub base_url: Url,

    /// API key sent on authentication.
    pub api_key: String,

    /// Client identifier sent on authentication.
    pub client_id: String,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,

    /// Offset applied to naive date-times from the API.
    pub utc_offset: FixedOffset,

    /// Consultation `type` sent on slot searches.
    pub consultation_type: String,

    /// `appointment_type` sent on slot searches.
    pub appointment_type: String,

    /// Base for appointment links when the API omits `attendance_link`.
    ///
    /// The appointment id is appended as the last path segment.
    pub link_base: Option<Url>,
}

impl FleuryConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Most slots the API returns per professional.
    pub const MAX_SLOTS_PER_PROFESSIONAL: usize = 50;

    /// Default consultation type.
    pub const DEFAULT_CONSULTATION_TYPE: &'static str = "TELEMEDICINE";

    /// Default appointment type.
    pub const DEFAULT_APPOINTMENT_TYPE: &'static str = "FIRST_APPOINTMENT";

    /// Creates a new configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: with_trailing_slash(Url::parse(base_url.as_ref())?),
            api_key: api_key.into(),
            client_id: client_id.into(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("telemed/{}", env!("CARGO_PKG_VERSION")),
            utc_offset: brasilia_offset(),
            consultation_type: Self::DEFAULT_CONSULTATION_TYPE.to_string(),
            appointment_type: Self::DEFAULT_APPOINTMENT_TYPE.to_string(),
            link_base: None,
        })
    }

    /// Builds a configuration from deserialized settings.
    ///
    /// Secret fields are resolved first (see [`resolve_secret`]).
    pub fn from_settings(settings: &FleurySettings) -> ProviderResult<Self> {
        let api_key = resolve_secret(&settings.api_key).map_err(ProviderError::configuration)?;
        let client_id =
            resolve_secret(&settings.client_id).map_err(ProviderError::configuration)?;

        let mut config = Self::new(&settings.base_url, api_key, client_id).map_err(|e| {
            ProviderError::configuration(format!("invalid base_url {:?}: {}", settings.base_url, e))
        })?;

        if let Some(secs) = settings.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(user_agent) = &settings.user_agent {
            config = config.with_user_agent(user_agent);
        }
        if let Some(hours) = settings.utc_offset_hours {
            let offset = hours.checked_mul(3600).and_then(FixedOffset::east_opt).ok_or_else(|| {
                ProviderError::configuration(format!("utc_offset_hours out of range: {}", hours))
            })?;
            config = config.with_utc_offset(offset);
        }
        if let Some(kind) = &settings.consultation_type {
            config = config.with_consultation_type(kind);
        }
        if let Some(kind) = &settings.appointment_type {
            config = config.with_appointment_type(kind);
        }
        if let Some(link_base) = &settings.link_base {
            let url = Url::parse(link_base).map_err(|e| {
                ProviderError::configuration(format!("invalid link_base {:?}: {}", link_base, e))
            })?;
            config = config.with_link_base(url);
        }

        config.validate().map_err(ProviderError::configuration)?;
        Ok(config)
    }

    /// Parses a TOML document holding [`FleurySettings`].
    pub fn from_toml_str(content: &str) -> ProviderResult<Self> {
        let settings: FleurySettings = toml::from_str(content).map_err(|e| {
            ProviderError::configuration(format!("failed to parse Fleury settings: {}", e))
                .with_source(e)
        })?;
        Self::from_settings(&settings)
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the offset used for naive date-times.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Sets the consultation type.
    pub fn with_consultation_type(mut self, kind: impl Into<String>) -> Self {
        self.consultation_type = kind.into();
        self
    }

    /// Sets the appointment type.
    pub fn with_appointment_type(mut self, kind: impl Into<String>) -> Self {
        self.appointment_type = kind.into();
        self
    }

    /// Sets the fallback link base.
    pub fn with_link_base(mut self, link_base: Url) -> Self {
        self.link_base = Some(with_trailing_slash(link_base));
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err("base_url must use http or https");
        }
        if self.api_key.trim().is_empty() {
            return Err("api_key is required");
        }
        if self.client_id.trim().is_empty() {
            return Err("client_id is required");
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero");
        }
        Ok(())
    }
}

/// Fleury settings as written in a config file.
///
/// ```toml
/// base_url = "https://api.fleury.example/telemedicine/"
/// api_key = "env::FLEURY_API_KEY"
/// client_id = "clinic-42"
/// timeout_secs = 15
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FleurySettings {
    /// API base URL.
    pub base_url: String,
    /// API key (supports the `env::` prefix).
    pub api_key: String,
    /// Client identifier (supports the `env::` prefix).
    pub client_id: String,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// User agent override.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Whole-hour offset for naive date-times, e.g. `-3`.
    #[serde(default)]
    pub utc_offset_hours: Option<i32>,
    /// Consultation type override.
    #[serde(default)]
    pub consultation_type: Option<String>,
    /// Appointment type override.
    #[serde(default)]
    pub appointment_type: Option<String>,
    /// Fallback link base.
    #[serde(default)]
    pub link_base: Option<String>,
}

/// Resolves a value that may reference an environment variable.
///
/// - `env::VAR` reads `$VAR`
/// - anything else is returned unchanged
pub fn resolve_secret(value: &str) -> Result<String, String> {
    match value.strip_prefix("env::") {
        Some(var) => std::env::var(var)
            .map_err(|_| format!("environment variable `{}` is not set", var)),
        None => Ok(value.to_string()),
    }
}

/// `Url::join` drops the last segment of a base without a trailing slash.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
