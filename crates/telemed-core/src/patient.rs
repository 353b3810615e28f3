//! Patient identity data.
//!
//! [`PatientData`] is used both to authenticate against a provider and to
//! book appointments on the patient's behalf.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Personal data of the patient an appointment is booked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientData {
    /// Full name.
    pub name: String,
    /// National document number (e.g. CPF).
    pub document_number: String,
    /// Gender as understood by the upstream provider.
    pub gender: String,
    /// Date of birth.
    pub birth_date: NaiveDate,
    /// Phone number.
    pub phone: String,
    /// Email address.
    pub email: String,
}

impl PatientData {
    /// Creates new patient data.
    pub fn new(
        name: impl Into<String>,
        document_number: impl Into<String>,
        gender: impl Into<String>,
        birth_date: NaiveDate,
        phone: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            document_number: document_number.into(),
            gender: gender.into(),
            birth_date,
            phone: phone.into(),
            email: email.into(),
        }
    }

    /// Returns the birth date formatted as `YYYY-MM-DD`.
    pub fn birth_date_str(&self) -> String {
        self.birth_date.format("%Y-%m-%d").to_string()
    }

    /// Returns the normalized field set, keyed by field name in sorted order.
    ///
    /// Whitespace around every value is trimmed and the email is lowercased.
    /// Everything else keeps its case.
    pub fn normalized_fields(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("birth_date", self.birth_date_str()),
            ("document_number", self.document_number.trim().to_string()),
            ("email", self.email.trim().to_lowercase()),
            ("gender", self.gender.trim().to_string()),
            ("name", self.name.trim().to_string()),
            ("phone", self.phone.trim().to_string()),
        ])
    }

    /// Returns a stable identifier derived from the normalized field set.
    ///
    /// Two values with the same normalized fields always produce the same
    /// fingerprint, a lowercase SHA-256 hex digest.
    pub fn fingerprint(&self) -> String {
        // A BTreeMap of strings always serializes.
        let canonical = serde_json::to_string(&self.normalized_fields()).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> PatientData {
        PatientData::new(
            "Maria Silva",
            "123.456.789-00",
            "F",
            NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            "+5511999990000",
            "maria@example.com",
        )
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(patient().fingerprint(), patient().fingerprint());
        assert_eq!(patient().fingerprint().len(), 64);
    }

    #[test]
    fn fingerprint_ignores_construction_order() {
        let built_in_order = patient();
        let built_out_of_order = PatientData {
            email: "maria@example.com".to_string(),
            phone: "+5511999990000".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            gender: "F".to_string(),
            document_number: "123.456.789-00".to_string(),
            name: "Maria Silva".to_string(),
        };
        assert_eq!(
            built_in_order.fingerprint(),
            built_out_of_order.fingerprint()
        );
    }

    #[test]
    fn fingerprint_normalizes_whitespace_and_email_case() {
        let mut noisy = patient();
        noisy.name = "  Maria Silva ".to_string();
        noisy.email = "Maria@Example.COM".to_string();
        assert_eq!(noisy.fingerprint(), patient().fingerprint());
    }

    #[test]
    fn fingerprint_differs_for_different_patients() {
        let mut other = patient();
        other.document_number = "987.654.321-00".to_string();
        assert_ne!(other.fingerprint(), patient().fingerprint());
    }

    #[test]
    fn name_case_is_significant() {
        let mut shouting = patient();
        shouting.name = "MARIA SILVA".to_string();
        assert_ne!(shouting.fingerprint(), patient().fingerprint());
    }

    #[test]
    fn birth_date_formatting() {
        assert_eq!(patient().birth_date_str(), "1990-05-17");
    }
}
