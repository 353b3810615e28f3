//! Every provider operation runs inside a span named after it, tagged with
//! the provider that served it.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, TimeZone};
use serde_json::json;
use telemed_core::{AppointmentSlot, Doctor, PatientData, brasilia_offset};
use telemed_providers::fake::FakeProvider;
use telemed_providers::fleury::{FleuryConfig, FleuryProvider};
use telemed_providers::{DoctorsWithSlotsQuery, SchedulingProvider};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records `provider/span` for every span opened.
#[derive(Clone, Default)]
struct SpanLog(Arc<Mutex<Vec<String>>>);

impl SpanLog {
    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct ProviderField(String);

impl Visit for ProviderField {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "provider" {
            self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

impl<S: Subscriber> Layer<S> for SpanLog {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        let mut provider = ProviderField::default();
        attrs.record(&mut provider);
        self.0
            .lock()
            .unwrap()
            .push(format!("{}/{}", provider.0, attrs.metadata().name()));
    }
}

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

async fn book_first_slot(provider: &dyn SchedulingProvider) {
    let doctors = provider
        .get_doctors_with_slots(DoctorsWithSlotsQuery::new().with_specialty("cardiology"))
        .await
        .unwrap();
    let slot = doctors.first().unwrap().slots().first().cloned().unwrap();
    let appointment = provider
        .schedule_using_patient_data("cardiology", &slot.id, &patient())
        .await
        .unwrap();
    provider.get_appointment_link(&appointment.id).await.unwrap();
}

fn assert_operation_spans(log: &SpanLog, provider: &str) {
    let entries = log.entries();
    for operation in [
        "authenticate",
        "get_doctors_with_slots",
        "schedule",
        "get_appointment_link",
    ] {
        let expected = format!("{}/{}", provider, operation);
        assert!(entries.contains(&expected), "missing {} in {:?}", expected, entries);
    }
    let authenticate = format!("{}/authenticate", provider);
    assert_eq!(
        entries.iter().filter(|e| **e == authenticate).count(),
        1,
        "authentication should happen once: {:?}",
        entries
    );
}

#[tokio::test]
async fn provider_operations_open_spans() {
    let log = SpanLog::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(log.clone()));

    let fake = FakeProvider::new().with_patient_data(patient());
    fake.mock_existing_doctor("cardiology", Some(Doctor::new("1", "Dr. A", "CRM 1")));
    fake.mock_existing_doctor_slot(
        "1",
        "cardiology",
        Some(AppointmentSlot::new(
            "S",
            brasilia_offset().with_ymd_and_hms(2030, 1, 10, 9, 0, 0).unwrap(),
        )),
    );
    book_first_slot(&fake).await;
    assert_operation_spans(&log, "fake");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/professionals/slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"professional": {"id": 1, "name": "Dr. A"}, "slots": [{"id": "S", "date": "2030-01-10 09:00:00"}]}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 77, "date": "2030-01-10T09:00:00-03:00", "status": "scheduled"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appointments/77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "attendance_link": "https://meet.fleury.example/77"
        })))
        .mount(&server)
        .await;

    let config = FleuryConfig::new(server.uri(), "key", "client").unwrap();
    let fleury = FleuryProvider::new(config).unwrap().with_patient_data(patient());
    book_first_slot(&fleury).await;
    assert_operation_spans(&log, "fleury");
}
