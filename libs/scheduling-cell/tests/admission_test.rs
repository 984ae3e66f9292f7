// Admission controller integration tests. A wiremock server stands in for
// the tenant's PostgREST storage; every gate of the admission sequence is
// driven end-to-end through the service.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::models::{
    parse_clock, AdmissionDecision, BookingRequest, RejectionReason, SchedulingError,
};
use scheduling_cell::services::admission::AdmissionService;
use shared_config::AppConfig;
use shared_database::PostgrestClient;

struct TestTenant {
    server: MockServer,
    specialist_id: Uuid,
    client_id: Uuid,
    plan_id: Uuid,
}

impl TestTenant {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            specialist_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
        }
    }

    fn admission(&self) -> AdmissionService {
        let db = Arc::new(PostgrestClient::new(self.server.uri(), "test-key", 5));
        AdmissionService::new(db, &test_config())
    }

    fn request_for(&self, date: NaiveDate, time: &str) -> BookingRequest {
        BookingRequest {
            client_id: self.client_id,
            specialist_id: self.specialist_id,
            date,
            start_time: parse_clock(time).unwrap(),
            override_plan_limit: false,
        }
    }

    async fn mount_specialist(&self, accepts_plan: bool) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/specialists"))
            .and(query_param("id", format!("eq.{}", self.specialist_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": self.specialist_id,
                "accepts_plan": accepts_plan,
                "consultation_minutes": 30,
                "working_hours": null,
            }])))
            .mount(&self.server)
            .await;
    }

    async fn mount_client(&self, has_plan: bool) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/clients"))
            .and(query_param("id", format!("eq.{}", self.client_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": self.client_id,
                "has_plan": has_plan,
                "plan_id": if has_plan { json!(self.plan_id) } else { json!(null) },
            }])))
            .mount(&self.server)
            .await;
    }

    async fn mount_plan_accepted(&self, accepted: bool) {
        let body = if accepted {
            json!([{ "plan_id": self.plan_id }])
        } else {
            json!([])
        };
        Mock::given(method("GET"))
            .and(path("/rest/v1/specialist_plans"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    async fn mount_policy(&self, max_daily: i32, min_lead_days: i64) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/plan_policies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "max_daily": max_daily,
                "min_lead_days": min_lead_days,
            }])))
            .mount(&self.server)
            .await;
    }

    /// Plan-count lookups carry a plan_id filter; mount before the generic
    /// specialist-day mock so it wins for those requests.
    async fn mount_plan_count(&self, count: usize) {
        let rows: Vec<_> = (0..count).map(|_| json!({ "id": Uuid::new_v4() })).collect();
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("plan_id", format!("eq.{}", self.plan_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&self.server)
            .await;
    }

    async fn mount_specialist_day(&self, rows: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("specialist_id", format!("eq.{}", self.specialist_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&self.server)
            .await;
    }

    async fn mount_client_day(&self, rows: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("client_id", format!("eq.{}", self.client_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&self.server)
            .await;
    }

    fn persisted_row(&self, date: NaiveDate, time: &str, plan: bool, warning: Option<&str>) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "client_id": self.client_id,
            "specialist_id": self.specialist_id,
            "date": date,
            "start_time": time,
            "duration_minutes": 30,
            "plan_id": if plan { json!(self.plan_id) } else { json!(null) },
            "warning": warning,
            "created_at": "2026-01-01T12:00:00Z",
        })
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        tenant_directory_url: String::new(),
        tenant_directory_api_key: String::new(),
        jwt_secret: "test-secret".to_string(),
        listen_port: 0,
        tenant_cache_ttl_secs: 60,
        storage_timeout_secs: 5,
        suggestion_horizon_days: 14,
        suggestion_count: 3,
        revalidate_on_update: true,
    }
}

fn upcoming_date() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(7)
}

const TOKEN: &str = "test-token";

// ==============================================================================
// HAPPY PATH AND BASIC GATES
// ==============================================================================

#[tokio::test]
async fn self_pay_booking_inside_window_is_accepted() {
    // Scenario: default window 08:00-12:00, duration 30, no existing
    // bookings, request for 09:00.
    let tenant = TestTenant::new().await;
    let date = upcoming_date();

    tenant.mount_specialist(true).await;
    tenant.mount_client(false).await;
    tenant.mount_client_day(json!([])).await;
    tenant.mount_specialist_day(json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "specialist_id": tenant.specialist_id,
            "client_id": tenant.client_id,
            "start_time": "09:00:00",
            "duration_minutes": 30,
            "plan_id": null,
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([tenant.persisted_row(date, "09:00:00", false, None)])),
        )
        .expect(1)
        .mount(&tenant.server)
        .await;

    let decision = tenant
        .admission()
        .admit(&tenant.request_for(date, "09:00"), TOKEN)
        .await
        .unwrap();

    let appointment = match decision {
        AdmissionDecision::Accepted(apt) => apt,
        AdmissionDecision::Rejected(r) => panic!("expected acceptance, got {:?}", r.reason),
    };
    assert_eq!(appointment.start_time, parse_clock("09:00").unwrap());
    assert_eq!(appointment.duration_minutes, 30);
    assert_eq!(appointment.plan_id, None);
}

#[tokio::test]
async fn past_date_is_rejected_before_any_storage_read() {
    let tenant = TestTenant::new().await;
    let yesterday = Utc::now().date_naive() - Duration::days(1);

    let decision = tenant
        .admission()
        .admit(&tenant.request_for(yesterday, "09:00"), TOKEN)
        .await
        .unwrap();

    assert_matches!(
        decision,
        AdmissionDecision::Rejected(r) if r.reason == RejectionReason::PastDate
    );
    // No mocks mounted: any storage call would have failed the test.
}

#[tokio::test]
async fn slot_outside_every_window_is_rejected() {
    let tenant = TestTenant::new().await;

    tenant.mount_specialist(true).await;
    tenant.mount_client(false).await;

    // 07:30 starts before the default template opens.
    let decision = tenant
        .admission()
        .admit(&tenant.request_for(upcoming_date(), "07:30"), TOKEN)
        .await
        .unwrap();

    assert_matches!(
        decision,
        AdmissionDecision::Rejected(r) if r.reason == RejectionReason::OutsideHours
    );
}

#[tokio::test]
async fn slot_spilling_past_window_end_is_rejected() {
    let tenant = TestTenant::new().await;

    tenant.mount_specialist(true).await;
    tenant.mount_client(false).await;

    // 11:45 + 30 minutes crosses the 12:00 window end.
    let decision = tenant
        .admission()
        .admit(&tenant.request_for(upcoming_date(), "11:45"), TOKEN)
        .await
        .unwrap();

    assert_matches!(
        decision,
        AdmissionDecision::Rejected(r) if r.reason == RejectionReason::OutsideHours
    );
}

#[tokio::test]
async fn overlapping_client_booking_is_rejected() {
    let tenant = TestTenant::new().await;
    let date = upcoming_date();

    tenant.mount_specialist(true).await;
    tenant.mount_client(false).await;

    // The client sees another specialist 09:15-09:45; 09:00-09:30 overlaps.
    let other_specialist = Uuid::new_v4();
    tenant
        .mount_client_day(json!([{
            "id": Uuid::new_v4(),
            "client_id": tenant.client_id,
            "specialist_id": other_specialist,
            "date": date,
            "start_time": "09:15:00",
            "duration_minutes": 30,
            "plan_id": null,
            "warning": null,
            "created_at": "2026-01-01T12:00:00Z",
        }]))
        .await;

    let decision = tenant
        .admission()
        .admit(&tenant.request_for(date, "09:00"), TOKEN)
        .await
        .unwrap();

    assert_matches!(
        decision,
        AdmissionDecision::Rejected(r) if r.reason == RejectionReason::ClientConflict
    );
}

#[tokio::test]
async fn busy_specialist_is_rejected_with_alternatives() {
    let tenant = TestTenant::new().await;
    let date = upcoming_date();

    tenant.mount_specialist(true).await;
    tenant.mount_client(false).await;
    tenant.mount_client_day(json!([])).await;
    // Specialist already booked 09:00-09:30, every day of the horizon.
    tenant
        .mount_specialist_day(json!([tenant.persisted_row(date, "09:00:00", false, None)]))
        .await;

    let decision = tenant
        .admission()
        .admit(&tenant.request_for(date, "09:00"), TOKEN)
        .await
        .unwrap();

    let rejection = match decision {
        AdmissionDecision::Rejected(r) => r,
        AdmissionDecision::Accepted(_) => panic!("expected rejection"),
    };
    assert_eq!(rejection.reason, RejectionReason::SpecialistConflict);
    assert!(!rejection.suggestions.is_empty());
    assert!(rejection.suggestions.len() <= 3);
    // The taken 09:00 slot must not come back as a suggestion.
    let taken = parse_clock("09:00").unwrap();
    assert!(rejection
        .suggestions
        .iter()
        .all(|s| !(s.date == date && s.time == taken)));
}

// ==============================================================================
// PLAN BRANCH
// ==============================================================================

#[tokio::test]
async fn plan_not_accepted_by_specialist_is_rejected_without_persisting() {
    // Scenario: client's plan is missing from the specialist's accepted list.
    let tenant = TestTenant::new().await;

    tenant.mount_specialist(true).await;
    tenant.mount_client(true).await;
    tenant.mount_plan_accepted(false).await;
    tenant.mount_client_day(json!([])).await;
    tenant.mount_specialist_day(json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&tenant.server)
        .await;

    let decision = tenant
        .admission()
        .admit(&tenant.request_for(upcoming_date(), "09:00"), TOKEN)
        .await
        .unwrap();

    let rejection = match decision {
        AdmissionDecision::Rejected(r) => r,
        AdmissionDecision::Accepted(_) => panic!("expected rejection"),
    };
    assert_eq!(rejection.reason, RejectionReason::PlanNotAccepted);
    assert!(rejection.suggestions.is_empty());
}

#[tokio::test]
async fn plan_daily_limit_is_a_soft_rejection_with_override_offer() {
    // Scenario: max_daily=2 and two plan bookings already exist that day.
    let tenant = TestTenant::new().await;

    tenant.mount_specialist(true).await;
    tenant.mount_client(true).await;
    tenant.mount_plan_accepted(true).await;
    tenant.mount_policy(2, 0).await;
    tenant.mount_plan_count(2).await;
    tenant.mount_client_day(json!([])).await;
    tenant.mount_specialist_day(json!([])).await;

    let decision = tenant
        .admission()
        .admit(&tenant.request_for(upcoming_date(), "09:00"), TOKEN)
        .await
        .unwrap();

    let rejection = match decision {
        AdmissionDecision::Rejected(r) => r,
        AdmissionDecision::Accepted(_) => panic!("expected rejection"),
    };
    assert_eq!(rejection.reason, RejectionReason::PlanLimitReached);

    let quota = rejection.quota.expect("soft rejection carries quota detail");
    assert!(quota.can_override);
    assert_eq!(quota.max_daily, 2);
    assert_eq!(quota.current_count, 2);
}

#[tokio::test]
async fn explicit_override_commits_and_records_a_warning() {
    let tenant = TestTenant::new().await;
    let date = upcoming_date();

    tenant.mount_specialist(true).await;
    tenant.mount_client(true).await;
    tenant.mount_plan_accepted(true).await;
    tenant.mount_policy(2, 0).await;
    tenant.mount_plan_count(2).await;
    tenant.mount_client_day(json!([])).await;
    tenant.mount_specialist_day(json!([])).await;

    let warning = "Plan daily limit 2 exceeded by explicit override (count at booking: 2)";
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "warning": warning })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([tenant.persisted_row(date, "09:00:00", true, Some(warning))])),
        )
        .expect(1)
        .mount(&tenant.server)
        .await;

    let mut request = tenant.request_for(date, "09:00");
    request.override_plan_limit = true;

    let decision = tenant.admission().admit(&request, TOKEN).await.unwrap();

    let appointment = match decision {
        AdmissionDecision::Accepted(apt) => apt,
        AdmissionDecision::Rejected(r) => panic!("expected acceptance, got {:?}", r.reason),
    };
    assert_eq!(appointment.warning.as_deref(), Some(warning));
    assert_eq!(appointment.plan_id, Some(tenant.plan_id));
}

#[tokio::test]
async fn insufficient_lead_time_is_rejected_with_compliant_suggestions() {
    // Scenario: min_lead_days=3, desired date is tomorrow.
    let tenant = TestTenant::new().await;
    let today = Utc::now().date_naive();
    let tomorrow = today + Duration::days(1);

    tenant.mount_specialist(true).await;
    tenant.mount_client(true).await;
    tenant.mount_plan_accepted(true).await;
    tenant.mount_policy(0, 3).await;
    tenant.mount_client_day(json!([])).await;
    tenant.mount_specialist_day(json!([])).await;

    let decision = tenant
        .admission()
        .admit(&tenant.request_for(tomorrow, "09:00"), TOKEN)
        .await
        .unwrap();

    let rejection = match decision {
        AdmissionDecision::Rejected(r) => r,
        AdmissionDecision::Accepted(_) => panic!("expected rejection"),
    };
    assert_eq!(rejection.reason, RejectionReason::InsufficientLeadTime);
    assert!(!rejection.suggestions.is_empty());
    assert!(rejection.suggestions.len() <= 3);

    // Every suggested day honours the three-day minimum.
    for slot in &rejection.suggestions {
        let lead = slot.date.signed_duration_since(today).num_days();
        assert!(lead >= 3, "suggestion {} has lead {} days", slot.date, lead);
    }
}

#[tokio::test]
async fn plan_booking_within_policy_commits_with_plan_attached() {
    let tenant = TestTenant::new().await;
    let date = upcoming_date();

    tenant.mount_specialist(true).await;
    tenant.mount_client(true).await;
    tenant.mount_plan_accepted(true).await;
    tenant.mount_policy(5, 2).await;
    tenant.mount_plan_count(1).await;
    tenant.mount_client_day(json!([])).await;
    tenant.mount_specialist_day(json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "plan_id": tenant.plan_id })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([tenant.persisted_row(date, "09:00:00", true, None)])),
        )
        .expect(1)
        .mount(&tenant.server)
        .await;

    let decision = tenant
        .admission()
        .admit(&tenant.request_for(date, "09:00"), TOKEN)
        .await
        .unwrap();

    assert_matches!(decision, AdmissionDecision::Accepted(apt) if apt.plan_id == Some(tenant.plan_id));
}

// ==============================================================================
// CONCURRENCY: STORAGE-LAYER CONFLICT TRANSLATION
// ==============================================================================

#[tokio::test]
async fn concurrent_identical_requests_accept_exactly_one() {
    // Both requests pass the read-side checks against the same (empty)
    // occupancy snapshot; the storage exclusion constraint arbitrates, and
    // the loser's 409 is translated back into SPECIALIST_CONFLICT.
    let tenant = TestTenant::new().await;
    let date = upcoming_date();

    tenant.mount_specialist(true).await;
    tenant.mount_client(false).await;
    tenant.mount_client_day(json!([])).await;
    tenant.mount_specialist_day(json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([tenant.persisted_row(date, "09:00:00", false, None)])),
        )
        .up_to_n_times(1)
        .mount(&tenant.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23P01",
            "message": "conflicting key value violates exclusion constraint \"appointments_specialist_no_overlap\"",
        })))
        .mount(&tenant.server)
        .await;

    let admission = tenant.admission();
    let request = tenant.request_for(date, "09:00");

    let (first, second) = tokio::join!(
        admission.admit(&request, TOKEN),
        admission.admit(&request, TOKEN),
    );

    let outcomes = [first.unwrap(), second.unwrap()];
    let accepted = outcomes.iter().filter(|d| d.is_accepted()).count();
    assert_eq!(accepted, 1, "exactly one of the two requests may commit");

    let rejected = outcomes
        .iter()
        .find_map(|d| match d {
            AdmissionDecision::Rejected(r) => Some(r),
            AdmissionDecision::Accepted(_) => None,
        })
        .expect("one request must lose");
    assert_eq!(rejected.reason, RejectionReason::SpecialistConflict);
}

#[tokio::test]
async fn client_constraint_violation_maps_to_client_conflict() {
    let tenant = TestTenant::new().await;
    let date = upcoming_date();

    tenant.mount_specialist(true).await;
    tenant.mount_client(false).await;
    tenant.mount_client_day(json!([])).await;
    tenant.mount_specialist_day(json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23P01",
            "message": "conflicting key value violates exclusion constraint \"appointments_client_no_overlap\"",
        })))
        .mount(&tenant.server)
        .await;

    let decision = tenant
        .admission()
        .admit(&tenant.request_for(date, "09:00"), TOKEN)
        .await
        .unwrap();

    assert_matches!(
        decision,
        AdmissionDecision::Rejected(r) if r.reason == RejectionReason::ClientConflict
    );
}

// ==============================================================================
// FAILURE SURFACES
// ==============================================================================

#[tokio::test]
async fn unknown_specialist_is_an_error_not_a_rejection() {
    let tenant = TestTenant::new().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/specialists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&tenant.server)
        .await;

    let result = tenant
        .admission()
        .admit(&tenant.request_for(upcoming_date(), "09:00"), TOKEN)
        .await;

    assert_matches!(result, Err(SchedulingError::SpecialistNotFound));
}

#[tokio::test]
async fn storage_failure_on_commit_is_a_persistence_error() {
    let tenant = TestTenant::new().await;

    tenant.mount_specialist(true).await;
    tenant.mount_client(false).await;
    tenant.mount_client_day(json!([])).await;
    tenant.mount_specialist_day(json!([])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&tenant.server)
        .await;

    let result = tenant
        .admission()
        .admit(&tenant.request_for(upcoming_date(), "09:00"), TOKEN)
        .await;

    assert_matches!(result, Err(SchedulingError::Database(_)));
}
