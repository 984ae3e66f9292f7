use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::{AppState, DbError, PostgrestClient};
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    parse_clock, parse_date, AdmissionDecision, CreateAppointmentPayload, Rejection,
    SchedulingError, UpdateAppointmentPayload,
};
use crate::services::admission::AdmissionService;
use crate::services::appointments::{AppointmentChanges, AppointmentFilter, AppointmentService};

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct DomainQuery {
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListAppointmentsQuery {
    pub domain: Option<String>,
    pub date: Option<String>,
    pub specialist_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct OpenSlotsQuery {
    pub domain: Option<String>,
    pub specialist_id: Option<Uuid>,
    pub date: Option<String>,
    pub duration_minutes: Option<i32>,
}

// ==============================================================================
// HANDLERS
// ==============================================================================

/// Book an appointment through the admission controller. Acceptance persists
/// the row; any rule rejection comes back as a structured 409 with its reason
/// code and, where applicable, alternative slots.
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateAppointmentPayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();
    let (domain, request) = payload.validate().map_err(AppError::Validation)?;

    tracing::debug!("booking requested by operator {} for tenant {}", user.id, domain);

    let tenant = tenant_storage(&state, &domain).await?;
    let admission = AdmissionService::new(Arc::new(tenant), &state.config);

    let decision = admission
        .admit(&request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(decision_response(decision))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let domain = require_domain(query.domain.as_deref())?;

    let date = match query.date.as_deref() {
        Some(raw) => Some(parse_date(raw).ok_or_else(|| AppError::Validation(vec!["date".into()]))?),
        None => None,
    };

    let tenant = tenant_storage(&state, &domain).await?;
    let service = AppointmentService::new(Arc::new(tenant), &state.config);

    let filter = AppointmentFilter {
        date,
        specialist_id: query.specialist_id,
        client_id: query.client_id,
    };
    let appointments = service
        .list(&filter, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let domain = require_domain(query.domain.as_deref())?;

    let tenant = tenant_storage(&state, &domain).await?;
    let service = AppointmentService::new(Arc::new(tenant), &state.config);

    let appointment = service
        .get(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

/// Partial update: only provided fields change. Depending on configuration,
/// timing changes re-run the window and conflict gates first.
#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateAppointmentPayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();
    let domain = require_domain(payload.domain.as_deref())?;

    let mut bad_fields = Vec::new();
    let date = match payload.date.as_deref() {
        Some(raw) => match parse_date(raw) {
            Some(parsed) => Some(parsed),
            None => {
                bad_fields.push("date".to_string());
                None
            }
        },
        None => None,
    };
    let time = match payload.time.as_deref() {
        Some(raw) => match parse_clock(raw) {
            Some(parsed) => Some(parsed),
            None => {
                bad_fields.push("time".to_string());
                None
            }
        },
        None => None,
    };
    if !bad_fields.is_empty() {
        return Err(AppError::Validation(bad_fields));
    }

    let changes = AppointmentChanges {
        date,
        time,
        duration_minutes: payload.duration_minutes,
    };
    if changes.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let tenant = tenant_storage(&state, &domain).await?;
    let service = AppointmentService::new(Arc::new(tenant), &state.config);

    let outcome = service
        .update(appointment_id, changes, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(match outcome {
        AdmissionDecision::Accepted(appointment) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "appointment": appointment,
                "message": "Appointment updated",
            })),
        ),
        AdmissionDecision::Rejected(rejection) => {
            (StatusCode::CONFLICT, Json(rejection_body(&rejection)))
        }
    })
}

/// Cancellation: deletes the row, no rule re-validation.
#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let domain = require_domain(query.domain.as_deref())?;

    let tenant = tenant_storage(&state, &domain).await?;
    let service = AppointmentService::new(Arc::new(tenant), &state.config);

    service
        .delete(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled",
    })))
}

/// The specialist's free slots on one date.
#[axum::debug_handler]
pub async fn list_open_slots(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<OpenSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let mut bad_fields = Vec::new();
    let domain = match query.domain.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => Some(d.to_string()),
        _ => {
            bad_fields.push("domain".to_string());
            None
        }
    };
    let specialist_id = match query.specialist_id {
        Some(id) => Some(id),
        None => {
            bad_fields.push("specialist_id".to_string());
            None
        }
    };
    let date = match query.date.as_deref().and_then(parse_date) {
        Some(d) => Some(d),
        None => {
            bad_fields.push("date".to_string());
            None
        }
    };
    let (Some(domain), Some(specialist_id), Some(date)) = (domain, specialist_id, date) else {
        return Err(AppError::Validation(bad_fields));
    };

    let tenant = tenant_storage(&state, &domain).await?;
    let service = AppointmentService::new(Arc::new(tenant), &state.config);

    let slots = service
        .open_slots(specialist_id, date, query.duration_minutes, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "slots": slots,
    })))
}

// ==============================================================================
// HELPERS
// ==============================================================================

async fn tenant_storage(state: &AppState, domain: &str) -> Result<PostgrestClient, AppError> {
    state.tenant(domain).await.map_err(|e| match e {
        DbError::NotFound(_) => AppError::DomainNotFound(domain.to_string()),
        other => AppError::ExternalService(other.to_string()),
    })
}

fn require_domain(domain: Option<&str>) -> Result<String, AppError> {
    match domain.map(str::trim) {
        Some(d) if !d.is_empty() => Ok(d.to_string()),
        _ => Err(AppError::Validation(vec!["domain".to_string()])),
    }
}

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        SchedulingError::ClientNotFound => AppError::NotFound("Client not found".to_string()),
        SchedulingError::SpecialistNotFound => {
            AppError::NotFound("Specialist not found".to_string())
        }
        SchedulingError::Database(msg) => AppError::Database(msg),
    }
}

fn decision_response(decision: AdmissionDecision) -> (StatusCode, Json<Value>) {
    match decision {
        AdmissionDecision::Accepted(appointment) => (
            StatusCode::CREATED,
            Json(json!({
                "accepted": true,
                "appointment": appointment,
                "message": "Appointment booked",
            })),
        ),
        AdmissionDecision::Rejected(rejection) => {
            (StatusCode::CONFLICT, Json(rejection_body(&rejection)))
        }
    }
}

fn rejection_body(rejection: &Rejection) -> Value {
    let mut body = json!({
        "accepted": false,
        "reason": rejection.reason,
        "message": rejection.message,
    });

    if !rejection.suggestions.is_empty() {
        body["suggestions"] = json!(rejection.suggestions);
    }
    if let Some(quota) = &rejection.quota {
        body["canOverride"] = json!(quota.can_override);
        body["maxDiario"] = json!(quota.max_daily);
        body["qtdAtual"] = json!(quota.current_count);
    }

    body
}
