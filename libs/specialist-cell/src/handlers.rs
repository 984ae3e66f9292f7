use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::{AppState, DbError, PostgrestClient};
use shared_models::error::AppError;

use crate::models::{
    AcceptPlanRequest, CreateSpecialistRequest, SpecialistError, UpdateSpecialistRequest,
    UpsertPolicyRequest,
};
use crate::services::{PolicyService, SpecialistService};

#[derive(Debug, Deserialize)]
pub struct DomainQuery {
    pub domain: Option<String>,
}

#[axum::debug_handler]
pub async fn list_specialists(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = specialist_service(&state, query.domain.as_deref()).await?;
    let specialists = service
        .list(auth.token())
        .await
        .map_err(map_specialist_error)?;

    Ok(Json(json!({ "success": true, "specialists": specialists })))
}

#[axum::debug_handler]
pub async fn get_specialist(
    State(state): State<Arc<AppState>>,
    Path(specialist_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = specialist_service(&state, query.domain.as_deref()).await?;
    let specialist = service
        .get(specialist_id, auth.token())
        .await
        .map_err(map_specialist_error)?;

    Ok(Json(json!({ "success": true, "specialist": specialist })))
}

#[axum::debug_handler]
pub async fn create_specialist(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateSpecialistRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut missing = Vec::new();
    if request.domain.as_deref().map_or(true, |d| d.trim().is_empty()) {
        missing.push("domain".to_string());
    }
    if request.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        missing.push("name".to_string());
    }
    if !missing.is_empty() {
        return Err(AppError::Validation(missing));
    }

    let service = specialist_service(&state, request.domain.as_deref()).await?;
    let specialist = service
        .create(&request, auth.token())
        .await
        .map_err(map_specialist_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "specialist": specialist })),
    ))
}

#[axum::debug_handler]
pub async fn update_specialist(
    State(state): State<Arc<AppState>>,
    Path(specialist_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpdateSpecialistRequest>,
) -> Result<Json<Value>, AppError> {
    let service = specialist_service(&state, request.domain.as_deref()).await?;
    let specialist = service
        .update(specialist_id, &request, auth.token())
        .await
        .map_err(map_specialist_error)?;

    Ok(Json(json!({ "success": true, "specialist": specialist })))
}

#[axum::debug_handler]
pub async fn delete_specialist(
    State(state): State<Arc<AppState>>,
    Path(specialist_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = specialist_service(&state, query.domain.as_deref()).await?;
    service
        .delete(specialist_id, auth.token())
        .await
        .map_err(map_specialist_error)?;

    Ok(Json(json!({ "success": true, "message": "Specialist deleted" })))
}

// Plan acceptance sub-resource.

#[axum::debug_handler]
pub async fn list_accepted_plans(
    State(state): State<Arc<AppState>>,
    Path(specialist_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = specialist_service(&state, query.domain.as_deref()).await?;
    let plans = service
        .accepted_plans(specialist_id, auth.token())
        .await
        .map_err(map_specialist_error)?;

    Ok(Json(json!({ "success": true, "plans": plans })))
}

#[axum::debug_handler]
pub async fn accept_plan(
    State(state): State<Arc<AppState>>,
    Path(specialist_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<AcceptPlanRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let plan_id = request
        .plan_id
        .ok_or_else(|| AppError::Validation(vec!["plan_id".to_string()]))?;

    let service = specialist_service(&state, request.domain.as_deref()).await?;
    service
        .accept_plan(specialist_id, plan_id, auth.token())
        .await
        .map_err(map_specialist_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Plan accepted" })),
    ))
}

#[axum::debug_handler]
pub async fn remove_plan(
    State(state): State<Arc<AppState>>,
    Path((specialist_id, plan_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = specialist_service(&state, query.domain.as_deref()).await?;
    service
        .remove_plan(specialist_id, plan_id, auth.token())
        .await
        .map_err(map_specialist_error)?;

    Ok(Json(json!({ "success": true, "message": "Plan removed" })))
}

// Agenda policy sub-resource.

#[axum::debug_handler]
pub async fn list_policies(
    State(state): State<Arc<AppState>>,
    Path(specialist_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = policy_service(&state, query.domain.as_deref()).await?;
    let policies = service
        .list_for_specialist(specialist_id, auth.token())
        .await
        .map_err(map_specialist_error)?;

    Ok(Json(json!({ "success": true, "policies": policies })))
}

#[axum::debug_handler]
pub async fn upsert_policy(
    State(state): State<Arc<AppState>>,
    Path(specialist_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpsertPolicyRequest>,
) -> Result<Json<Value>, AppError> {
    let plan_id = request
        .plan_id
        .ok_or_else(|| AppError::Validation(vec!["plan_id".to_string()]))?;

    let service = policy_service(&state, request.domain.as_deref()).await?;
    let policy = service
        .upsert(
            specialist_id,
            plan_id,
            request.max_daily.unwrap_or(0),
            request.min_lead_days.unwrap_or(0),
            auth.token(),
        )
        .await
        .map_err(map_specialist_error)?;

    Ok(Json(json!({ "success": true, "policy": policy })))
}

#[axum::debug_handler]
pub async fn delete_policy(
    State(state): State<Arc<AppState>>,
    Path((specialist_id, plan_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = policy_service(&state, query.domain.as_deref()).await?;
    service
        .delete(specialist_id, plan_id, auth.token())
        .await
        .map_err(map_specialist_error)?;

    Ok(Json(json!({ "success": true, "message": "Policy removed" })))
}

// Helpers.

async fn tenant_storage(state: &AppState, domain: Option<&str>) -> Result<PostgrestClient, AppError> {
    let domain = match domain.map(str::trim) {
        Some(d) if !d.is_empty() => d,
        _ => return Err(AppError::Validation(vec!["domain".to_string()])),
    };

    state.tenant(domain).await.map_err(|e| match e {
        DbError::NotFound(_) => AppError::DomainNotFound(domain.to_string()),
        other => AppError::ExternalService(other.to_string()),
    })
}

async fn specialist_service(
    state: &AppState,
    domain: Option<&str>,
) -> Result<SpecialistService, AppError> {
    let tenant = tenant_storage(state, domain).await?;
    Ok(SpecialistService::new(Arc::new(tenant)))
}

async fn policy_service(state: &AppState, domain: Option<&str>) -> Result<PolicyService, AppError> {
    let tenant = tenant_storage(state, domain).await?;
    Ok(PolicyService::new(Arc::new(tenant)))
}

fn map_specialist_error(e: SpecialistError) -> AppError {
    match e {
        SpecialistError::NotFound => AppError::NotFound("Specialist not found".to_string()),
        SpecialistError::Database(msg) => AppError::Database(msg),
    }
}
