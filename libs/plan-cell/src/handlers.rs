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

use crate::models::{CreatePlanRequest, PlanError, UpdatePlanRequest};
use crate::services::PlanService;

#[derive(Debug, Deserialize)]
pub struct DomainQuery {
    pub domain: Option<String>,
}

#[axum::debug_handler]
pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = plan_service(&state, query.domain.as_deref()).await?;
    let plans = service.list(auth.token()).await.map_err(map_plan_error)?;

    Ok(Json(json!({ "success": true, "plans": plans })))
}

#[axum::debug_handler]
pub async fn create_plan(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let name = require_name(request.name.as_deref())?;
    let service = plan_service(&state, request.domain.as_deref()).await?;
    let plan = service
        .create(&name, auth.token())
        .await
        .map_err(map_plan_error)?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "plan": plan }))))
}

#[axum::debug_handler]
pub async fn update_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpdatePlanRequest>,
) -> Result<Json<Value>, AppError> {
    let name = require_name(request.name.as_deref())?;
    let service = plan_service(&state, request.domain.as_deref()).await?;
    let plan = service
        .rename(plan_id, &name, auth.token())
        .await
        .map_err(map_plan_error)?;

    Ok(Json(json!({ "success": true, "plan": plan })))
}

#[axum::debug_handler]
pub async fn delete_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = plan_service(&state, query.domain.as_deref()).await?;
    service
        .delete(plan_id, auth.token())
        .await
        .map_err(map_plan_error)?;

    Ok(Json(json!({ "success": true, "message": "Plan deleted" })))
}

fn require_name(name: Option<&str>) -> Result<String, AppError> {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => Ok(n.to_string()),
        _ => Err(AppError::Validation(vec!["name".to_string()])),
    }
}

async fn plan_service(state: &AppState, domain: Option<&str>) -> Result<PlanService, AppError> {
    let domain = match domain.map(str::trim) {
        Some(d) if !d.is_empty() => d,
        _ => return Err(AppError::Validation(vec!["domain".to_string()])),
    };

    let tenant: PostgrestClient = state.tenant(domain).await.map_err(|e| match e {
        DbError::NotFound(_) => AppError::DomainNotFound(domain.to_string()),
        other => AppError::ExternalService(other.to_string()),
    })?;
    Ok(PlanService::new(Arc::new(tenant)))
}

fn map_plan_error(e: PlanError) -> AppError {
    match e {
        PlanError::NotFound => AppError::NotFound("Plan not found".to_string()),
        PlanError::Database(msg) => AppError::Database(msg),
    }
}
