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

use crate::models::{ClientError, CreateClientRequest, UpdateClientRequest};
use crate::services::ClientService;

#[derive(Debug, Deserialize)]
pub struct DomainQuery {
    pub domain: Option<String>,
}

#[axum::debug_handler]
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = client_service(&state, query.domain.as_deref()).await?;
    let clients = service.list(auth.token()).await.map_err(map_client_error)?;

    Ok(Json(json!({ "success": true, "clients": clients })))
}

#[axum::debug_handler]
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = client_service(&state, query.domain.as_deref()).await?;
    let client = service
        .get(client_id, auth.token())
        .await
        .map_err(map_client_error)?;

    Ok(Json(json!({ "success": true, "client": client })))
}

#[axum::debug_handler]
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateClientRequest>,
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

    let service = client_service(&state, request.domain.as_deref()).await?;
    let client = service
        .create(&request, auth.token())
        .await
        .map_err(map_client_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "client": client })),
    ))
}

#[axum::debug_handler]
pub async fn update_client(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpdateClientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = client_service(&state, request.domain.as_deref()).await?;
    let client = service
        .update(client_id, &request, auth.token())
        .await
        .map_err(map_client_error)?;

    Ok(Json(json!({ "success": true, "client": client })))
}

#[axum::debug_handler]
pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<DomainQuery>,
) -> Result<Json<Value>, AppError> {
    let service = client_service(&state, query.domain.as_deref()).await?;
    service
        .delete(client_id, auth.token())
        .await
        .map_err(map_client_error)?;

    Ok(Json(json!({ "success": true, "message": "Client deleted" })))
}

async fn client_service(state: &AppState, domain: Option<&str>) -> Result<ClientService, AppError> {
    let domain = match domain.map(str::trim) {
        Some(d) if !d.is_empty() => d,
        _ => return Err(AppError::Validation(vec!["domain".to_string()])),
    };

    let tenant: PostgrestClient = state.tenant(domain).await.map_err(|e| match e {
        DbError::NotFound(_) => AppError::DomainNotFound(domain.to_string()),
        other => AppError::ExternalService(other.to_string()),
    })?;
    Ok(ClientService::new(Arc::new(tenant)))
}

fn map_client_error(e: ClientError) -> AppError {
    match e {
        ClientError::NotFound => AppError::NotFound("Client not found".to_string()),
        ClientError::Database(msg) => AppError::Database(msg),
    }
}
