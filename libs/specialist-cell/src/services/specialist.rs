use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::PostgrestClient;

use crate::models::{
    CreateSpecialistRequest, PlanAcceptance, Specialist, SpecialistError, UpdateSpecialistRequest,
};

pub struct SpecialistService {
    db: Arc<PostgrestClient>,
}

impl SpecialistService {
    pub fn new(db: Arc<PostgrestClient>) -> Self {
        Self { db }
    }

    pub async fn list(&self, auth_token: &str) -> Result<Vec<Specialist>, SpecialistError> {
        self.fetch("/rest/v1/specialists?order=name.asc", auth_token)
            .await
    }

    pub async fn get(&self, id: Uuid, auth_token: &str) -> Result<Specialist, SpecialistError> {
        let path = format!("/rest/v1/specialists?id=eq.{}", id);
        let rows: Vec<Specialist> = self.fetch(&path, auth_token).await?;
        rows.into_iter().next().ok_or(SpecialistError::NotFound)
    }

    pub async fn create(
        &self,
        request: &CreateSpecialistRequest,
        auth_token: &str,
    ) -> Result<Specialist, SpecialistError> {
        let body = json!({
            "name": request.name,
            "description": request.description,
            "working_hours": request.working_hours,
            "consultation_fee": request.consultation_fee,
            "accepts_plan": request.accepts_plan.unwrap_or(false),
            "consultation_minutes": request.consultation_minutes.unwrap_or(30),
            "managed_agenda": request.managed_agenda.unwrap_or(false),
            "color": request.color,
        });

        let rows: Vec<Specialist> = self
            .insert("/rest/v1/specialists", body, auth_token)
            .await?;
        let specialist = rows
            .into_iter()
            .next()
            .ok_or_else(|| SpecialistError::Database("insert returned no row".into()))?;

        info!("specialist {} created", specialist.id);
        Ok(specialist)
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: &UpdateSpecialistRequest,
        auth_token: &str,
    ) -> Result<Specialist, SpecialistError> {
        let mut fields = Map::new();
        if let Some(name) = &request.name {
            fields.insert("name".into(), json!(name));
        }
        if let Some(description) = &request.description {
            fields.insert("description".into(), json!(description));
        }
        if let Some(working_hours) = &request.working_hours {
            fields.insert("working_hours".into(), working_hours.clone());
        }
        if let Some(fee) = request.consultation_fee {
            fields.insert("consultation_fee".into(), json!(fee));
        }
        if let Some(accepts_plan) = request.accepts_plan {
            fields.insert("accepts_plan".into(), json!(accepts_plan));
        }
        if let Some(minutes) = request.consultation_minutes {
            fields.insert("consultation_minutes".into(), json!(minutes));
        }
        if let Some(managed) = request.managed_agenda {
            fields.insert("managed_agenda".into(), json!(managed));
        }
        if let Some(color) = &request.color {
            fields.insert("color".into(), json!(color));
        }

        let path = format!("/rest/v1/specialists?id=eq.{}", id);
        let rows: Vec<Specialist> = self
            .request_with_representation(Method::PATCH, &path, Value::Object(fields), auth_token)
            .await?;

        rows.into_iter().next().ok_or(SpecialistError::NotFound)
    }

    pub async fn delete(&self, id: Uuid, auth_token: &str) -> Result<(), SpecialistError> {
        let path = format!("/rest/v1/specialists?id=eq.{}", id);
        let rows: Vec<Value> = self
            .request_with_representation(Method::DELETE, &path, Value::Null, auth_token)
            .await?;
        if rows.is_empty() {
            return Err(SpecialistError::NotFound);
        }
        info!("specialist {} deleted", id);
        Ok(())
    }

    // Plan acceptance relation.

    pub async fn accepted_plans(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<PlanAcceptance>, SpecialistError> {
        let path = format!(
            "/rest/v1/specialist_plans?specialist_id=eq.{}&select=plan_id",
            id
        );
        self.fetch(&path, auth_token).await
    }

    pub async fn accept_plan(
        &self,
        id: Uuid,
        plan_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SpecialistError> {
        let existing = self.accepted_plans(id, auth_token).await?;
        if existing.iter().any(|row| row.plan_id == plan_id) {
            debug!("specialist {} already accepts plan {}", id, plan_id);
            return Ok(());
        }

        let body = json!({ "specialist_id": id, "plan_id": plan_id });
        let _: Vec<Value> = self.insert("/rest/v1/specialist_plans", body, auth_token).await?;
        info!("specialist {} now accepts plan {}", id, plan_id);
        Ok(())
    }

    pub async fn remove_plan(
        &self,
        id: Uuid,
        plan_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SpecialistError> {
        let path = format!(
            "/rest/v1/specialist_plans?specialist_id=eq.{}&plan_id=eq.{}",
            id, plan_id
        );
        let _: Vec<Value> = self
            .request_with_representation(Method::DELETE, &path, Value::Null, auth_token)
            .await?;
        Ok(())
    }

    // Helpers.

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<T, SpecialistError> {
        self.db
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| SpecialistError::Database(e.to_string()))
    }

    async fn insert<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
        auth_token: &str,
    ) -> Result<T, SpecialistError> {
        self.request_with_representation(Method::POST, path, body, auth_token)
            .await
    }

    async fn request_with_representation<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Value,
        auth_token: &str,
    ) -> Result<T, SpecialistError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        let body = if body.is_null() { None } else { Some(body) };

        self.db
            .request_with_headers(method, path, Some(auth_token), body, Some(headers))
            .await
            .map_err(|e| SpecialistError::Database(e.to_string()))
    }
}
