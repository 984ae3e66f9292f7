use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_database::PostgrestClient;

use crate::models::{Plan, PlanError};

pub struct PlanService {
    db: Arc<PostgrestClient>,
}

impl PlanService {
    pub fn new(db: Arc<PostgrestClient>) -> Self {
        Self { db }
    }

    pub async fn list(&self, auth_token: &str) -> Result<Vec<Plan>, PlanError> {
        self.db
            .request(Method::GET, "/rest/v1/plans?order=name.asc", Some(auth_token), None)
            .await
            .map_err(|e| PlanError::Database(e.to_string()))
    }

    pub async fn create(&self, name: &str, auth_token: &str) -> Result<Plan, PlanError> {
        let rows: Vec<Plan> = self
            .with_representation(
                Method::POST,
                "/rest/v1/plans",
                Some(json!({ "name": name })),
                auth_token,
            )
            .await?;

        let plan = rows
            .into_iter()
            .next()
            .ok_or_else(|| PlanError::Database("insert returned no row".into()))?;
        info!("plan {} created", plan.id);
        Ok(plan)
    }

    pub async fn rename(&self, id: Uuid, name: &str, auth_token: &str) -> Result<Plan, PlanError> {
        let path = format!("/rest/v1/plans?id=eq.{}", id);
        let rows: Vec<Plan> = self
            .with_representation(Method::PATCH, &path, Some(json!({ "name": name })), auth_token)
            .await?;

        rows.into_iter().next().ok_or(PlanError::NotFound)
    }

    pub async fn delete(&self, id: Uuid, auth_token: &str) -> Result<(), PlanError> {
        let path = format!("/rest/v1/plans?id=eq.{}", id);
        let rows: Vec<Value> = self
            .with_representation(Method::DELETE, &path, None, auth_token)
            .await?;
        if rows.is_empty() {
            return Err(PlanError::NotFound);
        }
        info!("plan {} deleted", id);
        Ok(())
    }

    async fn with_representation<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        auth_token: &str,
    ) -> Result<T, PlanError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        self.db
            .request_with_headers(method, path, Some(auth_token), body, Some(headers))
            .await
            .map_err(|e| PlanError::Database(e.to_string()))
    }
}
