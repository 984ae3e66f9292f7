use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_database::PostgrestClient;

use crate::models::{AgendaPolicy, SpecialistError};

/// Maintains the per-(specialist, plan) booking policies: daily quota and
/// minimum advance notice.
pub struct PolicyService {
    db: Arc<PostgrestClient>,
}

impl PolicyService {
    pub fn new(db: Arc<PostgrestClient>) -> Self {
        Self { db }
    }

    pub async fn list_for_specialist(
        &self,
        specialist_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AgendaPolicy>, SpecialistError> {
        let path = format!(
            "/rest/v1/plan_policies?specialist_id=eq.{}&select=plan_id,max_daily,min_lead_days&order=plan_id.asc",
            specialist_id
        );
        self.db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SpecialistError::Database(e.to_string()))
    }

    /// Update the policy row when it exists, insert it otherwise.
    pub async fn upsert(
        &self,
        specialist_id: Uuid,
        plan_id: Uuid,
        max_daily: i32,
        min_lead_days: i64,
        auth_token: &str,
    ) -> Result<AgendaPolicy, SpecialistError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let path = format!(
            "/rest/v1/plan_policies?specialist_id=eq.{}&plan_id=eq.{}",
            specialist_id, plan_id
        );
        let updated: Vec<AgendaPolicy> = self
            .db
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({ "max_daily": max_daily.max(0), "min_lead_days": min_lead_days.max(0) })),
                Some(headers.clone()),
            )
            .await
            .map_err(|e| SpecialistError::Database(e.to_string()))?;

        if let Some(policy) = updated.into_iter().next() {
            info!(
                "policy updated for specialist {} plan {}: max_daily={} min_lead_days={}",
                specialist_id, plan_id, max_daily, min_lead_days
            );
            return Ok(policy);
        }

        let inserted: Vec<AgendaPolicy> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/plan_policies",
                Some(auth_token),
                Some(json!({
                    "specialist_id": specialist_id,
                    "plan_id": plan_id,
                    "max_daily": max_daily.max(0),
                    "min_lead_days": min_lead_days.max(0),
                })),
                Some(headers),
            )
            .await
            .map_err(|e| SpecialistError::Database(e.to_string()))?;

        inserted
            .into_iter()
            .next()
            .ok_or_else(|| SpecialistError::Database("policy insert returned no row".into()))
    }

    pub async fn delete(
        &self,
        specialist_id: Uuid,
        plan_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SpecialistError> {
        let path = format!(
            "/rest/v1/plan_policies?specialist_id=eq.{}&plan_id=eq.{}",
            specialist_id, plan_id
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        let _: Vec<Value> = self
            .db
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| SpecialistError::Database(e.to_string()))?;
        Ok(())
    }
}
