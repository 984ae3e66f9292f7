use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialist {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub working_hours: Option<Value>,
    #[serde(default)]
    pub consultation_fee: Option<f64>,
    #[serde(default)]
    pub accepts_plan: bool,
    #[serde(default)]
    pub consultation_minutes: i32,
    #[serde(default)]
    pub managed_agenda: bool,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSpecialistRequest {
    pub domain: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub working_hours: Option<Value>,
    pub consultation_fee: Option<f64>,
    pub accepts_plan: Option<bool>,
    pub consultation_minutes: Option<i32>,
    pub managed_agenda: Option<bool>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSpecialistRequest {
    pub domain: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub working_hours: Option<Value>,
    pub consultation_fee: Option<f64>,
    pub accepts_plan: Option<bool>,
    pub consultation_minutes: Option<i32>,
    pub managed_agenda: Option<bool>,
    pub color: Option<String>,
}

/// One row of the specialist/plan acceptance relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanAcceptance {
    pub plan_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcceptPlanRequest {
    pub domain: Option<String>,
    pub plan_id: Option<Uuid>,
}

/// Booking policy for one (specialist, plan) pair: daily cap and minimum
/// advance notice in days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaPolicy {
    pub plan_id: Uuid,
    #[serde(default)]
    pub max_daily: i32,
    #[serde(default)]
    pub min_lead_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertPolicyRequest {
    pub domain: Option<String>,
    pub plan_id: Option<Uuid>,
    pub max_daily: Option<i32>,
    pub min_lead_days: Option<i64>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SpecialistError {
    #[error("specialist not found")]
    NotFound,

    #[error("storage error: {0}")]
    Database(String),
}
