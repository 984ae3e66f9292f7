use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An insurance plan (convenio) a client may carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanRequest {
    pub domain: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePlanRequest {
    pub domain: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanError {
    #[error("plan not found")]
    NotFound,

    #[error("storage error: {0}")]
    Database(String),
}
