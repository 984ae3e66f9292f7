use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub first_message: Option<String>,
    #[serde(default)]
    pub has_plan: bool,
    #[serde(default)]
    pub plan_id: Option<Uuid>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClientRequest {
    pub domain: Option<String>,
    pub name: Option<String>,
    pub contact: Option<String>,
    pub document: Option<String>,
    pub first_message: Option<String>,
    pub has_plan: Option<bool>,
    pub plan_id: Option<Uuid>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateClientRequest {
    pub domain: Option<String>,
    pub name: Option<String>,
    pub contact: Option<String>,
    pub document: Option<String>,
    pub first_message: Option<String>,
    pub has_plan: Option<bool>,
    pub plan_id: Option<Uuid>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("client not found")]
    NotFound,

    #[error("storage error: {0}")]
    Database(String),
}
