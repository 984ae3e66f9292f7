use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use shared_database::PostgrestClient;

use crate::models::{Client, ClientError, CreateClientRequest, UpdateClientRequest};

pub struct ClientService {
    db: Arc<PostgrestClient>,
}

impl ClientService {
    pub fn new(db: Arc<PostgrestClient>) -> Self {
        Self { db }
    }

    pub async fn list(&self, auth_token: &str) -> Result<Vec<Client>, ClientError> {
        self.db
            .request(
                Method::GET,
                "/rest/v1/clients?order=name.asc",
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| ClientError::Database(e.to_string()))
    }

    pub async fn get(&self, id: Uuid, auth_token: &str) -> Result<Client, ClientError> {
        let path = format!("/rest/v1/clients?id=eq.{}", id);
        let rows: Vec<Client> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ClientError::Database(e.to_string()))?;
        rows.into_iter().next().ok_or(ClientError::NotFound)
    }

    pub async fn create(
        &self,
        request: &CreateClientRequest,
        auth_token: &str,
    ) -> Result<Client, ClientError> {
        // A client without a plan never stores a dangling plan id.
        let has_plan = request.has_plan.unwrap_or(false);
        let plan_id = if has_plan { request.plan_id } else { None };

        let body = json!({
            "name": request.name,
            "contact": request.contact,
            "document": request.document,
            "first_message": request.first_message,
            "has_plan": has_plan,
            "plan_id": plan_id,
            "birth_date": request.birth_date,
        });

        let rows: Vec<Client> = self
            .with_representation(Method::POST, "/rest/v1/clients", Some(body), auth_token)
            .await?;
        let client = rows
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Database("insert returned no row".into()))?;

        info!("client {} created", client.id);
        Ok(client)
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: &UpdateClientRequest,
        auth_token: &str,
    ) -> Result<Client, ClientError> {
        let mut fields = Map::new();
        if let Some(name) = &request.name {
            fields.insert("name".into(), json!(name));
        }
        if let Some(contact) = &request.contact {
            fields.insert("contact".into(), json!(contact));
        }
        if let Some(document) = &request.document {
            fields.insert("document".into(), json!(document));
        }
        if let Some(first_message) = &request.first_message {
            fields.insert("first_message".into(), json!(first_message));
        }
        if let Some(has_plan) = request.has_plan {
            fields.insert("has_plan".into(), json!(has_plan));
            if !has_plan {
                fields.insert("plan_id".into(), Value::Null);
            }
        }
        if let Some(plan_id) = request.plan_id {
            fields.insert("plan_id".into(), json!(plan_id));
        }
        if let Some(birth_date) = request.birth_date {
            fields.insert("birth_date".into(), json!(birth_date));
        }

        let path = format!("/rest/v1/clients?id=eq.{}", id);
        let rows: Vec<Client> = self
            .with_representation(Method::PATCH, &path, Some(Value::Object(fields)), auth_token)
            .await?;

        rows.into_iter().next().ok_or(ClientError::NotFound)
    }

    pub async fn delete(&self, id: Uuid, auth_token: &str) -> Result<(), ClientError> {
        let path = format!("/rest/v1/clients?id=eq.{}", id);
        let rows: Vec<Value> = self
            .with_representation(Method::DELETE, &path, None, auth_token)
            .await?;
        if rows.is_empty() {
            return Err(ClientError::NotFound);
        }
        info!("client {} deleted", id);
        Ok(())
    }

    async fn with_representation<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        auth_token: &str,
    ) -> Result<T, ClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        self.db
            .request_with_headers(method, path, Some(auth_token), body, Some(headers))
            .await
            .map_err(|e| ClientError::Database(e.to_string()))
    }
}
