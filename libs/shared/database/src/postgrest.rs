use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::tenant::TenantHandle;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("constraint violation: {constraint}")]
    Conflict { constraint: String },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("storage authentication rejected: {0}")]
    Unauthorized(String),

    #[error("storage error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode storage response: {0}")]
    Decode(String),
}

/// Thin client over a PostgREST endpoint. Every tenant exposes one; the
/// central tenant directory is read through the same client.
pub struct PostgrestClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PostgrestClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn for_tenant(handle: &TenantHandle, timeout_secs: u64) -> Self {
        Self::new(handle.base_url.clone(), handle.api_key.clone(), timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None)
            .await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("storage request {} {}", method, url);

        let mut headers = self.headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("storage error ({}): {}", status, error_text);
            return Err(classify_failure(status, &error_text));
        }

        let data = response
            .json::<T>()
            .await
            .map_err(|e| DbError::Decode(e.to_string()))?;
        Ok(data)
    }
}

fn classify_failure(status: StatusCode, body: &str) -> DbError {
    let message = postgrest_message(body).unwrap_or_else(|| body.to_string());

    match status.as_u16() {
        409 => DbError::Conflict {
            constraint: constraint_name(&message).unwrap_or_else(|| message.clone()),
        },
        401 | 403 => DbError::Unauthorized(message),
        404 => DbError::NotFound(message),
        _ => DbError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// PostgREST error bodies are `{"code": ..., "message": ..., "details": ...}`.
fn postgrest_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Pulls the quoted constraint name out of a Postgres violation message,
/// e.g. `... violates exclusion constraint "appointments_specialist_no_overlap"`.
fn constraint_name(message: &str) -> Option<String> {
    let (_, tail) = message.split_once("constraint \"")?;
    let (name, _) = tail.split_once('"')?;
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_constraint_name_from_violation_message() {
        let msg = "conflicting key value violates exclusion constraint \"appointments_specialist_no_overlap\"";
        assert_eq!(
            constraint_name(msg).as_deref(),
            Some("appointments_specialist_no_overlap")
        );
    }

    #[test]
    fn falls_back_when_no_constraint_quoted() {
        assert_eq!(constraint_name("duplicate key value"), None);
    }
}
