// Tenant directory resolution: the lookup ladder and the injected cache.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::{DbError, InMemoryCache, SharedCache, TenantDirectory};

fn config(directory_url: String) -> AppConfig {
    AppConfig {
        tenant_directory_url: directory_url,
        tenant_directory_api_key: "directory-key".to_string(),
        jwt_secret: "test-secret".to_string(),
        listen_port: 0,
        tenant_cache_ttl_secs: 300,
        storage_timeout_secs: 5,
        suggestion_horizon_days: 14,
        suggestion_count: 3,
        revalidate_on_update: true,
    }
}

fn directory(server: &MockServer) -> TenantDirectory {
    let cache: Arc<dyn SharedCache> = Arc::new(InMemoryCache::new());
    TenantDirectory::new(&config(server.uri()), cache)
}

fn tenant_row(domain: &str) -> serde_json::Value {
    json!([{
        "domain": domain,
        "base_url": format!("https://{}.storage.example", domain),
        "api_key": "tenant-key",
    }])
}

#[tokio::test]
async fn resolves_an_exact_domain_match() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tenants"))
        .and(query_param("domain", "eq.clinic.example"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tenant_row("clinic.example")))
        .mount(&server)
        .await;

    let handle = directory(&server).resolve("clinic.example").await.unwrap();
    assert_eq!(handle.base_url, "https://clinic.example.storage.example");
}

#[tokio::test]
async fn bare_name_falls_back_to_dot_com() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tenants"))
        .and(query_param("domain", "eq.clinic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tenants"))
        .and(query_param("domain", "eq.clinic.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tenant_row("clinic.com")))
        .mount(&server)
        .await;

    let handle = directory(&server).resolve("clinic").await.unwrap();
    assert_eq!(handle.domain, "clinic.com");
}

#[tokio::test]
async fn falls_back_to_prefix_match_as_a_last_resort() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tenants"))
        .and(query_param("domain", "eq.clinic.example"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/tenants"))
        .and(query_param("domain", "ilike.clinic.example*"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(tenant_row("clinic.example.branch")),
        )
        .mount(&server)
        .await;

    let handle = directory(&server).resolve("clinic.example").await.unwrap();
    assert_eq!(handle.domain, "clinic.example.branch");
}

#[tokio::test]
async fn unknown_domain_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/tenants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = directory(&server).resolve("nowhere.example").await;
    assert!(matches!(result, Err(DbError::NotFound(_))));
}

#[tokio::test]
async fn resolved_handles_are_served_from_the_cache() {
    let server = MockServer::start().await;

    // The directory may be consulted exactly once.
    Mock::given(method("GET"))
        .and(path("/rest/v1/tenants"))
        .and(query_param("domain", "eq.clinic.example"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tenant_row("clinic.example")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = directory(&server);
    let first = dir.resolve("clinic.example").await.unwrap();
    let second = dir.resolve("Clinic.Example").await.unwrap();
    assert_eq!(first.base_url, second.base_url);
}
