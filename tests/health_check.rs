//! Integration tests for the account service server

use std::net::TcpListener;
use std::sync::Arc;

use account_service::configuration::AuthSettings;
use account_service::startup::{build_services, run};
use account_service::store::InMemoryStore;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let auth = AuthSettings {
        access_token_secret: "access-secret".to_string(),
        access_token_expiry: 900,
        refresh_token_secret: "refresh-secret".to_string(),
        refresh_token_expiry: 864000,
        issuer: "test".to_string(),
        password_cost: 4,
    };
    let (sessions, accounts) = build_services(Arc::new(InMemoryStore::new()), &auth);
    let server = run(listener, sessions, accounts).expect("Failed to create server");

    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().get("x-request-id").is_some());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_route_without_token_returns_401() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/api/v1/users/me", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
    assert!(response.headers().get("x-request-id").is_some());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Unauthorized request");
}
