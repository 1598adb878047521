#![allow(dead_code)]

use std::sync::Arc;

use flowdesk_api::auth::tokens;
use flowdesk_api::config::Config;
use flowdesk_api::db::memory::MemoryStore;
use flowdesk_api::models::user::{Principal, Role};
use flowdesk_api::AppState;
use flowdesk_common::SnowflakeGenerator;

pub const TEST_SECRET: &str = "flowdesk-test-secret";

pub fn test_config() -> Config {
    Config {
        database_url: None,
        jwt_secret: TEST_SECRET.to_string(),
        port: 0,
        token_ttl_secs: 3600,
    }
}

/// Build an AppState over a fresh in-memory store with the public
/// conversation already bootstrapped.
pub async fn test_state() -> AppState {
    let store = Arc::new(MemoryStore::new(Arc::new(SnowflakeGenerator::new(0))));
    let state = AppState::new(test_config(), store);
    state.bootstrap().await.expect("bootstrap");
    state
}

pub fn principal(id: &str, name: &str) -> Principal {
    Principal {
        id: id.to_string(),
        name: name.to_string(),
        role: Role::Reviewer,
        email: None,
    }
}

/// Mint a bearer credential signed with the test secret.
pub fn token_for(id: &str, name: &str) -> String {
    tokens::mint_token(TEST_SECRET, &principal(id, name), 3600).expect("mint test token")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// An in-process HTTP test server over the full router.
pub async fn test_server() -> (axum_test::TestServer, AppState) {
    let state = test_state().await;
    let app = flowdesk_api::routes::router().with_state(state.clone());
    let server = axum_test::TestServer::new(app).unwrap();
    (server, state)
}
