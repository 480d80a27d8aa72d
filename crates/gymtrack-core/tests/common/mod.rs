// Helpers shared by the integration test binaries; not every binary uses all of them.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use gymtrack_core::api::HttpTransport;
use gymtrack_core::auth::{MemoryTokenStore, StoredSession, TokenPair, TokenStore};
use gymtrack_core::models::User;
use gymtrack_core::SessionManager;
use httpmock::MockServer;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

/// Route library logs through the test harness. Use RUST_LOG=debug to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ana() -> User {
    User {
        id: "1".to_string(),
        name: "Ana".to_string(),
        email: "a@b.com".to_string(),
        avatar: None,
    }
}

pub fn ana_json() -> Value {
    json!({ "id": "1", "name": "Ana", "email": "a@b.com" })
}

pub fn exercise_json(id: u32, name: &str, group: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "group": group,
        "series": 3,
        "repetitions": 12,
        "demo": format!("{}.gif", id),
        "thumb": format!("{}.png", id),
    })
}

pub fn manager(server: &MockServer, store: Arc<dyn TokenStore>) -> SessionManager {
    init_tracing();
    let http = HttpTransport::new(&server.base_url(), Duration::from_secs(5)).expect("transport");
    SessionManager::new(http, store)
}

/// A manager restored from a stored session holding `token`.
pub fn signed_in(
    server: &MockServer,
    token: &str,
    refresh_token: Option<&str>,
) -> (SessionManager, Arc<MemoryTokenStore>) {
    let store = Arc::new(MemoryTokenStore::new());
    store
        .save(&StoredSession::new(
            TokenPair::new(token, refresh_token.map(str::to_string)),
            ana(),
        ))
        .expect("seed store");

    let session = manager(server, store.clone());
    let state = session.bootstrap().expect("bootstrap");
    assert!(state.is_authenticated());
    (session, store)
}

pub fn stored_tokens(store: &dyn TokenStore) -> Option<TokenPair> {
    store.load().expect("load store").map(|s| s.tokens)
}
