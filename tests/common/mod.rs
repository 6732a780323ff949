//! Shared setup for the HTTP tests: an in-memory store, the identity and
//! vision services mocked with wiremock, and locally signed bearer tokens.

pub mod fixtures;

use std::sync::{Arc, Once};

use actix_web::web;
use dermalens::config::Config;
use dermalens::state::AppState;
use dermalens::utils::auth::{SupabaseAuth, TokenVerifier};
use dermalens::utils::database::ProfileStore;
use dermalens::utils::database::sqlite::SqliteStore;
use dermalens::utils::openai::{OpenAiVision, VisionModel};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use tracing::Level;
use uuid::Uuid;
use wiremock::MockServer;

pub const JWT_SECRET: &str = "test-jwt-secret-with-at-least-thirty-two-chars";

static INIT: Once = Once::new();

/// Initialize tracing once for the whole test binary.
pub fn init() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .init();
    });
}

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub server: MockServer,
}

/// Build the application state against a fresh mock server. `vision` turns the
/// hosted model on, pointed at the same server.
pub async fn context(vision: bool, max_file_size: usize) -> TestContext {
    init();
    let server = MockServer::start().await;

    let config = Config::from_pairs(vec![
        ("SUPABASE_URL".to_string(), server.uri()),
        ("SUPABASE_ANON_KEY".to_string(), "anon-key".to_string()),
        ("SUPABASE_SERVICE_KEY".to_string(), "service-key".to_string()),
        ("SUPABASE_JWT_SECRET".to_string(), JWT_SECRET.to_string()),
        ("STORE_BACKEND".to_string(), "sqlite".to_string()),
        ("MAX_FILE_SIZE".to_string(), max_file_size.to_string()),
    ])
    .unwrap();

    let client = reqwest::Client::new();
    let store: Arc<dyn ProfileStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let auth = Arc::new(SupabaseAuth::new(
        client.clone(),
        server.uri(),
        "anon-key",
    ));
    let verifier = TokenVerifier::new(auth.clone(), Some(JWT_SECRET));
    let vision: Option<Arc<dyn VisionModel>> = vision.then(|| {
        Arc::new(OpenAiVision::new(client, server.uri(), "sk-test", "gpt-4o")) as Arc<dyn VisionModel>
    });

    let state = AppState::new(config, store, auth, verifier, vision, None);
    TestContext {
        state: web::Data::new(state),
        server,
    }
}

/// A bearer token the local verifier accepts for `user_id`.
pub fn token_for(user_id: Uuid) -> String {
    let claims = json!({
        "sub": user_id.to_string(),
        "email": fixtures::EMAIL,
        "aud": "authenticated",
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn bearer(user_id: Uuid) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token_for(user_id)))
}
