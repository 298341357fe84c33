//! Common test utilities for E2E tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tempfile::TempDir;
use tokio::net::TcpListener;

use waypost::config;
use waypost::data::{EntityId, User};
use waypost::federation::actor::generate_actor_id;
use waypost::{build_router, AppState};

static INIT_METRICS: Once = Once::new();

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        INIT_METRICS.call_once(waypost::metrics::init_metrics);

        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                domain: "test.example.com".to_string(),
                protocol: "https".to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            federation: config::FederationConfig {
                request_timeout_seconds: 5,
                reconcile_enabled: false,
                reconcile_interval_seconds: 300,
                reconcile_batch_size: 50,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let state = AppState::new(config).await.unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a local user with a real (small, test-sized) RSA key pair.
    pub async fn create_test_user(&self, username: &str) -> User {
        use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

        let mut rng = rand::thread_rng();
        let private_key = rsa::RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public_key_pem = rsa::RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let private_key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .unwrap()
            .to_string();

        let now = Utc::now();
        let user = User {
            id: EntityId::new().0,
            username: username.to_string(),
            display_name: Some("Test User".to_string()),
            avatar_url: None,
            actor_id: generate_actor_id("https://test.example.com", username),
            public_key_pem,
            created_at: now,
            updated_at: now,
        };

        self.state
            .db
            .insert_user(&user, &private_key_pem)
            .await
            .unwrap();
        user
    }
}

struct PeerState {
    base: String,
    inbox_posts: Mutex<Vec<serde_json::Value>>,
    fail_inbox: AtomicBool,
}

/// Throwaway remote ActivityPub server double.
///
/// Serves actor documents for any username and records everything posted to
/// the matching inboxes. Can be switched into a failing mode to exercise
/// delivery-failure paths.
pub struct RemotePeer {
    state: Arc<PeerState>,
}

impl RemotePeer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let state = Arc::new(PeerState {
            base: base.clone(),
            inbox_posts: Mutex::new(Vec::new()),
            fail_inbox: AtomicBool::new(false),
        });

        let app = Router::new()
            .route(
                "/users/:username",
                get(
                    |State(state): State<Arc<PeerState>>, Path(username): Path<String>| async move {
                        let actor_id = format!("{}/users/{}", state.base, username);
                        Json(serde_json::json!({
                            "id": actor_id,
                            "type": "Person",
                            "preferredUsername": username,
                            "inbox": format!("{}/inbox", actor_id),
                        }))
                    },
                ),
            )
            .route(
                "/users/:username/inbox",
                post(
                    |State(state): State<Arc<PeerState>>, body: String| async move {
                        if state.fail_inbox.load(Ordering::SeqCst) {
                            return StatusCode::INTERNAL_SERVER_ERROR;
                        }
                        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
                        state.inbox_posts.lock().unwrap().push(value);
                        StatusCode::ACCEPTED
                    },
                ),
            )
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { state }
    }

    pub fn actor_id(&self, username: &str) -> String {
        format!("{}/users/{}", self.state.base, username)
    }

    pub fn inbox_posts(&self) -> Vec<serde_json::Value> {
        self.state.inbox_posts.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.fail_inbox.store(failing, Ordering::SeqCst);
    }
}

/// Build an inbound Follow payload as a remote server would send it.
pub fn follow_json(follow_id: &str, follower_actor: &str, target_actor: &str) -> serde_json::Value {
    serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": follow_id,
        "type": "Follow",
        "actor": follower_actor,
        "object": target_actor,
    })
}
