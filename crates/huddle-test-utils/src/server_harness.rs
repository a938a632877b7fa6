//! Test server harness for HTTP tests
//!
//! Provides `TestHuddleServer`: the real router over in-memory stores, on a
//! random local port.

use crate::identity::StaticIdentityVerifier;
use common::ids::SequentialGenerator;
use huddle_service::auth::IdentityVerifier;
use huddle_service::config::Config;
use huddle_service::observability::metrics::init_metrics_recorder;
use huddle_service::repositories::memory::MemoryStores;
use huddle_service::routes::{self, AppState};
use huddle_service::services::Services;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Recorder shared by every test server in the process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Config vars every test server starts from.
pub fn test_config_vars() -> HashMap<String, String> {
    HashMap::from([
        (
            "DATABASE_URL".to_string(),
            "postgresql://test/test".to_string(),
        ),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        (
            "IDP_JWKS_URL".to_string(),
            "http://localhost:8082/.well-known/jwks.json".to_string(),
        ),
    ])
}

/// Test harness for spawning the Huddle server.
///
/// # Example
/// ```rust,ignore
/// let server = TestHuddleServer::spawn().await?;
/// let token = server.register("u-alice", "alice").await?;
/// ```
pub struct TestHuddleServer {
    addr: SocketAddr,
    config: Config,
    memory: MemoryStores,
    tokens: Arc<StaticIdentityVerifier>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestHuddleServer {
    /// Spawn with default config and static tokens.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(&[]).await
    }

    /// Spawn with extra config vars (e.g. `DEFAULT_INVITE_QUOTA`).
    pub async fn spawn_with_vars(overrides: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let tokens = Arc::new(StaticIdentityVerifier::new());
        Self::spawn_inner(overrides, tokens.clone(), tokens).await
    }

    /// Spawn with a caller-provided verifier (e.g. the real JWT verifier
    /// against a mocked provider). `issue_token` is unavailable for it.
    pub async fn spawn_with_verifier(
        overrides: &[(&str, &str)],
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, anyhow::Error> {
        Self::spawn_inner(overrides, Arc::new(StaticIdentityVerifier::new()), verifier).await
    }

    async fn spawn_inner(
        overrides: &[(&str, &str)],
        tokens: Arc<StaticIdentityVerifier>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = test_config_vars();
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let memory = MemoryStores::new();
        let stores = memory.stores();
        let services = Services::new(
            stores.clone(),
            Arc::new(SequentialGenerator::new("id")),
            &config,
        );

        let state = Arc::new(AppState {
            config: config.clone(),
            services,
            stores,
            pool: None,
            verifier,
        });

        let app = routes::build_routes(state, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            memory,
            tokens,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Backing stores, for seeding and fault injection.
    pub fn memory(&self) -> &MemoryStores {
        &self.memory
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Token that verifies as `subject`. No account is created.
    pub fn issue_token(&self, subject: &str) -> String {
        self.tokens.issue(subject)
    }

    /// Register an account through the API and return its token.
    pub async fn register(&self, subject: &str, display_name: &str) -> Result<String, anyhow::Error> {
        let token = self.issue_token(subject);
        let response = self
            .client
            .post(format!("{}/api/v1/accounts", self.url()))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "display_name": display_name }))
            .send()
            .await?;

        anyhow::ensure!(
            response.status() == reqwest::StatusCode::CREATED,
            "registration of {} failed with {}",
            subject,
            response.status()
        );
        Ok(token)
    }
}

impl Drop for TestHuddleServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
