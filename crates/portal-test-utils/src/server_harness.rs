//! Test server harness for E2E testing
//!
//! Provides `TestPortalServer` for spawning real portal instances in tests,
//! wired to a `MockIdp`.

use crate::mock_idp::MockIdp;
use crate::token_builders::{TEST_CLIENT_ID, TEST_REALM};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use portal_service::config::Config;
use portal_service::observability::metrics::init_metrics_recorder;
use portal_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics handle shared by every test server in the process.
///
/// Installs the global recorder on first use; if another recorder already
/// owns the slot, falls back to a standalone one.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Configuration variables pointing the portal at `idp`.
pub fn test_config_vars(idp: &MockIdp) -> HashMap<String, String> {
    HashMap::from([
        ("KEYCLOAK_URL".to_string(), idp.base_url()),
        ("KEYCLOAK_REALM".to_string(), TEST_REALM.to_string()),
        ("KEYCLOAK_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("IDP_HTTP_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ("SESSION_COOKIE_SECURE".to_string(), "false".to_string()),
    ])
}

/// Test harness for spawning the portal in E2E tests.
///
/// # Example
/// ```rust,ignore
/// let idp = MockIdp::start().await;
/// let server = TestPortalServer::spawn(&idp).await?;
///
/// let response = server.client().get(format!("{}/health", server.url())).send().await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestPortalServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestPortalServer {
    /// Spawn a portal with default test configuration.
    pub async fn spawn(idp: &MockIdp) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(test_config_vars(idp)).await
    }

    /// Spawn a portal from explicit configuration variables.
    ///
    /// The server binds to a random available port (127.0.0.1:0).
    pub async fn spawn_with_vars(vars: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(
            AppState::from_config(config)
                .map_err(|e| anyhow::anyhow!("Failed to create app state: {}", e))?,
        );

        let app = routes::build_routes(state.clone(), test_metrics_handle());

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

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build test client: {}", e))?;

        Ok(Self {
            addr,
            state,
            client,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state (session store, JWKS cache, config).
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// HTTP client that does not follow redirects.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Drop for TestPortalServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

/// Extract the `name=value` pair from a `Set-Cookie` header value.
pub fn cookie_pair(set_cookie: &str) -> Option<&str> {
    set_cookie.split(';').next().map(str::trim)
}
