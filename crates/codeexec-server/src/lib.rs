//! HTTP front-end for the code execution engine
//!
//! Exposes `POST /api/execute`, `GET /api/languages` and `GET /health` over
//! axum. The handler only translates between JSON and the engine: request
//! validation, load shedding and the API key check happen here, everything
//! about sandboxes happens in `codeexec-core`.

pub mod auth;
pub mod error;

pub use auth::{ApiKeyCheck, API_KEY_HEADER};
pub use error::{ApiError, Result};

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Json as AxumJson, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};
use codeexec_core::{ErrorKind, ExecutionEngine, ExecutionError, ServiceConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Body of `POST /api/execute`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
    /// Falls back to the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Either `output` or `error` (with its `kind`) is set, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl ExecuteResponse {
    pub fn output(stdout: String) -> Self {
        Self {
            output: Some(stdout),
            error: None,
            kind: None,
        }
    }

    pub fn failure(err: &ExecutionError) -> Self {
        Self {
            output: None,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub runtime: String,
    pub runtime_available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub id: String,
    pub aliases: Vec<String>,
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LanguagesResponse {
    pub languages: Vec<LanguageInfo>,
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<HeaderValue>>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    pub enable_logging: bool,
    /// Executions in flight at once; further requests get 503.
    pub max_concurrent_executions: usize,
    pub default_timeout: Duration,
    pub max_timeout: Duration,
    pub api_key: ApiKeyCheck,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            enable_cors: false,
            cors_origins: None,
            max_body_size: 1024 * 1024, // 1MB
            enable_logging: true,
            max_concurrent_executions: 16,
            default_timeout: Duration::from_secs(5),
            max_timeout: Duration::from_secs(30),
            api_key: ApiKeyCheck::disabled(),
        }
    }
}

impl ServerConfig {
    /// Server settings from the `server`, `auth` and `execution` sections.
    pub fn from_service_config(config: &ServiceConfig) -> Result<Self> {
        let mut server = Self::default()
            .with_bind_addr_str(&config.server.bind_addr)?
            .with_cors(config.server.enable_cors)
            .with_max_body_size(config.server.max_body_bytes)
            .with_max_concurrent_executions(config.server.max_concurrent_executions)
            .with_timeouts(
                config.execution.default_timeout(),
                config.execution.max_timeout(),
            )
            .with_api_key(ApiKeyCheck::new(
                config.auth.enabled,
                config.auth.api_key.as_deref(),
            ));
        if let Some(origins) = &config.server.cors_origins {
            server = server.with_cors_origins(origins)?;
        }
        Ok(server)
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ApiError::config_error(format!("Invalid bind address '{}': {}", addr, e)))?;
        Ok(self)
    }

    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    pub fn with_cors_origins(mut self, origins: &[String]) -> Result<Self> {
        let origins = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|e| {
                    ApiError::config_error(format!("Invalid CORS origin '{}': {}", origin, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.cors_origins = Some(origins);
        Ok(self)
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    pub fn with_max_concurrent_executions(mut self, max: usize) -> Self {
        self.max_concurrent_executions = max.max(1);
        self
    }

    pub fn with_timeouts(mut self, default_timeout: Duration, max_timeout: Duration) -> Self {
        self.default_timeout = default_timeout;
        self.max_timeout = max_timeout;
        self
    }

    pub fn with_api_key(mut self, check: ApiKeyCheck) -> Self {
        self.api_key = check;
        self
    }

    fn resolve_timeout(&self, timeout_ms: Option<u64>) -> Result<Duration> {
        let Some(ms) = timeout_ms else {
            return Ok(self.default_timeout);
        };
        let timeout = Duration::from_millis(ms);
        if ms == 0 || timeout > self.max_timeout {
            return Err(ApiError::InvalidTimeout(format!(
                "timeout_ms must be between 1 and {}",
                self.max_timeout.as_millis()
            )));
        }
        Ok(timeout)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ExecutionEngine>,
    pub config: Arc<ServerConfig>,
    pub limiter: Arc<Semaphore>,
}

/// Handler for `POST /api/execute`.
async fn execute_handler(
    State(state): State<AppState>,
    payload: std::result::Result<AxumJson<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>> {
    let AxumJson(request) = payload.map_err(|rejection| {
        log::debug!("Rejected execute body: {}", rejection);
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::InvalidBody
        }
    })?;

    let language = request.language.trim();
    if language.is_empty() {
        return Err(ApiError::MissingLanguage);
    }
    if !state.engine.registry().is_supported(language) {
        return Err(ApiError::UnsupportedLanguage(request.language.clone()));
    }
    if request.code.trim().is_empty() {
        return Err(ApiError::MissingCode);
    }
    let timeout = state.config.resolve_timeout(request.timeout_ms)?;

    let _permit = Arc::clone(&state.limiter)
        .try_acquire_owned()
        .map_err(|_| ApiError::Busy)?;

    match state
        .engine
        .execute_code(&request.code, language, timeout)
        .await
    {
        Ok(stdout) => Ok(Json(ExecuteResponse::output(stdout))),
        Err(e) if e.kind().is_user_error() => Ok(Json(ExecuteResponse::failure(&e))),
        Err(e) => Err(e.into()),
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Handler for `GET /api/languages`.
async fn languages_handler(State(state): State<AppState>) -> Json<LanguagesResponse> {
    let languages = state
        .engine
        .registry()
        .languages()
        .iter()
        .map(|profile| LanguageInfo {
            id: profile.id.clone(),
            aliases: profile.aliases.clone(),
            image: profile.image.clone(),
        })
        .collect();
    Json(LanguagesResponse { languages })
}

/// Handler for `GET /health`. Degraded (503) when the sandbox runtime does not answer.
async fn health_handler(State(state): State<AppState>) -> Response {
    let runtime = state.engine.runtime();
    let runtime_available = match runtime.ping().await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Sandbox runtime {} is unavailable: {}", runtime.name(), e);
            false
        }
    };
    let (status, label) = if runtime_available {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let body = HealthResponse {
        status: label.to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        runtime: runtime.name().to_string(),
        runtime_available,
    };
    (status, Json(body)).into_response()
}

/// The execution API server.
pub struct ApiServer {
    engine: Arc<ExecutionEngine>,
    config: ServerConfig,
}

impl ApiServer {
    pub fn with_config(engine: Arc<ExecutionEngine>, config: ServerConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            engine: Arc::clone(&self.engine),
            config: Arc::new(self.config.clone()),
            limiter: Arc::new(Semaphore::new(self.config.max_concurrent_executions)),
        };

        let api = Router::new()
            .route(
                "/execute",
                post(execute_handler).fallback(method_not_allowed),
            )
            .route("/languages", get(languages_handler))
            .route_layer(middleware::from_fn_with_state(
                Arc::new(self.config.api_key.clone()),
                auth::require_api_key,
            ));

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .nest("/api", api)
            .with_state(state)
            .layer(DefaultBodyLimit::max(self.config.max_body_size));

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(
                |request: axum::http::Request<axum::body::Body>, next: axum::middleware::Next| async {
                    let request_id = uuid::Uuid::new_v4().to_string();
                    let method = request.method().clone();
                    let uri = request.uri().clone();

                    // Health probes are frequent
                    let quiet = uri.path() == "/health";
                    if quiet {
                        log::debug!("Request {} {} {}", request_id, method, uri);
                    } else {
                        log::info!("Request {} {} {}", request_id, method, uri);
                    }

                    let start = std::time::Instant::now();
                    let response = next.run(request).await;
                    let duration = start.elapsed();

                    if quiet {
                        log::debug!("Response {} {} in {:?}", request_id, response.status(), duration);
                    } else {
                        log::info!("Response {} {} in {:?}", request_id, response.status(), duration);
                    }
                    response
                },
            ));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors_layer = match &self.config.cors_origins {
                Some(origins) => CorsLayer::new()
                    .allow_origin(origins.clone())
                    .allow_methods(Any)
                    .allow_headers(Any),
                None => CorsLayer::permissive(),
            };
            router = router.layer(cors_layer);
        }

        router
    }

    /// Start the server with graceful shutdown support.
    ///
    /// In-flight executions finish (and release their sandboxes) before this returns.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ApiError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!("codeexec server listening on {}", self.config.bind_addr);
        log::info!("Execute endpoint: http://{}/api/execute", self.config.bind_addr);
        log::info!("Health check: http://{}/health", self.config.bind_addr);
        if self.config.api_key.is_enabled() {
            log::info!("API key checking enabled for /api routes");
        }

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ApiError::internal(format!("Server error: {}", e)))?;

        log::info!("codeexec server shut down gracefully");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use codeexec_core::{FakeRun, FakeSandbox};
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `oneshot`

    fn server_with(fake: FakeSandbox, config: ServerConfig) -> (Router, Arc<FakeSandbox>) {
        let fake = Arc::new(fake);
        let engine = Arc::new(ExecutionEngine::with_defaults(fake.clone()));
        let server = ApiServer::with_config(engine, config.with_logging(false));
        (server.build_router(), fake)
    }

    fn router(fake: FakeSandbox) -> (Router, Arc<FakeSandbox>) {
        server_with(fake, ServerConfig::default())
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/execute")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_execute_returns_output() {
        let (app, fake) = router(FakeSandbox::passing_check(FakeRun::success("Hello, World!\n")));
        let (status, body) = send(
            app,
            post_json(json!({"code": "print('Hello, World!')", "language": "python"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"output": "Hello, World!"}));
        assert_eq!(fake.live_instances(), 0);
    }

    #[tokio::test]
    async fn test_non_post_is_rejected() {
        let (app, _) = router(FakeSandbox::always(FakeRun::default()));
        let (status, body) = send(
            app,
            Request::builder()
                .method("GET")
                .uri("/api/execute")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "method not allowed");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (app, fake) = router(FakeSandbox::always(FakeRun::default()));
        let request = Request::builder()
            .method("POST")
            .uri("/api/execute")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid request body");
        assert_eq!(fake.stage_count(), 0);
    }

    #[tokio::test]
    async fn test_request_validation_order() {
        let cases = [
            (json!({"code": "print(1)"}), "language not specified"),
            (json!({"code": "puts 1", "language": "ruby"}), "unsupported language: ruby"),
            (json!({"code": "", "language": "python"}), "code not provided"),
        ];
        for (payload, expected) in cases {
            let (app, fake) = router(FakeSandbox::always(FakeRun::default()));
            let (status, body) = send(app, post_json(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], expected);
            assert_eq!(fake.stage_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_timeout_bounds() {
        for timeout_ms in [0u64, 60_000] {
            let (app, _) = router(FakeSandbox::always(FakeRun::default()));
            let (status, body) = send(
                app,
                post_json(json!({"code": "print(1)", "language": "python", "timeout_ms": timeout_ms})),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["kind"], "invalid_timeout");
        }
    }

    #[tokio::test]
    async fn test_user_code_failure_is_200_with_error() {
        let (app, _) = router(FakeSandbox::by_purpose(
            FakeRun::exit(1, "SyntaxError: unterminated string literal"),
            FakeRun::default(),
        ));
        let (status, body) = send(
            app,
            post_json(json!({"code": "print('Hello, World!", "language": "python"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.get("output").is_none());
        assert_eq!(body["kind"], "syntax_error");
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("syntax check failed"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let (app, fake) = router(FakeSandbox::passing_check(
            FakeRun::default().lasting(Duration::from_secs(30)),
        ));
        let (status, body) = send(
            app,
            post_json(json!({"code": "while True: pass", "language": "py", "timeout_ms": 50})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "timeout");
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("container execution timed out after"));
        assert_eq!(fake.kill_count(), 1);
    }

    #[tokio::test]
    async fn test_infra_failure_is_500() {
        let (app, _) = router(FakeSandbox::passing_check(FakeRun::stage_failure(
            "Cannot connect to the Docker daemon",
        )));
        let (status, body) = send(
            app,
            post_json(json!({"code": "print(1)", "language": "python"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["kind"], "infra_error");
    }

    #[tokio::test]
    async fn test_api_key_checks() {
        let missing_key = ServerConfig::default().with_api_key(ApiKeyCheck::new(true, None));
        let (app, _) = server_with(FakeSandbox::always(FakeRun::default()), missing_key);
        let (status, body) = send(
            app,
            post_json(json!({"code": "print(1)", "language": "python"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "API key not set");

        let config = ServerConfig::default().with_api_key(ApiKeyCheck::new(true, Some("s3cret")));
        let (app, fake) = server_with(FakeSandbox::passing_check(FakeRun::success("1")), config);

        let (status, body) = send(
            app.clone(),
            post_json(json!({"code": "print(1)", "language": "python"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(fake.stage_count(), 0);

        let mut authorized = post_json(json!({"code": "print(1)", "language": "python"}));
        authorized
            .headers_mut()
            .insert(API_KEY_HEADER, "s3cret".parse().unwrap());
        let (status, body) = send(app.clone(), authorized).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], "1");

        // Health stays open for probes.
        let (status, _) = send(
            app,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_saturation_returns_503() {
        let config = ServerConfig::default().with_max_concurrent_executions(1);
        let (app, _) = server_with(
            FakeSandbox::passing_check(FakeRun::success("slow").lasting(Duration::from_millis(300))),
            config,
        );

        let first = tokio::spawn(send(
            app.clone(),
            post_json(json!({"code": "print(1)", "language": "python"})),
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let (status, body) = send(
            app,
            post_json(json!({"code": "print(2)", "language": "python"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "busy");

        let (status, body) = first.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], "slow");
    }

    #[tokio::test]
    async fn test_health_and_languages() {
        let (app, _) = router(FakeSandbox::always(FakeRun::default()));
        let (status, body) = send(
            app.clone(),
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["runtime"], "fake");
        assert_eq!(body["runtime_available"], true);

        let (status, body) = send(
            app,
            Request::builder()
                .uri("/api/languages")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body["languages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["python", "javascript"]);
    }

    #[test]
    fn test_config_from_service_config() {
        let mut service = ServiceConfig::default();
        service.server.bind_addr = "127.0.0.1:9000".to_string();
        service.auth.enabled = true;
        service.auth.api_key = Some("k".to_string());
        let config = ServerConfig::from_service_config(&service).unwrap();
        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 9000)));
        assert!(config.api_key.is_enabled());
        assert_eq!(config.max_timeout, Duration::from_secs(30));

        service.server.bind_addr = "not-an-address".to_string();
        assert!(ServerConfig::from_service_config(&service).is_err());
    }

    #[test]
    fn test_cors_origins_from_service_config() {
        let mut service = ServiceConfig::default();
        service.server.enable_cors = true;
        service.server.cors_origins = Some(vec!["https://app.example".to_string()]);
        let config = ServerConfig::from_service_config(&service).unwrap();
        assert_eq!(
            config.cors_origins,
            Some(vec![HeaderValue::from_static("https://app.example")])
        );

        service.server.cors_origins = Some(vec!["bad\norigin".to_string()]);
        let err = ServerConfig::from_service_config(&service).unwrap_err();
        assert!(err.to_string().contains("Invalid CORS origin"));
    }

    #[tokio::test]
    async fn test_cors_allows_only_listed_origins() {
        let config = ServerConfig::default()
            .with_cors(true)
            .with_cors_origins(&["https://app.example".to_string()])
            .unwrap();
        let (app, _) = server_with(FakeSandbox::always(FakeRun::default()), config);

        let health_from = |origin: &'static str| {
            Request::builder()
                .uri("/health")
                .header("origin", origin)
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app
            .clone()
            .oneshot(health_from("https://app.example"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers().get("access-control-allow-origin"),
            Some(&HeaderValue::from_static("https://app.example"))
        );

        let other = app.oneshot(health_from("https://other.example")).await.unwrap();
        assert!(other.headers().get("access-control-allow-origin").is_none());
    }
}
