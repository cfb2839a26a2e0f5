//! HTTP transport: listener configuration, routing and serving.

use crate::config::env_flag;
use crate::constants::{API_PREFIX, DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT};
use crate::handlers;
use crate::server::AppState;
use crate::shutdown::{SharedShutdownController, ShutdownPhase};
use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use std::future::IntoFuture;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Enable CORS.
    pub enable_cors: bool,

    /// Allowed origins for CORS (empty means all).
    pub cors_origins: Vec<String>,

    /// Enable request tracing via tower-http TraceLayer.
    ///
    /// When enabled, all HTTP requests are traced with structured logging
    /// including request method, path, status code, and latency.
    pub enable_tracing: bool,

    /// Externally visible base URL, used in the plugin manifest and the
    /// OpenAPI `servers` entry. Relative URLs are served when unset.
    pub public_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            enable_cors: true,
            cors_origins: Vec::new(),
            enable_tracing: true, // Enabled by default for observability
            public_url: None,
        }
    }
}

impl HttpConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("PSAI_HTTP_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("PSAI_HTTP_PORT") {
            if let Ok(p) = port.trim().parse() {
                config.port = p;
            }
        }

        if let Some(cors) = env_flag("PSAI_HTTP_CORS") {
            config.enable_cors = cors;
        }

        if let Ok(origins) = std::env::var("PSAI_HTTP_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(tracing) = env_flag("PSAI_HTTP_TRACING") {
            config.enable_tracing = tracing;
        }

        if let Ok(url) = std::env::var("PSAI_PUBLIC_URL") {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                config.public_url = Some(url.to_string());
            }
        }

        config
    }

    /// Socket address string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build the CORS layer for the configured origins.
fn cors_layer(config: &HttpConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.http.clone();

    let api = Router::new()
        .route("/listOfDatabasesByName", get(handlers::list_databases))
        .route("/listTablesForDatabaseByName", get(handlers::list_tables))
        .route("/tableSchemaByName", get(handlers::table_schema))
        .route(
            "/naturalLanguageSQLQuery",
            get(handlers::natural_language_query),
        );

    let mut router = Router::new()
        .nest(API_PREFIX, api)
        .route("/", get(handlers::root_redirect))
        .route("/health", get(handlers::health))
        .route("/.well-known/ai-plugin.json", get(handlers::plugin_manifest))
        .route("/openapi.json", get(handlers::openapi_document))
        .with_state(state);

    if config.enable_cors {
        router = router.layer(cors_layer(&config));
    }

    // tower-http TraceLayer for structured request/response logging
    if config.enable_tracing {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

/// Serve the API until shutdown is signaled.
///
/// After the signal the listener stops accepting connections and in-flight
/// requests get up to the controller's drain timeout to finish.
pub async fn serve(
    state: AppState,
    shutdown_controller: SharedShutdownController,
) -> Result<(), anyhow::Error> {
    let config = state.config.http.clone();
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("HTTP server listening on http://{}", addr);
    info!("API endpoints: http://{}{}/...", addr, API_PREFIX);
    info!("Health endpoint: http://{}/health", addr);
    if config.enable_tracing {
        info!("Request tracing enabled");
    }

    let mut shutdown_signal = shutdown_controller.signal();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal.recv().await;
            info!("HTTP server received shutdown signal");
        })
        .into_future();

    let mut drain_signal = shutdown_controller.signal();
    let drain_deadline = async {
        drain_signal.recv().await;
        shutdown_controller.notify_phase(ShutdownPhase::DrainingRequests);
        tokio::time::sleep(shutdown_controller.drain_timeout()).await;
    };

    tokio::select! {
        result = server => result?,
        _ = drain_deadline => {
            warn!(
                "Drain timeout of {:?} exceeded; dropping in-flight requests",
                shutdown_controller.drain_timeout()
            );
        }
    }

    Ok(())
}
