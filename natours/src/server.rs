//! HTTP server with graceful shutdown

use axum::{http::StatusCode, middleware, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{
    api,
    config::Config,
    error::Result,
    handlers::render_errors,
    middleware::{
        apply_security_headers, request_id_layer, request_id_propagation_layer,
        sensitive_headers_layer,
    },
    state::AppState,
};

/// The complete application: routes plus the middleware stack
///
/// Layers, outermost first: panic recovery, request id, sensitive headers,
/// tracing, compression, CORS, timeout, security headers, body limit and
/// the error renderer.
pub fn router(state: AppState) -> Result<Router> {
    let config = state.config();
    let app = api::routes(&state)?
        .layer(middleware::from_fn_with_state(state.error_mode(), render_errors))
        .layer(RequestBodyLimitLayer::new(config.middleware.body_limit_bytes()));

    let mut app = apply_security_headers(app, config.middleware.security_headers)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.service.timeout(),
        ))
        .layer(cors_layer(&config.middleware.cors_mode));

    if config.middleware.compression {
        app = app.layer(CompressionLayer::new());
    }

    Ok(app
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(sensitive_headers_layer())
        .layer(request_id_propagation_layer())
        .layer(request_id_layer())
        .layer(CatchPanicLayer::new()))
}

/// Build CORS layer based on configuration
fn cors_layer(mode: &str) -> CorsLayer {
    match mode {
        "permissive" => CorsLayer::permissive(),
        "restrictive" => CorsLayer::new(),
        other => {
            tracing::warn!("Unknown CORS mode: {}, defaulting to permissive", other);
            CorsLayer::permissive()
        }
    }
}

/// Server instance
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Bind `service.host:service.port` and serve `app` until a shutdown signal
    pub async fn serve(self, app: Router) -> Result<()> {
        let addr = format!("{}:{}", self.config.service.host, self.config.service.port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve_on(listener, app, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_on(
        self,
        listener: TcpListener,
        app: Router,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!("Starting {} on {}", self.config.service.name, addr);
        self.log_middleware_config();

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    fn log_middleware_config(&self) {
        let middleware = &self.config.middleware;
        tracing::info!(
            body_limit_kb = middleware.body_limit_kb,
            compression = middleware.compression,
            cors_mode = %middleware.cors_mode,
            security_headers = middleware.security_headers,
            timeout_secs = self.config.service.timeout_secs,
            "middleware configured"
        );
        if middleware.rate_limit.enabled {
            tracing::info!(
                "  - Rate limiting: {} req / {} sec per client",
                middleware.rate_limit.max_requests,
                middleware.rate_limit.window_secs
            );
        } else {
            tracing::info!("  - Rate limiting: disabled");
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    tracing::info!("Shutdown signal received, draining requests...");
}
