//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the gateway router: built-in service routes plus mounted API routes
//! - Wire up ambient layers (request ID, tracing, CORS, security headers,
//!   optional timeout, body limit)
//! - Bind the router to a listener and drain on shutdown
//! - Run the quota window sweeper for the server's lifetime

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, MethodRouter};
use axum::Router;
use secrecy::ExposeSecret;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::TokenCodec;
use crate::config::validation::RECOMMENDED_SECRET_LEN;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::handlers::{health_check, index};
use crate::lifecycle::Shutdown;
use crate::pipeline::{routes, Gateway, RouteSpec};
use crate::quota::{ClientAddressPolicy, CounterStore, InMemoryCounterStore, QuotaEnforcer};
use crate::security::{cors_layer, with_security_headers};
use crate::store::HealthProbe;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Collects routes and collaborators before the router is assembled.
pub struct ServerBuilder {
    config: GatewayConfig,
    probe: Option<Arc<dyn HealthProbe>>,
    counter_store: Option<Arc<dyn CounterStore>>,
    routes: Vec<(String, RouteSpec, MethodRouter)>,
}

impl ServerBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            probe: None,
            counter_store: None,
            routes: Vec::new(),
        }
    }

    /// Data store liveness check for `/api/health-check`.
    pub fn probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Share quota counters through an external store instead of process memory.
    pub fn counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.counter_store = Some(store);
        self
    }

    /// Mount an API route behind the pipeline.
    pub fn mount(mut self, path: impl Into<String>, spec: RouteSpec, handler: MethodRouter) -> Self {
        self.routes.push((path.into(), spec, handler));
        self
    }

    /// Assemble the router. Fails if a protected route is mounted without a
    /// token signing secret.
    pub fn build(self) -> Result<HttpServer, GatewayError> {
        let config = self.config;

        let secret = config.auth.secret();
        match &secret {
            None => tracing::warn!("No token signing secret configured, protected routes are unavailable"),
            Some(s) if s.expose_secret().len() < RECOMMENDED_SECRET_LEN => tracing::warn!(
                recommended = RECOMMENDED_SECRET_LEN,
                "Token signing secret is shorter than recommended"
            ),
            Some(_) => {}
        }
        let codec = TokenCodec::new(secret.as_ref());

        let mut sweeper = None;
        let enforcer = if !config.quota.enabled {
            tracing::info!("Quota enforcement disabled");
            QuotaEnforcer::disabled()
        } else if let Some(store) = self.counter_store {
            QuotaEnforcer::new(store)
        } else {
            let (enforcer, store) = QuotaEnforcer::in_memory();
            sweeper = Some(store);
            enforcer
        };

        let mut gateway = Gateway::new(enforcer, codec)
            .mode(config.mode)
            .client_policy(ClientAddressPolicy {
                trust_forwarded_for: config.quota.trust_forwarded_for,
            })
            .body_limit(config.security.max_body_bytes)
            .route(routes::INDEX, routes::service(), get(index))?
            .route(
                routes::HEALTH_CHECK,
                routes::service(),
                get(health_check).with_state(self.probe),
            )?;
        for (path, spec, handler) in self.routes {
            gateway = gateway.route(&path, spec, handler)?;
        }

        let router = Self::build_router(&config, gateway);
        Ok(HttpServer {
            router,
            sweeper,
            sweep_interval: Duration::from_secs(config.quota.sweep_interval_secs),
        })
    }

    /// Layer order, outermost first: request ID, tracing, CORS, security
    /// headers, failure normalization, timeout (when configured), body limit,
    /// panic capture.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, gateway: Gateway) -> Router {
        let max_body = config.security.max_body_bytes;
        let timeout = config.listener.request_timeout();

        let mut router = gateway.into_router_with(|router| {
            let router = router.layer(RequestBodyLimitLayer::new(max_body));
            match timeout {
                Some(timeout) => router.layer(TimeoutLayer::new(timeout)),
                None => router,
            }
        });

        if config.security.enable_headers {
            router = with_security_headers(router);
        }

        router
            .layer(cors_layer(&config.cors))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id,
                )
            }))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    sweeper: Option<InMemoryCounterStore>,
    sweep_interval: Duration,
}

impl HttpServer {
    pub fn builder(config: GatewayConfig) -> ServerBuilder {
        ServerBuilder::new(config)
    }

    /// The assembled router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = self
            .sweeper
            .map(|store| store.spawn_sweeper(self.sweep_interval, shutdown.subscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await;

        // The sweeper stops on the same signal; make sure it has one if serve failed.
        shutdown.trigger();
        if let Some(handle) = sweeper {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Quota sweeper ended abnormally");
            }
        }

        result?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
