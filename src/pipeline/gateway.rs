//! Route registration with the pipeline attached.

use std::any::Any;
use std::sync::Arc;

use axum::handler::Handler;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;

use crate::auth::TokenCodec;
use crate::config::ExecutionMode;
use crate::error::GatewayError;
use crate::http::handlers::not_found;
use crate::normalizer::{normalize_failures, Normalizer};
use crate::pipeline::gate::{gate, GateState};
use crate::pipeline::{Pipeline, RouteSpec};
use crate::quota::{ClientAddressPolicy, QuotaEnforcer, RouteClass};

const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Builds a router where every route runs behind the pipeline and every
/// failure leaves through the normalizer.
pub struct Gateway {
    router: Router,
    pipeline: Arc<Pipeline>,
    codec: TokenCodec,
    clients: ClientAddressPolicy,
    body_limit: usize,
    normalizer: Normalizer,
}

impl Gateway {
    pub fn new(enforcer: QuotaEnforcer, codec: TokenCodec) -> Self {
        Self {
            router: Router::new(),
            pipeline: Arc::new(Pipeline::standard(enforcer, codec.clone())),
            codec,
            clients: ClientAddressPolicy::default(),
            body_limit: DEFAULT_BODY_LIMIT,
            normalizer: Normalizer::default(),
        }
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.normalizer = Normalizer::new(mode);
        self
    }

    pub fn client_policy(mut self, clients: ClientAddressPolicy) -> Self {
        self.clients = clients;
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    fn gate_state(&self, spec: RouteSpec) -> GateState {
        GateState {
            spec,
            pipeline: Arc::clone(&self.pipeline),
            clients: self.clients,
            body_limit: self.body_limit,
        }
    }

    /// Mount `handler` at `path` behind the pipeline configured by `spec`.
    ///
    /// Fails if the route needs authentication and no signing secret is set.
    pub fn route(mut self, path: &str, spec: RouteSpec, handler: MethodRouter) -> Result<Self, GatewayError> {
        if spec.requires_auth() && !self.codec.is_configured() {
            return Err(GatewayError::Config(format!(
                "route {path} requires authentication but no token signing secret is configured"
            )));
        }

        tracing::debug!(path, class = %spec.class, access = ?spec.access, "Mounting route");
        let state = self.gate_state(spec);
        self.router = self
            .router
            .route(path, handler.layer(from_fn_with_state(state, gate)));
        Ok(self)
    }

    /// Finish without extra layers.
    pub fn into_router(self) -> Router {
        self.into_router_with(|router| router)
    }

    /// Finish, applying `layers` between panic capture and normalization so
    /// their bare error responses are normalized too.
    pub fn into_router_with<F>(self, layers: F) -> Router
    where
        F: FnOnce(Router) -> Router,
    {
        let fallback = self.gate_state(RouteSpec::public(RouteClass::Default));
        let router = self
            .router
            .fallback(not_found.layer(from_fn_with_state(fallback, gate)))
            .layer(CatchPanicLayer::custom(panic_response));

        layers(router).layer(from_fn_with_state(self.normalizer, normalize_failures))
    }
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    GatewayError::from_panic(payload).into_response()
}
