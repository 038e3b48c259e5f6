//! Per-route declarations and per-request state.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::HeaderMap;

use crate::auth::Principal;
use crate::quota::{ClientKey, Decision, RouteClass};
use crate::validation::{RequestInput, RuleSet};

/// Whether a route needs an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
}

/// Everything the pipeline needs to know about a route, fixed at startup.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub class: RouteClass,
    pub access: Access,
    pub rules: Arc<RuleSet>,
}

impl RouteSpec {
    pub fn public(class: RouteClass) -> Self {
        Self {
            class,
            access: Access::Public,
            rules: Arc::new(RuleSet::new()),
        }
    }

    pub fn protected(class: RouteClass) -> Self {
        Self {
            class,
            access: Access::Protected,
            rules: Arc::new(RuleSet::new()),
        }
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    pub fn requires_auth(&self) -> bool {
        self.access == Access::Protected
    }
}

/// The request body, left on the wire until a stage asks for it.
#[derive(Debug)]
pub enum PendingBody {
    Unread(Body),
    Read(Bytes),
}

/// State carried through the stages of one request.
#[derive(Debug)]
pub struct RequestContext {
    pub route: RouteSpec,
    pub client: ClientKey,
    pub headers: HeaderMap,
    pub input: RequestInput,
    pub body: PendingBody,
    pub body_limit: usize,
    /// Set by the auth stage on protected routes.
    pub principal: Option<Principal>,
    /// Set by the quota stage when quotas are enforced.
    pub decision: Option<Decision>,
}

impl RequestContext {
    pub fn new(route: RouteSpec, client: ClientKey, headers: HeaderMap, input: RequestInput) -> Self {
        Self {
            route,
            client,
            headers,
            input,
            body: PendingBody::Unread(Body::empty()),
            body_limit: usize::MAX,
            principal: None,
            decision: None,
        }
    }

    pub fn with_body(mut self, body: Body, limit: usize) -> Self {
        self.body = PendingBody::Unread(body);
        self.body_limit = limit;
        self
    }

    /// Buffer the body and parse it as JSON into `input.body`.
    ///
    /// An empty body leaves `input.body` unset. Reading twice is a no-op.
    /// The error is a client-facing reason.
    pub async fn read_body(&mut self) -> Result<(), String> {
        let body = match std::mem::replace(&mut self.body, PendingBody::Read(Bytes::new())) {
            PendingBody::Unread(body) => body,
            read @ PendingBody::Read(_) => {
                self.body = read;
                return Ok(());
            }
        };

        let bytes = axum::body::to_bytes(body, self.body_limit)
            .await
            .map_err(|e| format!("Request body could not be read: {e}"))?;
        if !bytes.is_empty() {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| format!("Request body is not valid JSON: {e}"))?;
            self.input.body = Some(value);
        }
        self.body = PendingBody::Read(bytes);
        Ok(())
    }
}
