//! Per-route middleware that runs the pipeline in front of a handler.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, Query, RawPathParams, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::normalizer::retry_after_secs;
use crate::observability::metrics;
use crate::pipeline::{PendingBody, Pipeline, RequestContext, RouteSpec};
use crate::quota::{ClientAddressPolicy, Decision};
use crate::validation::RequestInput;

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// State bound to one route's gate.
#[derive(Clone, Debug)]
pub struct GateState {
    pub spec: RouteSpec,
    pub pipeline: Arc<Pipeline>,
    pub clients: ClientAddressPolicy,
    pub body_limit: usize,
}

/// Run quota, auth and validation, then hand the (sanitized) request on.
pub async fn gate(State(gate): State<GateState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let class = gate.spec.class;

    let (mut parts, body) = request.into_parts();
    let client = gate.clients.resolve(&parts);

    let path = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .map(|params| {
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();
    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(q)| q)
        .unwrap_or_default();

    let input = RequestInput {
        body: None,
        path,
        query,
    };
    // The body stays unread until validation asks for it.
    let mut ctx = RequestContext::new(gate.spec.clone(), client, parts.headers.clone(), input)
        .with_body(body, gate.body_limit);

    if let ControlFlow::Break(err) = gate.pipeline.run(&mut ctx).await {
        let mut response = err.into_response();
        if let Some(decision) = ctx.decision {
            set_quota_headers(response.headers_mut(), &decision);
        }
        metrics::record_request(&method, class.as_str(), response.status().as_u16(), start);
        return response;
    }

    if let Some(principal) = ctx.principal.take() {
        parts.extensions.insert(principal);
    }

    let body = match std::mem::replace(&mut ctx.body, PendingBody::Read(Bytes::new())) {
        PendingBody::Unread(body) => body,
        PendingBody::Read(original) => {
            // Handlers see the sanitized body.
            let bytes = match ctx.input.body.as_ref().map(serde_json::to_vec) {
                Some(Ok(sanitized)) => Bytes::from(sanitized),
                _ => original,
            };
            parts.headers.remove(header::CONTENT_LENGTH);
            Body::from(bytes)
        }
    };

    let mut response = next.run(Request::from_parts(parts, body)).await;
    if let Some(decision) = ctx.decision {
        set_quota_headers(response.headers_mut(), &decision);
    }
    metrics::record_request(&method, class.as_str(), response.status().as_u16(), start);
    response
}

fn set_quota_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        RATELIMIT_RESET,
        HeaderValue::from(retry_after_secs(decision.reset_after)),
    );
}
