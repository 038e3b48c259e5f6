//! Pipeline stages.

use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{bearer_token, CredentialError, TokenCodec};
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::pipeline::RequestContext;
use crate::quota::QuotaEnforcer;

/// One step in front of a route handler.
///
/// `Continue` hands the request to the next stage; `Break` ends processing
/// and the carried error becomes the response.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut RequestContext) -> ControlFlow<GatewayError>;
}

/// Ordered list of stages.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// quota → auth → validation.
    pub fn standard(enforcer: QuotaEnforcer, codec: TokenCodec) -> Self {
        Self::new()
            .with(QuotaStage::new(enforcer))
            .with(AuthStage::new(codec))
            .with(ValidationStage)
    }

    pub fn with(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run stages in order, stopping at the first `Break`.
    pub async fn run(&self, ctx: &mut RequestContext) -> ControlFlow<GatewayError> {
        for stage in &self.stages {
            if let ControlFlow::Break(err) = stage.run(ctx).await {
                tracing::debug!(stage = stage.name(), kind = err.kind(), "Pipeline stopped");
                return ControlFlow::Break(err);
            }
        }
        ControlFlow::Continue(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Counts the request against its route class.
pub struct QuotaStage {
    enforcer: QuotaEnforcer,
}

impl QuotaStage {
    pub fn new(enforcer: QuotaEnforcer) -> Self {
        Self { enforcer }
    }
}

#[async_trait]
impl Stage for QuotaStage {
    fn name(&self) -> &'static str {
        "quota"
    }

    async fn run(&self, ctx: &mut RequestContext) -> ControlFlow<GatewayError> {
        if !self.enforcer.is_enabled() {
            return ControlFlow::Continue(());
        }

        let class = ctx.route.class;
        let decision = self.enforcer.admit(&ctx.client, class).await;
        ctx.decision = Some(decision);

        match decision.retry_after {
            Some(retry_after) if !decision.allowed => {
                tracing::warn!(client = %ctx.client, class = %class, "Quota exceeded");
                metrics::record_quota_rejection(class.as_str());
                ControlFlow::Break(GatewayError::QuotaExceeded { class, retry_after })
            }
            _ => ControlFlow::Continue(()),
        }
    }
}

/// Verifies the bearer token on protected routes.
pub struct AuthStage {
    codec: TokenCodec,
}

impl AuthStage {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }
}

#[async_trait]
impl Stage for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn run(&self, ctx: &mut RequestContext) -> ControlFlow<GatewayError> {
        if !ctx.route.requires_auth() {
            return ControlFlow::Continue(());
        }

        let Some(token) = bearer_token(&ctx.headers) else {
            metrics::record_credential_failure("missing");
            return ControlFlow::Break(GatewayError::MissingCredential);
        };

        match self.codec.verify(token) {
            Ok(principal) => {
                ctx.principal = Some(principal);
                ControlFlow::Continue(())
            }
            Err(e) => {
                let kind = match &e {
                    CredentialError::Expired => "expired",
                    CredentialError::Malformed(_) => "malformed",
                    CredentialError::MissingSecret | CredentialError::Unavailable(_) => "unavailable",
                };
                metrics::record_credential_failure(kind);
                ControlFlow::Break(e.into())
            }
        }
    }
}

/// Applies the route's rule set to the request input.
pub struct ValidationStage;

#[async_trait]
impl Stage for ValidationStage {
    fn name(&self) -> &'static str {
        "validation"
    }

    async fn run(&self, ctx: &mut RequestContext) -> ControlFlow<GatewayError> {
        if ctx.route.rules.is_empty() {
            return ControlFlow::Continue(());
        }
        if ctx.route.rules.reads_body() {
            if let Err(reason) = ctx.read_body().await {
                return ControlFlow::Break(GatewayError::MalformedBody(reason));
            }
        }

        let rules = Arc::clone(&ctx.route.rules);
        let violations = rules.apply(&mut ctx.input);
        if violations.is_empty() {
            return ControlFlow::Continue(());
        }

        metrics::record_validation_failure(ctx.route.class.as_str(), violations.len());
        ControlFlow::Break(GatewayError::Validation(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use crate::pipeline::RouteSpec;
    use crate::quota::{ClientKey, RouteClass};
    use crate::validation::{rules, RequestInput};
    use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
    use secrecy::SecretString;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn codec() -> TokenCodec {
        TokenCodec::new(Some(&SecretString::from("stage-test-secret-stage-test-secret")))
    }

    fn ctx(route: RouteSpec, headers: HeaderMap, input: RequestInput) -> RequestContext {
        RequestContext::new(route, ClientKey::new("192.0.2.1"), headers, input)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
        headers
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl Stage for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self, _ctx: &mut RequestContext) -> ControlFlow<GatewayError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        }
    }

    #[test]
    fn standard_pipeline_order() {
        let pipeline = Pipeline::standard(QuotaEnforcer::disabled(), codec());
        assert_eq!(pipeline.stage_names(), ["quota", "auth", "validation"]);
    }

    #[tokio::test]
    async fn break_skips_later_stages() {
        let hits = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with(AuthStage::new(codec()))
            .with(Counting(Arc::clone(&hits)));

        let mut context = ctx(RouteSpec::protected(RouteClass::Sync), HeaderMap::new(), RequestInput::default());
        let outcome = pipeline.run(&mut context).await;

        assert!(matches!(outcome, ControlFlow::Break(GatewayError::MissingCredential)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auth_attaches_principal_for_valid_token() {
        let codec = codec();
        let token = codec.issue("user-1", "jane@example.com").unwrap();
        let mut context = ctx(RouteSpec::protected(RouteClass::Read), bearer(&token), RequestInput::default());

        let outcome = AuthStage::new(codec).run(&mut context).await;
        assert!(outcome.is_continue());
        assert_eq!(
            context.principal,
            Some(Principal {
                subject_id: "user-1".into(),
                email: "jane@example.com".into(),
            })
        );
    }

    #[tokio::test]
    async fn auth_rejects_tampered_token() {
        let codec = codec();
        let mut token = codec.issue("user-1", "jane@example.com").unwrap();
        token.push('x');
        let mut context = ctx(RouteSpec::protected(RouteClass::Read), bearer(&token), RequestInput::default());

        let outcome = AuthStage::new(codec).run(&mut context).await;
        assert!(matches!(outcome, ControlFlow::Break(GatewayError::MalformedCredential(_))));
    }

    #[tokio::test]
    async fn public_routes_skip_auth() {
        let mut context = ctx(RouteSpec::public(RouteClass::Auth), HeaderMap::new(), RequestInput::default());
        assert!(AuthStage::new(TokenCodec::unconfigured()).run(&mut context).await.is_continue());
    }

    #[tokio::test]
    async fn quota_stage_rejects_past_the_limit() {
        let (enforcer, _) = QuotaEnforcer::in_memory();
        let stage = QuotaStage::new(enforcer);
        let route = RouteSpec::public(RouteClass::Auth);

        for _ in 0..5 {
            let mut context = ctx(route.clone(), HeaderMap::new(), RequestInput::default());
            assert!(stage.run(&mut context).await.is_continue());
        }
        let mut context = ctx(route, HeaderMap::new(), RequestInput::default());
        match stage.run(&mut context).await {
            ControlFlow::Break(GatewayError::QuotaExceeded { class, retry_after }) => {
                assert_eq!(class, RouteClass::Auth);
                assert!(!retry_after.is_zero());
            }
            other => panic!("expected quota rejection, got {other:?}"),
        }
        assert_eq!(context.decision.map(|d| d.remaining), Some(0));
    }

    #[tokio::test]
    async fn validation_collects_violations_and_sanitizes_on_success() {
        let route = RouteSpec::public(RouteClass::Auth).with_rules(rules::user_login());

        let mut bad = ctx(
            route.clone(),
            HeaderMap::new(),
            RequestInput::from_body(json!({ "email": "not-an-email", "password": "short" })),
        );
        match ValidationStage.run(&mut bad).await {
            ControlFlow::Break(GatewayError::Validation(violations)) => assert_eq!(violations.len(), 2),
            other => panic!("expected validation failure, got {other:?}"),
        }

        let mut good = ctx(
            route,
            HeaderMap::new(),
            RequestInput::from_body(json!({ "email": "JANE@example.com ", "password": "Secret123" })),
        );
        assert!(ValidationStage.run(&mut good).await.is_continue());
        assert_eq!(good.input.body.unwrap()["email"], "jane@example.com");
    }

    #[tokio::test]
    async fn unreadable_body_is_reported_by_validation() {
        let route = RouteSpec::public(RouteClass::Auth).with_rules(rules::user_login());
        let mut context = ctx(route, HeaderMap::new(), RequestInput::default())
            .with_body(axum::body::Body::from("{not json"), 1024);

        assert!(matches!(
            ValidationStage.run(&mut context).await,
            ControlFlow::Break(GatewayError::MalformedBody(_))
        ));
    }
}
