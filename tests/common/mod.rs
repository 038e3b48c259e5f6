//! Shared utilities for integration testing.
//!
//! Boots the real server on an ephemeral port with a small in-memory user
//! directory standing in for the application's handlers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use vitals_gateway::auth::{Principal, TokenCodec};
use vitals_gateway::config::{ExecutionMode, GatewayConfig};
use vitals_gateway::http::{ApiResponse, Payload};
use vitals_gateway::pipeline::routes;
use vitals_gateway::quota::RouteClass;
use vitals_gateway::store::{HealthProbe, StoreError};
use vitals_gateway::{GatewayError, HttpServer, RouteSpec, Shutdown};

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";

#[derive(Clone, Default)]
pub struct Directory {
    users: Arc<Mutex<HashMap<String, String>>>,
}

impl Directory {
    fn insert(&self, email: &str) -> Result<String, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(email) {
            return Err(StoreError::UniqueViolation {
                target: vec!["email".to_string()],
            });
        }
        let id = format!("user-{}", users.len() + 1);
        users.insert(email.to_string(), id.clone());
        Ok(id)
    }

    fn find(&self, email: &str) -> Option<String> {
        self.users.lock().unwrap().get(email).cloned()
    }
}

#[derive(Clone)]
struct AuthState {
    directory: Directory,
    codec: TokenCodec,
}

async fn register(
    State(state): State<AuthState>,
    Payload(body): Payload<Value>,
) -> Result<ApiResponse<Value>, GatewayError> {
    let email = body["email"].as_str().unwrap_or_default();
    let id = state.directory.insert(email)?;
    let token = state.codec.issue(&id, email)?;
    Ok(ApiResponse::created(json!({ "token": token, "user": { "id": id, "email": email } })))
}

async fn login(
    State(state): State<AuthState>,
    Payload(body): Payload<Value>,
) -> Result<ApiResponse<Value>, GatewayError> {
    let email = body["email"].as_str().unwrap_or_default();
    let id = state.directory.find(email).ok_or(StoreError::NotFound)?;
    let token = state.codec.issue(&id, email)?;
    Ok(ApiResponse::ok(json!({ "token": token })))
}

async fn sync(principal: Principal, Payload(body): Payload<Value>) -> ApiResponse<Value> {
    ApiResponse::ok(json!({ "userId": principal.subject_id, "timestamp": body["timestamp"] }))
}

async fn dashboard(principal: Principal, Path(user_id): Path<String>) -> ApiResponse<Value> {
    ApiResponse::ok(json!({ "userId": user_id, "viewer": principal.email }))
}

async fn explode() -> &'static str {
    panic!("connection pool poisoned")
}

pub struct FailingProbe;

#[async_trait]
impl HealthProbe for FailingProbe {
    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

pub fn config(mode: ExecutionMode) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.mode = mode;
    config.auth.jwt_secret = Some(SecretString::from(SECRET));
    config
}

pub fn codec() -> TokenCodec {
    TokenCodec::new(Some(&SecretString::from(SECRET)))
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gateway with the test handlers mounted.
pub async fn spawn(config: GatewayConfig, probe: Option<Arc<dyn HealthProbe>>) -> TestServer {
    let state = AuthState {
        directory: Directory::default(),
        codec: codec(),
    };

    let mut builder = HttpServer::builder(config)
        .mount(routes::REGISTER, routes::register(), post(register).with_state(state.clone()))
        .mount(routes::LOGIN, routes::login(), post(login).with_state(state))
        .mount(routes::SYNC, routes::sync(), post(sync))
        .mount(routes::DASHBOARD, routes::dashboard(), get(dashboard))
        .mount("/api/debug/explode", RouteSpec::public(RouteClass::Default), get(explode));
    if let Some(probe) = probe {
        builder = builder.probe(probe);
    }
    let server = builder.build().expect("server builds");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let run_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, run_shutdown).await;
    });

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestServer {
        addr,
        client,
        shutdown,
    }
}
