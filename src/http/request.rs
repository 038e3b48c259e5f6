//! Request extraction helpers.

use axum::extract::FromRequest;

use crate::error::GatewayError;

/// JSON body extractor whose rejection is a [`GatewayError`].
///
/// Routes behind a body rule set already receive a parsed, sanitized body;
/// this keeps failures on the remaining routes inside the same envelope.
#[derive(Debug, Clone, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(GatewayError))]
pub struct Payload<T>(pub T);
