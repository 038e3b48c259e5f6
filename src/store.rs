//! Contract with the external data store.
//!
//! The store itself (schema, queries, connection pooling) lives outside this
//! crate. Route handlers surface its failures as [`StoreError`], which the
//! failure normalizer knows how to classify.

use async_trait::async_trait;
use thiserror::Error;

/// Failures a data store client reports back to route handlers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; `target` lists the columns.
    #[error("unique constraint violated on [{}]", target.join(", "))]
    UniqueViolation { target: Vec<String> },

    #[error("record not found")]
    NotFound,

    /// A foreign key pointed at a record that does not exist.
    #[error("foreign key constraint violated")]
    ForeignKeyViolation { field: Option<String> },

    /// The store refused the shape or type of the data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("data store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Liveness probe used by the health-check endpoint.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}
