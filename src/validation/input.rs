//! The parts of a request that rules can inspect.

use std::collections::HashMap;

use serde_json::Value;

use crate::validation::rule::{FieldPath, Source};

/// Body, path parameters and query parameters of one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestInput {
    /// Parsed JSON body, if one was sent.
    pub body: Option<Value>,
    pub path: HashMap<String, String>,
    pub query: HashMap<String, String>,
}

/// A located field.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Json(&'a Value),
    /// Path and query values are always text.
    Text(&'a str),
}

impl<'a> FieldValue<'a> {
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Self::Json(v) => v.as_str(),
            Self::Text(s) => Some(s),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Json(v) => v.as_i64(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Json(Value::Null) => true,
            Self::Json(Value::String(s)) => s.is_empty(),
            Self::Json(_) => false,
            Self::Text(s) => s.is_empty(),
        }
    }
}

impl RequestInput {
    pub fn from_body(body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Find a field; `None` means absent.
    pub fn lookup(&self, field: &FieldPath) -> Option<FieldValue<'_>> {
        match field.source {
            Source::Body => {
                let mut current = self.body.as_ref()?;
                for segment in field.segments() {
                    current = current.as_object()?.get(segment)?;
                }
                Some(FieldValue::Json(current))
            }
            Source::Path => self.path.get(field.name).map(|s| FieldValue::Text(s)),
            Source::Query => self.query.get(field.name).map(|s| FieldValue::Text(s)),
        }
    }

    /// Mutable access to a string field, for sanitizers. Non-string body
    /// values are left alone.
    pub fn string_mut(&mut self, field: &FieldPath) -> Option<&mut String> {
        match field.source {
            Source::Body => {
                let mut current = self.body.as_mut()?;
                for segment in field.segments() {
                    current = current.as_object_mut()?.get_mut(segment)?;
                }
                match current {
                    Value::String(s) => Some(s),
                    _ => None,
                }
            }
            Source::Path => self.path.get_mut(field.name),
            Source::Query => self.query.get_mut(field.name),
        }
    }
}
