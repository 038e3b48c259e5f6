//! Rule definitions and the rule-set evaluator.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::validation::checks;
use crate::validation::input::{FieldValue, RequestInput};

/// Where a field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// JSON request body; the path is dotted (`heartRate.average`).
    Body,
    /// Matched path parameter.
    Path,
    /// Query-string parameter.
    Query,
}

/// Location of one field in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub source: Source,
    pub name: &'static str,
}

impl FieldPath {
    pub const fn body(name: &'static str) -> Self {
        Self { source: Source::Body, name }
    }

    pub const fn param(name: &'static str) -> Self {
        Self { source: Source::Path, name }
    }

    pub const fn query(name: &'static str) -> Self {
        Self { source: Source::Query, name }
    }

    /// Segments of a dotted body path.
    pub fn segments(&self) -> impl Iterator<Item = &'static str> {
        self.name.split('.')
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Predicate applied to a present field.
#[derive(Clone, Copy)]
pub enum Check {
    String,
    /// Integer with inclusive bounds. Path and query values are parsed.
    Int { min: Option<i64>, max: Option<i64> },
    Object,
    Array,
    /// String length in characters, inclusive.
    Length { min: Option<usize>, max: Option<usize> },
    Email,
    Pattern(fn(&str) -> bool),
    NotEmpty,
    OneOf(&'static [&'static str]),
    Iso8601,
}

impl Check {
    pub fn holds(&self, value: &FieldValue<'_>) -> bool {
        match self {
            Self::String => value.as_str().is_some(),
            Self::Int { min, max } => value.as_int().is_some_and(|n| {
                min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
            }),
            Self::Object => matches!(value, FieldValue::Json(v) if v.is_object()),
            Self::Array => matches!(value, FieldValue::Json(v) if v.is_array()),
            Self::Length { min, max } => value.as_str().is_some_and(|s| {
                let len = s.chars().count();
                min.map_or(true, |lo| len >= lo) && max.map_or(true, |hi| len <= hi)
            }),
            Self::Email => value.as_str().is_some_and(checks::is_email),
            Self::Pattern(matches) => value.as_str().is_some_and(|s| matches(s)),
            Self::NotEmpty => !value.is_empty(),
            Self::OneOf(allowed) => value.as_str().is_some_and(|s| allowed.contains(&s)),
            Self::Iso8601 => value.as_str().is_some_and(checks::is_iso8601),
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("String"),
            Self::Int { min, max } => f.debug_struct("Int").field("min", min).field("max", max).finish(),
            Self::Object => f.write_str("Object"),
            Self::Array => f.write_str("Array"),
            Self::Length { min, max } => {
                f.debug_struct("Length").field("min", min).field("max", max).finish()
            }
            Self::Email => f.write_str("Email"),
            Self::Pattern(_) => f.write_str("Pattern(..)"),
            Self::NotEmpty => f.write_str("NotEmpty"),
            Self::OneOf(allowed) => f.debug_tuple("OneOf").field(allowed).finish(),
            Self::Iso8601 => f.write_str("Iso8601"),
        }
    }
}

/// In-place string rewrite applied before later checks see the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sanitizer {
    Trim,
    /// Canonical address form, see [`checks::normalize_email`].
    NormalizeEmail,
}

impl Sanitizer {
    fn rewrite(self, value: &mut String) {
        match self {
            Self::Trim => {
                let trimmed = value.trim();
                if trimmed.len() != value.len() {
                    *value = trimmed.to_string();
                }
            }
            Self::NormalizeEmail => *value = checks::normalize_email(value),
        }
    }
}

/// One field constraint.
#[derive(Debug, Clone)]
pub struct Rule {
    pub field: FieldPath,
    pub check: Check,
    pub message: &'static str,
    pub optional: bool,
}

#[derive(Debug, Clone)]
enum Step {
    Sanitize(FieldPath, Sanitizer),
    Check(Rule),
}

/// Ordered constraints bound to one route.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    steps: Vec<Step>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Required field check.
    pub fn check(mut self, field: FieldPath, check: Check, message: &'static str) -> Self {
        self.steps.push(Step::Check(Rule {
            field,
            check,
            message,
            optional: false,
        }));
        self
    }

    /// Check that is skipped when the field is absent.
    pub fn optional(mut self, field: FieldPath, check: Check, message: &'static str) -> Self {
        self.steps.push(Step::Check(Rule {
            field,
            check,
            message,
            optional: true,
        }));
        self
    }

    pub fn sanitize(mut self, field: FieldPath, sanitizer: Sanitizer) -> Self {
        self.steps.push(Step::Sanitize(field, sanitizer));
        self
    }

    /// Append another rule set's steps after this one's.
    pub fn concat(mut self, other: &RuleSet) -> Self {
        self.steps.extend(other.steps.iter().cloned());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether any step looks at the JSON body.
    pub fn reads_body(&self) -> bool {
        self.steps.iter().any(|step| {
            let field = match step {
                Step::Sanitize(field, _) => field,
                Step::Check(rule) => &rule.field,
            };
            field.source == Source::Body
        })
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.steps.iter().filter_map(|step| match step {
            Step::Check(rule) => Some(rule),
            Step::Sanitize(..) => None,
        })
    }

    /// Run every step in order against `input`, sanitizing it in place.
    ///
    /// All violations are collected; nothing short-circuits. A required
    /// field that is absent is reported once, however many checks it has.
    pub fn apply(&self, input: &mut RequestInput) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut reported_missing = HashSet::new();

        for step in &self.steps {
            match step {
                Step::Sanitize(field, sanitizer) => {
                    if let Some(value) = input.string_mut(field) {
                        sanitizer.rewrite(value);
                    }
                }
                Step::Check(rule) => match input.lookup(&rule.field) {
                    Some(value) => {
                        if !rule.check.holds(&value) {
                            violations.push(Violation::new(rule.field.name, rule.message));
                        }
                    }
                    None if rule.optional => {}
                    None => {
                        if reported_missing.insert(rule.field) {
                            violations.push(Violation::new(
                                rule.field.name,
                                format!("{} is required", rule.field.name),
                            ));
                        }
                    }
                },
            }
        }

        violations
    }

    /// Check `input` without modifying it. Sanitizers still run on a copy so
    /// that checks see the same values `apply` would.
    pub fn validate(&self, input: &RequestInput) -> Vec<Violation> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut scratch = input.clone();
        self.apply(&mut scratch)
    }
}

/// A single failed constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Violation not tied to a single field.
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}
