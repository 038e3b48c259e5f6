//! Request validation subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline gate:
//!     → input.rs (body JSON + path params + query params)
//!     → rule.rs (RuleSet::apply: sanitize, check every rule in order)
//!     → Vec<Violation> (empty = accepted)
//! ```
//!
//! # Design Decisions
//! - Rule sets are plain values built once per route at startup
//! - Every violation is collected; a caller sees the whole picture at once
//! - Composite rule sets are concatenation; order only affects message order

pub mod checks;
pub mod input;
pub mod rule;
pub mod rules;

pub use input::{FieldValue, RequestInput};
pub use rule::{Check, FieldPath, Rule, RuleSet, Sanitizer, Source, Violation};

/// Check `input` against `rules` without modifying it.
pub fn validate(rules: &RuleSet, input: &RequestInput) -> Vec<Violation> {
    rules.validate(input)
}
