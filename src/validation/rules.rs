//! Rule sets for the API's routes.

use crate::validation::checks::has_mixed_case_and_digit;
use crate::validation::rule::{Check, FieldPath, RuleSet, Sanitizer};

const ANY_INT_FROM_ZERO: Check = Check::Int { min: Some(0), max: None };
const METRICS: &[&str] = &["steps", "heartRate", "sleep", "calories", "distance"];

fn email_rules() -> RuleSet {
    let email = FieldPath::body("email");
    RuleSet::new()
        .sanitize(email, Sanitizer::Trim)
        .check(email, Check::Email, "Valid email is required")
        .sanitize(email, Sanitizer::NormalizeEmail)
}

pub fn user_registration() -> RuleSet {
    let password = FieldPath::body("password");
    let name = FieldPath::body("name");
    email_rules()
        .check(
            password,
            Check::Length { min: Some(8), max: None },
            "Password must be at least 8 characters long",
        )
        .check(
            password,
            Check::Pattern(has_mixed_case_and_digit),
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        )
        .sanitize(name, Sanitizer::Trim)
        .optional(
            name,
            Check::Length { min: Some(1), max: Some(100) },
            "Name must be between 1 and 100 characters",
        )
}

/// Login only checks shape; credentials are verified by the handler.
pub fn user_login() -> RuleSet {
    email_rules().check(
        FieldPath::body("password"),
        Check::Length { min: Some(8), max: None },
        "Password must be at least 8 characters long",
    )
}

pub fn health_data_sync() -> RuleSet {
    RuleSet::new()
        .check(FieldPath::body("timestamp"), Check::Iso8601, "Valid ISO 8601 timestamp is required")
        .optional(FieldPath::body("steps"), ANY_INT_FROM_ZERO, "Steps must be a non-negative integer")
        .optional(FieldPath::body("heartRate"), Check::Object, "Heart rate data must be an object")
        .optional(FieldPath::body("sleep"), Check::Object, "Sleep data must be an object")
        .optional(FieldPath::body("workouts"), Check::Array, "Workouts must be an array")
        .optional(FieldPath::body("activitySummary"), Check::Object, "Activity summary must be an object")
        .optional(FieldPath::body("bodyMeasurements"), Check::Object, "Body measurements must be an object")
        .optional(FieldPath::body("vitalSigns"), Check::Object, "Vital signs must be an object")
        .optional(FieldPath::body("nutrition"), Check::Object, "Nutrition data must be an object")
}

pub fn user_id() -> RuleSet {
    let user_id = FieldPath::param("userId");
    RuleSet::new()
        .check(user_id, Check::String, "User ID must be a string")
        .check(user_id, Check::Length { min: Some(1), max: None }, "User ID is required")
}

pub fn date_range() -> RuleSet {
    RuleSet::new()
        .optional(FieldPath::query("startDate"), Check::Iso8601, "Start date must be a valid ISO 8601 date")
        .optional(FieldPath::query("endDate"), Check::Iso8601, "End date must be a valid ISO 8601 date")
        .optional(
            FieldPath::query("limit"),
            Check::Int { min: Some(1), max: Some(1000) },
            "Limit must be between 1 and 1000",
        )
}

pub fn trends() -> RuleSet {
    user_id().concat(&date_range()).optional(
        FieldPath::query("metric"),
        Check::OneOf(METRICS),
        "Metric must be one of: steps, heartRate, sleep, calories, distance",
    )
}

pub fn workouts() -> RuleSet {
    user_id()
        .concat(&date_range())
        .optional(FieldPath::query("type"), Check::String, "Workout type must be a string")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::RequestInput;
    use serde_json::json;

    fn fields(violations: &[crate::validation::Violation]) -> Vec<&str> {
        violations.iter().filter_map(|v| v.field.as_deref()).collect()
    }

    #[test]
    fn login_with_bad_email_and_short_password_reports_both() {
        let input = RequestInput::from_body(json!({ "email": "not-an-email", "password": "short" }));
        let violations = user_login().validate(&input);
        assert_eq!(fields(&violations), ["email", "password"]);
        assert_eq!(violations[0].message, "Valid email is required");
    }

    #[test]
    fn login_normalizes_email_for_the_handler() {
        let mut input = RequestInput::from_body(json!({ "email": " Jane@Example.com", "password": "Secret123" }));
        assert!(user_login().apply(&mut input).is_empty());
        assert_eq!(input.body.unwrap()["email"], "jane@example.com");
    }

    #[test]
    fn registration_requires_strong_password_and_bounds_name() {
        let input = RequestInput::from_body(json!({
            "email": "jane@example.com",
            "password": "alllowercase",
            "name": "   ",
        }));
        let violations = user_registration().validate(&input);
        assert_eq!(fields(&violations), ["password", "name"]);
    }

    #[test]
    fn registration_accepts_a_good_payload() {
        let input = RequestInput::from_body(json!({
            "email": "jane@example.com",
            "password": "Str0ngPass",
            "name": "Jane",
        }));
        assert!(user_registration().validate(&input).is_empty());
    }

    #[test]
    fn sync_requires_timestamp_and_checks_section_types() {
        let input = RequestInput::from_body(json!({
            "steps": -3,
            "heartRate": [70, 71],
            "workouts": {},
        }));
        let violations = health_data_sync().validate(&input);
        assert_eq!(fields(&violations), ["timestamp", "steps", "heartRate", "workouts"]);
    }

    #[test]
    fn sync_accepts_minimal_payload() {
        let input = RequestInput::from_body(json!({ "timestamp": "2024-03-01T08:00:00Z" }));
        assert!(health_data_sync().validate(&input).is_empty());
    }

    #[test]
    fn trends_combine_user_id_date_range_and_metric() {
        let input = RequestInput::default()
            .with_param("userId", "")
            .with_query("startDate", "last week")
            .with_query("limit", "5000")
            .with_query("metric", "mood");
        let violations = trends().validate(&input);
        assert_eq!(fields(&violations), ["userId", "startDate", "limit", "metric"]);
    }

    #[test]
    fn workouts_accept_plain_query() {
        let input = RequestInput::default()
            .with_param("userId", "u-1")
            .with_query("type", "running")
            .with_query("endDate", "2024-03-01");
        assert!(workouts().validate(&input).is_empty());
    }
}
