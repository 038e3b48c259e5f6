//! String predicates used by rules.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Pragmatic address check: `local@domain.tld` with sane characters.
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.len() > 253 {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c));
    if !local_ok {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let tld_ok = labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));
    labels_ok && tld_ok
}

/// RFC 3339 date-time, a zone-less date-time, or a calendar date.
pub fn is_iso8601(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// At least one lowercase letter, one uppercase letter and one digit.
pub fn has_mixed_case_and_digit(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_digit())
}

/// Canonical form of an address: lowercased, with provider-specific aliases
/// folded so one mailbox maps to one string.
///
/// - Gmail: dots and `+tag` dropped from the local part, `googlemail.com` becomes `gmail.com`
/// - Outlook, Hotmail, Live, iCloud: `+tag` dropped
/// - Yahoo: `-tag` dropped
///
/// Values without an `@` are only lowercased.
pub fn normalize_email(value: &str) -> String {
    let lowered = value.to_lowercase();
    let Some((local, domain)) = lowered.rsplit_once('@') else {
        return lowered;
    };

    let (local, domain) = match domain {
        "gmail.com" | "googlemail.com" => (strip_tag(local, '+').replace('.', ""), "gmail.com"),
        "outlook.com" | "hotmail.com" | "live.com" | "icloud.com" | "me.com" => {
            (strip_tag(local, '+').to_string(), domain)
        }
        "yahoo.com" | "ymail.com" | "rocketmail.com" => (strip_tag(local, '-').to_string(), domain),
        _ => (local.to_string(), domain),
    };

    if local.is_empty() {
        return lowered;
    }
    format!("{local}@{domain}")
}

fn strip_tag(local: &str, separator: char) -> &str {
    local.split(separator).next().unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_email("jane@example.com"));
        assert!(is_email("jane.doe+tag@mail.example.co"));
        assert!(!is_email("not-an-email"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("jane@localhost"));
        assert!(!is_email("jane@example.c"));
        assert!(!is_email("ja ne@example.com"));
        assert!(!is_email("jane..doe@example.com"));
        assert!(!is_email("jane@-example.com"));
    }

    #[test]
    fn iso8601_shapes() {
        assert!(is_iso8601("2024-03-01T08:30:00Z"));
        assert!(is_iso8601("2024-03-01T08:30:00.123+02:00"));
        assert!(is_iso8601("2024-03-01T08:30:00"));
        assert!(is_iso8601("2024-03-01"));
        assert!(!is_iso8601("2024-13-01"));
        assert!(!is_iso8601("yesterday"));
        assert!(!is_iso8601(""));
    }

    #[test]
    fn email_normalization_folds_provider_aliases() {
        assert_eq!(normalize_email("Jane.Doe+runs@GoogleMail.com"), "janedoe@gmail.com");
        assert_eq!(normalize_email("j.d@gmail.com"), "jd@gmail.com");
        assert_eq!(normalize_email("Jane+work@Outlook.com"), "jane@outlook.com");
        assert_eq!(normalize_email("jane-news@yahoo.com"), "jane@yahoo.com");
        assert_eq!(normalize_email("Jane.Doe+x@Example.com"), "jane.doe+x@example.com");
        assert_eq!(normalize_email("NOT-AN-EMAIL"), "not-an-email");
    }

    #[test]
    fn password_character_classes() {
        assert!(has_mixed_case_and_digit("Passw0rd"));
        assert!(!has_mixed_case_and_digit("password1"));
        assert!(!has_mixed_case_and_digit("PASSWORD1"));
        assert!(!has_mixed_case_and_digit("Password"));
    }
}
