//! Route declarations for the health-telemetry API.
//!
//! Handlers live with the application; these fix each endpoint's quota
//! class, access level and payload rules.

use crate::pipeline::RouteSpec;
use crate::quota::RouteClass;
use crate::validation::rules;

pub const REGISTER: &str = "/api/auth/register";
pub const LOGIN: &str = "/api/auth/login";
pub const SYNC: &str = "/api/health/sync";
pub const DASHBOARD: &str = "/api/health/dashboard/{userId}";
pub const WORKOUTS: &str = "/api/health/workouts/{userId}";
pub const TRENDS: &str = "/api/health/trends/{userId}";
pub const INDEX: &str = "/";
pub const HEALTH_CHECK: &str = "/api/health-check";

pub fn register() -> RouteSpec {
    RouteSpec::public(RouteClass::Auth).with_rules(rules::user_registration())
}

pub fn login() -> RouteSpec {
    RouteSpec::public(RouteClass::Auth).with_rules(rules::user_login())
}

pub fn sync() -> RouteSpec {
    RouteSpec::protected(RouteClass::Sync).with_rules(rules::health_data_sync())
}

pub fn dashboard() -> RouteSpec {
    RouteSpec::protected(RouteClass::Read).with_rules(rules::user_id())
}

pub fn workouts() -> RouteSpec {
    RouteSpec::protected(RouteClass::Read).with_rules(rules::workouts())
}

pub fn trends() -> RouteSpec {
    RouteSpec::protected(RouteClass::Read).with_rules(rules::trends())
}

/// Index and health check: unauthenticated, default quota.
pub fn service() -> RouteSpec {
    RouteSpec::public(RouteClass::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Access;

    #[test]
    fn auth_endpoints_are_public_and_data_endpoints_protected() {
        for spec in [register(), login()] {
            assert_eq!(spec.class, RouteClass::Auth);
            assert_eq!(spec.access, Access::Public);
        }
        assert_eq!(sync().class, RouteClass::Sync);
        for spec in [sync(), dashboard(), workouts(), trends()] {
            assert_eq!(spec.access, Access::Protected);
        }
        for spec in [dashboard(), workouts(), trends()] {
            assert_eq!(spec.class, RouteClass::Read);
        }
    }

    #[test]
    fn only_write_endpoints_read_the_body() {
        assert!(register().rules.reads_body());
        assert!(sync().rules.reads_body());
        assert!(!trends().rules.reads_body());
        assert!(service().rules.is_empty());
    }
}
