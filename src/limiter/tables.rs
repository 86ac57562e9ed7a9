//! Static rate limit tables.
//!
//! Tier limits, per-endpoint overrides for sensitive paths, and per-user
//! action limits. Values here are deployment policy; the tests assert them
//! so a change is always deliberate.

/// One fixed-window cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    pub window_ms: u64,
    pub max_requests: u64,
}

/// Rate limit tier, derived from the path prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Auth,
    Api,
    General,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Auth => "auth",
            Tier::Api => "api",
            Tier::General => "general",
        }
    }
}

/// Derive the tier from the request path.
pub fn tier_for_path(path: &str) -> Tier {
    if path.starts_with("/api/auth") || path.starts_with("/auth") {
        Tier::Auth
    } else if path.starts_with("/api") {
        Tier::Api
    } else {
        Tier::General
    }
}

/// Auth endpoints: few attempts over a long window.
pub const AUTH_LIMIT: WindowLimit = WindowLimit {
    window_ms: 15 * 60 * 1000,
    max_requests: 20,
};

/// General API endpoints.
pub const API_LIMIT: WindowLimit = WindowLimit {
    window_ms: 60 * 1000,
    max_requests: 100,
};

const MINUTE: u64 = 60 * 1000;
const HOUR: u64 = 60 * MINUTE;

/// Stricter caps for sensitive paths. Unlisted paths use the tier default.
const ENDPOINT_OVERRIDES: &[(&str, WindowLimit)] = &[
    ("/api/auth/login", WindowLimit { window_ms: 15 * MINUTE, max_requests: 5 }),
    ("/api/auth/register", WindowLimit { window_ms: HOUR, max_requests: 3 }),
    ("/api/auth/password-reset", WindowLimit { window_ms: HOUR, max_requests: 3 }),
    ("/api/wallet/deposit", WindowLimit { window_ms: MINUTE, max_requests: 10 }),
    ("/api/wallet/withdraw", WindowLimit { window_ms: MINUTE, max_requests: 5 }),
    ("/api/notifications", WindowLimit { window_ms: MINUTE, max_requests: 30 }),
    ("/api/challenges", WindowLimit { window_ms: MINUTE, max_requests: 20 }),
    ("/api/friends", WindowLimit { window_ms: MINUTE, max_requests: 20 }),
];

/// Look up an endpoint override by longest matching prefix.
pub fn endpoint_override(path: &str) -> Option<(&'static str, WindowLimit)> {
    ENDPOINT_OVERRIDES
        .iter()
        .filter(|(prefix, _)| path == *prefix || path.starts_with(&format!("{prefix}/")))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(prefix, limit)| (*prefix, *limit))
}

/// Per-user action caps.
const USER_ACTION_LIMITS: &[(&str, WindowLimit)] = &[
    ("friend_request", WindowLimit { window_ms: HOUR, max_requests: 20 }),
    ("challenge_create", WindowLimit { window_ms: HOUR, max_requests: 10 }),
    ("message_send", WindowLimit { window_ms: MINUTE, max_requests: 30 }),
    ("achievement_claim", WindowLimit { window_ms: HOUR, max_requests: 50 }),
    ("transaction_create", WindowLimit { window_ms: MINUTE, max_requests: 10 }),
];

/// Default for actions not in the table.
pub const USER_ACTION_DEFAULT: WindowLimit = WindowLimit {
    window_ms: MINUTE,
    max_requests: 30,
};

pub fn user_action_limit(action: &str) -> WindowLimit {
    USER_ACTION_LIMITS
        .iter()
        .find(|(name, _)| *name == action)
        .map(|(_, limit)| *limit)
        .unwrap_or(USER_ACTION_DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_path_prefixes() {
        assert_eq!(tier_for_path("/api/auth/login"), Tier::Auth);
        assert_eq!(tier_for_path("/api/items"), Tier::Api);
        assert_eq!(tier_for_path("/health"), Tier::General);
    }

    #[test]
    fn login_override_is_stricter_than_auth_tier() {
        let (prefix, limit) = endpoint_override("/api/auth/login").unwrap();
        assert_eq!(prefix, "/api/auth/login");
        assert!(limit.max_requests < AUTH_LIMIT.max_requests);
        assert_eq!(limit.max_requests, 5);
    }

    #[test]
    fn longest_prefix_wins_and_unlisted_paths_fall_through() {
        assert!(endpoint_override("/api/items").is_none());
        // A sub-path of a listed endpoint inherits its override.
        let (prefix, _) = endpoint_override("/api/wallet/withdraw/confirm").unwrap();
        assert_eq!(prefix, "/api/wallet/withdraw");
        // Prefix match requires a segment boundary.
        assert!(endpoint_override("/api/friendships").is_none());
    }

    #[test]
    fn action_table_has_its_own_default() {
        assert_eq!(user_action_limit("challenge_create").max_requests, 10);
        assert_eq!(user_action_limit("unlisted_action"), USER_ACTION_DEFAULT);
    }
}
