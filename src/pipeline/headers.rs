//! Fixed security response headers.
//!
//! Applied to every response leaving the pipeline, early rejections
//! included. Values are constants except for CORS (configured) and HSTS
//! (production only).

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::SecurityConfig;

const CSP: &str =
    "default-src 'self'; frame-ancestors 'none'; base-uri 'self'; object-src 'none'";
const HSTS: &str = "max-age=31536000; includeSubDomains";
const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

pub fn apply_security_headers(headers: &mut HeaderMap, config: &SecurityConfig) {
    set(headers, "x-content-type-options", "nosniff");
    set(headers, "x-frame-options", "DENY");
    set(headers, "x-xss-protection", "1; mode=block");
    set(headers, "content-security-policy", CSP);
    if config.production {
        set(headers, "strict-transport-security", HSTS);
    }
    // Mask the upstream server identity.
    set(headers, "server", "gateway");
    set(headers, "x-powered-by", "");

    set(
        headers,
        "access-control-allow-origin",
        &config.cors.allow_origin,
    );
    set(headers, "access-control-allow-methods", ALLOW_METHODS);
    set(headers, "access-control-allow-headers", ALLOW_HEADERS);
    if config.cors.allow_credentials {
        set(headers, "access-control-allow-credentials", "true");
    }
}

fn set(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}
