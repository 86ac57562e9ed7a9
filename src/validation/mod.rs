//! Input validation subsystem.
//!
//! # Data Flow
//! ```text
//! Buffered request (method, uri, headers, body)
//!     → size check (declared and actual length)
//!     → header checks (length, null bytes, detectors, content-type, UA)
//!     → URL checks (length, path scan, per-pair query scan)
//!     → body checks, dispatched by content-type (body.rs)
//!     → ValidationResult { valid, errors, sanitized }
//! ```
//!
//! # Design Decisions
//! - Collect every violation, never fail fast
//! - Detectors are a data-driven table (detectors.rs)
//! - Validation is pure and synchronous; the pipeline owns body buffering

pub mod body;
pub mod detectors;
pub mod sanitize;

use axum::http::{header, HeaderMap, Method, Uri};
use serde::Serialize;

use crate::config::schema::InputValidationConfig;

/// Maximum accepted header value length in characters.
pub const MAX_HEADER_VALUE_LEN: usize = 8192;
/// Maximum accepted total URL length in characters.
pub const MAX_URL_LEN: usize = 2048;
/// Maximum query parameter key length.
pub const MAX_QUERY_KEY_LEN: usize = 256;
/// Maximum query parameter value length.
pub const MAX_QUERY_VALUE_LEN: usize = 4096;

/// Content types the gateway accepts for request bodies.
const CONTENT_TYPE_ALLOWLIST: &[&str] = &[
    "application/json",
    "application/x-www-form-urlencoded",
    "multipart/form-data",
    "text/plain",
    "application/xml",
    "text/xml",
];

/// A single validation violation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationError {
    /// Machine-readable kind: a detector label or a structural check name.
    pub kind: String,
    /// Where the violation was found (header/query/body path).
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        kind: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Outcome of validating one request.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    /// Sanitized body representation, when a body was understood.
    pub sanitized: Option<serde_json::Value>,
}

impl ValidationResult {
    fn from_parts(errors: Vec<ValidationError>, sanitized: Option<serde_json::Value>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            sanitized,
        }
    }
}

/// Pattern- and size-based validator for headers, URL, and body.
pub struct InputValidator {
    config: InputValidationConfig,
}

impl InputValidator {
    pub fn new(config: InputValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a buffered request, collecting all violations.
    pub fn validate(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> ValidationResult {
        let mut errors = Vec::new();

        self.check_size(headers, body, &mut errors);
        self.check_headers(method, headers, &mut errors);
        self.check_url(uri, &mut errors);
        let sanitized = body::check_body(headers, body, &self.config, &mut errors);

        ValidationResult::from_parts(errors, sanitized)
    }

    fn check_size(&self, headers: &HeaderMap, body: &[u8], errors: &mut Vec<ValidationError>) {
        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());

        if let Some(len) = declared {
            if len > self.config.max_body_size {
                errors.push(ValidationError::new(
                    "body_too_large",
                    "content-length",
                    format!("declared body of {len} bytes exceeds limit"),
                ));
            }
        }
        if body.len() > self.config.max_body_size {
            errors.push(ValidationError::new(
                "body_too_large",
                "body",
                format!("body of {} bytes exceeds limit", body.len()),
            ));
        }
    }

    fn check_headers(&self, method: &Method, headers: &HeaderMap, errors: &mut Vec<ValidationError>) {
        for (name, value) in headers.iter() {
            let field = format!("header:{name}");
            let text = String::from_utf8_lossy(value.as_bytes());

            if text.len() > MAX_HEADER_VALUE_LEN {
                errors.push(ValidationError::new(
                    "header_too_long",
                    &field,
                    format!("header value exceeds {MAX_HEADER_VALUE_LEN} characters"),
                ));
                continue;
            }
            if text.contains('\0') {
                errors.push(ValidationError::new(
                    "null_byte",
                    &field,
                    "header value contains a null byte",
                ));
            }
            if let Some(label) = detectors::scan(&text) {
                errors.push(ValidationError::new(
                    label,
                    &field,
                    "header value matches a known attack pattern",
                ));
            }
        }

        if let Some(content_type) = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            let mime = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            let body_expected = matches!(*method, Method::POST | Method::PUT | Method::PATCH);
            if body_expected && !CONTENT_TYPE_ALLOWLIST.contains(&mime.as_str()) {
                errors.push(ValidationError::new(
                    "unsupported_content_type",
                    "header:content-type",
                    format!("content type {mime} is not allowed"),
                ));
            }
        }

        if let Some(user_agent) = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
        {
            if detectors::is_scanner_user_agent(user_agent) {
                errors.push(ValidationError::new(
                    "scanner_user_agent",
                    "header:user-agent",
                    "user agent matches a known scanner signature",
                ));
            }
        }
    }

    fn check_url(&self, uri: &Uri, errors: &mut Vec<ValidationError>) {
        let full = uri.to_string();
        if full.len() > MAX_URL_LEN {
            errors.push(ValidationError::new(
                "url_too_long",
                "url",
                format!("url exceeds {MAX_URL_LEN} characters"),
            ));
        }
        if full.contains('\0') {
            errors.push(ValidationError::new(
                "null_byte",
                "url",
                "url contains a null byte",
            ));
        }
        if let Some(label) = detectors::scan(uri.path()) {
            errors.push(ValidationError::new(
                label,
                "url:path",
                "path matches a known attack pattern",
            ));
        }

        if let Some(query) = uri.query() {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                let field = format!("query:{key}");
                if key.len() > MAX_QUERY_KEY_LEN {
                    errors.push(ValidationError::new(
                        "query_key_too_long",
                        &field,
                        format!("query key exceeds {MAX_QUERY_KEY_LEN} characters"),
                    ));
                }
                if value.len() > MAX_QUERY_VALUE_LEN {
                    errors.push(ValidationError::new(
                        "query_value_too_long",
                        &field,
                        format!("query value exceeds {MAX_QUERY_VALUE_LEN} characters"),
                    ));
                }
                if key.contains('\0') || value.contains('\0') {
                    errors.push(ValidationError::new(
                        "null_byte",
                        &field,
                        "query parameter contains a null byte",
                    ));
                }
                for text in [key.as_ref(), value.as_ref()] {
                    if let Some(label) = detectors::scan(text) {
                        errors.push(ValidationError::new(
                            label,
                            &field,
                            "query parameter matches a known attack pattern",
                        ));
                    }
                }
            }
        }
    }
}
