//! Body validation, dispatched by content type.
//!
//! JSON bodies are pre-scanned as raw text, parsed, then recursively
//! sanitized under structural caps. Form bodies reuse the query-parameter
//! caps. Multipart bodies get per-file checks through a minimal boundary
//! parser; text fields are treated like form fields.

use axum::http::{header, HeaderMap};
use serde_json::{Map, Value};

use super::sanitize::{sanitize_string, MAX_STRING_LEN};
use super::{detectors, ValidationError, MAX_QUERY_KEY_LEN, MAX_QUERY_VALUE_LEN};
use crate::config::schema::InputValidationConfig;

/// Maximum JSON nesting depth.
pub const MAX_JSON_DEPTH: usize = 10;
/// Maximum JSON array length.
pub const MAX_ARRAY_LEN: usize = 1000;
/// Maximum keys per JSON object.
pub const MAX_OBJECT_KEYS: usize = 100;
/// Maximum uploaded file size in bytes.
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
/// Maximum uploaded filename length.
pub const MAX_FILENAME_LEN: usize = 255;

const EXTENSION_BLOCKLIST: &[&str] = &[
    ".exe", ".dll", ".bat", ".cmd", ".sh", ".php", ".phtml", ".asp", ".aspx", ".jsp", ".jar",
    ".msi", ".scr", ".vbs", ".ps1",
];

const MIME_ALLOWLIST: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "text/csv",
    "application/json",
];

/// Validate and sanitize the body according to its content type.
///
/// Returns the sanitized representation when the body was understood.
pub fn check_body(
    headers: &HeaderMap,
    body: &[u8],
    config: &InputValidationConfig,
    errors: &mut Vec<ValidationError>,
) -> Option<Value> {
    if body.is_empty() {
        return None;
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "application/json" => check_json(body, config, errors),
        "application/x-www-form-urlencoded" => Some(check_form(body, config, errors)),
        "multipart/form-data" => check_multipart(content_type, body, config, errors),
        _ => None,
    }
}

fn check_json(
    body: &[u8],
    config: &InputValidationConfig,
    errors: &mut Vec<ValidationError>,
) -> Option<Value> {
    let raw = String::from_utf8_lossy(body);
    if let Some(label) = detectors::scan(&raw) {
        errors.push(ValidationError::new(
            label,
            "body",
            "body matches a known attack pattern",
        ));
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(value) => Some(sanitize_value(&value, 0, "body", config, errors)),
        Err(_) => {
            errors.push(ValidationError::new(
                "invalid_format",
                "body",
                "body is not valid JSON",
            ));
            None
        }
    }
}

fn sanitize_value(
    value: &Value,
    depth: usize,
    path: &str,
    config: &InputValidationConfig,
    errors: &mut Vec<ValidationError>,
) -> Value {
    if depth > MAX_JSON_DEPTH {
        errors.push(ValidationError::new(
            "depth_exceeded",
            path,
            format!("nesting exceeds {MAX_JSON_DEPTH} levels"),
        ));
        return Value::Null;
    }

    match value {
        Value::String(s) => {
            if let Some(label) = detectors::scan(s) {
                errors.push(ValidationError::new(
                    label,
                    path,
                    "string value matches a known attack pattern",
                ));
            }
            Value::String(sanitize_string(s, config.sanitize_html))
        }
        Value::Array(items) => {
            if items.len() > MAX_ARRAY_LEN {
                errors.push(ValidationError::new(
                    "array_too_long",
                    path,
                    format!("array exceeds {MAX_ARRAY_LEN} elements"),
                ));
            }
            Value::Array(
                items
                    .iter()
                    .take(MAX_ARRAY_LEN)
                    .enumerate()
                    .map(|(i, item)| {
                        sanitize_value(item, depth + 1, &format!("{path}[{i}]"), config, errors)
                    })
                    .collect(),
            )
        }
        Value::Object(map) => {
            if map.len() > MAX_OBJECT_KEYS {
                errors.push(ValidationError::new(
                    "too_many_keys",
                    path,
                    format!("object exceeds {MAX_OBJECT_KEYS} keys"),
                ));
            }
            let mut out = Map::new();
            for (key, item) in map.iter().take(MAX_OBJECT_KEYS) {
                let child = format!("{path}.{key}");
                if let Some(label) = detectors::scan(key) {
                    errors.push(ValidationError::new(
                        label,
                        &child,
                        "object key matches a known attack pattern",
                    ));
                }
                let clean_key = sanitize_string(key, config.sanitize_html);
                out.insert(clean_key, sanitize_value(item, depth + 1, &child, config, errors));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn check_form(
    body: &[u8],
    config: &InputValidationConfig,
    errors: &mut Vec<ValidationError>,
) -> Value {
    let mut out = Map::new();
    for (name, value) in url::form_urlencoded::parse(body) {
        let field = format!("form:{name}");
        if name.len() > MAX_QUERY_KEY_LEN {
            errors.push(ValidationError::new(
                "field_name_too_long",
                &field,
                format!("field name exceeds {MAX_QUERY_KEY_LEN} characters"),
            ));
        }
        if value.len() > MAX_QUERY_VALUE_LEN {
            errors.push(ValidationError::new(
                "field_value_too_long",
                &field,
                format!("field value exceeds {MAX_QUERY_VALUE_LEN} characters"),
            ));
        }
        for text in [name.as_ref(), value.as_ref()] {
            if let Some(label) = detectors::scan(text) {
                errors.push(ValidationError::new(
                    label,
                    &field,
                    "form field matches a known attack pattern",
                ));
            }
        }
        out.insert(
            sanitize_string(&name, config.sanitize_html),
            Value::String(sanitize_string(&value, config.sanitize_html)),
        );
    }
    Value::Object(out)
}

/// One parsed multipart section.
struct Part<'a> {
    name: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
    data: &'a [u8],
}

fn check_multipart(
    content_type: &str,
    body: &[u8],
    config: &InputValidationConfig,
    errors: &mut Vec<ValidationError>,
) -> Option<Value> {
    let boundary = match content_type
        .split(';')
        .filter_map(|p| p.trim().strip_prefix("boundary="))
        .next()
    {
        Some(b) => b.trim_matches('"').to_string(),
        None => {
            errors.push(ValidationError::new(
                "invalid_format",
                "body",
                "multipart body without boundary",
            ));
            return None;
        }
    };

    let parts = match parse_multipart(body, &boundary) {
        Some(parts) => parts,
        None => {
            errors.push(ValidationError::new(
                "invalid_format",
                "body",
                "malformed multipart body",
            ));
            return None;
        }
    };

    let mut fields = Map::new();
    let mut files = Vec::new();
    for part in parts {
        let name = part.name.clone().unwrap_or_else(|| "unnamed".to_string());
        if let Some(filename) = &part.filename {
            check_file_part(&name, filename, &part, errors);
            files.push(Value::String(sanitize_string(filename, true)));
        } else {
            let field = format!("form:{name}");
            let text = String::from_utf8_lossy(part.data);
            if text.len() > MAX_STRING_LEN {
                errors.push(ValidationError::new(
                    "field_value_too_long",
                    &field,
                    format!("field value exceeds {MAX_STRING_LEN} characters"),
                ));
            }
            if let Some(label) = detectors::scan(&text) {
                errors.push(ValidationError::new(
                    label,
                    &field,
                    "form field matches a known attack pattern",
                ));
            }
            fields.insert(
                sanitize_string(&name, config.sanitize_html),
                Value::String(sanitize_string(&text, config.sanitize_html)),
            );
        }
    }

    let mut out = Map::new();
    out.insert("fields".to_string(), Value::Object(fields));
    out.insert("files".to_string(), Value::Array(files));
    Some(Value::Object(out))
}

fn check_file_part(name: &str, filename: &str, part: &Part<'_>, errors: &mut Vec<ValidationError>) {
    let field = format!("file:{name}");

    if part.data.len() > MAX_FILE_SIZE {
        errors.push(ValidationError::new(
            "file_too_large",
            &field,
            format!("file exceeds {MAX_FILE_SIZE} bytes"),
        ));
    }
    if filename.len() > MAX_FILENAME_LEN {
        errors.push(ValidationError::new(
            "filename_too_long",
            &field,
            format!("filename exceeds {MAX_FILENAME_LEN} characters"),
        ));
    }
    if filename.contains('\0')
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
        || filename.chars().any(|c| matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*'))
    {
        errors.push(ValidationError::new(
            "invalid_filename",
            &field,
            "filename contains forbidden characters",
        ));
    }
    let lower = filename.to_ascii_lowercase();
    if EXTENSION_BLOCKLIST.iter().any(|ext| lower.ends_with(ext)) {
        errors.push(ValidationError::new(
            "forbidden_extension",
            &field,
            "file extension is not allowed",
        ));
    }
    if let Some(mime) = &part.content_type {
        if !MIME_ALLOWLIST.contains(&mime.as_str()) {
            errors.push(ValidationError::new(
                "forbidden_mime_type",
                &field,
                format!("file content type {mime} is not allowed"),
            ));
        }
    }
}

/// Minimal multipart parser: split on the boundary, separate part headers
/// from data at the first blank line. Returns None on structural errors.
fn parse_multipart<'a>(body: &'a [u8], boundary: &str) -> Option<Vec<Part<'a>>> {
    let delimiter = format!("--{boundary}");
    let text_regions = split_on(body, delimiter.as_bytes());
    if text_regions.len() < 2 {
        return None;
    }

    let mut parts = Vec::new();
    // First region is the preamble, last is the epilogue after `--`.
    for region in &text_regions[1..] {
        let region = strip_leading_crlf(region);
        if region.starts_with(b"--") || region.is_empty() {
            break;
        }
        let split_at = find(region, b"\r\n\r\n")?;
        let header_block = &region[..split_at];
        let data = strip_trailing_crlf(&region[split_at + 4..]);

        let mut name = None;
        let mut filename = None;
        let mut content_type = None;
        for line in String::from_utf8_lossy(header_block).lines() {
            let lower = line.to_ascii_lowercase();
            if lower.starts_with("content-disposition:") {
                name = extract_param(line, "name");
                filename = extract_param(line, "filename");
            } else if let Some(value) = lower.strip_prefix("content-type:") {
                content_type = Some(value.trim().to_string());
            }
        }
        parts.push(Part {
            name,
            filename,
            content_type,
            data,
        });
    }
    Some(parts)
}

fn extract_param(line: &str, param: &str) -> Option<String> {
    line.split(';').find_map(|piece| {
        let piece = piece.trim();
        piece
            .strip_prefix(&format!("{param}="))
            .map(|v| v.trim_matches('"').to_string())
    })
}

fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut regions = Vec::new();
    let mut start = 0;
    while let Some(pos) = find(&haystack[start..], needle) {
        regions.push(&haystack[start..start + pos]);
        start += pos + needle.len();
    }
    regions.push(&haystack[start..]);
    regions
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn strip_leading_crlf(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\r\n").unwrap_or(data)
}

fn strip_trailing_crlf(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n").unwrap_or(data)
}
