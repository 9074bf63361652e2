use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

pub const REDACTED: &str = "[REDACTED]";
const REDACTED_EMAIL: &str = "[REDACTED_EMAIL]";
const REDACTED_PHONE: &str = "[REDACTED_PHONE]";

const SECRET_KEYS: [&str; 13] = [
    "password",
    "passcode",
    "token",
    "authorization",
    "cookie",
    "api_key",
    "apikey",
    "secret",
    "client_secret",
    "refresh_token",
    "access_token",
    "session_id",
    "sessionid",
];

const PII_KEYS: [&str; 13] = [
    "email",
    "phone",
    "phonenumber",
    "telephone",
    "mobile",
    "name",
    "firstname",
    "lastname",
    "company",
    "message",
    "form",
    "formdata",
    "contact",
];

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("valid regex"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d[\d\s().-]{7,}\d").expect("valid regex"));

fn normalize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn is_secret_key(key: &str) -> bool {
    let normalized = normalize_key(key);
    SECRET_KEYS.iter().any(|s| normalized.contains(s))
}

fn is_pii_key(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase().replace(['_', '-'], "");
    PII_KEYS.contains(&lowered.as_str())
}

/// `*_hash` values are already one-way hashed and stay readable.
fn is_hashed_key(key: &str) -> bool {
    normalize_key(key).ends_with("_hash")
}

fn map_object(map: &Map<String, Value>, f: &dyn Fn(&str, &Value) -> Value) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), f(k.as_str(), v))).collect())
}

/// Replaces values under credential-like keys, recursively.
pub fn sanitize_log_context(value: &Value) -> Value {
    match value {
        Value::Object(map) => map_object(map, &|k, v| {
            if is_secret_key(k) {
                Value::String(REDACTED.to_string())
            } else {
                sanitize_log_context(v)
            }
        }),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_log_context).collect()),
        other => other.clone(),
    }
}

pub fn redact_string(value: &str) -> String {
    let without_emails = EMAIL_RE.replace_all(value, REDACTED_EMAIL);
    PHONE_RE.replace_all(&without_emails, REDACTED_PHONE).into_owned()
}

/// Strips personal data from an error-report payload: PII keys are blanked
/// and email/phone lookalikes inside any string are masked.
pub fn redact_pii(value: &Value) -> Value {
    match value {
        Value::Object(map) => map_object(map, &|k, v| {
            if is_pii_key(k) || is_secret_key(k) {
                Value::String(REDACTED.to_string())
            } else if is_hashed_key(k) {
                v.clone()
            } else {
                redact_pii(v)
            }
        }),
        Value::Array(items) => Value::Array(items.iter().map(redact_pii).collect()),
        Value::String(s) => Value::String(redact_string(s)),
        other => other.clone(),
    }
}

/// Renders a structured log context as compact JSON with secrets and
/// personal data removed.
pub fn fields(context: Value) -> String {
    redact_pii(&sanitize_log_context(&context)).to_string()
}
