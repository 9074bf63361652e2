use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::Environment;
use crate::error::{AppError, Result};

const NONCE_BYTE_LENGTH: usize = 16;
pub const CSP_NONCE_HEADER: &str = "x-csp-nonce";

pub fn create_csp_nonce() -> String {
    let bytes: [u8; NONCE_BYTE_LENGTH] = rand::random();
    STANDARD.encode(bytes)
}

pub fn build_content_security_policy(nonce: &str, is_development: bool) -> Result<String> {
    if nonce.is_empty() {
        return Err(AppError::Config(
            "CSP nonce must be a non-empty string".to_string(),
        ));
    }

    let nonce_source = format!("'nonce-{}'", nonce);
    let mut script_sources = vec![
        "'self'",
        nonce_source.as_str(),
        "https://www.googletagmanager.com",
    ];
    if is_development {
        script_sources.insert(1, "'unsafe-eval'");
    }

    Ok([
        "default-src 'self'".to_string(),
        format!("script-src {}", script_sources.join(" ")),
        "style-src 'self' 'unsafe-inline'".to_string(),
        "img-src 'self' data: https:".to_string(),
        "font-src 'self' data:".to_string(),
        "connect-src 'self' https://www.google-analytics.com https://www.googletagmanager.com"
            .to_string(),
        "frame-ancestors 'none'".to_string(),
    ]
    .join("; "))
}

/// Static OWASP header set. HSTS is only sent in production.
pub fn security_headers(environment: Environment) -> Vec<(&'static str, &'static str)> {
    let mut headers = vec![
        ("X-Frame-Options", "DENY"),
        ("X-Content-Type-Options", "nosniff"),
        ("Referrer-Policy", "strict-origin-when-cross-origin"),
        (
            "Permissions-Policy",
            "camera=(), microphone=(), geolocation=(), interest-cohort=()",
        ),
        ("X-DNS-Prefetch-Control", "on"),
        ("X-Download-Options", "noopen"),
        ("X-Permitted-Cross-Domain-Policies", "none"),
    ];

    if environment.is_production() {
        headers.push((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains; preload",
        ));
    }

    headers
}
