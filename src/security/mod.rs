pub mod csp;
pub mod hashing;
pub mod origin;
pub mod sanitize;

pub use csp::{build_content_security_policy, create_csp_nonce, security_headers, CSP_NONCE_HEADER};
pub use hashing::{crm_idempotency_key, hash_email, hash_ip, hash_span_value};
pub use origin::{client_ip, validate_origin};
pub use sanitize::{escape_html, sanitize_email, sanitize_name, split_name};
