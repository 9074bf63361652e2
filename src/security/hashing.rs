use sha2::{Digest, Sha256};

pub const IP_HASH_SALT: &str = "contact_form_ip";
pub const EMAIL_HASH_SALT: &str = "contact_form_email";
pub const SPAN_HASH_SALT: &str = "contact_form_span";

/// Hex-encoded `sha256("<salt>:<value>")`.
pub fn hash_identifier(value: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn hash_ip(value: &str) -> String {
    hash_identifier(value, IP_HASH_SALT)
}

pub fn hash_email(value: &str) -> String {
    hash_identifier(value, EMAIL_HASH_SALT)
}

pub fn hash_span_value(value: &str) -> String {
    hash_identifier(value, SPAN_HASH_SALT)
}

/// Key sent with CRM upserts so a replayed sync can't create a duplicate contact.
pub fn crm_idempotency_key(lead_id: &str, email_hash: &str) -> String {
    hash_span_value(&format!("{}:{}", lead_id, email_hash))
}
