pub mod booking;
pub mod contact;
pub mod quote;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use booking::BookingForm;
pub use contact::ContactForm;
pub use quote::QuoteForm;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@<>]+@[^\s@<>]+\.[^\s@<>]{2,}$").expect("valid regex"));

/// Collects field errors for one form.
#[derive(Debug, Default)]
pub(crate) struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    pub fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Character-count bounds, inclusive.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize, too_short: &str) {
        let len = value.chars().count();
        if len < min {
            self.fail(field, too_short);
        } else if len > max {
            self.fail(field, format!("Must be at most {} characters", max));
        }
    }

    pub fn optional_max(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(v) = value {
            if v.chars().count() > max {
                self.fail(field, format!("Must be at most {} characters", max));
            }
        }
    }

    pub fn email(&mut self, field: &str, value: &str, max: usize) {
        if !EMAIL_RE.is_match(value) {
            self.fail(field, "Invalid email address");
        } else if value.len() > max {
            self.fail(field, format!("Must be at most {} characters", max));
        }
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// A filled honeypot means a bot filled the hidden field.
pub fn honeypot_filled(value: Option<&str>) -> bool {
    value.map(|v| !v.is_empty()).unwrap_or(false)
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        let mut c = Checker::default();
        c.email("email", "ada@example.com", 254);
        assert!(c.finish().is_ok());

        for bad in ["ada", "ada@", "@example.com", "ada@example", "a b@example.com"] {
            let mut c = Checker::default();
            c.email("email", bad, 254);
            assert!(c.finish().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn length_counts_chars_not_bytes() {
        let mut c = Checker::default();
        c.length("name", "Zoë", 2, 3, "short");
        assert!(c.finish().is_ok());
    }

    #[test]
    fn honeypot() {
        assert!(!honeypot_filled(None));
        assert!(!honeypot_filled(Some("")));
        assert!(honeypot_filled(Some("http://spam")));
    }
}
