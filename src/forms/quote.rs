use serde::{Deserialize, Serialize};

use super::contact::{
    EMAIL_MAX_LENGTH, MESSAGE_MAX_LENGTH, MESSAGE_MIN_LENGTH, NAME_MAX_LENGTH, NAME_MIN_LENGTH,
    PHONE_MAX_LENGTH,
};
use super::{non_empty, Checker, FieldError};
use crate::sites::FlowOption;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuoteForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub service_category: String,
    pub message: String,
    pub website: Option<String>,
}

impl QuoteForm {
    pub fn validate(self, categories: &[FlowOption]) -> Result<Self, Vec<FieldError>> {
        let form = Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: non_empty(self.phone),
            service_category: self.service_category.trim().to_string(),
            message: self.message.trim().to_string(),
            website: self.website,
        };

        let mut c = Checker::default();
        c.length(
            "name",
            &form.name,
            NAME_MIN_LENGTH,
            NAME_MAX_LENGTH,
            "Name must be at least 2 characters",
        );
        c.email("email", &form.email, EMAIL_MAX_LENGTH);
        c.optional_max("phone", form.phone.as_deref(), PHONE_MAX_LENGTH);
        if !categories.iter().any(|o| o.value == form.service_category) {
            c.fail("serviceCategory", "Please select a service category");
        }
        c.length(
            "message",
            &form.message,
            MESSAGE_MIN_LENGTH,
            MESSAGE_MAX_LENGTH,
            "Message must be at least 10 characters",
        );
        c.finish()?;

        Ok(form)
    }

    /// Message as stored on the lead, prefixed with the category label.
    pub fn lead_message(&self, categories: &[FlowOption]) -> String {
        let label = categories
            .iter()
            .find(|o| o.value == self.service_category)
            .map(|o| o.label.as_str())
            .unwrap_or(self.service_category.as_str());
        format!("[{}] {}", label, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::SiteConfig;

    fn valid() -> QuoteForm {
        QuoteForm {
            name: "Grace Hopper".to_string(),
            email: "grace@example.com".to_string(),
            service_category: "emergency-response".to_string(),
            message: "Burst pipe under the kitchen sink.".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_known_category_and_prefixes_message() {
        let site = SiteConfig::plumber_template();
        let categories = site.quote_categories().unwrap();
        let form = valid().validate(categories).unwrap();
        assert_eq!(
            form.lead_message(categories),
            "[Emergency Response] Burst pipe under the kitchen sink."
        );
    }

    #[test]
    fn rejects_unknown_category() {
        let site = SiteConfig::plumber_template();
        let errors = QuoteForm {
            service_category: "roofing".to_string(),
            ..valid()
        }
        .validate(site.quote_categories().unwrap())
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "serviceCategory");
    }
}
