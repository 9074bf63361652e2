use serde::{Deserialize, Serialize};

use super::{non_empty, Checker, FieldError};

pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 100;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PHONE_MAX_LENGTH: usize = 20;
pub const COMPANY_MAX_LENGTH: usize = 100;
pub const SERVICES_INTERESTED_MAX_LENGTH: usize = 200;
pub const PREFERRED_APPOINTMENT_MAX_LENGTH: usize = 100;
pub const MESSAGE_MIN_LENGTH: usize = 10;
pub const MESSAGE_MAX_LENGTH: usize = 5000;
pub const HEAR_ABOUT_US_MAX_LENGTH: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub services_interested: Option<String>,
    pub preferred_appointment: Option<String>,
    /// Honeypot. Hidden from humans, must stay empty.
    pub website: Option<String>,
    pub message: String,
    pub hear_about_us: Option<String>,
}

impl ContactForm {
    /// Validates and returns the trimmed form.
    pub fn validate(self) -> Result<Self, Vec<FieldError>> {
        let form = Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            company: non_empty(self.company),
            phone: non_empty(self.phone),
            services_interested: non_empty(self.services_interested),
            preferred_appointment: non_empty(self.preferred_appointment),
            website: self.website,
            message: self.message.trim().to_string(),
            hear_about_us: non_empty(self.hear_about_us),
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
        c.optional_max("company", form.company.as_deref(), COMPANY_MAX_LENGTH);
        c.optional_max("phone", form.phone.as_deref(), PHONE_MAX_LENGTH);
        c.optional_max(
            "servicesInterested",
            form.services_interested.as_deref(),
            SERVICES_INTERESTED_MAX_LENGTH,
        );
        c.optional_max(
            "preferredAppointment",
            form.preferred_appointment.as_deref(),
            PREFERRED_APPOINTMENT_MAX_LENGTH,
        );
        c.length(
            "message",
            &form.message,
            MESSAGE_MIN_LENGTH,
            MESSAGE_MAX_LENGTH,
            "Message must be at least 10 characters",
        );
        c.optional_max("hearAboutUs", form.hear_about_us.as_deref(), HEAR_ABOUT_US_MAX_LENGTH);
        c.finish()?;

        Ok(form)
    }
}
