use chrono::{DateTime, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{non_empty, Checker, FieldError};
use crate::sites::BookingOptions;

static PERSON_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z\s\-']+$").expect("valid regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+]?[(]?[0-9]{1,4}[)]?[-\s.]?[(]?[0-9]{1,4}[)]?[-\s.]?[0-9]{1,9}$")
        .expect("valid regex")
});

const NOTES_MAX_LENGTH: usize = 500;
const DISPOSABLE_DOMAINS: [&str; 3] = ["10minutemail.com", "tempmail.com", "guerrillamail.com"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookingForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub service_type: String,
    pub preferred_date: String,
    pub time_slot: String,
    pub notes: Option<String>,
    pub honeypot: Option<String>,
    pub timestamp: Option<String>,
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|d| d.date_naive()))
}

fn check_person_name(c: &mut Checker, field: &str, label: &str, value: &str) {
    let len = value.chars().count();
    if len < 2 {
        c.fail(field, format!("{} must be at least 2 characters", label));
    } else if len > 50 {
        c.fail(field, format!("{} must be less than 50 characters", label));
    } else if !PERSON_NAME_RE.is_match(value) {
        c.fail(
            field,
            format!(
                "{} can only contain letters, spaces, hyphens, and apostrophes",
                label
            ),
        );
    }
}

impl BookingForm {
    /// Validates against the site's booking options. `today` is injected so
    /// the date window is testable.
    pub fn validate(
        self,
        options: &BookingOptions<'_>,
        today: NaiveDate,
    ) -> Result<Self, Vec<FieldError>> {
        let form = Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            phone: self.phone.trim().to_string(),
            service_type: self.service_type.trim().to_string(),
            preferred_date: self.preferred_date.trim().to_string(),
            time_slot: self.time_slot.trim().to_string(),
            notes: non_empty(self.notes),
            honeypot: self.honeypot,
            timestamp: self.timestamp,
        };

        let mut c = Checker::default();
        check_person_name(&mut c, "firstName", "First name", &form.first_name);
        check_person_name(&mut c, "lastName", "Last name", &form.last_name);
        c.email("email", &form.email, 254);

        if !PHONE_RE.is_match(&form.phone) {
            c.fail("phone", "Please enter a valid phone number");
        } else if form.phone.len() < 10 {
            c.fail("phone", "Phone number must be at least 10 digits");
        } else if form.phone.len() > 20 {
            c.fail("phone", "Phone number must be less than 20 digits");
        }

        if !options
            .service_categories
            .iter()
            .any(|o| o.value == form.service_type)
        {
            c.fail("serviceType", "Please select a service type");
        }

        let max_date = today + Duration::days(i64::from(options.max_advance_days));
        match parse_date(&form.preferred_date) {
            Some(date) if date > today && date < max_date => {}
            Some(_) => c.fail(
                "preferredDate",
                format!(
                    "Date must be within the next {} days",
                    options.max_advance_days
                ),
            ),
            None => c.fail("preferredDate", "Please select a preferred date"),
        }

        if !options.time_slots.iter().any(|o| o.value == form.time_slot) {
            c.fail("timeSlot", "Please select a preferred time slot");
        }

        if let Some(notes) = &form.notes {
            if notes.chars().count() > NOTES_MAX_LENGTH {
                c.fail("notes", "Notes must be less than 500 characters");
            } else if notes.contains(['<', '>']) {
                c.fail("notes", "Notes cannot contain HTML tags");
            }
        }

        c.finish()?;
        Ok(form)
    }

    pub fn preferred_date(&self) -> Option<NaiveDate> {
        parse_date(&self.preferred_date)
    }

    /// Patterns worth a human look. Matching bookings are accepted but flagged.
    pub fn suspicious_patterns(&self) -> Vec<&'static str> {
        let mut hits = Vec::new();

        let shouting = |s: &str| {
            s.chars().any(|c| c.is_ascii_alphabetic())
                && s.chars().all(|c| c.is_ascii_uppercase() || c.is_whitespace())
        };
        if shouting(&self.first_name) && shouting(&self.last_name) {
            hits.push("all_caps_name");
        }

        let domain = self.email.rsplit('@').next().unwrap_or_default();
        if DISPOSABLE_DOMAINS.contains(&domain) {
            hits.push("disposable_email");
        }

        if self.service_type == "consultation"
            && self
                .notes
                .as_deref()
                .map(|n| n.to_lowercase().contains("test"))
                .unwrap_or(false)
        {
            hits.push("test_consultation");
        }

        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::SiteConfig;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn valid() -> BookingForm {
        BookingForm {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: " Ada@Example.com ".to_string(),
            phone: "(555) 123-4567".to_string(),
            service_type: "treatment".to_string(),
            preferred_date: "2026-03-10".to_string(),
            time_slot: "morning".to_string(),
            ..Default::default()
        }
    }

    fn check(form: BookingForm) -> Result<BookingForm, Vec<FieldError>> {
        let site = SiteConfig::hair_salon_template();
        let options = site.booking_options().unwrap();
        form.validate(&options, today())
    }

    fn failed_fields(form: BookingForm) -> Vec<String> {
        check(form)
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect()
    }

    #[test]
    fn accepts_and_normalizes() {
        let form = check(valid()).unwrap();
        assert_eq!(form.email, "ada@example.com");
    }

    #[test]
    fn date_window_is_exclusive_on_both_ends() {
        for date in ["2026-03-01", "2026-05-30", "2025-12-25", "soon"] {
            let form = BookingForm {
                preferred_date: date.to_string(),
                ..valid()
            };
            assert_eq!(failed_fields(form), vec!["preferredDate"], "{date}");
        }

        let form = BookingForm {
            preferred_date: "2026-05-29".to_string(),
            ..valid()
        };
        assert!(check(form).is_ok());
    }

    #[test]
    fn rfc3339_dates_are_accepted() {
        let form = BookingForm {
            preferred_date: "2026-03-02T15:00:00Z".to_string(),
            ..valid()
        };
        assert!(check(form).is_ok());
    }

    #[test]
    fn unknown_service_and_slot_are_rejected() {
        let form = BookingForm {
            service_type: "tattoo".to_string(),
            time_slot: "midnight".to_string(),
            ..valid()
        };
        assert_eq!(failed_fields(form), vec!["serviceType", "timeSlot"]);
    }

    #[test]
    fn names_and_notes_reject_markup() {
        let form = BookingForm {
            first_name: "<b>Ada</b>".to_string(),
            notes: Some("see <a href=x>".to_string()),
            ..valid()
        };
        assert_eq!(failed_fields(form), vec!["firstName", "notes"]);
    }

    #[test]
    fn short_phone_is_rejected() {
        let form = BookingForm {
            phone: "555-1234".to_string(),
            ..valid()
        };
        assert_eq!(failed_fields(form), vec!["phone"]);
    }

    #[test]
    fn flags_suspicious_patterns() {
        let form = BookingForm {
            first_name: "ADA".to_string(),
            last_name: "LOVELACE".to_string(),
            email: "x@tempmail.com".to_string(),
            service_type: "consultation".to_string(),
            notes: Some("This is a TEST".to_string()),
            ..valid()
        };
        assert_eq!(
            form.suspicious_patterns(),
            vec!["all_caps_name", "disposable_email", "test_consultation"]
        );
        assert!(valid().suspicious_patterns().is_empty());
    }
}
