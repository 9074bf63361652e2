pub mod manager;

use serde::Serialize;

use crate::forms::{honeypot_filled, BookingForm, FieldError};
use crate::ratelimit::check_submission;
use crate::security::{hash_email, hash_ip, hash_span_value};
use crate::sites::SiteConfig;
use crate::state::{AppState, RequestMeta};

pub use manager::{format_long_date, Booking, BookingError, BookingManager, BookingStatus};

pub const MSG_INVALID_ORIGIN: &str = "Invalid request. Please refresh the page and try again.";
pub const MSG_SUBMIT_FAILED: &str = "Failed to submit booking request. Please try again.";
pub const MSG_RATE_LIMITED: &str = "Too many booking attempts. Please try again later.";

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_confirmation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingReply {
    pub status: u16,
    pub body: BookingResponse,
}

impl BookingReply {
    fn failed(status: u16, error: &str) -> Self {
        Self {
            status,
            body: BookingResponse {
                error: Some(error.to_string()),
                ..Default::default()
            },
        }
    }

    fn ok(booking: &Booking) -> Self {
        Self {
            status: 200,
            body: BookingResponse {
                success: true,
                booking_id: Some(booking.id.clone()),
                confirmation_number: Some(booking.confirmation_number.clone()),
                ..Default::default()
            },
        }
    }
}

impl From<BookingError> for BookingReply {
    fn from(err: BookingError) -> Self {
        let status = match err {
            BookingError::NotFound => 404,
            BookingError::AlreadyProcessed | BookingError::AlreadyCancelled => 409,
        };
        Self::failed(status, &err.to_string())
    }
}

/// Confirmation-page view of a booking.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub service_type: String,
    pub time_slot: String,
    pub notes: Option<String>,
    pub service_label: Option<String>,
    pub formatted_date: Option<String>,
}

pub async fn submit_booking(
    state: &AppState,
    site: &SiteConfig,
    request: RequestMeta<'_>,
    form: BookingForm,
) -> BookingReply {
    let Some(options) = site.booking_options() else {
        return BookingReply::failed(404, "Booking is not available for this site.");
    };

    if !request.origin_allowed(site) {
        return BookingReply::failed(403, MSG_INVALID_ORIGIN);
    }
    if honeypot_filled(form.honeypot.as_deref()) {
        log::warn!("Honeypot field filled on booking form");
        return BookingReply::failed(400, MSG_SUBMIT_FAILED);
    }

    let today = chrono::Utc::now().date_naive();
    let form = match form.validate(&options, today) {
        Ok(form) => form,
        Err(errors) => {
            let mut reply = BookingReply::failed(400, MSG_SUBMIT_FAILED);
            reply.body.errors = Some(errors);
            return reply;
        }
    };

    let email_hash = hash_email(&form.email);
    let ip_hash = hash_ip(&request.client_ip(&state.config));
    let limits = check_submission(
        state.limiter.as_ref(),
        &state.config.rate_limit,
        "booking",
        &email_hash,
        &ip_hash,
    )
    .await;
    if !limits.allowed() {
        log::warn!("Booking rate limit exceeded for ip {}", ip_hash);
        return BookingReply::failed(429, MSG_RATE_LIMITED);
    }

    let patterns = form.suspicious_patterns();
    if !patterns.is_empty() {
        log::warn!(
            "Suspicious booking activity {}",
            crate::telemetry::fields(serde_json::json!({
                "email_hash": email_hash,
                "ip_hash": ip_hash,
                "patterns": patterns,
            }))
        );
    }

    let service_label = options.service_label(&form.service_type).map(str::to_string);
    let booking = state.bookings.create(&site.id, form, !patterns.is_empty());
    log::info!(
        "Booking submitted {}",
        crate::telemetry::fields(serde_json::json!({
            "booking_hash": hash_span_value(&booking.id),
            "confirmation_number": booking.confirmation_number,
            "service": service_label,
        }))
    );

    let mut reply = BookingReply::ok(&booking);
    reply.body.requires_confirmation = Some(true);
    reply
}

pub fn confirm_booking(state: &AppState, site: &SiteConfig, id: &str) -> BookingReply {
    match state.bookings.confirm(&site.id, id) {
        Ok(booking) => {
            log::info!("Booking confirmed {}", booking.confirmation_number);
            BookingReply::ok(&booking)
        }
        Err(e) => e.into(),
    }
}

pub fn cancel_booking(state: &AppState, site: &SiteConfig, id: &str) -> BookingReply {
    match state.bookings.cancel(&site.id, id) {
        Ok(booking) => {
            log::info!("Booking cancelled {}", booking.confirmation_number);
            BookingReply::ok(&booking)
        }
        Err(e) => e.into(),
    }
}

pub fn booking_details(state: &AppState, site: &SiteConfig, id: &str) -> Option<BookingDetails> {
    let options = site.booking_options()?;
    let booking = state.bookings.get(&site.id, id)?;
    let form = booking.form.clone();
    let service_label = options.service_label(&form.service_type).map(str::to_string);

    Some(BookingDetails {
        formatted_date: form.preferred_date().map(format_long_date),
        service_label,
        first_name: form.first_name,
        last_name: form.last_name,
        email: form.email,
        service_type: form.service_type,
        time_slot: form.time_slot,
        notes: form.notes,
        booking,
    })
}
