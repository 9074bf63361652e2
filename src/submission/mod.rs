//! Contact and quote submission pipeline.
//!
//! origin check, honeypot, validation, sanitize + hash, dual rate limit,
//! store the lead, best-effort CRM sync, respond. A rate-limited submission
//! is still stored, flagged suspicious, before the 429 goes out.

use serde::Serialize;

use crate::error::Result;
use crate::forms::{honeypot_filled, ContactForm, FieldError, QuoteForm};
use crate::integrations::sync_lead;
use crate::leads::{NewLead, SUSPICION_RATE_LIMIT};
use crate::ratelimit::check_submission;
use crate::security::{escape_html, hash_email, hash_ip, hash_span_value, sanitize_email, sanitize_name};
use crate::sites::SiteConfig;
use crate::state::{AppState, RequestMeta};
use crate::telemetry::redact::redact_string;
use crate::telemetry::with_span;

pub const MSG_INVALID_ORIGIN: &str = "Invalid request. Please refresh the page and try again.";
pub const MSG_HONEYPOT: &str = "Unable to submit your message. Please try again.";
pub const MSG_INVALID_INPUT: &str = "Please check your form inputs and try again.";
pub const MSG_RATE_LIMITED: &str = "Too many submissions. Please try again later.";
pub const MSG_SUCCESS: &str = "Thank you for your message! We'll be in touch soon.";
pub const MSG_FAILURE: &str = "Something went wrong. Please try again or email us directly.";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmissionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReply {
    pub status: u16,
    pub body: SubmissionResponse,
}

impl SubmissionReply {
    fn new(status: u16, success: bool, message: &str) -> Self {
        Self {
            status,
            body: SubmissionResponse {
                success,
                message: message.to_string(),
                errors: None,
            },
        }
    }

    fn invalid(errors: Vec<FieldError>) -> Self {
        let mut reply = Self::new(400, false, MSG_INVALID_INPUT);
        reply.body.errors = Some(errors);
        reply
    }
}

/// Validated input common to every lead-producing form.
struct LeadInput {
    name: String,
    email: String,
    phone: Option<String>,
    message: String,
}

pub async fn submit_contact(
    state: &AppState,
    site: &SiteConfig,
    request: RequestMeta<'_>,
    form: ContactForm,
) -> SubmissionReply {
    if !request.origin_allowed(site) {
        return SubmissionReply::new(403, false, MSG_INVALID_ORIGIN);
    }
    if honeypot_filled(form.website.as_deref()) {
        log::warn!("Honeypot field filled on contact form");
        return SubmissionReply::new(400, false, MSG_HONEYPOT);
    }

    let form = match form.validate() {
        Ok(form) => form,
        Err(errors) => return SubmissionReply::invalid(errors),
    };

    let input = LeadInput {
        name: form.name,
        email: form.email,
        phone: form.phone,
        message: form.message,
    };
    run_pipeline(state, request, "contact", input).await
}

pub async fn submit_quote(
    state: &AppState,
    site: &SiteConfig,
    request: RequestMeta<'_>,
    form: QuoteForm,
) -> SubmissionReply {
    if !request.origin_allowed(site) {
        return SubmissionReply::new(403, false, MSG_INVALID_ORIGIN);
    }
    if honeypot_filled(form.website.as_deref()) {
        log::warn!("Honeypot field filled on quote form");
        return SubmissionReply::new(400, false, MSG_HONEYPOT);
    }

    let categories = site.quote_categories().unwrap_or_default();
    let form = match form.validate(categories) {
        Ok(form) => form,
        Err(errors) => return SubmissionReply::invalid(errors),
    };

    let input = LeadInput {
        message: form.lead_message(categories),
        name: form.name,
        email: form.email,
        phone: form.phone,
    };
    run_pipeline(state, request, "quote", input).await
}

async fn run_pipeline(
    state: &AppState,
    request: RequestMeta<'_>,
    scope: &'static str,
    input: LeadInput,
) -> SubmissionReply {
    let email = sanitize_email(&input.email);
    let email_hash = hash_email(&email);
    let ip_hash = hash_ip(&request.client_ip(&state.config));

    let attributes = vec![("email.hash", email_hash.clone()), ("ip.hash", ip_hash.clone())];
    let result = with_span(
        "lead.submit",
        scope,
        attributes,
        store_and_sync(state, scope, input, email, &email_hash, &ip_hash),
    )
    .await;

    match result {
        Ok(true) => SubmissionReply::new(200, true, MSG_SUCCESS),
        Ok(false) => SubmissionReply::new(429, false, MSG_RATE_LIMITED),
        Err(e) => {
            log::error!("Lead submission failed: {}", redact_string(&e.to_string()));
            SubmissionReply::new(500, false, MSG_FAILURE)
        }
    }
}

/// Returns whether the submission was within its rate limits.
async fn store_and_sync(
    state: &AppState,
    scope: &str,
    input: LeadInput,
    email: String,
    email_hash: &str,
    ip_hash: &str,
) -> Result<bool> {
    let limits = check_submission(
        state.limiter.as_ref(),
        &state.config.rate_limit,
        scope,
        email_hash,
        ip_hash,
    )
    .await;
    let allowed = limits.allowed();
    if !allowed {
        log::warn!(
            "Rate limit exceeded {}",
            crate::telemetry::fields(serde_json::json!({
                "email_hash": email_hash,
                "ip_hash": ip_hash,
                "email_limited": !limits.email_allowed,
                "ip_limited": !limits.ip_allowed,
            }))
        );
    }

    let mut lead = NewLead::new(
        sanitize_name(&input.name),
        email,
        input.phone.as_deref().map(|p| escape_html(p.trim())),
        escape_html(&input.message),
    );
    if !allowed {
        lead = lead.flag_suspicious(SUSPICION_RATE_LIMIT);
    }

    let lead = state.leads.insert_lead(lead).await?;
    log::info!(
        "Lead stored {}",
        crate::telemetry::fields(serde_json::json!({
            "lead_hash": hash_span_value(&lead.id),
            "suspicious": lead.is_suspicious,
        }))
    );

    sync_lead(
        state.leads.as_ref(),
        state.crm(),
        &state.config.crm_retry,
        &lead,
    )
    .await;

    Ok(allowed)
}
