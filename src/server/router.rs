use serde::de::DeserializeOwned;
use std::net::IpAddr;

use super::http::{HttpRequest, HttpResponse};
use crate::booking::{self, BookingReply};
use crate::sites::SiteConfig;
use crate::state::{AppState, RequestMeta};
use crate::submission::{self, SubmissionReply};

const MSG_NOT_FOUND: &str = "Not found";
const MSG_INVALID_JSON: &str = "Invalid JSON body";

enum Route<'a> {
    Health,
    Contact,
    Quote,
    Booking,
    BookingDetails(&'a str),
    BookingConfirm(&'a str),
    BookingCancel(&'a str),
}

impl Route<'_> {
    fn method(&self) -> &'static str {
        match self {
            Route::Health | Route::BookingDetails(_) => "GET",
            _ => "POST",
        }
    }
}

fn match_route(path: &str) -> Option<Route<'_>> {
    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        ["healthz"] => Some(Route::Health),
        ["api", "contact"] => Some(Route::Contact),
        ["api", "quote"] => Some(Route::Quote),
        ["api", "booking"] => Some(Route::Booking),
        ["api", "booking", id] => Some(Route::BookingDetails(*id)),
        ["api", "booking", id, "confirm"] => Some(Route::BookingConfirm(*id)),
        ["api", "booking", id, "cancel"] => Some(Route::BookingCancel(*id)),
        _ => None,
    }
}

fn parse_json<T: DeserializeOwned>(request: &HttpRequest) -> Result<T, HttpResponse> {
    serde_json::from_slice(&request.body).map_err(|e| {
        log::debug!("Rejected request body: {}", e);
        HttpResponse::error(400, MSG_INVALID_JSON)
    })
}

fn health() -> HttpResponse {
    HttpResponse::json(200, &serde_json::json!({ "status": "ok" }))
}

fn submission_response(reply: SubmissionReply) -> HttpResponse {
    HttpResponse::json(reply.status, &reply.body)
}

fn booking_response(reply: BookingReply) -> HttpResponse {
    HttpResponse::json(reply.status, &reply.body)
}

/// Dispatches one parsed request. Never fails: every outcome is a response.
pub async fn route(state: &AppState, request: &HttpRequest, peer: Option<IpAddr>) -> HttpResponse {
    let Some(route) = match_route(&request.path) else {
        return HttpResponse::error(404, MSG_NOT_FOUND);
    };

    if request.method != route.method() {
        return HttpResponse::error(405, "Method not allowed").with_header("Allow", route.method());
    }

    if let Route::Health = route {
        return health();
    }

    let Some(site) = state.sites.resolve(request.headers.get("host")) else {
        log::warn!("No site configured for request host");
        return HttpResponse::error(404, MSG_NOT_FOUND);
    };
    let meta = RequestMeta {
        headers: &request.headers,
        peer,
    };

    match route {
        Route::Health => health(),
        Route::Contact => match parse_json(request) {
            Ok(form) => submission_response(submission::submit_contact(state, site, meta, form).await),
            Err(response) => response,
        },
        Route::Quote => {
            if site.quote_categories().is_none() {
                return HttpResponse::error(404, MSG_NOT_FOUND);
            }
            match parse_json(request) {
                Ok(form) => {
                    submission_response(submission::submit_quote(state, site, meta, form).await)
                }
                Err(response) => response,
            }
        }
        Route::Booking => match parse_json(request) {
            Ok(form) => booking_response(booking::submit_booking(state, site, meta, form).await),
            Err(response) => response,
        },
        Route::BookingDetails(_) | Route::BookingConfirm(_) | Route::BookingCancel(_)
            if site.booking_options().is_none() =>
        {
            HttpResponse::error(404, MSG_NOT_FOUND)
        }
        Route::BookingDetails(id) => match booking::booking_details(state, site, id) {
            Some(details) => HttpResponse::json(200, &details),
            None => HttpResponse::error(404, "Booking not found."),
        },
        Route::BookingConfirm(id) => {
            guarded(site, meta, || booking::confirm_booking(state, site, id))
        }
        Route::BookingCancel(id) => {
            guarded(site, meta, || booking::cancel_booking(state, site, id))
        }
    }
}

/// State-changing booking actions get the same origin check as submissions.
fn guarded(site: &SiteConfig, meta: RequestMeta<'_>, action: impl FnOnce() -> BookingReply) -> HttpResponse {
    if !meta.origin_allowed(site) {
        return HttpResponse::error(403, booking::MSG_INVALID_ORIGIN);
    }
    booking_response(action())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_booking_paths() {
        assert!(matches!(match_route("/api/booking/"), Some(Route::Booking)));
        assert!(matches!(
            match_route("/api/booking/booking_1_abc"),
            Some(Route::BookingDetails("booking_1_abc"))
        ));
        assert!(matches!(
            match_route("/api/booking/b1/cancel"),
            Some(Route::BookingCancel("b1"))
        ));
        assert!(match_route("/api/booking/b1/delete").is_none());
        assert!(match_route("/").is_none());
    }
}
