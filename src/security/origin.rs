use reqwest::Url;
use std::net::IpAddr;

use crate::config::Environment;
use crate::server::http::Headers;

/// Proxy headers trusted for the client address, in priority order.
const PRODUCTION_IP_HEADERS: [&str; 2] = ["cf-connecting-ip", "x-vercel-forwarded-for"];
const DEVELOPMENT_IP_HEADERS: [&str; 2] = ["x-forwarded-for", "x-real-ip"];

pub const UNKNOWN_IP: &str = "unknown";

/// `host[:port]` the way browsers put it in `Origin`, lower-cased.
fn url_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

fn header_matches_host(value: &str, expected_host: &str, header_name: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => {
            if url_host(&url).as_deref() == Some(expected_host) {
                true
            } else {
                log::warn!(
                    "CSRF: {} mismatch (expected host {})",
                    header_name,
                    expected_host
                );
                false
            }
        }
        Err(_) => {
            log::warn!("CSRF: invalid {} URL", header_name);
            false
        }
    }
}

/// Requires an `Origin` or `Referer` header, and every one present must point
/// at the expected host: the request's `Host`, else `fallback_host`.
pub fn validate_origin(headers: &Headers, fallback_host: Option<&str>) -> bool {
    let origin = headers.get("origin");
    let referer = headers.get("referer");

    if origin.is_none() && referer.is_none() {
        log::warn!("CSRF: no origin or referer header");
        return false;
    }

    let expected_host = match headers.get("host").or(fallback_host) {
        Some(host) => host.trim().to_ascii_lowercase(),
        None => {
            log::warn!("CSRF: no host to compare against");
            return false;
        }
    };

    if let Some(origin) = origin {
        if !header_matches_host(origin, &expected_host, "origin") {
            return false;
        }
    }

    if let Some(referer) = referer {
        if !header_matches_host(referer, &expected_host, "referer") {
            return false;
        }
    }

    true
}

fn first_valid_ip(header_value: &str) -> Option<String> {
    let first = header_value.split(',').next()?.trim();
    first.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

/// Client address from the proxy headers trusted in `environment`, falling
/// back to the socket peer. Malformed header values are skipped.
pub fn client_ip(headers: &Headers, environment: Environment, peer: Option<IpAddr>) -> String {
    let trusted = if environment.is_production() {
        &PRODUCTION_IP_HEADERS
    } else {
        &DEVELOPMENT_IP_HEADERS
    };

    trusted
        .iter()
        .filter_map(|name| headers.get(name))
        .find_map(first_valid_ip)
        .or_else(|| peer.map(|p| p.to_string()))
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        Headers::from_pairs(pairs)
    }

    #[test]
    fn rejects_missing_origin_and_referer() {
        assert!(!validate_origin(&headers(&[("host", "salon.example")]), None));
    }

    #[test]
    fn accepts_matching_origin() {
        let h = headers(&[("host", "salon.example"), ("origin", "https://salon.example")]);
        assert!(validate_origin(&h, None));
    }

    #[test]
    fn rejects_mismatched_referer_even_with_good_origin() {
        let h = headers(&[
            ("host", "salon.example"),
            ("origin", "https://salon.example"),
            ("referer", "https://evil.example/form"),
        ]);
        assert!(!validate_origin(&h, None));
    }

    #[test]
    fn port_is_part_of_the_host() {
        let h = headers(&[("host", "localhost:3000"), ("origin", "http://localhost:3001")]);
        assert!(!validate_origin(&h, None));

        let h = headers(&[("host", "localhost:3000"), ("origin", "http://localhost:3000")]);
        assert!(validate_origin(&h, None));
    }

    #[test]
    fn falls_back_to_site_host() {
        let h = headers(&[("referer", "https://salon.example/contact")]);
        assert!(validate_origin(&h, Some("salon.example")));
        assert!(!validate_origin(&h, Some("plumber.example")));
    }

    #[test]
    fn garbage_origin_is_rejected() {
        let h = headers(&[("host", "salon.example"), ("origin", "not a url")]);
        assert!(!validate_origin(&h, None));
    }

    #[test]
    fn production_only_trusts_edge_headers() {
        let h = headers(&[("x-forwarded-for", "1.2.3.4"), ("cf-connecting-ip", "5.6.7.8")]);
        assert_eq!(client_ip(&h, Environment::Production, None), "5.6.7.8");

        let spoofed = headers(&[("x-forwarded-for", "1.2.3.4")]);
        assert_eq!(client_ip(&spoofed, Environment::Production, None), UNKNOWN_IP);
    }

    #[test]
    fn development_takes_first_forwarded_entry() {
        let h = headers(&[("x-forwarded-for", " 10.0.0.1 , 10.0.0.2")]);
        assert_eq!(client_ip(&h, Environment::Development, None), "10.0.0.1");
    }

    #[test]
    fn malformed_header_falls_through_to_peer() {
        let h = headers(&[("x-forwarded-for", "nonsense"), ("x-real-ip", "also bad")]);
        let peer: IpAddr = "192.168.1.9".parse().unwrap();
        assert_eq!(client_ip(&h, Environment::Development, Some(peer)), "192.168.1.9");
    }
}
