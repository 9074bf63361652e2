use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{RateLimitDecision, RateLimiter};
use crate::config::UpstashSettings;
use crate::error::{AppError, Result};

/// Fixed-window limiter over the Upstash Redis REST pipeline endpoint.
pub struct UpstashRateLimiter {
    client: Client,
    rest_url: String,
    rest_token: String,
}

#[derive(Debug, Deserialize)]
struct PipelineEntry {
    result: Option<Value>,
    error: Option<String>,
}

impl UpstashRateLimiter {
    pub fn new(client: Client, settings: &UpstashSettings) -> Self {
        Self {
            client,
            rest_url: settings.rest_url.trim_end_matches('/').to_string(),
            rest_token: settings.rest_token.clone(),
        }
    }
}

#[async_trait]
impl RateLimiter for UpstashRateLimiter {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<RateLimitDecision> {
        let window_ms = window.as_millis().to_string();
        // SET NX opens the window with its expiry; INCR counts; PTTL reports the reset.
        let body = serde_json::json!([
            ["SET", key, "0", "PX", window_ms, "NX"],
            ["INCR", key],
            ["PTTL", key],
        ]);

        let response = self
            .client
            .post(format!("{}/pipeline", self.rest_url))
            .header("Authorization", format!("Bearer {}", self.rest_token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream {
                service: "Upstash",
                operation: "pipeline",
                status: status.as_u16(),
            });
        }

        let entries: Vec<PipelineEntry> = response.json().await?;
        if let Some(err) = entries.iter().find_map(|e| e.error.as_deref()) {
            return Err(AppError::InvalidResponse(format!(
                "Upstash pipeline error: {}",
                err
            )));
        }

        let count = entries
            .get(1)
            .and_then(|e| e.result.as_ref())
            .and_then(Value::as_u64)
            .ok_or_else(|| AppError::InvalidResponse("Upstash INCR returned no count".to_string()))?;
        let reset_in = entries
            .get(2)
            .and_then(|e| e.result.as_ref())
            .and_then(Value::as_i64)
            .and_then(|ms| u64::try_from(ms).ok())
            .map(Duration::from_millis)
            .unwrap_or(window);

        Ok(RateLimitDecision::from_count(count, limit, reset_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, canned_upstream};
    use serde_json::json;

    fn limiter(base_url: &str) -> UpstashRateLimiter {
        UpstashRateLimiter::new(
            Client::new(),
            &UpstashSettings {
                rest_url: format!("{}/", base_url),
                rest_token: "tok".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn sends_pipeline_and_reads_count() {
        let (url, seen) = canned_upstream(vec![(
            200,
            json!([{ "result": "OK" }, { "result": 4 }, { "result": 1500 }]),
        )])
        .await;

        let d = limiter(&url)
            .hit("ratelimit:contact:ip:abc", 3, Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);

        let requests = seen.lock();
        assert_eq!(requests[0].path, "/pipeline");
        assert_eq!(requests[0].headers.get("authorization"), Some("Bearer tok"));
        let body = body_json(&requests[0]);
        assert_eq!(body[0], json!(["SET", "ratelimit:contact:ip:abc", "0", "PX", "3600000", "NX"]));
        assert_eq!(body[1][0], "INCR");
    }

    #[tokio::test]
    async fn upstream_status_is_an_error() {
        let (url, _) = canned_upstream(vec![(401, json!({ "error": "unauthorized" }))]).await;
        let err = limiter(&url)
            .hit("k", 3, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Upstash pipeline failed with status 401");
    }

    #[tokio::test]
    async fn command_errors_are_reported() {
        let (url, _) = canned_upstream(vec![(
            200,
            json!([{ "result": "OK" }, { "error": "WRONGTYPE" }, { "result": -1 }]),
        )])
        .await;
        let err = limiter(&url)
            .hit("k", 3, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("WRONGTYPE"));
    }
}
