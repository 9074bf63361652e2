use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use super::{ContactProperties, CrmClient, CrmContact};
use crate::config::HubSpotSettings;
use crate::error::{AppError, Result};

pub struct HubSpotClient {
    client: Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct HubSpotSearchResponse {
    #[serde(default)]
    results: Vec<HubSpotObject>,
}

#[derive(Debug, Deserialize)]
struct HubSpotObject {
    id: Option<String>,
}

impl HubSpotClient {
    pub fn new(client: Client, settings: &HubSpotSettings) -> Self {
        Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            token: settings.private_app_token.clone(),
        }
    }

    fn contacts_url(&self) -> String {
        format!("{}/crm/v3/objects/contacts", self.api_base)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
    }
}

async fn ensure_success(response: reqwest::Response, operation: &'static str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    log::error!(
        "HubSpot {} request failed {}",
        operation,
        crate::telemetry::fields(serde_json::json!({
            "status": status.as_u16(),
            "body_len": body.len(),
        }))
    );
    Err(AppError::Upstream {
        service: "HubSpot",
        operation,
        status: status.as_u16(),
    })
}

#[async_trait]
impl CrmClient for HubSpotClient {
    async fn search_contact(&self, email: &str) -> Result<Option<String>> {
        let body = serde_json::json!({
            "filterGroups": [{
                "filters": [{ "propertyName": "email", "operator": "EQ", "value": email }]
            }],
            "properties": ["email"],
            "limit": 1,
        });

        let response = self
            .authorized(self.client.post(format!("{}/search", self.contacts_url())))
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "search").await?;

        let result: HubSpotSearchResponse = response.json().await?;
        Ok(result.results.into_iter().find_map(|r| r.id))
    }

    async fn upsert_contact(
        &self,
        properties: &ContactProperties,
        idempotency_key: &str,
        existing_id: Option<&str>,
    ) -> Result<CrmContact> {
        let body = serde_json::json!({ "properties": properties });

        let request = match existing_id {
            Some(id) => self
                .client
                .patch(format!("{}/{}", self.contacts_url(), id)),
            None => self.client.post(self.contacts_url()),
        };

        let response = self
            .authorized(request)
            .header("Idempotency-Key", idempotency_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "upsert").await?;

        let result: HubSpotObject = response.json().await?;
        let id = result
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::InvalidResponse("HubSpot upsert returned no contact id".to_string()))?;
        Ok(CrmContact { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, canned_upstream};
    use serde_json::json;

    fn client(base: &str) -> HubSpotClient {
        HubSpotClient::new(
            Client::new(),
            &HubSpotSettings {
                private_app_token: "hubspot-token".to_string(),
                api_base: base.to_string(),
            },
        )
    }

    fn props() -> ContactProperties {
        ContactProperties {
            email: "person@example.com".to_string(),
            firstname: "Person".to_string(),
            lastname: None,
            phone: None,
        }
    }

    #[tokio::test]
    async fn search_returns_first_match() {
        let (url, seen) =
            canned_upstream(vec![(200, json!({ "total": 1, "results": [{ "id": "hubspot-1" }] }))])
                .await;

        let id = client(&url).search_contact("person@example.com").await.unwrap();
        assert_eq!(id.as_deref(), Some("hubspot-1"));

        let requests = seen.lock();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/crm/v3/objects/contacts/search");
        assert_eq!(
            requests[0].headers.get("authorization"),
            Some("Bearer hubspot-token")
        );
        let body = body_json(&requests[0]);
        assert_eq!(body["filterGroups"][0]["filters"][0]["value"], "person@example.com");
    }

    #[tokio::test]
    async fn search_with_no_results_is_none() {
        let (url, _) = canned_upstream(vec![(200, json!({ "total": 0, "results": [] }))]).await;
        assert!(client(&url).search_contact("missing@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_failure_carries_status() {
        let (url, _) = canned_upstream(vec![(502, json!({ "message": "bad" }))]).await;
        let err = client(&url).search_contact("boom@example.com").await.unwrap_err();
        assert_eq!(err.to_string(), "HubSpot search failed with status 502");
    }

    #[tokio::test]
    async fn upsert_creates_or_patches() {
        let (url, seen) = canned_upstream(vec![
            (201, json!({ "id": "hubspot-2" })),
            (200, json!({ "id": "hubspot-9" })),
        ])
        .await;
        let hs = client(&url);

        let created = hs.upsert_contact(&props(), "idem-1", None).await.unwrap();
        assert_eq!(created.id, "hubspot-2");
        let updated = hs
            .upsert_contact(&props(), "idem-1", Some("hubspot-9"))
            .await
            .unwrap();
        assert_eq!(updated.id, "hubspot-9");

        let requests = seen.lock();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].headers.get("idempotency-key"), Some("idem-1"));
        assert_eq!(body_json(&requests[0])["properties"]["email"], "person@example.com");
        assert_eq!(requests[1].method, "PATCH");
        assert_eq!(requests[1].path, "/crm/v3/objects/contacts/hubspot-9");
    }

    #[tokio::test]
    async fn upsert_failure_carries_status() {
        let (url, _) = canned_upstream(vec![(500, json!({ "message": "down" }))]).await;
        let err = client(&url)
            .upsert_contact(&props(), "idem", Some("hubspot-9"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HubSpot upsert failed with status 500");
    }
}
