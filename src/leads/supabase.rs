use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use super::{LeadRecord, LeadStore, LeadUpdate, NewLead, SyncStatus};
use crate::config::SupabaseSettings;
use crate::error::{AppError, Result};

/// `leads` table over Supabase's PostgREST API, authenticated with the
/// service-role key.
pub struct SupabaseLeadStore {
    client: Client,
    url: String,
    service_role_key: String,
}

impl SupabaseLeadStore {
    pub fn new(client: Client, settings: &SupabaseSettings) -> Self {
        Self {
            client,
            url: settings.url.trim_end_matches('/').to_string(),
            service_role_key: settings.service_role_key.clone(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/leads", self.url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
    }
}

fn check_status(response: &reqwest::Response, operation: &'static str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(AppError::Upstream {
            service: "Supabase",
            operation,
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl LeadStore for SupabaseLeadStore {
    async fn insert_lead(&self, lead: NewLead) -> Result<LeadRecord> {
        let response = self
            .authorized(self.client.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(&[&lead])
            .send()
            .await?;
        check_status(&response, "insert")?;

        let rows: Vec<Value> = response.json().await.unwrap_or_default();
        let row = rows.first();
        let id = row
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::InvalidResponse("Supabase insert returned invalid lead ID".to_string())
            })?;
        let created_at = row
            .and_then(|r| r.get("created_at"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(LeadRecord::from_new(id.to_string(), created_at, lead))
    }

    async fn update_lead(&self, id: &str, update: LeadUpdate) -> Result<()> {
        let response = self
            .authorized(self.client.patch(self.table_url()))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(&update)
            .send()
            .await?;
        check_status(&response, "update")
    }

    async fn list_needing_sync(&self, limit: usize) -> Result<Vec<LeadRecord>> {
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[
                ("select", "*".to_string()),
                (
                    "hubspot_sync_status",
                    format!("eq.{}", SyncStatus::NeedsSync.as_str()),
                ),
                ("order", "created_at.asc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        check_status(&response, "select")?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, canned_upstream};
    use serde_json::json;

    fn store(url: &str) -> SupabaseLeadStore {
        SupabaseLeadStore::new(
            Client::new(),
            &SupabaseSettings {
                url: url.to_string(),
                service_role_key: "service-key".to_string(),
            },
        )
    }

    fn lead() -> NewLead {
        NewLead::new(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            Some("555".to_string()),
            "hello there".to_string(),
        )
    }

    #[tokio::test]
    async fn insert_posts_array_and_reads_id() {
        let (url, seen) = canned_upstream(vec![(
            201,
            json!([{ "id": "lead-1", "created_at": "2026-01-01T00:00:00Z" }]),
        )])
        .await;

        let record = store(&url).insert_lead(lead()).await.unwrap();
        assert_eq!(record.id, "lead-1");
        assert_eq!(record.created_at.as_deref(), Some("2026-01-01T00:00:00Z"));

        let requests = seen.lock();
        let req = &requests[0];
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/rest/v1/leads");
        assert_eq!(req.headers.get("prefer"), Some("return=representation"));
        assert_eq!(req.headers.get("apikey"), Some("service-key"));
        let body = body_json(req);
        assert_eq!(body[0]["email"], "ada@example.com");
        assert_eq!(body[0]["hubspot_sync_status"], "pending");
        assert_eq!(body[0]["is_suspicious"], false);
    }

    #[tokio::test]
    async fn insert_without_id_is_rejected() {
        let (url, _) = canned_upstream(vec![(201, json!([]))]).await;
        let err = store(&url).insert_lead(lead()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid response: Supabase insert returned invalid lead ID"
        );
    }

    #[tokio::test]
    async fn insert_status_is_reported() {
        let (url, _) = canned_upstream(vec![(500, json!({}))]).await;
        let err = store(&url).insert_lead(lead()).await.unwrap_err();
        assert_eq!(err.to_string(), "Supabase insert failed with status 500");
    }

    #[tokio::test]
    async fn update_patches_by_id() {
        let (url, seen) = canned_upstream(vec![(200, json!(null)), (400, json!({}))]).await;
        let s = store(&url);
        let update = LeadUpdate {
            hubspot_sync_status: Some(SyncStatus::Synced),
            ..Default::default()
        };

        s.update_lead("lead-1", update.clone()).await.unwrap();
        let err = s.update_lead("lead-1", update).await.unwrap_err();
        assert_eq!(err.to_string(), "Supabase update failed with status 400");

        let requests = seen.lock();
        assert_eq!(requests[0].method, "PATCH");
        assert_eq!(requests[0].query.as_deref(), Some("id=eq.lead-1"));
        assert_eq!(body_json(&requests[0]), json!({ "hubspot_sync_status": "synced" }));
    }

    #[tokio::test]
    async fn lists_needs_sync_rows() {
        let (url, seen) = canned_upstream(vec![(
            200,
            json!([{
                "id": "lead-9",
                "name": "Ada",
                "email": "ada@example.com",
                "message": "hello there",
                "hubspot_sync_status": "needs_sync",
                "hubspot_retry_count": 3
            }]),
        )])
        .await;

        let leads = store(&url).list_needing_sync(25).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].hubspot_sync_status, SyncStatus::NeedsSync);
        assert_eq!(leads[0].hubspot_retry_count, 3);

        let query = seen.lock()[0].query.clone().unwrap();
        assert!(query.contains("hubspot_sync_status=eq.needs_sync"));
        assert!(query.contains("limit=25"));
    }
}
