pub mod sqlite;
pub mod supabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use sqlite::SqliteLeadStore;
pub use supabase::SupabaseLeadStore;

pub const SUSPICION_RATE_LIMIT: &str = "rate_limit";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    NeedsSync,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::NeedsSync => "needs_sync",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "synced" => Some(Self::Synced),
            "needs_sync" => Some(Self::NeedsSync),
            _ => None,
        }
    }
}

/// Insert payload, already sanitized.
#[derive(Debug, Clone, Serialize)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub is_suspicious: bool,
    pub suspicion_reason: Option<String>,
    pub hubspot_sync_status: SyncStatus,
    pub hubspot_retry_count: u32,
}

impl NewLead {
    pub fn new(name: String, email: String, phone: Option<String>, message: String) -> Self {
        Self {
            name,
            email,
            phone,
            message,
            is_suspicious: false,
            suspicion_reason: None,
            hubspot_sync_status: SyncStatus::Pending,
            hubspot_retry_count: 0,
        }
    }

    pub fn flag_suspicious(mut self, reason: &str) -> Self {
        self.is_suspicious = true;
        self.suspicion_reason = Some(reason.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadRecord {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub message: String,
    #[serde(default)]
    pub is_suspicious: bool,
    #[serde(default)]
    pub suspicion_reason: Option<String>,
    pub hubspot_sync_status: SyncStatus,
    #[serde(default)]
    pub hubspot_last_sync_attempt: Option<String>,
    #[serde(default)]
    pub hubspot_retry_count: u32,
    #[serde(default)]
    pub hubspot_contact_id: Option<String>,
    #[serde(default)]
    pub hubspot_idempotency_key: Option<String>,
}

impl LeadRecord {
    pub fn from_new(id: String, created_at: Option<String>, lead: NewLead) -> Self {
        Self {
            id,
            created_at,
            name: lead.name,
            email: lead.email,
            phone: lead.phone,
            message: lead.message,
            is_suspicious: lead.is_suspicious,
            suspicion_reason: lead.suspicion_reason,
            hubspot_sync_status: lead.hubspot_sync_status,
            hubspot_last_sync_attempt: None,
            hubspot_retry_count: lead.hubspot_retry_count,
            hubspot_contact_id: None,
            hubspot_idempotency_key: None,
        }
    }
}

/// Partial update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LeadUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hubspot_sync_status: Option<SyncStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hubspot_last_sync_attempt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hubspot_retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hubspot_contact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hubspot_idempotency_key: Option<String>,
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn insert_lead(&self, lead: NewLead) -> Result<LeadRecord>;

    async fn update_lead(&self, id: &str, update: LeadUpdate) -> Result<()>;

    /// Oldest first.
    async fn list_needing_sync(&self, limit: usize) -> Result<Vec<LeadRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_serializes_only_set_fields() {
        let update = LeadUpdate {
            hubspot_sync_status: Some(SyncStatus::NeedsSync),
            hubspot_retry_count: Some(3),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "hubspot_sync_status": "needs_sync", "hubspot_retry_count": 3 })
        );
    }

    #[test]
    fn status_strings_match_serde() {
        for status in [SyncStatus::Pending, SyncStatus::Synced, SyncStatus::NeedsSync] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
            assert_eq!(SyncStatus::parse(status.as_str()), Some(status));
        }
    }
}
