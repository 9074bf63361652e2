pub mod crm;
pub mod sync;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::leads::LeadRecord;
use crate::security::split_name;

pub use crm::HubSpotClient;
pub use sync::{resync_pending, sync_lead, SyncOutcome};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrmContact {
    pub id: String,
}

/// Contact properties pushed to the CRM. Empty optionals are left out so an
/// update never blanks a field the CRM already has.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContactProperties {
    pub email: String,
    pub firstname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactProperties {
    pub fn from_lead(lead: &LeadRecord) -> Self {
        let (firstname, lastname) = split_name(&lead.name);
        Self {
            email: lead.email.clone(),
            firstname,
            lastname,
            phone: lead
                .phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }
}

#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Id of the contact with this email, if one exists.
    async fn search_contact(&self, email: &str) -> Result<Option<String>>;

    /// Creates the contact, or updates `existing_id` when given.
    async fn upsert_contact(
        &self,
        properties: &ContactProperties,
        idempotency_key: &str,
        existing_id: Option<&str>,
    ) -> Result<CrmContact>;
}
