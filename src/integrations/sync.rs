//! Best-effort CRM sync. The lead is already stored when this runs, so a
//! failure here only changes its sync bookkeeping.

use std::time::Duration;

use super::{ContactProperties, CrmClient};
use crate::config::RetrySettings;
use crate::error::Result;
use crate::leads::{LeadRecord, LeadStore, LeadUpdate, SyncStatus};
use crate::security::{crm_idempotency_key, hash_email, hash_span_value};
use crate::telemetry::redact::redact_string;
use crate::telemetry::with_span;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Synced { contact_id: String, attempts: u32 },
    NeedsSync { attempts: u32 },
    /// No CRM configured; the lead stays `pending`.
    Skipped,
}

/// Wait after the `attempt`-th failure: `min(base * 2^(attempt-1), max)`.
pub fn retry_delay(settings: &RetrySettings, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(
        settings
            .base_delay_ms
            .saturating_mul(factor)
            .min(settings.max_delay_ms),
    )
}

async fn push_contact(
    crm: &dyn CrmClient,
    properties: &ContactProperties,
    idempotency_key: &str,
) -> Result<String> {
    let existing = crm.search_contact(&properties.email).await?;
    let contact = crm
        .upsert_contact(properties, idempotency_key, existing.as_deref())
        .await?;
    Ok(contact.id)
}

async fn record(store: &dyn LeadStore, lead_id: &str, update: LeadUpdate) {
    if let Err(e) = store.update_lead(lead_id, update).await {
        log::error!(
            "Failed to record CRM sync state for lead {}: {}",
            hash_span_value(lead_id),
            redact_string(&e.to_string())
        );
    }
}

pub async fn sync_lead(
    store: &dyn LeadStore,
    crm: Option<&dyn CrmClient>,
    settings: &RetrySettings,
    lead: &LeadRecord,
) -> SyncOutcome {
    let Some(crm) = crm else {
        log::debug!("No CRM configured, lead left pending");
        return SyncOutcome::Skipped;
    };

    let email_hash = hash_email(&lead.email);
    let idempotency_key = crm_idempotency_key(&lead.id, &email_hash);
    let properties = ContactProperties::from_lead(lead);
    let max_attempts = settings.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let attributes = vec![
            ("lead.id", hash_span_value(&lead.id)),
            ("email.hash", email_hash.clone()),
            ("attempt", attempt.to_string()),
        ];
        let result = with_span(
            "crm.sync",
            "hubspot.upsert",
            attributes,
            push_contact(crm, &properties, &idempotency_key),
        )
        .await;

        match result {
            Ok(contact_id) => {
                record(
                    store,
                    &lead.id,
                    LeadUpdate {
                        hubspot_sync_status: Some(SyncStatus::Synced),
                        hubspot_last_sync_attempt: Some(chrono::Utc::now().to_rfc3339()),
                        hubspot_retry_count: Some(attempt),
                        hubspot_contact_id: Some(contact_id.clone()),
                        hubspot_idempotency_key: Some(idempotency_key.clone()),
                    },
                )
                .await;
                return SyncOutcome::Synced {
                    contact_id,
                    attempts: attempt,
                };
            }
            Err(e) => {
                log::warn!(
                    "CRM sync attempt {}/{} failed: {}",
                    attempt,
                    max_attempts,
                    redact_string(&e.to_string())
                );
                if attempt < max_attempts {
                    tokio::time::sleep(retry_delay(settings, attempt)).await;
                }
            }
        }
    }

    log::error!(
        "CRM sync exhausted retries for lead {}",
        hash_span_value(&lead.id)
    );
    record(
        store,
        &lead.id,
        LeadUpdate {
            hubspot_sync_status: Some(SyncStatus::NeedsSync),
            hubspot_last_sync_attempt: Some(chrono::Utc::now().to_rfc3339()),
            hubspot_retry_count: Some(max_attempts),
            hubspot_idempotency_key: Some(idempotency_key),
            ..Default::default()
        },
    )
    .await;

    SyncOutcome::NeedsSync {
        attempts: max_attempts,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Retries every stored lead marked `needs_sync`, oldest first.
pub async fn resync_pending(
    store: &dyn LeadStore,
    crm: &dyn CrmClient,
    settings: &RetrySettings,
    limit: usize,
) -> Result<ResyncReport> {
    let leads = store.list_needing_sync(limit).await?;
    let mut report = ResyncReport::default();

    for lead in &leads {
        report.attempted += 1;
        match sync_lead(store, Some(crm), settings, lead).await {
            SyncOutcome::Synced { .. } => report.synced += 1,
            _ => report.failed += 1,
        }
    }

    log::info!(
        "Resync finished: {} attempted, {} synced, {} failed",
        report.attempted,
        report.synced,
        report.failed
    );
    Ok(report)
}
