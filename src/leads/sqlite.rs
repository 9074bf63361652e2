use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Arc;

use super::{LeadRecord, LeadStore, LeadUpdate, NewLead, SyncStatus};
use crate::error::{AppError, Result};

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS leads (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT,
    message TEXT NOT NULL,
    is_suspicious INTEGER NOT NULL DEFAULT 0,
    suspicion_reason TEXT,
    hubspot_sync_status TEXT NOT NULL DEFAULT 'pending',
    hubspot_last_sync_attempt TEXT,
    hubspot_retry_count INTEGER NOT NULL DEFAULT 0,
    hubspot_contact_id TEXT,
    hubspot_idempotency_key TEXT
);

CREATE INDEX IF NOT EXISTS idx_leads_sync_status ON leads (hubspot_sync_status, created_at);
";

const SELECT_COLUMNS: &str = "id, created_at, name, email, phone, message, is_suspicious, \
    suspicion_reason, hubspot_sync_status, hubspot_last_sync_attempt, hubspot_retry_count, \
    hubspot_contact_id, hubspot_idempotency_key";

/// Local lead table, used when no hosted database is configured.
pub struct SqliteLeadStore {
    conn: Arc<Mutex<Connection>>,
}

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<LeadRecord> {
    let status: String = row.get(8)?;
    Ok(LeadRecord {
        id: row.get(0)?,
        created_at: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        message: row.get(5)?,
        is_suspicious: row.get(6)?,
        suspicion_reason: row.get(7)?,
        hubspot_sync_status: SyncStatus::parse(&status).unwrap_or(SyncStatus::Pending),
        hubspot_last_sync_attempt: row.get(9)?,
        hubspot_retry_count: row.get(10)?,
        hubspot_contact_id: row.get(11)?,
        hubspot_idempotency_key: row.get(12)?,
    })
}

impl SqliteLeadStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || f(&conn.lock())).await?
    }

    #[cfg(test)]
    pub fn get_lead(&self, id: &str) -> Result<Option<LeadRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM leads WHERE id = ?1", SELECT_COLUMNS))?;
        let mut rows = stmt.query_map(params![id], lead_from_row)?;
        let lead = rows.next().transpose()?;
        Ok(lead)
    }

    #[cfg(test)]
    pub fn list_all(&self) -> Result<Vec<LeadRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM leads ORDER BY created_at", SELECT_COLUMNS))?;
        let leads = stmt
            .query_map([], lead_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(leads)
    }
}

#[async_trait]
impl LeadStore for SqliteLeadStore {
    async fn insert_lead(&self, lead: NewLead) -> Result<LeadRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO leads (id, created_at, name, email, phone, message, is_suspicious, \
                 suspicion_reason, hubspot_sync_status, hubspot_retry_count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    created_at,
                    lead.name,
                    lead.email,
                    lead.phone,
                    lead.message,
                    lead.is_suspicious,
                    lead.suspicion_reason,
                    lead.hubspot_sync_status.as_str(),
                    lead.hubspot_retry_count,
                ],
            )?;
            Ok(LeadRecord::from_new(id, Some(created_at), lead))
        })
        .await
    }

    async fn update_lead(&self, id: &str, update: LeadUpdate) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE leads SET \
                 hubspot_sync_status = COALESCE(?2, hubspot_sync_status), \
                 hubspot_last_sync_attempt = COALESCE(?3, hubspot_last_sync_attempt), \
                 hubspot_retry_count = COALESCE(?4, hubspot_retry_count), \
                 hubspot_contact_id = COALESCE(?5, hubspot_contact_id), \
                 hubspot_idempotency_key = COALESCE(?6, hubspot_idempotency_key) \
                 WHERE id = ?1",
                params![
                    id,
                    update.hubspot_sync_status.map(SyncStatus::as_str),
                    update.hubspot_last_sync_attempt,
                    update.hubspot_retry_count,
                    update.hubspot_contact_id,
                    update.hubspot_idempotency_key,
                ],
            )?;

            if changed == 0 {
                return Err(AppError::NotFound(format!("lead {}", id)));
            }
            Ok(())
        })
        .await
    }

    async fn list_needing_sync(&self, limit: usize) -> Result<Vec<LeadRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM leads WHERE hubspot_sync_status = ?1 ORDER BY created_at LIMIT ?2",
                SELECT_COLUMNS
            ))?;
            let leads = stmt
                .query_map(
                    params![SyncStatus::NeedsSync.as_str(), limit as i64],
                    lead_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(leads)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(name: &str) -> NewLead {
        NewLead::new(
            name.to_string(),
            "ada@example.com".to_string(),
            None,
            "hello there".to_string(),
        )
    }

    #[tokio::test]
    async fn insert_then_update_sync_fields() {
        let store = SqliteLeadStore::in_memory().unwrap();
        let inserted = store
            .insert_lead(lead("Ada").flag_suspicious("rate_limit"))
            .await
            .unwrap();
        assert_eq!(inserted.hubspot_sync_status, SyncStatus::Pending);

        store
            .update_lead(
                &inserted.id,
                LeadUpdate {
                    hubspot_sync_status: Some(SyncStatus::Synced),
                    hubspot_contact_id: Some("hs-1".to_string()),
                    hubspot_retry_count: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = store.get_lead(&inserted.id).unwrap().unwrap();
        assert_eq!(stored.hubspot_sync_status, SyncStatus::Synced);
        assert_eq!(stored.hubspot_contact_id.as_deref(), Some("hs-1"));
        assert_eq!(stored.hubspot_retry_count, 2);
        assert!(stored.is_suspicious);
        assert_eq!(stored.suspicion_reason.as_deref(), Some("rate_limit"));
        assert_eq!(stored.name, "Ada");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_inserts_all_land() {
        let store = Arc::new(SqliteLeadStore::in_memory().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.insert_lead(lead(&format!("Lead {}", i))).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.list_all().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn update_of_unknown_lead_fails() {
        let store = SqliteLeadStore::in_memory().unwrap();
        let err = store
            .update_lead("missing", LeadUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn lists_only_leads_needing_sync() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteLeadStore::open(&dir.path().join("db").join("leads.db")).unwrap();

        let a = store.insert_lead(lead("Ada")).await.unwrap();
        let _b = store.insert_lead(lead("Bob")).await.unwrap();
        let c = store.insert_lead(lead("Cy")).await.unwrap();
        for id in [&a.id, &c.id] {
            store
                .update_lead(
                    id,
                    LeadUpdate {
                        hubspot_sync_status: Some(SyncStatus::NeedsSync),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let pending = store.list_needing_sync(10).await.unwrap();
        let mut names: Vec<_> = pending.iter().map(|l| l.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["Ada", "Cy"]);
        assert_eq!(store.list_needing_sync(1).await.unwrap().len(), 1);
    }
}
