use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db_storage::AccountStorage;
use crate::education::resolve_education_level;
use crate::errors::{AppError, ResultExt};
use crate::models::EducationLevel;

/// Keeps each account holder's stored education level consistent with their
/// active enrollments.
///
/// Every enrollment mutation triggers a re-sync of the affected account.
/// Syncs for the same account are serialized through a per-account lock so
/// two concurrent mutations cannot interleave their read-resolve-write
/// cycles and persist a stale level. Syncs for different accounts run
/// freely in parallel.
pub struct EducationLevelSync {
    storage: Arc<AccountStorage>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl EducationLevelSync {
    pub fn new(storage: Arc<AccountStorage>) -> Self {
        Self {
            storage,
            locks: DashMap::new(),
        }
    }

    /// Recompute and persist the education level for one account.
    ///
    /// Fetches the account's active enrollments, resolves the highest level
    /// among them, and writes it back (including an explicit null when no
    /// enrollment carries a level). Returns the level that was persisted.
    ///
    /// The sync is best-effort with respect to the enrollment mutation that
    /// triggered it: a failure here surfaces as an error but does not roll
    /// the mutation back.
    pub async fn sync_account(&self, account_id: Uuid) -> Result<Option<EducationLevel>, AppError> {
        let lock = self
            .locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let enrollments = self
            .storage
            .fetch_active_enrollments(account_id)
            .await
            .context("Failed to fetch enrollments for education level sync")?;

        let level = resolve_education_level(&enrollments);

        self.storage
            .update_education_level(account_id, level)
            .await
            .context("Failed to persist synced education level")?;

        tracing::info!(
            account_id = %account_id,
            level = level.map(|l| l.as_str()).unwrap_or("none"),
            active_enrollments = enrollments.len(),
            "Education level synced"
        );

        Ok(level)
    }
}
