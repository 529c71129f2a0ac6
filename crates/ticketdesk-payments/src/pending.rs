//! Pending-order store
//!
//! Holds orders whose tickets could not all be issued, plus the IDs of
//! checkout sessions already handled so redelivered webhooks are not issued
//! twice. Every operation runs under one lock, and the file store replaces
//! its file atomically on each write.
//!
//! Handled sessions are kept for [`SESSION_RETENTION_DAYS`], well past the window
//! in which Stripe redelivers an event, and pruned whenever a new one is
//! recorded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

use ticketdesk_types::PendingOrder;

use crate::error::{PaymentError, PaymentResult};

/// Default location of the pending-order file
pub const DEFAULT_PENDING_PATH: &str = "data/pending_orders.json";

/// Days a handled checkout session is remembered
pub const SESSION_RETENTION_DAYS: i64 = 7;

/// Pending order storage
#[async_trait]
pub trait PendingOrderStore: Send + Sync {
    /// All pending orders, oldest first
    async fn list(&self) -> PaymentResult<Vec<PendingOrder>>;

    /// One pending order
    async fn get(&self, id: Uuid) -> PaymentResult<Option<PendingOrder>>;

    /// Append a pending order
    async fn insert(&self, order: PendingOrder) -> PaymentResult<()>;

    /// Replace a pending order with the same ID
    async fn update(&self, order: PendingOrder) -> PaymentResult<()>;

    /// Remove a pending order
    async fn remove(&self, id: Uuid) -> PaymentResult<()>;

    /// Record a checkout session as handled. Returns `false` if it already
    /// was.
    async fn mark_session_processed(&self, session_id: &str) -> PaymentResult<bool>;

    /// Drop a session record so a redelivery of it is handled again
    async fn forget_session(&self, session_id: &str) -> PaymentResult<()>;
}

/// Persisted store contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreContents {
    /// Pending orders
    #[serde(default)]
    pub orders: Vec<PendingOrder>,
    /// Checkout sessions already handled, with when they were recorded
    #[serde(default, deserialize_with = "session_records")]
    pub processed_sessions: BTreeMap<String, DateTime<Utc>>,
}

impl StoreContents {
    fn update(&mut self, order: PendingOrder) -> PaymentResult<()> {
        let slot = self
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or(PaymentError::PendingOrderNotFound(order.id))?;
        *slot = order;
        Ok(())
    }

    fn remove(&mut self, id: Uuid) -> PaymentResult<()> {
        let before = self.orders.len();
        self.orders.retain(|o| o.id != id);
        if self.orders.len() == before {
            return Err(PaymentError::PendingOrderNotFound(id));
        }
        Ok(())
    }

    /// Record `session_id` at `now`, pruning records older than
    /// [`SESSION_RETENTION_DAYS`]. Returns `false` if it is already recorded.
    fn mark(&mut self, session_id: &str, now: DateTime<Utc>) -> bool {
        let retention = Duration::days(SESSION_RETENTION_DAYS);
        self.processed_sessions
            .retain(|_, recorded_at| now - *recorded_at < retention);
        if self.processed_sessions.contains_key(session_id) {
            return false;
        }
        self.processed_sessions.insert(session_id.to_string(), now);
        true
    }
}

/// Accept the current map form or a bare list of session IDs. Listed IDs
/// are stamped with the load time so they age out normally.
fn session_records<'de, D>(deserializer: D) -> Result<BTreeMap<String, DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Records {
        Stamped(BTreeMap<String, DateTime<Utc>>),
        Bare(Vec<String>),
    }

    Ok(match Records::deserialize(deserializer)? {
        Records::Stamped(records) => records,
        Records::Bare(ids) => {
            let now = Utc::now();
            ids.into_iter().map(|id| (id, now)).collect()
        }
    })
}

/// On-disk layouts: the current object form, or a bare order list
#[derive(Deserialize)]
#[serde(untagged)]
enum StoreFile {
    Contents(StoreContents),
    Orders(Vec<PendingOrder>),
}

impl From<StoreFile> for StoreContents {
    fn from(file: StoreFile) -> Self {
        match file {
            StoreFile::Contents(contents) => contents,
            StoreFile::Orders(orders) => Self {
                orders,
                processed_sessions: BTreeMap::new(),
            },
        }
    }
}

/// JSON-file backed store
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> PaymentResult<StoreContents> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreContents::default())
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to read pending orders");
                return Err(PaymentError::Store(e.to_string()));
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoreContents::default());
        }

        serde_json::from_slice::<StoreFile>(&bytes)
            .map(StoreContents::from)
            .map_err(|e| {
                error!(path = %self.path.display(), error = %e, "Pending orders file is corrupt");
                PaymentError::Store(format!("corrupt pending orders file: {e}"))
            })
    }

    /// Write to a sibling temp file, then rename over the original
    async fn save(&self, contents: &StoreContents) -> PaymentResult<()> {
        let json =
            serde_json::to_vec_pretty(contents).map_err(|e| PaymentError::Store(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PaymentError::Store(e.to_string()))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &json).await.map_err(|e| {
            error!(path = %tmp.display(), error = %e, "Failed to write pending orders");
            PaymentError::Store(e.to_string())
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            error!(path = %self.path.display(), error = %e, "Failed to replace pending orders file");
            PaymentError::Store(e.to_string())
        })?;

        debug!(orders = contents.orders.len(), "Pending orders saved");
        Ok(())
    }

    /// Load, apply `f`, save
    async fn modify<T>(
        &self,
        f: impl FnOnce(&mut StoreContents) -> PaymentResult<T> + Send,
    ) -> PaymentResult<T> {
        let _guard = self.lock.lock().await;
        let mut contents = self.load().await?;
        let out = f(&mut contents)?;
        self.save(&contents).await?;
        Ok(out)
    }
}

#[async_trait]
impl PendingOrderStore for JsonFileStore {
    async fn list(&self) -> PaymentResult<Vec<PendingOrder>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.orders)
    }

    async fn get(&self, id: Uuid) -> PaymentResult<Option<PendingOrder>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.orders.into_iter().find(|o| o.id == id))
    }

    async fn insert(&self, order: PendingOrder) -> PaymentResult<()> {
        self.modify(|c| {
            c.orders.push(order);
            Ok(())
        })
        .await
    }

    async fn update(&self, order: PendingOrder) -> PaymentResult<()> {
        self.modify(|c| c.update(order)).await
    }

    async fn remove(&self, id: Uuid) -> PaymentResult<()> {
        self.modify(|c| c.remove(id)).await
    }

    async fn mark_session_processed(&self, session_id: &str) -> PaymentResult<bool> {
        let _guard = self.lock.lock().await;
        let mut contents = self.load().await?;
        if !contents.mark(session_id, Utc::now()) {
            return Ok(false);
        }
        self.save(&contents).await?;
        Ok(true)
    }

    async fn forget_session(&self, session_id: &str) -> PaymentResult<()> {
        self.modify(|c| {
            c.processed_sessions.remove(session_id);
            Ok(())
        })
        .await
    }
}

impl std::fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// In-memory store, for tests and ephemeral deployments
#[derive(Debug, Default)]
pub struct MemoryStore {
    contents: Mutex<StoreContents>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingOrderStore for MemoryStore {
    async fn list(&self) -> PaymentResult<Vec<PendingOrder>> {
        Ok(self.contents.lock().await.orders.clone())
    }

    async fn get(&self, id: Uuid) -> PaymentResult<Option<PendingOrder>> {
        Ok(self
            .contents
            .lock()
            .await
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned())
    }

    async fn insert(&self, order: PendingOrder) -> PaymentResult<()> {
        self.contents.lock().await.orders.push(order);
        Ok(())
    }

    async fn update(&self, order: PendingOrder) -> PaymentResult<()> {
        self.contents.lock().await.update(order)
    }

    async fn remove(&self, id: Uuid) -> PaymentResult<()> {
        self.contents.lock().await.remove(id)
    }

    async fn mark_session_processed(&self, session_id: &str) -> PaymentResult<bool> {
        Ok(self.contents.lock().await.mark(session_id, Utc::now()))
    }

    async fn forget_session(&self, session_id: &str) -> PaymentResult<()> {
        self.contents
            .lock()
            .await
            .processed_sessions
            .remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ticketdesk_types::{PendingItem, PendingStatus};

    use super::*;

    fn order() -> PendingOrder {
        PendingOrder {
            id: Uuid::new_v4(),
            stripe_session_id: Some("cs_1".into()),
            event_id: "ev_1".into(),
            buyer_name: "Jane".into(),
            buyer_email: "jane@x.com".into(),
            phone: None,
            items: vec![PendingItem {
                ticket_type_id: "tt_1".into(),
                quantity: 2,
                issued: 1,
            }],
            amount_total: 1000,
            status: PendingStatus::Pending,
            error: "sold out".into(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pending.json");

        let first = order();
        JsonFileStore::new(&path).insert(first.clone()).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.list().await.unwrap(), vec![first.clone()]);
        assert_eq!(reopened.get(first.id).await.unwrap(), Some(first.clone()));

        reopened.remove(first.id).await.unwrap();
        assert!(reopened.list().await.unwrap().is_empty());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_reads_bare_order_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.json");
        let existing = order();
        std::fs::write(&path, serde_json::to_vec(&vec![existing.clone()]).unwrap()).unwrap();

        let store = JsonFileStore::new(&path);
        assert_eq!(store.list().await.unwrap(), vec![existing]);
        assert!(store.mark_session_processed("cs_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.list().await, Err(PaymentError::Store(_))));
        assert!(store.insert(order()).await.is_err());
        // Original bytes untouched
        assert_eq!(std::fs::read(&path).unwrap(), b"{not json");
    }

    #[tokio::test]
    async fn test_session_marked_once() {
        let store = MemoryStore::new();
        assert!(store.mark_session_processed("cs_1").await.unwrap());
        assert!(!store.mark_session_processed("cs_1").await.unwrap());
        assert!(store.mark_session_processed("cs_2").await.unwrap());
    }

    #[test]
    fn test_old_sessions_are_pruned_on_mark() {
        let start = Utc::now();
        let mut contents = StoreContents::default();
        assert!(contents.mark("cs_old", start));
        assert!(contents.mark("cs_recent", start + Duration::days(5)));

        let later = start + Duration::days(SESSION_RETENTION_DAYS) + Duration::hours(1);
        assert!(contents.mark("cs_new", later));

        assert!(!contents.processed_sessions.contains_key("cs_old"));
        assert!(contents.processed_sessions.contains_key("cs_recent"));
        assert!(!contents.mark("cs_recent", later));
    }

    #[test]
    fn test_bare_session_list_still_loads() {
        let contents: StoreContents =
            serde_json::from_str(r#"{"orders":[],"processed_sessions":["cs_1","cs_2"]}"#).unwrap();
        assert_eq!(contents.processed_sessions.len(), 2);
        assert!(contents.processed_sessions.contains_key("cs_1"));
    }

    #[tokio::test]
    async fn test_forgotten_session_can_be_marked_again() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("pending.json"));
        assert!(store.mark_session_processed("cs_1").await.unwrap());
        store.forget_session("cs_1").await.unwrap();
        assert!(store.mark_session_processed("cs_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_order() {
        let store = MemoryStore::new();
        let err = store.update(order()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
