pub mod memory;
pub mod models;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use models::{Alert, DayStat, Url, UrlChangeEvent};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} with {field}={value} not found")]
    NotFound { kind: &'static str, field: &'static str, value: String },
    #[error("{kind} with {field}={value} already exists")]
    Duplicate { kind: &'static str, field: &'static str, value: String },
}

impl StoreError {
    pub fn not_found(kind: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::NotFound { kind, field, value: value.to_string() }
    }

    pub fn duplicate(kind: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::Duplicate { kind, field, value: value.to_string() }
    }
}

/// Persistence collaborator for registered urls and their day stats.
#[async_trait]
pub trait UrlStore: Send + Sync {
    /// Full scan of every registered url. Used once at startup to seed
    /// the schedule; a failure here aborts startup, since a silently
    /// incomplete schedule is worse than failing loudly.
    async fn all(&self) -> Result<Vec<Url>, StoreError>;

    async fn get_by_user_id(&self, user_id: Uuid) -> Result<Vec<Url>, StoreError>;

    /// Registers a target and publishes an [`ChangeOperation::Insert`]
    /// event on the change feed.
    async fn add(&self, url: Url) -> Result<(), StoreError>;

    /// Long-lived subscription to target registration changes. The
    /// stream outlives any single read; it closing while a consumer is
    /// still subscribed is a protocol violation on the consumer side.
    async fn listen_for_changes(&self) -> Result<mpsc::Receiver<UrlChangeEvent>, StoreError>;

    /// Atomically folds `stat` into the matching day bucket, creating
    /// the bucket if absent. Returns the full target record (the caller
    /// needs its threshold) together with the post-increment bucket.
    async fn update_stat(
        &self,
        user_id: Uuid,
        url_id: Uuid,
        stat: DayStat,
    ) -> Result<(Url, DayStat), StoreError>;
}

/// Persistence collaborator for raised alerts.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn add(&self, alert: Alert) -> Result<(), StoreError>;

    async fn get_by_url_id(&self, url_id: Uuid) -> Result<Vec<Alert>, StoreError>;
}

pub trait Store: Send + Sync {
    fn urls(&self) -> &dyn UrlStore;
    fn alerts(&self) -> &dyn AlertStore;
}
