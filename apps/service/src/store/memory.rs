use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;
use uuid::Uuid;

use super::models::{Alert, ChangeOperation, DayStat, Url, UrlChangeEvent};
use super::{AlertStore, Store, StoreError, UrlStore};

const CHANGE_FEED_BUFFER: usize = 16;

/// In-memory backend. Serves tests and single-process deployments;
/// everything is lost on restart, which is fine — the schedule is
/// rebuilt from a full scan anyway.
pub struct MemoryStore {
    urls: MemoryUrlStore,
    alerts: MemoryAlertStore,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { urls: MemoryUrlStore::default(), alerts: MemoryAlertStore::default() }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn urls(&self) -> &dyn UrlStore {
        &self.urls
    }

    fn alerts(&self) -> &dyn AlertStore {
        &self.alerts
    }
}

#[derive(Default)]
struct MemoryUrlStore {
    // user id -> that user's urls
    data: Mutex<HashMap<Uuid, Vec<Url>>>,
    subscribers: Mutex<Vec<mpsc::Sender<UrlChangeEvent>>>,
}

impl MemoryUrlStore {
    /// Fans an event out to live subscribers, pruning ones whose
    /// receiver has been dropped.
    async fn publish(&self, event: UrlChangeEvent) {
        let mut subscribers = self.subscribers.lock().await;
        let mut alive = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers.drain(..) {
            if subscriber.send(event.clone()).await.is_ok() {
                alive.push(subscriber);
            }
        }
        *subscribers = alive;
    }
}

#[async_trait]
impl UrlStore for MemoryUrlStore {
    async fn all(&self) -> Result<Vec<Url>, StoreError> {
        let data = self.data.lock().await;
        Ok(data.values().flatten().cloned().collect())
    }

    async fn get_by_user_id(&self, user_id: Uuid) -> Result<Vec<Url>, StoreError> {
        let data = self.data.lock().await;
        Ok(data.get(&user_id).cloned().unwrap_or_default())
    }

    async fn add(&self, url: Url) -> Result<(), StoreError> {
        {
            let mut data = self.data.lock().await;
            let urls = data.entry(url.user_id).or_default();
            if urls.iter().any(|existing| existing.id == url.id) {
                return Err(StoreError::duplicate("url", "id", url.id));
            }
            urls.push(url.clone());
        }

        debug!(url = %url.url, "registered url");
        self.publish(UrlChangeEvent { url, operation: ChangeOperation::Insert }).await;
        Ok(())
    }

    async fn listen_for_changes(&self) -> Result<mpsc::Receiver<UrlChangeEvent>, StoreError> {
        let (tx, rx) = mpsc::channel(CHANGE_FEED_BUFFER);
        self.subscribers.lock().await.push(tx);
        Ok(rx)
    }

    async fn update_stat(
        &self,
        user_id: Uuid,
        url_id: Uuid,
        stat: DayStat,
    ) -> Result<(Url, DayStat), StoreError> {
        let mut data = self.data.lock().await;
        let urls = data
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::not_found("url", "user_id", user_id))?;
        let url = urls
            .iter_mut()
            .find(|url| url.id == url_id)
            .ok_or_else(|| StoreError::not_found("url", "id", url_id))?;

        for existing in &mut url.day_stats {
            if existing.date == stat.date {
                existing.success_count += stat.success_count;
                existing.failure_count += stat.failure_count;
                let updated = *existing;
                return Ok((url.clone(), updated));
            }
        }

        // First sample of the day opens a fresh bucket.
        url.day_stats.push(stat);
        Ok((url.clone(), stat))
    }
}

#[derive(Default)]
struct MemoryAlertStore {
    // url id -> alerts raised for it
    data: Mutex<HashMap<Uuid, Vec<Alert>>>,
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn add(&self, alert: Alert) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;
        data.entry(alert.url_id).or_default().push(alert);
        Ok(())
    }

    async fn get_by_url_id(&self, url_id: Uuid) -> Result<Vec<Alert>, StoreError> {
        let data = self.data.lock().await;
        Ok(data.get(&url_id).cloned().unwrap_or_default())
    }
}
