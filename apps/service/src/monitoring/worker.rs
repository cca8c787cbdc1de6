use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error};

use super::types::{ProbeResult, Task};

/// One member of the probe pool. Workers are stateless and
/// interchangeable; they share a single `reqwest` client carrying the
/// pool-wide per-request timeout.
pub struct Worker {
    id: usize,
    client: reqwest::Client,
}

impl Worker {
    pub fn new(id: usize, client: reqwest::Client) -> Self {
        Self { id, client }
    }

    /// Takes tasks one at a time from the shared input channel until it
    /// is closed and drained, emitting a result for every probe that
    /// reached a status line. The receiver lock covers only the dequeue,
    /// never the probe itself.
    pub async fn work(
        self,
        input: Arc<Mutex<mpsc::Receiver<Task>>>,
        output: mpsc::Sender<ProbeResult>,
    ) {
        loop {
            let task = { input.lock().await.recv().await };
            let Some(task) = task else {
                break;
            };
            if let Some(result) = self.probe(task).await {
                if output.send(result).await.is_err() {
                    // Collector gone; nothing left to report to.
                    break;
                }
            }
        }
        debug!(worker = self.id, "worker stopped");
    }

    /// A single bounded-timeout GET. Transport failures (including
    /// timeouts) drop the probe entirely — no result, no retry; the url
    /// comes due again at its next natural interval. A failed body read
    /// still yields a result, since the status code is meaningful on
    /// its own.
    async fn probe(&self, task: Task) -> Option<ProbeResult> {
        debug!(worker = self.id, url = %task.url, "probing url");

        let response = match self.client.get(&task.url).send().await {
            Ok(response) => response,
            Err(error) => {
                error!(worker = self.id, url = %task.url, %error, "probe request failed");
                return None;
            }
        };

        let status_code = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(error) => {
                error!(worker = self.id, url = %task.url, %error, "failed reading response body");
                String::new()
            }
        };

        Some(ProbeResult { task, status_code, body })
    }
}
