use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use futures::future;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::store::Store;
use crate::store::models::{Alert, ChangeOperation, DayStat};

use super::heap::ProbeHeap;
use super::sync_heap::SyncHeap;
use super::types::{ProbeResult, Task, TimedUrl};

/// Upper bound on any dispatch-loop sleep, so it stays responsive to
/// newly discovered targets and to shutdown.
const IDLE_QUANTUM: Duration = Duration::from_millis(100);

/// Long-running probe coordinator.
///
/// Owns four concurrent flows plus the worker pool:
///
/// - `schedule` advances the shared min-heap and feeds due probes to
///   the workers (the `tasks` channel);
/// - workers probe and report on the `results` channel;
/// - `update` folds the store's change feed into the heap;
/// - `collect` folds results into day stats and raises alerts.
///
/// Shutdown is cooperative and strictly ordered: discovery stops first
/// (nothing new enters the schedule), then dispatch stops and closes
/// the task channel, workers drain it and release the result channel,
/// and collection drains what is left before [`Scheduler::run`]
/// returns. No in-flight probe is lost or duplicated.
pub struct Scheduler {
    workers: usize,
    request_timeout: Duration,
    store: Arc<dyn Store>,
}

impl Scheduler {
    pub fn new(workers: usize, request_timeout: Duration, store: Arc<dyn Store>) -> Self {
        Self { workers, request_timeout, store }
    }

    /// Runs until `shutdown` resolves, then drains in order and
    /// returns. Errors out early if the initial url scan fails or the
    /// discovery stream breaks while subscribed.
    pub async fn run(&self, shutdown: impl Future<Output = ()> + Send) -> Result<()> {
        let heap = Arc::new(self.initialize_heap().await?);

        let (task_tx, task_rx) = mpsc::channel::<Task>(self.workers);
        let (result_tx, result_rx) = mpsc::channel::<ProbeResult>(self.workers);
        let task_rx = Arc::new(Mutex::new(task_rx));

        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .context("building probe http client")?;

        info!(workers = self.workers, "starting workers");
        let mut worker_handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let worker = super::worker::Worker::new(id, client.clone());
            worker_handles.push(tokio::spawn(worker.work(task_rx.clone(), result_tx.clone())));
        }
        // Workers now hold the only result senders; the channel closes
        // exactly when the last worker stops.
        drop(result_tx);

        let (schedule_stop_tx, schedule_stop_rx) = oneshot::channel();
        let (update_stop_tx, update_stop_rx) = oneshot::channel();
        let (update_done_tx, update_done_rx) = oneshot::channel();
        let (collect_done_tx, collect_done_rx) = oneshot::channel();

        info!("starting modules");
        let schedule_handle = tokio::spawn(schedule(heap.clone(), task_tx, schedule_stop_rx));
        let mut update_handle =
            tokio::spawn(update(self.store.clone(), heap.clone(), update_stop_rx, update_done_tx));
        let collect_handle = tokio::spawn(collect(self.store.clone(), result_rx, collect_done_tx));

        tokio::pin!(shutdown);
        tokio::select! {
            _ = &mut shutdown => {
                info!("received shutdown signal");
            }
            joined = &mut update_handle => {
                // The discovery loop never returns on its own in steady
                // state; running with a stale schedule is worse than dying.
                return Err(match joined {
                    Ok(Err(error)) => error,
                    Ok(Ok(())) => anyhow!("url discovery stopped unexpectedly"),
                    Err(join_error) => anyhow!(join_error).context("url discovery panicked"),
                });
            }
        }

        info!("stopping update");
        let _ = update_stop_tx.send(());
        update_done_rx.await.ok();
        let _ = update_handle.await;

        info!("stopping schedule");
        let _ = schedule_stop_tx.send(());
        let _ = schedule_handle.await;

        info!("waiting for workers to finish");
        future::join_all(worker_handles).await;

        info!("waiting for collect to finish");
        collect_done_rx.await.ok();
        let _ = collect_handle.await;

        info!("scheduler stopped cleanly");
        Ok(())
    }

    /// Seeds the schedule with a full scan of currently known targets.
    async fn initialize_heap(&self) -> Result<SyncHeap> {
        info!("initializing url schedule");
        let urls = self.store.urls().all().await.context("loading initial url set")?;
        info!(count = urls.len(), "seeded schedule from store");

        let entries = urls
            .into_iter()
            .map(|url| Arc::new(TimedUrl::new(url.id, url.url, url.user_id, url.interval)));
        Ok(SyncHeap::new(ProbeHeap::new(entries)))
    }
}

/// Dispatch loop: feeds due probes to the worker pool, rescheduling
/// each fired entry one interval ahead. Dropping `tasks` on exit is
/// what closes the worker input channel.
pub(crate) async fn schedule(
    heap: Arc<SyncHeap>,
    tasks: mpsc::Sender<Task>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        match stop.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => {}
            _ => {
                debug!(target: "schedule", "stopping");
                return;
            }
        }

        let Some(earliest) = heap.peek() else {
            sleep(IDLE_QUANTUM).await;
            continue;
        };

        let now = Instant::now();
        let due_at = earliest.next_call();
        if due_at > now {
            // Never oversleep the stop-check quantum.
            sleep((due_at - now).min(IDLE_QUANTUM)).await;
            continue;
        }

        debug!(target: "schedule", url = %earliest.url, "sending due url to workers");
        let task = Task {
            url_id: earliest.url_id,
            url: earliest.url.clone(),
            user_id: earliest.user_id,
        };
        // A full channel means the pool is saturated; blocking here is
        // deliberate backpressure.
        if tasks.send(task).await.is_err() {
            debug!(target: "schedule", "worker pool gone, stopping");
            return;
        }

        earliest.set_next_call(Instant::now() + earliest.interval);
        heap.fix(earliest.index());
    }
}

/// Discovery loop: folds the store's change feed into the schedule.
/// Update and delete events are accepted but not acted upon yet; the
/// stream ending while subscribed is a fatal protocol violation.
pub(crate) async fn update(
    store: Arc<dyn Store>,
    heap: Arc<SyncHeap>,
    mut stop: oneshot::Receiver<()>,
    done: oneshot::Sender<()>,
) -> Result<()> {
    let mut events = store
        .urls()
        .listen_for_changes()
        .await
        .context("subscribing to url changes")?;

    loop {
        tokio::select! {
            _ = &mut stop => {
                debug!(target: "update", "stopping");
                let _ = done.send(());
                return Ok(());
            }
            event = events.recv() => {
                let Some(event) = event else {
                    bail!("url change stream closed unexpectedly");
                };
                debug!(target: "update", ?event, "received event");
                if event.operation == ChangeOperation::Insert {
                    let url = event.url;
                    info!(target: "update", url = %url.url, "scheduling newly registered url");
                    heap.push(Arc::new(TimedUrl::new(url.id, url.url, url.user_id, url.interval)));
                }
            }
        }
    }
}

/// Collection loop: drains probe results into day stats and raises an
/// alert every time a target's daily failure count hits a multiple of
/// its threshold. Persistence failures are logged and absorbed; one
/// lost sample must not halt collection.
pub(crate) async fn collect(
    store: Arc<dyn Store>,
    mut results: mpsc::Receiver<ProbeResult>,
    done: oneshot::Sender<()>,
) {
    while let Some(result) = results.recv().await {
        debug!(target: "collect", url = %result.task.url, status = result.status_code, "saving result");

        let success = (200..300).contains(&result.status_code);
        let stat = DayStat {
            date: DayStat::today(),
            success_count: if success { 1 } else { 0 },
            failure_count: if success { 0 } else { 1 },
        };

        let updated = store
            .urls()
            .update_stat(result.task.user_id, result.task.url_id, stat)
            .await;
        let (url, stat) = match updated {
            Ok(pair) => pair,
            Err(error) => {
                error!(target: "collect", %error, url = %result.task.url, "failed updating stat");
                continue;
            }
        };

        if alert_due(stat.failure_count, url.threshold) {
            let alert = Alert::new(url.user_id, url.id, url.url.clone());
            match store.alerts().add(alert).await {
                Ok(()) => {
                    info!(target: "collect", url = %url.url, failures = stat.failure_count, "alert raised");
                }
                Err(error) => {
                    error!(target: "collect", %error, url = %url.url, "failed adding alert");
                }
            }
        }
    }

    let _ = done.send(());
}

/// Every `threshold`-th cumulative failure of the day re-fires, not
/// just the first crossing. A zero threshold never alerts; the
/// registration path keeps it positive, but the store cannot prove it.
fn alert_due(failure_count: u32, threshold: u32) -> bool {
    failure_count > 0 && threshold > 0 && failure_count % threshold == 0
}
