//! Client-side progress batching.
//!
//! Playback clients are expected to coalesce position updates and flush them
//! on a fixed interval, plus one best-effort flush on teardown. This is that
//! contract as a cancellable task: updates for the same asset are coalesced
//! by keeping the newest client timestamp, delivery is not guaranteed, and a
//! failed flush is logged and dropped rather than retried.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

type AssetKey = (String, String, String);

/// One coalesced position update waiting to be flushed.
#[derive(Debug, Clone)]
pub struct PendingPosition {
    pub course_slug: String,
    pub lesson_slug: String,
    pub asset_id: String,
    pub asset_type: String,
    pub position_sec: f64,
    pub duration_sec: Option<f64>,
    pub client_updated_at_ms: i64,
}

impl PendingPosition {
    fn key(&self) -> AssetKey {
        (
            self.course_slug.clone(),
            self.lesson_slug.clone(),
            self.asset_id.clone(),
        )
    }
}

/// Destination of a flush, typically the progress write endpoint.
#[async_trait]
pub trait ProgressSink: Send + Sync + 'static {
    async fn flush(
        &self,
        updates: Vec<PendingPosition>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub struct ProgressBatcher {
    pending: Arc<Mutex<HashMap<AssetKey, PendingPosition>>>,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ProgressBatcher {
    pub fn new(sink: Arc<dyn ProgressSink>, interval: Duration) -> Self {
        let pending: Arc<Mutex<HashMap<AssetKey, PendingPosition>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task_pending = pending.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        flush_pending(&task_pending, sink.as_ref()).await;
                    }
                    _ = &mut shutdown_rx => {
                        // Final best-effort flush before the task ends.
                        flush_pending(&task_pending, sink.as_ref()).await;
                        break;
                    }
                }
            }
            debug!("Progress batcher stopped");
        });

        Self {
            pending,
            shutdown_tx,
            handle,
        }
    }

    /// Queue an update, keeping only the newest timestamp per asset.
    pub async fn record(&self, update: PendingPosition) {
        let mut pending = self.pending.lock().await;
        match pending.get(&update.key()) {
            Some(existing) if existing.client_updated_at_ms > update.client_updated_at_ms => {}
            _ => {
                pending.insert(update.key(), update);
            }
        }
    }

    /// Cancel the periodic task, flushing whatever is still pending.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

async fn flush_pending(
    pending: &Mutex<HashMap<AssetKey, PendingPosition>>,
    sink: &dyn ProgressSink,
) {
    let updates: Vec<PendingPosition> = {
        let mut pending = pending.lock().await;
        pending.drain().map(|(_, v)| v).collect()
    };
    if updates.is_empty() {
        return;
    }
    if let Err(e) = sink.flush(updates).await {
        // Accepted loss: the next interval carries fresher positions anyway.
        warn!("Progress flush failed: {}", e);
    }
}
