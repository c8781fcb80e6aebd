//! Runs the orchestrator on a blocking thread so storage I/O never stalls
//! the daemon's event loop. Jobs are handled one at a time in the order
//! they were queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gauge_protocol::{EventOutcome, MonitorEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::daemon::server::{DaemonError, Result};
use crate::data::UpdateOrchestrator;

const QUEUE_DEPTH: usize = 64;

struct Job {
    event: MonitorEvent,
    reply: Option<oneshot::Sender<EventOutcome>>,
}

pub struct OrchestratorWorker {
    tx: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
    handled: Arc<AtomicU64>,
}

impl OrchestratorWorker {
    /// Must be called from within a tokio runtime.
    pub fn spawn(orchestrator: UpdateOrchestrator) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let handled = Arc::new(AtomicU64::new(0));
        let counter = handled.clone();

        let handle = tokio::task::spawn_blocking(move || run(orchestrator, rx, counter));

        Self {
            tx,
            handle,
            handled,
        }
    }

    pub fn events_handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    /// Queue an event without waiting for its outcome.
    pub async fn dispatch(&self, event: MonitorEvent) -> Result<()> {
        self.tx
            .send(Job { event, reply: None })
            .await
            .map_err(|_| DaemonError::WorkerStopped)
    }

    /// Queue an event; the receiver resolves once it has been handled.
    pub async fn submit(&self, event: MonitorEvent) -> Result<oneshot::Receiver<EventOutcome>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Job {
                event,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| DaemonError::WorkerStopped)?;
        Ok(reply_rx)
    }

    /// Drain queued jobs and wait for the worker thread to exit.
    pub async fn shutdown(self) {
        let Self { tx, handle, .. } = self;
        drop(tx);
        if let Err(e) = handle.await {
            error!(error = %e, "Orchestrator worker panicked");
        }
    }
}

fn run(
    mut orchestrator: UpdateOrchestrator,
    mut rx: mpsc::Receiver<Job>,
    handled: Arc<AtomicU64>,
) {
    debug!("Orchestrator worker started");

    while let Some(job) = rx.blocking_recv() {
        let outcome = orchestrator.handle(job.event);
        handled.fetch_add(1, Ordering::Relaxed);

        if let Some(reply) = job.reply {
            let _ = reply.send(outcome);
        }
    }

    debug!("Orchestrator worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertSink;
    use crate::data::{HistoryStore, SnapshotCache};
    use crate::widget::FileSurface;
    use gauge_protocol::{HistoryWrite, RawSample, WidgetId};

    struct Silent;

    impl AlertSink for Silent {
        fn low(&mut self) {}
        fn okay(&mut self) {}
    }

    #[tokio::test]
    async fn test_events_are_handled_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let history = Arc::new(HistoryStore::open_at(dir.path().join("history.db")).unwrap());
        let cache = Arc::new(SnapshotCache::open_at(dir.path().join("snapshot.json")).unwrap());
        let surface = FileSurface::at(dir.path().join("widgets"), [WidgetId::new("default")]);
        let orchestrator =
            UpdateOrchestrator::new(Some(history), cache.clone(), Box::new(surface), Box::new(Silent));

        let worker = OrchestratorWorker::spawn(orchestrator);
        for level in [90, 80, 70] {
            worker
                .dispatch(MonitorEvent::SampleArrived {
                    sample: RawSample::with_level(level, 100),
                })
                .await
                .unwrap();
        }

        let reply = worker
            .submit(MonitorEvent::WidgetRefreshRequest {
                target_ids: vec![WidgetId::new("default")],
            })
            .await
            .unwrap();
        let outcome = reply.await.unwrap();

        assert_eq!(outcome.history, HistoryWrite::NotApplicable);
        assert_eq!(outcome.rendered.unwrap().label, "70%");
        assert_eq!(worker.events_handled(), 4);
        assert_eq!(cache.read().level, 70);

        worker.shutdown().await;
        assert!(dir.path().join("widgets/default.txt").exists());
    }
}
