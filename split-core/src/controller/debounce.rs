//! Background writer for the local form snapshot.
//!
//! Edits arrive faster than they are worth persisting. The writer keeps only
//! the newest snapshot and writes it once no edit has arrived for the
//! debounce window. Currency changes are written straight away.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error};

use crate::models::{Currency, SharePayload};
use crate::store::{self, KeyValueStore};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

enum Command {
    Snapshot(SharePayload),
    Currency(Currency),
    Flush(oneshot::Sender<()>),
}

/// Handle to the writer task. Dropping it lets the task write whatever is
/// pending and exit.
pub struct SnapshotWriter {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl SnapshotWriter {
    /// Starts the writer on the current tokio runtime.
    pub fn spawn(
        store: Arc<dyn KeyValueStore>,
        delay: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, delay, rx));
        Self { tx, task }
    }

    /// Queues a snapshot, replacing any that is still waiting.
    pub fn schedule(&self, snapshot: SharePayload) {
        if self.tx.send(Command::Snapshot(snapshot)).is_err() {
            debug!("snapshot writer stopped; dropping snapshot");
        }
    }

    pub fn save_currency(&self, currency: Currency) {
        if self.tx.send(Command::Currency(currency)).is_err() {
            debug!("snapshot writer stopped; dropping currency");
        }
    }

    /// Writes any pending snapshot now and waits for it.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Writes any pending snapshot and stops the task.
    pub async fn shutdown(self) {
        let Self { tx, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            error!(error = %e, "snapshot writer task failed");
        }
    }
}

async fn run(
    store: Arc<dyn KeyValueStore>,
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<(SharePayload, Instant)> = None;

    loop {
        let command = match &pending {
            Some((_, deadline)) => {
                let deadline = *deadline;
                tokio::select! {
                    command = rx.recv() => command,
                    () = sleep_until(deadline) => {
                        if let Some((snapshot, _)) = pending.take() {
                            write_snapshot(store.as_ref(), &snapshot);
                        }
                        continue;
                    }
                }
            }
            None => rx.recv().await,
        };

        match command {
            Some(Command::Snapshot(snapshot)) => {
                pending = Some((snapshot, Instant::now() + delay));
            }
            Some(Command::Currency(currency)) => {
                if let Err(e) = store::save_currency(store.as_ref(), currency) {
                    error!(error = %e, "failed to save currency preference");
                }
            }
            Some(Command::Flush(done)) => {
                if let Some((snapshot, _)) = pending.take() {
                    write_snapshot(store.as_ref(), &snapshot);
                }
                let _ = done.send(());
            }
            None => {
                if let Some((snapshot, _)) = pending.take() {
                    write_snapshot(store.as_ref(), &snapshot);
                }
                debug!("snapshot writer stopped");
                return;
            }
        }
    }
}

fn write_snapshot(
    store: &dyn KeyValueStore,
    snapshot: &SharePayload,
) {
    match store::save_snapshot(store, snapshot) {
        Ok(()) => debug!(expenses = snapshot.expenses.len(), "form snapshot saved"),
        Err(e) => error!(error = %e, "failed to save form snapshot"),
    }
}
