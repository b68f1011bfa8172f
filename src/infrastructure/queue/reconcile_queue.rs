use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{error, info, warn};

use crate::application::usecases::reconcile::ReconcileUseCase;

/// Explicit task handoff between webhook acknowledgment and reconciliation:
/// the HTTP handler enqueues a payment id and answers immediately; a worker
/// pool drains the queue calling the engine. A full queue drops the id with a
/// warning, since the provider redelivers undelivered notifications.
pub struct ReconcileQueue {
    tx: mpsc::Sender<String>,
}

impl ReconcileQueue {
    pub fn spawn(usecase: Arc<ReconcileUseCase>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<String>(capacity);
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let usecase = Arc::clone(&usecase);
            tokio::spawn(async move {
                loop {
                    let payment_id = { rx.lock().await.recv().await };
                    let Some(payment_id) = payment_id else {
                        info!(worker_id, "reconcile queue: channel closed; worker exiting");
                        break;
                    };
                    match usecase.fetch_and_reconcile(&payment_id).await {
                        Ok(outcome) => {
                            info!(
                                worker_id,
                                payment_id = %payment_id,
                                outcome = ?outcome,
                                "reconcile queue: notification processed"
                            );
                        }
                        Err(err) => {
                            // The attempt aborted with no partial state; the
                            // provider's redelivery or a manual poll retries.
                            error!(
                                worker_id,
                                payment_id = %payment_id,
                                error = ?err,
                                "reconcile queue: reconciliation failed"
                            );
                        }
                    }
                }
            });
        }

        Self { tx }
    }

    pub fn enqueue(&self, payment_id: String) {
        if let Err(err) = self.tx.try_send(payment_id) {
            warn!(
                error = %err,
                "reconcile queue: enqueue failed; relying on provider redelivery"
            );
        }
    }
}
