//! Phase two of a submission: notifications are queued after the lead is
//! stored and sent by a background worker the request never awaits.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::models::Lead;
use crate::notify::NotificationDispatcher;

/// One-shot unit of work: a snapshot of a stored lead awaiting notification.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub lead: Lead,
    pub enqueued_at: DateTime<Utc>,
}

/// Sending half of the bounded notification queue.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<NotificationEvent>,
}

impl DispatchQueue {
    /// Creates the queue and returns the receiver to hand to the worker.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Schedules one notification. Never blocks and never fails the caller;
    /// returns whether the event was accepted.
    pub fn enqueue(&self, lead: Lead) -> bool {
        let lead_id = lead.id;
        let event = NotificationEvent {
            lead,
            enqueued_at: Utc::now(),
        };

        match self.tx.try_send(event) {
            Ok(()) => {
                tracing::debug!("Notification queued for lead {}", lead_id);
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    "⚠️  Dispatch queue full, notification for lead {} dropped",
                    lead_id
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!(
                    "❌ Dispatch worker stopped, notification for lead {} dropped",
                    lead_id
                );
                false
            }
        }
    }
}

/// Drains the queue, sending each notification on its own task so dispatches
/// for different leads run in parallel.
pub fn spawn_dispatch_worker(
    mut rx: mpsc::Receiver<NotificationEvent>,
    dispatcher: Arc<NotificationDispatcher>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("✓ Dispatch worker started");
        while let Some(event) = rx.recv().await {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let waited = Utc::now() - event.enqueued_at;
                tracing::debug!(
                    "Dispatching lead {} after {}ms in queue",
                    event.lead.id,
                    waited.num_milliseconds()
                );
                // Failure is already logged by the dispatcher; nothing is retried.
                let _ = dispatcher.dispatch(&event.lead).await;
            });
        }
        tracing::info!("Dispatch worker stopped (queue closed)");
    })
}
