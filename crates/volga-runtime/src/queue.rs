//! Fire-and-forget outbound call queue.
//!
//! Handlers that do not care about the response push API calls onto
//! [`OutboundQueue`]; a single [`OutboundWorker`] drains the queue in
//! submission order, pacing one call per tick. A failed call is logged and
//! discarded, never retried, and never blocks the calls behind it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use volga_core::{ApiSender, OutboundSink, Params};

/// Default pacing between worker ticks.
pub const DEFAULT_QUEUE_INTERVAL: Duration = Duration::from_millis(100);

/// One queued API call.
#[derive(Debug, Clone)]
pub struct OutboundTask {
    /// API method name.
    pub method: String,
    /// Form parameters, without credentials.
    pub params: Params,
}

/// Producer half of the queue. Cheap to clone; push never blocks.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<OutboundTask>,
}

impl OutboundQueue {
    /// Creates a queue and the worker that drains it.
    pub fn channel(
        sender: Arc<dyn ApiSender>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> (Self, OutboundWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { tx },
            OutboundWorker {
                rx,
                sender,
                interval,
                cancel,
            },
        )
    }

    /// Pushes a call onto the queue.
    ///
    /// Silently drops the task when the worker has already shut down; at
    /// that point there is nobody left to execute it anyway.
    pub fn push(&self, method: impl Into<String>, params: Params) {
        let task = OutboundTask {
            method: method.into(),
            params,
        };
        if self.tx.send(task).is_err() {
            warn!("Outbound queue worker is gone, dropping task");
        }
    }
}

impl OutboundSink for OutboundQueue {
    fn enqueue(&self, method: &str, params: Params) {
        self.push(method, params);
    }
}

/// Consumer half of the queue: a single paced drain loop.
pub struct OutboundWorker {
    rx: mpsc::UnboundedReceiver<OutboundTask>,
    sender: Arc<dyn ApiSender>,
    interval: Duration,
    cancel: CancellationToken,
}

impl OutboundWorker {
    /// Runs until cancelled or until every producer has been dropped.
    ///
    /// Each tick executes at most one task, then sleeps the pacing
    /// interval. Failures are logged and the task is discarded.
    pub async fn run(mut self) {
        info!(interval = ?self.interval, "Outbound queue worker started");

        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    if let Err(err) = self.sender.send(&task.method, &task.params).await {
                        warn!(method = %task.method, error = %err, "Outbound call failed, discarding");
                    } else {
                        debug!(method = %task.method, "Outbound call delivered");
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break,
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Outbound queue worker stopped");
    }
}

impl std::fmt::Debug for OutboundWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundWorker")
            .field("interval", &self.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use volga_core::{ApiError, ApiResult};

    struct RecordingSender {
        calls: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl RecordingSender {
        fn new(fail_on: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_on: fail_on.map(str::to_string),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ApiSender for RecordingSender {
        async fn send(&self, method: &str, _params: &Params) -> ApiResult<Value> {
            self.calls.lock().unwrap().push(method.to_string());
            if self.fail_on.as_deref() == Some(method) {
                return Err(ApiError::Api {
                    code: 9,
                    message: "flood control".into(),
                });
            }
            Ok(json!({}))
        }

        async fn fetch_message(&self, _message_id: i64) -> ApiResult<Value> {
            Ok(json!({}))
        }
    }

    #[tokio::test]
    async fn drains_in_submission_order() {
        let sender = RecordingSender::new(None);
        let cancel = CancellationToken::new();
        let (queue, worker) =
            OutboundQueue::channel(sender.clone(), Duration::from_millis(1), cancel.clone());

        queue.push("messages.send", vec![("peer_id".into(), "1".into())]);
        queue.push("messages.setActivity", Vec::new());
        queue.push("messages.markAsRead", Vec::new());

        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(
            sender.calls(),
            vec!["messages.send", "messages.setActivity", "messages.markAsRead"]
        );
    }

    #[tokio::test]
    async fn failed_call_does_not_block_later_tasks() {
        let sender = RecordingSender::new(Some("messages.send"));
        let cancel = CancellationToken::new();
        let (queue, worker) =
            OutboundQueue::channel(sender.clone(), Duration::from_millis(1), cancel.clone());

        queue.push("messages.send", Vec::new());
        queue.push("messages.setActivity", Vec::new());

        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(sender.calls(), vec!["messages.send", "messages.setActivity"]);
    }

    #[tokio::test]
    async fn worker_exits_when_producers_drop() {
        let sender = RecordingSender::new(None);
        let cancel = CancellationToken::new();
        let (queue, worker) =
            OutboundQueue::channel(sender.clone(), Duration::from_millis(1), cancel);

        queue.push("messages.send", Vec::new());
        drop(queue);

        // No cancellation needed: the closed channel ends the loop.
        worker.run().await;
        assert_eq!(sender.calls(), vec!["messages.send"]);
    }

    #[tokio::test]
    async fn push_after_shutdown_is_dropped() {
        let sender = RecordingSender::new(None);
        let cancel = CancellationToken::new();
        let (queue, worker) =
            OutboundQueue::channel(sender, Duration::from_millis(1), cancel.clone());

        cancel.cancel();
        worker.run().await;

        // Must not panic.
        queue.push("messages.send", Vec::new());
    }
}
