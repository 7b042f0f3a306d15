//! Per-event execution context handed to handlers.
//!
//! [`EventContext`] bundles the canonical event with the two outbound seams a
//! handler can use: the [`ApiSender`] for direct control API calls and the
//! [`OutboundSink`] for fire-and-forget sends serialized by the queue worker.
//! Both are traits so the core stays free of the HTTP stack.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::error::ApiResult;
use crate::event::MessageEvent;

/// Form-encoded request parameters, in insertion order.
pub type Params = Vec<(String, String)>;

/// Authenticated request execution against the control API.
///
/// Implemented by the transport layer; the core and user handlers only see
/// this seam.
#[async_trait]
pub trait ApiSender: Send + Sync {
    /// Calls an API method and returns the unwrapped response payload.
    async fn send(&self, method: &str, params: &Params) -> ApiResult<Value>;

    /// Resolves a full message record by id.
    ///
    /// Returns an empty object when the message cannot be found.
    async fn fetch_message(&self, message_id: i64) -> ApiResult<Value>;
}

/// Fire-and-forget hand-off to the outbound queue.
///
/// Ownership of the task transfers fully on enqueue; the caller observes no
/// result.
pub trait OutboundSink: Send + Sync {
    /// Appends a task to the queue. Never blocks, never fails.
    fn enqueue(&self, method: &str, params: Params);
}

/// Generates a deduplication id for outbound sends.
pub fn random_id() -> i64 {
    rand::random::<i32>() as i64
}

/// The context a matched handler runs with.
pub struct EventContext {
    event: MessageEvent,
    sender: Arc<dyn ApiSender>,
    outbound: Arc<dyn OutboundSink>,
    full_message: OnceCell<Value>,
}

impl EventContext {
    /// Creates a context for one dispatched event.
    pub fn new(
        event: MessageEvent,
        sender: Arc<dyn ApiSender>,
        outbound: Arc<dyn OutboundSink>,
    ) -> Self {
        Self {
            event,
            sender,
            outbound,
            full_message: OnceCell::new(),
        }
    }

    /// The canonical event being handled.
    pub fn event(&self) -> &MessageEvent {
        &self.event
    }

    /// The transport seam, for direct API calls.
    pub fn client(&self) -> &Arc<dyn ApiSender> {
        &self.sender
    }

    /// Message id of the message.
    pub fn message_id(&self) -> i64 {
        self.event.message_id
    }

    /// Conversation the message belongs to.
    pub fn peer_id(&self) -> i64 {
        self.event.peer_id
    }

    /// Text of the message.
    pub fn text(&self) -> &str {
        &self.event.text
    }

    /// Sender id of the message.
    pub fn from_id(&self) -> i64 {
        self.event.from_id
    }

    /// Whether the event arrived through a group-category token.
    pub fn is_group(&self) -> bool {
        self.event.is_group
    }

    /// Unix timestamp of the message.
    pub fn date(&self) -> i64 {
        self.event.date
    }

    /// 1 if the message is outgoing, 0 if incoming.
    pub fn out(&self) -> i64 {
        self.event.out
    }

    /// Conversation-scoped message id.
    pub fn conversation_message_id(&self) -> i64 {
        self.event.conversation_message_id
    }

    /// Attachment descriptors, in order.
    pub fn attachments(&self) -> &[Value] {
        &self.event.attachments
    }

    /// Forwarded-message descriptors, in order.
    pub fn fwd_messages(&self) -> &[Value] {
        &self.event.fwd_messages
    }

    /// The raw record the event was normalized from.
    pub fn raw(&self) -> &Value {
        &self.event.raw
    }

    /// Lazily fetches and caches the full message record.
    pub async fn full_message(&self) -> ApiResult<&Value> {
        self.full_message
            .get_or_try_init(|| self.sender.fetch_message(self.event.message_id))
            .await
    }

    fn send_params(&self, extra: &[(&str, String)]) -> Params {
        let mut params: Params = vec![
            ("peer_id".into(), self.event.peer_id.to_string()),
            ("random_id".into(), random_id().to_string()),
        ];
        for (name, value) in extra {
            params.push(((*name).into(), value.clone()));
        }
        params
    }

    /// Sends a text reply into the conversation, waiting for the result.
    pub async fn answer(&self, text: impl Into<String>) -> ApiResult<()> {
        let params = self.send_params(&[("message", text.into())]);
        self.sender.send("messages.send", &params).await?;
        Ok(())
    }

    /// Sends a sticker into the conversation.
    pub async fn send_sticker(&self, sticker_id: i64) -> ApiResult<()> {
        let params = self.send_params(&[("sticker_id", sticker_id.to_string())]);
        self.sender.send("messages.send", &params).await?;
        Ok(())
    }

    /// Sends a single attachment (e.g. `photo123_456`) with optional text.
    pub async fn send_photo(&self, attachment: &str, text: &str) -> ApiResult<()> {
        let params = self.send_params(&[
            ("attachment", attachment.to_string()),
            ("message", text.to_string()),
        ]);
        self.sender.send("messages.send", &params).await?;
        Ok(())
    }

    /// Sends multiple attachments with optional text.
    pub async fn send_attachments(&self, attachments: &[String], text: &str) -> ApiResult<()> {
        let params = self.send_params(&[
            ("attachment", attachments.join(",")),
            ("message", text.to_string()),
        ]);
        self.sender.send("messages.send", &params).await?;
        Ok(())
    }

    /// Hands an arbitrary API call to the outbound queue.
    pub fn enqueue(&self, method: &str, params: Params) {
        self.outbound.enqueue(method, params);
    }

    /// Hands a text reply to the outbound queue.
    pub fn enqueue_answer(&self, text: impl Into<String>) {
        let params = self.send_params(&[("message", text.into())]);
        self.outbound.enqueue("messages.send", params);
    }
}

impl std::fmt::Debug for EventContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventContext")
            .field("message_id", &self.event.message_id)
            .field("peer_id", &self.event.peer_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{TokenKind, normalize_message};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingSender {
        pub calls: Mutex<Vec<(String, Params)>>,
    }

    #[async_trait]
    impl ApiSender for RecordingSender {
        async fn send(&self, method: &str, params: &Params) -> ApiResult<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params.clone()));
            Ok(json!({}))
        }

        async fn fetch_message(&self, message_id: i64) -> ApiResult<Value> {
            self.calls
                .lock()
                .unwrap()
                .push(("messages.getById".into(), vec![]));
            Ok(json!({"id": message_id, "text": "full"}))
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub tasks: Mutex<Vec<(String, Params)>>,
    }

    impl OutboundSink for RecordingSink {
        fn enqueue(&self, method: &str, params: Params) {
            self.tasks.lock().unwrap().push((method.to_string(), params));
        }
    }

    fn context(sender: Arc<RecordingSender>, sink: Arc<RecordingSink>) -> EventContext {
        let raw = json!({"id": 1, "peer_id": 2, "text": "hi", "from_id": 3});
        let event = normalize_message(&raw, TokenKind::Account).unwrap();
        EventContext::new(event, sender, sink)
    }

    #[tokio::test]
    async fn answer_goes_through_sender() {
        let sender = Arc::new(RecordingSender::default());
        let sink = Arc::new(RecordingSink::default());
        let ctx = context(Arc::clone(&sender), sink);

        ctx.answer("pong").await.unwrap();

        let calls = sender.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (method, params) = &calls[0];
        assert_eq!(method, "messages.send");
        assert!(params.iter().any(|(k, v)| k == "peer_id" && v == "2"));
        assert!(params.iter().any(|(k, v)| k == "message" && v == "pong"));
        assert!(params.iter().any(|(k, _)| k == "random_id"));
    }

    #[tokio::test]
    async fn enqueue_goes_through_sink() {
        let sender = Arc::new(RecordingSender::default());
        let sink = Arc::new(RecordingSink::default());
        let ctx = context(sender.clone(), Arc::clone(&sink));

        ctx.enqueue_answer("later");

        assert!(sender.calls.lock().unwrap().is_empty());
        let tasks = sink.tasks.lock().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].0, "messages.send");
    }

    #[tokio::test]
    async fn full_message_is_fetched_once() {
        let sender = Arc::new(RecordingSender::default());
        let sink = Arc::new(RecordingSink::default());
        let ctx = context(Arc::clone(&sender), sink);

        let first = ctx.full_message().await.unwrap().clone();
        let second = ctx.full_message().await.unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(sender.calls.lock().unwrap().len(), 1);
    }
}
