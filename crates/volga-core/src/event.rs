//! Canonical message event and normalization.
//!
//! The two token categories deliver structurally different raw payloads, but
//! by the time an update reaches this module it has been resolved into a full
//! message record (a JSON object keyed by field name). [`normalize_message`]
//! maps that record into the single [`MessageEvent`] shape the dispatcher
//! works with.

use serde::Serialize;
use serde_json::Value;

/// Which kind of credentials the client authenticates with.
///
/// The category changes both the control API surface and the raw long-poll
/// event encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An individual account token.
    Account,
    /// An automated group-owned token.
    Group,
}

impl TokenKind {
    /// Returns `true` for group-category tokens.
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Account => write!(f, "account"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// The normalized, provider-agnostic representation of an inbound message.
///
/// `message_id` and `peer_id` are guaranteed present and non-zero; a record
/// failing that invariant never becomes a `MessageEvent` at all.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEvent {
    /// Message id.
    pub message_id: i64,
    /// Conversation the message belongs to.
    pub peer_id: i64,
    /// Message text, empty when absent.
    pub text: String,
    /// Sender id.
    pub from_id: i64,
    /// Whether the token that received this event is group-category.
    pub is_group: bool,
    /// Unix timestamp of the message.
    pub date: i64,
    /// 1 for outgoing messages, 0 for incoming.
    pub out: i64,
    /// Conversation-scoped message id.
    pub conversation_message_id: i64,
    /// Deduplication id supplied by the sender.
    pub random_id: i64,
    /// Opaque attachment descriptors, in order.
    pub attachments: Vec<Value>,
    /// Opaque forwarded-message descriptors, in order.
    pub fwd_messages: Vec<Value>,
    /// The full raw record this event was built from.
    pub raw: Value,
}

impl MessageEvent {
    /// Looks up a canonical field by name.
    ///
    /// This is the attribute-lookup surface used by [`Filter`] matching;
    /// unknown names yield `None`.
    ///
    /// [`Filter`]: crate::Filter
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "message_id" => Some(self.message_id.into()),
            "peer_id" => Some(self.peer_id.into()),
            "text" => Some(self.text.clone().into()),
            "from_id" => Some(self.from_id.into()),
            "is_group" => Some(self.is_group.into()),
            "date" => Some(self.date.into()),
            "out" => Some(self.out.into()),
            "conversation_message_id" => Some(self.conversation_message_id.into()),
            "random_id" => Some(self.random_id.into()),
            _ => None,
        }
    }
}

fn int_field(raw: &Value, name: &str) -> i64 {
    raw.get(name).and_then(Value::as_i64).unwrap_or_default()
}

fn list_field(raw: &Value, name: &str) -> Vec<Value> {
    raw.get(name)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Normalizes a full message record into a [`MessageEvent`].
///
/// Pure function, no I/O. Returns `None` when `id` or `peer_id` is missing or
/// zero; the caller must treat that as "skip, do not dispatch". Optional
/// list-valued fields default to empty rather than absent.
pub fn normalize_message(raw: &Value, kind: TokenKind) -> Option<MessageEvent> {
    let message_id = int_field(raw, "id");
    let peer_id = int_field(raw, "peer_id");

    if message_id == 0 || peer_id == 0 {
        return None;
    }

    Some(MessageEvent {
        message_id,
        peer_id,
        text: raw
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        from_id: int_field(raw, "from_id"),
        is_group: kind.is_group(),
        date: int_field(raw, "date"),
        out: int_field(raw, "out"),
        conversation_message_id: int_field(raw, "conversation_message_id"),
        random_id: int_field(raw, "random_id"),
        attachments: list_field(raw, "attachments"),
        fwd_messages: list_field(raw, "fwd_messages"),
        raw: raw.clone(),
    })
}
