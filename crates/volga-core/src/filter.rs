//! Equality filters over canonical event fields.
//!
//! A [`Filter`] is an ordered set of `field name → required value` entries.
//! A handler matches an event when every entry equals the value read from the
//! event; an empty filter matches everything.

use serde_json::Value;

use crate::event::MessageEvent;

/// A predicate over [`MessageEvent`] fields.
///
/// # Example
///
/// ```rust,ignore
/// let filter = Filter::new().text("/help").is_group(false);
/// assert!(filter.matches(&event));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Filter {
    required: Vec<(String, Value)>,
}

impl Filter {
    /// Creates an empty filter, which matches every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the named canonical field to equal `value`.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.required.push((name.into(), value.into()));
        self
    }

    /// Requires an exact message text.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.field("text", text.into())
    }

    /// Requires a specific conversation.
    pub fn peer_id(self, peer_id: i64) -> Self {
        self.field("peer_id", peer_id)
    }

    /// Requires a specific sender.
    pub fn from_id(self, from_id: i64) -> Self {
        self.field("from_id", from_id)
    }

    /// Requires the event to come from a group (or account) token.
    pub fn is_group(self, is_group: bool) -> Self {
        self.field("is_group", is_group)
    }

    /// Whether this filter has no entries (wildcard).
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    /// Checks the event against every entry.
    ///
    /// A field name the event does not expose never matches.
    pub fn matches(&self, event: &MessageEvent) -> bool {
        self.required
            .iter()
            .all(|(name, want)| event.field(name).as_ref() == Some(want))
    }
}
