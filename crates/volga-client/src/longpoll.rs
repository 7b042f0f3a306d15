//! The long-poll stream: cursor tracking, desync recovery, message feed.
//!
//! [`LongPollStream`] owns the endpoint descriptor for its whole lifetime.
//! It negotiates lazily on first use, advances the cursor after every
//! successful poll, repairs the cursor in place on a history gap
//! (`failed: 1`), and re-negotiates the session from scratch on any other
//! failure indicator. Consumers pull messages one at a time with
//! [`next_message`]; the stream is infinite and every recoverable failure is
//! handled internally.
//!
//! [`next_message`]: LongPollStream::next_message

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{ApiClient, map_transport};
use crate::session::{Cursor, Endpoint, SessionNegotiator};
use volga_core::{ApiError, ApiResult, PollError, PollResult, TokenKind};

/// How long the server holds the connection open waiting for events.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(25);

/// Extra time granted to the poll request on top of the server-side wait.
const WAIT_GRACE: Duration = Duration::from_secs(10);

/// Positional discriminator for "message created" in account-category raws.
const ACCOUNT_MESSAGE_NEW: i64 = 4;

/// Type tag for "message created" in group-category raws.
const GROUP_MESSAGE_NEW: &str = "message_new";

/// Picks the new-message id out of a raw update, if it is one.
///
/// Group-category updates are keyed objects with a type discriminator;
/// account-category updates are positional arrays with a numeric code in
/// the leading slot.
fn extract_message_id(update: &Value, kind: TokenKind) -> Option<i64> {
    match kind {
        TokenKind::Group => {
            if update.get("type")?.as_str()? != GROUP_MESSAGE_NEW {
                return None;
            }
            update.get("object")?.get("message")?.get("id")?.as_i64()
        }
        TokenKind::Account => {
            let fields = update.as_array()?;
            if fields.first()?.as_i64()? != ACCOUNT_MESSAGE_NEW {
                return None;
            }
            fields.get(1)?.as_i64()
        }
    }
}

/// Stateful long-poll session over a negotiated endpoint.
pub struct LongPollStream {
    client: Arc<ApiClient>,
    negotiator: SessionNegotiator,
    kind: TokenKind,
    endpoint: Option<Endpoint>,
    pending: VecDeque<Value>,
    wait: Duration,
    resync_max_attempts: u32,
    resync_delay: Duration,
}

impl LongPollStream {
    /// Creates a stream for the given token category.
    ///
    /// No negotiation happens here; the first poll performs it.
    pub fn new(client: Arc<ApiClient>, kind: TokenKind) -> Self {
        Self {
            negotiator: SessionNegotiator::new(Arc::clone(&client)),
            client,
            kind,
            endpoint: None,
            pending: VecDeque::new(),
            wait: DEFAULT_WAIT,
            resync_max_attempts: 5,
            resync_delay: Duration::from_millis(500),
        }
    }

    /// Overrides the server-side wait duration.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Overrides the resync bound: at most `max_attempts` re-negotiations
    /// per poll, with a doubling delay starting at `delay`.
    pub fn with_resync_policy(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.resync_max_attempts = max_attempts.max(1);
        self.resync_delay = delay;
        self
    }

    fn set_cursor(&mut self, ts: Cursor) {
        if let Some(endpoint) = &mut self.endpoint {
            endpoint.ts = ts;
        }
    }

    /// Issues one `a_check` GET against the current endpoint.
    async fn check(&self, endpoint: &Endpoint) -> ApiResult<Value> {
        // Group negotiation hands back a full URL, account negotiation a
        // bare host.
        let url = if endpoint.server.contains("://") {
            endpoint.server.clone()
        } else {
            format!("https://{}", endpoint.server)
        };

        let wait_secs = self.wait.as_secs().to_string();
        let query = [
            ("act", "a_check"),
            ("key", endpoint.key.as_str()),
            ("ts", endpoint.ts.as_str()),
            ("wait", wait_secs.as_str()),
        ];

        tokio::time::timeout(self.wait + WAIT_GRACE, async {
            let response = self
                .client
                .http()
                .get(&url)
                .query(&query)
                .send()
                .await
                .map_err(map_transport)?;

            let status = response.status();
            if !status.is_success() {
                return Err(ApiError::Http {
                    status: status.as_u16(),
                    reason: status.canonical_reason().unwrap_or("unknown").to_string(),
                });
            }

            response
                .json()
                .await
                .map_err(|e| ApiError::Json(e.to_string()))
        })
        .await
        .map_err(|_| ApiError::Timeout)?
    }

    /// Performs one poll and returns the raw update batch (possibly empty).
    ///
    /// Negotiates the endpoint when absent. A `failed: 1` response repairs
    /// the cursor and reports an empty batch. Any other failure indicator
    /// discards the endpoint and re-negotiates, bounded by the resync
    /// policy; transient transport errors on the poll itself are retried
    /// under the same bound.
    pub async fn poll(&mut self) -> PollResult<Vec<Value>> {
        let mut attempts = 0u32;

        loop {
            let endpoint = match &self.endpoint {
                Some(endpoint) => endpoint.clone(),
                None => {
                    let endpoint = self.negotiator.negotiate(self.kind).await?;
                    self.endpoint = Some(endpoint.clone());
                    endpoint
                }
            };

            let body = match self.check(&endpoint).await {
                Ok(body) => body,
                Err(err) if err.is_transient() && attempts + 1 < self.resync_max_attempts => {
                    attempts += 1;
                    warn!(attempt = attempts, error = %err, "Long poll request failed, retrying");
                    tokio::time::sleep(self.backoff(attempts)).await;
                    continue;
                }
                Err(err) => return Err(PollError::Request(err)),
            };

            match body.get("failed").and_then(Value::as_u64) {
                None => {
                    if let Some(ts) = body.get("ts").and_then(Cursor::from_value) {
                        self.set_cursor(ts);
                    }
                    let updates = body
                        .get("updates")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    return Ok(updates);
                }
                Some(1) => {
                    // History gap: the session is still valid, only the
                    // cursor was too old. Adopt the replacement and move on.
                    let ts = body
                        .get("ts")
                        .and_then(Cursor::from_value)
                        .ok_or_else(|| {
                            PollError::BadResponse("failed=1 without replacement ts".into())
                        })?;
                    debug!(ts = %ts, "Cursor repaired after history gap");
                    self.set_cursor(ts);
                    return Ok(Vec::new());
                }
                Some(code) => {
                    warn!(code, "Long poll session invalidated, renegotiating");
                    self.endpoint = None;
                    attempts += 1;
                    if attempts >= self.resync_max_attempts {
                        return Err(PollError::ResyncExhausted { attempts });
                    }
                    if attempts > 1 {
                        tokio::time::sleep(self.backoff(attempts - 1)).await;
                    }
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.resync_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Pulls the next full message record, polling as needed.
    ///
    /// Buffered updates are consumed strictly in server order. Updates that
    /// are not "message created" are skipped; a message whose full record
    /// cannot be fetched is logged and skipped so one bad record never
    /// stalls the feed. Only negotiation failures and resync/retry
    /// exhaustion propagate.
    pub async fn next_message(&mut self) -> PollResult<Value> {
        loop {
            while let Some(update) = self.pending.pop_front() {
                let Some(message_id) = extract_message_id(&update, self.kind) else {
                    continue;
                };
                match self.client.fetch_message(message_id).await {
                    Ok(full) => return Ok(full),
                    Err(err) => {
                        warn!(message_id, error = %err, "Failed to resolve full message, skipping");
                    }
                }
            }

            let batch = self.poll().await?;
            self.pending.extend(batch);
        }
    }
}

impl std::fmt::Debug for LongPollStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongPollStream")
            .field("kind", &self.kind)
            .field("active", &self.endpoint.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> Arc<ApiClient> {
        Arc::new(
            ApiClient::new("test-token")
                .with_base_url(format!("{}/method", server.uri()))
                .with_timeout(Duration::from_millis(500))
                .with_retry_delay(Duration::from_millis(10)),
        )
    }

    fn stream_for(server: &MockServer, kind: TokenKind) -> LongPollStream {
        LongPollStream::new(client_for(server), kind)
            .with_wait(Duration::from_secs(1))
            .with_resync_policy(3, Duration::from_millis(10))
    }

    async fn mount_account_negotiation(server: &MockServer, key: &str, ts: u64) {
        Mock::given(method("POST"))
            .and(path("/method/messages.getLongPollServer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {
                    "server": format!("{}/lp", server.uri()),
                    "key": key,
                    "ts": ts
                }
            })))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }

    #[test]
    fn extracts_group_message_new() {
        let update = json!({"type": "message_new", "object": {"message": {"id": 42}}});
        assert_eq!(extract_message_id(&update, TokenKind::Group), Some(42));

        let other = json!({"type": "typing", "object": {}});
        assert_eq!(extract_message_id(&other, TokenKind::Group), None);
    }

    #[test]
    fn extracts_account_message_new() {
        let update = json!([4, 42, 17, 2000000001i64]);
        assert_eq!(extract_message_id(&update, TokenKind::Account), Some(42));

        let other = json!([8, 123]);
        assert_eq!(extract_message_id(&other, TokenKind::Account), None);
    }

    #[test]
    fn shape_mismatch_across_categories_is_skipped() {
        let group_shaped = json!({"type": "message_new", "object": {"message": {"id": 42}}});
        assert_eq!(extract_message_id(&group_shaped, TokenKind::Account), None);

        let account_shaped = json!([4, 42]);
        assert_eq!(extract_message_id(&account_shaped, TokenKind::Group), None);
    }

    #[tokio::test]
    async fn first_poll_negotiates_and_advances_cursor() {
        let server = MockServer::start().await;
        mount_account_negotiation(&server, "k1", 10).await;
        Mock::given(method("GET"))
            .and(path("/lp"))
            .and(query_param("act", "a_check"))
            .and(query_param("key", "k1"))
            .and(query_param("ts", "10"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ts": 11, "updates": [[4, 1]]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lp"))
            .and(query_param("ts", "11"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ts": 12, "updates": []})),
            )
            .mount(&server)
            .await;

        let mut stream = stream_for(&server, TokenKind::Account);
        let batch = stream.poll().await.unwrap();
        assert_eq!(batch.len(), 1);

        let batch = stream.poll().await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn history_gap_repairs_cursor_without_renegotiation() {
        let server = MockServer::start().await;
        mount_account_negotiation(&server, "k1", 10).await;
        Mock::given(method("GET"))
            .and(path("/lp"))
            .and(query_param("ts", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"failed": 1, "ts": 105})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lp"))
            .and(query_param("ts", "105"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ts": 106, "updates": [[4, 9]]})),
            )
            .mount(&server)
            .await;

        let mut stream = stream_for(&server, TokenKind::Account);

        // Gap: empty batch, cursor adopted, still the same session.
        let batch = stream.poll().await.unwrap();
        assert!(batch.is_empty());

        let batch = stream.poll().await.unwrap();
        assert_eq!(batch.len(), 1);

        let negotiations = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().ends_with("messages.getLongPollServer"))
            .count();
        assert_eq!(negotiations, 1);
    }

    #[tokio::test]
    async fn desync_discards_endpoint_and_renegotiates() {
        let server = MockServer::start().await;
        // First negotiation hands out k1, second k2.
        mount_account_negotiation(&server, "k1", 10).await;
        mount_account_negotiation(&server, "k2", 20).await;
        Mock::given(method("GET"))
            .and(path("/lp"))
            .and(query_param("key", "k1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"failed": 2})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lp"))
            .and(query_param("key", "k2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ts": 21, "updates": [[4, 5]]})),
            )
            .mount(&server)
            .await;

        let mut stream = stream_for(&server, TokenKind::Account);
        let batch = stream.poll().await.unwrap();
        assert_eq!(batch, vec![json!([4, 5])]);
    }

    #[tokio::test]
    async fn persistent_desync_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/method/messages.getLongPollServer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"server": format!("{}/lp", server.uri()), "key": "k", "ts": 1}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"failed": 3})))
            .mount(&server)
            .await;

        let mut stream = stream_for(&server, TokenKind::Account);
        let err = stream.poll().await.unwrap_err();
        assert!(matches!(
            err,
            PollError::ResyncExhausted { attempts: 3 }
        ));
    }

    #[tokio::test]
    async fn next_message_resolves_full_records_in_order() {
        let server = MockServer::start().await;
        mount_account_negotiation(&server, "k1", 10).await;
        Mock::given(method("GET"))
            .and(path("/lp"))
            .and(query_param("ts", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ts": 11,
                // Second update is not a new message and must be skipped.
                "updates": [[4, 100], [8, 1], [4, 101]]
            })))
            .mount(&server)
            .await;

        for id in [100, 101] {
            Mock::given(method("POST"))
                .and(path("/method/messages.getById"))
                .and(body_string_contains(format!("message_ids={id}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "response": {"count": 1, "items": [{"id": id, "peer_id": 1, "text": "m"}]}
                })))
                .mount(&server)
                .await;
        }

        let mut stream = stream_for(&server, TokenKind::Account);
        let first = stream.next_message().await.unwrap();
        let second = stream.next_message().await.unwrap();

        assert_eq!(first.get("id"), Some(&json!(100)));
        assert_eq!(second.get("id"), Some(&json!(101)));
    }

    #[tokio::test]
    async fn desync_does_not_drop_buffered_updates() {
        let server = MockServer::start().await;
        mount_account_negotiation(&server, "k1", 10).await;
        mount_account_negotiation(&server, "k2", 20).await;
        // First batch carries two messages; the session dies afterwards.
        Mock::given(method("GET"))
            .and(path("/lp"))
            .and(query_param("key", "k1"))
            .and(query_param("ts", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ts": 11,
                "updates": [[4, 100], [4, 101]]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lp"))
            .and(query_param("key", "k1"))
            .and(query_param("ts", "11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"failed": 2})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lp"))
            .and(query_param("key", "k2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ts": 21,
                "updates": [[4, 102]]
            })))
            .mount(&server)
            .await;

        for id in [100, 101, 102] {
            Mock::given(method("POST"))
                .and(path("/method/messages.getById"))
                .and(body_string_contains(format!("message_ids={id}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "response": {"count": 1, "items": [{"id": id, "peer_id": 1, "text": "m"}]}
                })))
                .mount(&server)
                .await;
        }

        let mut stream = stream_for(&server, TokenKind::Account);
        let mut seen = Vec::new();
        for _ in 0..3 {
            let message = stream.next_message().await.unwrap();
            seen.push(message.get("id").and_then(Value::as_i64).unwrap());
        }

        assert_eq!(seen, vec![100, 101, 102]);
    }

    #[tokio::test]
    async fn unresolvable_message_is_skipped() {
        let server = MockServer::start().await;
        mount_account_negotiation(&server, "k1", 10).await;
        Mock::given(method("GET"))
            .and(path("/lp"))
            .and(query_param("ts", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ts": 11,
                "updates": [[4, 100], [4, 101]]
            })))
            .mount(&server)
            .await;
        // Resolving message 100 fails at the application level.
        Mock::given(method("POST"))
            .and(path("/method/messages.getById"))
            .and(body_string_contains("message_ids=100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"error": {"error_code": 100, "error_msg": "bad id"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/method/messages.getById"))
            .and(body_string_contains("message_ids=101"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"count": 1, "items": [{"id": 101, "peer_id": 1, "text": "ok"}]}
            })))
            .mount(&server)
            .await;

        let mut stream = stream_for(&server, TokenKind::Account);
        let message = stream.next_message().await.unwrap();
        assert_eq!(message.get("id"), Some(&json!(101)));
    }
}
