//! Token-category detection and long-poll endpoint negotiation.
//!
//! Account- and group-category tokens use different control calls to obtain
//! a polling endpoint, and encode the cursor differently (number vs string).
//! The negotiator hides both differences behind [`Endpoint`].

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::api::ApiClient;
use volga_core::{ApiError, ApiResult, Params, PollError, PollResult, TokenKind};

/// A server-issued position marker, echoed back on every poll.
///
/// The wire encodes it as a number for account sessions and as a string for
/// group sessions; it is kept as an opaque string either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    /// Reads a cursor from a JSON string or number.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// The cursor as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A negotiated long-poll endpoint: where to poll and from which position.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Polling host. Group negotiation returns a full URL, account
    /// negotiation a bare host.
    pub server: String,
    /// Session key, valid until the server rotates it.
    pub key: String,
    /// Current cursor.
    pub ts: Cursor,
}

fn endpoint_from_response(data: &Value) -> PollResult<Endpoint> {
    let server = data
        .get("server")
        .and_then(Value::as_str)
        .ok_or_else(|| PollError::BadResponse("missing server".into()))?;
    let key = data
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| PollError::BadResponse("missing key".into()))?;
    let ts = data
        .get("ts")
        .and_then(Cursor::from_value)
        .ok_or_else(|| PollError::BadResponse("missing ts".into()))?;

    Ok(Endpoint {
        server: server.to_string(),
        key: key.to_string(),
        ts,
    })
}

/// Determines the token category and negotiates polling endpoints.
pub struct SessionNegotiator {
    client: Arc<ApiClient>,
    kind: Option<TokenKind>,
}

impl SessionNegotiator {
    /// Creates a negotiator over the given client.
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client, kind: None }
    }

    /// Detects the token category, cached after the first success.
    ///
    /// Probes the group-only `groups.getById` call. An application-level
    /// refusal means the token definitely is not group-category; transport
    /// and HTTP failures propagate instead of misclassifying the token on
    /// transient trouble.
    pub async fn token_kind(&mut self) -> ApiResult<TokenKind> {
        if let Some(kind) = self.kind {
            return Ok(kind);
        }

        let kind = match self.client.request("groups.getById", &Params::new()).await {
            Ok(_) => TokenKind::Group,
            Err(ApiError::Api { code, .. }) => {
                debug!(code, "Group probe refused, treating token as account");
                TokenKind::Account
            }
            Err(err) => return Err(err),
        };

        info!(%kind, "Token category detected");
        self.kind = Some(kind);
        Ok(kind)
    }

    /// Negotiates a fresh polling endpoint for the given token category.
    pub async fn negotiate(&self, kind: TokenKind) -> PollResult<Endpoint> {
        let data = match kind {
            TokenKind::Group => {
                let groups = self
                    .client
                    .request("groups.getById", &Params::new())
                    .await
                    .map_err(PollError::Negotiation)?;
                let group_id = groups
                    .as_array()
                    .and_then(|groups| groups.first())
                    .and_then(|group| group.get("id"))
                    .and_then(Value::as_i64)
                    .ok_or_else(|| PollError::BadResponse("missing owning group id".into()))?;

                let params: Params = vec![("group_id".into(), group_id.to_string())];
                self.client
                    .request("groups.getLongPollServer", &params)
                    .await
                    .map_err(PollError::Negotiation)?
            }
            TokenKind::Account => {
                let params: Params = vec![("lp_version".into(), "3".into())];
                self.client
                    .request("messages.getLongPollServer", &params)
                    .await
                    .map_err(PollError::Negotiation)?
            }
        };

        let endpoint = endpoint_from_response(&data)?;
        debug!(server = %endpoint.server, ts = %endpoint.ts, "Long poll endpoint negotiated");
        Ok(endpoint)
    }
}
