//! Request context for one agent turn

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity and correlation data for a single agent request
///
/// Created by the caller once per turn and passed by reference into
/// every guardrail call. The raw user id never leaves the constructor;
/// only its truncated hash is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique per request (UUIDv4)
    pub request_id: String,

    /// Truncated SHA-256 of the caller's user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id_hash: Option<String>,

    /// Conversation id, stable across turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl RequestContext {
    /// Create a context for a new request
    pub fn new(raw_user_id: Option<&str>, session_id: Option<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id_hash: raw_user_id.map(Self::hash_user_id),
            session_id,
            trace_id: None,
            span_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Context with no user and no session
    pub fn anonymous() -> Self {
        Self::new(None, None)
    }

    /// Attach trace correlation ids
    pub fn with_trace(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
        self
    }

    /// First 16 hex characters of the SHA-256 of a raw user id
    pub fn hash_user_id(raw_user_id: &str) -> String {
        let digest = Sha256::digest(raw_user_id.as_bytes());
        let mut hex = format!("{:x}", digest);
        hex.truncate(16);
        hex
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestContext::anonymous();
        let b = RequestContext::anonymous();
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_user_id_is_hashed() {
        let ctx = RequestContext::new(Some("alice@example.com"), Some("s-1".to_string()));
        let hash = ctx.user_id_hash.clone().unwrap();

        assert_eq!(hash.len(), 16);
        assert_ne!(hash, "alice@example.com");
        assert_eq!(hash, RequestContext::hash_user_id("alice@example.com"));
        assert_eq!(ctx.session_id.as_deref(), Some("s-1"));
    }

    #[test]
    fn test_known_digest_prefix() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(RequestContext::hash_user_id("abc"), "ba7816bf8f01cfea");
    }

    #[test]
    fn test_with_trace() {
        let ctx = RequestContext::anonymous().with_trace("t-1", "s-1");
        assert_eq!(ctx.trace_id.as_deref(), Some("t-1"));
        assert_eq!(ctx.span_id.as_deref(), Some("s-1"));
        assert!(ctx.user_id_hash.is_none());
    }
}
