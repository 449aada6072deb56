//! Share links.
//!
//! A share link is either an opaque id stored by a remote service
//! (`?id=<id>`) or, when that service is unreachable, the whole payload
//! spread across query parameters (the legacy scheme).

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::models::{SharePayload, coerce_expenses};

static SHARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{1,100}$").expect("static pattern"));

/// Query parameter carrying a remote share id.
pub const SHARE_ID_PARAM: &str = "id";

/// Query parameters of the legacy scheme.
pub const LEGACY_PARAMS: [&str; 5] = ["name1", "name2", "salary1", "salary2", "expenses"];
pub const CURRENCY_PARAM: &str = "currency";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error("invalid share id")]
    InvalidId,

    /// Non-success status. Displays the server's message when it sent one.
    #[error("{}", http_message(.status, .message))]
    Http { status: u16, message: Option<String> },

    #[error("share service unreachable: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid share configuration: {0}")]
    Configuration(String),
}

fn http_message(
    status: &u16,
    message: &Option<String>,
) -> String {
    match message {
        Some(message) => message.clone(),
        None => format!("HTTP {status}"),
    }
}

/// An id accepted by the share service: 1 to 100 characters from
/// `[a-zA-Z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShareId(String);

impl ShareId {
    pub fn parse(raw: &str) -> Result<Self, ShareError> {
        if SHARE_ID.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ShareError::InvalidId)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote store for shared snapshots.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Stores the payload and returns its new id.
    async fn create(&self, payload: &SharePayload) -> Result<ShareId, ShareError>;

    /// Fetches a payload. Implementations coerce the body defensively.
    async fn fetch(&self, id: &ShareId) -> Result<SharePayload, ShareError>;
}

/// Builds user-facing share URLs relative to the calculator page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLinks {
    page: Url,
}

impl ShareLinks {
    /// `page` is the public calculator URL; any query or fragment is dropped.
    pub fn new(mut page: Url) -> Self {
        page.set_query(None);
        page.set_fragment(None);
        Self { page }
    }

    pub fn page(&self) -> &Url {
        &self.page
    }

    pub fn remote(&self, id: &ShareId) -> Url {
        let mut url = self.page.clone();
        url.query_pairs_mut().append_pair(SHARE_ID_PARAM, id.as_str());
        url
    }

    pub fn legacy(&self, payload: &SharePayload) -> Url {
        let expenses = serde_json::to_string(&payload.expenses).unwrap_or_else(|_| "[]".to_string());

        let mut url = self.page.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("name1", &payload.name1)
                .append_pair("name2", &payload.name2)
                .append_pair("salary1", &payload.salary1)
                .append_pair("salary2", &payload.salary2)
                .append_pair("expenses", &expenses);
            if let Some(currency) = &payload.currency {
                pairs.append_pair(CURRENCY_PARAM, currency);
            }
        }
        url
    }
}

/// Outcome of [`create_share_link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareLink {
    Remote(Url),
    /// The remote store failed; the URL carries the whole payload instead.
    Legacy { url: Url, reason: ShareError },
}

impl ShareLink {
    pub fn url(&self) -> &Url {
        match self {
            Self::Remote(url) | Self::Legacy { url, .. } => url,
        }
    }
}

/// Stores the payload remotely, falling back to a legacy URL on any failure.
pub async fn create_share_link(
    store: &dyn ShareStore,
    links: &ShareLinks,
    payload: &SharePayload,
) -> ShareLink {
    match store.create(payload).await {
        Ok(id) => {
            info!(%id, "created share link");
            ShareLink::Remote(links.remote(&id))
        }
        Err(reason) => {
            warn!(error = %reason, "share service failed, using legacy link");
            ShareLink::Legacy {
                url: links.legacy(payload),
                reason,
            }
        }
    }
}

/// Reads a legacy share from query parameters.
///
/// Returns `None` when none of the legacy parameters is present. A malformed
/// `expenses` value yields an empty list.
pub fn decode_legacy_query<'a, F>(param: F) -> Option<SharePayload>
where
    F: Fn(&str) -> Option<&'a str>,
{
    if LEGACY_PARAMS.iter().all(|name| param(*name).is_none()) {
        return None;
    }

    let text = |name: &str| param(name).unwrap_or_default().to_string();
    let expenses = param("expenses")
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .and_then(|v| v.as_array().map(|items| coerce_expenses(items)))
        .unwrap_or_default();

    Some(SharePayload {
        name1: text("name1"),
        name2: text("name2"),
        salary1: text("salary1"),
        salary2: text("salary2"),
        expenses,
        currency: param(CURRENCY_PARAM)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::SharedExpense;

    fn links() -> ShareLinks {
        ShareLinks::new(Url::parse("https://fairshare.example/calc?stale=1#results").unwrap())
    }

    fn payload() -> SharePayload {
        SharePayload {
            name1: "Alex & Co".to_string(),
            name2: "Sam".to_string(),
            salary1: "3,500".to_string(),
            salary2: "2,500".to_string(),
            expenses: vec![SharedExpense::new("1,200", "Rent")],
            currency: Some("GBP".to_string()),
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ShareStore for FailingStore {
        async fn create(&self, _payload: &SharePayload) -> Result<ShareId, ShareError> {
            Err(ShareError::Http {
                status: 503,
                message: None,
            })
        }

        async fn fetch(&self, _id: &ShareId) -> Result<SharePayload, ShareError> {
            unimplemented!()
        }
    }

    struct FixedStore;

    #[async_trait]
    impl ShareStore for FixedStore {
        async fn create(&self, _payload: &SharePayload) -> Result<ShareId, ShareError> {
            ShareId::parse("abc_123")
        }

        async fn fetch(&self, _id: &ShareId) -> Result<SharePayload, ShareError> {
            unimplemented!()
        }
    }

    // =========================================================================
    // ShareId
    // =========================================================================

    #[test]
    fn share_id_accepts_url_safe_ids() {
        assert!(ShareId::parse("aZ09_-").is_ok());
        assert!(ShareId::parse(&"a".repeat(100)).is_ok());
    }

    #[test]
    fn share_id_rejects_everything_else() {
        for raw in ["", "a b", "../etc", "id?x=1", "ünï"] {
            assert_eq!(ShareId::parse(raw), Err(ShareError::InvalidId), "{raw:?}");
        }
        assert_eq!(ShareId::parse(&"a".repeat(101)), Err(ShareError::InvalidId));
    }

    // =========================================================================
    // Error display
    // =========================================================================

    #[test]
    fn http_error_prefers_server_message() {
        let with_message = ShareError::Http {
            status: 400,
            message: Some("Payload too large".to_string()),
        };
        let without = ShareError::Http {
            status: 502,
            message: None,
        };

        assert_eq!(with_message.to_string(), "Payload too large");
        assert_eq!(without.to_string(), "HTTP 502");
    }

    // =========================================================================
    // URLs
    // =========================================================================

    #[test]
    fn remote_link_uses_id_param_on_clean_page() {
        let id = ShareId::parse("abc_123").unwrap();

        let url = links().remote(&id);

        assert_eq!(url.as_str(), "https://fairshare.example/calc?id=abc_123");
    }

    #[test]
    fn legacy_link_decodes_back_to_payload() {
        let url = links().legacy(&payload());
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        let result = decode_legacy_query(|name| params.get(name).map(String::as_str));

        assert_eq!(result, Some(payload()));
    }

    #[test]
    fn legacy_decode_needs_a_legacy_param() {
        let params: HashMap<&str, &str> = HashMap::from([("id", "abc"), ("currency", "GBP")]);

        let result = decode_legacy_query(|name| params.get(name).copied());

        assert_eq!(result, None);
    }

    #[test]
    fn legacy_decode_tolerates_bad_expenses_json() {
        let params: HashMap<&str, &str> = HashMap::from([("salary1", "100"), ("expenses", "[oops")]);

        let result = decode_legacy_query(|name| params.get(name).copied()).unwrap();

        assert_eq!(result.salary1, "100");
        assert!(result.expenses.is_empty());
    }

    // =========================================================================
    // create_share_link
    // =========================================================================

    #[tokio::test]
    async fn create_share_link_uses_remote_id() {
        let result = create_share_link(&FixedStore, &links(), &payload()).await;

        assert_eq!(
            result,
            ShareLink::Remote(Url::parse("https://fairshare.example/calc?id=abc_123").unwrap())
        );
    }

    #[tokio::test]
    async fn create_share_link_falls_back_to_legacy() {
        let result = create_share_link(&FailingStore, &links(), &payload()).await;

        let ShareLink::Legacy { url, reason } = result else {
            panic!("expected legacy link");
        };
        assert_eq!(reason.to_string(), "HTTP 503");
        assert!(url.query_pairs().any(|(k, v)| k == "currency" && v == "GBP"));
    }
}
