use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use split_core::SharePayload;
use split_core::share::{ShareError, ShareId, ShareStore};
use tracing::debug;
use url::Url;

/// Overrides the configured share endpoint.
pub const SHARE_API_URL_ENV: &str = "FAIRSHARE_SHARE_API_URL";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareClientConfig {
    pub base_url: Url,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl ShareClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Picks the endpoint from [`SHARE_API_URL_ENV`], falling back to
    /// `configured`.
    pub fn resolve(configured: Option<&str>) -> Result<Self, ShareError> {
        let from_env = std::env::var(SHARE_API_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());
        let raw = from_env
            .as_deref()
            .or(configured)
            .ok_or_else(|| {
                ShareError::Configuration(format!(
                    "no share service configured; set {SHARE_API_URL_ENV} or share_api_url"
                ))
            })?;
        let base_url = Url::parse(raw.trim())
            .map_err(|e| ShareError::Configuration(format!("invalid share url '{raw}': {e}")))?;
        Ok(Self::new(base_url))
    }
}

#[derive(Deserialize)]
struct CreatedShare {
    id: Option<String>,
}

/// [`ShareStore`] backed by `POST /share` and `GET /share/<id>`.
#[derive(Debug, Clone)]
pub struct HttpShareStore {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpShareStore {
    pub fn new(config: ShareClientConfig) -> Result<Self, ShareError> {
        if config.base_url.cannot_be_a_base() {
            return Err(ShareError::Configuration(format!(
                "share url '{}' cannot have a path",
                config.base_url
            )));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ShareError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(
        &self,
        segments: &[&str],
    ) -> Result<Url, ShareError> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ShareError::Configuration("share url cannot have a path".to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }
}

/// Turns a non-success response into [`ShareError::Http`], keeping the
/// server's `error` message when the body has one.
async fn http_error(response: reqwest::Response) -> ShareError {
    let status = response.status().as_u16();
    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty());
    ShareError::Http { status, message }
}

fn transport(e: reqwest::Error) -> ShareError {
    ShareError::Transport(e.to_string())
}

#[async_trait]
impl ShareStore for HttpShareStore {
    async fn create(&self, payload: &SharePayload) -> Result<ShareId, ShareError> {
        let url = self.endpoint(&["share"])?;
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let created: CreatedShare = response
            .json()
            .await
            .map_err(|e| ShareError::InvalidResponse(e.to_string()))?;
        let id = created
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ShareError::InvalidResponse("missing id".to_string()))?;
        debug!(%id, "share created");
        ShareId::parse(&id).map_err(|_| ShareError::InvalidResponse(format!("unexpected id '{id}'")))
    }

    async fn fetch(&self, id: &ShareId) -> Result<SharePayload, ShareError> {
        let url = self.endpoint(&["share", id.as_str()])?;
        let response = self.client.get(url).send().await.map_err(transport)?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ShareError::InvalidResponse(e.to_string()))?;
        SharePayload::from_untrusted(&body)
            .ok_or_else(|| ShareError::InvalidResponse("not an object".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn store(base: &str) -> HttpShareStore {
        HttpShareStore::new(ShareClientConfig::new(Url::parse(base).unwrap())).unwrap()
    }

    #[test]
    fn endpoint_appends_to_base_path() {
        let store = store("https://api.example/v1/?x=1");

        let url = store.endpoint(&["share", "abc"]).unwrap();

        assert_eq!(url.as_str(), "https://api.example/v1/share/abc");
    }

    #[test]
    fn endpoint_on_bare_host() {
        let store = store("https://api.example");

        let url = store.endpoint(&["share"]).unwrap();

        assert_eq!(url.as_str(), "https://api.example/share");
    }

    #[test]
    fn non_hierarchical_urls_are_rejected() {
        let config = ShareClientConfig::new(Url::parse("mailto:someone@example.com").unwrap());

        let result = HttpShareStore::new(config);

        assert!(matches!(result, Err(ShareError::Configuration(_))));
    }

    #[test]
    fn configured_url_is_used_without_override() {
        if std::env::var(SHARE_API_URL_ENV).is_ok() {
            return;
        }

        let config = ShareClientConfig::resolve(Some("https://share.example")).unwrap();

        assert_eq!(config.base_url.as_str(), "https://share.example/");
        assert_eq!(config.timeout, Duration::from_secs(REQUEST_TIMEOUT_SECS));
    }

    #[test]
    fn invalid_configured_url() {
        if std::env::var(SHARE_API_URL_ENV).is_ok() {
            return;
        }

        let result = ShareClientConfig::resolve(Some("not a url"));

        assert!(matches!(result, Err(ShareError::Configuration(_))));
    }
}
