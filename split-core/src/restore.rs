//! Startup restoration of the form.
//!
//! Sources are tried in order. Each one looks for its trigger in the page
//! request or in local storage: with no trigger it steps aside, with a
//! trigger it either produces a payload or fails. A failure ends the search
//! and leaves the form empty with a notice for the user.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::calculations::format::format_with_thousands;
use crate::db::{ConfigError, ConfigurationService};
use crate::models::{
    ConfigurationDetail, ConfigurationId, SharePayload, SharedExpense, UserId,
};
use crate::share::{self, SHARE_ID_PARAM, ShareError, ShareId, ShareStore};
use crate::store::{self, KeyValueStore};

/// Query parameter naming a saved configuration.
pub const CONFIG_PARAM: &str = "config";

pub const SHARE_LOAD_FAILED: &str = "Could not load the shared split. Check the link and try again.";
pub const CONFIG_LOAD_FAILED: &str = "Could not load configuration. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreSourceKind {
    NamedConfiguration,
    ShareLink,
    LegacyUrl,
    LocalSnapshot,
}

impl RestoreSourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NamedConfiguration => "named_configuration",
            Self::ShareLink => "share_link",
            Self::LegacyUrl => "legacy_url",
            Self::LocalSnapshot => "local_snapshot",
        }
    }
}

impl std::fmt::Display for RestoreSourceKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RestoreError {
    #[error("invalid configuration id '{0}'")]
    InvalidConfigurationId(String),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("shared split unavailable: {0}")]
    Share(#[from] ShareError),
}

impl RestoreError {
    /// Text shown to the user when a restore fails.
    pub fn notice(&self) -> String {
        match self {
            Self::InvalidConfigurationId(_) => ConfigError::NotFound.to_string(),
            Self::Configuration(ConfigError::Storage) => CONFIG_LOAD_FAILED.to_string(),
            Self::Configuration(e) => e.to_string(),
            Self::Share(_) => SHARE_LOAD_FAILED.to_string(),
        }
    }
}

/// Query parameters of the page being opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreRequest {
    params: Vec<(String, String)>,
}

impl RestoreRequest {
    pub fn from_url(url: &Url) -> Self {
        Self {
            params: url.query_pairs().into_owned().collect(),
        }
    }

    /// Parses a raw query string, with or without the leading `?`.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            params: url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    /// First non-empty value for `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceAttempt {
    /// The trigger for this source is absent.
    NotApplicable,
    Applied(SharePayload),
    Failed(RestoreError),
}

#[async_trait]
pub trait RestoreSource: Send + Sync {
    fn kind(&self) -> RestoreSourceKind;

    async fn try_restore(&self, request: &RestoreRequest) -> SourceAttempt;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored {
        source: RestoreSourceKind,
        payload: SharePayload,
    },
    Failed {
        source: RestoreSourceKind,
        notice: String,
    },
    Nothing,
}

/// Ordered list of restore sources.
#[derive(Default)]
pub struct RestorePipeline {
    sources: Vec<Box<dyn RestoreSource>>,
}

impl RestorePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(
        mut self,
        source: impl RestoreSource + 'static,
    ) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn kinds(&self) -> Vec<RestoreSourceKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    /// Runs sources in order until one applies or fails.
    pub async fn run(&self, request: &RestoreRequest) -> RestoreOutcome {
        for source in &self.sources {
            let kind = source.kind();
            match source.try_restore(request).await {
                SourceAttempt::NotApplicable => {
                    debug!(source = %kind, "restore source not applicable");
                }
                SourceAttempt::Applied(payload) => {
                    info!(source = %kind, expenses = payload.expenses.len(), "form restored");
                    return RestoreOutcome::Restored {
                        source: kind,
                        payload,
                    };
                }
                SourceAttempt::Failed(e) => {
                    warn!(source = %kind, error = %e, "restore failed");
                    return RestoreOutcome::Failed {
                        source: kind,
                        notice: e.notice(),
                    };
                }
            }
        }
        RestoreOutcome::Nothing
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// sources
// ─────────────────────────────────────────────────────────────────────────────

/// Loads a saved configuration named by `?config=`.
pub struct NamedConfigurationSource {
    service: ConfigurationService,
    user: Option<UserId>,
}

impl NamedConfigurationSource {
    pub fn new(
        service: ConfigurationService,
        user: Option<UserId>,
    ) -> Self {
        Self { service, user }
    }
}

#[async_trait]
impl RestoreSource for NamedConfigurationSource {
    fn kind(&self) -> RestoreSourceKind {
        RestoreSourceKind::NamedConfiguration
    }

    async fn try_restore(&self, request: &RestoreRequest) -> SourceAttempt {
        let Some(raw) = request.param(CONFIG_PARAM) else {
            return SourceAttempt::NotApplicable;
        };
        let id = match raw.parse::<ConfigurationId>() {
            Ok(id) => id,
            Err(_) => return SourceAttempt::Failed(RestoreError::InvalidConfigurationId(raw.to_string())),
        };
        match self.service.get(self.user.as_ref(), id).await {
            Ok(detail) => SourceAttempt::Applied(payload_from_detail(&detail)),
            Err(e) => SourceAttempt::Failed(e.into()),
        }
    }
}

/// Form fields for a saved configuration. Amounts are shown the way the
/// user would type them, with thousands separators.
pub fn payload_from_detail(detail: &ConfigurationDetail) -> SharePayload {
    let amount = |value: rust_decimal::Decimal| format_with_thousands(&value.normalize().to_string());
    SharePayload {
        name1: detail.person1_name.clone(),
        name2: detail.person2_name.clone(),
        salary1: amount(detail.person1_salary),
        salary2: amount(detail.person2_salary),
        expenses: detail
            .expenses
            .iter()
            .map(|e| SharedExpense::new(amount(e.amount), e.label.clone()))
            .collect(),
        currency: Some(detail.currency.clone()).filter(|c| !c.is_empty()),
    }
}

/// Fetches a remote share named by `?id=`.
pub struct ShareLinkSource {
    store: Arc<dyn ShareStore>,
}

impl ShareLinkSource {
    pub fn new(store: Arc<dyn ShareStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RestoreSource for ShareLinkSource {
    fn kind(&self) -> RestoreSourceKind {
        RestoreSourceKind::ShareLink
    }

    async fn try_restore(&self, request: &RestoreRequest) -> SourceAttempt {
        let Some(raw) = request.param(SHARE_ID_PARAM) else {
            return SourceAttempt::NotApplicable;
        };
        let id = match ShareId::parse(raw) {
            Ok(id) => id,
            Err(e) => return SourceAttempt::Failed(e.into()),
        };
        match self.store.fetch(&id).await {
            Ok(payload) => SourceAttempt::Applied(payload),
            Err(e) => SourceAttempt::Failed(e.into()),
        }
    }
}

/// Reads the flat `name1`..`expenses` parameters of old links.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyUrlSource;

#[async_trait]
impl RestoreSource for LegacyUrlSource {
    fn kind(&self) -> RestoreSourceKind {
        RestoreSourceKind::LegacyUrl
    }

    async fn try_restore(&self, request: &RestoreRequest) -> SourceAttempt {
        match share::decode_legacy_query(|name| request.param(name)) {
            Some(payload) => SourceAttempt::Applied(payload),
            None => SourceAttempt::NotApplicable,
        }
    }
}

/// Reads the snapshot left in local storage by a previous session.
///
/// Unreadable storage is logged and treated as empty.
pub struct LocalSnapshotSource {
    store: Arc<dyn KeyValueStore>,
}

impl LocalSnapshotSource {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RestoreSource for LocalSnapshotSource {
    fn kind(&self) -> RestoreSourceKind {
        RestoreSourceKind::LocalSnapshot
    }

    async fn try_restore(&self, _request: &RestoreRequest) -> SourceAttempt {
        match store::load_snapshot(self.store.as_ref()) {
            Ok(Some(payload)) => SourceAttempt::Applied(payload),
            Ok(None) => SourceAttempt::NotApplicable,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable local snapshot");
                SourceAttempt::NotApplicable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::memory::MemoryRepository;
    use crate::models::{ExpenseItem, NewConfiguration, SavedExpense};
    use crate::store::{FORM_KEY, MemoryStore, legacy_keys};

    struct StubShares(Result<SharePayload, ShareError>);

    #[async_trait]
    impl ShareStore for StubShares {
        async fn create(&self, _payload: &SharePayload) -> Result<ShareId, ShareError> {
            unimplemented!()
        }

        async fn fetch(&self, _id: &ShareId) -> Result<SharePayload, ShareError> {
            self.0.clone()
        }
    }

    fn shared() -> SharePayload {
        SharePayload {
            name1: "Remote".to_string(),
            ..SharePayload::default()
        }
    }

    fn local_store(name: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store::save_snapshot(
            store.as_ref(),
            &SharePayload {
                name1: name.to_string(),
                ..SharePayload::default()
            },
        )
        .unwrap();
        store
    }

    async fn full_pipeline(
        shares: StubShares,
        local: Arc<MemoryStore>,
    ) -> RestorePipeline {
        let service = ConfigurationService::new(Arc::new(MemoryRepository::new()));
        let user = UserId::new("u1");
        service.ensure_household(&user).await.unwrap();
        RestorePipeline::new()
            .with_source(NamedConfigurationSource::new(service, Some(user)))
            .with_source(ShareLinkSource::new(Arc::new(shares)))
            .with_source(LegacyUrlSource)
            .with_source(LocalSnapshotSource::new(local))
    }

    // =========================================================================
    // Request
    // =========================================================================

    #[test]
    fn empty_params_count_as_absent() {
        let request = RestoreRequest::from_query("?id=&config=7");

        assert_eq!(request.param("id"), None);
        assert_eq!(request.param("config"), Some("7"));
    }

    #[test]
    fn request_from_url_decodes_values() {
        let url = Url::parse("https://fairshare.example/?name1=Alex%20%26%20Co").unwrap();

        let request = RestoreRequest::from_url(&url);

        assert_eq!(request.param("name1"), Some("Alex & Co"));
    }

    // =========================================================================
    // Precedence
    // =========================================================================

    #[tokio::test]
    async fn share_link_beats_legacy_params_and_local_snapshot() {
        let pipeline = full_pipeline(StubShares(Ok(shared())), local_store("Local")).await;
        let request = RestoreRequest::from_query("id=abc&name1=Legacy");

        let outcome = pipeline.run(&request).await;

        assert_eq!(
            outcome,
            RestoreOutcome::Restored {
                source: RestoreSourceKind::ShareLink,
                payload: shared(),
            }
        );
    }

    #[tokio::test]
    async fn legacy_params_beat_local_snapshot() {
        let pipeline = full_pipeline(StubShares(Ok(shared())), local_store("Local")).await;
        let request = RestoreRequest::from_query("name1=Legacy&salary1=100");

        let outcome = pipeline.run(&request).await;

        match outcome {
            RestoreOutcome::Restored { source, payload } => {
                assert_eq!(source, RestoreSourceKind::LegacyUrl);
                assert_eq!(payload.name1, "Legacy");
                assert_eq!(payload.salary1, "100");
            }
            other => panic!("expected a restore, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn local_snapshot_is_the_last_resort() {
        let pipeline = full_pipeline(StubShares(Ok(shared())), local_store("Local")).await;

        let outcome = pipeline.run(&RestoreRequest::default()).await;

        match outcome {
            RestoreOutcome::Restored { source, payload } => {
                assert_eq!(source, RestoreSourceKind::LocalSnapshot);
                assert_eq!(payload.name1, "Local");
            }
            other => panic!("expected a restore, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nothing_to_restore() {
        let pipeline = full_pipeline(StubShares(Ok(shared())), Arc::new(MemoryStore::new())).await;

        let outcome = pipeline.run(&RestoreRequest::default()).await;

        assert_eq!(outcome, RestoreOutcome::Nothing);
    }

    // =========================================================================
    // Failures stop the chain
    // =========================================================================

    #[tokio::test]
    async fn failed_share_fetch_does_not_fall_back_to_local() {
        let shares = StubShares(Err(ShareError::Http {
            status: 404,
            message: Some("Share not found".to_string()),
        }));
        let pipeline = full_pipeline(shares, local_store("Local")).await;

        let outcome = pipeline.run(&RestoreRequest::from_query("id=missing")).await;

        assert_eq!(
            outcome,
            RestoreOutcome::Failed {
                source: RestoreSourceKind::ShareLink,
                notice: SHARE_LOAD_FAILED.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn invalid_share_id_fails_without_a_request() {
        let pipeline = full_pipeline(StubShares(Ok(shared())), local_store("Local")).await;

        let outcome = pipeline.run(&RestoreRequest::from_query("id=../etc")).await;

        assert!(matches!(
            outcome,
            RestoreOutcome::Failed {
                source: RestoreSourceKind::ShareLink,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unknown_configuration_yields_not_found_notice() {
        let pipeline = full_pipeline(StubShares(Ok(shared())), local_store("Local")).await;

        let outcome = pipeline.run(&RestoreRequest::from_query("config=42")).await;

        assert_eq!(
            outcome,
            RestoreOutcome::Failed {
                source: RestoreSourceKind::NamedConfiguration,
                notice: "Configuration not found.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn configuration_without_user_asks_to_sign_in() {
        let service = ConfigurationService::new(Arc::new(MemoryRepository::new()));
        let source = NamedConfigurationSource::new(service, None);

        let attempt = source.try_restore(&RestoreRequest::from_query("config=1")).await;

        assert_eq!(
            attempt,
            SourceAttempt::Failed(RestoreError::Configuration(ConfigError::NotAuthenticated))
        );
    }

    #[tokio::test]
    async fn saved_configuration_is_restored() {
        let repo = Arc::new(MemoryRepository::new());
        let service = ConfigurationService::new(repo);
        let user = UserId::new("u1");
        service.ensure_household(&user).await.unwrap();
        let id = service
            .save(
                Some(&user),
                &NewConfiguration {
                    name: Some("Flat".to_string()),
                    person1_name: "Alex".to_string(),
                    person2_name: "Sam".to_string(),
                    person1_salary: dec!(3500),
                    person2_salary: dec!(2500),
                    expenses: vec![ExpenseItem::new("Rent", dec!(1200.50))],
                    currency: "GBP".to_string(),
                },
            )
            .await
            .unwrap();
        let source = NamedConfigurationSource::new(service, Some(user));

        let attempt = source
            .try_restore(&RestoreRequest::from_query(&format!("config={id}")))
            .await;

        let SourceAttempt::Applied(payload) = attempt else {
            panic!("expected the configuration to apply, got {attempt:?}");
        };
        assert_eq!(payload.salary1, "3,500");
        assert_eq!(payload.expenses, vec![SharedExpense::new("1,200.5", "Rent")]);
        assert_eq!(payload.currency.as_deref(), Some("GBP"));
    }

    // =========================================================================
    // Local storage
    // =========================================================================

    #[tokio::test]
    async fn corrupt_local_snapshot_is_ignored_silently() {
        let store = Arc::new(MemoryStore::new());
        store.set(FORM_KEY, "{not json").unwrap();
        let pipeline = RestorePipeline::new().with_source(LocalSnapshotSource::new(store));

        let outcome = pipeline.run(&RestoreRequest::default()).await;

        assert_eq!(outcome, RestoreOutcome::Nothing);
    }

    #[tokio::test]
    async fn legacy_local_keys_are_read() {
        let store = Arc::new(MemoryStore::new());
        store.set(legacy_keys::SALARY1, "4,000").unwrap();
        store
            .set(legacy_keys::EXPENSES, r#"[{"amount":"900","label":"Rent"}]"#)
            .unwrap();
        let source = LocalSnapshotSource::new(store);

        let attempt = source.try_restore(&RestoreRequest::default()).await;

        let SourceAttempt::Applied(payload) = attempt else {
            panic!("expected legacy keys to apply, got {attempt:?}");
        };
        assert_eq!(payload.salary1, "4,000");
        assert_eq!(payload.expenses, vec![SharedExpense::new("900", "Rent")]);
    }

    // =========================================================================
    // Detail conversion
    // =========================================================================

    #[test]
    fn detail_amounts_drop_trailing_zeros() {
        let now = Utc::now();
        let detail = ConfigurationDetail {
            id: ConfigurationId(1),
            name: "x".to_string(),
            person1_name: String::new(),
            person2_name: String::new(),
            person1_salary: dec!(1234567.00),
            person2_salary: dec!(0.50),
            currency: String::new(),
            expenses: vec![SavedExpense {
                id: 1,
                label: "Gym".to_string(),
                amount: dec!(45.00),
                sort_order: 0,
            }],
            created_at: now,
            updated_at: now,
        };

        let payload = payload_from_detail(&detail);

        assert_eq!(payload.salary1, "1,234,567");
        assert_eq!(payload.salary2, "0.5");
        assert_eq!(payload.expenses[0].amount, "45");
        assert_eq!(payload.currency, None);
    }
}
