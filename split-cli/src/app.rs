//! Command handlers.
//!
//! Each handler opens what it needs (local storage, the share service, the
//! configuration database), runs one calculator session and returns the text
//! to print. Nothing here writes to stdout.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Local;
use serde_json::json;
use split_core::calculations::{build_pending_save, format_currency};
use split_core::controller::{
    Action, AnalyticsSink, Calculator, DEFAULT_DEBOUNCE, SnapshotWriter, TracingSink,
};
use split_core::db::{ConfigurationService, RepositoryRegistry};
use split_core::restore::{
    CONFIG_LOAD_FAILED, CONFIG_PARAM, LegacyUrlSource, LocalSnapshotSource,
    NamedConfigurationSource, RestoreOutcome, RestorePipeline, RestoreRequest, RestoreSourceKind,
    ShareLinkSource, payload_from_detail,
};
use split_core::share::{ShareError, ShareId, ShareLink, ShareLinks, ShareStore, create_share_link};
use split_core::store::{self, KeyValueStore};
use split_core::{
    CalculationResult, ConfigurationId, Currency, ExpenseItem, FieldError, Person, SharePayload,
    SharedExpense, UserId,
};
use split_db_sqlite::SqliteRepositoryFactory;
use split_share::{HttpShareStore, ShareClientConfig};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AppConfig;
use crate::file_store::FileStore;

/// Registry of every storage backend this binary can open.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Form fields supplied on the command line. `None` leaves a field blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    pub name1: Option<String>,
    pub name2: Option<String>,
    pub salary1: Option<String>,
    pub salary2: Option<String>,
    pub expenses: Vec<SharedExpense>,
}

impl FormInput {
    pub fn is_empty(&self) -> bool {
        self.name1.is_none()
            && self.name2.is_none()
            && self.salary1.is_none()
            && self.salary2.is_none()
            && self.expenses.is_empty()
    }

    /// Appends expenses loaded from a file.
    pub fn extend_expenses(&mut self, items: &[ExpenseItem]) {
        self.expenses.extend(
            items
                .iter()
                .map(|item| SharedExpense::new(item.amount.to_string(), item.label.clone())),
        );
    }
}

/// Share service used when no endpoint is configured. Every call fails, so
/// share links fall back to the self-contained form.
struct UnconfiguredShareStore(ShareError);

#[async_trait]
impl ShareStore for UnconfiguredShareStore {
    async fn create(&self, _payload: &SharePayload) -> Result<ShareId, ShareError> {
        Err(self.0.clone())
    }

    async fn fetch(&self, _id: &ShareId) -> Result<SharePayload, ShareError> {
        Err(self.0.clone())
    }
}

/// Everything a command needs, resolved once from config and flags.
pub struct App {
    config: AppConfig,
    user: Option<UserId>,
    storage: Arc<dyn KeyValueStore>,
    analytics: Arc<dyn AnalyticsSink>,
    registry: RepositoryRegistry,
}

impl App {
    pub fn new(
        config: AppConfig,
        user: Option<UserId>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            config,
            user,
            storage,
            analytics: Arc::new(TracingSink),
            registry: build_registry(),
        }
    }

    /// Local storage lives in the configured data directory.
    pub fn from_config(config: AppConfig) -> Self {
        let storage = Arc::new(FileStore::in_dir(&config.data_dir()));
        let user = config.user.clone().map(UserId::new);
        debug!(path = %storage.path().display(), "using local storage");
        Self::new(config, user, storage)
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    /// Preferred currency: stored choice, then the saved form, then locale.
    pub fn currency(&self) -> Currency {
        let locales = self.config.locales();
        store::load_currency(self.storage.as_ref(), locales.iter().map(String::as_str))
    }

    fn share_store(&self) -> Arc<dyn ShareStore> {
        let store = ShareClientConfig::resolve(self.config.share_api_url.as_deref())
            .and_then(HttpShareStore::new);
        match store {
            Ok(store) => {
                debug!(url = %store.base_url(), "using share service");
                Arc::new(store)
            }
            Err(e) => {
                debug!(error = %e, "share service unavailable");
                Arc::new(UnconfiguredShareStore(e))
            }
        }
    }

    fn share_links(&self) -> Result<ShareLinks> {
        Ok(ShareLinks::new(self.config.public_url()?))
    }

    /// Opens the configuration store, creating the user's household on first
    /// use.
    async fn configurations(&self) -> Result<ConfigurationService> {
        let db_config = self.config.db_config();
        if self.config.database.connection_string.is_none() {
            let dir = self.config.data_dir();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("cannot create data directory '{}'", dir.display()))?;
        }
        let repo = self
            .registry
            .create(&db_config)
            .await
            .with_context(|| format!("cannot open {} configuration store", db_config.backend))?;
        let service = ConfigurationService::new(Arc::from(repo));
        if let Some(user) = &self.user {
            service.ensure_household(user).await?;
        }
        Ok(service)
    }

    /// A session whose edits are written back to local storage.
    fn session(&self) -> Calculator {
        let writer = SnapshotWriter::spawn(self.storage.clone(), DEFAULT_DEBOUNCE);
        Calculator::new(self.currency(), self.analytics.clone()).with_writer(writer)
    }

    /// Sources in precedence order. The configuration store is only opened
    /// when the request names a configuration.
    async fn pipeline(&self, request: &RestoreRequest) -> Result<RestorePipeline> {
        let mut pipeline = RestorePipeline::new();
        if request.param(CONFIG_PARAM).is_some() {
            let service = self.configurations().await?;
            pipeline = pipeline.with_source(NamedConfigurationSource::new(service, self.user.clone()));
        }
        Ok(pipeline
            .with_source(ShareLinkSource::new(self.share_store()))
            .with_source(LegacyUrlSource)
            .with_source(LocalSnapshotSource::new(self.storage.clone())))
    }

    /// Runs the restore chain into `calc` and returns what happened.
    ///
    /// A configuration store that cannot be opened counts as a failed
    /// configuration load.
    async fn restore_into(
        &self,
        calc: &mut Calculator,
        request: &RestoreRequest,
    ) -> RestoreOutcome {
        let ticket = calc.begin_restore();
        let outcome = match self.pipeline(request).await {
            Ok(pipeline) => pipeline.run(request).await,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "configuration store unavailable");
                RestoreOutcome::Failed {
                    source: RestoreSourceKind::NamedConfiguration,
                    notice: CONFIG_LOAD_FAILED.to_string(),
                }
            }
        };
        calc.finish_restore(ticket, outcome.clone());
        outcome
    }

    /// Starts a session from `input`, or from the restore chain when no
    /// field was given.
    async fn prepared_session(
        &self,
        input: &FormInput,
        link: Option<&str>,
        currency: Option<Currency>,
    ) -> Result<Calculator> {
        let mut calc = self.session();
        if input.is_empty() {
            let request = parse_link(link)?;
            self.restore_into(&mut calc, &request).await;
        } else {
            let ticket = calc.begin_restore();
            calc.finish_restore(ticket, RestoreOutcome::Nothing);
            fill_form(&mut calc, input);
        }
        if let Some(currency) = currency {
            calc.set_currency(currency);
        }
        Ok(calc)
    }

    // ─────────────────────────────────────────────────────────────────────
    // commands
    // ─────────────────────────────────────────────────────────────────────

    /// `fairshare calculate`
    pub async fn calculate(
        &self,
        input: &FormInput,
        link: Option<&str>,
        currency: Option<Currency>,
        format: OutputFormat,
    ) -> Result<String> {
        let mut calc = self.prepared_session(input, link, currency).await?;
        let outcome = calculated(&mut calc, format);
        calc.teardown().await;
        outcome
    }

    /// `fairshare restore`
    pub async fn restore(
        &self,
        link: Option<&str>,
        format: OutputFormat,
    ) -> Result<String> {
        let request = parse_link(link)?;
        let mut calc = self.session();
        let outcome = self.restore_into(&mut calc, &request).await;

        let mut out = String::new();
        match &outcome {
            RestoreOutcome::Restored { source, .. } => {
                let _ = writeln!(out, "Restored from {source}.");
            }
            RestoreOutcome::Failed { .. } => {
                if let Some(notice) = calc.take_notice() {
                    let _ = writeln!(out, "{notice}");
                }
            }
            RestoreOutcome::Nothing => {
                let _ = writeln!(out, "Nothing to restore.");
            }
        }

        if matches!(outcome, RestoreOutcome::Restored { .. }) {
            match format {
                OutputFormat::Text => {
                    out.push('\n');
                    out.push_str(&render_payload(&calc.share_payload()));
                    if let Ok(result) = calculated(&mut calc, format) {
                        out.push('\n');
                        out.push_str(&result);
                    }
                }
                OutputFormat::Json => {
                    out = serde_json::to_string_pretty(&calc.share_payload())?;
                }
            }
        }
        calc.teardown().await;
        Ok(out)
    }

    /// `fairshare share create`
    pub async fn share_create(
        &self,
        input: &FormInput,
        currency: Option<Currency>,
    ) -> Result<String> {
        let mut calc = self.prepared_session(input, None, currency).await?;
        let checked = calculated(&mut calc, OutputFormat::Text);
        let payload = calc.share_payload();
        calc.teardown().await;
        checked?;

        let link = create_share_link(self.share_store().as_ref(), &self.share_links()?, &payload).await;
        Ok(match link {
            ShareLink::Remote(url) => format!("{url}\n"),
            ShareLink::Legacy { url, reason } => {
                warn!(error = %reason, "sharing without the share service");
                format!("{url}\n(share service unavailable: {reason}; this link contains the full form)\n")
            }
        })
    }

    /// `fairshare share open`
    pub async fn share_open(
        &self,
        id: &str,
        format: OutputFormat,
    ) -> Result<String> {
        let id = ShareId::parse(id)?;
        let payload = self.share_store().fetch(&id).await?;
        match format {
            OutputFormat::Text => Ok(render_payload(&payload)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&payload)?),
        }
    }

    /// `fairshare config save`: stores the last form from local storage.
    pub async fn config_save(&self, name: Option<&str>) -> Result<String> {
        let snapshot = store::load_snapshot(self.storage.as_ref())?
            .ok_or_else(|| anyhow!("Nothing to save yet. Calculate a split first."))?;
        let mut pending = build_pending_save(&snapshot).ok_or_else(|| {
            anyhow!("Nothing to save: enter both salaries and at least one expense first.")
        })?;
        pending.name = name.map(str::to_string);

        let service = self.configurations().await?;
        let id = service.save(self.user(), &pending).await?;
        info!(%id, "configuration saved from local form");
        Ok(format!("Saved configuration {id}.\n"))
    }

    /// `fairshare config list`
    pub async fn config_list(&self, format: OutputFormat) -> Result<String> {
        let service = self.configurations().await?;
        let summaries = service.list(self.user()).await?;

        if format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(&summaries)?);
        }
        if summaries.is_empty() {
            return Ok("No saved configurations.\n".to_string());
        }

        let mut out = String::new();
        for summary in &summaries {
            let symbol = Currency::from_code_or_default(&summary.currency).symbol();
            let _ = writeln!(
                out,
                "{:>4}  {}  ({} & {}, {} expense{}, {} total, updated {})",
                summary.id,
                summary.name,
                summary.person1_name,
                summary.person2_name,
                summary.expense_count,
                if summary.expense_count == 1 { "" } else { "s" },
                format_currency(summary.total_expenses, symbol),
                summary.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            );
        }
        Ok(out)
    }

    /// `fairshare config show`
    pub async fn config_show(
        &self,
        id: ConfigurationId,
        format: OutputFormat,
    ) -> Result<String> {
        let service = self.configurations().await?;
        let detail = service.get(self.user(), id).await?;

        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&detail)?),
            OutputFormat::Text => Ok(format!(
                "{}\n\n{}",
                detail.name,
                render_payload(&payload_from_detail(&detail))
            )),
        }
    }

    /// `fairshare config rename`
    pub async fn config_rename(
        &self,
        id: ConfigurationId,
        name: &str,
    ) -> Result<String> {
        let service = self.configurations().await?;
        service.rename(self.user(), id, name).await?;
        Ok(format!("Renamed configuration {id} to \"{}\".\n", name.trim()))
    }

    /// `fairshare config delete`
    pub async fn config_delete(&self, id: ConfigurationId) -> Result<String> {
        let service = self.configurations().await?;
        service.delete(self.user(), id).await?;
        Ok(format!("Deleted configuration {id}.\n"))
    }

    /// `fairshare currency`: shows or changes the display currency. A
    /// signed-in user's household preference is updated too.
    pub async fn currency_command(&self, code: Option<&str>) -> Result<String> {
        let Some(code) = code else {
            let current = self.currency();
            let mut out = format!("Currency: {}\n\nAvailable:\n", current.label());
            for currency in Currency::ALL {
                let marker = if currency == current { "*" } else { " " };
                let _ = writeln!(out, " {marker} {}", currency.label());
            }
            return Ok(out);
        };

        let currency = parse_currency(code)?;
        let mut calc = self.session();
        let ticket = calc.begin_restore();
        calc.finish_restore(ticket, RestoreOutcome::Nothing);
        calc.set_currency(currency);
        calc.teardown().await;

        if self.user.is_some() {
            let service = self.configurations().await?;
            service.set_currency(self.user(), currency.code()).await?;
        }
        Ok(format!("Currency set to {}.\n", currency.label()))
    }
}

/// Accepts a supported code in any case.
pub fn parse_currency(code: &str) -> Result<Currency> {
    let upper = code.trim().to_ascii_uppercase();
    Currency::parse(&upper).ok_or_else(|| {
        let supported: Vec<_> = Currency::ALL.iter().map(|c| c.code()).collect();
        anyhow!("unsupported currency '{code}'; choose one of {}", supported.join(", "))
    })
}

/// A full URL, a query string, or nothing (local storage only).
pub fn parse_link(link: Option<&str>) -> Result<RestoreRequest> {
    let Some(link) = link.map(str::trim).filter(|l| !l.is_empty()) else {
        return Ok(RestoreRequest::default());
    };
    if link.contains("://") {
        let url = Url::parse(link).with_context(|| format!("invalid link '{link}'"))?;
        return Ok(RestoreRequest::from_url(&url));
    }
    Ok(RestoreRequest::from_query(link))
}

/// Types `input` into the form the way a user would.
pub fn fill_form(
    calc: &mut Calculator,
    input: &FormInput,
) {
    for (person, value) in [(Person::First, &input.name1), (Person::Second, &input.name2)] {
        if let Some(value) = value {
            calc.dispatch(Action::SetName {
                person,
                value: value.clone(),
            });
        }
    }
    for (person, value) in [(Person::First, &input.salary1), (Person::Second, &input.salary2)] {
        if let Some(value) = value {
            calc.dispatch(Action::SetSalary {
                person,
                value: value.clone(),
            });
        }
    }
    for (i, expense) in input.expenses.iter().enumerate() {
        if i > 0 {
            calc.dispatch(Action::AddExpense);
        }
        let Some(id) = calc.state().form.expenses.last().map(|row| row.id) else {
            continue;
        };
        calc.dispatch(Action::SetExpenseAmount {
            id,
            value: expense.amount.clone(),
        });
        calc.dispatch(Action::SetExpenseLabel {
            id,
            value: expense.label.clone(),
        });
    }
}

/// Runs the calculation and renders it, or explains why it could not run.
fn calculated(
    calc: &mut Calculator,
    format: OutputFormat,
) -> Result<String> {
    let currency = calc.currency();
    if let Some(result) = calc.calculate() {
        return match format {
            OutputFormat::Text => Ok(render_result(result, currency)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "currency": currency.code(),
                "result": result,
            }))?),
        };
    }
    if let Some(notice) = calc.take_notice() {
        bail!(notice);
    }
    bail!(render_errors(calc.errors()))
}

pub fn render_errors(errors: &[FieldError]) -> String {
    let mut out = String::from("Please fix the following:");
    for error in errors {
        let _ = write!(out, "\n  {}: {}", error.field, error.message);
    }
    out
}

pub fn render_result(
    result: &CalculationResult,
    currency: Currency,
) -> String {
    let symbol = currency.symbol();
    let money = |amount| format_currency(amount, symbol);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} pays {} ({}%)",
        result.person1_name,
        money(result.person1_total),
        result.person1_percentage
    );
    let _ = writeln!(
        out,
        "{} pays {} ({}%)",
        result.person2_name,
        money(result.person2_total),
        result.person2_percentage
    );
    let _ = writeln!(out, "Total expenses: {}", money(result.total_expenses));
    out.push('\n');

    let label_width = result
        .expense_breakdown
        .iter()
        .map(|e| e.label.chars().count())
        .chain(std::iter::once("Expense".len()))
        .max()
        .unwrap_or_default();
    let rows: Vec<[String; 3]> = result
        .expense_breakdown
        .iter()
        .map(|e| [money(e.amount), money(e.person1_share), money(e.person2_share)])
        .collect();
    let col_width = rows
        .iter()
        .flatten()
        .map(|s| s.chars().count())
        .chain([
            "Amount".len(),
            result.person1_name.chars().count(),
            result.person2_name.chars().count(),
        ])
        .max()
        .unwrap_or_default();

    let _ = writeln!(
        out,
        "{:<label_width$}  {:>col_width$}  {:>col_width$}  {:>col_width$}",
        "Expense", "Amount", result.person1_name, result.person2_name
    );
    for (expense, [amount, share1, share2]) in result.expense_breakdown.iter().zip(&rows) {
        let _ = writeln!(
            out,
            "{:<label_width$}  {:>col_width$}  {:>col_width$}  {:>col_width$}",
            expense.label, amount, share1, share2
        );
    }

    out.push('\n');
    let _ = writeln!(
        out,
        "Combined income {}: {} {}, {} {}",
        money(result.combined_income),
        result.person1_name,
        money(result.person1_income),
        result.person2_name,
        money(result.person2_income)
    );
    out
}

/// The form fields as entered.
pub fn render_payload(payload: &SharePayload) -> String {
    let or_dash = |s: &str| if s.trim().is_empty() { "-".to_string() } else { s.to_string() };
    let mut out = String::new();
    let _ = writeln!(out, "Person 1: {} (salary {})", or_dash(&payload.name1), or_dash(&payload.salary1));
    let _ = writeln!(out, "Person 2: {} (salary {})", or_dash(&payload.name2), or_dash(&payload.salary2));
    if let Some(currency) = &payload.currency {
        let _ = writeln!(out, "Currency: {currency}");
    }
    let _ = writeln!(out, "Expenses:");
    for expense in &payload.expenses {
        let _ = writeln!(out, "  {:<20} {}", or_dash(&expense.label), or_dash(&expense.amount));
    }
    out
}
