//! User-facing operations on named configurations.
//!
//! Resolves the signed-in user to a household, validates input, and turns
//! storage failures into short messages fit to show on screen. Details of
//! unexpected failures go to the log, not to the user.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing::{debug, error, info};

use super::repository::{ConfigurationRepository, RepositoryError};
use crate::models::{
    ConfigurationDetail, ConfigurationId, ConfigurationSummary, HouseholdId, NewConfiguration,
    UserId, is_currency_code,
};

pub const MAX_CONFIGURATION_NAME_LENGTH: usize = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Not authenticated.")]
    NotAuthenticated,

    #[error("Household not found.")]
    HouseholdNotFound,

    #[error("Configuration not found.")]
    NotFound,

    #[error("Configuration limit reached (max 10). Delete a saved configuration to make room.")]
    LimitReached,

    #[error("Name cannot be empty.")]
    EmptyName,

    #[error("Name must be 100 characters or less.")]
    NameTooLong,

    #[error("Currency must be a 3-letter uppercase code (e.g. USD).")]
    InvalidCurrency,

    #[error("Something went wrong. Please try again.")]
    Storage,
}

/// Name used when a configuration is saved without one, e.g.
/// `"October 15, 2026"`.
pub fn default_configuration_name(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

#[derive(Clone)]
pub struct ConfigurationService {
    repo: Arc<dyn ConfigurationRepository>,
}

impl ConfigurationService {
    pub fn new(repo: Arc<dyn ConfigurationRepository>) -> Self {
        Self { repo }
    }

    /// Returns the user's household, creating one on first sign-in.
    pub async fn ensure_household(&self, user: &UserId) -> Result<HouseholdId, ConfigError> {
        match self.repo.household_for_user(user).await {
            Ok(Some(household)) => Ok(household),
            Ok(None) => {
                let household = self
                    .repo
                    .create_household(user)
                    .await
                    .map_err(|e| storage_error("create_household", e))?;
                info!(%user, %household, "created household");
                Ok(household)
            }
            Err(e) => Err(storage_error("household_for_user", e)),
        }
    }

    pub async fn save(
        &self,
        user: Option<&UserId>,
        config: &NewConfiguration,
    ) -> Result<ConfigurationId, ConfigError> {
        let household = self.household(user).await?;
        let name = match config.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_configuration_name(Local::now().date_naive()),
        };

        let id = self
            .repo
            .create_configuration(household, &name, config)
            .await
            .map_err(|e| match e {
                RepositoryError::LimitReached => ConfigError::LimitReached,
                other => storage_error("create_configuration", other),
            })?;
        info!(%household, %id, name = %name, "saved configuration");
        Ok(id)
    }

    pub async fn list(&self, user: Option<&UserId>) -> Result<Vec<ConfigurationSummary>, ConfigError> {
        let household = self.household(user).await?;
        self.repo
            .list_configurations(household)
            .await
            .map_err(|e| storage_error("list_configurations", e))
    }

    pub async fn get(
        &self,
        user: Option<&UserId>,
        id: ConfigurationId,
    ) -> Result<ConfigurationDetail, ConfigError> {
        let household = self.household(user).await?;
        self.repo
            .get_configuration(household, id)
            .await
            .map_err(|e| not_found_or_storage("get_configuration", e))
    }

    /// Renames after trimming; the result must be 1 to 100 characters.
    pub async fn rename(
        &self,
        user: Option<&UserId>,
        id: ConfigurationId,
        new_name: &str,
    ) -> Result<(), ConfigError> {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if trimmed.chars().count() > MAX_CONFIGURATION_NAME_LENGTH {
            return Err(ConfigError::NameTooLong);
        }

        let household = self.household(user).await?;
        self.repo
            .rename_configuration(household, id, trimmed)
            .await
            .map_err(|e| not_found_or_storage("rename_configuration", e))?;
        debug!(%id, name = trimmed, "renamed configuration");
        Ok(())
    }

    pub async fn delete(
        &self,
        user: Option<&UserId>,
        id: ConfigurationId,
    ) -> Result<(), ConfigError> {
        let household = self.household(user).await?;
        self.repo
            .delete_configuration(household, id)
            .await
            .map_err(|e| not_found_or_storage("delete_configuration", e))?;
        info!(%id, "deleted configuration");
        Ok(())
    }

    pub async fn currency(&self, user: Option<&UserId>) -> Result<String, ConfigError> {
        let household = self.household(user).await?;
        self.repo.get_currency(household).await.map_err(|e| match e {
            RepositoryError::NotFound => ConfigError::HouseholdNotFound,
            other => storage_error("get_currency", other),
        })
    }

    pub async fn set_currency(
        &self,
        user: Option<&UserId>,
        code: &str,
    ) -> Result<(), ConfigError> {
        if !is_currency_code(code) {
            return Err(ConfigError::InvalidCurrency);
        }
        let household = self.household(user).await?;
        self.repo
            .set_currency(household, code)
            .await
            .map_err(|e| storage_error("set_currency", e))
    }

    async fn household(&self, user: Option<&UserId>) -> Result<HouseholdId, ConfigError> {
        let user = user.ok_or(ConfigError::NotAuthenticated)?;
        self.repo
            .household_for_user(user)
            .await
            .map_err(|e| storage_error("household_for_user", e))?
            .ok_or(ConfigError::HouseholdNotFound)
    }
}

fn storage_error(
    operation: &str,
    err: RepositoryError,
) -> ConfigError {
    error!(operation, error = %err, "configuration store failed");
    ConfigError::Storage
}

fn not_found_or_storage(
    operation: &str,
    err: RepositoryError,
) -> ConfigError {
    match err {
        RepositoryError::NotFound => ConfigError::NotFound,
        other => storage_error(operation, other),
    }
}
