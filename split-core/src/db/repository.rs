use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    ConfigurationDetail, ConfigurationId, ConfigurationSummary, HouseholdId, NewConfiguration,
    UserId,
};

/// Most live configurations a household may keep.
pub const MAX_CONFIGURATIONS: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Configuration limit reached")]
    LimitReached,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Storage for named configurations.
///
/// Every configuration call is scoped to a household; ids that belong to a
/// different household behave exactly like ids that do not exist.
/// Soft-deleted rows are invisible to every method.
#[async_trait]
pub trait ConfigurationRepository: Send + Sync {
    // Households
    async fn household_for_user(&self, user: &UserId) -> Result<Option<HouseholdId>, RepositoryError>;
    async fn create_household(&self, owner: &UserId) -> Result<HouseholdId, RepositoryError>;

    // Configurations
    async fn create_configuration(
        &self,
        household: HouseholdId,
        name: &str,
        config: &NewConfiguration,
    ) -> Result<ConfigurationId, RepositoryError>;

    /// Most recently updated first.
    async fn list_configurations(
        &self,
        household: HouseholdId,
    ) -> Result<Vec<ConfigurationSummary>, RepositoryError>;

    async fn get_configuration(
        &self,
        household: HouseholdId,
        id: ConfigurationId,
    ) -> Result<ConfigurationDetail, RepositoryError>;

    async fn rename_configuration(
        &self,
        household: HouseholdId,
        id: ConfigurationId,
        name: &str,
    ) -> Result<(), RepositoryError>;

    /// Soft-deletes the configuration and its expenses.
    async fn delete_configuration(
        &self,
        household: HouseholdId,
        id: ConfigurationId,
    ) -> Result<(), RepositoryError>;

    // Preferences
    async fn get_currency(&self, household: HouseholdId) -> Result<String, RepositoryError>;
    async fn set_currency(
        &self,
        household: HouseholdId,
        code: &str,
    ) -> Result<(), RepositoryError>;
}
