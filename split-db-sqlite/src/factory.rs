use async_trait::async_trait;

use split_core::db::repository::{ConfigurationRepository, RepositoryError};
use split_core::db::{DbConfig, RepositoryFactory};
use tracing::info;

use crate::repository::SqliteRepository;

/// Turn a `DbConfig` connection string into a sqlx URL.
///
/// `:memory:` maps to an in-memory database, strings already starting with
/// `sqlite:` pass through, and anything else is treated as a file path that
/// is created on first use.
pub fn database_url(connection_string: &str) -> String {
    match connection_string.trim() {
        ":memory:" => "sqlite::memory:".to_string(),
        url if url.starts_with("sqlite:") => url.to_string(),
        path => format!("sqlite:{}?mode=rwc", path),
    }
}

/// [`RepositoryFactory`] for SQLite.
///
/// Register this with a [`split_core::db::RepositoryRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use split_core::db::RepositoryRegistry;
/// use split_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database described by `config.connection_string` and bring
    /// its schema up to date.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn ConfigurationRepository>, RepositoryError> {
        let url = database_url(&config.connection_string);
        let repo = SqliteRepository::new(&url)
            .await
            .map_err(|e| RepositoryError::Connection(format!("{e:#}")))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        info!(%url, "opened sqlite configuration store");
        Ok(Box::new(repo))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use split_core::db::{DbConfig, RepositoryFactory};
    use split_core::UserId;

    use super::{SqliteRepositoryFactory, database_url};

    #[test]
    fn backend_name_is_sqlite() {
        assert_eq!(SqliteRepositoryFactory.backend_name(), "sqlite");
    }

    #[test]
    fn connection_strings_map_to_sqlx_urls() {
        assert_eq!(database_url(":memory:"), "sqlite::memory:");
        assert_eq!(database_url("fairshare.db"), "sqlite:fairshare.db?mode=rwc");
        assert_eq!(database_url("sqlite://x.db"), "sqlite://x.db");
    }

    /// Full round-trip: factory → SqliteRepository with an in-memory DB.
    #[tokio::test]
    async fn creates_in_memory_repository() {
        let config = DbConfig {
            backend: "sqlite".to_string(),
            connection_string: ":memory:".to_string(),
        };

        let repo = SqliteRepositoryFactory
            .create(&config)
            .await
            .expect("failed to create in-memory repository");

        let result = repo.household_for_user(&UserId::new("nobody")).await;
        assert_eq!(result, Ok(None));
    }
}
