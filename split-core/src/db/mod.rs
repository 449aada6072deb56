pub mod factory;
#[cfg(test)]
pub(crate) mod memory;
pub mod repository;
pub mod service;

pub use factory::{DbConfig, RepositoryFactory, RepositoryRegistry};
pub use repository::{ConfigurationRepository, MAX_CONFIGURATIONS, RepositoryError};
pub use service::{ConfigError, ConfigurationService, default_configuration_name};
