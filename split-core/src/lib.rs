pub mod calculations;
pub mod controller;
pub mod db;
pub mod models;
pub mod restore;
pub mod share;
pub mod store;

pub use db::repository::{ConfigurationRepository, RepositoryError};
pub use models::*;
