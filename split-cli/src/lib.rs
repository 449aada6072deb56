pub mod app;
pub mod config;
pub mod csv_loader;
pub mod file_store;
pub mod logging;
pub mod utils;
