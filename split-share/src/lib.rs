//! HTTP client for the remote share service.

pub mod client;

pub use client::{HttpShareStore, SHARE_API_URL_ENV, ShareClientConfig};
