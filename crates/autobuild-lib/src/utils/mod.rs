// Utility modules

pub mod config;
pub mod credential_store;
pub mod flag_guard;
pub mod format;

pub use config::{api_base_for_host, AppConfig};
pub use credential_store::CredentialStore;
pub use format::{format_bytes, format_megabytes, mask_secret};
