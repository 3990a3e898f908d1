//! Connection string management for XML application configuration files
//!
//! This crate edits the `connectionStrings` section of a `Web.config`-style
//! file:
//! - Typed access to configuration sections through [`ConfigurationStore`]
//! - Add-only merging of named connection strings
//! - Section encryption with a pluggable [`ProtectionProvider`] (AES-256-GCM by default)
//! - Safe saves through a temporary copy moved over the original file
//! - Settings from a file and `WEBCONFIG_*` environment variables
//!
//! # Example
//!
//! ```no_run
//! use connection_settings::{SqlConnectionParameters, SqlConnectionSetting};
//! use std::collections::BTreeMap;
//! use webconfig_engine::{ManagerSettings, WebConfigConnectionStringManager};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ManagerSettings::load(None)?.with_config_path("site/Web.config");
//!     let mut manager = WebConfigConnectionStringManager::from_settings(&settings)?;
//!
//!     let sales = SqlConnectionSetting::new(
//!         &SqlConnectionParameters::new("db01", "Sales").with_credentials("app", "secret"),
//!     );
//!     let mut entries = BTreeMap::new();
//!     entries.insert("Sales".to_string(), sales.into_setting());
//!
//!     let outcome = manager.set_connection_strings(&entries, false)?;
//!     println!("added {} connection strings", outcome.added);
//!     Ok(())
//! }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing))]

pub mod error;
pub mod files;
pub mod manager;
pub mod protection;
pub mod section;
pub mod settings;
pub mod store;

pub use error::*;
pub use files::replace_file;
pub use manager::{MergeOutcome, WebConfigConnectionStringManager, CONNECTION_STRINGS_SECTION};
pub use protection::{AesGcmProtectionProvider, ProtectionProvider, AES_GCM_PROVIDER_NAME};
pub use section::{
    AppSettingsSection, ConfigurationSection, ConnectionStringSettings, ConnectionStringsItem, ConnectionStringsSection,
    SectionInformation,
};
pub use settings::ManagerSettings;
pub use store::ConfigurationStore;
