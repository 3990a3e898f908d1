//! Operator CLI for connection strings
//!
//! `connstr` builds SQL Server and Entity Framework connection strings, tests
//! them against a live server, and manages the `connectionStrings` section of
//! an XML configuration file.
//!
//! # Example Usage
//!
//! ```bash
//! # Build connection strings
//! connstr build-sql --server db01 --database Sales --username app --password secret
//! connstr build-entity --model SalesModel --server "(local)" --database App_Data/Sales.mdf
//!
//! # Test one; exit code 1 and a failure kind on error
//! connstr test "Data Source=db01;Initial Catalog=Sales;Integrated Security=True"
//!
//! # Manage a configuration file
//! export WEBCONFIG_PROTECTION_KEY=$(connstr generate-key)
//! connstr --web-config site/Web.config add --entry "Sales=Data Source=db01;Initial Catalog=Sales" --encrypt true
//! connstr --web-config site/Web.config list
//! connstr --web-config site/Web.config decrypt
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::panic))]

pub mod cli;
pub mod commands;

pub use cli::{Cli, Command, SqlArgs};
pub use commands::{execute, resolve_settings};
