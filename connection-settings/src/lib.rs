//! Connection string builders for SQL Server and Entity Framework clients
//!
//! This crate produces the connection strings an application stores in its
//! configuration file, and checks them against a live server:
//! - [`SqlConnectionSetting`] builds a SQL Server connection string from
//!   discrete parameters (server, catalog or `.mdf` path, credentials, flags)
//! - [`EntityConnectionSetting`] wraps a SQL connection string with the
//!   `res://*/<model>.csdl|ssdl|msl` metadata an Entity Framework model needs
//! - [`ConnectionSetting`] is the provider + string pair both reduce to
//! - [`ConnectivityTestable`] opens and closes a connection and reports why it
//!   failed; `test()` keeps the plain boolean view
//!
//! # Example
//!
//! ```rust
//! use connection_settings::{EntityConnectionSetting, SqlConnectionParameters, SqlConnectionSetting};
//!
//! let sql = SqlConnectionSetting::new(
//!     &SqlConnectionParameters::new("db01", "Sales")
//!         .with_credentials("app", "secret")
//!         .with_integrated_security(false),
//! );
//! assert_eq!(
//!     sql.connection_string(),
//!     "Data Source=db01;Initial Catalog=Sales;Integrated Security=False;User ID=app;Password=secret"
//! );
//!
//! let entity = EntityConnectionSetting::from_sql("SalesModel", &sql);
//! assert!(entity.connection_string().starts_with("metadata=res://*/SalesModel.csdl|"));
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing))]

pub mod connection_string;
pub mod connectivity;
pub mod entity;
pub mod error;
pub mod setting;
pub mod sql;

pub use connectivity::{probe_sql_server, ConnectivityTestable, DEFAULT_CONNECT_TIMEOUT};
pub use entity::{model_from_metadata, model_metadata, EntityConnectionSetting, EntityConnectionStringBuilder};
pub use error::*;
pub use setting::*;
pub use sql::{
    is_attach_file, is_local_server, SqlConnectionParameters, SqlConnectionSetting,
    SqlConnectionStringBuilder, SqlKeyword, LOCAL_SERVER,
};
