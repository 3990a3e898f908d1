//! Log-safe rendering of connection strings
//!
//! Connection strings carry credentials. Anything that logs one goes through
//! [`redact_connection_string`] (or a configured [`ConnectionStringRedactor`])
//! so that `Password=` / `PWD=` values never reach the log output, including
//! the SQL connection string nested inside an entity connection string.
//!
//! # Example
//!
//! ```rust
//! use logger_redacted::redact_connection_string;
//!
//! let logged = redact_connection_string("Data Source=db01;User ID=app;Password=hunter2");
//! assert_eq!(logged, "Data Source=db01;User ID=app;Password=******");
//! ```

pub mod config;
pub mod redactor;

pub use config::*;
pub use redactor::*;
