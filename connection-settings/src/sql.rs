// SQL Server connection strings
use crate::connection_string::{append_pair, format_bool, normalize_key, parse_bool, parse_pairs};
use crate::error::{SettingsError, SettingsResult};
use crate::setting::{ConnectionSetting, SQL_CLIENT_PROVIDER};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Server name that selects the default instance on the local machine.
pub const LOCAL_SERVER: &str = "(local)";

/// File extension of an attachable SQL Server database file.
pub const DATABASE_FILE_EXTENSION: &str = ".mdf";

/// Keywords understood by [`SqlConnectionStringBuilder`], in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SqlKeyword {
    DataSource,
    AttachDbFilename,
    InitialCatalog,
    IntegratedSecurity,
    PersistSecurityInfo,
    UserId,
    Password,
    MultipleActiveResultSets,
    ConnectTimeout,
    ApplicationName,
}

impl SqlKeyword {
    pub const ALL: [SqlKeyword; 10] = [
        SqlKeyword::DataSource,
        SqlKeyword::AttachDbFilename,
        SqlKeyword::InitialCatalog,
        SqlKeyword::IntegratedSecurity,
        SqlKeyword::PersistSecurityInfo,
        SqlKeyword::UserId,
        SqlKeyword::Password,
        SqlKeyword::MultipleActiveResultSets,
        SqlKeyword::ConnectTimeout,
        SqlKeyword::ApplicationName,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            Self::DataSource => "Data Source",
            Self::AttachDbFilename => "AttachDbFilename",
            Self::InitialCatalog => "Initial Catalog",
            Self::IntegratedSecurity => "Integrated Security",
            Self::PersistSecurityInfo => "Persist Security Info",
            Self::UserId => "User ID",
            Self::Password => "Password",
            Self::MultipleActiveResultSets => "MultipleActiveResultSets",
            Self::ConnectTimeout => "Connect Timeout",
            Self::ApplicationName => "Application Name",
        }
    }

    /// Resolves a keyword or one of its synonyms, ignoring case and extra whitespace.
    pub fn from_name(name: &str) -> Option<Self> {
        let keyword = match normalize_key(name).as_str() {
            "data source" | "server" | "address" | "addr" | "network address" => Self::DataSource,
            "attachdbfilename" | "extended properties" | "initial file name" => {
                Self::AttachDbFilename
            }
            "initial catalog" | "database" => Self::InitialCatalog,
            "integrated security" | "trusted_connection" => Self::IntegratedSecurity,
            "persist security info" | "persistsecurityinfo" => Self::PersistSecurityInfo,
            "user id" | "uid" | "user" => Self::UserId,
            "password" | "pwd" => Self::Password,
            "multipleactiveresultsets" | "multiple active result sets" => {
                Self::MultipleActiveResultSets
            }
            "connect timeout" | "connection timeout" | "timeout" => Self::ConnectTimeout,
            "application name" | "app" => Self::ApplicationName,
            _ => return None,
        };
        Some(keyword)
    }

    fn is_boolean(self) -> bool {
        matches!(
            self,
            Self::IntegratedSecurity | Self::PersistSecurityInfo | Self::MultipleActiveResultSets
        )
    }
}

impl fmt::Display for SqlKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Keyword builder for SQL Server connection strings.
///
/// Known keywords are emitted in [`SqlKeyword`] order with canonical names;
/// anything else found while parsing (`Encrypt`, `TrustServerCertificate`, etc.)
/// is kept verbatim and emitted afterwards in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlConnectionStringBuilder {
    values: BTreeMap<SqlKeyword, String>,
    extra: Vec<(String, String)>,
}

impl SqlConnectionStringBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(connection_string: &str) -> SettingsResult<Self> {
        let mut builder = Self::new();
        for (key, value) in parse_pairs(connection_string)? {
            match SqlKeyword::from_name(&key) {
                Some(keyword) if keyword.is_boolean() => {
                    builder.set_bool(keyword, parse_bool(keyword.canonical_name(), &value)?);
                }
                Some(keyword) => {
                    builder.set(keyword, value);
                }
                None => {
                    builder.set_extra(key, value);
                }
            }
        }
        Ok(builder)
    }

    pub fn set(&mut self, keyword: SqlKeyword, value: impl Into<String>) -> &mut Self {
        self.values.insert(keyword, value.into());
        self
    }

    pub fn set_bool(&mut self, keyword: SqlKeyword, value: bool) -> &mut Self {
        self.set(keyword, format_bool(value))
    }

    /// Sets an unrecognised keyword, replacing an existing entry with the same normalised name.
    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let normalized = normalize_key(&key);
        let value = value.into();
        match self.extra.iter_mut().find(|(k, _)| normalize_key(k) == normalized) {
            Some(entry) => entry.1 = value,
            None => self.extra.push((key, value)),
        }
        self
    }

    pub fn get(&self, keyword: SqlKeyword) -> Option<&str> {
        self.values.get(&keyword).map(String::as_str)
    }

    pub fn get_bool(&self, keyword: SqlKeyword) -> SettingsResult<Option<bool>> {
        self.get(keyword)
            .map(|value| parse_bool(keyword.canonical_name(), value))
            .transpose()
    }

    pub fn get_extra(&self, key: &str) -> Option<&str> {
        let normalized = normalize_key(key);
        self.extra
            .iter()
            .find(|(k, _)| normalize_key(k) == normalized)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, keyword: SqlKeyword) -> Option<String> {
        self.values.remove(&keyword)
    }

    pub fn contains(&self, keyword: SqlKeyword) -> bool {
        self.values.contains_key(&keyword)
    }

    pub fn extra(&self) -> &[(String, String)] {
        &self.extra
    }
}

impl fmt::Display for SqlConnectionStringBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for (keyword, value) in &self.values {
            append_pair(&mut out, keyword.canonical_name(), value);
        }
        for (key, value) in &self.extra {
            append_pair(&mut out, key, value);
        }
        f.write_str(&out)
    }
}

/// Discrete inputs for a SQL Server connection string.
///
/// The three flags are three-state: `None` leaves the builder default in
/// place (integrated security defaults to enabled, the other two are not
/// emitted).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlConnectionParameters {
    /// Server address; empty or `(local)` selects the local machine.
    pub server: String,
    /// Catalog name, or a path to an `.mdf` file to attach.
    pub database: String,
    pub username: String,
    pub password: String,
    pub multiple_active_result_sets: Option<bool>,
    pub integrated_security: Option<bool>,
    pub persist_security_info: Option<bool>,
    pub application_name: Option<String>,
}

impl SqlConnectionParameters {
    pub fn new(server: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_multiple_active_result_sets(mut self, enabled: bool) -> Self {
        self.multiple_active_result_sets = Some(enabled);
        self
    }

    pub fn with_integrated_security(mut self, enabled: bool) -> Self {
        self.integrated_security = Some(enabled);
        self
    }

    pub fn with_persist_security_info(mut self, enabled: bool) -> Self {
        self.persist_security_info = Some(enabled);
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }
}

/// True for an empty (or blank) server or the case-insensitive `(local)` sentinel.
pub fn is_local_server(server: &str) -> bool {
    let trimmed = server.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(LOCAL_SERVER)
}

/// True when `database` names a file to attach rather than a catalog.
pub fn is_attach_file(database: &str) -> bool {
    database.contains('\\')
        || database.contains('/')
        || database.to_lowercase().ends_with(DATABASE_FILE_EXTENSION)
}

/// A SQL Server connection string built from [`SqlConnectionParameters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlConnectionSetting {
    setting: ConnectionSetting,
    builder: SqlConnectionStringBuilder,
}

impl SqlConnectionSetting {
    pub const PROVIDER: &'static str = SQL_CLIENT_PROVIDER;

    pub fn new(parameters: &SqlConnectionParameters) -> Self {
        let mut builder = SqlConnectionStringBuilder::new();

        if is_attach_file(&parameters.database) {
            builder.set(SqlKeyword::AttachDbFilename, parameters.database.as_str());
        } else {
            builder.set(SqlKeyword::InitialCatalog, parameters.database.as_str());
        }

        builder.set_bool(SqlKeyword::IntegratedSecurity, true);
        if !parameters.username.is_empty() {
            builder.set(SqlKeyword::UserId, parameters.username.as_str());
        }
        if !parameters.password.is_empty() {
            builder.set(SqlKeyword::Password, parameters.password.as_str());
        }

        if let Some(enabled) = parameters.multiple_active_result_sets {
            builder.set_bool(SqlKeyword::MultipleActiveResultSets, enabled);
        }
        if let Some(enabled) = parameters.integrated_security {
            builder.set_bool(SqlKeyword::IntegratedSecurity, enabled);
        }
        if let Some(enabled) = parameters.persist_security_info {
            builder.set_bool(SqlKeyword::PersistSecurityInfo, enabled);
        }
        if let Some(name) = parameters.application_name.as_deref().filter(|n| !n.is_empty()) {
            builder.set(SqlKeyword::ApplicationName, name);
        }

        let local = is_local_server(&parameters.server);
        let data_source = if local {
            LOCAL_SERVER
        } else {
            parameters.server.as_str()
        };
        builder.set(SqlKeyword::DataSource, data_source);
        debug!(local, attach_file = builder.contains(SqlKeyword::AttachDbFilename), "Built SQL connection string");

        Self::from_builder(builder)
    }

    /// Wraps an existing connection string, validating its syntax.
    pub fn parse(connection_string: &str) -> SettingsResult<Self> {
        let builder = SqlConnectionStringBuilder::parse(connection_string)?;
        Ok(Self::from_builder(builder))
    }

    pub fn from_builder(builder: SqlConnectionStringBuilder) -> Self {
        let setting = ConnectionSetting::with_connection_string(Self::PROVIDER, builder.to_string());
        Self { setting, builder }
    }

    pub fn connection_string(&self) -> &str {
        &self.setting.connection_string
    }

    pub fn provider(&self) -> &str {
        &self.setting.provider
    }

    pub fn builder(&self) -> &SqlConnectionStringBuilder {
        &self.builder
    }

    pub fn is_local(&self) -> bool {
        is_local_server(self.builder.get(SqlKeyword::DataSource).unwrap_or_default())
    }

    /// Recovers the discrete parameters from the serialised keywords.
    ///
    /// Flags come back as they are stored, so an integrated-security flag
    /// left at its default reads back as `Some(true)`.
    pub fn parameters(&self) -> SettingsResult<SqlConnectionParameters> {
        let text = |keyword| self.builder.get(keyword).unwrap_or_default().to_string();
        let database = match self.builder.get(SqlKeyword::AttachDbFilename) {
            Some(path) => path.to_string(),
            None => text(SqlKeyword::InitialCatalog),
        };

        Ok(SqlConnectionParameters {
            server: text(SqlKeyword::DataSource),
            database,
            username: text(SqlKeyword::UserId),
            password: text(SqlKeyword::Password),
            multiple_active_result_sets: self.builder.get_bool(SqlKeyword::MultipleActiveResultSets)?,
            integrated_security: self.builder.get_bool(SqlKeyword::IntegratedSecurity)?,
            persist_security_info: self.builder.get_bool(SqlKeyword::PersistSecurityInfo)?,
            application_name: self.builder.get(SqlKeyword::ApplicationName).map(str::to_string),
        })
    }

    pub fn as_setting(&self) -> &ConnectionSetting {
        &self.setting
    }

    pub fn into_setting(self) -> ConnectionSetting {
        self.setting
    }

    /// Fails unless the string names a server-side target to connect to.
    pub fn require_target(&self) -> SettingsResult<()> {
        if self.builder.contains(SqlKeyword::InitialCatalog)
            || self.builder.contains(SqlKeyword::AttachDbFilename)
            || self.builder.contains(SqlKeyword::DataSource)
        {
            Ok(())
        } else {
            Err(SettingsError::MissingKeyword(SqlKeyword::DataSource.to_string()))
        }
    }
}

impl From<SqlConnectionSetting> for ConnectionSetting {
    fn from(setting: SqlConnectionSetting) -> Self {
        setting.into_setting()
    }
}

impl fmt::Display for SqlConnectionSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.connection_string())
    }
}
