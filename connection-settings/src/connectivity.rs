// Connectivity checks: open a connection, close it, report why it failed
use crate::entity::{model_from_metadata, EntityConnectionSetting};
use crate::error::{ConnectivityError, ConnectivityResult};
use crate::setting::{ConnectionSetting, ProviderKind};
use crate::sql::{is_local_server, SqlConnectionSetting, SqlConnectionStringBuilder, SqlKeyword};
use async_trait::async_trait;
use logger_redacted::redact_connection_string;
use std::time::Duration;
use tiberius::{error::Error as TdsError, Client, Config, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;
use tracing::{debug, info, warn};

/// Connect timeout used when the connection string does not set one.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// SQL Server error number for "Login failed for user".
const LOGIN_FAILED: u32 = 18456;

/// Something whose connection string can be checked against a live server.
///
/// Each connection setting variant implements this with its own client, so
/// the right check runs no matter which reference type the caller holds.
#[async_trait]
pub trait ConnectivityTestable: Send + Sync {
    /// Opens and closes a connection, reporting the failure kind.
    async fn check_connectivity(&self) -> ConnectivityResult<()>;

    /// Boolean view of [`check_connectivity`](Self::check_connectivity):
    /// every failure kind becomes `false`.
    async fn test(&self) -> bool {
        match self.check_connectivity().await {
            Ok(()) => true,
            Err(e) => {
                debug!(kind = e.kind(), "Connectivity test failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl ConnectivityTestable for SqlConnectionSetting {
    async fn check_connectivity(&self) -> ConnectivityResult<()> {
        probe_sql_server(self.builder()).await
    }
}

#[async_trait]
impl ConnectivityTestable for EntityConnectionSetting {
    async fn check_connectivity(&self) -> ConnectivityResult<()> {
        model_from_metadata(self.metadata())?;
        if ProviderKind::of(self.model_provider()) != ProviderKind::Sql {
            return Err(ConnectivityError::UnsupportedProvider(self.model_provider().to_string()));
        }
        let sql = self.sql_setting()?;
        probe_sql_server(sql.builder()).await
    }
}

#[async_trait]
impl ConnectivityTestable for ConnectionSetting {
    async fn check_connectivity(&self) -> ConnectivityResult<()> {
        match self.provider_kind() {
            ProviderKind::Sql => SqlConnectionSetting::parse(&self.connection_string)?.check_connectivity().await,
            ProviderKind::Entity => {
                EntityConnectionSetting::parse(&self.connection_string)?
                    .check_connectivity()
                    .await
            }
            ProviderKind::Other => Err(ConnectivityError::UnsupportedProvider(self.provider.clone())),
        }
    }
}

/// Reads `Connect Timeout` (seconds), falling back to [`DEFAULT_CONNECT_TIMEOUT`].
pub fn connect_timeout(builder: &SqlConnectionStringBuilder) -> ConnectivityResult<Duration> {
    match builder.get(SqlKeyword::ConnectTimeout) {
        None => Ok(DEFAULT_CONNECT_TIMEOUT),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(|secs| if secs == 0 { DEFAULT_CONNECT_TIMEOUT } else { Duration::from_secs(secs) })
            .map_err(|_| ConnectivityError::Malformed(format!("invalid Connect Timeout '{}'", value))),
    }
}

/// Rewrites the parts of a connection string the TDS client does not understand.
fn client_connection_string(builder: &SqlConnectionStringBuilder) -> String {
    let mut builder = builder.clone();
    let local = builder.get(SqlKeyword::DataSource).map_or(true, is_local_server);
    if local {
        builder.set(SqlKeyword::DataSource, "localhost");
    }
    builder.to_string()
}

/// Opens a TDS session against the server named by `builder` and closes it again.
pub async fn probe_sql_server(builder: &SqlConnectionStringBuilder) -> ConnectivityResult<()> {
    let timeout = connect_timeout(builder)?;
    let connection_string = client_connection_string(builder);
    let config = Config::from_ado_string(&connection_string)
        .map_err(|e| ConnectivityError::Malformed(e.to_string()))?;

    debug!(
        address = %config.get_addr(),
        timeout_secs = timeout.as_secs(),
        connection_string = %redact_connection_string(&connection_string),
        "Testing SQL Server connectivity"
    );

    match tokio::time::timeout(timeout, open_and_close(config)).await {
        Ok(Ok(())) => {
            info!("SQL Server connectivity test succeeded");
            Ok(())
        }
        Ok(Err(e)) => {
            warn!(kind = e.kind(), "SQL Server connectivity test failed: {}", e);
            Err(e)
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "SQL Server connectivity test timed out");
            Err(ConnectivityError::Timeout(timeout))
        }
    }
}

async fn open_and_close(config: Config) -> ConnectivityResult<()> {
    let tcp = TcpStream::connect_named(&config).await.map_err(classify)?;
    tcp.set_nodelay(true)
        .map_err(|e| ConnectivityError::Unreachable(e.to_string()))?;

    let client = Client::connect(config, tcp.compat_write()).await.map_err(classify)?;
    client.close().await.map_err(classify)
}

fn classify(error: TdsError) -> ConnectivityError {
    match error {
        TdsError::Io { message, .. } => ConnectivityError::Unreachable(message),
        TdsError::Tls(message) => ConnectivityError::Unreachable(message),
        TdsError::Routing { host, port } => {
            ConnectivityError::Unreachable(format!("server redirected the connection to {}:{}", host, port))
        }
        TdsError::Server(token) if token.code() == LOGIN_FAILED => {
            ConnectivityError::AuthFailed(token.message().to_string())
        }
        TdsError::Server(token) => ConnectivityError::Server(token.message().to_string()),
        TdsError::Conversion(message) | TdsError::Protocol(message) | TdsError::Encoding(message) => {
            ConnectivityError::Server(message.to_string())
        }
        other => ConnectivityError::Server(other.to_string()),
    }
}
