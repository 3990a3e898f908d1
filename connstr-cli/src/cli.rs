use clap::{Args, Parser, Subcommand};
use connection_settings::{SqlConnectionParameters, SQL_CLIENT_PROVIDER};
use std::path::PathBuf;

/// Build, test and store connection strings
#[derive(Parser, Debug)]
#[command(name = "connstr", version)]
#[command(about = "Build, test and store connection strings in XML configuration files")]
pub struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "CONNSTR_SETTINGS")]
    pub config: Option<PathBuf>,

    /// Configuration file to manage, overrides the settings file
    #[arg(short = 'w', long, global = true)]
    pub web_config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a SQL Server connection string
    BuildSql(SqlArgs),

    /// Print an Entity Framework connection string
    BuildEntity {
        /// Model name used for the metadata resources
        #[arg(long)]
        model: String,

        /// Provider of the wrapped connection string
        #[arg(long, default_value = SQL_CLIENT_PROVIDER)]
        model_provider: String,

        #[command(flatten)]
        sql: SqlArgs,
    },

    /// Open and close a connection; exits non-zero on failure
    Test {
        /// Provider invariant name
        #[arg(short, long, default_value = SQL_CLIENT_PROVIDER)]
        provider: String,

        connection_string: String,
    },

    /// Add connection strings that are not already in the file
    Add {
        /// Entry as NAME=CONNECTION_STRING (repeatable)
        #[arg(short, long = "entry", value_name = "NAME=CONNECTION_STRING", required = true, value_parser = parse_entry)]
        entries: Vec<(String, String)>,

        /// Provider name recorded for the new entries
        #[arg(short, long, default_value = SQL_CLIENT_PROVIDER)]
        provider: String,

        /// Protection state to leave the section in; unchanged when omitted
        #[arg(long)]
        encrypt: Option<bool>,
    },

    /// Encrypt the connectionStrings section
    Encrypt,

    /// Decrypt the connectionStrings section
    Decrypt,

    /// List entries with passwords masked
    List,

    /// Print a new base64 protection key
    GenerateKey,
}

#[derive(Args, Debug, Clone)]
pub struct SqlArgs {
    /// Server name; empty or "(local)" means the local default instance
    #[arg(short, long, default_value = "")]
    pub server: String,

    /// Database name, or a path / .mdf file to attach
    #[arg(short, long)]
    pub database: String,

    #[arg(short, long, default_value = "")]
    pub username: String,

    #[arg(short, long, default_value = "", env = "CONNSTR_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long)]
    pub multiple_active_result_sets: Option<bool>,

    #[arg(long)]
    pub integrated_security: Option<bool>,

    #[arg(long)]
    pub persist_security_info: Option<bool>,

    #[arg(long)]
    pub application_name: Option<String>,
}

impl From<&SqlArgs> for SqlConnectionParameters {
    fn from(args: &SqlArgs) -> Self {
        Self {
            server: args.server.clone(),
            database: args.database.clone(),
            username: args.username.clone(),
            password: args.password.clone(),
            multiple_active_result_sets: args.multiple_active_result_sets,
            integrated_security: args.integrated_security,
            persist_security_info: args.persist_security_info,
            application_name: args.application_name.clone(),
        }
    }
}

/// Splits `NAME=CONNECTION_STRING` at the first `=`.
pub fn parse_entry(raw: &str) -> Result<(String, String), String> {
    let (name, connection_string) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=CONNECTION_STRING, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("entry name must not be empty".to_string());
    }
    Ok((name.to_string(), connection_string.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_sql() {
        let cli = Cli::try_parse_from([
            "connstr",
            "build-sql",
            "--server",
            "db01",
            "--database",
            "Sales",
            "--integrated-security",
            "false",
        ])
        .unwrap();
        let Command::BuildSql(args) = cli.command else {
            panic!("expected build-sql");
        };
        let parameters = SqlConnectionParameters::from(&args);
        assert_eq!(parameters.server, "db01");
        assert_eq!(parameters.integrated_security, Some(false));
        assert_eq!(parameters.multiple_active_result_sets, None);
    }

    #[test]
    fn test_parse_add_entries() {
        let cli = Cli::try_parse_from([
            "connstr",
            "--web-config",
            "site/Web.config",
            "add",
            "-e",
            "Main=Data Source=db01;Initial Catalog=Sales",
            "--entry",
            "Audit=Data Source=db02",
            "--encrypt",
            "true",
        ])
        .unwrap();
        assert_eq!(cli.web_config, Some(PathBuf::from("site/Web.config")));
        let Command::Add { entries, encrypt, provider } = cli.command else {
            panic!("expected add");
        };
        assert_eq!(entries[0], ("Main".to_string(), "Data Source=db01;Initial Catalog=Sales".to_string()));
        assert_eq!(entries.len(), 2);
        assert_eq!(encrypt, Some(true));
        assert_eq!(provider, SQL_CLIENT_PROVIDER);
    }

    #[test]
    fn test_add_requires_entries() {
        assert!(Cli::try_parse_from(["connstr", "add"]).is_err());
        assert!(Cli::try_parse_from(["connstr", "add", "--entry", "missing-separator"]).is_err());
    }

    #[test]
    fn test_parse_entry() {
        assert_eq!(parse_entry("A=x=y").unwrap(), ("A".to_string(), "x=y".to_string()));
        assert!(parse_entry("=x").is_err());
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
