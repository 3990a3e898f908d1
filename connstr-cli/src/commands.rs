use crate::cli::{Cli, Command, SqlArgs};
use anyhow::{Context, Result};
use colored::Colorize;
use connection_settings::{
    ConnectionSetting, ConnectivityTestable, EntityConnectionSetting, SqlConnectionParameters, SqlConnectionSetting,
};
use logger_redacted::redact_connection_string;
use std::io::Write;
use tracing::{debug, info};
use webconfig_engine::{
    AesGcmProtectionProvider, ConfigError, ManagerSettings, SectionError, WebConfigConnectionStringManager,
};

/// Runs `cli.command`, writing its output to `out`.
///
/// Returns `Ok(false)` when the command ran but reported a failure (a failed
/// connectivity test), so the caller can pick the exit code.
pub async fn execute(cli: &Cli, out: &mut impl Write) -> Result<bool> {
    match &cli.command {
        Command::BuildSql(args) => {
            writeln!(out, "{}", build_sql(args).connection_string())?;
            Ok(true)
        }
        Command::BuildEntity {
            model,
            model_provider,
            sql,
        } => {
            let entity = EntityConnectionSetting::new(model.as_str(), model_provider, &SqlConnectionParameters::from(sql));
            writeln!(out, "{}", entity.connection_string())?;
            Ok(true)
        }
        Command::Test {
            provider,
            connection_string,
        } => test_connection(provider, connection_string, out).await,
        Command::Add {
            entries,
            provider,
            encrypt,
        } => {
            let mut manager = open_manager(cli)?;
            add_entries(&mut manager, entries, provider, *encrypt, out)?;
            Ok(true)
        }
        Command::Encrypt => {
            let mut manager = open_manager(cli)?;
            toggle_protection(&mut manager, true, out)?;
            Ok(true)
        }
        Command::Decrypt => {
            let mut manager = open_manager(cli)?;
            toggle_protection(&mut manager, false, out)?;
            Ok(true)
        }
        Command::List => {
            let manager = open_manager(cli)?;
            list_entries(&manager, out)?;
            Ok(true)
        }
        Command::GenerateKey => {
            writeln!(out, "{}", AesGcmProtectionProvider::generate_key_base64())?;
            Ok(true)
        }
    }
}

/// Settings from the settings file and environment, with `--web-config` on top.
pub fn resolve_settings(cli: &Cli) -> Result<ManagerSettings> {
    let mut settings = ManagerSettings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(path) = &cli.web_config {
        settings = settings.with_config_path(path);
    }
    debug!(settings = ?settings, "Resolved settings");
    Ok(settings)
}

fn open_manager(cli: &Cli) -> Result<WebConfigConnectionStringManager> {
    let settings = resolve_settings(cli)?;
    WebConfigConnectionStringManager::from_settings(&settings)
        .with_context(|| format!("Failed to open {}", settings.config_path.display()))
}

fn build_sql(args: &SqlArgs) -> SqlConnectionSetting {
    SqlConnectionSetting::new(&SqlConnectionParameters::from(args))
}

async fn test_connection(provider: &str, connection_string: &str, out: &mut impl Write) -> Result<bool> {
    let setting = ConnectionSetting::with_connection_string(provider, connection_string);
    info!(connection_string = %redact_connection_string(connection_string), provider, "Testing connection");

    match setting.check_connectivity().await {
        Ok(()) => {
            writeln!(out, "{} Connection succeeded", "✓".green())?;
            Ok(true)
        }
        Err(e) => {
            writeln!(out, "{} Connection failed ({}): {}", "✗".red(), e.kind(), e)?;
            Ok(false)
        }
    }
}

fn add_entries(
    manager: &mut WebConfigConnectionStringManager,
    entries: &[(String, String)],
    provider: &str,
    encrypt: Option<bool>,
    out: &mut impl Write,
) -> Result<()> {
    let encrypt = match encrypt {
        Some(encrypt) => encrypt,
        None => current_protection(manager)?,
    };

    let settings: Vec<(&str, ConnectionSetting)> = entries
        .iter()
        .map(|(name, connection_string)| {
            (name.as_str(), ConnectionSetting::with_connection_string(provider, connection_string))
        })
        .collect();

    let outcome = manager
        .set_connection_strings(settings.iter().map(|(name, setting)| (*name, setting)), encrypt)
        .context("Failed to update connection strings")?;

    let skipped = entries.len().saturating_sub(outcome.added);
    writeln!(
        out,
        "Added {} connection string(s), {} already present",
        outcome.added.to_string().green(),
        skipped
    )?;
    if outcome.encryption_changed {
        writeln!(out, "Section is now {}", protection_label(encrypt))?;
    }
    Ok(())
}

/// Protection state of the section, treating a missing section as unprotected.
fn current_protection(manager: &WebConfigConnectionStringManager) -> Result<bool> {
    match manager.is_protected() {
        Ok(protected) => Ok(protected),
        Err(ConfigError::Section(SectionError::NotFound(_))) => Ok(false),
        Err(e) => Err(e).context("Failed to read the protection state"),
    }
}

fn toggle_protection(manager: &mut WebConfigConnectionStringManager, encrypt: bool, out: &mut impl Write) -> Result<()> {
    let changed = manager
        .encrypt_connection_strings(encrypt)
        .context("Failed to change connection string protection")?;
    if changed {
        writeln!(out, "{} Section is now {}", "✓".green(), protection_label(encrypt))?;
    } else {
        writeln!(out, "Section is already {}", protection_label(encrypt))?;
    }
    Ok(())
}

fn list_entries(manager: &WebConfigConnectionStringManager, out: &mut impl Write) -> Result<()> {
    let entries = manager.connection_strings().context("Failed to read connection strings")?;
    if entries.is_empty() {
        writeln!(out, "No connection strings")?;
        return Ok(());
    }
    for entry in entries {
        writeln!(
            out,
            "{}\t{}\t{}",
            entry.name.bold(),
            entry.provider_name,
            redact_connection_string(&entry.connection_string)
        )?;
    }
    Ok(())
}

fn protection_label(encrypt: bool) -> &'static str {
    if encrypt {
        "encrypted"
    } else {
        "decrypted"
    }
}
