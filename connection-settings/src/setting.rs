// Provider + connection string value object
use crate::error::{SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider invariant name of the classic SQL Server client.
pub const SQL_CLIENT_PROVIDER: &str = "System.Data.SqlClient";
/// Provider invariant name of the newer SQL Server client; treated the same as [`SQL_CLIENT_PROVIDER`].
pub const MICROSOFT_SQL_CLIENT_PROVIDER: &str = "Microsoft.Data.SqlClient";
/// Provider invariant name of the Entity Framework client.
pub const ENTITY_CLIENT_PROVIDER: &str = "System.Data.EntityClient";

/// Which client interprets a connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Sql,
    Entity,
    Other,
}

impl ProviderKind {
    pub fn of(provider: &str) -> Self {
        let provider = provider.trim();
        if provider.eq_ignore_ascii_case(SQL_CLIENT_PROVIDER)
            || provider.eq_ignore_ascii_case(MICROSOFT_SQL_CLIENT_PROVIDER)
        {
            Self::Sql
        } else if provider.eq_ignore_ascii_case(ENTITY_CLIENT_PROVIDER) {
            Self::Entity
        } else {
            Self::Other
        }
    }
}

/// A provider name and the connection string it interprets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSetting {
    pub provider: String,
    pub connection_string: String,
}

impl ConnectionSetting {
    /// A setting with a provider and no connection string yet.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            connection_string: String::new(),
        }
    }

    pub fn with_connection_string(provider: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            connection_string: connection_string.into(),
        }
    }

    /// Builds the connection string by substituting `args` into the `{0}`,
    /// `{1}`, etc. placeholders of `template`. Arguments are inserted verbatim.
    pub fn from_template<S: AsRef<str>>(
        provider: impl Into<String>,
        template: &str,
        args: &[S],
    ) -> SettingsResult<Self> {
        Ok(Self::with_connection_string(provider, format_template(template, args)?))
    }

    pub fn provider_kind(&self) -> ProviderKind {
        ProviderKind::of(&self.provider)
    }
}

impl fmt::Display for ConnectionSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", logger_redacted::redact_connection_string(&self.connection_string), self.provider)
    }
}

/// Positional `{n}` substitution; `{{` and `}}` produce literal braces.
pub fn format_template<S: AsRef<str>>(template: &str, args: &[S]) -> SettingsResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut index = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(d) if d.is_ascii_digit() => index.push(d),
                        Some(other) => {
                            return Err(SettingsError::Template(format!(
                                "unexpected '{}' inside placeholder",
                                other
                            )))
                        }
                        None => return Err(SettingsError::Template("unclosed placeholder".to_string())),
                    }
                }
                let position: usize = index
                    .parse()
                    .map_err(|_| SettingsError::Template("empty placeholder".to_string()))?;
                let arg = args.get(position).ok_or_else(|| {
                    SettingsError::Template(format!(
                        "placeholder {{{}}} has no argument ({} supplied)",
                        position,
                        args.len()
                    ))
                })?;
                out.push_str(arg.as_ref());
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(SettingsError::Template("unmatched '}'".to_string())),
            other => out.push(other),
        }
    }

    Ok(out)
}
