use base64::{engine::general_purpose, Engine as _};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

#[allow(clippy::expect_used)]
mod patterns {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        // Values may be bare, "double-quoted" or 'single-quoted' with doubled quotes as escapes.
        pub(super) static ref PASSWORD_REGEX: Regex = Regex::new(
            r#"(?i)(?P<key>\b(?:password|pwd)\s*=\s*)(?P<value>"(?:[^"]|"")*"|'(?:[^']|'')*'|[^;"']*)"#
        )
        .expect("password pattern is valid");
        pub(super) static ref USER_ID_REGEX: Regex = Regex::new(
            r#"(?i)(?P<key>\b(?:user id|uid|user)\s*=\s*)(?P<value>"(?:[^"]|"")*"|'(?:[^']|'')*'|[^;"']*)"#
        )
        .expect("user id pattern is valid");
    }
}

use patterns::{PASSWORD_REGEX, USER_ID_REGEX};

/// Redaction configuration for connection strings
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_passwords: bool,
    pub redact_user_ids: bool,
    /// Replace secrets with a short hash so equal values can be correlated across log lines
    pub hash_for_correlation: bool,
    pub mask: String,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_passwords: true,
            redact_user_ids: false,
            hash_for_correlation: false,
            mask: "******".to_string(),
        }
    }
}

impl RedactionConfig {
    pub fn with_user_ids(mut self, enabled: bool) -> Self {
        self.redact_user_ids = enabled;
        self
    }

    pub fn with_hash_for_correlation(mut self, enabled: bool) -> Self {
        self.hash_for_correlation = enabled;
        self
    }

    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = mask.into();
        self
    }
}

/// Masks credentials inside ADO.NET style connection strings, including the
/// provider connection string nested in an entity connection string.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStringRedactor {
    config: RedactionConfig,
}

impl ConnectionStringRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.redact_passwords {
            result = self.redact_with(&PASSWORD_REGEX, &result, "SECRET");
        }

        if self.config.redact_user_ids {
            result = self.redact_with(&USER_ID_REGEX, &result, "USER");
        }

        result
    }

    fn redact_with(&self, pattern: &Regex, text: &str, label: &str) -> String {
        pattern
            .replace_all(text, |caps: &Captures| {
                let key = caps.name("key").map_or("", |m| m.as_str());
                let value = caps.name("value").map_or("", |m| m.as_str());
                if value.is_empty() {
                    return key.to_string();
                }
                if self.config.hash_for_correlation {
                    format!("{}{}[{}]", key, label, self.hash_value(value))
                } else {
                    format!("{}{}", key, self.config.mask)
                }
            })
            .to_string()
    }

    fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        general_purpose::STANDARD_NO_PAD.encode(&result[..6])
    }
}

/// Redacts passwords with the default configuration.
pub fn redact_connection_string(connection_string: &str) -> String {
    ConnectionStringRedactor::default().redact(connection_string)
}
