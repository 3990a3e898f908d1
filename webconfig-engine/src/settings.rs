use crate::error::{ProtectionError, Result};
use crate::files::temp_path_for;
use crate::protection::{AesGcmProtectionProvider, ProtectionProvider, AES_GCM_PROVIDER_NAME};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable prefix, e.g. `WEBCONFIG_CONFIG_PATH`.
pub const ENV_PREFIX: &str = "WEBCONFIG";

/// Where the manager reads and writes, and how it protects sections.
///
/// Loaded from defaults, then an optional settings file (format picked by
/// extension), then `WEBCONFIG_*` environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct ManagerSettings {
    /// The XML configuration file to manage.
    pub config_path: PathBuf,
    /// Directory for the temporary copy written before replacing the file.
    pub temp_dir: PathBuf,
    /// Base64-encoded 32-byte AES key. Protection is unavailable without it.
    #[serde(default)]
    pub protection_key: Option<String>,
    /// Provider name written to protected sections.
    pub protection_provider: String,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("Web.config"),
            temp_dir: std::env::temp_dir(),
            protection_key: None,
            protection_provider: AES_GCM_PROVIDER_NAME.to_string(),
        }
    }
}

impl ManagerSettings {
    pub fn load(settings_file: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("config_path", defaults.config_path.to_string_lossy().into_owned())?
            .set_default("temp_dir", defaults.temp_dir.to_string_lossy().into_owned())?
            .set_default("protection_provider", defaults.protection_provider)?;

        if let Some(path) = settings_file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(false))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_protection_key(mut self, key: impl Into<String>) -> Self {
        self.protection_key = Some(key.into());
        self
    }

    /// Temporary path used for safe saves: the config file name inside `temp_dir`.
    pub fn temp_path(&self) -> PathBuf {
        temp_path_for(&self.config_path, &self.temp_dir)
    }

    /// Builds the configured protection provider, if a key is set.
    pub fn protection(&self) -> Result<Option<Arc<dyn ProtectionProvider>>> {
        let Some(key) = self.protection_key.as_deref() else {
            return Ok(None);
        };
        if self.protection_provider.trim().is_empty() {
            return Err(ProtectionError::NoProvider.into());
        }
        let provider = AesGcmProtectionProvider::from_base64(key)?.with_name(self.protection_provider.clone());
        Ok(Some(Arc::new(provider)))
    }
}

impl fmt::Debug for ManagerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerSettings")
            .field("config_path", &self.config_path)
            .field("temp_dir", &self.temp_dir)
            .field("protection_key", &self.protection_key.as_ref().map(|_| "******"))
            .field("protection_provider", &self.protection_provider)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let settings = ManagerSettings::default();
        assert_eq!(settings.config_path, PathBuf::from("Web.config"));
        assert_eq!(settings.protection_provider, AES_GCM_PROVIDER_NAME);
        assert!(settings.protection().unwrap().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let key = AesGcmProtectionProvider::generate_key_base64();
        let path = dir.path().join("connstr.toml");
        fs::write(
            &path,
            format!(
                "config_path = \"site/Web.config\"\ntemp_dir = \"{}\"\nprotection_key = \"{}\"\n",
                dir.path().display().to_string().replace('\\', "\\\\"),
                key
            ),
        )
        .unwrap();

        let settings = ManagerSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.config_path, PathBuf::from("site/Web.config"));
        assert_eq!(settings.temp_path(), dir.path().join("Web.config"));
        let provider = settings.protection().unwrap().unwrap();
        assert_eq!(provider.name(), AES_GCM_PROVIDER_NAME);
    }

    #[test]
    fn test_missing_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ManagerSettings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_bad_key_is_reported() {
        let settings = ManagerSettings::default().with_protection_key("short");
        assert!(settings.protection().is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let settings = ManagerSettings::default().with_protection_key("c2VjcmV0");
        assert!(!format!("{:?}", settings).contains("c2VjcmV0"));
    }
}
