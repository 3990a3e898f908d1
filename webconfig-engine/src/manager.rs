use crate::error::{ConfigError, ProtectionError, Result, SectionError, SectionResult};
use crate::files::{replace_file, temp_path_for};
use crate::section::{ConfigurationSection, ConnectionStringSettings, ConnectionStringsSection};
use crate::settings::ManagerSettings;
use crate::store::{load_document, remove_sections, write_document, ConfigurationStore};
use connection_settings::ConnectionSetting;
use logger_redacted::redact_connection_string;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use xmltree::{Element, XMLNode};

pub const CONNECTION_STRINGS_SECTION: &str = "connectionStrings";

/// What [`WebConfigConnectionStringManager::set_connection_strings`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Entries appended to the section.
    pub added: usize,
    /// Whether the section's protection state was toggled.
    pub encryption_changed: bool,
}

impl MergeOutcome {
    pub fn is_modified(&self) -> bool {
        self.added > 0 || self.encryption_changed
    }
}

/// Manages the `connectionStrings` section of one configuration file.
///
/// Saves go through a temporary copy that is then moved over the real file,
/// so a target that cannot be opened for writing can still be replaced.
#[derive(Debug)]
pub struct WebConfigConnectionStringManager {
    store: ConfigurationStore,
    temp_path: PathBuf,
}

impl WebConfigConnectionStringManager {
    /// Wraps an open store. Temporary copies go to `temp_dir` under the
    /// store's file name, see [`temp_path_for`].
    pub fn new(store: ConfigurationStore, temp_dir: impl AsRef<Path>) -> Self {
        let temp_path = temp_path_for(store.file_path(), temp_dir.as_ref());
        Self { store, temp_path }
    }

    pub fn from_settings(settings: &ManagerSettings) -> Result<Self> {
        let mut store = ConfigurationStore::open(&settings.config_path)?;
        if let Some(provider) = settings.protection()? {
            store.add_protection_provider(provider);
        }
        info!(
            path = %settings.config_path.display(),
            protection = store.default_protection_provider().unwrap_or("none"),
            "Opened configuration for connection string management"
        );
        Ok(Self {
            store,
            temp_path: settings.temp_path(),
        })
    }

    pub fn store(&self) -> &ConfigurationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigurationStore {
        &mut self.store
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Re-reads the file, dropping unsaved changes.
    pub fn reload(&mut self) -> Result<()> {
        self.store.reload()
    }

    /// Typed section lookup that says why it failed.
    pub fn try_get_configuration_section<T: ConfigurationSection>(&self, name: &str) -> SectionResult<T> {
        self.store.section(name)
    }

    /// Typed section lookup; `None` when the section is missing or unusable.
    pub fn get_configuration_section<T: ConfigurationSection>(&self, name: &str) -> Option<T> {
        match self.store.section(name) {
            Ok(section) => Some(section),
            Err(e) => {
                debug!(section = name, "Configuration section unavailable: {}", e);
                None
            }
        }
    }

    /// Current entries, decrypted if the section is protected. A missing
    /// section has no entries.
    pub fn connection_strings(&self) -> Result<Vec<ConnectionStringSettings>> {
        match self.store.section::<ConnectionStringsSection>(CONNECTION_STRINGS_SECTION) {
            Ok(section) => Ok(section.entries().cloned().collect()),
            Err(SectionError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_protected(&self) -> Result<bool> {
        Ok(self.store.is_section_protected(CONNECTION_STRINGS_SECTION)?)
    }

    /// Adds every entry whose name is not already present, then applies the
    /// requested protection state. Existing entries are never changed or
    /// removed. Saves when anything changed.
    pub fn set_connection_strings<'a, I, K>(&mut self, connection_strings: I, encrypt: bool) -> Result<MergeOutcome>
    where
        I: IntoIterator<Item = (K, &'a ConnectionSetting)>,
        K: AsRef<str>,
    {
        let mut section = self.connection_strings_section()?;

        let existing: BTreeMap<String, String> = section
            .entries()
            .map(|entry| (entry.name.clone(), entry.connection_string.clone()))
            .collect();

        let mut added = 0;
        for (name, setting) in connection_strings {
            let name = name.as_ref();
            let connection_string = setting.connection_string.replace("&quot;", "\"");

            if let Some(current) = existing.get(name) {
                if *current != connection_string {
                    debug!(name, "Connection string differs from the file, keeping the existing value");
                }
                continue;
            }

            if section.add(ConnectionStringSettings::new(name, connection_string.as_str(), setting.provider.as_str())) {
                debug!(
                    name,
                    provider = %setting.provider,
                    connection_string = %redact_connection_string(&connection_string),
                    "Adding connection string"
                );
                added += 1;
            }
        }

        if added > 0 {
            self.store.set_section(CONNECTION_STRINGS_SECTION, &section)?;
        }

        let encryption_changed = self.encrypt_connection_strings(encrypt)?;
        if added > 0 && !encryption_changed {
            self.save(true)?;
        }

        let outcome = MergeOutcome {
            added,
            encryption_changed,
        };
        info!(added, encryption_changed, "Merged connection strings");
        Ok(outcome)
    }

    /// Protects or unprotects the section. Returns `false` when it is
    /// already in the requested state, `true` after a saved and verified
    /// change.
    pub fn encrypt_connection_strings(&mut self, encrypt: bool) -> Result<bool> {
        let mut section: ConnectionStringsSection = self.store.section(CONNECTION_STRINGS_SECTION)?;
        if section.information().is_protected() == encrypt {
            debug!(encrypt, "Connection strings already in the requested protection state");
            return Ok(false);
        }

        if encrypt {
            let provider = self
                .store
                .default_protection_provider()
                .ok_or(ProtectionError::NoProvider)?
                .to_string();
            section.information_mut().protect_section(provider);
        } else {
            section.information_mut().unprotect_section();
        }

        self.store.set_section(CONNECTION_STRINGS_SECTION, &section)?;
        self.save(true)?;

        self.store.reload()?;
        let protected = self.store.is_section_protected(CONNECTION_STRINGS_SECTION)?;
        verify_protection(CONNECTION_STRINGS_SECTION, encrypt, protected)?;

        info!(encrypt, "Connection strings protection changed");
        Ok(true)
    }

    /// Writes pending changes. With `delete_file_if_write_access_denied` the
    /// document is saved to the temporary path and moved over the target;
    /// otherwise it is saved in place. Returns whether anything was written.
    pub fn save(&mut self, delete_file_if_write_access_denied: bool) -> Result<bool> {
        if !self.store.is_modified() {
            debug!("No changes to save");
            return Ok(false);
        }
        if !delete_file_if_write_access_denied {
            return self.store.save();
        }

        self.remove_stale_temp()?;
        if !self.store.save_as(&self.temp_path)? {
            return Ok(false);
        }
        self.move_temp_over_target()
    }

    fn remove_stale_temp(&self) -> Result<()> {
        if self.temp_path == self.store.file_path() {
            return Err(ConfigError::Write {
                path: self.temp_path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "temporary path is the configuration file"),
            });
        }
        match fs::remove_file(&self.temp_path) {
            Ok(()) => {
                debug!(path = %self.temp_path.display(), "Removed stale temporary file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ConfigError::Write {
                path: self.temp_path.clone(),
                source,
            }),
        }
    }

    fn move_temp_over_target(&self) -> Result<bool> {
        let target = self.store.file_path();
        replace_file(&self.temp_path, target).map_err(|source| ConfigError::Write {
            path: target.to_path_buf(),
            source,
        })
    }

    /// Fetches the section, recreating it first when the file has none.
    fn connection_strings_section(&mut self) -> Result<ConnectionStringsSection> {
        match self.store.section(CONNECTION_STRINGS_SECTION) {
            Ok(section) => Ok(section),
            Err(SectionError::NotFound(_)) => {
                self.repair_connection_strings_section()?;
                Ok(self.store.section(CONNECTION_STRINGS_SECTION)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrites the file from disk with a single empty `connectionStrings`
    /// element, then reloads the store.
    fn repair_connection_strings_section(&mut self) -> Result<()> {
        let path = self.store.file_path().to_path_buf();
        let mut document = load_document(&path)?;
        let removed = remove_sections(&mut document, CONNECTION_STRINGS_SECTION);
        document
            .children
            .push(XMLNode::Element(Element::new(CONNECTION_STRINGS_SECTION)));

        self.remove_stale_temp()?;
        write_document(&self.temp_path, &document)?;
        self.move_temp_over_target()?;
        self.store.reload()?;

        warn!(path = %path.display(), removed, "Recreated missing connectionStrings section");
        Ok(())
    }
}

/// Fails unless the section ended up in the requested protection state.
pub(crate) fn verify_protection(section: &str, expected_protected: bool, protected: bool) -> Result<()> {
    if expected_protected == protected {
        return Ok(());
    }
    Err(ConfigError::EncryptionVerification {
        section: section.to_string(),
        expected_protected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_protection() {
        assert!(verify_protection(CONNECTION_STRINGS_SECTION, true, true).is_ok());
        assert!(verify_protection(CONNECTION_STRINGS_SECTION, false, false).is_ok());

        let err = verify_protection(CONNECTION_STRINGS_SECTION, true, false).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EncryptionVerification {
                expected_protected: true,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Configuration Encryption Failed: expected section 'connectionStrings' to be protected"
        );
    }

    #[test]
    fn test_merge_outcome() {
        assert!(!MergeOutcome::default().is_modified());
        assert!(MergeOutcome { added: 1, encryption_changed: false }.is_modified());
        assert!(MergeOutcome { added: 0, encryption_changed: true }.is_modified());
    }
}
