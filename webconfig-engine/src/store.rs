use crate::error::{ConfigError, ProtectionError, ProtectionResult, Result, SectionError, SectionResult};
use crate::protection::ProtectionProvider;
use crate::section::{child_elements, ConfigurationSection};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use xmltree::{Element, EmitterConfig, XMLNode};

/// Attribute naming the provider of an encrypted section.
pub const PROTECTION_PROVIDER_ATTRIBUTE: &str = "configProtectionProvider";

const ENCRYPTED_DATA: &str = "EncryptedData";
const CIPHER_DATA: &str = "CipherData";
const CIPHER_VALUE: &str = "CipherValue";

/// Reads and parses an XML configuration file.
pub fn load_document(path: &Path) -> Result<Element> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Element::parse(bytes.as_slice()).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Writes `document` to `path` as indented XML.
pub fn write_document(path: &Path, document: &Element) -> Result<()> {
    let mut buffer = Vec::new();
    document
        .write_with_config(&mut buffer, EmitterConfig::new().perform_indent(true))
        .map_err(|e| ConfigError::Serialize(e.to_string()))?;
    fs::write(path, buffer).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn element_to_string(element: &Element) -> Result<String> {
    let mut buffer = Vec::new();
    element
        .write_with_config(&mut buffer, EmitterConfig::new().write_document_declaration(false))
        .map_err(|e| ConfigError::Serialize(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| ConfigError::Serialize(e.to_string()))
}

/// Direct children of `parent` called `name`.
fn sections_named<'a>(parent: &'a Element, name: &str) -> Vec<&'a Element> {
    parent
        .children
        .iter()
        .filter_map(|node| match node {
            XMLNode::Element(element) if element.name == name => Some(element),
            _ => None,
        })
        .collect()
}

/// Removes every direct child of `parent` called `name`, returning how many went.
pub fn remove_sections(parent: &mut Element, name: &str) -> usize {
    let before = parent.children.len();
    parent
        .children
        .retain(|node| !matches!(node, XMLNode::Element(element) if element.name == name));
    before - parent.children.len()
}

/// An open XML configuration file.
///
/// Edits are made to the in-memory document through [`set_section`](Self::set_section)
/// and only reach disk on [`save`](Self::save) or [`save_as`](Self::save_as).
pub struct ConfigurationStore {
    path: PathBuf,
    document: Element,
    modified: bool,
    providers: Vec<Arc<dyn ProtectionProvider>>,
}

impl ConfigurationStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = load_document(&path)?;
        debug!(path = %path.display(), "Opened configuration file");
        Ok(Self {
            path,
            document,
            modified: false,
            providers: Vec::new(),
        })
    }

    pub fn with_protection_provider(mut self, provider: Arc<dyn ProtectionProvider>) -> Self {
        self.add_protection_provider(provider);
        self
    }

    /// Registers `provider`, replacing any provider with the same name.
    pub fn add_protection_provider(&mut self, provider: Arc<dyn ProtectionProvider>) {
        self.providers.retain(|existing| existing.name() != provider.name());
        self.providers.push(provider);
    }

    /// The first registered provider, used when protecting a section.
    pub fn default_protection_provider(&self) -> Option<&str> {
        self.providers.first().map(|provider| provider.name())
    }

    pub fn protection_provider(&self, name: &str) -> ProtectionResult<&Arc<dyn ProtectionProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
            .ok_or_else(|| ProtectionError::ProviderNotRegistered(name.to_string()))
    }

    /// Discards in-memory changes and re-reads the file.
    pub fn reload(&mut self) -> Result<()> {
        self.document = load_document(&self.path)?;
        self.modified = false;
        debug!(path = %self.path.display(), "Reloaded configuration file");
        Ok(())
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn document(&self) -> &Element {
        &self.document
    }

    /// Whether the raw section element carries a protection provider.
    pub fn is_section_protected(&self, name: &str) -> SectionResult<bool> {
        Ok(self
            .section_element(name)?
            .attributes
            .contains_key(PROTECTION_PROVIDER_ATTRIBUTE))
    }

    fn section_element(&self, name: &str) -> SectionResult<&Element> {
        match sections_named(&self.document, name).as_slice() {
            [] => Err(SectionError::NotFound(name.to_string())),
            [element] => Ok(*element),
            _ => Err(SectionError::Malformed {
                section: name.to_string(),
                reason: "section is declared more than once".to_string(),
            }),
        }
    }

    /// Typed lookup of the section called `name`, decrypting it if protected.
    pub fn section<T: ConfigurationSection>(&self, name: &str) -> SectionResult<T> {
        let element = self.section_element(name)?;

        let Some(provider_name) = element.attributes.get(PROTECTION_PROVIDER_ATTRIBUTE) else {
            return T::from_element(element);
        };

        let plaintext = self.unprotect(name, provider_name, element)?;
        let mut section = T::from_element(&plaintext)?;
        section.information_mut().protect_section(provider_name.clone());
        Ok(section)
    }

    fn unprotect(&self, name: &str, provider_name: &str, element: &Element) -> SectionResult<Element> {
        let protection = |source: ProtectionError| SectionError::Protection {
            section: name.to_string(),
            source,
        };

        let children = child_elements(name, element)?;
        let payload = match children.as_slice() {
            [encrypted] if encrypted.name == ENCRYPTED_DATA => encrypted
                .get_child(CIPHER_DATA)
                .and_then(|cipher| cipher.get_child(CIPHER_VALUE))
                .and_then(Element::get_text),
            _ => None,
        }
        .ok_or_else(|| protection(ProtectionError::InvalidFormat))?;

        let provider = self.protection_provider(provider_name).map_err(protection)?;
        let xml = provider.decrypt(&payload).map_err(protection)?;
        let plaintext = Element::parse(xml.as_bytes()).map_err(|e| SectionError::Malformed {
            section: name.to_string(),
            reason: format!("decrypted section is not valid XML: {}", e),
        })?;

        if plaintext.name != name {
            return Err(SectionError::Malformed {
                section: name.to_string(),
                reason: format!("decrypted section is <{}>", plaintext.name),
            });
        }
        Ok(plaintext)
    }

    fn protect(&self, name: &str, provider_name: &str, plaintext: &Element) -> Result<Element> {
        let provider = self.protection_provider(provider_name)?;
        let payload = provider.encrypt(&element_to_string(plaintext)?)?;

        let mut value = Element::new(CIPHER_VALUE);
        value.children.push(XMLNode::Text(payload));
        let mut cipher = Element::new(CIPHER_DATA);
        cipher.children.push(XMLNode::Element(value));
        let mut encrypted = Element::new(ENCRYPTED_DATA);
        encrypted.children.push(XMLNode::Element(cipher));

        let mut element = Element::new(name);
        element
            .attributes
            .insert(PROTECTION_PROVIDER_ATTRIBUTE.to_string(), provider_name.to_string());
        element.children.push(XMLNode::Element(encrypted));
        Ok(element)
    }

    /// Replaces the section called `name` (or appends it), encrypting it when
    /// the section is marked protected.
    pub fn set_section<T: ConfigurationSection>(&mut self, name: &str, section: &T) -> Result<()> {
        let plaintext = section.to_element(name);
        let element = match section.information().protection_provider() {
            Some(provider_name) => self.protect(name, provider_name, &plaintext)?,
            None => plaintext,
        };

        let existing = self
            .document
            .children
            .iter_mut()
            .find(|node| matches!(node, XMLNode::Element(e) if e.name == name));
        match existing {
            Some(node) => *node = XMLNode::Element(element),
            None => self.document.children.push(XMLNode::Element(element)),
        }

        self.modified = true;
        debug!(
            section = name,
            protected = section.information().is_protected(),
            "Updated configuration section"
        );
        Ok(())
    }

    /// Saves in place. Returns whether anything was written.
    pub fn save(&mut self) -> Result<bool> {
        let path = self.path.clone();
        self.save_as(&path)
    }

    /// Writes the document to `path` if it has unsaved changes.
    /// Returns whether a file was produced.
    pub fn save_as(&mut self, path: &Path) -> Result<bool> {
        if !self.modified {
            debug!(path = %path.display(), "No changes to save");
            return Ok(false);
        }
        write_document(path, &self.document)?;
        self.modified = false;
        info!(path = %path.display(), "Saved configuration file");
        Ok(true)
    }
}

impl fmt::Debug for ConfigurationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationStore")
            .field("path", &self.path)
            .field("modified", &self.modified)
            .field("providers", &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
