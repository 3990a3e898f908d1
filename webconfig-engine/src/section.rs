//! Typed views over top-level configuration elements
//!
//! A section is a direct child of the document root, e.g.
//!
//! ```xml
//! <configuration>
//!   <connectionStrings>
//!     <clear />
//!     <add name="Main" connectionString="Data Source=db01;..." providerName="System.Data.SqlClient" />
//!   </connectionStrings>
//! </configuration>
//! ```
//!
//! Sections are parsed from and written back to [`xmltree::Element`]s by the
//! [`ConfigurationStore`](crate::store::ConfigurationStore), which also handles
//! the encrypted on-disk layout. The types here only ever see plaintext.

use crate::error::{SectionError, SectionResult};
use connection_settings::ConnectionSetting;
use serde::{Deserialize, Serialize};
use xmltree::{Element, XMLNode};

const ADD_ELEMENT: &str = "add";
const REMOVE_ELEMENT: &str = "remove";
const CLEAR_ELEMENT: &str = "clear";

/// Protection state of a section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInformation {
    protection_provider: Option<String>,
}

impl SectionInformation {
    pub fn is_protected(&self) -> bool {
        self.protection_provider.is_some()
    }

    /// Name of the provider the section is (or will be) encrypted with.
    pub fn protection_provider(&self) -> Option<&str> {
        self.protection_provider.as_deref()
    }

    /// Marks the section for encryption with `provider` on the next save.
    pub fn protect_section(&mut self, provider: impl Into<String>) {
        self.protection_provider = Some(provider.into());
    }

    pub fn unprotect_section(&mut self) {
        self.protection_provider = None;
    }
}

/// A section type the store can read and write.
pub trait ConfigurationSection: Sized {
    /// Parses the plaintext section element.
    fn from_element(element: &Element) -> SectionResult<Self>;

    /// Renders the section as a plaintext element called `name`.
    fn to_element(&self, name: &str) -> Element;

    fn information(&self) -> &SectionInformation;

    fn information_mut(&mut self) -> &mut SectionInformation;
}

/// One `<add>` entry of a `connectionStrings` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStringSettings {
    pub name: String,
    pub connection_string: String,
    pub provider_name: String,
}

impl ConnectionStringSettings {
    pub fn new(
        name: impl Into<String>,
        connection_string: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            connection_string: connection_string.into(),
            provider_name: provider_name.into(),
        }
    }

    pub fn setting(&self) -> ConnectionSetting {
        ConnectionSetting::with_connection_string(&self.provider_name, &self.connection_string)
    }
}

/// One child of a `connectionStrings` section, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStringsItem {
    Add(ConnectionStringSettings),
    /// `<remove name="..."/>`, e.g. hiding an entry inherited from machine.config.
    Remove(String),
    Clear,
    Comment(String),
}

/// The `connectionStrings` section.
///
/// Every child is kept as an ordered [`ConnectionStringsItem`] and written back
/// in place, so `<remove>`, `<clear>` and comments survive a rewrite.
/// [`entries`](Self::entries) is the effective list after applying them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStringsSection {
    items: Vec<ConnectionStringsItem>,
    information: SectionInformation,
}

impl ConnectionStringsSection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ConnectionStringsItem] {
        &self.items
    }

    /// Effective entries in document order.
    pub fn entries(&self) -> impl Iterator<Item = &ConnectionStringSettings> {
        self.items.iter().enumerate().filter_map(move |(index, item)| match item {
            ConnectionStringsItem::Add(entry) if self.is_live(index, &entry.name) => Some(entry),
            _ => None,
        })
    }

    /// Whether the `<add>` at `index` is not overridden by a later child.
    fn is_live(&self, index: usize, name: &str) -> bool {
        !self.items.iter().skip(index + 1).any(|later| match later {
            ConnectionStringsItem::Add(entry) => entry.name == name,
            ConnectionStringsItem::Remove(removed) => removed == name,
            ConnectionStringsItem::Clear => true,
            ConnectionStringsItem::Comment(_) => false,
        })
    }

    pub fn get(&self, name: &str) -> Option<&ConnectionStringSettings> {
        self.entries().find(|entry| entry.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Appends `entry` unless an entry with the same name is in effect.
    /// Returns whether it was added.
    pub fn add(&mut self, entry: ConnectionStringSettings) -> bool {
        if self.contains(&entry.name) {
            return false;
        }
        self.items.push(ConnectionStringsItem::Add(entry));
        true
    }

    /// Drops the `<add>` that defines `name`. Directives are left alone.
    pub fn remove(&mut self, name: &str) -> Option<ConnectionStringSettings> {
        let index = self.items.iter().enumerate().position(|(index, item)| {
            matches!(item, ConnectionStringsItem::Add(entry) if entry.name == name && self.is_live(index, name))
        })?;
        match self.items.remove(index) {
            ConnectionStringsItem::Add(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }
}

fn malformed(section: &str, reason: impl Into<String>) -> SectionError {
    SectionError::Malformed {
        section: section.to_string(),
        reason: reason.into(),
    }
}

fn type_mismatch(section: &str, reason: impl Into<String>) -> SectionError {
    SectionError::TypeMismatch {
        section: section.to_string(),
        reason: reason.into(),
    }
}

fn required_attribute<'a>(section: &str, element: &'a Element, attribute: &str) -> SectionResult<&'a str> {
    element
        .attributes
        .get(attribute)
        .map(String::as_str)
        .ok_or_else(|| malformed(section, format!("<{}> is missing the '{}' attribute", element.name, attribute)))
}

/// Child elements, skipping comments and whitespace. Stray text is an error.
pub(crate) fn child_elements<'a>(section: &str, element: &'a Element) -> SectionResult<Vec<&'a Element>> {
    let mut children = Vec::new();
    for node in &element.children {
        match node {
            XMLNode::Element(child) => children.push(child),
            XMLNode::Text(text) if !text.trim().is_empty() => {
                return Err(type_mismatch(section, format!("unexpected text '{}'", text.trim())));
            }
            _ => {}
        }
    }
    Ok(children)
}

impl ConfigurationSection for ConnectionStringsSection {
    fn from_element(element: &Element) -> SectionResult<Self> {
        let name = element.name.as_str();
        let mut section = Self::new();

        for node in &element.children {
            let child = match node {
                XMLNode::Element(child) => child,
                XMLNode::Comment(comment) => {
                    section.items.push(ConnectionStringsItem::Comment(comment.clone()));
                    continue;
                }
                XMLNode::Text(text) if !text.trim().is_empty() => {
                    return Err(type_mismatch(name, format!("unexpected text '{}'", text.trim())));
                }
                _ => continue,
            };

            let item = match child.name.as_str() {
                ADD_ELEMENT => {
                    let entry = ConnectionStringSettings::new(
                        required_attribute(name, child, "name")?,
                        required_attribute(name, child, "connectionString")?,
                        child.attributes.get("providerName").cloned().unwrap_or_default(),
                    );
                    if section.contains(&entry.name) {
                        return Err(malformed(name, format!("duplicate entry '{}'", entry.name)));
                    }
                    ConnectionStringsItem::Add(entry)
                }
                REMOVE_ELEMENT => ConnectionStringsItem::Remove(required_attribute(name, child, "name")?.to_string()),
                CLEAR_ELEMENT => ConnectionStringsItem::Clear,
                other => {
                    return Err(type_mismatch(name, format!("unexpected element <{}>", other)));
                }
            };
            section.items.push(item);
        }

        Ok(section)
    }

    fn to_element(&self, name: &str) -> Element {
        let mut element = Element::new(name);
        for item in &self.items {
            let node = match item {
                ConnectionStringsItem::Add(entry) => {
                    let mut add = Element::new(ADD_ELEMENT);
                    add.attributes.insert("name".to_string(), entry.name.clone());
                    add.attributes.insert("connectionString".to_string(), entry.connection_string.clone());
                    if !entry.provider_name.is_empty() {
                        add.attributes.insert("providerName".to_string(), entry.provider_name.clone());
                    }
                    XMLNode::Element(add)
                }
                ConnectionStringsItem::Remove(removed) => {
                    let mut remove = Element::new(REMOVE_ELEMENT);
                    remove.attributes.insert("name".to_string(), removed.clone());
                    XMLNode::Element(remove)
                }
                ConnectionStringsItem::Clear => XMLNode::Element(Element::new(CLEAR_ELEMENT)),
                ConnectionStringsItem::Comment(comment) => XMLNode::Comment(comment.clone()),
            };
            element.children.push(node);
        }
        element
    }

    fn information(&self) -> &SectionInformation {
        &self.information
    }

    fn information_mut(&mut self) -> &mut SectionInformation {
        &mut self.information
    }
}

/// The `appSettings` key/value section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSettingsSection {
    settings: Vec<(String, String)>,
    information: SectionInformation,
}

impl AppSettingsSection {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Inserts or replaces the value for `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.settings.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.settings.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.settings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl ConfigurationSection for AppSettingsSection {
    fn from_element(element: &Element) -> SectionResult<Self> {
        let name = element.name.as_str();
        let mut section = Self::default();

        for child in child_elements(name, element)? {
            match child.name.as_str() {
                ADD_ELEMENT => section.set(
                    required_attribute(name, child, "key")?,
                    child.attributes.get("value").cloned().unwrap_or_default(),
                ),
                REMOVE_ELEMENT => {
                    let key = required_attribute(name, child, "key")?;
                    section.settings.retain(|(k, _)| k != key);
                }
                CLEAR_ELEMENT => section.settings.clear(),
                other => {
                    return Err(type_mismatch(name, format!("unexpected element <{}>", other)));
                }
            }
        }

        Ok(section)
    }

    fn to_element(&self, name: &str) -> Element {
        let mut element = Element::new(name);
        for (key, value) in &self.settings {
            let mut add = Element::new(ADD_ELEMENT);
            add.attributes.insert("key".to_string(), key.clone());
            add.attributes.insert("value".to_string(), value.clone());
            element.children.push(XMLNode::Element(add));
        }
        element
    }

    fn information(&self) -> &SectionInformation {
        &self.information
    }

    fn information_mut(&mut self) -> &mut SectionInformation {
        &mut self.information
    }
}
