//! `[Content_Types].xml`: extension defaults and per-part overrides.

use crate::error::{Error, Result};
use crate::xml::{Element, XmlDocument};

use super::constants::namespace;
use super::packuri;

/// Content type map for looking up content types by part name or extension.
///
/// Both lists keep document order so writing the registry back produces a
/// stable part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypeRegistry {
    /// (lower-cased extension, content type)
    defaults: Vec<(String, String)>,
    /// (`/`-prefixed part name, content type)
    overrides: Vec<(String, String)>,
}

impl ContentTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let doc = XmlDocument::parse(super::constants::CONTENT_TYPES_PART, bytes)?;
        let mut registry = Self::new();
        for el in doc.root().elements() {
            if el.is(namespace::CONTENT_TYPES, "Default") {
                if let (Some(ext), Some(ct)) = (el.attr("Extension"), el.attr("ContentType")) {
                    registry.set_default(&ext, &ct);
                }
            } else if el.is(namespace::CONTENT_TYPES, "Override")
                && let (Some(name), Some(ct)) = (el.attr("PartName"), el.attr("ContentType"))
            {
                registry.set_override(&name, &ct);
            }
        }
        Ok(registry)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut root = Element::new("Types", Some(namespace::CONTENT_TYPES))
            .with_attr("xmlns", namespace::CONTENT_TYPES);
        for (ext, ct) in &self.defaults {
            root.push(
                Element::new("Default", Some(namespace::CONTENT_TYPES))
                    .with_attr("Extension", ext)
                    .with_attr("ContentType", ct),
            );
        }
        for (name, ct) in &self.overrides {
            root.push(
                Element::new("Override", Some(namespace::CONTENT_TYPES))
                    .with_attr("PartName", name)
                    .with_attr("ContentType", ct),
            );
        }
        XmlDocument::with_root(root).to_bytes()
    }

    pub fn default_for(&self, extension: &str) -> Option<&str> {
        let extension = extension.to_ascii_lowercase();
        self.defaults
            .iter()
            .find(|(e, _)| *e == extension)
            .map(|(_, ct)| ct.as_str())
    }

    /// Override lookup is case-insensitive, as part names are.
    pub fn override_for(&self, part: &str) -> Option<&str> {
        let name = packuri::part_name(part);
        self.overrides
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
            .map(|(_, ct)| ct.as_str())
    }

    /// Override first, then the extension default.
    pub fn resolve(&self, part: &str) -> Option<&str> {
        self.override_for(part)
            .or_else(|| self.default_for(&packuri::extension(part)))
    }

    pub fn resolve_or_err(&self, part: &str) -> Result<&str> {
        self.resolve(part)
            .ok_or_else(|| Error::ContentTypeUnresolved(part.to_string()))
    }

    pub fn set_default(&mut self, extension: &str, content_type: &str) {
        let extension = extension.to_ascii_lowercase();
        match self.defaults.iter_mut().find(|(e, _)| *e == extension) {
            Some(slot) => slot.1 = content_type.to_string(),
            None => self.defaults.push((extension, content_type.to_string())),
        }
    }

    pub fn set_override(&mut self, part: &str, content_type: &str) {
        let name = packuri::part_name(part);
        match self
            .overrides
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = content_type.to_string(),
            None => self.overrides.push((name, content_type.to_string())),
        }
    }

    /// Remove a part's override; defaults are shared and never removed here.
    pub fn remove_override(&mut self, part: &str) -> bool {
        let name = packuri::part_name(part);
        let before = self.overrides.len();
        self.overrides.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        before != self.overrides.len()
    }

    pub fn defaults(&self) -> &[(String, String)] {
        &self.defaults
    }

    pub fn overrides(&self) -> &[(String, String)] {
        &self.overrides
    }
}
