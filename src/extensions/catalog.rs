//! The closed catalogue of extension modules.
//!
//! Module identifiers are fixed at compile time in [`KNOWN_MODULES`]. Each
//! built-in module has an init function that supplies a factory for its
//! identifier; [`ModuleCatalog::builtin`] calls all of them. Nothing is found
//! by reflection: an identifier with no factory is simply not available.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Extension;
use super::modules;

/// Every module identifier the registry knows how to look for, in discovery
/// order.
pub const KNOWN_MODULES: [&str; 5] = [
    modules::theme_palette::ID,
    modules::blank_template::ID,
    modules::package_lint::ID,
    modules::xml_text::ID,
    modules::package_export::ID,
];

/// Creates a fresh module instance. Called once per discovery pass.
pub type ExtensionFactory = Arc<dyn Fn() -> Arc<dyn Extension> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ModuleCatalog {
    known: Vec<String>,
    factories: HashMap<String, ExtensionFactory>,
}

impl ModuleCatalog {
    /// A catalogue that knows [`KNOWN_MODULES`] but has no factories yet.
    pub fn new() -> Self {
        let mut catalog = Self::default();
        for id in KNOWN_MODULES {
            catalog.declare(id);
        }
        catalog
    }

    /// All built-in modules declared and provided.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        modules::register_all(&mut catalog);
        catalog
    }

    /// Add an identifier to the end of the catalogue. Declaring twice keeps
    /// the original position.
    pub fn declare(&mut self, id: &str) {
        if !self.known.iter().any(|k| k == id) {
            self.known.push(id.to_string());
        }
    }

    /// Supply the factory for an identifier. Factories for identifiers that
    /// were never declared are kept but never discovered.
    pub fn provide<F>(&mut self, id: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Extension> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_string(), Arc::new(factory));
    }

    pub fn known(&self) -> &[String] {
        &self.known
    }

    pub fn factory(&self, id: &str) -> Option<&ExtensionFactory> {
        self.factories.get(id)
    }

    pub fn is_available(&self, id: &str) -> bool {
        self.known.iter().any(|k| k == id) && self.factories.contains_key(id)
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("known", &self.known)
            .field("provided", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_catalog_declares_but_provides_nothing() {
        let catalog = ModuleCatalog::new();
        assert_eq!(catalog.known().len(), KNOWN_MODULES.len());
        assert!(KNOWN_MODULES.iter().all(|id| !catalog.is_available(id)));
    }

    #[test]
    fn test_builtin_provides_every_known_module() {
        let catalog = ModuleCatalog::builtin();
        for id in KNOWN_MODULES {
            assert!(catalog.is_available(id), "{} not provided", id);
        }
    }

    #[test]
    fn test_declare_is_idempotent() {
        let mut catalog = ModuleCatalog::new();
        catalog.declare("theme-palette");
        catalog.declare("extra");
        assert_eq!(catalog.known().len(), KNOWN_MODULES.len() + 1);
        assert_eq!(catalog.known().last().map(String::as_str), Some("extra"));
    }
}
