//! Built-in extension modules, one per extension kind.

use super::ModuleCatalog;

pub mod blank_template;
pub mod package_export;
pub mod package_lint;
pub mod theme_palette;
pub mod xml_text;

/// Run every built-in module's init function.
pub fn register_all(catalog: &mut ModuleCatalog) {
    theme_palette::register(catalog);
    blank_template::register(catalog);
    package_lint::register(catalog);
    xml_text::register(catalog);
    package_export::register(catalog);
}
