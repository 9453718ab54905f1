//! Open Packaging Conventions layer.
//!
//! Interprets the virtual file table as an OOXML document:
//! - [`content_types`]: `[Content_Types].xml` defaults and overrides
//! - [`rels`]: relationship parts and the relationship graph
//! - [`theme`]: DrawingML color and font schemes
//! - [`document`]: [`OoxmlPackage`], the operations that keep the three
//!   consistent
//! - [`lint`]: structural checks
//! - [`template`]: a blank presentation

pub mod constants;
pub mod content_types;
pub mod document;
pub mod lint;
pub mod packuri;
pub mod rels;
pub mod template;
pub mod theme;

pub use content_types::ContentTypeRegistry;
pub use document::OoxmlPackage;
pub use lint::{Finding, LintReport};
pub use rels::{Relationship, RelationshipGraph};
pub use template::blank_presentation;
pub use theme::{ColorSlot, ThemeSnapshot};
