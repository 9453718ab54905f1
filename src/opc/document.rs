//! The package seen as an OOXML document: parts, relationships, content
//! types and the theme.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::package::{PackageArchive, normalize_path};
use crate::zip::{self, BuildOptions};

use super::constants::{CONTENT_TYPES_PART, relationship_type as rt};
use super::content_types::ContentTypeRegistry;
use super::lint::{self, LintReport};
use super::packuri;
use super::rels::{self, Relationship, RelationshipGraph};
use super::theme::{self, ThemeSnapshot};

/// An OOXML package: the virtual file table plus the relationship graph and
/// content-type registry derived from it.
///
/// The graph and registry are indexes over the table. Every mutation made
/// through this type writes the affected `.rels` parts and
/// `[Content_Types].xml` back into the table, so building the archive always
/// reflects the current indexes.
#[derive(Debug, Clone)]
pub struct OoxmlPackage {
    archive: PackageArchive,
    content_types: ContentTypeRegistry,
    graph: RelationshipGraph,
}

impl OoxmlPackage {
    /// Wrap an extracted table, parsing `[Content_Types].xml` and every
    /// relationships part.
    pub fn open(archive: PackageArchive) -> Result<Self> {
        let mut package = Self {
            archive,
            content_types: ContentTypeRegistry::new(),
            graph: RelationshipGraph::new(),
        };
        package.reload_content_types()?;
        package.reload_relationships()?;
        debug!(
            entries = package.archive.len(),
            owners = package.graph.owners().count(),
            "opened package"
        );
        Ok(package)
    }

    /// Extract and open in one step.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::open(zip::extract(data)?)
    }

    /// Build the archive bytes.
    pub fn to_bytes(&mut self, options: &BuildOptions) -> Result<Vec<u8>> {
        zip::build(&mut self.archive, options)
    }

    fn reload_content_types(&mut self) -> Result<()> {
        if !self.archive.has(CONTENT_TYPES_PART) {
            return Err(Error::ContentTypesMissing);
        }
        self.content_types = ContentTypeRegistry::parse(self.archive.get(CONTENT_TYPES_PART)?)?;
        Ok(())
    }

    fn reload_relationships(&mut self) -> Result<()> {
        let mut graph = RelationshipGraph::new();
        for path in self.archive.list() {
            if let Some(owner) = packuri::owner_of_rels(&path) {
                graph.set(&owner, rels::parse_rels(&path, self.archive.get(&path)?)?);
            }
        }
        self.graph = graph;
        Ok(())
    }

    pub fn archive(&self) -> &PackageArchive {
        &self.archive
    }

    /// Raw table access. Writes made here bypass the indexes; use
    /// [`OoxmlPackage::set`] for `.rels` and content-type parts.
    pub fn archive_mut(&mut self) -> &mut PackageArchive {
        &mut self.archive
    }

    pub fn into_archive(self) -> PackageArchive {
        self.archive
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn content_types(&self) -> &ContentTypeRegistry {
        &self.content_types
    }

    /// Relationships owned by `owner`; `""` is the package root.
    pub fn relationships(&self, owner: &str) -> &[Relationship] {
        if owner.is_empty() {
            return self.graph.of("");
        }
        match normalize_path(owner) {
            Ok(owner) => self.graph.of(&owner),
            Err(_) => &[],
        }
    }

    pub fn content_type(&self, path: &str) -> Option<&str> {
        let path = normalize_path(path).ok()?;
        self.content_types.resolve(&path)
    }

    /// Write a part through to the table. Relationship parts and
    /// `[Content_Types].xml` are parsed first and the indexes refreshed, so
    /// malformed bookkeeping parts are rejected without touching the table.
    pub fn set(&mut self, path: &str, content: impl Into<Vec<u8>>) -> Result<()> {
        let normalized = normalize_path(path)?;
        let content = content.into();
        if normalized == CONTENT_TYPES_PART {
            let registry = ContentTypeRegistry::parse(&content)?;
            self.archive.set(&normalized, content)?;
            self.content_types = registry;
        } else if let Some(owner) = packuri::owner_of_rels(&normalized) {
            let parsed = rels::parse_rels(&normalized, &content)?;
            self.archive.set(&normalized, content)?;
            self.graph.set(&owner, parsed);
        } else {
            self.archive.set(&normalized, content)?;
        }
        Ok(())
    }

    /// Target of the root `officeDocument` relationship.
    pub fn main_part(&self) -> Result<String> {
        let rel = self
            .graph
            .first_of_type("", rt::OFFICE_DOCUMENT)
            .or_else(|| self.graph.first_of_type("", rt::OFFICE_DOCUMENT_STRICT))
            .ok_or_else(|| {
                Error::ThemePartMissing("package has no officeDocument relationship".to_string())
            })?;
        rel.target_part("").ok_or_else(|| {
            Error::DanglingRelationship {
                owner: String::new(),
                id: rel.id.clone(),
                reason: format!("officeDocument target {} is not an internal part", rel.target),
            }
        })
    }

    /// Locate the theme part: the main part's theme relationship, or failing
    /// that, the theme of a part the main part relates to (a slide master).
    pub fn theme_path(&self) -> Result<String> {
        let main = self.main_part()?;
        let direct = self
            .graph
            .first_of_type(&main, rt::THEME)
            .and_then(|rel| rel.target_part(&main));

        let found = direct.or_else(|| {
            self.graph
                .of(&main)
                .iter()
                .filter_map(|rel| rel.target_part(&main))
                .find_map(|related| {
                    self.graph
                        .first_of_type(&related, rt::THEME)
                        .and_then(|rel| rel.target_part(&related))
                })
        });

        match found {
            Some(path) if self.archive.has(&path) => Ok(path),
            Some(path) => Err(Error::ThemePartMissing(format!(
                "theme relationship points at {}, which is not in the package",
                path
            ))),
            None => Err(Error::ThemePartMissing(format!(
                "no theme relationship from {} or its related parts",
                main
            ))),
        }
    }

    pub fn theme(&self) -> Result<ThemeSnapshot> {
        let path = self.theme_path()?;
        theme::read_theme(&path, self.archive.xml(&path)?)
    }

    /// Replace theme colors. See [`theme::assign_slots`] for how the list
    /// maps onto slots. Every value is validated before the part is touched.
    pub fn set_colors(&mut self, colors: &[&str]) -> Result<ThemeSnapshot> {
        let assignments = theme::assign_slots(colors)?;
        let path = self.theme_path()?;
        self.archive
            .update_xml(&path, |doc| theme::write_colors(doc, &assignments))?;
        info!(part = %path, count = assignments.len(), "updated theme colors");
        self.theme()
    }

    pub fn set_fonts(&mut self, major: &str, minor: &str) -> Result<ThemeSnapshot> {
        let path = self.theme_path()?;
        self.archive
            .update_xml(&path, |doc| theme::write_fonts(doc, major, minor))?;
        info!(part = %path, major, minor, "updated theme fonts");
        self.theme()
    }

    /// Replace colors and fonts in one edit of the theme part. Either both
    /// apply or, on any error, the part is left as it was.
    pub fn apply_theme(&mut self, colors: &[&str], fonts: Option<(&str, &str)>) -> Result<ThemeSnapshot> {
        let assignments = if colors.is_empty() {
            Vec::new()
        } else {
            theme::assign_slots(colors)?
        };
        let path = self.theme_path()?;
        self.archive.update_xml(&path, |doc| {
            if !assignments.is_empty() {
                theme::write_colors(doc, &assignments)?;
            }
            if let Some((major, minor)) = fonts {
                theme::write_fonts(doc, major, minor)?;
            }
            Ok(())
        })?;
        info!(part = %path, colors = assignments.len(), fonts = fonts.is_some(), "applied theme");
        self.theme()
    }

    /// Add a part and relate it from `from_part` (`""` for the package root).
    ///
    /// # Arguments
    /// * `content_type` - explicit content type; when `None` the extension
    ///   default must resolve
    /// * `rel_type` - relationship type URI for the new edge
    ///
    /// # Returns
    /// The minted relationship id.
    ///
    /// Nothing is modified unless every check passes.
    pub fn add_part(
        &mut self,
        path: &str,
        content: impl Into<Vec<u8>>,
        content_type: Option<&str>,
        rel_type: &str,
        from_part: &str,
    ) -> Result<String> {
        let path = normalize_path(path)?;
        if path.ends_with('/') || path == CONTENT_TYPES_PART || packuri::is_rels_part(&path) {
            return Err(Error::InvalidPath(format!("{} cannot be added as a part", path)));
        }
        if self.archive.has(&path) {
            return Err(Error::EntryExists(path));
        }
        if self.archive.has(&format!("{}/", path)) {
            return Err(Error::PathConflict(format!("{} is a directory", path)));
        }
        let owner = if from_part.is_empty() {
            String::new()
        } else {
            let owner = normalize_path(from_part)?;
            if !self.archive.has(&owner) {
                return Err(Error::EntryNotFound(owner));
            }
            owner
        };
        if rel_type.trim().is_empty() {
            return Err(Error::InvalidArgument("relationship type is empty".to_string()));
        }
        let default = self
            .content_types
            .default_for(&packuri::extension(&path))
            .map(str::to_string);
        let override_type = match content_type.map(str::trim) {
            Some("") => {
                return Err(Error::InvalidArgument("content type is empty".to_string()));
            },
            Some(explicit) if default.as_deref() != Some(explicit) => Some(explicit.to_string()),
            Some(_) => None,
            None if default.is_some() => None,
            None => return Err(Error::ContentTypeUnresolved(path)),
        };

        self.archive.set(&path, content)?;
        if let Some(ct) = &override_type {
            self.content_types.set_override(&path, ct);
            self.write_content_types()?;
        }
        let target = packuri::relative_target(&owner, &path);
        let id = self.graph.add(&owner, rel_type.trim(), &target, false);
        self.write_relationships(&owner)?;

        info!(part = %path, owner = %owner, id = %id, "added part");
        Ok(id)
    }

    /// Remove a part with its own relationships, every relationship pointing
    /// at it and its content-type override. Returns how many incoming
    /// relationships were dropped.
    pub fn remove_part(&mut self, path: &str) -> Result<usize> {
        let path = normalize_path(path)?;
        if path == CONTENT_TYPES_PART || packuri::is_rels_part(&path) {
            return Err(Error::InvalidPath(format!("{} is package bookkeeping", path)));
        }
        if !self.archive.has(&path) {
            return Err(Error::EntryNotFound(path));
        }

        let incoming: usize = self
            .graph
            .owners()
            .map(|owner| {
                self.graph
                    .of(owner)
                    .iter()
                    .filter(|r| r.target_part(owner).as_deref() == Some(path.as_str()))
                    .count()
            })
            .sum();

        self.archive.remove(&path)?;
        let own_rels = packuri::rels_path_for(&path);
        if self.archive.has(&own_rels) {
            self.archive.remove(&own_rels)?;
        }
        self.graph.remove_owner(&path);

        for owner in self.graph.remove_edges_to(&path) {
            self.write_relationships(&owner)?;
        }
        if self.content_types.remove_override(&path) {
            self.write_content_types()?;
        }

        info!(part = %path, incoming, "removed part");
        Ok(incoming)
    }

    /// Serialize one owner's relationships back into the table. An owner
    /// left with no relationships loses its `.rels` part.
    fn write_relationships(&mut self, owner: &str) -> Result<()> {
        let rels_path = packuri::rels_path_for(owner);
        if self.graph.of(owner).is_empty() {
            self.graph.remove_owner(owner);
            if self.archive.has(&rels_path) {
                self.archive.remove(&rels_path)?;
            }
            return Ok(());
        }
        let bytes = rels::write_rels(self.graph.of(owner));
        self.archive.set(&rels_path, bytes)
    }

    fn write_content_types(&mut self) -> Result<()> {
        let bytes = self.content_types.to_bytes();
        self.archive.set(CONTENT_TYPES_PART, bytes)
    }

    /// Structural checks over relationships, content types and relationship
    /// references in part XML.
    pub fn lint(&self) -> LintReport {
        lint::lint(self)
    }

    /// [`OoxmlPackage::lint`] as a hard failure on the first finding.
    pub fn validate(&self) -> Result<()> {
        self.lint().into_result()
    }
}
