//! Relationships between parts.
//!
//! The graph is an index keyed by owning part path. Parts never hold
//! references to each other; an edge is just `(id, type, target)` stored
//! under its owner.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::xml::{Element, XmlDocument};

use super::constants::{namespace, target_mode};
use super::packuri;

/// A single relationship from a source part to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target reference as written: relative part reference or external URL
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Absolute part path of an internal target.
    pub fn target_part(&self, owner: &str) -> Option<String> {
        if self.external {
            return None;
        }
        packuri::resolve_target(owner, &self.target).ok()
    }
}

/// Numeric suffix of an `rIdN` id.
fn id_number(id: &str) -> Option<u32> {
    id.strip_prefix("rId").and_then(|n| n.parse().ok())
}

/// Parse the relationships of one `.rels` part.
pub fn parse_rels(path: &str, bytes: &[u8]) -> Result<Vec<Relationship>> {
    let doc = XmlDocument::parse(path, bytes)?;
    let mut rels: Vec<Relationship> = Vec::new();
    for el in doc.root().elements() {
        if !el.is(namespace::RELATIONSHIPS, "Relationship") {
            continue;
        }
        let (Some(id), Some(rel_type), Some(target)) =
            (el.attr("Id"), el.attr("Type"), el.attr("Target"))
        else {
            return Err(Error::Xml {
                path: path.to_string(),
                reason: "Relationship without Id, Type or Target".to_string(),
            });
        };
        if rels.iter().any(|r| r.id == id) {
            return Err(Error::Xml {
                path: path.to_string(),
                reason: format!("duplicate relationship id {}", id),
            });
        }
        let external = el.attr("TargetMode").as_deref() == Some(target_mode::EXTERNAL);
        rels.push(Relationship {
            id,
            rel_type,
            target,
            external,
        });
    }
    Ok(rels)
}

/// Serialize relationships to a `.rels` part.
pub fn write_rels(rels: &[Relationship]) -> Vec<u8> {
    let mut root = Element::new("Relationships", Some(namespace::RELATIONSHIPS))
        .with_attr("xmlns", namespace::RELATIONSHIPS);
    for rel in rels {
        let mut el = Element::new("Relationship", Some(namespace::RELATIONSHIPS))
            .with_attr("Id", &rel.id)
            .with_attr("Type", &rel.rel_type)
            .with_attr("Target", &rel.target);
        if rel.external {
            el.set_attr("TargetMode", target_mode::EXTERNAL);
        }
        root.push(el);
    }
    XmlDocument::with_root(root).to_bytes()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipGraph {
    edges: BTreeMap<String, Vec<Relationship>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relationships owned by `owner` (`""` for the package root).
    pub fn of(&self, owner: &str) -> &[Relationship] {
        self.edges.get(owner).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn contains_owner(&self, owner: &str) -> bool {
        self.edges.contains_key(owner)
    }

    pub fn set(&mut self, owner: &str, rels: Vec<Relationship>) {
        self.edges.insert(owner.to_string(), rels);
    }

    pub fn remove_owner(&mut self, owner: &str) -> Option<Vec<Relationship>> {
        self.edges.remove(owner)
    }

    pub fn by_id(&self, owner: &str, id: &str) -> Option<&Relationship> {
        self.of(owner).iter().find(|r| r.id == id)
    }

    pub fn first_of_type(&self, owner: &str, rel_type: &str) -> Option<&Relationship> {
        self.of(owner).iter().find(|r| r.rel_type == rel_type)
    }

    /// `rId{N+1}` where N is the largest numeric suffix owned by `owner`.
    pub fn next_id(&self, owner: &str) -> String {
        let max = self
            .of(owner)
            .iter()
            .filter_map(|r| id_number(&r.id))
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }

    /// Append a relationship and return its freshly minted id.
    pub fn add(&mut self, owner: &str, rel_type: &str, target: &str, external: bool) -> String {
        let id = self.next_id(owner);
        self.edges
            .entry(owner.to_string())
            .or_default()
            .push(Relationship {
                id: id.clone(),
                rel_type: rel_type.to_string(),
                target: target.to_string(),
                external,
            });
        id
    }

    /// Drop every internal edge resolving to `target`. Returns the owners
    /// whose relationship lists changed.
    pub fn remove_edges_to(&mut self, target: &str) -> Vec<String> {
        let mut touched = Vec::new();
        for (owner, rels) in self.edges.iter_mut() {
            let before = rels.len();
            rels.retain(|r| r.target_part(owner).as_deref() != Some(target));
            if rels.len() != before {
                touched.push(owner.clone());
            }
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="theme/theme1.xml"/><Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/></Relationships>"#;

    #[test]
    fn test_parse_rels() {
        let rels = parse_rels("ppt/_rels/presentation.xml.rels", RELS.as_bytes()).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].id, "rId2");
        assert_eq!(rels[0].target_part("ppt/presentation.xml").as_deref(), Some("ppt/theme/theme1.xml"));
        assert!(rels[1].external);
        assert_eq!(rels[1].target, "https://example.com/?a=1&b=2");
        assert_eq!(rels[1].target_part("ppt/presentation.xml"), None);
    }

    #[test]
    fn test_write_then_parse_preserves_edges() {
        let rels = parse_rels("x.rels", RELS.as_bytes()).unwrap();
        let bytes = write_rels(&rels);
        assert_eq!(parse_rels("x.rels", &bytes).unwrap(), rels);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let xml = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="t" Target="a"/><Relationship Id="rId1" Type="t" Target="b"/></Relationships>"#;
        assert!(parse_rels("x.rels", xml.as_bytes()).is_err());
    }

    #[test]
    fn test_next_id_follows_max_suffix() {
        let mut graph = RelationshipGraph::new();
        graph.set("ppt/presentation.xml", parse_rels("x", RELS.as_bytes()).unwrap());
        assert_eq!(graph.next_id("ppt/presentation.xml"), "rId8");
        assert_eq!(graph.next_id("ppt/slides/slide1.xml"), "rId1");
        let id = graph.add("ppt/presentation.xml", "t", "media/a.png", false);
        assert_eq!(id, "rId8");
        assert_eq!(graph.next_id("ppt/presentation.xml"), "rId9");
    }

    #[test]
    fn test_remove_edges_to() {
        let mut graph = RelationshipGraph::new();
        graph.set("ppt/presentation.xml", parse_rels("x", RELS.as_bytes()).unwrap());
        let touched = graph.remove_edges_to("ppt/theme/theme1.xml");
        assert_eq!(touched, vec!["ppt/presentation.xml".to_string()]);
        assert_eq!(graph.of("ppt/presentation.xml").len(), 1);
        assert!(graph.remove_edges_to("ppt/theme/theme1.xml").is_empty());
    }
}
