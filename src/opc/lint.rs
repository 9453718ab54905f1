//! Structural checks over a package.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::xml::Element;

use super::constants::{CONTENT_TYPES_PART, namespace};
use super::document::OoxmlPackage;
use super::packuri;

/// Attributes (local names) that hold relationship ids in the
/// officeDocument relationships namespace.
const REFERENCE_ATTRIBUTES: [&str; 4] = ["id", "embed", "link", "pict"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Finding {
    /// An internal relationship whose target is not in the package.
    DanglingRelationship {
        owner: String,
        id: String,
        target: String,
    },
    /// A `.rels` part whose owning part does not exist.
    OrphanedRelationships { rels_part: String },
    /// A part with neither an override nor an extension default.
    MissingContentType { part: String },
    /// Part XML references a relationship id its `.rels` does not define.
    UnresolvedReference {
        part: String,
        attribute: String,
        id: String,
    },
    MalformedXml { part: String, reason: String },
}

impl Finding {
    fn into_error(self) -> Error {
        match self {
            Finding::DanglingRelationship { owner, id, target } => Error::DanglingRelationship {
                owner,
                id,
                reason: format!("target {} is not in the package", target),
            },
            Finding::OrphanedRelationships { rels_part } => Error::DanglingRelationship {
                owner: packuri::owner_of_rels(&rels_part).unwrap_or_default(),
                id: String::new(),
                reason: format!("{} belongs to a part that does not exist", rels_part),
            },
            Finding::MissingContentType { part } => Error::ContentTypeUnresolved(part),
            Finding::UnresolvedReference {
                part,
                attribute,
                id,
            } => Error::DanglingRelationship {
                owner: part,
                id,
                reason: format!("{} references an undefined relationship", attribute),
            },
            Finding::MalformedXml { part, reason } => Error::Xml { path: part, reason },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub parts_checked: usize,
    pub findings: Vec<Finding>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Fail with the first finding.
    pub fn into_result(self) -> Result<()> {
        match self.findings.into_iter().next() {
            Some(finding) => Err(finding.into_error()),
            None => Ok(()),
        }
    }
}

fn is_xml_part(package: &OoxmlPackage, path: &str) -> bool {
    if packuri::extension(path) == "xml" {
        return true;
    }
    package
        .content_type(path)
        .is_some_and(|ct| ct.ends_with("+xml") || ct.ends_with("/xml"))
}

pub(crate) fn lint(package: &OoxmlPackage) -> LintReport {
    let archive = package.archive();
    let graph = package.graph();
    let mut report = LintReport::default();

    for owner in graph.owners() {
        if !owner.is_empty() && !archive.has(owner) {
            report.findings.push(Finding::OrphanedRelationships {
                rels_part: packuri::rels_path_for(owner),
            });
        }
        for rel in graph.of(owner).iter().filter(|r| !r.external) {
            let present = rel.target_part(owner).is_some_and(|t| archive.has(&t));
            if !present {
                report.findings.push(Finding::DanglingRelationship {
                    owner: owner.to_string(),
                    id: rel.id.clone(),
                    target: rel.target.clone(),
                });
            }
        }
    }

    for entry in archive.entries() {
        let path = entry.path();
        if entry.is_directory() || path == CONTENT_TYPES_PART {
            continue;
        }
        report.parts_checked += 1;
        if package.content_types().resolve(path).is_none() {
            report.findings.push(Finding::MissingContentType {
                part: path.to_string(),
            });
        }
        if packuri::is_rels_part(path) || !is_xml_part(package, path) {
            continue;
        }
        match entry.xml() {
            Ok(doc) => check_references(package, path, doc.root(), &mut report),
            Err(err) => report.findings.push(Finding::MalformedXml {
                part: path.to_string(),
                reason: err.to_string(),
            }),
        }
    }
    report
}

fn check_references(
    package: &OoxmlPackage,
    part: &str,
    root: &Element,
    report: &mut LintReport,
) {
    // Prefixes bound to the relationships namespace on the root element.
    let prefixes: Vec<String> = root
        .attributes()
        .filter(|(_, uri)| uri == namespace::OFFICE_DOC_RELATIONSHIPS)
        .filter_map(|(key, _)| key.strip_prefix("xmlns:").map(str::to_string))
        .collect();
    if prefixes.is_empty() {
        return;
    }

    root.walk(&mut |el: &Element| {
        for (key, id) in el.attributes() {
            let Some((prefix, local)) = key.split_once(':') else {
                continue;
            };
            if !prefixes.iter().any(|p| p == prefix) || !REFERENCE_ATTRIBUTES.contains(&local) {
                continue;
            }
            if !id.is_empty() && package.graph().by_id(part, &id).is_none() {
                report.findings.push(Finding::UnresolvedReference {
                    part: part.to_string(),
                    attribute: key.to_string(),
                    id,
                });
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::template::blank_presentation;

    #[test]
    fn test_dangling_relationship_and_reference() {
        let mut package = blank_presentation().unwrap();
        package.archive_mut().remove("ppt/theme/theme1.xml").unwrap();
        let slide = r#"<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:pic r:embed="rId9"/></p:sld>"#;
        package.set("ppt/slides/slide1.xml", slide.as_bytes().to_vec()).unwrap();

        let report = package.lint();
        assert!(report.findings.contains(&Finding::DanglingRelationship {
            owner: "ppt/presentation.xml".into(),
            id: "rId1".into(),
            target: "theme/theme1.xml".into(),
        }));
        assert!(report.findings.contains(&Finding::UnresolvedReference {
            part: "ppt/slides/slide1.xml".into(),
            attribute: "r:embed".into(),
            id: "rId9".into(),
        }));

        let err = package.validate().unwrap_err();
        assert_eq!(err.code(), "DANGLING_RELATIONSHIP");
    }

    #[test]
    fn test_missing_content_type() {
        let mut package = blank_presentation().unwrap();
        package.set("ppt/media/clip.bin", vec![0u8; 4]).unwrap();
        let report = package.lint();
        assert_eq!(
            report.findings,
            vec![Finding::MissingContentType {
                part: "ppt/media/clip.bin".into()
            }]
        );
        assert!(matches!(report.into_result(), Err(Error::ContentTypeUnresolved(_))));
    }
}
