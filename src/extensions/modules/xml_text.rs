//! Content module: search and replace in the text of XML parts.
//!
//! Only character data changes. Markup, attribute values and parts that do
//! not contain the search string are left untouched (and stay clean, so
//! they are written back byte-for-byte).

use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::extensions::operation::{BoundMethod, OperationContext, arg_str, opt_str_list};
use crate::extensions::registry::{ExtensionKind, ExtensionMetadata};
use crate::extensions::{Extension, ModuleCatalog, Operation};
use crate::opc::OoxmlPackage;
use crate::opc::constants::CONTENT_TYPES_PART;
use crate::opc::packuri;
use crate::xml::Element;

pub const ID: &str = "xml-text";

fn contains_text(root: &Element, needle: &str) -> bool {
    root.any_text(&mut |text: &str| text.contains(needle))
}

/// Content parts: XML, excluding relationships and content types.
fn text_parts(package: &OoxmlPackage) -> Vec<String> {
    package
        .archive()
        .list()
        .into_iter()
        .filter(|p| {
            packuri::extension(p) == "xml" && p != CONTENT_TYPES_PART && !packuri::is_rels_part(p)
        })
        .collect()
}

/// Replace in the given parts. Returns (occurrences, parts changed).
fn replace_in(
    package: &mut OoxmlPackage,
    parts: &[String],
    search: &str,
    replace: &str,
) -> Result<(usize, Vec<String>)> {
    if search.is_empty() {
        return Err(Error::InvalidArgument("search string is empty".to_string()));
    }
    let mut total = 0;
    let mut changed = Vec::new();
    for part in parts {
        if !contains_text(package.archive().xml(part)?.root(), search) {
            continue;
        }
        let mut occurrences = 0;
        package.archive_mut().update_xml(part, |doc| {
            doc.root_mut().rewrite_text(&mut |text: &str| {
                let n = text.matches(search).count();
                occurrences += n;
                (n > 0).then(|| text.replace(search, replace))
            });
            Ok(())
        })?;
        if occurrences > 0 {
            total += occurrences;
            changed.push(part.clone());
        }
    }
    Ok((total, changed))
}

#[derive(Default)]
pub struct XmlText;

impl XmlText {
    /// `{search, replace, parts?}`; all content parts when `parts` is absent.
    fn replace_text(&self, ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
        let search = arg_str(args, "search")?;
        let replace = arg_str(args, "replace")?;
        let package = ctx.package()?;
        let parts = match opt_str_list(args, "parts")? {
            Some(parts) => parts.iter().map(|p| p.to_string()).collect(),
            None => text_parts(package),
        };
        let (replacements, changed) = replace_in(package, &parts, search, replace)?;
        Ok(json!({ "replacements": replacements, "parts": changed }))
    }

    /// `{part, search, replace}`: the same edit confined to one part.
    fn transform_xml(&self, ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
        let part = arg_str(args, "part")?;
        let search = arg_str(args, "search")?;
        let replace = arg_str(args, "replace")?;
        let (replacements, _) = replace_in(ctx.package()?, &[part.to_string()], search, replace)?;
        Ok(json!({ "replacements": replacements }))
    }
}

impl Extension for XmlText {
    fn metadata(&self) -> Option<ExtensionMetadata> {
        Some(ExtensionMetadata {
            name: ID.to_string(),
            kind: ExtensionKind::Content,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    fn methods(self: Arc<Self>) -> Vec<Arc<dyn Operation>> {
        vec![
            Arc::new(BoundMethod::new(&self, "replaceText", Self::replace_text)),
            Arc::new(BoundMethod::new(&self, "transformXml", Self::transform_xml)),
        ]
    }
}

pub fn register(catalog: &mut ModuleCatalog) {
    catalog.provide(ID, || Arc::new(XmlText));
}
