//! Template module: new presentations from the built-in blank template.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::extensions::operation::{BoundMethod, OperationContext, opt_str, opt_str_list};
use crate::extensions::registry::{ExtensionKind, ExtensionMetadata};
use crate::extensions::{Extension, ModuleCatalog, Operation};
use crate::opc::blank_presentation;

pub const ID: &str = "blank-template";

#[derive(Default)]
pub struct BlankTemplate;

impl BlankTemplate {
    /// `{colors?, major?, minor?}`; the new package is handed back through
    /// the context.
    fn create_from_template(&self, ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
        let mut package = blank_presentation()?;
        if let Some(colors) = opt_str_list(args, "colors")? {
            package.set_colors(&colors)?;
        }
        match (opt_str(args, "major")?, opt_str(args, "minor")?) {
            (Some(major), Some(minor)) => {
                package.set_fonts(major, minor)?;
            },
            (None, None) => {},
            _ => {
                return Err(Error::InvalidFontScheme(
                    "both 'major' and 'minor' are required".to_string(),
                ));
            },
        }
        let parts = package.archive().list();
        ctx.produce(package);
        Ok(json!({ "parts": parts }))
    }
}

impl Extension for BlankTemplate {
    fn metadata(&self) -> Option<ExtensionMetadata> {
        Some(ExtensionMetadata {
            name: ID.to_string(),
            kind: ExtensionKind::Template,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    fn methods(self: Arc<Self>) -> Vec<Arc<dyn Operation>> {
        vec![Arc::new(BoundMethod::new_static(
            &self,
            "createFromTemplate",
            Self::create_from_template,
        ))]
    }
}

pub fn register(catalog: &mut ModuleCatalog) {
    catalog.provide(ID, || Arc::new(BlankTemplate));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::ColorSlot;

    #[test]
    fn test_create_with_fonts_and_colors() {
        let mut ctx = OperationContext::detached();
        let args = json!({
            "colors": ["111111", "222222", "333333", "444444", "555555", "666666"],
            "major": "Georgia",
            "minor": "Verdana",
        });
        let value = BlankTemplate.create_from_template(&mut ctx, &args).unwrap();
        assert!(value["parts"].as_array().unwrap().len() >= 5);

        let package = ctx.into_produced().unwrap();
        let theme = package.theme().unwrap();
        assert_eq!(theme.color(ColorSlot::Accent1), Some("111111"));
        assert_eq!(theme.minor_font.as_deref(), Some("Verdana"));
    }

    #[test]
    fn test_half_a_font_pair_is_rejected() {
        let mut ctx = OperationContext::detached();
        let err = BlankTemplate
            .create_from_template(&mut ctx, &json!({ "major": "Georgia" }))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_FONT_SCHEME");
        assert!(ctx.into_produced().is_none());
    }
}
