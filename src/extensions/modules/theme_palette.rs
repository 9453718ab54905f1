//! Theme module: palettes and font pairs, from explicit arguments or from a
//! free-text prompt such as
//! `"Create presentation with https://coolors.co/edd3c4-c8adc0-7765e3-3b60e4-080708 and Merriweather/Inter fonts"`.
//!
//! The module is stateful: it remembers every theme it applied until the
//! registry is reloaded.

use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::extensions::operation::{BoundMethod, OperationContext, arg_str, opt_str, opt_str_list};
use crate::extensions::registry::{ExtensionKind, ExtensionMetadata};
use crate::extensions::{Extension, ModuleCatalog, Operation};
use crate::opc::theme::ColorSlot;

pub const ID: &str = "theme-palette";

static PALETTE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)coolors\.co/(?:palette/)?([0-9a-f]{6}(?:-[0-9a-f]{6})+)").expect("static regex")
});

static FONT_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z][A-Za-z0-9]*(?: [A-Z][A-Za-z0-9]*)*)\s*/\s*([A-Z][A-Za-z0-9]*(?: [A-Z][A-Za-z0-9]*)*)\s+fonts?\b")
        .expect("static regex")
});

/// Colors and fonts requested by a prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeRequest {
    pub colors: Vec<String>,
    pub major_font: Option<String>,
    pub minor_font: Option<String>,
}

impl ThemeRequest {
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty() && self.major_font.is_none() && self.minor_font.is_none()
    }
}

/// Pull a palette URL and a `Heading/Body fonts` pair out of a prompt.
pub fn parse_prompt(prompt: &str) -> ThemeRequest {
    let colors = PALETTE_URL
        .captures(prompt)
        .map(|caps| caps[1].split('-').map(str::to_ascii_uppercase).collect())
        .unwrap_or_default();
    let (major_font, minor_font) = match FONT_PAIR.captures(prompt) {
        Some(caps) => (Some(caps[1].to_string()), Some(caps[2].to_string())),
        None => (None, None),
    };
    ThemeRequest {
        colors,
        major_font,
        minor_font,
    }
}

/// Palette sites hand out five colors; the accent row has six slots.
/// Short palettes are cycled until they fill it.
pub fn fit_palette(colors: &[String]) -> Vec<String> {
    let accents = ColorSlot::ALL.len() - ColorSlot::ACCENT_START - 2;
    if colors.is_empty() || colors.len() >= accents {
        return colors.to_vec();
    }
    colors.iter().cycle().take(accents).cloned().collect()
}

#[derive(Default)]
pub struct ThemePalette {
    history: Mutex<Vec<ThemeRequest>>,
}

impl ThemePalette {
    /// Themes applied through this instance, oldest first.
    pub fn history(&self) -> Vec<ThemeRequest> {
        self.history.lock().clone()
    }

    fn apply(&self, ctx: &mut OperationContext<'_>, request: ThemeRequest) -> Result<Value> {
        if request.is_empty() {
            return Err(Error::InvalidArgument(
                "no palette or font pair given".to_string(),
            ));
        }
        let colors: Vec<&str> = request.colors.iter().map(String::as_str).collect();
        let fonts = match (&request.major_font, &request.minor_font) {
            (Some(major), Some(minor)) => Some((major.as_str(), minor.as_str())),
            _ => None,
        };
        let theme = ctx.package()?.apply_theme(&colors, fonts)?;
        self.history.lock().push(request.clone());
        Ok(json!({ "applied": request, "theme": theme }))
    }

    fn apply_theme(&self, ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
        let mut request = match opt_str(args, "prompt")? {
            Some(prompt) => parse_prompt(prompt),
            None => ThemeRequest::default(),
        };
        if let Some(colors) = opt_str_list(args, "colors")? {
            request.colors = colors.iter().map(|c| c.to_string()).collect();
        }
        if let Some(major) = opt_str(args, "major")? {
            request.major_font = Some(major.to_string());
        }
        if let Some(minor) = opt_str(args, "minor")? {
            request.minor_font = Some(minor.to_string());
        }
        if request.major_font.is_some() != request.minor_font.is_some() {
            return Err(Error::InvalidFontScheme(
                "both a heading and a body font are required".to_string(),
            ));
        }
        request.colors = fit_palette(&request.colors);
        self.apply(ctx, request)
    }

    fn set_colors(&self, ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
        let colors = opt_str_list(args, "colors")?
            .ok_or_else(|| Error::InvalidArgument("missing list argument 'colors'".to_string()))?;
        self.apply(
            ctx,
            ThemeRequest {
                colors: colors.iter().map(|c| c.to_string()).collect(),
                ..ThemeRequest::default()
            },
        )
    }

    fn set_fonts(&self, ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
        self.apply(
            ctx,
            ThemeRequest {
                colors: Vec::new(),
                major_font: Some(arg_str(args, "major")?.to_string()),
                minor_font: Some(arg_str(args, "minor")?.to_string()),
            },
        )
    }

    fn describe(&self, ctx: &mut OperationContext<'_>, _args: &Value) -> Result<Value> {
        let theme = ctx.package()?.theme()?;
        Ok(json!({ "theme": theme, "history": self.history() }))
    }
}

impl Extension for ThemePalette {
    fn metadata(&self) -> Option<ExtensionMetadata> {
        Some(ExtensionMetadata {
            name: ID.to_string(),
            kind: ExtensionKind::Theme,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    fn methods(self: Arc<Self>) -> Vec<Arc<dyn Operation>> {
        vec![
            Arc::new(BoundMethod::new(&self, "applyTheme", Self::apply_theme)),
            Arc::new(BoundMethod::new(&self, "setColors", Self::set_colors)),
            Arc::new(BoundMethod::new(&self, "setFonts", Self::set_fonts)),
            Arc::new(BoundMethod::new(&self, "describe", Self::describe)),
        ]
    }
}

pub fn register(catalog: &mut ModuleCatalog) {
    catalog.provide(ID, || Arc::new(ThemePalette::default()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::blank_presentation;

    const PROMPT: &str = "Create presentation with https://coolors.co/edd3c4-c8adc0-7765e3-3b60e4-080708 and Merriweather/Inter fonts";

    #[test]
    fn test_parse_prompt() {
        let request = parse_prompt(PROMPT);
        assert_eq!(request.colors, vec!["EDD3C4", "C8ADC0", "7765E3", "3B60E4", "080708"]);
        assert_eq!(request.major_font.as_deref(), Some("Merriweather"));
        assert_eq!(request.minor_font.as_deref(), Some("Inter"));

        let multiword = parse_prompt("use coolors.co/palette/264653-2a9d8f with Playfair Display/Source Sans Pro fonts");
        assert_eq!(multiword.colors.len(), 2);
        assert_eq!(multiword.major_font.as_deref(), Some("Playfair Display"));
        assert_eq!(multiword.minor_font.as_deref(), Some("Source Sans Pro"));

        assert!(parse_prompt("make it pretty").is_empty());
    }

    #[test]
    fn test_fit_palette_cycles_short_palettes() {
        let five: Vec<String> = ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect();
        assert_eq!(fit_palette(&five), vec!["A", "B", "C", "D", "E", "A"]);
        let six: Vec<String> = (0..6).map(|i| i.to_string()).collect();
        assert_eq!(fit_palette(&six), six);
    }

    #[test]
    fn test_apply_theme_from_prompt_records_history() {
        let module = Arc::new(ThemePalette::default());
        let mut package = blank_presentation().unwrap();
        let mut ctx = OperationContext::instance(&mut package);
        module.apply_theme(&mut ctx, &json!({ "prompt": PROMPT })).unwrap();

        let theme = package.theme().unwrap();
        assert_eq!(theme.color(ColorSlot::Accent1), Some("EDD3C4"));
        assert_eq!(theme.color(ColorSlot::Accent5), Some("080708"));
        assert_eq!(theme.color(ColorSlot::Accent6), Some("EDD3C4"));
        assert_eq!(theme.major_font.as_deref(), Some("Merriweather"));
        assert_eq!(module.history().len(), 1);
    }

    #[test]
    fn test_apply_theme_needs_something_to_apply() {
        let module = ThemePalette::default();
        let mut package = blank_presentation().unwrap();
        let mut ctx = OperationContext::instance(&mut package);
        let err = module.apply_theme(&mut ctx, &json!({ "prompt": "nothing here" })).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(module.history().is_empty());
    }

    #[test]
    fn test_failed_font_edit_keeps_colors_unchanged() {
        let mut package = blank_presentation().unwrap();
        let path = package.theme_path().unwrap();
        let without_fonts = package
            .archive()
            .get_text(&path)
            .unwrap()
            .replace("<a:fontScheme", "<a:unusedScheme")
            .replace("</a:fontScheme>", "</a:unusedScheme>");
        package.set(&path, without_fonts.clone().into_bytes()).unwrap();
        let before = package.theme().unwrap();

        let module = ThemePalette::default();
        let mut ctx = OperationContext::instance(&mut package);
        let err = module
            .apply_theme(
                &mut ctx,
                &json!({ "colors": ["FF0000", "00FF00", "0000FF", "FFFF00", "00FFFF", "FF00FF"], "major": "Georgia", "minor": "Inter" }),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFontScheme(_)));

        assert_eq!(package.theme().unwrap(), before);
        assert_eq!(package.archive().get_text(&path).unwrap(), without_fonts);
        assert!(module.history().is_empty());
    }
}
