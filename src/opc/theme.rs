//! DrawingML theme parts: color scheme and font scheme.
//!
//! A theme's `a:clrScheme` has twelve slots in a fixed order. Each slot holds
//! either an `a:srgbClr val="RRGGBB"` or an `a:sysClr val="windowText"
//! lastClr="RRGGBB"`; writes always produce `a:srgbClr`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::xml::{Element, XmlDocument};

use super::constants::namespace::DRAWINGML as A;

/// Color scheme slots in scheme order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorSlot {
    Dark1,
    Light1,
    Dark2,
    Light2,
    Accent1,
    Accent2,
    Accent3,
    Accent4,
    Accent5,
    Accent6,
    Hyperlink,
    FollowedHyperlink,
}

impl ColorSlot {
    pub const ALL: [ColorSlot; 12] = [
        ColorSlot::Dark1,
        ColorSlot::Light1,
        ColorSlot::Dark2,
        ColorSlot::Light2,
        ColorSlot::Accent1,
        ColorSlot::Accent2,
        ColorSlot::Accent3,
        ColorSlot::Accent4,
        ColorSlot::Accent5,
        ColorSlot::Accent6,
        ColorSlot::Hyperlink,
        ColorSlot::FollowedHyperlink,
    ];

    /// Index of accent1, where short palettes start.
    pub const ACCENT_START: usize = 4;

    /// Element local name inside `a:clrScheme`.
    pub fn element_name(&self) -> &'static str {
        match self {
            ColorSlot::Dark1 => "dk1",
            ColorSlot::Light1 => "lt1",
            ColorSlot::Dark2 => "dk2",
            ColorSlot::Light2 => "lt2",
            ColorSlot::Accent1 => "accent1",
            ColorSlot::Accent2 => "accent2",
            ColorSlot::Accent3 => "accent3",
            ColorSlot::Accent4 => "accent4",
            ColorSlot::Accent5 => "accent5",
            ColorSlot::Accent6 => "accent6",
            ColorSlot::Hyperlink => "hlink",
            ColorSlot::FollowedHyperlink => "folHlink",
        }
    }
}

/// Structured view of a theme part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSnapshot {
    pub path: String,
    pub name: Option<String>,
    /// Slot and uppercase `RRGGBB`, for every slot present in the scheme.
    pub colors: Vec<(ColorSlot, String)>,
    pub major_font: Option<String>,
    pub minor_font: Option<String>,
}

impl ThemeSnapshot {
    pub fn color(&self, slot: ColorSlot) -> Option<&str> {
        self.colors
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, hex)| hex.as_str())
    }
}

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#?([0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$").expect("static regex")
});

/// Validate a 3- or 6-digit hex color (optional `#`) and normalize it to
/// uppercase `RRGGBB`.
pub fn normalize_hex(value: &str) -> Result<String> {
    let caps = HEX_COLOR
        .captures(value.trim())
        .ok_or_else(|| Error::InvalidColorValue(value.to_string()))?;
    let digits = caps[1].to_ascii_uppercase();
    if digits.len() == 3 {
        Ok(digits.chars().flat_map(|c| [c, c]).collect())
    } else {
        Ok(digits)
    }
}

/// Map a color list onto scheme slots.
///
/// Twelve values cover the whole scheme in order. Six to eight values are a
/// palette: they start at accent1 and run through the hyperlink slots.
pub fn assign_slots(colors: &[&str]) -> Result<Vec<(ColorSlot, String)>> {
    let start = match colors.len() {
        12 => 0,
        6..=8 => ColorSlot::ACCENT_START,
        n => {
            return Err(Error::InvalidColorScheme(format!(
                "expected 6 to 8 palette colors or a full 12-slot scheme, got {}",
                n
            )));
        },
    };
    colors
        .iter()
        .zip(ColorSlot::ALL[start..].iter())
        .map(|(value, slot)| Ok((*slot, normalize_hex(value)?)))
        .collect()
}

fn color_scheme(doc: &XmlDocument) -> Option<&Element> {
    doc.root().path_ns(A, &["themeElements", "clrScheme"])
}

fn slot_color(slot_el: &Element) -> Option<String> {
    if let Some(srgb) = slot_el.child_ns(A, "srgbClr") {
        return srgb.attr("val").map(|v| v.to_ascii_uppercase());
    }
    slot_el
        .child_ns(A, "sysClr")
        .and_then(|sys| sys.attr("lastClr"))
        .map(|v| v.to_ascii_uppercase())
}

fn latin_typeface(doc: &XmlDocument, which: &str) -> Option<String> {
    doc.root()
        .path_ns(A, &["themeElements", "fontScheme", which, "latin"])
        .and_then(|latin| latin.attr("typeface"))
}

/// Read the color and font schemes of a theme part.
pub fn read_theme(path: &str, doc: &XmlDocument) -> Result<ThemeSnapshot> {
    if !doc.root().is(A, "theme") {
        return Err(Error::ThemePartMissing(format!(
            "{} is not a DrawingML theme (root is {})",
            path,
            doc.root().name()
        )));
    }
    let colors = color_scheme(doc)
        .map(|scheme| {
            ColorSlot::ALL
                .iter()
                .filter_map(|slot| {
                    scheme
                        .child_ns(A, slot.element_name())
                        .and_then(slot_color)
                        .map(|hex| (*slot, hex))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ThemeSnapshot {
        path: path.to_string(),
        name: doc.root().attr("name"),
        colors,
        major_font: latin_typeface(doc, "majorFont"),
        minor_font: latin_typeface(doc, "minorFont"),
    })
}

/// Qualified name for a new DrawingML element placed under `parent`.
///
/// `parent` already resolves to DrawingML, so its prefix is the binding in
/// scope. No prefix means DrawingML is the default namespace there.
fn drawingml_name(parent: &Element, local: &str) -> String {
    match parent.prefix() {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

/// Write slot colors into the scheme, creating missing slots in scheme order.
pub fn write_colors(doc: &mut XmlDocument, assignments: &[(ColorSlot, String)]) -> Result<()> {
    let scheme = doc
        .root_mut()
        .path_ns_mut(A, &["themeElements", "clrScheme"])
        .ok_or_else(|| Error::InvalidColorScheme("theme has no a:clrScheme".to_string()))?;

    for (slot, hex) in assignments {
        let color = Element::new(drawingml_name(scheme, "srgbClr"), Some(A)).with_attr("val", hex);
        match scheme.child_ns_mut(A, slot.element_name()) {
            Some(slot_el) => {
                slot_el.clear_elements();
                slot_el.push(color);
            },
            None => {
                let mut slot_el = Element::new(drawingml_name(scheme, slot.element_name()), Some(A));
                slot_el.push(color);
                insert_in_scheme_order(scheme, *slot, slot_el);
            },
        }
    }
    Ok(())
}

fn insert_in_scheme_order(scheme: &mut Element, slot: ColorSlot, slot_el: Element) {
    let rank = |el: &Element| {
        ColorSlot::ALL
            .iter()
            .position(|s| el.is(A, s.element_name()))
    };
    let target = ColorSlot::ALL.iter().position(|s| *s == slot).unwrap_or(0);
    let children = scheme.children_mut();
    let position = children
        .iter()
        .position(|n| matches!(n, crate::xml::Node::Element(e) if rank(e).is_some_and(|r| r > target)))
        .unwrap_or(children.len());
    children.insert(position, crate::xml::Node::Element(slot_el));
}

/// Set the latin typefaces of the major (heading) and minor (body) fonts.
pub fn write_fonts(doc: &mut XmlDocument, major: &str, minor: &str) -> Result<()> {
    for (label, value) in [("major", major), ("minor", minor)] {
        if value.trim().is_empty() {
            return Err(Error::InvalidFontScheme(format!("{} font name is empty", label)));
        }
    }
    let font_scheme = doc
        .root_mut()
        .path_ns_mut(A, &["themeElements", "fontScheme"])
        .ok_or_else(|| Error::InvalidFontScheme("theme has no a:fontScheme".to_string()))?;

    for (which, typeface) in [("majorFont", major.trim()), ("minorFont", minor.trim())] {
        let font = match font_scheme.child_ns_mut(A, which) {
            Some(font) => font,
            None => {
                let font = Element::new(drawingml_name(font_scheme, which), Some(A));
                font_scheme.push(font);
                font_scheme
                    .child_ns_mut(A, which)
                    .ok_or_else(|| Error::InvalidFontScheme(format!("cannot create {}", which)))?
            },
        };
        match font.child_ns_mut(A, "latin") {
            Some(latin) => latin.set_attr("typeface", typeface),
            None => {
                let latin = Element::new(drawingml_name(font, "latin"), Some(A)).with_attr("typeface", typeface);
                // latin must come first in a font collection
                font.children_mut().insert(0, crate::xml::Node::Element(latin));
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::template::THEME_XML;

    fn theme() -> XmlDocument {
        XmlDocument::parse("ppt/theme/theme1.xml", THEME_XML.as_bytes()).unwrap()
    }

    #[test]
    fn test_normalize_hex() {
        assert_eq!(normalize_hex("#ff0000").unwrap(), "FF0000");
        assert_eq!(normalize_hex("0aF").unwrap(), "00AAFF");
        assert_eq!(normalize_hex("#ABC").unwrap(), "AABBCC");
        for bad in ["", "#", "12345", "GG0000", "#1234567", "red"] {
            assert!(
                matches!(normalize_hex(bad), Err(Error::InvalidColorValue(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_assign_slots_palette_starts_at_accent1() {
        let slots = assign_slots(&["111111", "222222", "333333", "444444", "555555", "666666"]).unwrap();
        assert_eq!(slots[0], (ColorSlot::Accent1, "111111".to_string()));
        assert_eq!(slots[5].0, ColorSlot::Accent6);

        let eight = ["1", "2", "3", "4", "5", "6", "7", "8"].map(|d| d.repeat(6));
        let eight: Vec<&str> = eight.iter().map(String::as_str).collect();
        assert_eq!(assign_slots(&eight).unwrap()[7].0, ColorSlot::FollowedHyperlink);
    }

    #[test]
    fn test_assign_slots_rejects_bad_shapes() {
        for n in [0, 5, 9, 11, 13] {
            let colors = vec!["000000"; n];
            assert!(matches!(assign_slots(&colors), Err(Error::InvalidColorScheme(_))), "{}", n);
        }
        assert!(matches!(
            assign_slots(&["000000", "zzz", "000000", "000000", "000000", "000000"]),
            Err(Error::InvalidColorValue(_))
        ));
    }

    #[test]
    fn test_read_template_theme() {
        let snapshot = read_theme("ppt/theme/theme1.xml", &theme()).unwrap();
        assert_eq!(snapshot.colors.len(), 12);
        assert_eq!(snapshot.color(ColorSlot::Dark1), Some("000000"));
        assert_eq!(snapshot.color(ColorSlot::Accent1), Some("4472C4"));
        assert_eq!(snapshot.major_font.as_deref(), Some("Calibri Light"));
        assert_eq!(snapshot.minor_font.as_deref(), Some("Calibri"));
    }

    #[test]
    fn test_write_colors_replaces_sys_colors() {
        let mut doc = theme();
        let full: Vec<String> = (0..12).map(|i| format!("{:02X}{:02X}{:02X}", i, i, i)).collect();
        let full: Vec<&str> = full.iter().map(String::as_str).collect();
        write_colors(&mut doc, &assign_slots(&full).unwrap()).unwrap();
        let snapshot = read_theme("t", &doc).unwrap();
        assert_eq!(snapshot.color(ColorSlot::Dark1), Some("000000"));
        assert_eq!(snapshot.color(ColorSlot::Light1), Some("010101"));
        assert!(!doc.to_xml_string().contains("sysClr"));
    }

    #[test]
    fn test_write_fonts() {
        let mut doc = theme();
        write_fonts(&mut doc, "Merriweather", "Inter").unwrap();
        let snapshot = read_theme("t", &doc).unwrap();
        assert_eq!(snapshot.major_font.as_deref(), Some("Merriweather"));
        assert_eq!(snapshot.minor_font.as_deref(), Some("Inter"));
        assert!(matches!(write_fonts(&mut doc, " ", "Inter"), Err(Error::InvalidFontScheme(_))));
    }

    #[test]
    fn test_missing_slot_inserted_in_order() {
        let xml = r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:themeElements><a:clrScheme name="x"><a:dk1><a:srgbClr val="000000"/></a:dk1><a:hlink><a:srgbClr val="0000FF"/></a:hlink></a:clrScheme></a:themeElements></a:theme>"#;
        let mut doc = XmlDocument::parse("t", xml.as_bytes()).unwrap();
        write_colors(&mut doc, &[(ColorSlot::Accent1, "FF0000".to_string())]).unwrap();
        let out = doc.to_xml_string();
        let accent = out.find("a:accent1").unwrap();
        assert!(out.find("a:dk1").unwrap() < accent);
        assert!(accent < out.find("a:hlink").unwrap());
    }

    #[test]
    fn test_default_namespace_theme_gets_unprefixed_elements() {
        let xml = r#"<theme xmlns="http://schemas.openxmlformats.org/drawingml/2006/main" name="Plain"><themeElements><clrScheme name="x"><dk1><sysClr val="windowText" lastClr="000000"/></dk1></clrScheme><fontScheme name="f"><majorFont/><minorFont><latin typeface="Arial"/></minorFont></fontScheme></themeElements></theme>"#;
        let mut doc = XmlDocument::parse("t", xml.as_bytes()).unwrap();
        write_colors(
            &mut doc,
            &[(ColorSlot::Dark1, "111111".to_string()), (ColorSlot::Accent1, "FF0000".to_string())],
        )
        .unwrap();
        write_fonts(&mut doc, "Georgia", "Inter").unwrap();

        let out = doc.to_xml_string();
        assert!(!out.contains("a:"), "{}", out);

        let reparsed = XmlDocument::parse("t", out.as_bytes()).unwrap();
        let snapshot = read_theme("t", &reparsed).unwrap();
        assert_eq!(snapshot.color(ColorSlot::Dark1), Some("111111"));
        assert_eq!(snapshot.color(ColorSlot::Accent1), Some("FF0000"));
        assert_eq!(snapshot.major_font.as_deref(), Some("Georgia"));
        assert_eq!(snapshot.minor_font.as_deref(), Some("Inter"));
    }

    #[test]
    fn test_scheme_prefix_is_reused() {
        let xml = r#"<dml:theme xmlns:dml="http://schemas.openxmlformats.org/drawingml/2006/main"><dml:themeElements><dml:clrScheme name="x"/></dml:themeElements></dml:theme>"#;
        let mut doc = XmlDocument::parse("t", xml.as_bytes()).unwrap();
        write_colors(&mut doc, &[(ColorSlot::Accent2, "00FF00".to_string())]).unwrap();
        assert!(doc.to_xml_string().contains(r#"<dml:accent2><dml:srgbClr val="00FF00"/></dml:accent2>"#));
    }
}
