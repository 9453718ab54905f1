//! A small navigable XML tree on top of `quick-xml`.
//!
//! Package parts are edited in place, so the tree keeps everything it reads:
//! declaration, comments, whitespace and the original (escaped) form of text
//! and attribute values. Writing an untouched tree reproduces the input
//! apart from attribute quoting.
//!
//! Every element records the namespace URI its prefix resolved to at parse
//! time, which is what lookups such as [`Element::child_ns`] match on.

use quick_xml::Reader;
use quick_xml::escape::{escape, partial_escape, unescape};
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};

/// One node in element content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Escaped character data, exactly as it appeared in the source.
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
    Declaration(String),
    DocType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    namespace: Option<String>,
    /// Attribute name and escaped value, in document order.
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    self_closing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

fn utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

impl Element {
    /// Create an empty element. `namespace` is the URI the name's prefix is
    /// bound to in the place the element will be inserted.
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: true,
        }
    }

    /// Qualified name as written, e.g. `a:srgbClr`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local_name() == local
    }

    /// Unescaped attribute value by qualified name.
    pub fn attr(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| match unescape(v) {
                Ok(s) => s.into_owned(),
                Err(_) => v.clone(),
            })
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, String)> {
        self.attributes.iter().map(|(k, v)| {
            let value = unescape(v).map(|s| s.into_owned()).unwrap_or_else(|_| v.clone());
            (k.as_str(), value)
        })
    }

    /// Set (or add) an attribute; `value` is escaped on write.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        let escaped = escape(value).into_owned();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = escaped,
            None => self.attributes.push((name.to_string(), escaped)),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(k, _)| k != name);
        before != self.attributes.len()
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First direct child with the given namespace and local name.
    pub fn child_ns(&self, namespace: &str, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(namespace, local))
    }

    pub fn child_ns_mut(&mut self, namespace: &str, local: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.is(namespace, local))
    }

    /// Walk a path of local names, all in `namespace`.
    pub fn path_ns(&self, namespace: &str, path: &[&str]) -> Option<&Element> {
        path.iter()
            .try_fold(self, |el, local| el.child_ns(namespace, local))
    }

    pub fn path_ns_mut(&mut self, namespace: &str, path: &[&str]) -> Option<&mut Element> {
        let mut current = self;
        for local in path {
            current = current.child_ns_mut(namespace, local)?;
        }
        Some(current)
    }

    /// First descendant (depth-first, document order) matching namespace and name.
    pub fn find_ns(&self, namespace: &str, local: &str) -> Option<&Element> {
        for child in self.elements() {
            if child.is(namespace, local) {
                return Some(child);
            }
            if let Some(found) = child.find_ns(namespace, local) {
                return Some(found);
            }
        }
        None
    }

    /// Visit this element and every descendant element.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Element)) {
        visit(self);
        for child in self.elements() {
            child.walk(visit);
        }
    }

    /// Concatenated unescaped text of direct text and CDATA children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(raw) => match unescape(raw) {
                    Ok(s) => out.push_str(&s),
                    Err(_) => out.push_str(raw),
                },
                Node::CData(data) => out.push_str(data),
                _ => {},
            }
        }
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.children = vec![Node::Text(partial_escape(text).into_owned())];
        self.self_closing = false;
    }

    /// Whether `f` holds for the unescaped value of any text or CDATA node
    /// below this element. Visits the same nodes as [`Element::rewrite_text`].
    pub fn any_text(&self, f: &mut dyn FnMut(&str) -> bool) -> bool {
        self.children.iter().any(|child| match child {
            Node::Text(raw) => match unescape(raw) {
                Ok(s) => f(&s),
                Err(_) => f(raw),
            },
            Node::CData(data) => f(data),
            Node::Element(el) => el.any_text(f),
            _ => false,
        })
    }

    /// Apply `f` to the unescaped value of every text and CDATA node below
    /// this element. Returns how many nodes `f` reported as changed.
    pub fn rewrite_text(&mut self, f: &mut dyn FnMut(&str) -> Option<String>) -> usize {
        let mut changed = 0;
        for child in &mut self.children {
            match child {
                Node::Text(raw) => {
                    let current = unescape(raw)
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| raw.clone());
                    if let Some(updated) = f(&current) {
                        *raw = partial_escape(&updated).into_owned();
                        changed += 1;
                    }
                },
                Node::CData(data) => {
                    if let Some(updated) = f(data) {
                        // a CDATA section cannot carry its own terminator
                        *child = if updated.contains("]]>") {
                            Node::Text(partial_escape(&updated).into_owned())
                        } else {
                            Node::CData(updated)
                        };
                        changed += 1;
                    }
                },
                Node::Element(el) => changed += el.rewrite_text(f),
                _ => {},
            }
        }
        changed
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Replace the first direct child matching `namespace`/`local` in place,
    /// or append when there is none.
    pub fn replace_child(&mut self, namespace: &str, local: &str, replacement: Element) {
        let position = self.children.iter().position(
            |n| matches!(n, Node::Element(e) if e.is(namespace, local)),
        );
        match position {
            Some(i) => self.children[i] = Node::Element(replacement),
            None => self.push(replacement),
        }
    }

    /// Drop every direct child element; text and comments are kept.
    pub fn clear_elements(&mut self) {
        self.children.retain(|n| !matches!(n, Node::Element(_)));
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let quote = if value.contains('"') { '\'' } else { '"' };
            out.push(' ');
            out.push_str(key);
            out.push('=');
            out.push(quote);
            out.push_str(value);
            out.push(quote);
        }
        if self.children.is_empty() && self.self_closing {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            child.write(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl Node {
    fn write(&self, out: &mut String) {
        match self {
            Node::Element(e) => e.write(out),
            Node::Text(t) => out.push_str(t),
            Node::CData(c) => {
                out.push_str("<![CDATA[");
                out.push_str(c);
                out.push_str("]]>");
            },
            Node::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            },
            Node::ProcessingInstruction(p) | Node::Declaration(p) => {
                out.push_str("<?");
                out.push_str(p);
                out.push_str("?>");
            },
            Node::DocType(d) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(d);
                out.push('>');
            },
        }
    }
}

/// Prefix bindings introduced by one element.
type Scope = Vec<(Option<String>, String)>;

fn resolve(scopes: &[Scope], prefix: Option<&str>) -> Option<String> {
    match prefix {
        Some("xml") => return Some("http://www.w3.org/XML/1998/namespace".to_string()),
        Some("xmlns") => return None,
        _ => {},
    }
    scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter())
        .find(|(p, _)| p.as_deref() == prefix)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty())
}

fn open_element(
    path: &str,
    start: &BytesStart<'_>,
    scopes: &mut Vec<Scope>,
    self_closing: bool,
) -> Result<Element> {
    let name = utf8(start.name().as_ref());
    let mut attributes = Vec::new();
    let mut scope = Scope::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Xml {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let key = utf8(attr.key.as_ref());
        let value = utf8(&attr.value);
        if key == "xmlns" {
            scope.push((None, value.clone()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.push((Some(prefix.to_string()), value.clone()));
        }
        attributes.push((key, value));
    }

    scopes.push(scope);
    let namespace = resolve(scopes, split_qname(&name).0);

    Ok(Element {
        name,
        namespace,
        attributes,
        children: Vec::new(),
        self_closing,
    })
}

impl XmlDocument {
    /// Parse a part. `path` is only used for error messages.
    pub fn parse(path: &str, bytes: &[u8]) -> Result<Self> {
        let xml_error = |reason: String| Error::Xml {
            path: path.to_string(),
            reason,
        };

        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut scopes: Vec<Scope> = Vec::new();
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let node = match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let element = open_element(path, &e, &mut scopes, false)?;
                    stack.push(element);
                    None
                },
                Ok(Event::Empty(e)) => {
                    let element = open_element(path, &e, &mut scopes, true)?;
                    scopes.pop();
                    Some(Node::Element(element))
                },
                Ok(Event::End(_)) => {
                    scopes.pop();
                    let element = stack
                        .pop()
                        .ok_or_else(|| xml_error("unexpected closing tag".to_string()))?;
                    Some(Node::Element(element))
                },
                Ok(Event::Text(t)) => Some(Node::Text(utf8(&t))),
                Ok(Event::GeneralRef(r)) => Some(Node::Text(format!("&{};", utf8(&r)))),
                Ok(Event::CData(c)) => Some(Node::CData(utf8(&c))),
                Ok(Event::Comment(c)) => Some(Node::Comment(utf8(&c))),
                Ok(Event::Decl(d)) => Some(Node::Declaration(utf8(&d))),
                Ok(Event::PI(p)) => Some(Node::ProcessingInstruction(utf8(&p))),
                Ok(Event::DocType(d)) => Some(Node::DocType(utf8(&d))),
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error(e.to_string())),
            };
            buf.clear();

            let Some(node) = node else { continue };
            if let Some(parent) = stack.last_mut() {
                // Merge text split around entity references back together.
                if let Node::Text(next) = &node
                    && let Some(Node::Text(prev)) = parent.children.last_mut()
                {
                    prev.push_str(next);
                    continue;
                }
                parent.children.push(node);
                continue;
            }
            match (node, root.is_some()) {
                (Node::Element(el), false) => root = Some(el),
                (Node::Element(_), true) => {
                    return Err(xml_error("multiple root elements".to_string()));
                },
                (other, false) => prolog.push(other),
                (other, true) => epilog.push(other),
            }
        }

        if !stack.is_empty() {
            return Err(xml_error("unclosed element at end of input".to_string()));
        }
        let root = root.ok_or_else(|| xml_error("no root element".to_string()))?;

        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    /// A document with the standard standalone declaration.
    pub fn with_root(root: Element) -> Self {
        Self {
            prolog: vec![
                Node::Declaration(
                    r#"xml version="1.0" encoding="UTF-8" standalone="yes""#.to_string(),
                ),
                Node::Text("\r\n".to_string()),
            ],
            root,
            epilog: Vec::new(),
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        for node in &self.prolog {
            node.write(&mut out);
        }
        self.root.write(&mut out);
        for node in &self.epilog {
            node.write(&mut out);
        }
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_xml_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office"><!-- c --><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1></a:clrScheme></a:themeElements><a:t>Fish &amp; Chips</a:t></a:theme>"#;

    #[test]
    fn test_untouched_tree_writes_back_identically() {
        let doc = XmlDocument::parse("theme1.xml", SAMPLE.as_bytes()).unwrap();
        assert_eq!(doc.to_xml_string(), SAMPLE);
    }

    #[test]
    fn test_namespace_lookup_ignores_prefix_spelling() {
        let xml = r#"<x:theme xmlns:x="http://schemas.openxmlformats.org/drawingml/2006/main"><x:themeElements/></x:theme>"#;
        let doc = XmlDocument::parse("t", xml.as_bytes()).unwrap();
        assert!(doc.root().is(A, "theme"));
        assert!(doc.root().child_ns(A, "themeElements").is_some());
    }

    #[test]
    fn test_entity_text_is_merged_and_unescaped() {
        let doc = XmlDocument::parse("t", SAMPLE.as_bytes()).unwrap();
        let t = doc.root().child_ns(A, "t").unwrap();
        assert_eq!(t.text(), "Fish & Chips");
        assert_eq!(t.children().len(), 1);
    }

    #[test]
    fn test_path_and_attribute_edit() {
        let mut doc = XmlDocument::parse("t", SAMPLE.as_bytes()).unwrap();
        let dk1 = doc
            .root_mut()
            .path_ns_mut(A, &["themeElements", "clrScheme", "dk1"])
            .unwrap();
        let sys = dk1.child_ns(A, "sysClr").unwrap();
        assert_eq!(sys.attr("lastClr").as_deref(), Some("000000"));

        let replacement = Element::new("a:srgbClr", Some(A)).with_attr("val", "112233");
        dk1.replace_child(A, "sysClr", replacement);
        let out = doc.to_xml_string();
        assert!(out.contains(r#"<a:dk1><a:srgbClr val="112233"/></a:dk1>"#));
    }

    #[test]
    fn test_rewrite_text_escapes_output() {
        let mut doc = XmlDocument::parse("t", SAMPLE.as_bytes()).unwrap();
        let changed = doc
            .root_mut()
            .rewrite_text(&mut |s: &str| s.contains("Chips").then(|| s.replace("Chips", "<Peas>")));
        assert_eq!(changed, 1);
        assert!(doc.to_xml_string().contains("Fish &amp; &lt;Peas&gt;"));
    }

    #[test]
    fn test_malformed_input() {
        let err = XmlDocument::parse("bad.xml", b"<a><b></a>").unwrap_err();
        assert_eq!(err.code(), "XML_MALFORMED");
        assert!(XmlDocument::parse("empty.xml", b"").is_err());
        assert!(XmlDocument::parse("open.xml", b"<a>").is_err());
    }

    #[test]
    fn test_default_namespace() {
        let xml = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml"/></Types>"#;
        let doc = XmlDocument::parse("ct", xml.as_bytes()).unwrap();
        let ns = "http://schemas.openxmlformats.org/package/2006/content-types";
        assert!(doc.root().child_ns(ns, "Default").is_some());
    }
}
