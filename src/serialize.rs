//! XHTML pretty-printer.
//!
//! Layout is decided per element by local name:
//!
//! * **Block** elements (the default) drop whitespace-only text, put every
//!   child on its own indented line and collapse the whitespace inside text.
//!   Children in [`BLANK_LINE_AFTER`] are followed by an empty line unless they
//!   are the last child.
//! * **Preserve** elements ([`PRESERVE_WHITESPACE`]) and everything inside them
//!   are written inline. Runs of two or more whitespace characters become one
//!   space, leading whitespace of the first child and trailing whitespace of
//!   the last child are removed, and a `<br />` is followed by a newline
//!   (not when empty elements are expanded).
//! * **Raw** elements ([`RAW_TEXT`]) keep their content exactly.
//!
//! Elements with no content after these rules are written as `<tag />`, or
//! as `<tag></tag>` with [`SerializeOptions::expand_empty_elements`].
//!
//! Serializing, re-parsing the result as XML and serializing again gives the
//! same text.

use crate::dom::{NodeData, NodeId, XmlDocument};

/// Elements whose text content is laid out inline.
pub const PRESERVE_WHITESPACE: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "th", "td", "a"];

/// Elements followed by a blank line when they are not the last child.
pub const BLANK_LINE_AFTER: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "div", "blockquote", "table", "tr",
];

/// Elements whose content is written verbatim.
pub const RAW_TEXT: &[&str] = &["pre", "script", "style", "textarea"];

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>";

/// Serializer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Write empty elements as `<tag></tag>` instead of `<tag />`.
    pub expand_empty_elements: bool,
    /// Spaces per nesting level.
    pub indent: usize,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            expand_empty_elements: false,
            indent: 2,
        }
    }
}

impl SerializeOptions {
    pub fn with_expand_empty_elements(mut self, expand: bool) -> Self {
        self.expand_empty_elements = expand;
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }
}

/// Serialize a whole document: XML declaration, DOCTYPE, then the root element.
pub fn serialize_document(doc: &XmlDocument, options: &SerializeOptions) -> String {
    let mut writer = Writer::new(doc, options);
    let mut out = String::with_capacity(doc.len() * 16);
    out.push_str(XML_DECLARATION);
    out.push('\n');

    for child in doc.children(doc.document()) {
        let Some(node) = doc.get(child) else {
            continue;
        };
        match &node.data {
            NodeData::Doctype {
                name,
                public_id,
                system_id,
            } => {
                write_doctype(&mut out, name, public_id, system_id);
                out.push('\n');
            }
            NodeData::Element { .. } => {
                writer.write_element(child, 0, Mode::Block, &mut out);
                out.push('\n');
            }
            NodeData::Comment(text) => {
                write_comment(&mut out, text);
                out.push('\n');
            }
            NodeData::Text(_) | NodeData::Document => {}
        }
    }
    out
}

/// Serialize one element subtree without declaration or DOCTYPE.
///
/// Namespaces declared on ancestors are not in scope, so the element gets
/// whatever declarations it needs.
pub fn serialize_node(doc: &XmlDocument, id: NodeId, options: &SerializeOptions) -> String {
    let mut writer = Writer::new(doc, options);
    let mut out = String::new();
    match doc.get(id).map(|n| &n.data) {
        Some(NodeData::Element { .. }) => writer.write_element(id, 0, Mode::Block, &mut out),
        Some(NodeData::Text(text)) => escape_text(&mut out, text),
        Some(NodeData::Comment(text)) => write_comment(&mut out, text),
        _ => {}
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Block,
    Preserve,
    Raw,
}

#[derive(Debug, Clone, Default)]
struct Scope {
    default: String,
    prefixes: Vec<(String, String)>,
}

impl Scope {
    fn declares(&self, prefix: &str) -> bool {
        self.prefixes.iter().any(|(p, _)| p == prefix)
    }
}

fn well_known_namespace(prefix: &str) -> Option<&'static str> {
    match prefix {
        "epub" => Some("http://www.idpf.org/2007/ops"),
        "xlink" => Some("http://www.w3.org/1999/xlink"),
        "svg" => Some("http://www.w3.org/2000/svg"),
        "m" | "mml" => Some("http://www.w3.org/1998/Math/MathML"),
        _ => None,
    }
}

enum Item<'d> {
    Text(String),
    Node(NodeId, Option<&'d str>),
}

struct Writer<'a> {
    doc: &'a XmlDocument,
    options: &'a SerializeOptions,
    scopes: Vec<Scope>,
}

impl<'a> Writer<'a> {
    fn new(doc: &'a XmlDocument, options: &'a SerializeOptions) -> Self {
        Self {
            doc,
            options,
            scopes: vec![Scope::default()],
        }
    }

    fn indent(&self, out: &mut String, depth: usize) {
        out.extend(std::iter::repeat_n(' ', depth * self.options.indent));
    }

    fn write_element(&mut self, id: NodeId, depth: usize, inherited: Mode, out: &mut String) {
        let doc = self.doc;
        let Some(name) = doc.qual_name(id) else {
            return;
        };
        let local = &*name.local;
        let mode = match inherited {
            Mode::Raw => Mode::Raw,
            _ if RAW_TEXT.contains(&local) => Mode::Raw,
            Mode::Preserve => Mode::Preserve,
            Mode::Block if PRESERVE_WHITESPACE.contains(&local) => Mode::Preserve,
            Mode::Block => Mode::Block,
        };

        let tag = match &name.prefix {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        };

        let open = self.open_tag(id, &tag);
        let content = match mode {
            Mode::Block => self.block_content(id, depth),
            Mode::Preserve => self.inline_content(id, PRESERVE_WHITESPACE.contains(&local)),
            Mode::Raw => self.raw_content(id),
        };
        self.scopes.pop();

        out.push_str(&open);
        if content.is_empty() {
            if self.options.expand_empty_elements {
                out.push_str("></");
                out.push_str(&tag);
                out.push('>');
            } else {
                out.push_str(" />");
            }
        } else {
            out.push('>');
            out.push_str(&content);
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }

        if local == "br" && mode == Mode::Preserve && !self.options.expand_empty_elements {
            out.push('\n');
        }
    }

    /// Build `<tag attrs...` (unterminated) and push the element's namespace scope.
    fn open_tag(&mut self, id: NodeId, tag: &str) -> String {
        let doc = self.doc;
        let mut scope = self.scopes.last().cloned().unwrap_or_default();
        let attrs = doc.attrs(id);
        let mut explicit_default = false;

        for attr in attrs {
            let qname = attr.qualified_name();
            if qname == "xmlns" {
                explicit_default = true;
                scope.default = attr.value.clone();
            } else if let Some(prefix) = qname.strip_prefix("xmlns:") {
                scope
                    .prefixes
                    .push((prefix.to_string(), attr.value.clone()));
            }
        }

        let mut leading: Option<String> = None;
        let mut trailing: Vec<(String, String)> = Vec::new();

        if let Some(name) = doc.qual_name(id) {
            match &name.prefix {
                None => {
                    let ns = &*name.ns;
                    if !explicit_default && ns != scope.default {
                        leading = Some(ns.to_string());
                        scope.default = ns.to_string();
                    }
                }
                Some(prefix) => {
                    require_prefix(prefix, &name.ns, &mut scope, &mut trailing)
                }
            }
        }

        for attr in attrs {
            let qname = attr.qualified_name();
            if let Some((prefix, _)) = qname.split_once(':') {
                require_prefix(prefix, &attr.name.ns, &mut scope, &mut trailing);
            }
        }

        let mut open = String::with_capacity(tag.len() + attrs.len() * 16 + 1);
        open.push('<');
        open.push_str(tag);
        if let Some(ns) = leading {
            write_attr(&mut open, "xmlns", &ns);
        }
        for attr in attrs {
            write_attr(&mut open, &attr.qualified_name(), &attr.value);
        }
        for (prefix, ns) in &trailing {
            write_attr(&mut open, &format!("xmlns:{prefix}"), ns);
        }

        self.scopes.push(scope);
        open
    }

    fn block_content(&mut self, id: NodeId, depth: usize) -> String {
        let doc = self.doc;
        let mut items: Vec<Item<'_>> = Vec::new();
        for child in doc.children(id) {
            match doc.get(child).map(|n| &n.data) {
                Some(NodeData::Text(text)) => {
                    let text = collapse_whitespace(text);
                    if !text.is_empty() {
                        items.push(Item::Text(text));
                    }
                }
                Some(NodeData::Element { name, .. }) => {
                    items.push(Item::Node(child, Some(&*name.local)))
                }
                Some(NodeData::Comment(_)) => items.push(Item::Node(child, None)),
                _ => {}
            }
        }

        let mut buf = String::new();
        if items.iter().all(|item| matches!(item, Item::Text(_))) {
            for item in &items {
                if let Item::Text(text) = item {
                    escape_text(&mut buf, text);
                }
            }
            return buf;
        }

        let last = items.len() - 1;
        for (i, item) in items.iter().enumerate() {
            buf.push('\n');
            self.indent(&mut buf, depth + 1);
            match item {
                Item::Text(text) => escape_text(&mut buf, text),
                Item::Node(child, Some(local)) => {
                    self.write_element(*child, depth + 1, Mode::Block, &mut buf);
                    if i != last && BLANK_LINE_AFTER.contains(local) {
                        buf.push('\n');
                    }
                }
                Item::Node(child, None) => {
                    if let Some(text) = doc.get(*child).and_then(|n| match &n.data {
                        NodeData::Comment(text) => Some(text.as_str()),
                        _ => None,
                    }) {
                        write_comment(&mut buf, text);
                    }
                }
            }
        }
        buf.push('\n');
        self.indent(&mut buf, depth);
        buf
    }

    fn inline_content(&mut self, id: NodeId, trim_edges: bool) -> String {
        let doc = self.doc;
        let children: Vec<NodeId> = doc.children(id).collect();
        let last = children.len().saturating_sub(1);
        let mut buf = String::new();
        let mut after_br = false;

        for (i, &child) in children.iter().enumerate() {
            match doc.get(child).map(|n| &n.data) {
                Some(NodeData::Text(text)) => {
                    let collapsed = collapse_runs(text);
                    let mut text = collapsed.as_str();
                    if after_br || (trim_edges && i == 0) {
                        text = text.trim_start_matches(is_xml_whitespace);
                    }
                    if trim_edges && i == last {
                        text = text.trim_end_matches(is_xml_whitespace);
                    }
                    escape_text(&mut buf, text);
                    after_br = false;
                }
                Some(NodeData::Element { name, .. }) => {
                    after_br = &*name.local == "br" && !self.options.expand_empty_elements;
                    self.write_element(child, 0, Mode::Preserve, &mut buf);
                }
                Some(NodeData::Comment(text)) => {
                    write_comment(&mut buf, text);
                    after_br = false;
                }
                _ => {}
            }
        }
        buf
    }

    fn raw_content(&mut self, id: NodeId) -> String {
        let doc = self.doc;
        let mut buf = String::new();
        for child in doc.children(id) {
            match doc.get(child).map(|n| &n.data) {
                Some(NodeData::Text(text)) => escape_text(&mut buf, text),
                Some(NodeData::Element { .. }) => {
                    self.write_element(child, 0, Mode::Raw, &mut buf)
                }
                Some(NodeData::Comment(text)) => write_comment(&mut buf, text),
                _ => {}
            }
        }
        buf
    }
}

/// Declare `prefix` in `scope` if it is used but not yet declared.
fn require_prefix(
    prefix: &str,
    ns: &str,
    scope: &mut Scope,
    trailing: &mut Vec<(String, String)>,
) {
    if prefix == "xml" || prefix == "xmlns" || scope.declares(prefix) {
        return;
    }
    let uri = if ns.is_empty() {
        match well_known_namespace(prefix) {
            Some(uri) => uri,
            None => return,
        }
    } else {
        ns
    };
    scope.prefixes.push((prefix.to_string(), uri.to_string()));
    trailing.push((prefix.to_string(), uri.to_string()));
}

fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Every whitespace run becomes one space; the ends are trimmed.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split(is_xml_whitespace).filter(|w| !w.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Runs of two or more whitespace characters become one space.
fn collapse_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if is_xml_whitespace(c) && chars.peek().is_some_and(|&next| is_xml_whitespace(next)) {
            while chars.peek().is_some_and(|&next| is_xml_whitespace(next)) {
                chars.next();
            }
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn write_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

fn write_comment(out: &mut String, text: &str) {
    out.push_str("<!--");
    out.push_str(text);
    out.push_str("-->");
}

fn write_doctype(out: &mut String, name: &str, public_id: &str, system_id: &str) {
    out.push_str("<!DOCTYPE ");
    out.push_str(name);
    if !public_id.is_empty() {
        out.push_str(" PUBLIC \"");
        out.push_str(public_id);
        out.push('"');
        if !system_id.is_empty() {
            out.push_str(" \"");
            out.push_str(system_id);
            out.push('"');
        }
    } else if !system_id.is_empty() {
        out.push_str(" SYSTEM \"");
        out.push_str(system_id);
        out.push('"');
    }
    out.push('>');
}
