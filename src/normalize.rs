//! Tag-soup HTML to well-formed XHTML.
//!
//! Input bytes are decoded as UTF-8 and parsed tolerantly with html5ever.
//! If the document declares another charset in a `meta` element, the
//! original bytes are decoded again with that charset and parsed once more.
//! The tree is then moved into the XHTML namespace, given the DOCTYPE of the
//! target EPUB version and pretty-printed.

use std::fmt;
use std::str::FromStr;

use encoding_rs::{Encoding, UTF_8};
use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::{LocalName, ns};
use log::debug;

use crate::dom::{ArenaSink, LINE_MARKER_PREFIX, NodeData, NodeId, XmlDocument};
use crate::serialize::{SerializeOptions, serialize_document};

/// Target EPUB version. Selects the DOCTYPE of normalized documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EpubVersion {
    V2,
    #[default]
    V3,
    V31,
}

impl EpubVersion {
    /// DOCTYPE as (name, public id, system id).
    pub fn doctype(self) -> (&'static str, &'static str, &'static str) {
        match self {
            EpubVersion::V2 => (
                "html",
                "-//W3C//DTD XHTML 1.1//EN",
                "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd",
            ),
            EpubVersion::V3 | EpubVersion::V31 => ("html", "", ""),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EpubVersion::V2 => "2",
            EpubVersion::V3 => "3",
            EpubVersion::V31 => "3.1",
        }
    }
}

impl fmt::Display for EpubVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EpubVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2" | "2.0" | "2.0.1" => Ok(EpubVersion::V2),
            "3" | "3.0" | "3.0.1" => Ok(EpubVersion::V3),
            "3.1" => Ok(EpubVersion::V31),
            other => Err(format!("unsupported EPUB version: {other}")),
        }
    }
}

/// Normalizer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub version: EpubVersion,
    /// Tag every element with its source line (see [`LINE_MARKER_PREFIX`]).
    pub tag_source_lines: bool,
    pub serialize: SerializeOptions,
}

impl NormalizeOptions {
    pub fn new(version: EpubVersion) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    pub fn with_source_lines(mut self, tag: bool) -> Self {
        self.tag_source_lines = tag;
        self
    }

    pub fn with_serialize_options(mut self, options: SerializeOptions) -> Self {
        self.serialize = options;
        self
    }
}

/// Normalize arbitrary HTML bytes into pretty-printed XHTML.
///
/// Never fails: anything html5ever accepts produces output.
pub fn normalize_html(bytes: &[u8], options: &NormalizeOptions) -> String {
    let mut doc = parse_tag_soup(bytes, options.tag_source_lines);
    let repaired = make_well_formed(&mut doc);
    if repaired > 0 {
        debug!("Repaired {repaired} node(s) that are not valid XML");
    }
    apply_version(&mut doc, options.version);
    serialize_document(&doc, &options.serialize)
}

/// Parse HTML bytes, re-decoding once if a `meta` element declares a charset.
pub fn parse_tag_soup(bytes: &[u8], tag_source_lines: bool) -> XmlDocument {
    let (text, _, _) = UTF_8.decode(bytes);
    let first = parse_text(&text, tag_source_lines);

    let Some(label) = declared_charset(&first) else {
        return first;
    };
    let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
        debug!("Unknown charset {label:?} declared, keeping UTF-8 decode");
        return first;
    };
    if encoding == UTF_8 {
        return first;
    }

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!("Content is not valid {}, keeping UTF-8 decode", encoding.name());
        return first;
    }
    debug!("Re-decoding document as {}", encoding.name());

    let mut second = parse_text(&text, tag_source_lines);
    rewrite_declared_charset(&mut second);
    second
}

/// Put unqualified elements in the XHTML namespace and set the version's DOCTYPE.
pub fn apply_version(doc: &mut XmlDocument, version: EpubVersion) {
    doc.force_namespace(&ns!(html));
    let (name, public_id, system_id) = version.doctype();
    doc.set_doctype(name, public_id, system_id);
}

/// Repair what the tolerant parser keeps but XML forbids.
///
/// Attributes whose name is not a qualified XML name are dropped, invalid
/// element names have their offending characters replaced with `_`,
/// characters outside the XML character range are removed from text,
/// attribute values and comments, and comments are kept free of `--` and a
/// trailing `-`. Returns the number of nodes changed.
pub fn make_well_formed(doc: &mut XmlDocument) -> usize {
    let ids: Vec<NodeId> = doc.descendants(doc.document()).collect();
    let mut changed = 0;
    for id in ids {
        let Some(node) = doc.get_mut(id) else {
            continue;
        };
        let touched = match &mut node.data {
            NodeData::Element { name, attrs } => {
                let mut touched = false;
                if !is_ncname(&name.local) {
                    name.local = LocalName::from(sanitize_ncname(&name.local));
                    touched = true;
                }
                let before = attrs.len();
                attrs.retain(|attr| is_qname(&attr.qualified_name()));
                touched |= attrs.len() != before;
                for attr in attrs.iter_mut() {
                    touched |= retain_xml_chars(&mut attr.value);
                }
                touched
            }
            NodeData::Text(text) => retain_xml_chars(text),
            NodeData::Comment(text) => {
                let mut touched = retain_xml_chars(text);
                while text.contains("--") {
                    *text = text.replace("--", "- -");
                    touched = true;
                }
                if text.ends_with('-') {
                    text.push(' ');
                    touched = true;
                }
                touched
            }
            NodeData::Document | NodeData::Doctype { .. } => false,
        };
        if touched {
            changed += 1;
        }
    }
    changed
}

fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n'
            | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

fn is_name_start_char(c: char) -> bool {
    matches!(
        c,
        'A'..='Z'
            | '_'
            | 'a'..='z'
            | '\u{C0}'..='\u{D6}'
            | '\u{D8}'..='\u{F6}'
            | '\u{F8}'..='\u{2FF}'
            | '\u{370}'..='\u{37D}'
            | '\u{37F}'..='\u{1FFF}'
            | '\u{200C}'..='\u{200D}'
            | '\u{2070}'..='\u{218F}'
            | '\u{2C00}'..='\u{2FEF}'
            | '\u{3001}'..='\u{D7FF}'
            | '\u{F900}'..='\u{FDCF}'
            | '\u{FDF0}'..='\u{FFFD}'
            | '\u{10000}'..='\u{EFFFF}'
    )
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(
            c,
            '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

/// XML name without a colon.
fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_name_start_char) && chars.all(is_name_char)
}

/// `local` or `prefix:local`.
fn is_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_ncname(prefix) && is_ncname(local),
        None => is_ncname(name),
    }
}

fn sanitize_ncname(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if is_name_char(c) { c } else { '_' })
        .collect();
    if !out.starts_with(is_name_start_char) {
        out.insert(0, '_');
    }
    out
}

/// Drop characters XML cannot represent. Returns whether anything was removed.
fn retain_xml_chars(text: &mut String) -> bool {
    if text.chars().all(is_xml_char) {
        return false;
    }
    text.retain(is_xml_char);
    true
}

fn parse_text(text: &str, tag_source_lines: bool) -> XmlDocument {
    let sink = if tag_source_lines {
        ArenaSink::with_line_tagging()
    } else {
        ArenaSink::new()
    };
    parse_document(sink, ParseOpts::default())
        .one(text)
        .into_dom()
}

fn meta_elements(doc: &XmlDocument) -> Vec<NodeId> {
    doc.elements()
        .filter(|&id| doc.element_name(id).is_some_and(|n| &**n == "meta"))
        .collect()
}

fn is_content_type(doc: &XmlDocument, meta: NodeId) -> bool {
    doc.get_attr(meta, "http-equiv")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("content-type"))
}

/// Byte range of the charset value inside a `content` attribute.
fn charset_range(content: &str) -> Option<(usize, usize)> {
    let lower = content.to_ascii_lowercase();
    let start = lower.find("charset=")? + "charset=".len();
    let rest = &content[start..];
    let len = rest.find([';', ' ', '\t']).unwrap_or(rest.len());
    Some((start, start + len))
}

/// The charset a document declares for itself, if any.
pub fn declared_charset(doc: &XmlDocument) -> Option<String> {
    for meta in meta_elements(doc) {
        if let Some(charset) = doc.get_attr(meta, "charset") {
            let charset = charset.trim();
            if !charset.is_empty() {
                return Some(charset.to_string());
            }
        }
        if is_content_type(doc, meta)
            && let Some(content) = doc.get_attr(meta, "content")
            && let Some((start, end)) = charset_range(content)
        {
            let charset = content[start..end].trim_matches(|c| c == '"' || c == '\'');
            if !charset.is_empty() {
                return Some(charset.to_string());
            }
        }
    }
    None
}

/// The document has been decoded, so its charset declaration now says UTF-8.
fn rewrite_declared_charset(doc: &mut XmlDocument) {
    for meta in meta_elements(doc) {
        if doc.get_attr(meta, "charset").is_some() {
            doc.set_attr(meta, "charset", "utf-8");
        }
        if !is_content_type(doc, meta) {
            continue;
        }
        let rewritten = doc.get_attr(meta, "content").and_then(|content| {
            let (start, end) = charset_range(content)?;
            Some(format!("{}utf-8{}", &content[..start], &content[end..]))
        });
        if let Some(content) = rewritten {
            doc.set_attr(meta, "content", content);
        }
    }
}

/// Remove line markers from every `class` attribute, dropping attributes
/// left empty. Returns the number of elements changed.
pub fn strip_line_markers(doc: &mut XmlDocument) -> usize {
    let ids: Vec<NodeId> = doc.elements().collect();
    let mut changed = 0;
    for id in ids {
        let Some(class) = doc.get_attr(id, "class") else {
            continue;
        };
        if !class.contains(LINE_MARKER_PREFIX) {
            continue;
        }
        let kept: Vec<&str> = class
            .split_ascii_whitespace()
            .filter(|token| !token.starts_with(LINE_MARKER_PREFIX))
            .collect();
        let kept = kept.join(" ");
        if kept.is_empty() {
            doc.remove_attr(id, "class");
        } else {
            doc.set_attr(id, "class", kept);
        }
        changed += 1;
    }
    changed
}

/// Source line recorded on an element by line tagging.
pub fn source_line(doc: &XmlDocument, id: NodeId) -> Option<u64> {
    doc.get_attr(id, "class")?
        .split_ascii_whitespace()
        .find_map(|token| token.strip_prefix(LINE_MARKER_PREFIX)?.parse().ok())
}
