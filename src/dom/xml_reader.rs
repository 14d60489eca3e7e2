//! Strict XML parsing into an [`XmlDocument`].
//!
//! Unlike the html5ever path this rejects anything that is not well-formed:
//! mismatched or unclosed tags, several root elements, stray text outside the
//! root, and entity references that cannot be resolved.

use html5ever::{LocalName, Namespace, Prefix, QualName, ns};
use quick_xml::Reader;
use quick_xml::escape::unescape_with;
use quick_xml::events::{BytesStart, Event};

use super::arena::{Attribute, NodeId, XmlDocument};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct NamespaceScope {
    default: Namespace,
    prefixes: Vec<(String, Namespace)>,
}

impl NamespaceScope {
    fn root() -> Self {
        Self {
            default: ns!(),
            prefixes: Vec::new(),
        }
    }

    fn lookup(&self, prefix: &str) -> Namespace {
        match prefix {
            "xml" => ns!(xml),
            "xmlns" => ns!(xmlns),
            _ => self
                .prefixes
                .iter()
                .rev()
                .find(|(p, _)| p == prefix)
                .map(|(_, ns)| ns.clone())
                .unwrap_or(ns!()),
        }
    }
}

impl XmlDocument {
    /// Parse well-formed XML.
    pub fn parse(content: &str) -> Result<XmlDocument> {
        let mut reader = Reader::from_str(content);
        let mut dom = XmlDocument::new();
        let document = dom.document();

        let mut open: Vec<NodeId> = Vec::new();
        let mut scopes: Vec<NamespaceScope> = vec![NamespaceScope::root()];
        let mut seen_root = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let parent = current_parent(&open, document, &mut seen_root)?;
                    let scope = scopes.last().cloned().unwrap_or_else(NamespaceScope::root);
                    let (id, scope) = build_element(&mut dom, &e, scope)?;
                    dom.append(parent, id);
                    open.push(id);
                    scopes.push(scope);
                }
                Event::Empty(e) => {
                    let parent = current_parent(&open, document, &mut seen_root)?;
                    let scope = scopes.last().cloned().unwrap_or_else(NamespaceScope::root);
                    let (id, _) = build_element(&mut dom, &e, scope)?;
                    dom.append(parent, id);
                }
                Event::End(e) => {
                    let Some(id) = open.pop() else {
                        return Err(Error::MalformedXml(format!(
                            "unexpected closing tag </{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    };
                    scopes.pop();
                    let expected = dom.qual_name(id).map(qualified_tag).unwrap_or_default();
                    let found = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if expected != found {
                        return Err(Error::MalformedXml(format!(
                            "expected </{expected}>, found </{found}>"
                        )));
                    }
                }
                Event::Text(e) => {
                    let text = String::from_utf8_lossy(e.as_ref());
                    push_text(&mut dom, &open, &text)?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    push_text(&mut dom, &open, &text)?;
                }
                Event::GeneralRef(e) => {
                    let entity = String::from_utf8_lossy(e.as_ref()).into_owned();
                    let resolved = resolve_entity(&entity).ok_or_else(|| {
                        Error::MalformedXml(format!("undefined entity &{entity};"))
                    })?;
                    push_text(&mut dom, &open, &resolved)?;
                }
                Event::Comment(e) => {
                    let comment = dom.create_comment(String::from_utf8_lossy(e.as_ref()).into_owned());
                    let parent = open.last().copied().unwrap_or(document);
                    dom.append(parent, comment);
                }
                Event::DocType(e) => {
                    let (name, public_id, system_id) =
                        parse_doctype(&String::from_utf8_lossy(e.as_ref()));
                    let doctype = dom.create_doctype(name, public_id, system_id);
                    dom.append(document, doctype);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(&unclosed) = open.last() {
            let name = dom.qual_name(unclosed).map(qualified_tag).unwrap_or_default();
            return Err(Error::MalformedXml(format!("unclosed element <{name}>")));
        }
        if !seen_root {
            return Err(Error::MalformedXml("document has no root element".into()));
        }

        Ok(dom)
    }
}

fn current_parent(open: &[NodeId], document: NodeId, seen_root: &mut bool) -> Result<NodeId> {
    match open.last() {
        Some(&parent) => Ok(parent),
        None if *seen_root => Err(Error::MalformedXml(
            "more than one root element".into(),
        )),
        None => {
            *seen_root = true;
            Ok(document)
        }
    }
}

fn push_text(dom: &mut XmlDocument, open: &[NodeId], text: &str) -> Result<()> {
    match open.last() {
        Some(&parent) => {
            dom.append_text(parent, text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::MalformedXml(format!(
            "text outside the root element: {:?}",
            text.trim()
        ))),
    }
}

fn qualified_tag(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local),
        None => name.local.to_string(),
    }
}

fn split_qname(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => (Some(prefix), local),
        _ => (None, raw),
    }
}

fn build_element(
    dom: &mut XmlDocument,
    e: &BytesStart<'_>,
    mut scope: NamespaceScope,
) -> Result<(NodeId, NamespaceScope)> {
    let mut raw_attrs: Vec<(String, String)> = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::MalformedXml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = unescape(&String::from_utf8_lossy(&attr.value))?;
        if key == "xmlns" {
            scope.default = Namespace::from(value.as_str());
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope
                .prefixes
                .push((prefix.to_string(), Namespace::from(value.as_str())));
        }
        raw_attrs.push((key, value));
    }

    let attrs = raw_attrs
        .into_iter()
        .map(|(key, value)| {
            let (prefix, local) = split_qname(&key);
            let name = match prefix {
                Some(prefix) => QualName::new(
                    Some(Prefix::from(prefix)),
                    scope.lookup(prefix),
                    LocalName::from(local),
                ),
                None => QualName::new(None, ns!(), LocalName::from(local)),
            };
            Attribute { name, value }
        })
        .collect();

    let raw_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let (prefix, local) = split_qname(&raw_name);
    let name = match prefix {
        Some(prefix) => QualName::new(
            Some(Prefix::from(prefix)),
            scope.lookup(prefix),
            LocalName::from(local),
        ),
        None => QualName::new(None, scope.default.clone(), LocalName::from(local)),
    };

    Ok((dom.create_element(name, attrs), scope))
}

/// Parse the inside of `<!DOCTYPE ...>` into (name, public id, system id).
fn parse_doctype(raw: &str) -> (String, String, String) {
    let raw = raw.trim();
    let (name, rest) = match raw.find(char::is_whitespace) {
        Some(pos) => (&raw[..pos], raw[pos..].trim_start()),
        None => (raw, ""),
    };

    let mut literals = Vec::new();
    let mut remaining = rest;
    let keyword_end = remaining
        .find(|c: char| c == '"' || c == '\'')
        .unwrap_or(remaining.len());
    let keyword = remaining[..keyword_end].trim().to_ascii_uppercase();
    remaining = &remaining[keyword_end..];
    while let Some(quote) = remaining.chars().next() {
        if quote != '"' && quote != '\'' {
            break;
        }
        let body = &remaining[1..];
        let Some(end) = body.find(quote) else {
            break;
        };
        literals.push(body[..end].to_string());
        remaining = body[end + 1..].trim_start();
    }

    let (public_id, system_id) = match (keyword.as_str(), literals.as_slice()) {
        ("PUBLIC", [public, system, ..]) => (public.clone(), system.clone()),
        ("PUBLIC", [public]) => (public.clone(), String::new()),
        ("SYSTEM", [system, ..]) => (String::new(), system.clone()),
        _ => (String::new(), String::new()),
    };
    (name.to_string(), public_id, system_id)
}

/// Resolve the body of an entity reference (without `&` and `;`).
fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    if let Some(dec) = entity.strip_prefix('#') {
        return dec
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    named_entity(entity).map(String::from)
}

/// Replacement text of a named entity.
fn named_entity(name: &str) -> Option<&'static str> {
    let text = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        // Named HTML entities that turn up in hand-edited XHTML
        "nbsp" => "\u{a0}",
        "shy" => "\u{ad}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "zwnj" => "\u{200c}",
        "zwj" => "\u{200d}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "sbquo" => "\u{201a}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "bdquo" => "\u{201e}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "hellip" => "\u{2026}",
        "bull" => "\u{2022}",
        "middot" => "\u{b7}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "deg" => "\u{b0}",
        "sect" => "\u{a7}",
        "para" => "\u{b6}",
        "times" => "\u{d7}",
        "dagger" => "\u{2020}",
        "Dagger" => "\u{2021}",
        _ => return None,
    };
    Some(text)
}

/// Replace entity references in raw attribute text.
fn unescape(raw: &str) -> Result<String> {
    unescape_with(raw, named_entity)
        .map(|text| text.into_owned())
        .map_err(|e| Error::MalformedXml(format!("{e} in {raw:?}")))
}
