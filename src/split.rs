//! Split one XHTML document into two well-formed documents at a text offset.
//!
//! The front fragment gets closing tags for every element still open at the
//! split point. The back fragment gets the same elements reopened, a copy of
//! the original `head`, the XHTML namespace and the version's DOCTYPE.

use std::sync::LazyLock;

use html5ever::{LocalName, QualName};
use log::debug;
use regex::Regex;

use crate::dom::XmlDocument;
use crate::error::{Error, Result, SplitPart};
use crate::normalize::{EpubVersion, apply_version};
use crate::serialize::{SerializeOptions, serialize_document};

/// Comments, CDATA, processing instructions and DOCTYPEs match the first
/// alternatives and carry no capture groups.
const TOKEN_PATTERN: &str = concat!(
    r"(?s)<!--.*?-->",
    r"|<!\[CDATA\[.*?\]\]>",
    r"|<\?.*?\?>",
    r"|<![A-Za-z][^>]*>",
    r"|</\s*(?P<close>[A-Za-z_][\w:.-]*)\s*>",
    r#"|<(?P<open>[A-Za-z_][\w:.-]*)(?P<attrs>(?:[^>"']|"[^"]*"|'[^']*')*)>"#,
    r"|&[#A-Za-z0-9]+;",
);

static TOKEN_RE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(TOKEN_PATTERN));

fn token_regex() -> Result<&'static Regex> {
    TOKEN_RE
        .as_ref()
        .map_err(|e| Error::Pattern(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Open { name: String, attributes: String },
    SelfClosing,
    Close { name: String },
    Entity,
    Comment,
}

#[derive(Debug, Clone)]
struct Token {
    start: usize,
    end: usize,
    kind: TokenKind,
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let re = token_regex()?;
    let tokens = re
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let kind = if let Some(name) = caps.name("close") {
                TokenKind::Close {
                    name: name.as_str().to_string(),
                }
            } else if let Some(name) = caps.name("open") {
                let attributes = caps.name("attrs").map_or("", |m| m.as_str());
                if attributes.trim_end().ends_with('/') {
                    TokenKind::SelfClosing
                } else {
                    TokenKind::Open {
                        name: name.as_str().to_string(),
                        attributes: attributes.to_string(),
                    }
                }
            } else if whole.as_str().starts_with('&') {
                TokenKind::Entity
            } else {
                TokenKind::Comment
            };
            Some(Token {
                start: whole.start(),
                end: whole.end(),
                kind,
            })
        })
        .collect();
    Ok(tokens)
}

/// An element closed on the front side and reopened on the back side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionElement {
    pub name: String,
    /// Attribute text exactly as written in the opening tag.
    pub attributes: String,
}

impl CompletionElement {
    fn open_tag(&self) -> String {
        format!("<{}{}>", self.name, self.attributes)
    }
}

/// Elements left open after scanning `text`, outermost first.
///
/// A closing tag pops the matching open element; if it matches an element
/// further down, everything above it is treated as implicitly closed. Stray
/// closing tags are ignored.
fn open_elements(tokens: &[Token]) -> Vec<CompletionElement> {
    let mut stack: Vec<CompletionElement> = Vec::new();
    for token in tokens {
        match &token.kind {
            TokenKind::Open { name, attributes } => stack.push(CompletionElement {
                name: name.clone(),
                attributes: attributes.clone(),
            }),
            TokenKind::Close { name } => {
                if let Some(pos) = stack.iter().rposition(|open| &open.name == name) {
                    stack.truncate(pos);
                }
            }
            _ => {}
        }
    }
    stack
}

/// Balanced front half of a split.
#[derive(Debug, Clone)]
pub struct FrontPart {
    /// Pretty-printed XHTML.
    pub xhtml: String,
    /// Elements that were closed, innermost first.
    pub completions: Vec<CompletionElement>,
    /// The parsed front document.
    pub document: XmlDocument,
}

/// Close every element left open in `fragment`, innermost first.
pub fn complete_front_part(fragment: &str, options: &SerializeOptions) -> Result<FrontPart> {
    let mut text = fragment.to_string();
    let mut completions = Vec::new();

    loop {
        let tokens = tokenize(&text)?;
        let Some(innermost) = open_elements(&tokens).pop() else {
            break;
        };
        text.push_str("</");
        text.push_str(&innermost.name);
        text.push('>');
        completions.push(innermost);
    }
    debug!("Front part closed {} element(s)", completions.len());

    let document = XmlDocument::parse(&text).map_err(|e| Error::OutputFailed {
        part: SplitPart::Front,
        reason: e.to_string(),
    })?;
    let xhtml = serialize_document(&document, options);
    Ok(FrontPart {
        xhtml,
        completions,
        document,
    })
}

/// Reopen the `completions` around `fragment` and rebuild a full document.
///
/// `head_source` supplies the `head` content copied into the new document.
pub fn complete_back_part(
    fragment: &str,
    completions: &[CompletionElement],
    head_source: &XmlDocument,
    options: &SplitOptions,
) -> Result<String> {
    let failed = |reason: String| Error::OutputFailed {
        part: SplitPart::Back,
        reason,
    };

    let mut text = String::with_capacity(fragment.len() + completions.len() * 32);
    for element in completions.iter().rev() {
        text.push_str(&element.open_tag());
        text.push('\n');
    }
    text.push_str(fragment);

    let mut doc = XmlDocument::parse(&text).map_err(|e| failed(e.to_string()))?;
    let root = doc
        .root_element()
        .ok_or_else(|| failed("no root element".into()))?;

    let ns = doc.element_namespace(root).cloned().unwrap_or_default();
    let head = doc.create_element(QualName::new(None, ns, LocalName::from("head")), Vec::new());
    doc.prepend(root, head);
    if let Some(source_head) = head_source.find_by_tag("head") {
        for child in head_source.children(source_head) {
            let copy = doc.import_node(head_source, child);
            doc.append(head, copy);
        }
    }

    apply_version(&mut doc, options.version);
    Ok(serialize_document(&doc, &options.serialize))
}

/// Splitter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitOptions {
    /// DOCTYPE for the back document.
    pub version: EpubVersion,
    pub serialize: SerializeOptions,
}

impl SplitOptions {
    pub fn new(version: EpubVersion) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    pub fn with_serialize_options(mut self, options: SerializeOptions) -> Self {
        self.serialize = options;
        self
    }
}

/// The two documents produced by a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResult {
    pub front: String,
    pub back: String,
}

/// Check that `offset` falls on text inside the body of `source`.
pub fn validate_split_point(source: &str, offset: usize) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidSplitPoint {
        offset,
        reason: reason.to_string(),
    };

    if offset > source.len() {
        return Err(invalid("offset is past the end of the document"));
    }
    if !source.is_char_boundary(offset) {
        return Err(invalid("offset is not on a character boundary"));
    }

    let tokens = tokenize(source)?;
    if tokens.iter().any(|t| t.start < offset && offset < t.end) {
        return Err(invalid("offset is inside markup"));
    }

    let body_start = tokens.iter().find_map(|t| match &t.kind {
        TokenKind::Open { name, .. } if local_part(name) == "body" => Some(t.end),
        _ => None,
    });
    let body_end = tokens.iter().rev().find_map(|t| match &t.kind {
        TokenKind::Close { name } if local_part(name) == "body" => Some(t.start),
        _ => None,
    });
    match (body_start, body_end) {
        (Some(start), Some(end)) if start <= offset && offset <= end => Ok(()),
        (Some(_), Some(_)) => Err(invalid("offset is outside the body")),
        _ => Err(invalid("document has no body")),
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Split `source` at byte `offset` into two complete documents.
///
/// Nothing is produced unless both halves rebuild successfully.
pub fn split_document(source: &str, offset: usize, options: &SplitOptions) -> Result<SplitResult> {
    validate_split_point(source, offset)?;
    let (front_fragment, back_fragment) = source.split_at(offset);

    let front = complete_front_part(front_fragment, &options.serialize)?;
    let back = complete_back_part(back_fragment, &front.completions, &front.document, options)?;
    Ok(SplitResult {
        front: front.xhtml,
        back,
    })
}
