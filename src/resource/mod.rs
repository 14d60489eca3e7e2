//! Book resources and their native formats.
//!
//! A [`Resource`] owns raw bytes plus a lazily parsed native format selected
//! by its media type. [`Resources`] is the ordered, href-unique collection a
//! [`Book`](crate::Book) keeps them in.

mod cache;
mod image;

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Component, Path};

use encoding_rs::{Encoding, UTF_8};

use crate::css::Stylesheet;
use crate::dom::XmlDocument;
use crate::error::{Error, Result};
use crate::media_type::{MediaClass, MediaType, ResourceKind};

pub use cache::NativeCache;
pub use image::{ImageFormat, ImageInfo};

/// Parsed form of a resource's bytes.
#[derive(Debug, Clone)]
pub enum NativeFormat {
    Document(XmlDocument),
    Stylesheet(Stylesheet),
    Text(String),
    Image(ImageInfo),
}

/// A file in the book.
#[derive(Debug, Clone)]
pub struct Resource {
    id: String,
    href: String,
    media_type: MediaType,
    data: Vec<u8>,
    encoding: &'static Encoding,
    native: NativeCache<NativeFormat>,
}

impl Resource {
    pub fn new(href: impl Into<String>, data: Vec<u8>, media_type: MediaType) -> Self {
        let href = href.into();
        Self {
            id: id_from_href(&href),
            href,
            media_type,
            data,
            encoding: UTF_8,
            native: NativeCache::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the bytes. The native format is re-parsed on next access.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
        self.native.invalidate();
    }

    /// Replace the content with UTF-8 text.
    pub fn set_text(&mut self, text: &str) {
        self.encoding = UTF_8;
        self.set_data(text.as_bytes().to_vec());
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: &'static Encoding) {
        self.encoding = encoding;
        self.native.invalidate();
    }

    /// Bytes decoded with the resource encoding. A byte order mark wins.
    pub fn text(&self) -> Cow<'_, str> {
        let (text, _, _) = self.encoding.decode(&self.data);
        text
    }

    /// Parsed native format, computed on first access and cached.
    pub fn as_native(&mut self) -> Result<&NativeFormat> {
        let kind = self.media_type.kind();
        let data = &self.data;
        let encoding = self.encoding;
        let href = &self.href;
        self.native
            .get_or_parse(|| parse_native(kind, data, encoding))
            .map_err(|reason| Error::ResourceData {
                href: href.clone(),
                reason: reason.to_string(),
            })
    }

    /// The parsed XML tree of an XHTML or XML resource.
    pub fn document(&mut self) -> Result<&XmlDocument> {
        let href = self.href.clone();
        match self.as_native()? {
            NativeFormat::Document(doc) => Ok(doc),
            _ => Err(Error::ResourceData {
                href,
                reason: "not an XML document".into(),
            }),
        }
    }

    /// Whether the bytes parse as this resource's native format.
    pub fn is_natively_parseable(&mut self) -> bool {
        self.as_native().is_ok()
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

fn parse_native(
    kind: ResourceKind,
    data: &[u8],
    encoding: &'static Encoding,
) -> std::result::Result<NativeFormat, String> {
    let decode = || encoding.decode(data).0;
    match kind {
        ResourceKind::Xhtml | ResourceKind::Xml => XmlDocument::parse(&decode())
            .map(NativeFormat::Document)
            .map_err(|e| e.to_string()),
        ResourceKind::Css => Ok(NativeFormat::Stylesheet(Stylesheet::parse(&decode()))),
        ResourceKind::Text => Ok(NativeFormat::Text(decode().into_owned())),
        ResourceKind::Image => ImageInfo::sniff(data)
            .map(NativeFormat::Image)
            .ok_or_else(|| "unrecognised image header".to_string()),
        ResourceKind::Binary => Err("binary resources have no native format".to_string()),
    }
}

/// Manifest id from the href's file name: `text/Chapter 1.xhtml` → `Chapter_1.xhtml`.
fn id_from_href(href: &str) -> String {
    let file = href.rsplit('/').next().unwrap_or(href);
    let mut id: String = file
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !id.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        id.insert(0, 'x');
    }
    id
}

/// Resolve `rel` against the href of the document that references it.
///
/// Absolute paths are taken from the package root and URLs pass through.
pub fn resolve_href(base: &str, rel: &str) -> String {
    let rel = rel.split('#').next().unwrap_or(rel);
    if rel.contains("://") || rel.starts_with("data:") {
        return rel.to_string();
    }
    let rel_path = Path::new(rel);
    if rel_path.has_root() {
        return rel.trim_start_matches('/').to_string();
    }

    let mut stack: Vec<&str> = Path::new(base)
        .parent()
        .unwrap_or(Path::new(""))
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();

    for component in rel_path.components() {
        match component {
            Component::ParentDir => {
                stack.pop();
            }
            Component::Normal(c) => {
                if let Some(s) = c.to_str() {
                    stack.push(s);
                }
            }
            _ => {}
        }
    }
    stack.join("/")
}

/// Ordered collection of resources with unique hrefs and ids.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    items: Vec<Resource>,
    index: HashMap<String, usize>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a resource. Fails if its href is already present.
    pub fn add(&mut self, resource: Resource) -> Result<()> {
        let position = self.items.len();
        self.insert_at(position, resource)
    }

    /// Insert a resource directly after `anchor`.
    pub fn insert_after(&mut self, anchor: &str, resource: Resource) -> Result<()> {
        let position = self
            .position(anchor)
            .ok_or_else(|| Error::ResourceNotFound(anchor.to_string()))?;
        self.insert_at(position + 1, resource)
    }

    fn insert_at(&mut self, position: usize, mut resource: Resource) -> Result<()> {
        if self.index.contains_key(resource.href()) {
            return Err(Error::DuplicateHref(resource.href().to_string()));
        }
        let id = self.unique_id(resource.id());
        resource.set_id(id);
        self.items.insert(position, resource);
        self.reindex();
        Ok(())
    }

    fn unique_id(&self, base: &str) -> String {
        let taken = |id: &str| self.items.iter().any(|r| r.id() == id);
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    fn reindex(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(i, r)| (r.href().to_string(), i))
            .collect();
    }

    /// Index of a resource. Fragments are ignored and percent-encoded hrefs
    /// match their decoded form.
    pub fn position(&self, href: &str) -> Option<usize> {
        let href = href.split('#').next().unwrap_or(href);
        if let Some(&i) = self.index.get(href) {
            return Some(i);
        }
        let decoded = percent_encoding::percent_decode_str(href).decode_utf8().ok()?;
        self.index.get(decoded.as_ref()).copied()
    }

    pub fn contains(&self, href: &str) -> bool {
        self.position(href).is_some()
    }

    pub fn get(&self, href: &str) -> Option<&Resource> {
        self.position(href).map(|i| &self.items[i])
    }

    pub fn get_mut(&mut self, href: &str) -> Option<&mut Resource> {
        self.position(href).map(|i| &mut self.items[i])
    }

    /// Look up a link found in the document at `base`.
    pub fn get_relative(&self, base: &str, link: &str) -> Option<&Resource> {
        self.get(&resolve_href(base, link))
    }

    pub fn by_id(&self, id: &str) -> Option<&Resource> {
        self.items.iter().find(|r| r.id() == id)
    }

    pub fn remove(&mut self, href: &str) -> Option<Resource> {
        let position = self.position(href)?;
        let removed = self.items.remove(position);
        self.reindex();
        Some(removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.items.iter_mut()
    }

    pub fn hrefs(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|r| r.href())
    }

    pub fn by_media_class(&self, class: MediaClass) -> impl Iterator<Item = &Resource> {
        self.items
            .iter()
            .filter(move |r| r.media_type().class() == class)
    }
}
