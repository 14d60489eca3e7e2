//! Table of contents.
//!
//! Entries live in an arena owned by [`TableOfContents`] and refer to each
//! other by [`TocId`]. Entries name their target by href; the resource
//! itself stays in [`Resources`] and is looked up on demand.

use std::collections::HashSet;

use log::warn;

use crate::book::Book;
use crate::dom::XmlDocument;
use crate::media_type::ResourceKind;
use crate::resource::{Resource, Resources};

/// Index of an entry in its table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TocId(u32);

/// Heading level of an entry: a numeric depth, or a tag name when the entry
/// came from markup without a numeric level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocLevel {
    Depth(u8),
    Tag(String),
}

impl Default for TocLevel {
    fn default() -> Self {
        TocLevel::Depth(1)
    }
}

/// One navigation point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry<D = ()> {
    pub title: String,
    /// Href of the target resource, without fragment.
    pub href: String,
    /// Element id inside the target, if any.
    pub fragment: Option<String>,
    pub level: TocLevel,
    /// Caller-defined payload, such as a parsed copy of the target.
    pub document: Option<D>,
    children: Vec<TocId>,
}

impl<D> TocEntry<D> {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            fragment: None,
            level: TocLevel::default(),
            document: None,
            children: Vec::new(),
        }
    }

    pub fn with_fragment(mut self, fragment: Option<impl Into<String>>) -> Self {
        self.fragment = fragment.map(Into::into);
        self
    }

    pub fn with_level(mut self, level: TocLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_document(mut self, document: D) -> Self {
        self.document = Some(document);
        self
    }

    pub fn children(&self) -> &[TocId] {
        &self.children
    }

    /// `href#fragment`, or the bare href.
    pub fn target(&self) -> String {
        match &self.fragment {
            Some(fragment) => format!("{}#{}", self.href, fragment),
            None => self.href.clone(),
        }
    }
}

/// Owned, nested view of a table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct OutlineEntry {
    pub title: String,
    pub target: String,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub children: Vec<OutlineEntry>,
}

/// Hierarchical table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOfContents<D = ()> {
    entries: Vec<TocEntry<D>>,
    roots: Vec<TocId>,
}

impl<D> Default for TableOfContents<D> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            roots: Vec::new(),
        }
    }
}

impl<D> TableOfContents<D> {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, entry: TocEntry<D>) -> TocId {
        let id = TocId(self.entries.len() as u32);
        self.entries.push(entry);
        id
    }

    /// Append a top-level entry.
    pub fn push_root(&mut self, entry: TocEntry<D>) -> TocId {
        let id = self.alloc(entry);
        self.roots.push(id);
        id
    }

    /// Append a child of `parent`. Returns `None` if `parent` does not exist.
    pub fn push_child(&mut self, parent: TocId, entry: TocEntry<D>) -> Option<TocId> {
        if self.get(parent).is_none() {
            return None;
        }
        let id = self.alloc(entry);
        self.entries[parent.0 as usize].children.push(id);
        Some(id)
    }

    pub fn get(&self, id: TocId) -> Option<&TocEntry<D>> {
        self.entries.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: TocId) -> Option<&mut TocEntry<D>> {
        self.entries.get_mut(id.0 as usize)
    }

    pub fn roots(&self) -> &[TocId] {
        &self.roots
    }

    pub fn children(&self, id: TocId) -> &[TocId] {
        self.get(id).map_or(&[], |entry| entry.children())
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of entries reachable from the roots.
    pub fn node_count(&self) -> usize {
        self.depth_first().len()
    }

    /// Depth of the deepest entry; a flat list has depth 1.
    pub fn max_depth(&self) -> usize {
        self.depth_first()
            .into_iter()
            .map(|(_, depth)| depth + 1)
            .max()
            .unwrap_or(0)
    }

    /// Every entry in pre-order with its depth (roots are depth 0).
    pub fn depth_first(&self) -> Vec<(TocId, usize)> {
        let mut out = Vec::with_capacity(self.entries.len());
        let mut stack: Vec<(TocId, usize)> = self.roots.iter().rev().map(|&id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            stack.extend(self.children(id).iter().rev().map(|&child| (child, depth + 1)));
        }
        out
    }

    /// Target hrefs in depth-first order, each listed once.
    pub fn unique_hrefs(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.depth_first()
            .into_iter()
            .filter_map(|(id, _)| self.get(id))
            .map(|entry| entry.href.as_str())
            .filter(|href| seen.insert(*href))
            .collect()
    }

    /// Resources referenced by the TOC, in depth-first order without repeats.
    /// Hrefs with no matching resource are skipped.
    pub fn resources<'r>(&self, resources: &'r Resources) -> Vec<&'r Resource> {
        self.unique_hrefs()
            .into_iter()
            .filter_map(|href| resources.get(href))
            .collect()
    }

    /// Build the owned nested view.
    pub fn outline(&self) -> Vec<OutlineEntry> {
        self.roots.iter().filter_map(|&id| self.outline_entry(id)).collect()
    }

    fn outline_entry(&self, id: TocId) -> Option<OutlineEntry> {
        let entry = self.get(id)?;
        Some(OutlineEntry {
            title: entry.title.clone(),
            target: entry.target(),
            children: entry
                .children
                .iter()
                .filter_map(|&child| self.outline_entry(child))
                .collect(),
        })
    }
}

impl<D: Clone> TableOfContents<D> {
    /// Copy the subtree rooted at `id` into `dest`, under `parent` or as a
    /// new root. Returns the id of the copy in `dest`.
    pub fn copy_subtree(
        &self,
        id: TocId,
        dest: &mut TableOfContents<D>,
        parent: Option<TocId>,
    ) -> Option<TocId> {
        let entry = self.get(id)?;
        let copy = TocEntry {
            children: Vec::new(),
            ..entry.clone()
        };
        let new_id = match parent {
            Some(parent) => dest.push_child(parent, copy)?,
            None => dest.push_root(copy),
        };
        for &child in &entry.children {
            self.copy_subtree(child, dest, Some(new_id));
        }
        Some(new_id)
    }
}

/// Numeric level of a heading element.
pub fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn heading_title(doc: &XmlDocument, id: crate::dom::NodeId) -> String {
    doc.text_content(id)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive a table of contents from the headings of the book's spine documents.
pub fn derive_from_headings(book: &mut Book) -> TableOfContents {
    let spine: Vec<String> = book.spine.iter().map(|item| item.href.clone()).collect();
    derive_from_resources(&mut book.resources, &spine)
}

/// Derive a table of contents from the XHTML resources named by `spine`.
///
/// A heading becomes a new top-level entry when there is no current top
/// entry or its level is not deeper than the current top's. Otherwise it is
/// added as a child of the current top entry. Nesting is one level deep.
pub fn derive_from_resources(resources: &mut Resources, spine: &[String]) -> TableOfContents {
    let mut toc = TableOfContents::new();
    let mut top: Option<(TocId, u8)> = None;

    for href in spine {
        let Some(resource) = resources.get_mut(href) else {
            warn!("Spine item {href} has no resource");
            continue;
        };
        if resource.media_type().kind() != ResourceKind::Xhtml {
            continue;
        }
        let href = resource.href().to_string();
        let doc = match resource.document() {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Skipping {href} while building the table of contents: {e}");
                continue;
            }
        };

        for id in doc.elements() {
            let Some(level) = doc.element_name(id).and_then(|name| heading_level(name)) else {
                continue;
            };
            let entry = TocEntry::new(heading_title(doc, id), href.clone())
                .with_level(TocLevel::Depth(level))
                .with_fragment(doc.get_attr(id, "id"));

            match top {
                Some((parent, top_level)) if level > top_level => {
                    toc.push_child(parent, entry);
                }
                _ => {
                    let root = toc.push_root(entry);
                    top = Some((root, level));
                }
            }
        }
    }
    toc
}
