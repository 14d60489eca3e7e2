use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::error::{Error, Result};
use crate::media_type::{MediaTypeRegistry, ResourceKind};
use crate::normalize::EpubVersion;
use crate::resource::{Resource, Resources};
use crate::split::{SplitOptions, split_document};
use crate::toc::TableOfContents;

/// An e-book being edited: metadata, resources, reading order, guide and TOC.
#[derive(Debug, Clone)]
pub struct Book {
    pub metadata: Metadata,
    pub resources: Resources,
    pub spine: Vec<SpineItem>,
    pub guide: Guide,
    pub toc: TableOfContents,
    pub version: EpubVersion,
    registry: Arc<MediaTypeRegistry>,
}

/// Book metadata (Dublin Core subset)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub authors: Vec<String>,
    pub language: String,
    pub identifier: String,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub subjects: Vec<String>,
    pub date: Option<String>,
    pub rights: Option<String>,
}

/// An item in the reading order (spine)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub href: String,
    pub linear: bool,
}

impl SpineItem {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            linear: true,
        }
    }
}

/// A landmark reference such as the cover or start of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideReference {
    /// Reference type, e.g. `cover`, `toc`, `text`.
    pub kind: String,
    pub title: String,
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guide {
    references: Vec<GuideReference>,
}

impl Guide {
    pub fn add(&mut self, kind: impl Into<String>, title: impl Into<String>, href: impl Into<String>) {
        self.references.push(GuideReference {
            kind: kind.into(),
            title: title.into(),
            href: href.into(),
        });
    }

    pub fn get(&self, kind: &str) -> Option<&GuideReference> {
        self.references.iter().find(|r| r.kind == kind)
    }

    pub fn cover(&self) -> Option<&GuideReference> {
        self.get("cover")
    }

    pub fn iter(&self) -> impl Iterator<Item = &GuideReference> {
        self.references.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

impl Book {
    pub fn new() -> Self {
        Self::with_registry(MediaTypeRegistry::standard())
    }

    /// Empty book whose resources are typed by `registry`.
    pub fn with_registry(registry: Arc<MediaTypeRegistry>) -> Self {
        Self {
            metadata: Metadata::default(),
            resources: Resources::new(),
            spine: Vec::new(),
            guide: Guide::default(),
            toc: TableOfContents::new(),
            version: EpubVersion::default(),
            registry,
        }
    }

    pub fn with_version(mut self, version: EpubVersion) -> Self {
        self.version = version;
        self
    }

    pub fn registry(&self) -> &Arc<MediaTypeRegistry> {
        &self.registry
    }

    /// Add a resource typed by its href extension.
    pub fn add_resource(&mut self, href: impl Into<String>, data: Vec<u8>) -> Result<()> {
        let resource = self.registry.create_resource(data, href);
        self.resources.add(resource)
    }

    /// Get a resource by href
    pub fn get_resource(&self, href: &str) -> Option<&Resource> {
        self.resources.get(href)
    }

    /// Add a spine item
    pub fn add_spine_item(&mut self, href: impl Into<String>) {
        self.spine.push(SpineItem::new(href));
    }

    /// Resources in reading order. Spine items without a resource are skipped.
    pub fn spine_resources(&self) -> impl Iterator<Item = &Resource> {
        self.spine
            .iter()
            .filter_map(|item| self.resources.get(&item.href))
    }

    /// Build a book from files that were not packaged, given as
    /// `(href, bytes)` pairs. XHTML files form the spine in the given order.
    pub fn from_loose_files<I, S>(files: I) -> Result<Book>
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: Into<String>,
    {
        let mut book = Book::new();
        for (href, data) in files {
            book.add_resource(href, data)?;
        }
        book.fill_default_spine();
        Ok(book)
    }

    /// Load every file below `dir`. Hrefs are relative to `dir`, use `/` and
    /// are sorted.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Book> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        collect_files(dir, dir, &mut files)?;
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Book::from_loose_files(files)
    }

    /// Put every XHTML resource in the spine if the spine is empty.
    /// Returns the number of items added.
    pub fn fill_default_spine(&mut self) -> usize {
        if !self.spine.is_empty() {
            return 0;
        }
        self.spine = self
            .resources
            .iter()
            .filter(|r| r.media_type().kind() == ResourceKind::Xhtml)
            .map(|r| SpineItem::new(r.href()))
            .collect();
        self.spine.len()
    }

    /// Split the XHTML resource `href` at byte `offset` of its text.
    ///
    /// The front half replaces the resource; the back half becomes a new
    /// resource `new_href` placed right after it in the resources and spine.
    /// On error the book is unchanged.
    pub fn split_resource(
        &mut self,
        href: &str,
        offset: usize,
        new_href: impl Into<String>,
    ) -> Result<()> {
        let new_href = new_href.into();
        if self.resources.contains(&new_href) {
            return Err(Error::DuplicateHref(new_href));
        }
        let resource = self
            .resources
            .get(href)
            .ok_or_else(|| Error::ResourceNotFound(href.to_string()))?;
        if resource.media_type().kind() != ResourceKind::Xhtml {
            return Err(Error::ResourceData {
                href: href.to_string(),
                reason: "only XHTML documents can be split".into(),
            });
        }
        let href = resource.href().to_string();
        let source = resource.text().into_owned();

        let result = split_document(&source, offset, &SplitOptions::new(self.version))?;

        let back = self
            .registry
            .create_resource(result.back.into_bytes(), new_href.clone());
        self.resources.insert_after(&href, back)?;
        if let Some(front) = self.resources.get_mut(&href) {
            front.set_text(&result.front);
        }
        if let Some(position) = self.spine.iter().position(|item| item.href == href) {
            self.spine.insert(position + 1, SpineItem::new(new_href.clone()));
        }
        debug!("Split {href} at {offset} into {href} and {new_href}");
        Ok(())
    }
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<(String, Vec<u8>)>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let href = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((href, std::fs::read(&path)?));
    }
    Ok(())
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }
}
