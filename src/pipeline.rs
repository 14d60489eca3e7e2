//! Ordered whole-book processing steps.
//!
//! A [`Pipeline`] runs registered [`BookProcessor`]s in order, handing each
//! the book produced by the previous one. The first failure stops the run
//! and is reported with the failing step's name.

use log::debug;

use crate::book::Book;
use crate::dom::LINE_MARKER_PREFIX;
use crate::error::{Error, Result};
use crate::media_type::ResourceKind;
use crate::normalize::{NormalizeOptions, normalize_html, strip_line_markers};
use crate::serialize::{SerializeOptions, serialize_document};
use crate::toc::derive_from_headings;

/// One step of book processing.
pub trait BookProcessor: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    fn process(&self, book: Book) -> Result<Book>;
}

/// Steps applied to a book in registration order.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn BookProcessor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize content, fill the spine, derive the TOC, strip line markers.
    pub fn standard() -> Self {
        Self::new()
            .with_step(NormalizeContent::default())
            .with_step(DefaultSpine)
            .with_step(DeriveToc)
            .with_step(StripLineMarkers::default())
    }

    pub fn with_step(mut self, step: impl BookProcessor + 'static) -> Self {
        self.push(step);
        self
    }

    pub fn push(&mut self, step: impl BookProcessor + 'static) {
        self.steps.push(Box::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn run(&self, mut book: Book) -> Result<Book> {
        for step in &self.steps {
            debug!("Running book processor {}", step.name());
            book = step.process(book).map_err(|source| Error::Pipeline {
                step: step.name().to_string(),
                source: Box::new(source),
            })?;
        }
        Ok(book)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names())
            .finish()
    }
}

/// Rewrite every XHTML resource as normalized XHTML for the book's version.
#[derive(Debug, Clone, Default)]
pub struct NormalizeContent {
    pub tag_source_lines: bool,
    pub serialize: SerializeOptions,
}

impl BookProcessor for NormalizeContent {
    fn name(&self) -> &str {
        "normalize-content"
    }

    fn process(&self, mut book: Book) -> Result<Book> {
        let options = NormalizeOptions::new(book.version)
            .with_source_lines(self.tag_source_lines)
            .with_serialize_options(self.serialize.clone());
        for resource in book.resources.iter_mut() {
            if resource.media_type().kind() != ResourceKind::Xhtml {
                continue;
            }
            let normalized = normalize_html(resource.data(), &options);
            resource.set_text(&normalized);
        }
        Ok(book)
    }
}

/// Put the XHTML resources in the spine when it is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSpine;

impl BookProcessor for DefaultSpine {
    fn name(&self) -> &str {
        "default-spine"
    }

    fn process(&self, mut book: Book) -> Result<Book> {
        let added = book.fill_default_spine();
        if added > 0 {
            debug!("Spine filled with {added} documents");
        }
        Ok(book)
    }
}

/// Derive the table of contents from headings when the book has none.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeriveToc;

impl BookProcessor for DeriveToc {
    fn name(&self) -> &str {
        "derive-toc"
    }

    fn process(&self, mut book: Book) -> Result<Book> {
        if book.toc.is_empty() {
            book.toc = derive_from_headings(&mut book);
        }
        Ok(book)
    }
}

/// Remove source line markers left by preview parsing.
#[derive(Debug, Clone, Default)]
pub struct StripLineMarkers {
    pub serialize: SerializeOptions,
}

impl BookProcessor for StripLineMarkers {
    fn name(&self) -> &str {
        "strip-line-markers"
    }

    fn process(&self, mut book: Book) -> Result<Book> {
        for resource in book.resources.iter_mut() {
            if resource.media_type().kind() != ResourceKind::Xhtml
                || !resource.text().contains(LINE_MARKER_PREFIX)
            {
                continue;
            }
            let mut doc = resource.document()?.clone();
            if strip_line_markers(&mut doc) > 0 {
                resource.set_text(&serialize_document(&doc, &self.serialize));
            }
        }
        Ok(book)
    }
}
