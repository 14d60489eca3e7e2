//! # quire
//!
//! Content-level tooling for EPUB books: turn tag soup into clean XHTML,
//! pretty-print it consistently, split chapters in two and derive a table of
//! contents from headings.
//!
//! ## Features
//!
//! - Media-type registry that types resources by file extension
//! - Tag-soup normalization with charset redetection
//! - Deterministic, idempotent XHTML pretty-printing
//! - Splitting a document at any offset into two well-formed documents
//! - Heading-based table of contents
//! - Whole-book processing pipelines and background jobs
//!
//! ## Quick Start
//!
//! ```
//! use quire::{NormalizeOptions, normalize_html};
//!
//! let xhtml = normalize_html(b"<p>Hello<br>world", &NormalizeOptions::default());
//! assert!(xhtml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
//! assert!(xhtml.contains("xmlns=\"http://www.w3.org/1999/xhtml\""));
//! ```
//!
//! ## Working with Books
//!
//! The [`Book`] struct holds the resources, spine, guide and table of
//! contents of one book:
//!
//! ```
//! use quire::{Book, Metadata, Pipeline};
//!
//! let mut book = Book::new();
//! book.metadata = Metadata::new("My Book")
//!     .with_author("Author Name")
//!     .with_language("en");
//!
//! book.add_resource("chapter1.xhtml", b"<h1>Chapter 1</h1><p>Text".to_vec()).unwrap();
//! book.add_spine_item("chapter1.xhtml");
//!
//! let book = Pipeline::standard().run(book).unwrap();
//! assert_eq!(book.toc.node_count(), 1);
//! ```

pub mod book;
pub mod css;
pub mod dom;
pub mod error;
pub mod media_type;
pub mod normalize;
pub mod pipeline;
pub mod resource;
pub mod serialize;
pub mod split;
pub mod toc;
pub mod worker;

pub use book::{Book, Guide, GuideReference, Metadata, SpineItem};
pub use dom::XmlDocument;
pub use error::{Error, Result, SplitPart};
pub use media_type::{MediaClass, MediaType, MediaTypeRegistry, ResourceKind};
pub use normalize::{EpubVersion, NormalizeOptions, normalize_html};
pub use pipeline::{BookProcessor, Pipeline};
pub use resource::{NativeFormat, Resource, Resources};
pub use serialize::{SerializeOptions, serialize_document};
pub use split::{SplitOptions, SplitResult, split_document};
pub use toc::{OutlineEntry, TableOfContents, TocEntry, TocId, TocLevel, derive_from_headings};
pub use worker::{BookJob, CancelToken, Delivery, JobHandle, spawn_job};
