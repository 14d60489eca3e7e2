//! Book API tests.
//!
//! Tests for the Book struct and its methods - creating books programmatically,
//! modifying metadata, adding resources and splitting chapters.

use quire::resource::NativeFormat;
use quire::{Book, Error, MediaClass, MediaType, Metadata, MediaTypeRegistry};
use tempfile::TempDir;

const CHAPTER: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
    "<html xmlns=\"http://www.w3.org/1999/xhtml\">\n",
    "<head><title>Chapter</title></head>\n",
    "<body>\n<h1>Start</h1>\n<p>Before the cut.</p>\n<p>After the cut.</p>\n</body>\n</html>\n",
);

// ============================================================================
// Book Construction Tests
// ============================================================================

#[test]
fn test_create_empty_book() {
    let book = Book::new();

    assert!(book.metadata.title.is_empty());
    assert!(book.metadata.authors.is_empty());
    assert!(book.spine.is_empty());
    assert!(book.toc.is_empty());
    assert!(book.resources.is_empty());
    assert!(book.guide.is_empty());
}

#[test]
fn test_metadata_builder() {
    let metadata = Metadata::new("Test Title")
        .with_author("Author One")
        .with_author("Author Two")
        .with_language("en")
        .with_identifier("urn:uuid:12345")
        .with_publisher("Quire Press");

    assert_eq!(metadata.title, "Test Title");
    assert_eq!(metadata.authors, vec!["Author One", "Author Two"]);
    assert_eq!(metadata.language, "en");
    assert_eq!(metadata.identifier, "urn:uuid:12345");
    assert_eq!(metadata.publisher.as_deref(), Some("Quire Press"));
}

#[test]
fn test_add_resource() {
    let mut book = Book::new();

    book.add_resource("chapter1.xhtml", CHAPTER.as_bytes().to_vec()).unwrap();
    book.add_resource("style.css", b"body { color: black; }".to_vec()).unwrap();
    book.add_resource("images/cover.JPG", vec![0xFF, 0xD8, 0xFF]).unwrap();
    book.add_resource("data.bin", vec![0, 1, 2]).unwrap();

    assert_eq!(book.resources.len(), 4);
    assert!(book.resources.contains("chapter1.xhtml"));

    let chapter = book.get_resource("chapter1.xhtml").unwrap();
    assert_eq!(chapter.media_type(), MediaType::Xhtml);
    assert_eq!(chapter.media_type().mime(), "application/xhtml+xml");
    assert_eq!(book.get_resource("images/cover.JPG").unwrap().media_type(), MediaType::Jpeg);
    assert_eq!(book.get_resource("data.bin").unwrap().media_type(), MediaType::Binary);

    let images: Vec<_> = book.resources.by_media_class(MediaClass::Image).collect();
    assert_eq!(images.len(), 1);
}

#[test]
fn test_duplicate_resource_rejected() {
    let mut book = Book::new();
    book.add_resource("a.xhtml", CHAPTER.as_bytes().to_vec()).unwrap();
    let err = book.add_resource("a.xhtml", Vec::new()).unwrap_err();
    assert!(matches!(err, Error::DuplicateHref(href) if href == "a.xhtml"));
}

#[test]
fn test_add_spine_item() {
    let mut book = Book::new();

    book.add_resource("chapter1.xhtml", CHAPTER.as_bytes().to_vec()).unwrap();
    book.add_resource("chapter2.xhtml", CHAPTER.as_bytes().to_vec()).unwrap();

    book.add_spine_item("chapter2.xhtml");
    book.add_spine_item("chapter1.xhtml");
    book.add_spine_item("missing.xhtml");

    assert_eq!(book.spine.len(), 3);
    let order: Vec<_> = book.spine_resources().map(|r| r.href()).collect();
    assert_eq!(order, vec!["chapter2.xhtml", "chapter1.xhtml"]);
}

#[test]
fn test_shared_registry() {
    let registry = MediaTypeRegistry::standard();
    let book = Book::with_registry(registry.clone());
    assert!(std::sync::Arc::ptr_eq(book.registry(), &registry));
}

// ============================================================================
// Native Format Tests
// ============================================================================

#[test]
fn test_native_formats() {
    let mut book = Book::new();
    book.add_resource("c.xhtml", CHAPTER.as_bytes().to_vec()).unwrap();
    book.add_resource("s.css", b"@import url(base.css); p { margin: 0 }".to_vec()).unwrap();

    let chapter = book.resources.get_mut("c.xhtml").unwrap();
    let doc = chapter.document().unwrap();
    assert!(doc.find_by_tag("h1").is_some());

    let css = book.resources.get_mut("s.css").unwrap();
    match css.as_native().unwrap() {
        NativeFormat::Stylesheet(sheet) => assert_eq!(sheet.imports(), vec!["base.css"]),
        other => panic!("unexpected native format {other:?}"),
    }
}

#[test]
fn test_bad_content_stays_in_book() {
    let mut book = Book::new();
    book.add_resource("broken.xhtml", b"<html><body><p>open".to_vec()).unwrap();

    let resource = book.resources.get_mut("broken.xhtml").unwrap();
    assert!(matches!(resource.document(), Err(Error::ResourceData { .. })));
    assert!(!resource.is_natively_parseable());
    assert!(book.resources.contains("broken.xhtml"));

    book.resources
        .get_mut("broken.xhtml")
        .unwrap()
        .set_text("<html xmlns=\"http://www.w3.org/1999/xhtml\"><body/></html>");
    assert!(book.resources.get_mut("broken.xhtml").unwrap().is_natively_parseable());
}

// ============================================================================
// Splitting Tests
// ============================================================================

#[test]
fn test_split_chapter_in_book() {
    let mut book = Book::from_loose_files(vec![
        ("text/ch1.xhtml", CHAPTER.as_bytes().to_vec()),
        ("text/ch2.xhtml", CHAPTER.as_bytes().to_vec()),
    ])
    .unwrap();

    let offset = CHAPTER.find("<p>After").unwrap();
    book.split_resource("text/ch1.xhtml", offset, "text/ch1-2.xhtml")
        .unwrap();

    let hrefs: Vec<_> = book.resources.hrefs().collect();
    assert_eq!(hrefs, vec!["text/ch1.xhtml", "text/ch1-2.xhtml", "text/ch2.xhtml"]);
    let spine: Vec<_> = book.spine.iter().map(|item| item.href.as_str()).collect();
    assert_eq!(spine, vec!["text/ch1.xhtml", "text/ch1-2.xhtml", "text/ch2.xhtml"]);

    let front = book.get_resource("text/ch1.xhtml").unwrap().text().into_owned();
    let back = book.get_resource("text/ch1-2.xhtml").unwrap().text().into_owned();
    assert!(front.contains("Before the cut.") && !front.contains("After the cut."));
    assert!(back.contains("After the cut.") && !back.contains("Before the cut."));
}

#[test]
fn test_split_errors_leave_book_unchanged() {
    let mut book = Book::from_loose_files(vec![
        ("ch1.xhtml", CHAPTER.as_bytes().to_vec()),
        ("style.css", b"p {}".to_vec()),
    ])
    .unwrap();

    let err = book.split_resource("ch1.xhtml", 3, "new.xhtml").unwrap_err();
    assert!(matches!(err, Error::InvalidSplitPoint { .. }));
    let err = book.split_resource("style.css", 1, "new.css").unwrap_err();
    assert!(matches!(err, Error::ResourceData { .. }));
    let err = book.split_resource("nope.xhtml", 1, "new.xhtml").unwrap_err();
    assert!(matches!(err, Error::ResourceNotFound(_)));
    let err = book.split_resource("ch1.xhtml", 1, "style.css").unwrap_err();
    assert!(matches!(err, Error::DuplicateHref(_)));

    assert_eq!(book.resources.len(), 2);
    assert_eq!(book.spine.len(), 1);
    assert_eq!(book.get_resource("ch1.xhtml").unwrap().text(), CHAPTER);
}

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_load_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("text")).unwrap();
    std::fs::write(dir.path().join("text/b.xhtml"), CHAPTER).unwrap();
    std::fs::write(dir.path().join("text/a.xhtml"), CHAPTER).unwrap();
    std::fs::write(dir.path().join("style.css"), "p {}").unwrap();

    let book = Book::load_dir(dir.path()).unwrap();
    let hrefs: Vec<_> = book.resources.hrefs().collect();
    assert_eq!(hrefs, vec!["style.css", "text/a.xhtml", "text/b.xhtml"]);
    let spine: Vec<_> = book.spine.iter().map(|item| item.href.as_str()).collect();
    assert_eq!(spine, vec!["text/a.xhtml", "text/b.xhtml"]);
}

#[test]
fn test_load_missing_dir() {
    let dir = TempDir::new().unwrap();
    let err = Book::load_dir(dir.path().join("absent")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
