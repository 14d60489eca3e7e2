//! Fragment splitter tests.
//!
//! Both halves of a split must be complete documents, and together they must
//! carry exactly the body text of the source.

use proptest::prelude::*;
use quire::dom::XmlDocument;
use quire::split::{complete_back_part, complete_front_part, validate_split_point};
use quire::{EpubVersion, Error, SerializeOptions, SplitOptions, SplitPart, split_document};

fn chapter(body: &str) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
            "<!DOCTYPE html>\n",
            "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\n",
            "<head>\n<title>Chapter</title>\n<link rel=\"stylesheet\" type=\"text/css\" href=\"../style.css\"/>\n</head>\n",
            "<body>\n{}\n</body>\n</html>\n"
        ),
        body
    )
}

fn body_text(xhtml: &str) -> String {
    let doc = XmlDocument::parse(xhtml).unwrap();
    let body = doc.find_by_tag("body").unwrap();
    doc.text_content(body)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

// ============================================================================
// Splitting
// ============================================================================

#[test]
fn test_split_between_sections() {
    let source = chapter(
        "<section epub:type=\"chapter\" id=\"one\"><h1>One</h1><p>First.</p><p>Second.</p></section>",
    );
    let offset = source.find("<p>Second").unwrap();
    let result = split_document(&source, offset, &SplitOptions::default()).unwrap();

    assert!(result.front.contains("<p>First.</p>"));
    assert!(!result.front.contains("Second"));
    assert!(result.back.contains("<p>Second.</p>"));

    // The back half reopens the section with its attributes.
    let back = XmlDocument::parse(&result.back).unwrap();
    let section = back.find_by_tag("section").unwrap();
    assert_eq!(back.get_attr(section, "id"), Some("one"));
    assert!(result.back.contains("epub:type=\"chapter\""));
}

#[test]
fn test_back_copies_head() {
    let source = chapter("<p>alpha beta</p>");
    let offset = source.find("beta").unwrap();
    let result = split_document(&source, offset, &SplitOptions::default()).unwrap();

    let back = XmlDocument::parse(&result.back).unwrap();
    let title = back.find_by_tag("title").unwrap();
    assert_eq!(back.text_content(title), "Chapter");
    let link = back.find_by_tag("link").unwrap();
    assert_eq!(back.get_attr(link, "href"), Some("../style.css"));
    assert!(result.back.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!DOCTYPE html>\n"));
}

#[test]
fn test_back_doctype_follows_version() {
    let source = chapter("<p>alpha beta</p>");
    let offset = source.find("beta").unwrap();
    let result = split_document(&source, offset, &SplitOptions::new(EpubVersion::V2)).unwrap();
    assert!(result.back.contains("-//W3C//DTD XHTML 1.1//EN"));
}

#[test]
fn test_split_keeps_text_mid_word() {
    let source = chapter("<p>Some <em>emphasized</em> words</p>");
    let offset = source.find("phasized").unwrap();
    let result = split_document(&source, offset, &SplitOptions::default()).unwrap();

    assert!(result.front.contains("<em>em</em>"), "{}", result.front);
    assert!(result.back.contains("phasized</em> words"), "{}", result.back);
    assert_eq!(
        format!("{}{}", body_text(&result.front), body_text(&result.back)),
        body_text(&source)
    );
}

#[test]
fn test_rejected_split_points() {
    let source = chapter("<p>text &amp; more</p>");
    let cases = [
        (source.len() + 1, "past the end"),
        (source.find("<p>").unwrap() + 1, "inside markup"),
        (source.find("&amp;").unwrap() + 2, "inside an entity"),
        (source.find("<title>").unwrap() + 7, "inside head"),
    ];
    for (offset, label) in cases {
        let err = split_document(&source, offset, &SplitOptions::default()).unwrap_err();
        assert!(
            matches!(err, Error::InvalidSplitPoint { offset: o, .. } if o == offset),
            "{label}: {err}"
        );
    }
    assert!(validate_split_point(&source, source.find("text").unwrap()).is_ok());
}

#[test]
fn test_unicode_boundary_rejected() {
    let source = chapter("<p>caf\u{e9} au lait</p>");
    let offset = source.find('\u{e9}').unwrap() + 1;
    assert!(matches!(
        validate_split_point(&source, offset),
        Err(Error::InvalidSplitPoint { .. })
    ));
}

// ============================================================================
// Fragment completion
// ============================================================================

#[test]
fn test_front_and_back_fragments() {
    let front = complete_front_part(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>t</title></head><body><div class=\"c\"><p>half",
        &SerializeOptions::default(),
    )
    .unwrap();
    let names: Vec<_> = front.completions.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["p", "div", "body", "html"]);
    assert_eq!(front.completions[1].attributes, " class=\"c\"");

    let back = complete_back_part(
        " way</p></div></body></html>",
        &front.completions,
        &front.document,
        &SplitOptions::default(),
    )
    .unwrap();
    let doc = XmlDocument::parse(&back).unwrap();
    let div = doc.find_by_tag("div").unwrap();
    assert_eq!(doc.get_attr(div, "class"), Some("c"));
    assert!(back.contains("<p>way</p>"), "{back}");
}

#[test]
fn test_unbalanced_back_is_output_failure() {
    let front = complete_front_part(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\"><body><p>a",
        &SerializeOptions::default(),
    )
    .unwrap();
    let err = complete_back_part(
        "b</p></div></body></html>",
        &front.completions,
        &front.document,
        &SplitOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::OutputFailed {
            part: SplitPart::Back,
            ..
        }
    ));
}

// ============================================================================
// Round trip
// ============================================================================

fn body_strategy() -> impl Strategy<Value = String> {
    let words = prop::collection::vec(
        prop_oneof!["[a-z]{1,7}", Just("&amp;".to_string()), Just("caf\u{e9}".to_string())],
        1..6,
    );
    let paragraph = (words, any::<bool>(), any::<bool>()).prop_map(|(words, emphasize, br)| {
        let mut text = words.join(" ");
        if emphasize {
            text = format!("<em>{text}</em> tail");
        }
        if br {
            text.push_str("<br/>end");
        }
        format!("<p>{text}</p>\n")
    });
    let section = prop::collection::vec(paragraph, 1..4)
        .prop_map(|paragraphs| format!("<div class=\"s\">\n{}</div>\n", paragraphs.concat()));
    prop::collection::vec(section, 1..4).prop_map(|sections| sections.concat())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_split_round_trip_preserves_body_text(
        body in body_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        let source = chapter(&body);
        let start = pick.index(source.len() + 1);
        let offset = (start..=source.len())
            .chain(0..start)
            .find(|&offset| validate_split_point(&source, offset).is_ok());
        prop_assume!(offset.is_some());
        let offset = offset.unwrap();

        let result = split_document(&source, offset, &SplitOptions::default()).unwrap();
        let joined = format!("{}{}", body_text(&result.front), body_text(&result.back));
        prop_assert_eq!(joined, body_text(&source));
    }
}
