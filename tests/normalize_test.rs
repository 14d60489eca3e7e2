//! Normalizer and serializer tests.
//!
//! Feeds tag soup through the public normalization API and checks the
//! layout rules of the pretty-printer on the result.

use proptest::prelude::*;
use quire::dom::XmlDocument;
use quire::{EpubVersion, NormalizeOptions, SerializeOptions, normalize_html, serialize_document};

fn normalize(html: &str) -> String {
    normalize_html(html.as_bytes(), &NormalizeOptions::default())
}

fn reserialize(xhtml: &str) -> String {
    let doc = XmlDocument::parse(xhtml).unwrap();
    serialize_document(&doc, &SerializeOptions::default())
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_paragraph_whitespace_collapsed() {
    let out = normalize("<p>a   b\n\n c</p>");
    assert!(out.contains("<p>a b c</p>"), "{out}");
}

#[test]
fn test_blank_line_after_all_but_last_paragraph() {
    let out = normalize("<div><p>x</p><p>y</p></div>");
    assert!(out.contains("<p>x</p>\n\n"), "{out}");
    assert!(out.contains("<p>y</p>\n"), "{out}");
    assert!(!out.contains("<p>y</p>\n\n"), "{out}");
}

#[test]
fn test_every_element_in_xhtml_namespace() {
    let out = normalize("<div><span>t</span></div>");
    let doc = XmlDocument::parse(&out).unwrap();
    for id in doc.elements() {
        assert_eq!(
            doc.element_namespace(id).map(|ns| &**ns),
            Some("http://www.w3.org/1999/xhtml")
        );
    }
    assert_eq!(out.matches("xmlns=").count(), 1);
}

#[test]
fn test_empty_element_policy() {
    let collapsed = normalize("<body><hr><p>a<br>b</p></body>");
    assert!(collapsed.contains("<hr />"), "{collapsed}");
    assert!(collapsed.contains("<br />\nb"), "{collapsed}");

    let options = NormalizeOptions::default()
        .with_serialize_options(SerializeOptions::default().with_expand_empty_elements(true));
    let expanded = normalize_html(b"<body><hr><p>a<br>b</p></body>", &options);
    assert!(expanded.contains("<hr></hr>"), "{expanded}");
    assert!(expanded.contains("<p>a<br></br>b</p>"), "{expanded}");
}

#[test]
fn test_invalid_markup_still_well_formed() {
    let soups = [
        "<p foo\"bar=x>t</p>",
        "<div 1a=\"b\" id=\"ok\">t</div>",
        "<p>a<!-- x -- y -->b</p>",
        "<p>a\u{1}b\u{b}c</p>",
        "<p title=\"a\u{2}b\">t</p>",
        "<p\"x>t</p>",
        "<!--dash---><p>t</p>",
    ];
    for soup in soups {
        let out = normalize(soup);
        if let Err(e) = XmlDocument::parse(&out) {
            panic!("{soup:?} normalized to unparseable output ({e}):\n{out}");
        }
    }

    let out = normalize("<p foo\"bar=x>t</p>");
    assert!(!out.contains("foo"), "{out}");
    assert!(out.contains("<p>t</p>"), "{out}");

    let out = normalize("<div 1a=\"b\" id=\"ok\">t</div>");
    assert!(out.contains("<div id=\"ok\">"), "{out}");
    assert!(!out.contains("1a"), "{out}");

    let out = normalize("<p>a<!-- x -- y -->b</p>");
    assert!(out.contains("<!-- x - - y -->"), "{out}");

    let out = normalize("<p>a\u{1}b\u{b}c</p>");
    assert!(out.contains("<p>abc</p>"), "{out}");
}

#[test]
fn test_pre_kept_verbatim() {
    let out = normalize("<pre>line one\n    indented</pre>");
    assert!(out.contains("<pre>line one\n    indented</pre>"), "{out}");
}

#[test]
fn test_head_and_body_layout() {
    let out = normalize("<title>Book</title><p>Text</p>");
    let expected = concat!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n",
        "<!DOCTYPE html>\n",
        "<html xmlns=\"http://www.w3.org/1999/xhtml\">\n",
        "  <head>\n",
        "    <title>Book</title>\n",
        "  </head>\n",
        "  <body>\n",
        "    <p>Text</p>\n",
        "  </body>\n",
        "</html>\n",
    );
    assert_eq!(out, expected);
}

// ============================================================================
// Encoding and version
// ============================================================================

#[test]
fn test_latin1_declared_charset_redecoded() {
    let mut html = b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=ISO-8859-1\"></head><body><p>na".to_vec();
    html.push(0xEF);
    html.extend_from_slice(b"ve</p></body></html>");

    let out = normalize_html(&html, &NormalizeOptions::default());
    assert!(out.contains("<p>na\u{ef}ve</p>"), "{out}");
}

#[test]
fn test_epub2_uses_legacy_doctype() {
    let out = normalize_html(b"<p>x</p>", &NormalizeOptions::new(EpubVersion::V2));
    assert!(out.contains("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\""), "{out}");
}

#[test]
fn test_source_lines_tagged() {
    let options = NormalizeOptions::default().with_source_lines(true);
    let out = normalize_html(b"<html>\n<body>\n<p>x</p>\n</body>\n</html>", &options);
    assert!(out.contains("quire-line-3"), "{out}");
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_normalized_output_is_stable() {
    let out = normalize(
        "<div>intro <em>emph</em><p>one  two<br>  three</p><blockquote><p>q</p></blockquote></div><p> <a href=\"#x\"> link </a> tail </p>",
    );
    assert_eq!(reserialize(&out), out);
}

fn text_strategy() -> impl Strategy<Value = String> {
    let word = prop_oneof!["[a-z]{1,6}", Just("&amp;".to_string()), Just("&lt;".to_string())];
    let space = prop_oneof![Just(" "), Just("  "), Just("\n"), Just("\t "), Just(" \n  ")];
    prop::collection::vec((word, space), 1..5).prop_map(|parts| {
        parts
            .into_iter()
            .map(|(word, space)| format!("{word}{space}"))
            .collect()
    })
}

fn inline_strategy() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        3 => text_strategy(),
        1 => Just("<br>".to_string()),
        1 => text_strategy().prop_map(|t| format!("<a href=\"#n\">{t}</a>")),
    ];
    leaf.prop_recursive(3, 12, 4, |inner| {
        (
            prop_oneof![Just("em"), Just("span"), Just("strong")],
            prop::collection::vec(inner, 1..4),
        )
            .prop_map(|(tag, children)| format!("<{tag}>{}</{tag}>", children.concat()))
    })
}

fn block_strategy() -> impl Strategy<Value = String> {
    let leaf = (
        prop_oneof![Just("p"), Just("h2")],
        prop::collection::vec(inline_strategy(), 1..4),
    )
        .prop_map(|(tag, children)| format!("<{tag}>{}</{tag}>", children.concat()));
    leaf.prop_recursive(3, 16, 4, |inner| {
        (
            prop_oneof![Just("div"), Just("blockquote")],
            prop::collection::vec(inner, 1..4),
        )
            .prop_map(|(tag, children)| format!("<{tag}>\n{}</{tag}>\n", children.concat()))
    })
}

proptest! {
    #[test]
    fn prop_serialize_reparse_serialize_is_identical(
        blocks in prop::collection::vec(block_strategy(), 1..4)
    ) {
        let html = format!("<html><head><title>t</title></head><body>{}</body></html>", blocks.concat());
        let first = normalize(&html);
        let second = reserialize(&first);
        prop_assert_eq!(second, first);
    }

    #[test]
    fn prop_no_whitespace_runs_inside_paragraphs(
        inline in prop::collection::vec(inline_strategy(), 1..4)
    ) {
        let out = normalize(&format!("<p>{}</p>", inline.concat()));
        let doc = XmlDocument::parse(&out).unwrap();
        let p = doc.find_by_tag("p").unwrap();
        for id in doc.descendants(p) {
            if let Some(text) = doc.text(id) {
                prop_assert!(!text.contains("  "), "{:?}", text);
            }
        }
    }
}
