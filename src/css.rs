//! Parsed-stylesheet native format for CSS resources.
//!
//! Rules are split into their prelude and raw block text so callers can list
//! and inspect them. Declarations inside a block are not interpreted.

use cssparser::{ParseError, Parser, ParserInput, Token};

type CssParseError<'i> = ParseError<'i, ()>;

/// One top-level rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssRule {
    /// Selector list or at-rule header, as written.
    pub prelude: String,
    /// Block contents without the braces. `None` for statements such as `@import`.
    pub block: Option<String>,
}

impl CssRule {
    pub fn is_at_rule(&self) -> bool {
        self.prelude.starts_with('@')
    }
}

/// A stylesheet split into top-level rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    rules: Vec<CssRule>,
}

impl Stylesheet {
    /// Parse a stylesheet. Parsing is tolerant and never fails; malformed
    /// trailing input is dropped.
    pub fn parse(css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules = Vec::new();
        let mut start = parser.position();

        loop {
            let before = parser.position();
            let token = match parser.next() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };
            match token {
                Token::CurlyBracketBlock => {
                    let prelude = parser.slice(start..before).trim().to_string();
                    let block = parser
                        .parse_nested_block(|block| {
                            let inner_start = block.position();
                            while block.next_including_whitespace_and_comments().is_ok() {}
                            Ok::<_, CssParseError>(block.slice_from(inner_start).to_string())
                        })
                        .unwrap_or_default();
                    rules.push(CssRule {
                        prelude: strip_leading_comments(&prelude).to_string(),
                        block: Some(block.trim().to_string()),
                    });
                    start = parser.position();
                }
                Token::Semicolon => {
                    let prelude = parser.slice(start..before).trim();
                    let prelude = strip_leading_comments(prelude);
                    if !prelude.is_empty() {
                        rules.push(CssRule {
                            prelude: prelude.to_string(),
                            block: None,
                        });
                    }
                    start = parser.position();
                }
                _ => {}
            }
        }

        Stylesheet { rules }
    }

    pub fn rules(&self) -> &[CssRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Targets of `@import` statements, in order.
    pub fn imports(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| rule.block.is_none())
            .filter_map(|rule| import_target(&rule.prelude))
            .collect()
    }
}

fn strip_leading_comments(mut text: &str) -> &str {
    while let Some(rest) = text.strip_prefix("/*") {
        match rest.find("*/") {
            Some(end) => text = rest[end + 2..].trim_start(),
            None => return "",
        }
    }
    text
}

fn import_target(prelude: &str) -> Option<String> {
    let keyword = prelude.get(..7)?;
    if !keyword.eq_ignore_ascii_case("@import") {
        return None;
    }
    let mut input = ParserInput::new(&prelude[7..]);
    let mut parser = Parser::new(&mut input);
    match parser.next().ok()?.clone() {
        Token::QuotedString(url) | Token::UnquotedUrl(url) => Some(url.to_string()),
        Token::Function(name) if name.eq_ignore_ascii_case("url") => parser
            .parse_nested_block(|p| {
                let url = match p.next() {
                    Ok(Token::QuotedString(url)) => Some(url.to_string()),
                    _ => None,
                };
                Ok::<_, CssParseError>(url)
            })
            .ok()
            .flatten(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules() {
        let sheet = Stylesheet::parse("p { margin: 0 }\nh1, h2 { font-weight: bold; }");
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.rules()[0].prelude, "p");
        assert_eq!(sheet.rules()[0].block.as_deref(), Some("margin: 0"));
        assert_eq!(sheet.rules()[1].prelude, "h1, h2");
    }

    #[test]
    fn test_imports() {
        let sheet = Stylesheet::parse(
            "@import \"base.css\";\n@import url(fonts.css);\n@import url('print.css') print;\np {}",
        );
        assert_eq!(sheet.imports(), vec!["base.css", "fonts.css", "print.css"]);
        assert!(sheet.rules()[0].is_at_rule());
        assert_eq!(sheet.rules()[3].block.as_deref(), Some(""));
    }

    #[test]
    fn test_nested_at_rule_kept_as_block() {
        let sheet = Stylesheet::parse("@media print { p { color: black } }");
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.rules()[0].prelude, "@media print");
        assert_eq!(sheet.rules()[0].block.as_deref(), Some("p { color: black }"));
    }

    #[test]
    fn test_comments_before_rule() {
        let sheet = Stylesheet::parse("/* header */ body { margin: 1em }");
        assert_eq!(sheet.rules()[0].prelude, "body");
    }

    #[test]
    fn test_garbage_is_tolerated() {
        let sheet = Stylesheet::parse("}}} p { color: red");
        assert!(sheet.len() <= 1);
        assert!(Stylesheet::parse("").is_empty());
    }
}
