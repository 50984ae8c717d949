//! HTML tokenizer and tree builder for template sources.
//!
//! A single linear pass over the joined template string. Supports elements,
//! quoted/unquoted/boolean attributes, text, comments, doctype (skipped),
//! void elements, `<x/>` self-closing syntax, raw-text elements and the
//! common character references. Closing tags must match exactly; there is no
//! implicit closing of `<p>` or `<li>`.

use std::borrow::Cow;

use crate::dom::{Node, NodeType, is_void_element};
use crate::error::TemplateError;

use super::placeholder::Placeholders;

/// Elements whose content is text up to the matching closing tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Raw-text elements whose content still decodes character references.
const ESCAPABLE_RAW_TEXT: &[&str] = &["textarea", "title"];

/// Parser output.
pub(crate) struct Parsed {
    pub(crate) fragment: Node,
    /// Value indices consumed by stand-in closing tags (`</${x}>`).
    pub(crate) closing_indices: Vec<usize>,
}

struct OpenElement {
    node: Node,
    tag: String,
    stand_in: bool,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    placeholders: &'a Placeholders,
    root: Node,
    stack: Vec<OpenElement>,
    closing_indices: Vec<usize>,
}

/// Parse `src` into a fragment.
pub(crate) fn parse(src: &str, placeholders: &Placeholders) -> Result<Parsed, TemplateError> {
    let mut parser = Parser {
        src,
        pos: 0,
        placeholders,
        root: Node::fragment(),
        stack: Vec::new(),
        closing_indices: Vec::new(),
    };
    parser.run()?;
    Ok(Parsed {
        fragment: parser.root,
        closing_indices: parser.closing_indices,
    })
}

impl<'a> Parser<'a> {
    fn run(&mut self) -> Result<(), TemplateError> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.comment()?;
            } else if rest.starts_with("</") {
                self.closing_tag()?;
            } else if rest.starts_with("<!") {
                self.skip_declaration()?;
            } else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                self.open_tag()?;
            } else {
                self.text();
            }
        }

        match self.stack.pop() {
            Some(open) => Err(TemplateError::UnclosedElement { tag: open.tag }),
            None => Ok(()),
        }
    }

    // -------------------------------------------------------------------------
    // Cursor helpers
    // -------------------------------------------------------------------------

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn parent(&self) -> Node {
        self.stack.last().map_or_else(|| self.root.clone(), |open| open.node.clone())
    }

    fn append_text(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.parent();
        match parent.last_child() {
            Some(last) if last.node_type() == NodeType::Text => {
                last.set_data(last.data() + text);
            }
            _ => parent.append_child(&Node::text(text)),
        }
    }

    // -------------------------------------------------------------------------
    // Productions
    // -------------------------------------------------------------------------

    fn text(&mut self) {
        let start = self.pos;
        // A lone '<' that does not open markup is text.
        if self.rest().starts_with('<') {
            self.bump();
        }
        self.take_while(|c| c != '<');
        let raw = &self.src[start..self.pos];
        self.append_text(&decode_entities(raw));
    }

    fn comment(&mut self) -> Result<(), TemplateError> {
        let offset = self.pos;
        let body_start = self.pos + 4;
        let Some(len) = self.src[body_start..].find("-->") else {
            return Err(TemplateError::UnterminatedComment { offset });
        };
        let data = &self.src[body_start..body_start + len];
        if self.placeholders.appears_in(data) {
            return Err(TemplateError::InvalidPlaceholderPosition { context: "a comment" });
        }
        self.parent().append_child(&Node::comment(data));
        self.pos = body_start + len + 3;
        Ok(())
    }

    fn skip_declaration(&mut self) -> Result<(), TemplateError> {
        let offset = self.pos;
        match self.rest().find('>') {
            Some(end) => {
                self.pos += end + 1;
                Ok(())
            }
            None => Err(TemplateError::UnterminatedTag { offset }),
        }
    }

    fn open_tag(&mut self) -> Result<(), TemplateError> {
        let offset = self.pos;
        self.bump();
        let name = self
            .take_while(|c| !c.is_ascii_whitespace() && c != '/' && c != '>')
            .to_ascii_lowercase();
        let stand_in = self.placeholders.parse_token(&name).is_some();
        if !stand_in && self.placeholders.appears_in(&name) {
            return Err(TemplateError::InvalidPlaceholderPosition { context: "a tag name" });
        }

        let element = Node::element(&name);
        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(TemplateError::UnterminatedTag { offset });
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                break true;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }
            if rest.starts_with('/') {
                self.bump();
                continue;
            }
            self.attribute(&element)?;
        };

        self.parent().append_child(&element);
        if self_closing || (!stand_in && is_void_element(&name)) {
            return Ok(());
        }
        if !stand_in && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            return self.raw_text(&element, &name);
        }
        self.stack.push(OpenElement {
            node: element,
            tag: name,
            stand_in,
        });
        Ok(())
    }

    fn attribute(&mut self, element: &Node) -> Result<(), TemplateError> {
        let name_offset = self.pos;
        let name = self
            .take_while(|c| !c.is_ascii_whitespace() && !matches!(c, '=' | '>' | '/'))
            .to_ascii_lowercase();
        if name.is_empty() {
            // Stray character such as a lone '='.
            self.bump();
            return Ok(());
        }
        if self.placeholders.appears_in(&name) && self.placeholders.parse_token(&name).is_none() {
            return Err(TemplateError::InvalidPlaceholderPosition { context: "an attribute name" });
        }

        self.skip_whitespace();
        if self.peek() != Some('=') {
            element.set_attribute(&name, "");
            return Ok(());
        }
        self.bump();
        self.skip_whitespace();

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                let Some(len) = self.rest().find(quote) else {
                    return Err(TemplateError::UnterminatedAttribute {
                        name,
                        offset: name_offset,
                    });
                };
                self.pos += len + 1;
                &self.src[start..start + len]
            }
            Some(_) => self.take_while(|c| !c.is_ascii_whitespace() && c != '>'),
            None => {
                return Err(TemplateError::UnterminatedAttribute {
                    name,
                    offset: name_offset,
                });
            }
        };
        element.set_attribute(&name, &decode_entities(value));
        Ok(())
    }

    fn raw_text(&mut self, element: &Node, tag: &str) -> Result<(), TemplateError> {
        let closing = format!("</{tag}");
        let lower = self.rest().to_ascii_lowercase();
        let Some(len) = lower.find(&closing) else {
            return Err(TemplateError::UnclosedElement { tag: tag.to_string() });
        };
        let content = &self.src[self.pos..self.pos + len];
        if self.placeholders.appears_in(content) {
            return Err(TemplateError::InvalidPlaceholderPosition { context: "raw text" });
        }
        if !content.is_empty() {
            let text = if ESCAPABLE_RAW_TEXT.contains(&tag) {
                decode_entities(content)
            } else {
                Cow::Borrowed(content)
            };
            element.append_child(&Node::text(text.into_owned()));
        }

        let close_offset = self.pos + len;
        self.pos = close_offset;
        match self.rest().find('>') {
            Some(end) => {
                self.pos += end + 1;
                Ok(())
            }
            None => Err(TemplateError::UnterminatedTag { offset: close_offset }),
        }
    }

    fn closing_tag(&mut self) -> Result<(), TemplateError> {
        let offset = self.pos;
        let Some(end) = self.rest().find('>') else {
            return Err(TemplateError::UnterminatedTag { offset });
        };
        let name = self.src[self.pos + 2..self.pos + end].trim().to_ascii_lowercase();
        self.pos += end + 1;

        let token = self.placeholders.parse_token(&name);
        if token.is_none() && self.placeholders.appears_in(&name) {
            return Err(TemplateError::InvalidPlaceholderPosition { context: "a closing tag" });
        }
        let Some(open) = self.stack.last() else {
            return Err(TemplateError::UnexpectedClosingTag { tag: name, offset });
        };

        match (open.stand_in, token) {
            (true, Some(index)) => self.closing_indices.push(index),
            (false, None) if open.tag == name => {}
            (false, None) => {
                return Err(TemplateError::MismatchedClosingTag {
                    expected: open.tag.clone(),
                    found: name,
                    offset,
                });
            }
            _ => return Err(TemplateError::MismatchedStandIn { offset }),
        }
        self.stack.pop();
        Ok(())
    }
}

/// Decode character references. Unknown references are kept verbatim.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let decoded = decode_reference(&rest[1..semi])?;
            Some((decoded, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_plain(src: &str) -> Result<Node, TemplateError> {
        parse(src, &Placeholders::with_stem("sp-t-")).map(|parsed| parsed.fragment)
    }

    #[test]
    fn test_elements_attributes_and_text() {
        let fragment = parse_plain(r#"<div class="a b" id=main hidden><p>Hi &amp; bye</p></div>"#).unwrap();
        let div = fragment.first_child().unwrap();

        assert_eq!(div.attribute("class").as_deref(), Some("a b"));
        assert_eq!(div.attribute("id").as_deref(), Some("main"));
        assert_eq!(div.attribute("hidden").as_deref(), Some(""));
        assert_eq!(div.text_content(), "Hi & bye");
    }

    #[test]
    fn test_void_and_self_closing() {
        let fragment = parse_plain("<p>a<br>b<x-icon/>c</p>").unwrap();
        assert_eq!(fragment.inner_html(), "<p>a<br>b<x-icon></x-icon>c</p>");
    }

    #[test]
    fn test_whitespace_and_comments_are_kept() {
        let fragment = parse_plain("<ul>\n  <li>1</li><!-- note -->\n</ul>").unwrap();
        let list = fragment.first_child().unwrap();
        assert_eq!(list.child_count(), 4);
        assert_eq!(list.child(2).unwrap().data(), " note ");
    }

    #[test]
    fn test_raw_text_is_not_parsed() {
        let fragment = parse_plain("<script>if (a < b) { x = '<p>'; }</script><title>A &amp; B</title>").unwrap();
        let script = fragment.first_child().unwrap();
        assert_eq!(script.text_content(), "if (a < b) { x = '<p>'; }");
        assert_eq!(fragment.last_child().unwrap().text_content(), "A & B");
    }

    #[test]
    fn test_doctype_is_skipped_and_lone_lt_is_text() {
        let fragment = parse_plain("<!DOCTYPE html>1 < 2").unwrap();
        assert_eq!(fragment.child_count(), 1);
        assert_eq!(fragment.text_content(), "1 < 2");
    }

    #[test]
    fn test_numeric_references() {
        assert_eq!(decode_entities("&#65;&#x42;&unknown;&"), "AB&unknown;&");
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_plain("<div><span></div>").err(),
            Some(TemplateError::MismatchedClosingTag {
                expected: "span".into(),
                found: "div".into(),
                offset: 11,
            })
        );
        assert_eq!(
            parse_plain("<div>").err(),
            Some(TemplateError::UnclosedElement { tag: "div".into() })
        );
        assert_eq!(
            parse_plain("</p>").err(),
            Some(TemplateError::UnexpectedClosingTag { tag: "p".into(), offset: 0 })
        );
        assert_eq!(parse_plain("<!-- open").err(), Some(TemplateError::UnterminatedComment { offset: 0 }));
        assert_eq!(parse_plain("<a href=\"x").err(), Some(TemplateError::UnterminatedAttribute {
            name: "href".into(),
            offset: 3,
        }));
        assert_eq!(parse_plain("<div class").err(), Some(TemplateError::UnterminatedTag { offset: 0 }));
    }

    #[test]
    fn test_stand_in_closing() {
        let placeholders = Placeholders::with_stem("sp-t-");
        let parsed = parse("<sp-t-0->child</sp-t-1->", &placeholders).unwrap();
        assert_eq!(parsed.closing_indices, vec![1]);
        assert_eq!(parsed.fragment.first_child().unwrap().text_content(), "child");

        assert_eq!(
            parse("<sp-t-0->child</div>", &placeholders).err(),
            Some(TemplateError::MismatchedStandIn { offset: 14 })
        );
    }

    #[test]
    fn test_placeholder_in_comment_is_rejected() {
        assert_eq!(
            parse_plain("<!-- sp-t-0- -->").err(),
            Some(TemplateError::InvalidPlaceholderPosition { context: "a comment" })
        );
    }
}
