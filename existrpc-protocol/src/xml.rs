//! Micro XML parser.
//!
//! Handles the restricted XML subset that XML-RPC peers actually emit:
//!
//! - elements with attributes (`"` or `'` quoted) and self-closing tags
//! - text content, unescaped through the five predefined entities
//! - comments and `<?...?>` declarations, which are skipped
//! - `<![CDATA[...]]>` sections, passed through literally
//!
//! Anything else (DTDs, namespaces, custom entities) is out of scope. Unknown
//! entity references such as `&nbsp;` or `&#10;` are kept as literal text.

use crate::error::{ParseError, ParseErrorKind};
use std::collections::BTreeMap;

/// A parsed XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Tag name, including any prefix (`ex:nil`).
    pub name: String,
    /// Attribute values, already unescaped.
    pub attributes: BTreeMap<String, String>,
    /// All direct text content of this element, concatenated in document order.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// Returns the first child with the given tag name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Iterates over children with the given tag name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Deepest element nesting [`parse`] accepts. The root is level 1.
pub const MAX_DEPTH: usize = 512;

/// Parses a single root element (with its descendants) from `input`.
///
/// Leading whitespace, comments and declarations are skipped. Content after
/// the root element is ignored. Nesting beyond [`MAX_DEPTH`] fails with
/// [`ParseErrorKind::TooDeep`].
pub fn parse(input: &str) -> Result<Element, ParseError> {
    Parser::new(input).parse_element()
}

/// Escapes text for use in element content or attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

const ENTITIES: [(&str, char); 5] = [
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&apos;", '\''),
];

/// Replaces the five predefined entities in a single pass.
///
/// `&amp;lt;` becomes `&lt;`, not `<`.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, c)) => {
                out.push(*c);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b':' | b'-')
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            depth: 0,
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.src.as_bytes()[self.pos..].starts_with(prefix.as_bytes())
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(self.pos, kind)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Advances past the next occurrence of `terminator`.
    fn skip_past(&mut self, terminator: &str) -> Result<(), ParseError> {
        match self.src[self.pos..].find(terminator) {
            Some(idx) => {
                self.pos += idx + terminator.len();
                Ok(())
            }
            None => Err(self.error(ParseErrorKind::UnterminatedMarkup)),
        }
    }

    /// Skips a comment or declaration at the cursor. Returns false if there was none.
    fn skip_markup(&mut self) -> Result<bool, ParseError> {
        if self.starts_with("<!--") {
            self.pos += 4;
            self.skip_past("-->")?;
            Ok(true)
        } else if self.starts_with("<?") {
            self.pos += 2;
            self.skip_past("?>")?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), ParseError> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(ParseErrorKind::Expected(c as char)))
        }
    }

    fn parse_name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_name_byte(b)) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(ParseErrorKind::ExpectedName));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn parse_element(&mut self) -> Result<Element, ParseError> {
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error(ParseErrorKind::UnexpectedEof)),
                Some(b'<') => {}
                Some(_) => return Err(self.error(ParseErrorKind::Expected('<'))),
            }
            if !self.skip_markup()? {
                break;
            }
        }

        if self.starts_with("</") {
            return Err(self.error(ParseErrorKind::UnexpectedClosingTag));
        }
        if self.depth >= MAX_DEPTH {
            return Err(self.error(ParseErrorKind::TooDeep(MAX_DEPTH)));
        }
        self.pos += 1;

        let name = self.parse_name()?;
        let attributes = self.parse_attributes()?;

        if self.starts_with("/>") {
            self.pos += 2;
            return Ok(Element {
                name,
                attributes,
                ..Default::default()
            });
        }
        self.expect(b'>')?;

        self.depth += 1;
        let content = self.parse_content(&name);
        self.depth -= 1;
        let (text, children) = content?;
        Ok(Element {
            name,
            attributes,
            text,
            children,
        })
    }

    fn parse_attributes(&mut self) -> Result<BTreeMap<String, String>, ParseError> {
        let mut attributes = BTreeMap::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error(ParseErrorKind::Expected('>'))),
                Some(b'>') => break,
                Some(b'/') if self.starts_with("/>") => break,
                Some(_) => {}
            }

            let name = self.parse_name()?;
            self.skip_whitespace();
            self.expect(b'=')?;
            self.skip_whitespace();

            let quote = match self.peek() {
                Some(q @ (b'"' | b'\'')) => q,
                _ => return Err(self.error(ParseErrorKind::Expected('"'))),
            };
            let open = self.pos;
            self.pos += 1;
            let len = self.bytes()[self.pos..]
                .iter()
                .position(|&b| b == quote)
                .ok_or_else(|| ParseError::new(open, ParseErrorKind::UnterminatedAttribute))?;
            let value = unescape(&self.src[self.pos..self.pos + len]);
            self.pos += len + 1;

            attributes.insert(name, value);
        }
        Ok(attributes)
    }

    fn parse_content(&mut self, open_tag: &str) -> Result<(String, Vec<Element>), ParseError> {
        let mut text = String::new();
        let mut children = Vec::new();

        loop {
            match self.peek() {
                None => {
                    return Err(self.error(ParseErrorKind::UnclosedTag(open_tag.to_string())))
                }
                Some(b'<') => {
                    if self.starts_with("</") {
                        let close_start = self.pos;
                        self.pos += 2;
                        let name = self.parse_name()?;
                        self.skip_whitespace();
                        self.expect(b'>')?;
                        if name != open_tag {
                            return Err(ParseError::new(
                                close_start,
                                ParseErrorKind::UnclosedTag(open_tag.to_string()),
                            ));
                        }
                        return Ok((text, children));
                    }
                    if self.starts_with("<![CDATA[") {
                        self.pos += 9;
                        let start = self.pos;
                        self.skip_past("]]>")?;
                        text.push_str(&self.src[start..self.pos - 3]);
                        continue;
                    }
                    if self.skip_markup()? {
                        continue;
                    }
                    children.push(self.parse_element()?);
                }
                Some(_) => {
                    let start = self.pos;
                    let len = self.bytes()[start..]
                        .iter()
                        .position(|&b| b == b'<')
                        .unwrap_or(self.src.len() - start);
                    self.pos += len;
                    text.push_str(&unescape(&self.src[start..self.pos]));
                }
            }
        }
    }
}
