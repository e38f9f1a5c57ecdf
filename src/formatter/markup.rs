//! Best-effort indentation for XML and HTML.
//!
//! This is a nesting-depth re-indenter, not a parser: it splits the markup
//! into tags and text and puts each on its own line. Anything it cannot make
//! sense of (unterminated tags, mismatched closing tags) yields `None` and the
//! caller keeps the body as received.

const INDENT: &str = "  ";

/// Elements that never have a closing tag in HTML.
const HTML_VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is kept byte for byte.
const HTML_RAW_TEXT: &[&str] = &["script", "style", "pre", "textarea"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Open { name: &'a str, raw: &'a str },
    Close { name: &'a str, raw: &'a str },
    Empty(&'a str),
    Text(&'a str),
    Verbatim(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Xml,
    Html,
}

impl Dialect {
    fn same_name(self, a: &str, b: &str) -> bool {
        match self {
            Dialect::Xml => a == b,
            Dialect::Html => a.eq_ignore_ascii_case(b),
        }
    }

    fn is_void(self, name: &str) -> bool {
        self == Dialect::Html && HTML_VOID.iter().any(|v| v.eq_ignore_ascii_case(name))
    }

    fn is_raw_text(self, name: &str) -> bool {
        self == Dialect::Html && HTML_RAW_TEXT.iter().any(|v| v.eq_ignore_ascii_case(name))
    }
}

pub fn indent_xml(input: &str) -> Option<String> {
    indent(input, Dialect::Xml)
}

pub fn indent_html(input: &str) -> Option<String> {
    indent(input, Dialect::Html)
}

fn indent(input: &str, dialect: Dialect) -> Option<String> {
    let tokens = tokenize(input, dialect)?;
    if tokens.is_empty() {
        return None;
    }
    render(&tokens, dialect)
}

fn tokenize(input: &str, dialect: Dialect) -> Option<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        if !rest.starts_with('<') {
            let end = rest.find('<').unwrap_or(rest.len());
            let text = rest[..end].trim();
            if !text.is_empty() {
                tokens.push(Token::Text(text));
            }
            pos += end;
            continue;
        }

        let len = if rest.starts_with("<!--") {
            rest.find("-->")? + 3
        } else if rest.starts_with("<![CDATA[") {
            rest.find("]]>")? + 3
        } else if rest.starts_with("<?") {
            rest.find("?>")? + 2
        } else if rest.starts_with("<!") {
            rest.find('>')? + 1
        } else {
            tag_end(rest)?
        };

        let raw = &rest[..len];
        pos += len;

        if raw.starts_with("<!") || raw.starts_with("<?") {
            tokens.push(Token::Verbatim(raw));
        } else if let Some(inner) = raw.strip_prefix("</") {
            let name = inner.trim_end_matches('>').trim();
            if !valid_name(name) {
                return None;
            }
            tokens.push(Token::Close { name, raw });
        } else {
            let name = tag_name(raw)?;
            if raw.ends_with("/>") || dialect.is_void(name) {
                tokens.push(Token::Empty(raw));
            } else if dialect.is_raw_text(name) {
                // copy everything up to the matching close tag
                let body = &input[pos..];
                let close_at = find_ignore_case(body, &format!("</{}", name))?;
                let close_len = body[close_at..].find('>')? + 1;
                tokens.push(Token::Open { name, raw });
                if !body[..close_at].is_empty() {
                    tokens.push(Token::Verbatim(&body[..close_at]));
                }
                let close_raw = &body[close_at..close_at + close_len];
                tokens.push(Token::Close {
                    name,
                    raw: close_raw,
                });
                pos += close_at + close_len;
            } else {
                tokens.push(Token::Open { name, raw });
            }
        }
    }

    Some(tokens)
}

/// Length of the tag starting at `s[0] == '<'`, honouring quoted attributes.
fn tag_end(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '<') => return None,
            (None, '>') => return Some(i + 1),
            _ => {}
        }
    }
    None
}

fn tag_name(raw: &str) -> Option<&str> {
    let inner = &raw[1..];
    let end = inner
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(inner.len());
    let name = &inner[..end];
    valid_name(name).then_some(name)
}

fn valid_name(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

fn render(tokens: &[Token<'_>], dialect: Dialect) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let depth = stack.len();
        match &tokens[i] {
            Token::Open { name, raw } => {
                // <a>text</a> stays on one line
                if let (
                    Some(Token::Text(text) | Token::Verbatim(text)),
                    Some(Token::Close { name: close, raw: end }),
                ) =
                    (tokens.get(i + 1), tokens.get(i + 2))
                    && dialect.same_name(name, close)
                {
                    lines.push(format!("{}{}{}{}", INDENT.repeat(depth), raw, text, end));
                    i += 3;
                    continue;
                }
                if let Some(Token::Close { name: close, raw: end }) = tokens.get(i + 1)
                    && dialect.same_name(name, close)
                {
                    lines.push(format!("{}{}{}", INDENT.repeat(depth), raw, end));
                    i += 2;
                    continue;
                }
                lines.push(format!("{}{}", INDENT.repeat(depth), raw));
                stack.push(*name);
            }
            Token::Close { name, raw } => {
                let open_at = stack
                    .iter()
                    .rposition(|open| dialect.same_name(open, name))?;
                // HTML lets inner elements close implicitly; XML does not
                if open_at + 1 != stack.len() && dialect == Dialect::Xml {
                    return None;
                }
                stack.truncate(open_at);
                lines.push(format!("{}{}", INDENT.repeat(stack.len()), raw));
            }
            Token::Empty(raw) | Token::Text(raw) | Token::Verbatim(raw) => {
                lines.push(format!("{}{}", INDENT.repeat(depth), raw));
            }
        }
        i += 1;
    }

    if dialect == Dialect::Xml && !stack.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}
