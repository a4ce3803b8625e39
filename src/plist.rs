//! NeXTSTEP / OpenStep property list reader.
//!
//! `project.pbxproj` files are written in the old-style ASCII plist dialect:
//!
//! - `// !$*UTF8*$!`
//! - `{ archiveVersion = 1; objects = { 1D6058940D05DD3E006BFB54 /* Debug */ = { ... }; }; }`
//! - `files = ( 1D60588E0D05DD3D006BFB54 /* main.m in Sources */, );`
//!
//! Every parsed node keeps its byte range in the source so callers can splice
//! edits into the original text instead of re-serialising the whole file.
//!
//! Uses [`chumsky`] for the parsing grammar.
//!
//! ## Grammar
//!
//! ```text
//! document = trivia value trivia
//! value    = dict | array | string
//! dict     = '{' trivia (entry trivia)* '}'
//! entry    = string comment? trivia '=' trivia value comment? trivia ';'
//! array    = '(' trivia (element (',' element)* ','?)? trivia ')'
//! element  = value comment?
//! string   = '"' (escape | [^"\\])* '"' | bare+
//! trivia   = (whitespace | '/*' .. '*/' | '//' .. '\n')*
//! ```

use std::borrow::Cow;
use std::ops::Range;

use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

type Extra<'a> = extra::Err<Simple<'a, char>>;

// ═══════════════════════════════════════════════════════════════════════════════
//  Tree
// ═══════════════════════════════════════════════════════════════════════════════

/// A parsed value together with its byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub value: Value,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Quoted or bare string, already unescaped.
    String(String),
    Array(Vec<Element>),
    Dict(Vec<Entry>),
}

/// An array element and the `/* ... */` annotation that follows it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub node: Node,
    pub comment: Option<String>,
}

/// One `key /* comment */ = value /* comment */;` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub key_comment: Option<String>,
    pub value: Node,
    pub value_comment: Option<String>,
    /// Byte range of the whole statement, up to and including the `;`.
    pub span: Range<usize>,
}

impl Node {
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&[Entry]> {
        match &self.value {
            Value::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Element]> {
        match &self.value {
            Value::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Look up `key` when this node is a dictionary.  When a key repeats, the
    /// last occurrence wins, matching how Xcode reads the file.
    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.as_dict()?.iter().rev().find(|e| e.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entry(key).map(|e| &e.value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Strings
// ═══════════════════════════════════════════════════════════════════════════════

/// Characters accepted in an unquoted string when reading.
pub fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '+' | '/' | ':' | '.' | '-')
}

/// Characters Xcode itself leaves unquoted when writing.
fn is_unquoted_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '/' | '.')
}

/// Render `s` as a plist string token, quoting and escaping only when needed.
pub fn quote(s: &str) -> Cow<'_, str> {
    if !s.is_empty() && s.chars().all(is_unquoted_char) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    Cow::Owned(out)
}

/// Resolve backslash escapes in the raw text between double quotes.
/// Unknown escapes are kept verbatim.
fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(e @ ('"' | '\\')) => result.push(e),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Chumsky parser
// ═══════════════════════════════════════════════════════════════════════════════

fn block_comment<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> + Clone {
    just("/*")
        .ignore_then(any().and_is(just("*/").not()).repeated().to_slice())
        .then_ignore(just("*/"))
        .map(|s: &str| s.trim().to_string())
}

fn space<'a>() -> impl Parser<'a, &'a str, (), Extra<'a>> + Clone {
    any().filter(|c: &char| c.is_whitespace()).ignored()
}

/// Whitespace only.  Comments directly after a key or value are annotations
/// and must not be swallowed.
fn ws<'a>() -> impl Parser<'a, &'a str, (), Extra<'a>> + Clone {
    space().repeated()
}

/// Whitespace and comments of either style.
fn trivia<'a>() -> impl Parser<'a, &'a str, (), Extra<'a>> + Clone {
    let line_comment = just("//").then(none_of('\n').repeated()).ignored();
    choice((space(), block_comment().ignored(), line_comment)).repeated()
}

fn string<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> + Clone {
    let quoted = just('"')
        .ignore_then(
            none_of("\\\"")
                .ignored()
                .or(just('\\').then(any()).ignored())
                .repeated()
                .to_slice(),
        )
        .then_ignore(just('"'))
        .map(unescape);

    let bare = any()
        .filter(|c: &char| is_bare_char(*c))
        .and_is(just("/*").not())
        .repeated()
        .at_least(1)
        .to_slice()
        .map(String::from);

    quoted.or(bare)
}

fn value_parser<'a>() -> impl Parser<'a, &'a str, Node, Extra<'a>> + Clone {
    recursive(|value| {
        // ── Array:  ( elem /* c */, ... ) ───────────────────────────────
        let element = value
            .clone()
            .then_ignore(ws())
            .then(block_comment().or_not())
            .map(|(node, comment)| Element { node, comment });

        let array = just('(')
            .ignore_then(trivia())
            .ignore_then(
                element
                    .separated_by(just(',').padded_by(trivia()))
                    .allow_trailing()
                    .collect::<Vec<_>>(),
            )
            .then_ignore(trivia())
            .then_ignore(just(')'))
            .map(Value::Array);

        // ── Dictionary:  { key /* c */ = value /* c */; ... } ───────────
        let entry = string()
            .then_ignore(ws())
            .then(block_comment().or_not())
            .then_ignore(trivia())
            .then_ignore(just('='))
            .then_ignore(trivia())
            .then(value)
            .then_ignore(ws())
            .then(block_comment().or_not())
            .then_ignore(trivia())
            .then_ignore(just(';'))
            .map_with(|(((key, key_comment), value), value_comment), e| {
                let span: SimpleSpan = e.span();
                Entry {
                    key,
                    key_comment,
                    value,
                    value_comment,
                    span: span.start..span.end,
                }
            });

        let dict = just('{')
            .ignore_then(trivia())
            .ignore_then(entry.then_ignore(trivia()).repeated().collect::<Vec<_>>())
            .then_ignore(just('}'))
            .map(Value::Dict);

        choice((dict, array, string().map(Value::String))).map_with(|value, e| {
            let span: SimpleSpan = e.span();
            Node { value, span: span.start..span.end }
        })
    })
}

fn document_parser<'a>() -> impl Parser<'a, &'a str, Node, Extra<'a>> {
    trivia()
        .ignore_then(value_parser())
        .then_ignore(trivia())
        .then_ignore(end())
}

/// Parse a complete property list document (e.g. a `project.pbxproj`).
pub fn parse_plist(input: &str) -> Result<Node, String> {
    document_parser()
        .parse(input)
        .into_result()
        .map_err(|errs| {
            let messages: Vec<String> = errs
                .iter()
                .map(|e| format!("{e} at byte {}", e.span().start))
                .collect();
            format!("Failed to parse property list: {}", messages.join("; "))
        })
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
