//! Product name lookup in a Cordova `config.xml`.
//!
//! Only the first `<name>...</name>` element matters.  The match is
//! deliberately permissive: tags are case-insensitive, the text may span
//! lines, and nothing else in the document has to be well-formed XML.

use std::path::Path;

use chumsky::prelude::*;

use crate::error::PatchError;

/// Manifest file name inside the Cordova project root.
pub const MANIFEST_FILE_NAME: &str = "config.xml";

type Extra<'a> = extra::Err<Simple<'a, char>>;

/// Case-insensitive alphabetic word equal to `word`.
fn keyword<'a>(word: &'static str) -> impl Parser<'a, &'a str, (), Extra<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .repeated()
        .at_least(1)
        .to_slice()
        .filter(move |s: &&str| s.eq_ignore_ascii_case(word))
        .ignored()
}

fn name_parser<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> {
    let open = just('<').then(keyword("name")).then(just('>')).ignored();
    let close = just("</").then(keyword("name")).then(just('>')).ignored();

    any()
        .and_is(open.clone().not())
        .repeated()
        .ignore_then(open)
        .ignore_then(any().and_is(close.clone().not()).repeated().to_slice())
        .then_ignore(close)
        .then_ignore(any().repeated())
        .map(|s: &str| s.trim().to_string())
}

/// Extract the product name from the **contents** of a `config.xml`.
///
/// The text ends at the first `</name>` after the first `<name>`.  Earlier
/// hook scripts used a greedy match that ran to the last `</name>` in the
/// document instead.
///
/// # Example
/// ```
/// let xml = "<widget id=\"io.cordova.hello\">\n  <name>\n    MyApp\n  </name>\n</widget>";
/// assert_eq!(xcpatch_rs::manifest::parse_project_name(xml).unwrap(), "MyApp");
/// ```
pub fn parse_project_name(content: &str) -> Result<String, PatchError> {
    name_parser()
        .parse(content)
        .into_result()
        .map_err(|_| PatchError::Manifest("no <name>...</name> element found".to_string()))
}

/// Read `<project_root>/config.xml` and extract the product name.
pub fn read_project_name(project_root: impl AsRef<Path>) -> Result<String, PatchError> {
    let path = project_root.as_ref().join(MANIFEST_FILE_NAME);
    let content = std::fs::read_to_string(&path).map_err(|e| PatchError::io(&path, e))?;
    parse_project_name(&content).map_err(|e| match e {
        PatchError::Manifest(msg) => PatchError::Manifest(format!("{}: {msg}", path.display())),
        other => other,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
