//! Read and append to Xcode `.xcconfig` files.
//!
//! Cordova generates `platforms/ios/cordova/build.xcconfig` with lines of the
//! form `KEY = VALUE`, `// comments` and `#include "other.xcconfig"`
//! directives.  Appending is plain text concatenation: a repeated append
//! repeats the block, and the last definition of a key is the one Xcode uses.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use crate::error::PatchError;

/// Parse the **contents** of an `.xcconfig` file into a setting map.
///
/// Later definitions override earlier ones.  Comment lines, `#include`
/// directives and lines without `=` are skipped.
///
/// # Example
/// ```
/// let vars = xcpatch_rs::xcconfig::parse_xcconfig("SWIFT_VERSION = 5.0\n// note\n");
/// assert_eq!(vars["SWIFT_VERSION"], "5.0");
/// ```
pub fn parse_xcconfig(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }

        let Some(eq_pos) = separator(trimmed) else {
            continue;
        };

        let key = trimmed[..eq_pos].trim();
        if key.is_empty() {
            continue;
        }

        let value = trimmed[eq_pos + 1..].trim().trim_end_matches(';').trim_end();
        vars.insert(key.to_string(), value.to_string());
    }

    vars
}

/// Byte offset of the `=` separating key and value.  An `=` inside a
/// conditional key such as `CODE_SIGN_IDENTITY[sdk=iphoneos*]` is part of
/// the key.
fn separator(line: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in line.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '=' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Base name of a possibly conditional key: `SWIFT_VERSION[config=Debug]`
/// gives `SWIFT_VERSION`.
pub fn base_key(key: &str) -> &str {
    key.split_once('[').map_or(key, |(base, _)| base).trim_end()
}

/// The text appended for `lines`: a newline, then the lines joined by `\n`.
pub fn render_block(lines: &[String]) -> String {
    let mut block = String::from("\n");
    block.push_str(&lines.join("\n"));
    block
}

/// Append [`render_block`]`(lines)` to the file at `path`.  The file must exist.
pub fn append_block(path: impl AsRef<Path>, lines: &[String]) -> Result<(), PatchError> {
    let path = path.as_ref();
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| PatchError::io(path, e))?;
    file.write_all(render_block(lines).as_bytes())
        .map_err(|e| PatchError::io(path, e))?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
