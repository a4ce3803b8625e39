//! Swift bridging header edits.

use std::path::Path;

use crate::error::PatchError;

/// `#import "<prefix>-Bridging-Header.h"`
pub fn import_directive(prefix: &str) -> String {
    format!("#import \"{prefix}-Bridging-Header.h\"")
}

/// Append a newline and the import directive for `prefix` to the header at
/// `path`.  A missing header is created containing just the appended text.
pub fn append_import(path: impl AsRef<Path>, prefix: &str) -> Result<(), PatchError> {
    let path = path.as_ref();
    let mut content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| PatchError::io(parent, e))?;
            }
            String::new()
        }
        Err(e) => return Err(PatchError::io(path, e)),
    };

    content.push('\n');
    content.push_str(&import_directive(prefix));
    std::fs::write(path, content).map_err(|e| PatchError::io(path, e))?;
    Ok(())
}
