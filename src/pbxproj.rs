use std::cmp::Reverse;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use tracing::debug;

use crate::error::PatchError;
use crate::plist::{self, Entry, Node, quote};
use crate::profile::BuildSettingPatch;

/// Suffix of the annotation entries that sit next to real section entries.
pub const COMMENT_SUFFIX: &str = "_comment";

const XC_BUILD_CONFIGURATION: &str = "XCBuildConfiguration";

/// `true` for section keys that carry an object's `/* ... */` annotation
/// rather than an object.
pub fn is_comment_key(key: &str) -> bool {
    key.ends_with(COMMENT_SUFFIX)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  BuildConfigurationSection
// ═══════════════════════════════════════════════════════════════════════════════

/// A build setting value as stored in `buildSettings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    String(String),
    List(Vec<String>),
}

impl SettingValue {
    fn from_node(node: &Node) -> Option<Self> {
        if let Some(s) = node.as_str() {
            return Some(Self::String(s.to_string()));
        }
        let items = node
            .as_array()?
            .iter()
            .filter_map(|el| el.node.as_str().map(String::from))
            .collect();
        Some(Self::List(items))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::List(_) => None,
        }
    }
}

/// One `XCBuildConfiguration` object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfiguration {
    /// `Debug`, `Release`, ...
    pub name: Option<String>,
    pub build_settings: HashMap<String, SettingValue>,
}

impl BuildConfiguration {
    fn from_node(node: &Node) -> Self {
        let build_settings = node
            .get("buildSettings")
            .and_then(Node::as_dict)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| SettingValue::from_node(&e.value).map(|v| (e.key.clone(), v)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: node.get("name").and_then(Node::as_str).map(String::from),
            build_settings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionEntry {
    Configuration(BuildConfiguration),
    /// Text of the `/* ... */` annotation after an object identifier.
    Comment(String),
}

/// The `XCBuildConfiguration` section, keyed by object identifier.
///
/// Each object annotated in the file (`1D6058940D05DD3E006BFB54 /* Debug */`)
/// is followed by a `<id>_comment` entry holding the annotation text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfigurationSection {
    entries: Vec<(String, SectionEntry)>,
}

impl BuildConfigurationSection {
    fn from_objects(objects: &[Entry]) -> Self {
        let mut section = Self::default();
        for object in objects.iter().filter(|e| is_build_configuration(&e.value)) {
            section.insert(
                object.key.clone(),
                SectionEntry::Configuration(BuildConfiguration::from_node(&object.value)),
            );
            if let Some(comment) = &object.key_comment {
                section.insert(
                    format!("{}{COMMENT_SUFFIX}", object.key),
                    SectionEntry::Comment(comment.clone()),
                );
            }
        }
        section
    }

    /// Repeated identifiers keep their first position; the last value wins.
    fn insert(&mut self, key: String, entry: SectionEntry) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((key, entry)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&SectionEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut SectionEntry> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    /// Every entry, annotations included, in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SectionEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// Real configurations only: entries whose key is not a comment key.
    pub fn non_comments(&self) -> impl Iterator<Item = (&str, &BuildConfiguration)> {
        self.iter()
            .filter(|(key, _)| !is_comment_key(key))
            .filter_map(|(key, entry)| match entry {
                SectionEntry::Configuration(config) => Some((key, config)),
                SectionEntry::Comment(_) => None,
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Pbxproj – top-level handle
// ═══════════════════════════════════════════════════════════════════════════════

/// Handle for reading and mutating a `project.pbxproj` file while preserving
/// its original formatting.
///
/// Reading parses the property list into owned types.  Mutations splice the
/// raw source string at the byte spans reported by the parser, so comments,
/// whitespace and every unrelated object are written back untouched.
#[derive(Debug, Clone)]
pub struct Pbxproj {
    source: String,
    section: BuildConfigurationSection,
}

impl Pbxproj {
    /// Parse a `project.pbxproj` from its source string.
    pub fn parse(source: impl Into<String>) -> Result<Self, PatchError> {
        let source = source.into();
        let section = {
            let root = plist::parse_plist(&source).map_err(PatchError::Parse)?;
            BuildConfigurationSection::from_objects(objects(&root)?)
        };
        Ok(Self { source, section })
    }

    /// Load a `project.pbxproj` from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PatchError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| PatchError::io(path, e))?;
        Self::parse(source).map_err(|e| match e {
            PatchError::Parse(msg) => PatchError::Parse(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// The current raw source (reflects any mutations).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Write the (potentially mutated) source back to disk, replacing the file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PatchError> {
        let path = path.as_ref();
        std::fs::write(path, &self.source).map_err(|e| PatchError::io(path, e))
    }

    pub fn build_configuration_section(&self) -> &BuildConfigurationSection {
        &self.section
    }

    /// Identifiers of all real build configurations, in file order.
    pub fn configurations(&self) -> Vec<&str> {
        self.section.non_comments().map(|(id, _)| id).collect()
    }

    pub fn build_setting(&self, id: &str, key: &str) -> Option<&SettingValue> {
        match self.section.get(id)? {
            SectionEntry::Configuration(config) => config.build_settings.get(key),
            SectionEntry::Comment(_) => None,
        }
    }

    /// Set `key` in the `buildSettings` of configuration `id`, replacing any
    /// previous value or appending the key when absent.
    pub fn set_build_setting(&mut self, id: &str, key: &str, value: &str) -> Result<(), PatchError> {
        let root = plist::parse_plist(&self.source).map_err(PatchError::Parse)?;
        let config = find_configuration(objects(&root)?, id)?;
        let edit = setting_edit(&self.source, config, id, key, value)?;
        apply_edits(&mut self.source, vec![edit]);

        // Targeted in-memory update, no reparse.
        if let Some(SectionEntry::Configuration(config)) = self.section.get_mut(id) {
            config
                .build_settings
                .insert(key.to_string(), SettingValue::String(value.to_string()));
        }

        Ok(())
    }

    /// Write every project-scoped setting of `patch` into every real build
    /// configuration.  Returns the number of configurations touched.
    pub fn apply_patch(&mut self, patch: &BuildSettingPatch) -> Result<usize, PatchError> {
        let root = plist::parse_plist(&self.source).map_err(PatchError::Parse)?;
        let objects = objects(&root)?;

        let mut edits = Vec::new();
        let ids = self.configurations();
        for &id in &ids {
            let config = find_configuration(objects, id)?;
            for setting in patch.project_settings() {
                edits.push(setting_edit(&self.source, config, id, &setting.name, &setting.value)?);
            }
            debug!(configuration = id, "queued {} build settings", patch.project_settings().count());
        }
        let patched = ids.len();

        let mut source = self.source.clone();
        apply_edits(&mut source, edits);
        *self = Self::parse(source)?;
        Ok(patched)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Splicing
// ═══════════════════════════════════════════════════════════════════════════════

struct Edit {
    range: Range<usize>,
    text: String,
}

fn objects(root: &Node) -> Result<&[Entry], PatchError> {
    root.get("objects")
        .and_then(Node::as_dict)
        .ok_or_else(|| PatchError::Parse("no 'objects' dictionary at the top level".to_string()))
}

fn is_build_configuration(node: &Node) -> bool {
    node.get("isa").and_then(Node::as_str) == Some(XC_BUILD_CONFIGURATION)
}

fn find_configuration<'n>(objects: &'n [Entry], id: &str) -> Result<&'n Node, PatchError> {
    if is_comment_key(id) {
        return Err(PatchError::Parse(format!("'{id}' is an annotation, not a configuration")));
    }
    objects
        .iter()
        .rev()
        .find(|e| e.key == id && is_build_configuration(&e.value))
        .map(|e| &e.value)
        .ok_or_else(|| PatchError::Parse(format!("build configuration {id} not found")))
}

/// Indentation of the line containing `pos`, or `None` when something other
/// than spaces and tabs precedes `pos` on that line.
fn line_indent(source: &str, pos: usize) -> Option<&str> {
    let line_start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &source[line_start..pos];
    prefix.chars().all(|c| c == ' ' || c == '\t').then_some(prefix)
}

/// Line terminator of the line containing `pos`: `\r\n` or `\n`.
fn line_ending(source: &str, pos: usize) -> &'static str {
    let line_end = source[pos..].find('\n').map_or(source.len(), |i| pos + i);
    if source[..line_end].ends_with('\r') { "\r\n" } else { "\n" }
}

fn setting_edit(source: &str, config: &Node, id: &str, key: &str, value: &str) -> Result<Edit, PatchError> {
    let (settings, entries) = config
        .get("buildSettings")
        .and_then(|node| node.as_dict().map(|entries| (node, entries)))
        .ok_or_else(|| {
            PatchError::Parse(format!("build configuration {id} has no buildSettings dictionary"))
        })?;

    let token = quote(value).into_owned();

    if let Some(existing) = entries.iter().rev().find(|e| e.key == key) {
        return Ok(Edit { range: existing.value.span.clone(), text: token });
    }

    let statement = format!("{} = {token};", quote(key));
    let edit = match entries.last() {
        Some(last) => {
            let text = match line_indent(source, last.span.start) {
                Some(indent) => format!("{}{indent}{statement}", line_ending(source, last.span.start)),
                None => format!(" {statement}"),
            };
            Edit { range: last.span.end..last.span.end, text }
        }
        None => {
            let open = settings.span.start + 1;
            let close = settings.span.end - 1;
            let text = match line_indent(source, close) {
                Some(indent) => format!("{}{indent}\t{statement}", line_ending(source, open)),
                None => format!(" {statement}"),
            };
            Edit { range: open..open, text }
        }
    };
    Ok(edit)
}

/// Apply edits back to front so earlier ranges stay valid.  Inserts at the
/// same position end up in the order they were queued.
fn apply_edits(source: &mut String, edits: Vec<Edit>) {
    let mut edits: Vec<(usize, Edit)> = edits.into_iter().enumerate().collect();
    edits.sort_by_key(|(seq, edit)| Reverse((edit.range.start, *seq)));
    for (_, edit) in edits {
        source.replace_range(edit.range, &edit.text);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{BuildSetting, Profile, SettingScope};

    const TARGET_DEBUG: &str = "1D6058940D05DD3E006BFB54";
    const PROJECT_RELEASE: &str = "C01FCF5008A954540054247B";

    fn example() -> Pbxproj {
        Pbxproj::from_file("example.pbxproj").unwrap()
    }

    fn string(s: &str) -> SettingValue {
        SettingValue::String(s.to_string())
    }

    fn single_config(build_settings: &str) -> String {
        format!(
            "{{ objects = {{ AAA /* Debug */ = {{ isa = XCBuildConfiguration; buildSettings = {build_settings}; name = Debug; }}; }}; }}"
        )
    }

    #[test]
    fn comment_key_predicate() {
        assert!(is_comment_key("1D6058940D05DD3E006BFB54_comment"));
        assert!(!is_comment_key("1D6058940D05DD3E006BFB54"));
        assert!(!is_comment_key("_commentary"));
    }

    #[test]
    fn example_lists_configurations() {
        let pbx = example();
        assert_eq!(
            pbx.configurations(),
            [
                "1D6058940D05DD3E006BFB54",
                "1D6058950D05DD3E006BFB54",
                "C01FCF4F08A954540054247B",
                "C01FCF5008A954540054247B",
            ]
        );
    }

    #[test]
    fn section_carries_annotation_entries() {
        let pbx = example();
        let section = pbx.build_configuration_section();
        assert_eq!(section.len(), 8);
        assert_eq!(
            section.get("1D6058940D05DD3E006BFB54_comment"),
            Some(&SectionEntry::Comment("Debug".to_string()))
        );
        assert_eq!(section.non_comments().count(), 4);
    }

    #[test]
    fn configuration_contents() {
        let pbx = example();
        let Some(SectionEntry::Configuration(config)) = pbx.build_configuration_section().get(TARGET_DEBUG)
        else {
            panic!("expected a configuration");
        };
        assert_eq!(config.name.as_deref(), Some("Debug"));
        assert_eq!(config.build_settings["SWIFT_VERSION"], string("3.0"));
        assert_eq!(
            config.build_settings["OTHER_LDFLAGS"],
            SettingValue::List(vec!["-weak_framework".into(), "CoreFoundation".into(), "-ObjC".into()])
        );
    }

    #[test]
    fn set_build_setting_replaces_existing_value() {
        let mut pbx = example();
        pbx.set_build_setting(TARGET_DEBUG, "SWIFT_VERSION", "5.0").unwrap();

        assert_eq!(pbx.build_setting(TARGET_DEBUG, "SWIFT_VERSION"), Some(&string("5.0")));
        assert!(pbx.source().contains("\t\t\t\tSWIFT_VERSION = 5.0;\n"));
        assert!(!pbx.source().contains("SWIFT_VERSION = 3.0;"));

        // The source still parses and agrees with the in-memory view.
        let reparsed = Pbxproj::parse(pbx.source().to_string()).unwrap();
        assert_eq!(reparsed.build_setting(TARGET_DEBUG, "SWIFT_VERSION"), Some(&string("5.0")));
    }

    #[test]
    fn set_build_setting_inserts_with_indentation() {
        let mut pbx = example();
        pbx.set_build_setting(PROJECT_RELEASE, "CODE_SIGN_IDENTITY", "Apple Development")
            .unwrap();

        assert!(pbx.source().contains(
            "\t\t\t\tUSER_HEADER_SEARCH_PATHS = \"\";\n\t\t\t\tCODE_SIGN_IDENTITY = \"Apple Development\";\n\t\t\t};\n\t\t\tname = Release;"
        ));
    }

    #[test]
    fn set_build_setting_rejects_unknown_and_comment_ids() {
        let mut pbx = example();
        assert!(pbx.set_build_setting("DEADBEEF", "A", "1").is_err());
        assert!(pbx.set_build_setting("1D6058940D05DD3E006BFB54_comment", "A", "1").is_err());
        // Not an XCBuildConfiguration.
        assert!(pbx.set_build_setting("29B97313FDCFA39411CA2CEA", "A", "1").is_err());
    }

    #[test]
    fn insert_into_single_line_dict() {
        let mut pbx = Pbxproj::parse(single_config("{ X = 1; }")).unwrap();
        pbx.set_build_setting("AAA", "Y", "2").unwrap();
        assert!(pbx.source().contains("buildSettings = { X = 1; Y = 2; };"));
    }

    #[test]
    fn insert_into_empty_dict() {
        let source = "{\n\tobjects = {\n\t\tAAA = {\n\t\t\tisa = XCBuildConfiguration;\n\t\t\tbuildSettings = {\n\t\t\t};\n\t\t};\n\t};\n}\n";
        let mut pbx = Pbxproj::parse(source).unwrap();
        pbx.set_build_setting("AAA", "SWIFT_VERSION", "5.0").unwrap();
        assert!(pbx
            .source()
            .contains("buildSettings = {\n\t\t\t\tSWIFT_VERSION = 5.0;\n\t\t\t};"));
    }

    #[test]
    fn insert_keeps_crlf_line_endings() {
        let source = "{\r\n\tobjects = {\r\n\t\tAAA = {\r\n\t\t\tisa = XCBuildConfiguration;\r\n\t\t\tbuildSettings = {\r\n\t\t\t\tX = 1;\r\n\t\t\t};\r\n\t\t};\r\n\t};\r\n}\r\n";
        let mut pbx = Pbxproj::parse(source).unwrap();
        pbx.set_build_setting("AAA", "SWIFT_VERSION", "5.0").unwrap();

        assert!(pbx.source().contains("\t\t\t\tX = 1;\r\n\t\t\t\tSWIFT_VERSION = 5.0;\r\n\t\t\t};"));
        assert_eq!(pbx.source().matches('\n').count(), pbx.source().matches("\r\n").count());
    }

    #[test]
    fn insert_into_empty_crlf_dict() {
        let source = "{\r\n\tobjects = {\r\n\t\tAAA = {\r\n\t\t\tisa = XCBuildConfiguration;\r\n\t\t\tbuildSettings = {\r\n\t\t\t};\r\n\t\t};\r\n\t};\r\n}\r\n";
        let mut pbx = Pbxproj::parse(source).unwrap();
        pbx.set_build_setting("AAA", "SWIFT_VERSION", "5.0").unwrap();

        assert!(pbx.source().contains("buildSettings = {\r\n\t\t\t\tSWIFT_VERSION = 5.0;\r\n\t\t\t};"));
    }

    #[test]
    fn missing_build_settings_is_an_error() {
        let source = "{ objects = { AAA = { isa = XCBuildConfiguration; name = Debug; }; }; }";
        let mut pbx = Pbxproj::parse(source).unwrap();
        assert!(matches!(pbx.set_build_setting("AAA", "A", "1"), Err(PatchError::Parse(_))));
    }

    #[test]
    fn missing_objects_is_an_error() {
        assert!(matches!(Pbxproj::parse("{ archiveVersion = 1; }"), Err(PatchError::Parse(_))));
        assert!(matches!(Pbxproj::parse("{ objects = ("), Err(PatchError::Parse(_))));
    }

    #[test]
    fn apply_patch_touches_every_configuration() {
        let mut pbx = example();
        let patch = Profile::current().resolve("HelloCordova");

        assert_eq!(pbx.apply_patch(&patch).unwrap(), 4);

        let ids: Vec<String> = pbx.configurations().iter().map(|s| s.to_string()).collect();
        for id in &ids {
            for setting in patch.project_settings() {
                assert_eq!(
                    pbx.build_setting(id, &setting.name),
                    Some(&string(&setting.value)),
                    "{id}: {}",
                    setting.name
                );
            }
        }
        assert!(pbx
            .source()
            .contains("SWIFT_OBJC_BRIDGING_HEADER = \"HelloCordova/Bridging-Header.h\";"));
    }

    #[test]
    fn apply_patch_keeps_table_order_for_inserted_keys() {
        let mut pbx = Pbxproj::parse(single_config("{ X = 1; }")).unwrap();
        let mut patch = BuildSettingPatch::new();
        patch.insert(BuildSetting::new("B", "2", SettingScope::Both)).unwrap();
        patch.insert(BuildSetting::new("A", "1", SettingScope::Project)).unwrap();
        patch.insert(BuildSetting::new("C", "3", SettingScope::Xcconfig)).unwrap();

        pbx.apply_patch(&patch).unwrap();

        assert!(pbx.source().contains("{ X = 1; B = 2; A = 1; }"));
    }

    #[test]
    fn apply_patch_preserves_unrelated_bytes() {
        let original = std::fs::read_to_string("example.pbxproj").unwrap();
        let mut pbx = Pbxproj::parse(original.clone()).unwrap();
        pbx.apply_patch(&Profile::legacy().resolve("HelloCordova")).unwrap();

        let begin = "/* Begin XCBuildConfiguration section */";
        let end = "/* End XCBuildConfiguration section */";
        let head = &original[..original.find(begin).unwrap()];
        let tail = &original[original.find(end).unwrap()..];
        assert!(pbx.source().starts_with(head));
        assert!(pbx.source().ends_with(tail));
    }

    #[test]
    fn apply_patch_twice_is_stable() {
        let patch = Profile::legacy().resolve("HelloCordova");
        let mut pbx = example();
        pbx.apply_patch(&patch).unwrap();
        let once = pbx.source().to_string();
        pbx.apply_patch(&patch).unwrap();
        assert_eq!(pbx.source(), once);
    }

    #[test]
    fn save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.pbxproj");
        let mut pbx = example();
        pbx.set_build_setting(TARGET_DEBUG, "ENABLE_BITCODE", "NO").unwrap();
        pbx.save(&path).unwrap();

        let loaded = Pbxproj::from_file(&path).unwrap();
        assert_eq!(loaded.source(), pbx.source());
        assert_eq!(loaded.build_setting(TARGET_DEBUG, "ENABLE_BITCODE"), Some(&string("NO")));
    }
}
