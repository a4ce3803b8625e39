//! Build profiles: the table of build settings a patch run writes.
//!
//! Two profiles ship with the crate:
//!
//! - [`ProfileName::Current`]: Swift 5, signing team and identity, bridging
//!   header under `platforms/ios/<Name>/`.
//! - [`ProfileName::Legacy`]: Swift 3 with an explicit deployment target,
//!   runpath search paths and bitcode disabled, bridging header under
//!   `<root>/<Name>/`.
//!
//! Setting values may reference `$(CORDOVA_PROJECT_NAME)`, which is expanded
//! once the product name is known.  Any other `$(...)` reference (for example
//! `$(inherited)`) is left for Xcode to resolve.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;

use crate::config::PatchConfig;
use crate::error::PatchError;

/// Variable that expands to the product name read from `config.xml`.
pub const PROJECT_NAME_VAR: &str = "CORDOVA_PROJECT_NAME";

/// Header prefix of the iosrtc plugin, imported from the app's bridging header.
pub const DEFAULT_IMPORT_PREFIX: &str = "cordova-plugin-iosrtc";

const DEVELOPMENT_TEAM: &str = "6J92E6W79J";
const BRIDGING_HEADER: &str = "$(CORDOVA_PROJECT_NAME)/Bridging-Header.h";

const CURRENT_SETTINGS: &[(&str, &str, SettingScope)] = &[
    ("SWIFT_OBJC_BRIDGING_HEADER", BRIDGING_HEADER, SettingScope::Both),
    ("SWIFT_VERSION", "5.0", SettingScope::Both),
    ("DEVELOPMENT_TEAM", DEVELOPMENT_TEAM, SettingScope::Both),
    ("CODE_SIGN_IDENTITY", "Apple Development", SettingScope::Project),
];

const LEGACY_SETTINGS: &[(&str, &str, SettingScope)] = &[
    ("LD_RUNPATH_SEARCH_PATHS", "@executable_path/Frameworks", SettingScope::Both),
    ("SWIFT_OBJC_BRIDGING_HEADER", BRIDGING_HEADER, SettingScope::Both),
    ("IPHONEOS_DEPLOYMENT_TARGET", "9.0", SettingScope::Both),
    ("ENABLE_BITCODE", "NO", SettingScope::Both),
    ("SWIFT_VERSION", "3.0", SettingScope::Both),
    ("DEVELOPMENT_TEAM", DEVELOPMENT_TEAM, SettingScope::Both),
];

// ═══════════════════════════════════════════════════════════════════════════════
//  Enums
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileName {
    #[default]
    Current,
    Legacy,
}

impl FromStr for ProfileName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "current" => Ok(Self::Current),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!("unknown profile '{other}' (expected 'current' or 'legacy')")),
        }
    }
}

/// Which of the two build-setting files a setting is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettingScope {
    #[default]
    Both,
    /// `project.pbxproj` only.
    Project,
    /// `build.xcconfig` only.
    Xcconfig,
}

impl SettingScope {
    pub fn includes_project(self) -> bool {
        matches!(self, Self::Both | Self::Project)
    }

    pub fn includes_xcconfig(self) -> bool {
        matches!(self, Self::Both | Self::Xcconfig)
    }
}

/// Directory the `<Name>/Bridging-Header.h` path is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderLocation {
    /// `<root>/platforms/ios`
    #[default]
    Platform,
    /// `<root>`
    ProjectRoot,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  BuildSettingPatch
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSetting {
    pub name: String,
    pub value: String,
    pub scope: SettingScope,
}

impl BuildSetting {
    pub fn new(name: impl Into<String>, value: impl Into<String>, scope: SettingScope) -> Self {
        Self { name: name.into(), value: value.into(), scope }
    }

    fn validate(&self) -> Result<(), PatchError> {
        let invalid = |reason: &str| PatchError::InvalidSetting {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.name.chars().any(|c| c.is_whitespace() || c == '=' || c == ';') {
            return Err(invalid("name contains whitespace, '=' or ';'"));
        }
        if self.value.contains(['\n', '\r']) {
            return Err(invalid("value contains a line break"));
        }
        Ok(())
    }
}

/// Ordered `name -> value` table of settings to write.
///
/// Names are unique: inserting an existing name replaces the value (and
/// scope) in place, keeping the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSettingPatch {
    settings: Vec<BuildSetting>,
}

impl BuildSettingPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, setting: BuildSetting) -> Result<(), PatchError> {
        setting.validate()?;
        match self.settings.iter_mut().find(|s| s.name == setting.name) {
            Some(existing) => *existing = setting,
            None => self.settings.push(setting),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&BuildSetting> {
        self.settings.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildSetting> {
        self.settings.iter()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Settings written to `project.pbxproj`.
    pub fn project_settings(&self) -> impl Iterator<Item = &BuildSetting> {
        self.settings.iter().filter(|s| s.scope.includes_project())
    }

    /// `KEY = VALUE` lines for `build.xcconfig`, in table order.
    pub fn xcconfig_lines(&self) -> Vec<String> {
        self.settings
            .iter()
            .filter(|s| s.scope.includes_xcconfig())
            .map(|s| format!("{} = {}", s.name, s.value))
            .collect()
    }

    /// Copy of the table with `$(Var)` references in values expanded.
    pub fn expand(&self, vars: &HashMap<String, String>) -> Self {
        let settings = self
            .settings
            .iter()
            .map(|s| BuildSetting {
                value: expand_vars(&s.value, vars),
                ..s.clone()
            })
            .collect();
        Self { settings }
    }
}

/// Expand `$(Var)` references using the given map.  Unknown or unterminated
/// references are kept as written.
fn expand_vars(s: &str, vars: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' || chars.peek() != Some(&'(') {
            result.push(c);
            continue;
        }
        chars.next(); // consume '('

        let mut var_name = String::new();
        let mut closed = false;
        for ch in chars.by_ref() {
            if ch == ')' {
                closed = true;
                break;
            }
            var_name.push(ch);
        }

        match vars.get(&var_name) {
            Some(val) if closed => result.push_str(val),
            _ => {
                result.push_str("$(");
                result.push_str(&var_name);
                if closed {
                    result.push(')');
                }
            }
        }
    }

    result
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Profile
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub settings: BuildSettingPatch,
    /// `<prefix>` in `#import "<prefix>-Bridging-Header.h"`.
    pub import_prefix: String,
    pub header_location: HeaderLocation,
}

impl Profile {
    pub fn builtin(name: ProfileName) -> Self {
        let (table, header_location) = match name {
            ProfileName::Current => (CURRENT_SETTINGS, HeaderLocation::Platform),
            ProfileName::Legacy => (LEGACY_SETTINGS, HeaderLocation::ProjectRoot),
        };

        let settings = BuildSettingPatch {
            settings: table
                .iter()
                .map(|&(name, value, scope)| BuildSetting::new(name, value, scope))
                .collect(),
        };

        Self {
            settings,
            import_prefix: DEFAULT_IMPORT_PREFIX.to_string(),
            header_location,
        }
    }

    pub fn current() -> Self {
        Self::builtin(ProfileName::Current)
    }

    pub fn legacy() -> Self {
        Self::builtin(ProfileName::Legacy)
    }

    /// The settings table with `$(CORDOVA_PROJECT_NAME)` resolved.
    pub fn resolve(&self, project_name: &str) -> BuildSettingPatch {
        let vars = HashMap::from([(PROJECT_NAME_VAR.to_string(), project_name.to_string())]);
        self.settings.expand(&vars)
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::current()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  ProfileBuilder
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for a [`Profile`] derived from one of the built-in tables.
///
/// # Example
/// ```
/// use xcpatch_rs::profile::{ProfileBuilder, ProfileName, SettingScope};
///
/// let profile = ProfileBuilder::from_profile(ProfileName::Current)
///     .setting("SWIFT_VERSION", "5.9")
///     .scoped_setting("OTHER_SWIFT_FLAGS", "-DIOSRTC", SettingScope::Project)
///     .import_prefix("my-plugin")
///     .build()
///     .unwrap();
/// assert_eq!(profile.settings.get("SWIFT_VERSION").unwrap().value, "5.9");
/// ```
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    profile: Profile,
    pending: Vec<BuildSetting>,
}

impl ProfileBuilder {
    /// Start from the [`ProfileName::Current`] table.
    pub fn new() -> Self {
        Self::from_profile(ProfileName::Current)
    }

    pub fn from_profile(name: ProfileName) -> Self {
        Self { profile: Profile::builtin(name), pending: Vec::new() }
    }

    /// Add or override a setting written to both files.
    pub fn setting(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.scoped_setting(name, value, SettingScope::Both)
    }

    pub fn scoped_setting(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        scope: SettingScope,
    ) -> Self {
        self.pending.push(BuildSetting::new(name, value, scope));
        self
    }

    pub fn import_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.profile.import_prefix = prefix.into();
        self
    }

    pub fn header_location(mut self, location: HeaderLocation) -> Self {
        self.profile.header_location = location;
        self
    }

    /// Layer a loaded `xcpatch.toml` on top.  The file's `profile` key is
    /// not consulted here; pick the base with [`from_profile`](Self::from_profile).
    pub fn config(mut self, config: PatchConfig) -> Self {
        if let Some(prefix) = config.import_prefix {
            self.profile.import_prefix = prefix;
        }
        if let Some(location) = config.header_location {
            self.profile.header_location = location;
        }
        self.pending.extend(
            config
                .settings
                .into_iter()
                .map(|s| BuildSetting::new(s.name, s.value, s.scope)),
        );
        self
    }

    pub fn build(self) -> Result<Profile, PatchError> {
        let mut profile = self.profile;
        for setting in self.pending {
            profile.settings.insert(setting)?;
        }
        if profile.import_prefix.trim().is_empty() || profile.import_prefix.contains(['"', '\n']) {
            return Err(PatchError::Config(format!(
                "invalid import prefix '{}'",
                profile.import_prefix
            )));
        }
        Ok(profile)
    }
}

impl Default for ProfileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_profile_table() {
        let profile = Profile::current();
        let names: Vec<&str> = profile.settings.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["SWIFT_OBJC_BRIDGING_HEADER", "SWIFT_VERSION", "DEVELOPMENT_TEAM", "CODE_SIGN_IDENTITY"]
        );
        assert_eq!(profile.header_location, HeaderLocation::Platform);
        assert_eq!(profile.import_prefix, "cordova-plugin-iosrtc");
    }

    #[test]
    fn legacy_profile_table() {
        let profile = Profile::legacy();
        assert_eq!(profile.settings.len(), 6);
        assert_eq!(profile.settings.get("SWIFT_VERSION").unwrap().value, "3.0");
        assert_eq!(profile.settings.get("ENABLE_BITCODE").unwrap().value, "NO");
        assert_eq!(profile.header_location, HeaderLocation::ProjectRoot);
    }

    #[test]
    fn xcconfig_lines_skip_project_only_settings() {
        let patch = Profile::current().resolve("MyApp");
        assert_eq!(
            patch.xcconfig_lines(),
            [
                "SWIFT_OBJC_BRIDGING_HEADER = MyApp/Bridging-Header.h",
                "SWIFT_VERSION = 5.0",
                "DEVELOPMENT_TEAM = 6J92E6W79J",
            ]
        );
        assert!(patch.project_settings().any(|s| s.name == "CODE_SIGN_IDENTITY"));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut patch = Profile::legacy().settings;
        patch
            .insert(BuildSetting::new("IPHONEOS_DEPLOYMENT_TARGET", "11.0", SettingScope::Project))
            .unwrap();
        assert_eq!(patch.len(), 6);
        let third = patch.iter().nth(2).unwrap();
        assert_eq!(third.name, "IPHONEOS_DEPLOYMENT_TARGET");
        assert_eq!(third.value, "11.0");
        assert_eq!(third.scope, SettingScope::Project);
    }

    #[test]
    fn insert_rejects_bad_settings() {
        let mut patch = BuildSettingPatch::new();
        assert!(patch.insert(BuildSetting::new("", "x", SettingScope::Both)).is_err());
        assert!(patch.insert(BuildSetting::new("A B", "x", SettingScope::Both)).is_err());
        assert!(patch.insert(BuildSetting::new("A", "x\ny", SettingScope::Both)).is_err());
        assert!(patch.is_empty());
    }

    #[test]
    fn expand_vars_keeps_unknown_references() {
        let vars = HashMap::from([("CORDOVA_PROJECT_NAME".to_string(), "App".to_string())]);
        assert_eq!(expand_vars("$(CORDOVA_PROJECT_NAME)/x.h", &vars), "App/x.h");
        assert_eq!(expand_vars("$(inherited) -ObjC", &vars), "$(inherited) -ObjC");
        assert_eq!(expand_vars("$(open", &vars), "$(open");
        assert_eq!(expand_vars("a$b", &vars), "a$b");
    }

    #[test]
    fn builder_overrides_and_extends() {
        let profile = ProfileBuilder::from_profile(ProfileName::Legacy)
            .setting("SWIFT_VERSION", "4.2")
            .scoped_setting("OTHER_LDFLAGS", "-ObjC", SettingScope::Xcconfig)
            .header_location(HeaderLocation::Platform)
            .build()
            .unwrap();
        assert_eq!(profile.settings.get("SWIFT_VERSION").unwrap().value, "4.2");
        assert_eq!(profile.settings.len(), 7);
        assert_eq!(profile.header_location, HeaderLocation::Platform);
    }

    #[test]
    fn builder_rejects_bad_import_prefix() {
        assert!(ProfileBuilder::new().import_prefix("").build().is_err());
        assert!(ProfileBuilder::new().import_prefix("a\"b").build().is_err());
    }

    #[test]
    fn profile_name_from_str() {
        assert_eq!("Legacy".parse::<ProfileName>().unwrap(), ProfileName::Legacy);
        assert_eq!("current".parse::<ProfileName>().unwrap(), ProfileName::Current);
        assert!("modern".parse::<ProfileName>().is_err());
    }
}
