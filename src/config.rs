//! Configuration file loading for xcpatch.
//!
//! Discovers and loads `xcpatch.toml` from the Cordova project root.  The
//! file picks a base profile and layers extra or overriding settings on top:
//!
//! ```toml
//! profile = "current"
//! import_prefix = "cordova-plugin-iosrtc"
//! header_location = "platform"
//!
//! [[setting]]
//! name = "SWIFT_VERSION"
//! value = "5.9"
//! scope = "both"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::PatchError;
use crate::profile::{HeaderLocation, ProfileName, SettingScope};

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "xcpatch.toml";

/// Top-level configuration from `xcpatch.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatchConfig {
    /// Base profile; the command line takes precedence.
    pub profile: Option<ProfileName>,

    pub import_prefix: Option<String>,

    pub header_location: Option<HeaderLocation>,

    /// `[[setting]]` tables, applied in order.
    #[serde(rename = "setting")]
    pub settings: Vec<SettingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingConfig {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub scope: SettingScope,
}

/// Look for `xcpatch.toml` directly under `project_root`.
pub fn discover_config(project_root: &Path) -> Option<PathBuf> {
    let config_path = project_root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path.display());
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path.display());
        None
    }
}

pub fn load_config(path: &Path) -> Result<PatchConfig, PatchError> {
    let contents = std::fs::read_to_string(path).map_err(|e| PatchError::io(path, e))?;
    toml::from_str(&contents)
        .map_err(|e| PatchError::Config(format!("{}: {e}", path.display())))
}

pub fn parse_config(contents: &str) -> Result<PatchConfig, PatchError> {
    Ok(toml::from_str(contents)?)
}

/// Load the config from the project root, or the default if there is none.
pub fn load_or_default(project_root: &Path) -> Result<PatchConfig, PatchError> {
    match discover_config(project_root) {
        Some(path) => load_config(&path),
        None => Ok(PatchConfig::default()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
