//! File locations inside a prepared Cordova iOS platform.

use std::path::{Path, PathBuf};

use crate::error::PatchError;
use crate::manifest;
use crate::profile::HeaderLocation;

/// Paths derived once per run from the project root and the product name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub name: String,
    pub root: PathBuf,
    /// `<root>/platforms/ios`
    pub platform_path: PathBuf,
    /// `<platform>/cordova/build.xcconfig`
    pub xcconfig_path: PathBuf,
    /// `<platform>/<Name>.xcodeproj/project.pbxproj`
    pub pbxproj_path: PathBuf,
    /// `<platform or root>/<Name>/Bridging-Header.h`
    pub bridging_header_path: PathBuf,
}

impl ProjectDescriptor {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>, header: HeaderLocation) -> Self {
        let root = root.into();
        let name = name.into();
        let platform_path = root.join("platforms").join("ios");

        let header_base = match header {
            HeaderLocation::Platform => platform_path.clone(),
            HeaderLocation::ProjectRoot => root.clone(),
        };

        Self {
            xcconfig_path: platform_path.join("cordova").join("build.xcconfig"),
            pbxproj_path: platform_path
                .join(format!("{name}.xcodeproj"))
                .join("project.pbxproj"),
            bridging_header_path: header_base.join(&name).join("Bridging-Header.h"),
            platform_path,
            root,
            name,
        }
    }

    /// Read the product name from `<root>/config.xml` and derive every path.
    pub fn from_root(root: impl AsRef<Path>, header: HeaderLocation) -> Result<Self, PatchError> {
        let root = root.as_ref();
        let name = manifest::read_project_name(root)?;
        Ok(Self::new(root, name, header))
    }
}
