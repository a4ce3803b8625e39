//! The build-setting patcher: one pass over a prepared Cordova iOS platform.
//!
//! A run either patches all three files or, when the Xcode project or the
//! xcconfig is missing, logs one error and leaves every file alone.  Nothing
//! is rolled back: if the project file fails to parse after the xcconfig was
//! appended, the two files stay out of step.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::bridging_header;
use crate::error::PatchError;
use crate::pbxproj::Pbxproj;
use crate::profile::Profile;
use crate::project::ProjectDescriptor;
use crate::xcconfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub project: ProjectDescriptor,
    /// Number of `XCBuildConfiguration` objects rewritten.
    pub configurations: usize,
    /// Lines appended to `build.xcconfig`.
    pub xcconfig_lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Patched(PatchReport),
    /// A required file was missing; nothing was written.
    Aborted { missing: PathBuf },
}

impl PatchOutcome {
    pub fn is_patched(&self) -> bool {
        matches!(self, Self::Patched(_))
    }
}

/// Patch the Cordova project at `project_root` with `profile`.
///
/// A missing `project.pbxproj` or `build.xcconfig` is reported as
/// [`PatchOutcome::Aborted`], never as an error.
pub fn patch(project_root: impl AsRef<Path>, profile: &Profile) -> Result<PatchOutcome, PatchError> {
    let project = ProjectDescriptor::from_root(project_root, profile.header_location)?;

    for path in [&project.pbxproj_path, &project.xcconfig_path] {
        if !path.exists() {
            error!("an error occurred searching the project file at: \"{}\"", path.display());
            return Ok(PatchOutcome::Aborted { missing: path.clone() });
        }
        info!(path = %path.display(), "project file found");
    }

    let settings = profile.resolve(&project.name);

    info!(project = %project.name, "adjusting the generated project files:");
    for setting in settings.iter() {
        info!("- {} set to: {}", setting.name, setting.value);
    }

    // build.xcconfig
    let lines = settings.xcconfig_lines();
    let existing = std::fs::read_to_string(&project.xcconfig_path)
        .map_err(|e| PatchError::io(&project.xcconfig_path, e))?;
    let defined = xcconfig::parse_xcconfig(&existing);
    for setting in settings.iter().filter(|s| s.scope.includes_xcconfig()) {
        let mut previous: Vec<_> = defined
            .iter()
            .filter(|(key, _)| xcconfig::base_key(key) == setting.name)
            .collect();
        previous.sort();
        for (key, value) in previous {
            warn!(
                "{} already sets {} = {}; appending {} again",
                project.xcconfig_path.display(),
                key,
                value,
                setting.name
            );
        }
    }
    xcconfig::append_block(&project.xcconfig_path, &lines)?;
    info!(path = %project.xcconfig_path.display(), "file correctly fixed");

    // project.pbxproj
    let mut pbxproj = Pbxproj::from_file(&project.pbxproj_path)?;
    let configurations = pbxproj.apply_patch(&settings)?;
    pbxproj.save(&project.pbxproj_path)?;
    info!(path = %project.pbxproj_path.display(), configurations, "file correctly fixed");

    // Bridging header
    info!("patching bridging header {}", project.bridging_header_path.display());
    bridging_header::append_import(&project.bridging_header_path, &profile.import_prefix)?;

    Ok(PatchOutcome::Patched(PatchReport {
        project,
        configurations,
        xcconfig_lines: lines,
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
