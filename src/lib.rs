pub mod bridging_header;
pub mod config;
pub mod error;
pub mod manifest;
pub mod patcher;
pub mod pbxproj;
pub mod plist;
pub mod profile;
pub mod project;
pub mod xcconfig;

pub use error::PatchError;
pub use patcher::{PatchOutcome, PatchReport, patch};
pub use pbxproj::Pbxproj;
pub use profile::{Profile, ProfileBuilder, ProfileName};
pub use project::ProjectDescriptor;
pub use xcconfig::parse_xcconfig;
