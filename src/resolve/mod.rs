//! Version collection and dependency metadata resolution.

pub mod constraints;
mod dependencies;
mod manifest;

pub use constraints::{parse_declaration, Declaration};
pub use dependencies::{resolve_dependencies, MetadataSource};
pub use manifest::{collect_versions, names_match, RequirementsFile, VersionSource};
