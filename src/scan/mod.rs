//! Entry file scanning: imports, aliases and usages.

mod aliases;
mod imports;
mod lines;
mod stdlib;
mod usages;

pub use aliases::AliasTable;
pub use imports::scan_imports;
pub use lines::{strip_comment, CodeLines};
pub use stdlib::is_stdlib;
pub use usages::scan_usages;

use anyhow::Context;
use std::fs;
use std::path::Path;

use crate::context::Analysis;

/// Run both scanning passes over the entry file.
///
/// Failing to read the file is fatal for the run.
pub fn scan_file(path: &Path) -> anyhow::Result<Analysis> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read entry file {}", path.display()))?;
    Ok(scan_source(path, &content))
}

/// Run both scanning passes over already loaded source text.
pub fn scan_source(path: &Path, content: &str) -> Analysis {
    let mut analysis = Analysis::new(path);
    scan_imports(content, &mut analysis);
    scan_usages(content, &mut analysis);
    log::info!(
        "scanned {}: {} modules, {} import lines",
        path.display(),
        analysis.modules.len(),
        analysis.import_lines.len()
    );
    analysis
}
