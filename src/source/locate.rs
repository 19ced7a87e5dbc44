//! Function path location inside an extracted source tree.

use globset::GlobSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::LocateConfig;
use crate::model::Usage;

/// What counts as a source file and a definition line.
#[derive(Debug, Clone)]
pub struct LocateOptions {
    /// File extension without the dot.
    pub suffix: String,
    /// Text preceding a definition name.
    pub marker: String,
    /// Paths (relative to the source root) to skip.
    pub excluded: Option<GlobSet>,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            suffix: "py".to_string(),
            marker: "def ".to_string(),
            excluded: None,
        }
    }
}

impl LocateOptions {
    pub fn from_config(config: &LocateConfig) -> anyhow::Result<Self> {
        Ok(Self {
            suffix: config.source_suffix.clone(),
            marker: config.definition_marker.clone(),
            excluded: config.glob_set()?,
        })
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let Some(set) = &self.excluded else {
            return false;
        };
        let relative = path.strip_prefix(root).unwrap_or(path);
        set.is_match(relative)
    }
}

/// Append to each usage's `paths` every file under `root` with a line
/// containing `marker + definition`.
///
/// The test is a literal substring match, so `def get` also matches
/// `def get_all`, and a file with several matching lines is appended once
/// per line. Unreadable entries are logged and skipped. Returns the number
/// of files scanned.
pub fn locate_definitions(root: &Path, usages: &mut [Usage], options: &LocateOptions) -> usize {
    let needles: Vec<String> = usages
        .iter()
        .map(|u| format!("{}{}", options.marker, u.definition))
        .collect();

    let mut scanned = 0;

    for entry in WalkDir::new(root).follow_links(false).into_iter().filter_entry(|e| {
        // Skip hidden directories
        !(e.depth() > 0 && e.file_type().is_dir() && e.file_name().to_string_lossy().starts_with('.'))
    }) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext != options.suffix || options.is_excluded(root, path) {
            continue;
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("skipping unreadable file {}: {}", path.display(), e);
                continue;
            }
        };
        scanned += 1;

        for line in content.lines() {
            for (usage, needle) in usages.iter_mut().zip(&needles) {
                if line.contains(needle.as_str()) {
                    usage.paths.push(path.to_path_buf());
                }
            }
        }
    }

    log::debug!("scanned {} source files under {}", scanned, root.display());
    scanned
}

#[cfg(test)]
mod tests {
    use super::*;
    use globset::{Glob, GlobSetBuilder};
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let pkg = temp.path().join("pkg");
        fs::create_dir_all(pkg.join("tests")).unwrap();
        fs::write(
            pkg.join("api.py"),
            "def get(url):\n    pass\n\ndef get_all(urls):\n    pass\n",
        )
        .unwrap();
        fs::write(pkg.join("sessions.py"), "class Session:\n    def request(self):\n        pass\n").unwrap();
        fs::write(pkg.join("tests").join("test_api.py"), "def get_fixture():\n    pass\n").unwrap();
        fs::write(pkg.join("README.txt"), "def get(url)\n").unwrap();
        temp
    }

    #[test]
    fn test_substring_match_appends_per_line() {
        let temp = tree();
        let mut usages = vec![Usage::new("get", "get"), Usage::new("request", "request")];
        let scanned = locate_definitions(temp.path(), &mut usages, &LocateOptions::default());

        assert_eq!(scanned, 3);
        let api = temp.path().join("pkg").join("api.py");
        let api_hits = usages[0].paths.iter().filter(|p| **p == api).count();
        assert_eq!(api_hits, 2);
        // tests/test_api.py has `def get_fixture`
        assert_eq!(usages[0].paths.len(), 3);
        assert_eq!(usages[1].paths, vec![temp.path().join("pkg").join("sessions.py")]);
    }

    #[test]
    fn test_excluded_paths_are_skipped() {
        let temp = tree();
        let mut builder = GlobSetBuilder::new();
        builder.add(Glob::new("**/tests/**").unwrap());
        let options = LocateOptions {
            excluded: Some(builder.build().unwrap()),
            ..Default::default()
        };

        let mut usages = vec![Usage::new("get", "get")];
        locate_definitions(temp.path(), &mut usages, &options);
        assert_eq!(usages[0].paths.len(), 2);
    }

    #[test]
    fn test_aliased_usage_searches_original_name() {
        let temp = tree();
        let mut usages = vec![Usage::new("fetch", "get_all")];
        locate_definitions(temp.path(), &mut usages, &LocateOptions::default());
        assert_eq!(usages[0].paths, vec![temp.path().join("pkg").join("api.py")]);
    }

    #[test]
    fn test_missing_root_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let mut usages = vec![Usage::new("get", "get")];
        let scanned = locate_definitions(&temp.path().join("missing"), &mut usages, &LocateOptions::default());
        assert_eq!(scanned, 0);
        assert!(usages[0].paths.is_empty());
    }
}
