//! Core data model shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One side of a version range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionBound {
    pub version: String,
    pub inclusive: bool,
}

impl VersionBound {
    pub fn inclusive(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            inclusive: true,
        }
    }

    pub fn exclusive(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            inclusive: false,
        }
    }
}

/// Version descriptor of a module.
///
/// An exact pin and a range are mutually exclusive: assigning one replaces
/// the other.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum VersionSpec {
    #[default]
    Unspecified,
    Exact(String),
    Range {
        /// Set by `>`, `>=` and `~=`.
        lower: Option<VersionBound>,
        /// Set by `<` and `<=`, and derived from `~=`.
        upper: Option<VersionBound>,
    },
}

impl VersionSpec {
    pub fn exact(&self) -> Option<&str> {
        match self {
            VersionSpec::Exact(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, VersionSpec::Unspecified)
    }
}

impl std::fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionSpec::Unspecified => Ok(()),
            VersionSpec::Exact(v) => write!(f, "=={}", v),
            VersionSpec::Range { lower, upper } => {
                let mut parts = Vec::new();
                if let Some(b) = lower {
                    let op = if b.inclusive { ">=" } else { ">" };
                    parts.push(format!("{}{}", op, b.version));
                }
                if let Some(b) = upper {
                    let op = if b.inclusive { "<=" } else { "<" };
                    parts.push(format!("{}{}", op, b.version));
                }
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// A symbol brought into the file by a `from X import ...` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImportedItem {
    /// `local` is the spelling used inside the file, `original` the name
    /// exported by the source module.
    Named { local: String, original: String },
    /// `from X import *`: every export of X, none of them resolved.
    Wildcard,
}

/// A textual usage of an imported symbol.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Symbol name as matched in the text.
    pub symbol: String,
    /// Name to look for among the module's definitions.
    pub definition: String,
    /// 1-based line numbers of every occurrence.
    pub lines: Vec<usize>,
    /// Files of the module's source defining `definition`.
    pub paths: Vec<PathBuf>,
}

impl Usage {
    pub fn new(symbol: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            definition: definition.into(),
            ..Default::default()
        }
    }
}

/// A vulnerability reported by the package index for a pinned release.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub fixed_in: Vec<String>,
    #[serde(default)]
    pub link: Option<String>,
}

/// One imported module, or one declared dependency of such a module.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Canonical module name, independent of any in-file alias.
    pub name: String,
    /// Distribution name on the package index, when the manifest matched
    /// this record under a different spelling (`yaml` -> `PyYAML`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    pub alias: Option<String>,
    /// Bound into the file namespace by a direct `import` statement.
    pub direct: bool,
    pub version: VersionSpec,
    pub imported_items: Vec<ImportedItem>,
    pub usages: Vec<Usage>,
    pub dependencies: Vec<ModuleRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub stdlib: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<PathBuf>,
}

impl ModuleRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The name this module is reachable under in the file namespace.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// The name to query the package index with.
    pub fn index_name(&self) -> &str {
        self.distribution.as_deref().unwrap_or(&self.name)
    }

    /// The top-level package of a dotted module path (`os.path` -> `os`).
    pub fn top_level(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }

    /// Insert an imported item, replacing an existing item with the same
    /// local name in place so re-scanning never duplicates entries.
    pub fn insert_item(&mut self, item: ImportedItem) {
        let existing = self.imported_items.iter().position(|i| match (i, &item) {
            (ImportedItem::Wildcard, ImportedItem::Wildcard) => true,
            (ImportedItem::Named { local: a, .. }, ImportedItem::Named { local: b, .. }) => a == b,
            _ => false,
        });
        match existing {
            Some(idx) => self.imported_items[idx] = item,
            None => self.imported_items.push(item),
        }
    }

    pub fn has_wildcard(&self) -> bool {
        self.imported_items
            .iter()
            .any(|i| matches!(i, ImportedItem::Wildcard))
    }

    /// Record an occurrence of `symbol` at `line`.
    pub fn record_usage(&mut self, symbol: &str, definition: &str, line: usize) {
        match self.usages.iter_mut().find(|u| u.symbol == symbol) {
            Some(usage) => {
                if usage.lines.last() != Some(&line) {
                    usage.lines.push(line);
                }
            }
            None => {
                let mut usage = Usage::new(symbol, definition);
                usage.lines.push(line);
                self.usages.push(usage);
            }
        }
    }
}

/// A declared dependency corroborated by the analyzer's findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// The top-level module whose usage exercised the dependency.
    pub module: String,
    pub dependency: String,
    /// The used symbol whose definition imports the dependency.
    pub symbol: String,
    pub imported_library: String,
    pub used_members: Vec<String>,
}

/// Pipeline stage that produced a [`StageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Metadata,
    Source,
    Locate,
    Analyzer,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Metadata => "metadata",
            Stage::Source => "source",
            Stage::Locate => "locate",
            Stage::Analyzer => "analyzer",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An isolated failure recorded instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub module: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_prefers_alias() {
        let mut record = ModuleRecord::new("numpy");
        assert_eq!(record.binding(), "numpy");
        record.alias = Some("np".to_string());
        assert_eq!(record.binding(), "np");
    }

    #[test]
    fn test_insert_item_replaces_same_local_name() {
        let mut record = ModuleRecord::new("pkg");
        record.insert_item(ImportedItem::Named {
            local: "c".to_string(),
            original: "b".to_string(),
        });
        record.insert_item(ImportedItem::Named {
            local: "c".to_string(),
            original: "d".to_string(),
        });
        record.insert_item(ImportedItem::Wildcard);
        record.insert_item(ImportedItem::Wildcard);

        assert_eq!(
            record.imported_items,
            vec![
                ImportedItem::Named {
                    local: "c".to_string(),
                    original: "d".to_string()
                },
                ImportedItem::Wildcard
            ]
        );
    }

    #[test]
    fn test_record_usage_collects_lines() {
        let mut record = ModuleRecord::new("math");
        record.record_usage("sqrt", "sqrt", 2);
        record.record_usage("sqrt", "sqrt", 5);
        record.record_usage("sqrt", "sqrt", 5);
        record.record_usage("pi", "pi", 6);

        assert_eq!(record.usages.len(), 2);
        assert_eq!(record.usages[0].lines, vec![2, 5]);
    }

    #[test]
    fn test_version_spec_display() {
        assert_eq!(VersionSpec::Exact("1.0".into()).to_string(), "==1.0");
        let range = VersionSpec::Range {
            lower: Some(VersionBound::inclusive("1.20")),
            upper: Some(VersionBound::exclusive("2")),
        };
        assert_eq!(range.to_string(), ">=1.20,<2");
        assert_eq!(VersionSpec::Unspecified.to_string(), "");
    }

    #[test]
    fn test_index_name_prefers_distribution() {
        let mut record = ModuleRecord::new("yaml");
        assert_eq!(record.index_name(), "yaml");
        record.distribution = Some("PyYAML".to_string());
        assert_eq!(record.index_name(), "PyYAML");
    }

    #[test]
    fn test_top_level() {
        assert_eq!(ModuleRecord::new("os.path").top_level(), "os");
        assert_eq!(ModuleRecord::new("requests").top_level(), "requests");
    }
}
