//! The analysis context threaded through every pipeline stage.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::model::{Confirmation, ModuleRecord, Stage, StageError};
use crate::scan::AliasTable;

/// Explicit result object: each stage takes it, mutates the records in
/// place and hands it on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Analysis {
    pub entry_file: PathBuf,
    /// Module records in first-seen order.
    pub modules: Vec<ModuleRecord>,
    #[serde(skip)]
    pub aliases: AliasTable,
    /// Line numbers of recognized import statements.
    #[serde(skip)]
    pub import_lines: BTreeSet<usize>,
    pub confirmations: Vec<Confirmation>,
    pub errors: Vec<StageError>,
}

impl Analysis {
    pub fn new(entry_file: impl Into<PathBuf>) -> Self {
        Self {
            entry_file: entry_file.into(),
            ..Default::default()
        }
    }

    /// Return the record registered under `key`, creating it with
    /// `make` when the key is unknown.
    pub fn module_for_key(&mut self, key: &str, make: impl FnOnce() -> ModuleRecord) -> usize {
        if let Some(idx) = self.aliases.get(key) {
            return idx;
        }
        let idx = self.modules.len();
        self.modules.push(make());
        self.aliases.insert(key, idx)
    }

    pub fn module(&self, name: &str) -> Option<&ModuleRecord> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Log and keep an isolated failure.
    pub fn record_error(&mut self, stage: Stage, module: &str, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{} stage failed for {}: {}", stage, module, message);
        self.errors.push(StageError {
            stage,
            module: module.to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_for_key_reuses_existing() {
        let mut analysis = Analysis::new("main.py");
        let a = analysis.module_for_key("np", || ModuleRecord::new("numpy"));
        let b = analysis.module_for_key("np", || ModuleRecord::new("other"));
        assert_eq!(a, b);
        assert_eq!(analysis.modules.len(), 1);
        assert_eq!(analysis.modules[0].name, "numpy");
    }

    #[test]
    fn test_record_error() {
        let mut analysis = Analysis::new("main.py");
        analysis.record_error(Stage::Metadata, "requests", "HTTP 500");
        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].stage, Stage::Metadata);
    }
}
