//! Import statement scanning.
//!
//! Recognizes single-line `import` and `from ... import` statements with a
//! regex per statement shape. Multi-line (parenthesized or backslash
//! continued) statements only contribute the items on their first line.

use lazy_static::lazy_static;
use regex::Regex;

use super::aliases::AliasTable;
use super::lines::{strip_comment, CodeLines};
use super::stdlib::is_stdlib;
use crate::context::Analysis;
use crate::model::{ImportedItem, ModuleRecord};

lazy_static! {
    // import foo, bar.baz as b
    static ref IMPORT_RE: Regex = Regex::new(r"^import\s+(.+)$").unwrap();
    // from foo.bar import x, y as z
    static ref FROM_IMPORT_RE: Regex =
        Regex::new(r"^from\s+(\.*[A-Za-z0-9_.]*)\s+import\s+(.+)$").unwrap();
    // one `module [as alias]` entry of a direct import
    static ref MODULE_ENTRY_RE: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_.]*)(?:\s+as\s+([A-Za-z_][A-Za-z0-9_]*))?$").unwrap();
    // one `name [as alias]` item of a from-import
    static ref ITEM_RE: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(?:\s+as\s+([A-Za-z_][A-Za-z0-9_]*))?$").unwrap();
}

/// Scan `content` for import statements and register their modules in
/// `analysis`.
///
/// Existing alias keys are reused, so scanning the same content twice adds
/// nothing.
pub fn scan_imports(content: &str, analysis: &mut Analysis) {
    for (line_no, line) in CodeLines::new(content) {
        let line = strip_comment(line).trim_end_matches('\\').trim_end();

        if let Some(caps) = IMPORT_RE.captures(line) {
            let Some(entries) = caps.get(1) else { continue };
            if scan_direct_import(entries.as_str(), analysis) {
                analysis.import_lines.insert(line_no);
            }
        } else if let Some(caps) = FROM_IMPORT_RE.captures(line) {
            let (Some(module), Some(items)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let module = module.as_str();
            if module.is_empty() || module.starts_with('.') {
                log::debug!("line {}: skipping relative import from {:?}", line_no, module);
                analysis.import_lines.insert(line_no);
                continue;
            }
            scan_from_import(module, items.as_str(), analysis);
            analysis.import_lines.insert(line_no);
        }
    }
}

/// Handle `import a, b as c`. Returns whether any entry was recognized.
fn scan_direct_import(entries: &str, analysis: &mut Analysis) -> bool {
    let mut recognized = false;

    for entry in entries.split(',') {
        let entry = entry.trim();
        let Some(caps) = MODULE_ENTRY_RE.captures(entry) else {
            log::debug!("unrecognized import entry {:?}", entry);
            continue;
        };
        let Some(module) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let alias = caps.get(2).map(|m| m.as_str());
        recognized = true;

        let key = AliasTable::key_for(module, alias);
        let idx = analysis.module_for_key(key, || new_record(module, alias));
        analysis.modules[idx].direct = true;
    }

    recognized
}

/// Handle `from module import items`. The record is keyed by the
/// canonical module name so repeated statements merge.
fn scan_from_import(module: &str, items: &str, analysis: &mut Analysis) {
    let idx = analysis.module_for_key(module, || new_record(module, None));
    let record = &mut analysis.modules[idx];

    let items = items.trim().trim_start_matches('(').trim_end_matches(')');
    if items.trim() == "*" {
        record.insert_item(ImportedItem::Wildcard);
        return;
    }

    for item in items.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let Some(caps) = ITEM_RE.captures(item) else {
            log::debug!("unrecognized import item {:?} from {}", item, module);
            continue;
        };
        let Some(original) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let local = caps.get(2).map(|m| m.as_str()).unwrap_or(original);
        record.insert_item(ImportedItem::Named {
            local: local.to_string(),
            original: original.to_string(),
        });
    }
}

fn new_record(module: &str, alias: Option<&str>) -> ModuleRecord {
    let mut record = ModuleRecord::new(module);
    record.alias = alias.map(str::to_string);
    record.stdlib = is_stdlib(module);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(content: &str) -> Analysis {
        let mut analysis = Analysis::new("test.py");
        scan_imports(content, &mut analysis);
        analysis
    }

    fn named(local: &str, original: &str) -> ImportedItem {
        ImportedItem::Named {
            local: local.to_string(),
            original: original.to_string(),
        }
    }

    #[test]
    fn test_plain_import() {
        let analysis = scan("import foo\n");
        assert_eq!(analysis.modules.len(), 1);
        let record = &analysis.modules[0];
        assert_eq!(record.name, "foo");
        assert_eq!(record.alias, None);
        assert!(record.direct);
        assert!(record.imported_items.is_empty());
    }

    #[test]
    fn test_aliased_import() {
        let analysis = scan("import foo as f\n");
        let idx = analysis.aliases.get("f").unwrap();
        assert_eq!(analysis.modules[idx].name, "foo");
        assert_eq!(analysis.modules[idx].alias.as_deref(), Some("f"));
        assert!(!analysis.aliases.contains("foo"));
    }

    #[test]
    fn test_from_import_items() {
        let analysis = scan("from pkg import a, b as c\n");
        let record = &analysis.modules[0];
        assert_eq!(record.name, "pkg");
        assert!(!record.direct);
        assert_eq!(record.imported_items, vec![named("a", "a"), named("c", "b")]);
    }

    #[test]
    fn test_wildcard_import() {
        let analysis = scan("from pkg import *\n");
        assert!(analysis.modules[0].has_wildcard());
        assert_eq!(analysis.modules[0].imported_items.len(), 1);
    }

    #[test]
    fn test_from_imports_merge_into_one_record() {
        let analysis = scan("from pkg import a\nfrom pkg import b\n");
        assert_eq!(analysis.modules.len(), 1);
        assert_eq!(
            analysis.modules[0].imported_items,
            vec![named("a", "a"), named("b", "b")]
        );
    }

    #[test]
    fn test_from_import_looks_up_canonical_name_not_alias() {
        let analysis = scan("import pkg as p\nfrom pkg import x\n");
        assert_eq!(analysis.modules.len(), 2);
        assert_eq!(analysis.aliases.get("p"), Some(0));
        assert_eq!(analysis.aliases.get("pkg"), Some(1));
    }

    #[test]
    fn test_reimport_keeps_first_record() {
        let analysis = scan("import foo as f\nimport bar as f\n");
        assert_eq!(analysis.modules.len(), 1);
        assert_eq!(analysis.modules[0].name, "foo");
    }

    #[test]
    fn test_scanning_twice_is_idempotent() {
        let content = "import os\nimport numpy as np\nfrom pkg import a, b as c\nfrom x import *\n";
        let mut analysis = Analysis::new("test.py");
        scan_imports(content, &mut analysis);
        let first = analysis.modules.clone();
        scan_imports(content, &mut analysis);
        assert_eq!(analysis.modules, first);
    }

    #[test]
    fn test_comma_separated_direct_imports() {
        let analysis = scan("import os, sys as system\n");
        let names: Vec<_> = analysis.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["os", "sys"]);
        assert_eq!(analysis.aliases.get("system"), Some(1));
    }

    #[test]
    fn test_dotted_module_and_trailing_comment() {
        let analysis = scan("import os.path  # paths\nfrom a.b import (c, d)\n");
        assert_eq!(analysis.modules[0].name, "os.path");
        assert!(analysis.modules[0].stdlib);
        assert_eq!(
            analysis.modules[1].imported_items,
            vec![named("c", "c"), named("d", "d")]
        );
    }

    #[test]
    fn test_relative_imports_are_skipped_but_classified() {
        let analysis = scan("from . import sibling\nfrom .pkg import thing\n");
        assert!(analysis.modules.is_empty());
        assert_eq!(analysis.import_lines.len(), 2);
    }

    #[test]
    fn test_comments_and_docstrings_ignored() {
        let analysis = scan("# import hidden\n\"\"\"\nimport also_hidden\n\"\"\"\nimport shown\n");
        assert_eq!(analysis.modules.len(), 1);
        assert_eq!(analysis.modules[0].name, "shown");
    }

    #[test]
    fn test_import_lines_recorded() {
        let analysis = scan("import os\n\nx = 1\nfrom pkg import a\n");
        assert_eq!(analysis.import_lines.iter().copied().collect::<Vec<_>>(), vec![1, 4]);
    }

    #[test]
    fn test_multiline_import_only_sees_first_line() {
        // Known limitation: continuation lines are not part of the statement.
        let analysis = scan("from pkg import (a,\n    b)\n");
        assert_eq!(analysis.modules[0].imported_items, vec![named("a", "a")]);
    }
}
