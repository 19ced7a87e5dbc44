//! Usage scanning: the second pass over the entry file.
//!
//! Matching is textual and line-local. An occurrence inside a string, a
//! trailing comment or a shadowing local definition still counts.

use regex::Regex;

use super::lines::CodeLines;
use crate::context::Analysis;
use crate::model::ImportedItem;

/// What a compiled matcher records on a hit.
enum Matcher {
    /// `<binding>.<identifier>`: records the captured identifier.
    Attribute(Regex),
    /// Whole-word occurrence of a from-imported name.
    Symbol {
        re: Regex,
        local: String,
        original: String,
    },
}

/// Build every matcher up front, tagged with the owning module index.
fn build_matchers(analysis: &Analysis) -> Vec<(usize, Matcher)> {
    let mut matchers = Vec::new();

    for (idx, module) in analysis.modules.iter().enumerate() {
        if module.direct {
            let pattern = format!(
                r"\b{}\.([A-Za-z_][A-Za-z0-9_]*)",
                regex::escape(module.binding())
            );
            match Regex::new(&pattern) {
                Ok(re) => matchers.push((idx, Matcher::Attribute(re))),
                Err(e) => log::warn!("invalid usage pattern for {}: {}", module.name, e),
            }
        }

        for item in &module.imported_items {
            let ImportedItem::Named { local, original } = item else {
                continue;
            };
            let pattern = format!(r"\b{}\b", regex::escape(local));
            match Regex::new(&pattern) {
                Ok(re) => matchers.push((
                    idx,
                    Matcher::Symbol {
                        re,
                        local: local.clone(),
                        original: original.clone(),
                    },
                )),
                Err(e) => log::warn!("invalid usage pattern for {}: {}", local, e),
            }
        }
    }

    matchers
}

/// Scan `content` for usages of the modules already registered in
/// `analysis`, skipping the recognized import lines.
pub fn scan_usages(content: &str, analysis: &mut Analysis) {
    let matchers = build_matchers(analysis);
    if matchers.is_empty() {
        return;
    }

    for (line_no, line) in CodeLines::new(content) {
        if analysis.import_lines.contains(&line_no) {
            continue;
        }

        for (idx, matcher) in &matchers {
            let module = &mut analysis.modules[*idx];
            match matcher {
                Matcher::Attribute(re) => {
                    for caps in re.captures_iter(line) {
                        if let Some(attr) = caps.get(1) {
                            module.record_usage(attr.as_str(), attr.as_str(), line_no);
                        }
                    }
                }
                Matcher::Symbol {
                    re,
                    local,
                    original,
                } => {
                    if re.is_match(line) {
                        module.record_usage(local, original, line_no);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::imports::scan_imports;

    fn analyze(content: &str) -> Analysis {
        let mut analysis = Analysis::new("test.py");
        scan_imports(content, &mut analysis);
        scan_usages(content, &mut analysis);
        analysis
    }

    fn symbols(analysis: &Analysis, idx: usize) -> Vec<&str> {
        analysis.modules[idx]
            .usages
            .iter()
            .map(|u| u.symbol.as_str())
            .collect()
    }

    #[test]
    fn test_alias_attribute_usage() {
        let analysis = analyze("import foo as f\nf.bar()\n");
        let idx = analysis.aliases.get("f").unwrap();
        assert_eq!(symbols(&analysis, idx), vec!["bar"]);
        assert_eq!(analysis.modules[idx].usages[0].lines, vec![2]);
    }

    #[test]
    fn test_unaliased_attribute_usage() {
        let analysis = analyze("import math\nprint(math.sqrt(4))\n");
        assert_eq!(symbols(&analysis, 0), vec!["sqrt"]);
    }

    #[test]
    fn test_from_import_usage_keeps_original_for_definition() {
        let analysis = analyze("from pkg import a, b as c\nx = a()\ny = c(x)\n");
        let usages = &analysis.modules[0].usages;
        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].symbol, "a");
        assert_eq!(usages[1].symbol, "c");
        assert_eq!(usages[1].definition, "b");
    }

    #[test]
    fn test_whole_word_matching() {
        let analysis = analyze("from pkg import get\ntarget = 1\nget_all()\nget()\n");
        let usage = &analysis.modules[0].usages[0];
        assert_eq!(usage.lines, vec![4]);
    }

    #[test]
    fn test_wildcard_records_nothing() {
        let analysis = analyze("from pkg import *\nanything()\n");
        assert!(analysis.modules[0].usages.is_empty());
    }

    #[test]
    fn test_repeated_usage_collects_lines() {
        let analysis = analyze("import numpy as np\na = np.array([1])\nb = np.array([2])\n");
        let usages = &analysis.modules[0].usages;
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].lines, vec![2, 3]);
    }

    #[test]
    fn test_multiple_attributes_on_one_line() {
        let analysis = analyze("import os\nos.path.join(os.getcwd(), 'x')\n");
        assert_eq!(symbols(&analysis, 0), vec!["path", "getcwd"]);
    }

    #[test]
    fn test_import_and_comment_lines_skipped() {
        let analysis = analyze("import os\n# os.remove is dangerous\nos.listdir()\n");
        assert_eq!(symbols(&analysis, 0), vec!["listdir"]);
    }

    #[test]
    fn test_from_only_module_has_no_attribute_usage() {
        let analysis = analyze("from pkg import a\npkg.other()\n");
        assert!(analysis.modules[0].usages.is_empty());
    }

    #[test]
    fn test_known_false_positive_inside_string() {
        // Textual matching counts occurrences inside string literals.
        let analysis = analyze("import requests\nprint(\"call requests.get later\")\n");
        assert_eq!(symbols(&analysis, 0), vec!["get"]);
    }

    #[test]
    fn test_known_false_negative_across_lines() {
        // A usage split over a line continuation is not seen.
        let analysis = analyze("import requests\nrequests \\\n    .get('x')\n");
        assert!(analysis.modules[0].usages.is_empty());
    }
}
