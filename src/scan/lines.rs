//! Code line iteration shared by both scanning passes.
//!
//! Blank lines, `#` comment lines and lines inside triple-quoted string
//! blocks are skipped. A line that opens a block after some code, such as
//! `QUERY = """`, is still yielded. Everything else is yielded trimmed, with
//! its 1-based line number.

use std::iter::Enumerate;
use std::str::Lines;

const TRIPLE_DOUBLE: &str = r#"""""#;
const TRIPLE_SINGLE: &str = "'''";

/// Iterator over the code lines of a Python source.
pub struct CodeLines<'a> {
    inner: Enumerate<Lines<'a>>,
    docstring_end: Option<&'static str>,
}

impl<'a> CodeLines<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            inner: content.lines().enumerate(),
            docstring_end: None,
        }
    }
}

impl<'a> Iterator for CodeLines<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, line) in self.inner.by_ref() {
            let trimmed = line.trim();

            if let Some(end) = self.docstring_end {
                if trimmed.matches(end).count() % 2 == 1 {
                    self.docstring_end = None;
                }
                continue;
            }

            // An odd delimiter count leaves a block open.
            let opener = [TRIPLE_DOUBLE, TRIPLE_SINGLE]
                .into_iter()
                .find(|delim| trimmed.matches(*delim).count() % 2 == 1);
            if let Some(delim) = opener {
                self.docstring_end = Some(delim);
            }
            if trimmed.starts_with(TRIPLE_DOUBLE) || trimmed.starts_with(TRIPLE_SINGLE) {
                continue;
            }

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            return Some((idx + 1, trimmed));
        }
        None
    }
}

/// Drop a trailing `# comment`.
pub fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => line[..pos].trim_end(),
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_blank_comment_and_docstring_lines() {
        let content = r#"
# header comment
"""Module docstring
import hidden
"""
import os
'''one-liner'''
x = os.getcwd()
"#;
        let lines: Vec<_> = CodeLines::new(content).collect();
        assert_eq!(lines, vec![(6, "import os"), (8, "x = os.getcwd()")]);
    }

    #[test]
    fn test_string_block_opened_mid_line() {
        let content = "QUERY = \"\"\"\nselect 1\n\"\"\"\nimport requests\nrequests.get(1)\n";
        let lines: Vec<_> = CodeLines::new(content).collect();
        assert_eq!(
            lines,
            vec![
                (1, "QUERY = \"\"\""),
                (4, "import requests"),
                (5, "requests.get(1)"),
            ]
        );
    }

    #[test]
    fn test_inline_triple_quoted_string_opens_nothing() {
        let content = "HELP = '''usage'''\nimport os\n";
        let lines: Vec<_> = CodeLines::new(content).collect();
        assert_eq!(lines, vec![(1, "HELP = '''usage'''"), (2, "import os")]);
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("import os  # needed"), "import os");
        assert_eq!(strip_comment("import os"), "import os");
    }
}
