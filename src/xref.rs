//! Cross-referencing used symbols against declared dependencies.
//!
//! An external analyzer receives a definition name and the files defining
//! it, and reports which libraries that function body touches:
//!
//! ```text
//! Found: {"imported_library": "urllib3", "used_module": ["PoolManager"]}
//! Not Found: chardet
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

use crate::config::AnalyzerConfig;
use crate::context::Analysis;
use crate::model::{Confirmation, ModuleRecord, Stage};
use crate::registry::normalize_package_name;

const FOUND: &str = "Found:";
const NOT_FOUND: &str = "Not Found:";

/// Errors from running the analyzer.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("cannot start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("analyzer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// One `Found:` line of analyzer output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Finding {
    pub imported_library: String,
    #[serde(default)]
    pub used_module: Vec<String>,
}

/// Parse analyzer stdout into findings.
///
/// `Not Found:` lines are informational. Malformed `Found:` payloads are
/// logged and skipped.
pub fn parse_analyzer_output(output: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        // "Not Found:" contains "Found:", so it must be tested first.
        if let Some(rest) = line.strip_prefix(NOT_FOUND) {
            log::debug!("analyzer: not found {}", rest.trim());
        } else if let Some(payload) = line.strip_prefix(FOUND) {
            match serde_json::from_str::<Finding>(payload.trim()) {
                Ok(finding) => findings.push(finding),
                Err(e) => log::warn!("malformed analyzer finding {:?}: {}", payload.trim(), e),
            }
        }
    }

    findings
}

/// Strategy that runs the per-function analyzer.
pub trait FunctionAnalyzer {
    /// Returns the analyzer's raw stdout.
    fn analyze(&self, symbol: &str, paths: &[PathBuf]) -> Result<String, AnalyzerError>;
}

/// Runs the analyzer as `<program> [args...] <symbol> <p1,p2,...>`.
pub struct ProcessAnalyzer {
    program: String,
    args: Vec<String>,
}

impl ProcessAnalyzer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

impl FunctionAnalyzer for ProcessAnalyzer {
    fn analyze(&self, symbol: &str, paths: &[PathBuf]) -> Result<String, AnalyzerError> {
        let joined = paths
            .iter()
            .map(|p| p.to_string_lossy())
            .collect::<Vec<_>>()
            .join(",");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(symbol)
            .arg(joined)
            .output()
            .map_err(|source| AnalyzerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AnalyzerError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn dependency_matches(dependency: &ModuleRecord, library: &str) -> bool {
    let top = normalize_package_name(library.split('.').next().unwrap_or(library));
    let dep = normalize_package_name(&dependency.name);
    dep == normalize_package_name(library) || dep == top
}

/// Run the analyzer for every usage with located paths and record a
/// confirmation for each finding naming one of the module's declared
/// dependencies.
///
/// Findings are matched against the owning module's dependencies only, so a
/// module without resolved dependencies is still analyzed but confirms
/// nothing. A failing invocation is recorded for that usage only.
pub fn cross_reference(analysis: &mut Analysis, analyzer: &dyn FunctionAnalyzer) {
    let mut confirmations = Vec::new();
    let mut failures = Vec::new();

    for module in &analysis.modules {
        for usage in module.usages.iter().filter(|u| !u.paths.is_empty()) {
            let mut paths = usage.paths.clone();
            paths.dedup();

            let output = match analyzer.analyze(&usage.definition, &paths) {
                Ok(output) => output,
                Err(e) => {
                    failures.push((format!("{}.{}", module.name, usage.symbol), e.to_string()));
                    continue;
                }
            };

            for finding in parse_analyzer_output(&output) {
                let Some(dep) = module
                    .dependencies
                    .iter()
                    .find(|d| dependency_matches(d, &finding.imported_library))
                else {
                    log::debug!(
                        "{}: {} is not a declared dependency",
                        module.name,
                        finding.imported_library
                    );
                    continue;
                };
                confirmations.push(Confirmation {
                    module: module.name.clone(),
                    dependency: dep.name.clone(),
                    symbol: usage.symbol.clone(),
                    imported_library: finding.imported_library,
                    used_members: finding.used_module,
                });
            }
        }
    }

    log::info!("{} dependency confirmations", confirmations.len());
    analysis.confirmations.extend(confirmations);
    for (target, message) in failures {
        analysis.record_error(Stage::Analyzer, &target, message);
    }
}
