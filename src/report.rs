//! Output formatting for pyreach results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::{Deserialize, Serialize};

use crate::context::Analysis;
use crate::model::{Confirmation, ImportedItem, ModuleRecord, StageError, VersionSpec};

// =============================================================================
// JSON Format
// =============================================================================

/// Top-level JSON report.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub entry_file: String,
    pub requirements_file: String,
    pub modules: Vec<ModuleRecord>,
    pub confirmations: Vec<Confirmation>,
    pub errors: Vec<StageError>,
}

pub fn build_json_report(analysis: &Analysis, requirements_file: &str) -> JsonReport {
    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        entry_file: analysis.entry_file.to_string_lossy().to_string(),
        requirements_file: requirements_file.to_string(),
        modules: analysis.modules.clone(),
        confirmations: analysis.confirmations.clone(),
        errors: analysis.errors.clone(),
    }
}

/// Write results in JSON format.
pub fn write_json(analysis: &Analysis, requirements_file: &str) -> anyhow::Result<()> {
    let report = build_json_report(analysis, requirements_file);
    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty(analysis: &Analysis, requirements_file: &str) {
    // Header
    println!();
    print!("  ");
    print!("{}", "pyreach".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Entry:        ".dimmed());
    println!("{}", analysis.entry_file.display());
    print!("  {}", "Requirements: ".dimmed());
    println!("{}", requirements_file);
    println!();

    println!("  {} ({}):", "Modules".bold(), analysis.modules.len());
    println!();
    for module in &analysis.modules {
        write_module(module);
        println!();
    }

    write_confirmations(&analysis.confirmations);
    println!();

    write_errors(&analysis.errors);
    println!();
}

fn write_module(module: &ModuleRecord) {
    print!("    {}", module.name.blue().bold());
    if let Some(alias) = &module.alias {
        print!("{}", format!(" as {}", alias).dimmed());
    }
    print!("  ");
    write_version(&module.version);
    if module.stdlib {
        print!("  {}", "[stdlib]".dimmed());
    }
    println!();

    if let Some(dist) = &module.distribution {
        println!("      {:<16}{}", "distribution:".dimmed(), dist);
    }

    let items: Vec<String> = module
        .imported_items
        .iter()
        .map(|item| match item {
            ImportedItem::Named { local, original } if local != original => {
                format!("{} as {}", original, local)
            }
            ImportedItem::Named { local, .. } => local.clone(),
            ImportedItem::Wildcard => "*".to_string(),
        })
        .collect();
    println!("      {:<16}[{}]", "items:".dimmed(), items.join(", "));

    println!("      {:<16}({})", "usages:".dimmed(), module.usages.len());
    for usage in &module.usages {
        let lines: Vec<String> = usage.lines.iter().map(|l| l.to_string()).collect();
        print!("        {}", usage.symbol);
        if usage.definition != usage.symbol {
            print!("{}", format!(" -> {}", usage.definition).dimmed());
        }
        println!("{}", format!("  lines {}", lines.join(",")).dimmed());
        for path in &usage.paths {
            println!("          {}", path.display().to_string().dimmed());
        }
    }

    println!(
        "      {:<16}({})",
        "dependencies:".dimmed(),
        module.dependencies.len()
    );
    for dep in &module.dependencies {
        print!("        {}", dep.name);
        if !dep.extras.is_empty() {
            print!("[{}]", dep.extras.join(","));
        }
        print!(" ");
        write_version(&dep.version);
        if let Some(marker) = &dep.marker {
            print!("{}", format!("  ; {}", marker).dimmed());
        }
        println!();
    }

    if module.vulnerabilities.is_empty() {
        println!("      {:<16}(0)", "vulnerabilities:".dimmed());
    } else {
        println!(
            "      {:<16}({})",
            "vulnerabilities:".dimmed(),
            module.vulnerabilities.len().to_string().red()
        );
        for vuln in &module.vulnerabilities {
            print!("        {}", vuln.id.red());
            if !vuln.fixed_in.is_empty() {
                print!("{}", format!("  fixed in {}", vuln.fixed_in.join(", ")).dimmed());
            }
            println!();
        }
    }
}

fn write_version(version: &VersionSpec) {
    match version {
        VersionSpec::Unspecified => print!("{}", "(unversioned)".dimmed()),
        VersionSpec::Exact(_) => print!("{}", version.to_string().green()),
        VersionSpec::Range { .. } => print!("{}", version.to_string().yellow()),
    }
}

fn write_confirmations(confirmations: &[Confirmation]) {
    println!("  {} ({}):", "Confirmed dependencies".bold(), confirmations.len());
    for c in confirmations {
        print!("    {} ", "✓".green());
        print!("{}", c.module.blue());
        print!("{}", format!(".{}", c.symbol).dimmed());
        print!(" uses {}", c.dependency.bold());
        if !c.used_members.is_empty() {
            print!("{}", format!(" ({})", c.used_members.join(", ")).dimmed());
        }
        println!();
    }
}

fn write_errors(errors: &[StageError]) {
    println!("  {} ({}):", "Errors".bold(), errors.len());
    for e in errors {
        print!("    {} ", "WARN ".yellow());
        print!("{:<10}", e.stage.as_str().dimmed());
        print!("{}", e.module.blue());
        println!("  {}", e.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stage;

    #[test]
    fn test_json_report_keeps_empty_fields() {
        let mut analysis = Analysis::new("main.py");
        analysis.modules.push(ModuleRecord::new("requests"));
        analysis.record_error(Stage::Source, "requests==2.31.0", "no source archive");

        let report = build_json_report(&analysis, "requirements.txt");
        let value = serde_json::to_value(&report).unwrap();

        let module = &value["modules"][0];
        assert_eq!(module["name"], "requests");
        assert_eq!(module["alias"], serde_json::Value::Null);
        assert_eq!(module["version"]["kind"], "unspecified");
        assert!(module["usages"].as_array().unwrap().is_empty());
        assert!(module["dependencies"].as_array().unwrap().is_empty());
        assert!(value["confirmations"].as_array().unwrap().is_empty());
        assert_eq!(value["errors"][0]["stage"], "source");
    }

    #[test]
    fn test_json_report_round_trips() {
        let mut analysis = Analysis::new("main.py");
        let mut record = ModuleRecord::new("numpy");
        record.version = VersionSpec::Exact("1.26.0".to_string());
        analysis.modules.push(record);

        let json = serde_json::to_string(&build_json_report(&analysis, "req.txt")).unwrap();
        let parsed: JsonReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.modules[0].version.exact(), Some("1.26.0"));
        assert_eq!(parsed.requirements_file, "req.txt");
    }
}
