//! Command-line interface for pyreach.

use clap::{ArgAction, Parser};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::engine::Engine;
use crate::registry::PypiIndex;
use crate::report;
use crate::resolve::RequirementsFile;
use crate::source::{LocateOptions, SdistRetriever};
use crate::xref::ProcessAnalyzer;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 2;

/// Static dependency reachability analysis for Python projects.
///
/// Pyreach scans one entry file for imports and the symbols it uses,
/// attaches pinned versions from a requirements file, resolves each pinned
/// package's declared dependencies on PyPI, and confirms which of them the
/// used functions actually reach.
#[derive(Parser, Debug)]
#[command(name = "pyreach")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Entry source file to analyze
    #[arg(short = 'p', long)]
    pub python_file: PathBuf,

    /// Pinned requirements file
    #[arg(short = 'r', long)]
    pub requirements_file: PathBuf,

    /// Project directory (reserved)
    #[arg(short = 'd', long)]
    pub directory: Option<PathBuf>,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Skip all package index queries and source retrieval
    #[arg(long)]
    pub offline: bool,

    /// Skip source retrieval, definition lookup and cross-referencing
    #[arg(long)]
    pub skip_sources: bool,

    /// Extract sources into this directory and keep them
    #[arg(long, value_name = "DIR")]
    pub keep_sources: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Default log filter for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Run an analysis.
pub fn run(args: &Cli) -> anyhow::Result<i32> {
    // Validate format
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let config = match Config::load(args.config.as_deref(), Path::new(".")) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: invalid config: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if let Some(dir) = &args.directory {
        log::debug!("project directory {} is not used yet", dir.display());
    }

    let versions = RequirementsFile::new(&args.requirements_file);
    let locate = LocateOptions::from_config(&config.locate)?;

    let index = if args.offline {
        None
    } else {
        Some(PypiIndex::new(&config.registry)?)
    };

    // Held until the run ends; dropping it removes the scratch directory.
    let mut _scratch = None;
    let work_dir = if args.offline || args.skip_sources {
        None
    } else {
        match args.keep_sources.clone().or_else(|| config.work_dir.clone()) {
            Some(dir) => {
                fs::create_dir_all(&dir)?;
                Some(dir)
            }
            None => {
                let temp = tempfile::Builder::new().prefix("pyreach-").tempdir()?;
                let dir = temp.path().to_path_buf();
                _scratch = Some(temp);
                Some(dir)
            }
        }
    };

    let retriever = match (&index, &work_dir) {
        (Some(index), Some(dir)) => Some(SdistRetriever::new(index, dir)),
        _ => None,
    };
    let analyzer = ProcessAnalyzer::from_config(&config.analyzer);

    let mut engine = Engine::new(&versions).locate_options(locate);
    if let Some(index) = &index {
        engine = engine.with_metadata(index);
    }
    if let Some(retriever) = &retriever {
        engine = engine.with_sources(retriever).with_analyzer(&analyzer);
    }

    let analysis = match engine.run(&args.python_file) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let requirements = args.requirements_file.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(&analysis, &requirements)?,
        _ => report::write_pretty(&analysis, &requirements),
    }

    Ok(EXIT_SUCCESS)
}
