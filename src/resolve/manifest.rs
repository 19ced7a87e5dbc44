//! Version collection from a `requirements.txt` style manifest.

use anyhow::Context;
use phf::phf_map;
use std::fs;
use std::path::{Path, PathBuf};

use super::constraints::parse_declaration;
use crate::context::Analysis;
use crate::model::{ModuleRecord, VersionSpec};
use crate::registry::normalize_package_name;
use crate::scan::{is_stdlib, strip_comment};

/// Top-level import names whose distribution is published under another
/// name. Keys are lowercase import names, values normalized distribution
/// names.
static KNOWN_DISTRIBUTIONS: phf::Map<&'static str, &'static str> = phf_map! {
    "attr" => "attrs",
    "bs4" => "beautifulsoup4",
    "crypto" => "pycryptodome",
    "cv2" => "opencv-python",
    "dateutil" => "python-dateutil",
    "docx" => "python-docx",
    "dotenv" => "python-dotenv",
    "git" => "gitpython",
    "jose" => "python-jose",
    "jwt" => "pyjwt",
    "magic" => "python-magic",
    "multipart" => "python-multipart",
    "openssl" => "pyopenssl",
    "pil" => "pillow",
    "serial" => "pyserial",
    "skimage" => "scikit-image",
    "sklearn" => "scikit-learn",
    "socks" => "pysocks",
    "usb" => "pyusb",
    "yaml" => "pyyaml",
    "zmq" => "pyzmq",
};

/// Strategy that attaches versions to the scanned module records.
pub trait VersionSource {
    fn collect(&self, analysis: &mut Analysis) -> anyhow::Result<()>;
}

/// Versions read from a requirements file on disk.
pub struct RequirementsFile {
    path: PathBuf,
}

impl RequirementsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VersionSource for RequirementsFile {
    fn collect(&self, analysis: &mut Analysis) -> anyhow::Result<()> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read manifest {}", self.path.display()))?;
        collect_versions(&content, analysis);
        Ok(())
    }
}

/// How a manifest name matched a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameMatch {
    /// Same package name after normalization.
    Exact,
    /// Matched through the top-level package or a known distribution name.
    Distribution,
}

fn match_name(record: &ModuleRecord, dist: &str) -> Option<NameMatch> {
    let dist = normalize_package_name(dist);
    if normalize_package_name(&record.name) == dist {
        return Some(NameMatch::Exact);
    }

    let top = record.top_level().to_ascii_lowercase();
    if normalize_package_name(&top) == dist {
        return Some(NameMatch::Distribution);
    }
    match KNOWN_DISTRIBUTIONS.get(top.as_str()) {
        Some(known) if *known == dist => Some(NameMatch::Distribution),
        _ => None,
    }
}

/// Whether an import name and a distribution name refer to the same package.
pub fn names_match(import: &str, dist: &str) -> bool {
    match_name(&ModuleRecord::new(import), dist).is_some()
}

/// Parse manifest text and attach versions to the matching records.
///
/// Exact pins and relational bounds both replace whatever version a
/// record held, so the last matching line wins. A package that matches no
/// record gets a new one.
pub fn collect_versions(content: &str, analysis: &mut Analysis) {
    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();

        if line.is_empty() || line.starts_with('-') {
            continue;
        }
        if line.contains(';') || line.contains("python_version") {
            log::debug!("manifest line {}: skipping marker line", line_no);
            continue;
        }
        if line.contains("://") || line.contains(" @ ") {
            log::debug!("manifest line {}: skipping direct reference", line_no);
            continue;
        }

        let Some(decl) = parse_declaration(line) else {
            log::debug!("manifest line {}: unrecognized {:?}", line_no, line);
            continue;
        };
        let version = decl.version_spec();
        if version.is_unspecified() {
            continue;
        }

        apply_version(analysis, &decl.name, version);
    }
}

fn apply_version(analysis: &mut Analysis, dist: &str, version: VersionSpec) {
    let mut matched = false;

    for record in analysis.modules.iter_mut() {
        match match_name(record, dist) {
            Some(NameMatch::Exact) => {
                record.name = dist.to_string();
            }
            Some(NameMatch::Distribution) => {
                record.distribution = Some(dist.to_string());
            }
            None => continue,
        }
        log::debug!("{}: version {}", record.name, version);
        record.version = version.clone();
        matched = true;
    }

    // Alias keys belong to the entry file, so the new record bypasses them.
    if !matched {
        let mut record = ModuleRecord::new(dist);
        record.stdlib = is_stdlib(dist);
        record.version = version;
        analysis.modules.push(record);
    }
}
