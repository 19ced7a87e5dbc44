//! Dependency metadata resolution for pinned modules.

use std::collections::HashMap;

use super::constraints::parse_declaration;
use crate::context::Analysis;
use crate::model::{ModuleRecord, Stage};
use crate::registry::{PackageMetadata, PackageRef, RegistryError};
use crate::scan::is_stdlib;

/// Strategy that fetches release metadata in batches.
///
/// Implementations return exactly one result per request, in request order.
pub trait MetadataSource {
    fn fetch_metadata(&self, requests: &[PackageRef]) -> Vec<Result<PackageMetadata, RegistryError>>;
}

/// Attach declared dependencies and vulnerabilities to every exactly
/// pinned, non-stdlib module.
///
/// Each release is requested once, even when several records share it. A
/// failed fetch is recorded once for that release; the others still resolve.
pub fn resolve_dependencies(analysis: &mut Analysis, source: &dyn MetadataSource) {
    let mut requests: Vec<PackageRef> = Vec::new();
    let mut owners: Vec<Vec<usize>> = Vec::new();
    let mut positions: HashMap<PackageRef, usize> = HashMap::new();

    for (idx, module) in analysis.modules.iter().enumerate() {
        if module.stdlib {
            continue;
        }
        let Some(version) = module.version.exact() else {
            continue;
        };
        let package = PackageRef::new(module.index_name(), version);
        let pos = *positions.entry(package.clone()).or_insert_with(|| {
            requests.push(package);
            owners.push(Vec::new());
            requests.len() - 1
        });
        owners[pos].push(idx);
    }

    if requests.is_empty() {
        return;
    }
    log::info!("fetching metadata for {} releases", requests.len());

    let results = source.fetch_metadata(&requests);
    if results.len() != requests.len() {
        log::warn!(
            "metadata source returned {} results for {} requests",
            results.len(),
            requests.len()
        );
    }

    for ((package, modules), result) in requests.iter().zip(owners).zip(results) {
        match result {
            Ok(metadata) => {
                for idx in modules {
                    apply_metadata(&mut analysis.modules[idx], metadata.clone());
                }
            }
            Err(e) => analysis.record_error(Stage::Metadata, &package.to_string(), e.to_string()),
        }
    }
}

fn apply_metadata(record: &mut ModuleRecord, metadata: PackageMetadata) {
    record.dependencies.clear();

    for declaration in &metadata.requires_dist {
        let Some(decl) = parse_declaration(declaration) else {
            log::debug!("{}: skipping declaration {:?}", record.name, declaration);
            continue;
        };
        let version = decl.version_spec();
        let mut child = ModuleRecord::new(decl.name);
        child.stdlib = is_stdlib(&child.name);
        child.version = version;
        child.extras = decl.extras;
        child.marker = decl.marker;
        record.dependencies.push(child);
    }

    if !metadata.vulnerabilities.is_empty() {
        log::info!(
            "{}: {} known vulnerabilities",
            record.name,
            metadata.vulnerabilities.len()
        );
    }
    record.vulnerabilities = metadata.vulnerabilities;
}
