//! Pipeline orchestration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::context::Analysis;
use crate::model::Stage;
use crate::registry::PackageRef;
use crate::resolve::{resolve_dependencies, MetadataSource, VersionSource};
use crate::scan;
use crate::source::{locate_definitions, LocateOptions, SourceProvider};
use crate::xref::{cross_reference, FunctionAnalyzer};

/// Runs every stage over one entry file.
///
/// Stages without a strategy are skipped, so an engine with only a
/// [`VersionSource`] performs an offline scan.
pub struct Engine<'a> {
    versions: &'a dyn VersionSource,
    metadata: Option<&'a dyn MetadataSource>,
    sources: Option<&'a dyn SourceProvider>,
    analyzer: Option<&'a dyn FunctionAnalyzer>,
    locate: LocateOptions,
}

impl<'a> Engine<'a> {
    pub fn new(versions: &'a dyn VersionSource) -> Self {
        Self {
            versions,
            metadata: None,
            sources: None,
            analyzer: None,
            locate: LocateOptions::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: &'a dyn MetadataSource) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_sources(mut self, sources: &'a dyn SourceProvider) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn with_analyzer(mut self, analyzer: &'a dyn FunctionAnalyzer) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn locate_options(mut self, options: LocateOptions) -> Self {
        self.locate = options;
        self
    }

    /// Analyze the file at `entry`. Only unreadable inputs are errors;
    /// everything else is recorded in the returned [`Analysis`].
    pub fn run(&self, entry: &Path) -> anyhow::Result<Analysis> {
        let analysis = scan::scan_file(entry)?;
        self.finish(analysis)
    }

    /// Analyze already loaded source text.
    pub fn run_source(&self, entry: &Path, content: &str) -> anyhow::Result<Analysis> {
        self.finish(scan::scan_source(entry, content))
    }

    fn finish(&self, mut analysis: Analysis) -> anyhow::Result<Analysis> {
        self.versions.collect(&mut analysis)?;

        if let Some(metadata) = self.metadata {
            resolve_dependencies(&mut analysis, metadata);
        }

        if let Some(sources) = self.sources {
            self.retrieve_sources(&mut analysis, sources);
        }

        if let Some(analyzer) = self.analyzer {
            cross_reference(&mut analysis, analyzer);
        }

        if !analysis.errors.is_empty() {
            log::info!("finished with {} isolated errors", analysis.errors.len());
        }
        Ok(analysis)
    }

    /// Retrieve the sources of every pinned third-party module with usages
    /// and locate the definitions of those usages.
    fn retrieve_sources(&self, analysis: &mut Analysis, sources: &dyn SourceProvider) {
        let mut retrieved: HashMap<PackageRef, Option<PathBuf>> = HashMap::new();

        for idx in 0..analysis.modules.len() {
            let module = &analysis.modules[idx];
            if module.stdlib || module.usages.is_empty() {
                continue;
            }
            let Some(version) = module.version.exact() else {
                continue;
            };
            let package = PackageRef::new(module.index_name(), version);

            let root = match retrieved.get(&package) {
                Some(root) => root.clone(),
                None => {
                    let root = match sources.retrieve(&package) {
                        Ok(root) => Some(root),
                        Err(e) => {
                            analysis.record_error(Stage::Source, &package.to_string(), e.to_string());
                            None
                        }
                    };
                    retrieved.insert(package.clone(), root.clone());
                    root
                }
            };
            let Some(root) = root else { continue };

            let module = &mut analysis.modules[idx];
            let scanned = locate_definitions(&root, &mut module.usages, &self.locate);
            module.source_root = Some(root.clone());
            if scanned == 0 {
                let message = format!(
                    "no .{} files under {}",
                    self.locate.suffix,
                    root.display()
                );
                analysis.record_error(Stage::Locate, &package.to_string(), message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::collect_versions;
    use crate::source::SourceError;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    struct Inline(&'static str);

    impl VersionSource for Inline {
        fn collect(&self, analysis: &mut Analysis) -> anyhow::Result<()> {
            collect_versions(self.0, analysis);
            Ok(())
        }
    }

    struct LocalSources {
        root: PathBuf,
        calls: RefCell<Vec<PackageRef>>,
    }

    impl SourceProvider for LocalSources {
        fn retrieve(&self, package: &PackageRef) -> Result<PathBuf, SourceError> {
            self.calls.borrow_mut().push(package.clone());
            if package.name == "ghost" {
                return Err(SourceError::NoArchive(package.to_string()));
            }
            Ok(self.root.clone())
        }
    }

    #[test]
    fn test_offline_scan() {
        let versions = Inline("math==0\n");
        let engine = Engine::new(&versions);
        let analysis = engine
            .run_source(Path::new("main.py"), "import math\nprint(math.sqrt(4))\n")
            .unwrap();

        assert_eq!(analysis.modules.len(), 1);
        let math = &analysis.modules[0];
        assert_eq!(math.name, "math");
        assert_eq!(math.version.exact(), Some("0"));
        assert_eq!(math.usages.len(), 1);
        assert_eq!(math.usages[0].symbol, "sqrt");
    }

    #[test]
    fn test_sources_retrieved_once_per_release() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("api.py"), "def get(url):\n    pass\n").unwrap();
        let sources = LocalSources {
            root: temp.path().to_path_buf(),
            calls: RefCell::new(Vec::new()),
        };
        let versions = Inline("requests==2.31.0\nghost==1.0\n");
        let engine = Engine::new(&versions).with_sources(&sources);

        let source = "\
import requests
import requests as rq
import ghost
import os
requests.get(1)
rq.get(2)
ghost.boo()
os.getcwd()
";
        let analysis = engine.run_source(Path::new("main.py"), source).unwrap();

        assert_eq!(
            *sources.calls.borrow(),
            vec![PackageRef::new("requests", "2.31.0"), PackageRef::new("ghost", "1.0")]
        );
        let requests = &analysis.modules[0];
        assert_eq!(requests.source_root.as_deref(), Some(temp.path()));
        assert_eq!(requests.usages[0].paths, vec![temp.path().join("api.py")]);
        assert_eq!(analysis.modules[1].usages[0].paths.len(), 1);

        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].stage, Stage::Source);
        assert_eq!(analysis.errors[0].module, "ghost==1.0");
    }

    #[test]
    fn test_empty_source_tree_is_a_locate_error() {
        let temp = TempDir::new().unwrap();
        let sources = LocalSources {
            root: temp.path().to_path_buf(),
            calls: RefCell::new(Vec::new()),
        };
        let versions = Inline("demo==1.0\n");
        let engine = Engine::new(&versions).with_sources(&sources);
        let analysis = engine
            .run_source(Path::new("main.py"), "import demo\ndemo.run()\n")
            .unwrap();
        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].stage, Stage::Locate);
    }

    #[test]
    fn test_unreadable_entry_is_fatal() {
        let temp = TempDir::new().unwrap();
        let versions = Inline("");
        let engine = Engine::new(&versions);
        assert!(engine.run(&temp.path().join("missing.py")).is_err());
    }
}
