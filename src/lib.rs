//! Pyreach - static dependency reachability analysis for Python.
//!
//! Given one entry file and a pinned requirements file, pyreach finds the
//! modules the file imports and the symbols it uses from them, resolves
//! each pinned package's declared dependencies on the package index, and
//! delegates to an external per-function analyzer to confirm which of
//! those dependencies the used functions actually reach.
//!
//! # Architecture
//!
//! Each stage takes the [`Analysis`] context, mutates it and hands it on:
//!
//! - `scan`: import, alias and usage scanning of the entry file
//! - `resolve`: manifest versions, constraint parsing, dependency metadata
//! - `registry`: PyPI client with a metadata cache
//! - `source`: sdist retrieval and definition lookup
//! - `xref`: external analyzer invocation and dependency confirmation
//! - `engine`: the pipeline, with injectable strategies per stage
//! - `config`: YAML configuration schema
//! - `report`: output formatting (text, JSON)

pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod model;
pub mod registry;
pub mod report;
pub mod resolve;
pub mod scan;
pub mod source;
pub mod xref;

pub use config::Config;
pub use context::Analysis;
pub use engine::Engine;
pub use model::{Confirmation, ModuleRecord, Usage, VersionSpec};
pub use registry::{PypiIndex, RegistryClient};
