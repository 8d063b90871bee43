use crate::core::models::*;
use crate::core::plugin::LoadHookRegistry;
use crate::utils::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File system operations interface
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<String>;
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;
    async fn create_directory(&self, path: &Path) -> Result<()>;
    async fn remove_directory(&self, path: &Path) -> Result<()>;
    async fn copy_directory(&self, from: &Path, to: &Path) -> Result<usize>;
    fn file_exists(&self, path: &Path) -> bool;
    fn dir_exists(&self, path: &Path) -> bool;
}

/// Import specifier resolution interface. `None` is a soft failure:
/// callers log and drop the edge.
pub trait ImportResolverService: Send + Sync {
    fn resolve(&self, specifier: &str, importer_dir: &Path) -> Option<PathBuf>;
}

/// What a bundling engine is asked to produce for one direction.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub side: CrawlSide,
    pub root: PathBuf,
    pub out_dir: PathBuf,
    pub modules: Vec<PathBuf>,
    pub entrypoints: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct BundleOutcome {
    pub outputs: Vec<OutputFile>,
    /// Output path per requested entrypoint
    pub entry_outputs: std::collections::BTreeMap<PathBuf, PathBuf>,
}

/// Bundling engine seam. Transpilation, minification and chunk splitting
/// live behind this trait, not in this crate.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, request: BundleRequest, hooks: &LoadHookRegistry) -> Result<BundleOutcome>;
}

/// Build service interface
#[async_trait]
pub trait BuildService: Send + Sync {
    async fn build(&self, config: &BuildConfig) -> Result<BuildResult>;
}
