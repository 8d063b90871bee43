use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::utils::{DuplexError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_pages_dir")]
    pub pages_dir: PathBuf,
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
    #[serde(default = "default_outdir")]
    pub outdir: PathBuf,
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Import specifiers the crawler never follows
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Optional client runtime entry module, bundled into the client
    /// output alongside discovered client components
    #[serde(default)]
    pub client_entry: Option<PathBuf>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_pages_dir() -> PathBuf {
    PathBuf::from("pages")
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_outdir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_mode() -> String {
    "production".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            pages_dir: default_pages_dir(),
            public_dir: default_public_dir(),
            outdir: default_outdir(),
            mode: default_mode(),
            ignore: Vec::new(),
            client_entry: None,
        }
    }
}

impl BuildConfig {
    /// Load `duplex.config.json` from the project root, falling back to
    /// defaults when the file is absent. CLI flags override loaded values.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join("duplex.config.json");
        if !config_path.exists() {
            let mut config = Self::default();
            config.root = root.to_path_buf();
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let mut config: BuildConfig = serde_json::from_str(&content)
            .map_err(|e| DuplexError::config(format!("invalid duplex.config.json: {}", e)))?;
        config.root = root.to_path_buf();
        Ok(config)
    }
}

/// Runtime boundary a module opts into via its leading directive.
/// Decided once per module and carried as data from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    Neutral,
    ClientBound,
    ServerBound,
}

impl Boundary {
    pub fn is_client_bound(&self) -> bool {
        matches!(self, Boundary::ClientBound)
    }

    pub fn is_server_bound(&self) -> bool {
        matches!(self, Boundary::ServerBound)
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Boundary::Neutral
    }
}

/// Which bundle's graph is being gathered or emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlSide {
    Client,
    Server,
}

impl CrawlSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlSide::Client => "client",
            CrawlSide::Server => "server",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Static,
    Style,
}

impl ImportKind {
    pub fn of(specifier: &str) -> Self {
        let trimmed = match specifier.find(|c| c == '?' || c == '#') {
            Some(idx) => &specifier[..idx],
            None => specifier,
        };
        if trimmed.ends_with(".css") || trimmed.ends_with(".scss") || trimmed.ends_with(".sass") {
            ImportKind::Style
        } else {
            ImportKind::Static
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub specifier: String,
    pub kind: ImportKind,
}

impl ImportRecord {
    pub fn new(specifier: String) -> Self {
        let kind = ImportKind::of(&specifier);
        Self { specifier, kind }
    }
}

/// A top-level function-like binding and whether its body opens with
/// a server directive.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub has_server_directive: bool,
}

/// An exported function binding, with the byte offset just past its export
/// statement where a registration call can be spliced in.
#[derive(Debug, Clone)]
pub struct ExportedFunction {
    pub local_name: String,
    pub export_name: String,
    pub has_server_directive: bool,
    pub insert_offset: usize,
}

/// Everything the compiler retains about a module after one parse.
/// The syntax tree itself is arena-allocated and dropped with the visit.
#[derive(Debug, Clone, Default)]
pub struct ModuleFacts {
    pub boundary: Boundary,
    pub exports: Vec<String>,
    pub imports: Vec<ImportRecord>,
    pub functions: Vec<FunctionInfo>,
    pub exported_functions: Vec<ExportedFunction>,
    /// Module already imports a reference runtime; rewriting it again
    /// would double-register
    pub has_reference_import: bool,
}

impl ModuleFacts {
    /// A client-bound module declaring server functions has no coherent
    /// bundle placement. Reported, never guessed at.
    pub fn is_ambiguous(&self) -> bool {
        self.boundary.is_client_bound() && self.functions.iter().any(|f| f.has_server_directive)
    }

    pub fn server_functions(&self) -> impl Iterator<Item = &ExportedFunction> {
        let register_all = self.boundary.is_server_bound();
        self.exported_functions
            .iter()
            .filter(move |f| register_all || f.has_server_directive)
    }
}

/// Per-path crawl product. Created once per distinct path per crawl and
/// discarded when the crawl returns.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub path: PathBuf,
    pub source: String,
    pub facts: ModuleFacts,
}

/// A module that crossed the boundary, with the exported names the
/// manifests will need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryModule {
    pub path: PathBuf,
    pub exports: Vec<String>,
}

/// What a crawl hands back. All collections are sorted so downstream
/// output is stable regardless of traversal interleaving.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub boundary_modules: Vec<BoundaryModule>,
    pub visited: Vec<PathBuf>,
    pub stylesheets: BTreeMap<PathBuf, Vec<PathBuf>>,
    pub truncation_warnings: usize,
}

#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
    pub content: String,
    pub size: usize,
}

#[derive(Debug, Default)]
pub struct BuildResult {
    pub server_outputs: Vec<OutputFile>,
    pub client_outputs: Vec<OutputFile>,
    /// Output path per requested entrypoint, pages and client entries alike
    pub outputs_by_entry: BTreeMap<PathBuf, PathBuf>,
    pub stylesheets: BTreeMap<PathBuf, Vec<PathBuf>>,
    pub client_references: usize,
    pub server_references: usize,
    pub build_time: std::time::Duration,
    pub success: bool,
    pub errors: Vec<String>,
}
