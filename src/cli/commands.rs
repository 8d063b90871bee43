use crate::core::{interfaces::*, models::*, services::*};
use crate::infrastructure::{
    DependencyCrawler, NodeImportResolver, PassthroughBundler, TokioFileSystemService,
};
use crate::utils::{DuplexError, Logger, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "duplex")]
#[command(about = "Duplex - server/client boundary compiler for React Server Components")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build both bundle directions and the reference manifests
    Build(BuildArgs),
    /// Crawl the import graph from explicit entrypoints and report findings
    Crawl {
        /// Entry module paths
        #[arg(required = true)]
        entries: Vec<String>,
        /// Root directory
        #[arg(short, long, default_value = ".")]
        root: String,
        /// Graph side to gather: client or server
        #[arg(short, long, default_value = "client")]
        side: String,
    },
    /// Show compiler information
    Info,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Root directory
    #[arg(short, long, default_value = ".")]
    pub root: String,
    /// Output directory (overrides duplex.config.json)
    #[arg(short, long)]
    pub outdir: Option<String>,
    /// Pages directory holding the entrypoints
    #[arg(long)]
    pub pages: Option<String>,
    /// Public assets directory copied into the client output
    #[arg(long)]
    pub public: Option<String>,
    /// Client runtime entry module
    #[arg(long)]
    pub client_entry: Option<String>,
    /// Build mode: production or development
    #[arg(short, long)]
    pub mode: Option<String>,
    /// Import specifier the crawler never follows (repeatable)
    #[arg(long)]
    pub ignore: Vec<String>,
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> Result<()> {
        // Initialize logging
        Logger::init();

        let cli = Cli::parse();

        match cli.command {
            Commands::Build(args) => self.handle_build_command(args).await,
            Commands::Crawl {
                entries,
                root,
                side,
            } => self.handle_crawl_command(&entries, &root, &side).await,
            Commands::Info => self.handle_info_command().await,
        }
    }

    async fn handle_build_command(&self, args: BuildArgs) -> Result<()> {
        // Flags override whatever duplex.config.json provided
        let mut config = BuildConfig::load_or_default(Path::new(&args.root))?;
        if let Some(outdir) = args.outdir {
            config.outdir = PathBuf::from(outdir);
        }
        if let Some(pages) = args.pages {
            config.pages_dir = PathBuf::from(pages);
        }
        if let Some(public) = args.public {
            config.public_dir = PathBuf::from(public);
        }
        if let Some(entry) = args.client_entry {
            config.client_entry = Some(PathBuf::from(entry));
        }
        if let Some(mode) = args.mode {
            config.mode = mode;
        }
        if !args.ignore.is_empty() {
            config.ignore = args.ignore;
        }

        let resolver_root = config
            .root
            .canonicalize()
            .unwrap_or_else(|_| config.root.clone());

        // Create services
        let fs: Arc<dyn FileSystemService> = Arc::new(TokioFileSystemService);
        let resolver: Arc<dyn ImportResolverService> =
            Arc::new(NodeImportResolver::new(resolver_root));
        let bundler: Arc<dyn Bundler> = Arc::new(PassthroughBundler::new(Arc::clone(&fs)));

        let build_service = DuplexBuildService::new(fs, resolver, bundler);
        let result = build_service.build(&config).await?;

        if !result.success {
            for error in &result.errors {
                Logger::error(error);
            }
        }

        Ok(())
    }

    async fn handle_crawl_command(&self, entries: &[String], root: &str, side: &str) -> Result<()> {
        let side = match side {
            "client" => CrawlSide::Client,
            "server" => CrawlSide::Server,
            other => {
                return Err(DuplexError::config(format!(
                    "unknown crawl side '{}', expected client or server",
                    other
                )))
            }
        };

        let root_path = Path::new(root)
            .canonicalize()
            .map_err(|_| DuplexError::FileNotFound(format!("root {}", root)))?;
        let entrypoints: Vec<PathBuf> = entries
            .iter()
            .map(|entry| {
                let path = Path::new(entry);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    root_path.join(path)
                }
            })
            .collect();

        let fs: Arc<dyn FileSystemService> = Arc::new(TokioFileSystemService);
        let resolver: Arc<dyn ImportResolverService> =
            Arc::new(NodeImportResolver::new(root_path));
        let crawler = DependencyCrawler::new(fs, resolver, Vec::new());

        let outcome = crawler.crawl(&entrypoints, side).await?;

        for module in &outcome.boundary_modules {
            tracing::info!(
                "  • {} [{}]",
                module.path.display(),
                module.exports.join(", ")
            );
        }
        for (entry, sheets) in &outcome.stylesheets {
            tracing::info!("  🎨 {} -> {} stylesheet(s)", entry.display(), sheets.len());
        }
        if outcome.truncation_warnings > 0 {
            Logger::warn("Crawl hit the depth ceiling; results may be incomplete");
        }

        Ok(())
    }

    async fn handle_info_command(&self) -> Result<()> {
        tracing::info!("🦀 Duplex v0.2.0");
        tracing::info!("══════════════════════════════════════");
        tracing::info!("⇄ Server/client boundary compiler for React Server Components");
        tracing::info!("");
        tracing::info!("🏗️  Architecture:");
        tracing::info!("  • oxc parser for directive and import scanning");
        tracing::info!("  • Depth-bounded dependency crawler with memoized resolution");
        tracing::info!("  • Reference passes emitting registerClientReference / registerServerReference stubs");
        tracing::info!("  • Append-only reference manifests persisted as JSON");
        tracing::info!("");
        tracing::info!("🎯 Commands:");
        tracing::info!("  • duplex build — emit both bundle directions and the manifests");
        tracing::info!("  • duplex crawl — inspect a dependency crawl without building");
        tracing::info!("");
        tracing::info!("🔗 Links:");
        tracing::info!("  • GitHub: https://github.com/duplex-build/duplex");

        Ok(())
    }
}
