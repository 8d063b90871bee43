use crate::core::interfaces::*;
use crate::core::manifest::{chunk_path, ManifestEntry, ReferenceManifest, ServerReferenceIndex};
use crate::core::models::*;
use crate::core::plugin::LoadHookRegistry;
use crate::infrastructure::crawler::DependencyCrawler;
use crate::infrastructure::pages::PageScanner;
use crate::infrastructure::processors::{ClientReferencePass, ServerReferencePass};
use crate::utils::{
    CompletionStats, DuplexError, DuplexUI, Logger, OutputFileInfo, Result, Timer,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main build service implementation.
///
/// Drives the full pipeline: page discovery, the crawls, the two bundle
/// directions with their reference passes, static assets, and the
/// persisted manifests. The reference manifests are created per build and
/// shared with the passes by `Arc`, so one invocation never sees
/// another's entries.
pub struct DuplexBuildService {
    fs: Arc<dyn FileSystemService>,
    resolver: Arc<dyn ImportResolverService>,
    bundler: Arc<dyn Bundler>,
    ui: DuplexUI,
}

impl DuplexBuildService {
    pub fn new(
        fs: Arc<dyn FileSystemService>,
        resolver: Arc<dyn ImportResolverService>,
        bundler: Arc<dyn Bundler>,
    ) -> Self {
        Self {
            fs,
            resolver,
            bundler,
            ui: DuplexUI::new(),
        }
    }

    async fn prepare_out_dir(&self, out_dir: &Path) -> Result<()> {
        self.fs.remove_directory(out_dir).await?;
        self.fs.create_directory(&out_dir.join("server")).await?;
        self.fs.create_directory(&out_dir.join("client")).await?;
        Ok(())
    }

    /// Resolve the configured client entry against the project root.
    /// A missing entry is skipped with a warning, not a build failure.
    fn client_entry_path(&self, config: &BuildConfig, root: &Path) -> Option<PathBuf> {
        let entry = config.client_entry.as_ref()?;
        let candidate = if entry.is_absolute() {
            entry.clone()
        } else {
            root.join(entry)
        };
        match candidate.canonicalize() {
            Ok(path) => Some(path),
            Err(_) => {
                Logger::warn(&format!(
                    "Configured client entry {} not found; skipping",
                    candidate.display()
                ));
                None
            }
        }
    }

    async fn persist_manifest(&self, manifest: &ReferenceManifest, path: &Path) -> Result<()> {
        let json = manifest.serialize()?;
        self.fs.write_file(path, &json).await?;
        Logger::manifest_written(&path.display().to_string(), manifest.len());
        Ok(())
    }
}

#[async_trait]
impl BuildService for DuplexBuildService {
    async fn build(&self, config: &BuildConfig) -> Result<BuildResult> {
        self.ui.show_banner(&config.mode);
        let build_start = std::time::Instant::now();

        let root = config.root.canonicalize().map_err(|_| {
            DuplexError::FileNotFound(format!("project root {}", config.root.display()))
        })?;
        let out_dir = root.join(&config.outdir);
        Logger::build_start(&root.display().to_string(), &out_dir.display().to_string());
        let _timer = Timer::start("Full build");

        self.prepare_out_dir(&out_dir).await?;

        let pages_dir = root.join(&config.pages_dir);
        Logger::scanning_pages(&pages_dir.display().to_string());
        let pages = PageScanner.collect_entrypoints(&pages_dir).await?;
        Logger::found_entrypoints(pages.len());
        if pages.is_empty() {
            Logger::warn("No page entrypoints found; bundles will be empty");
        }

        let crawler = DependencyCrawler::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.resolver),
            config.ignore.clone(),
        );

        // Discover client components and stylesheets reachable from the pages
        let discovery = crawler.crawl(&pages, CrawlSide::Client).await?;

        // Everything the server bundle must contain, packages included
        let server_crawl = crawler.crawl(&pages, CrawlSide::Server).await?;

        let client_manifest = Arc::new(ReferenceManifest::new());
        let server_manifest = Arc::new(ReferenceManifest::new());
        let server_index = Arc::new(ServerReferenceIndex::new());

        // Server direction first: its pass records the reference ids the
        // client direction stubs against
        let mut server_hooks = LoadHookRegistry::new();
        server_hooks.register(Arc::new(ServerReferencePass::new(
            root.clone(),
            Arc::clone(&client_manifest),
            Arc::clone(&server_manifest),
            Arc::clone(&server_index),
        )));
        let server_outcome = self
            .bundler
            .bundle(
                BundleRequest {
                    side: CrawlSide::Server,
                    root: root.clone(),
                    out_dir: out_dir.join("server"),
                    modules: server_crawl.visited.clone(),
                    entrypoints: pages.clone(),
                },
                &server_hooks,
            )
            .await?;

        // Client direction: the configured entry plus every discovered
        // client component, crawled with client rules
        let mut client_entries: Vec<PathBuf> = Vec::new();
        if let Some(entry) = self.client_entry_path(config, &root) {
            // The runtime locates its bootstrap chunk through the manifest
            client_manifest.put(
                "client-entry".to_string(),
                ManifestEntry::for_chunk(chunk_path(&root, &entry), "default".to_string()),
            );
            client_entries.push(entry);
        }
        client_entries.extend(discovery.boundary_modules.iter().map(|m| m.path.clone()));

        let client_crawl = crawler.crawl(&client_entries, CrawlSide::Client).await?;

        let mut client_hooks = LoadHookRegistry::new();
        client_hooks.register(Arc::new(ClientReferencePass::new(Arc::clone(
            &server_index,
        ))));
        let client_outcome = self
            .bundler
            .bundle(
                BundleRequest {
                    side: CrawlSide::Client,
                    root: root.clone(),
                    out_dir: out_dir.join("client"),
                    modules: client_crawl.visited.clone(),
                    entrypoints: client_entries,
                },
                &client_hooks,
            )
            .await?;

        // Static assets ship with the client output
        let public_dir = root.join(&config.public_dir);
        if self.fs.dir_exists(&public_dir) {
            let copied = self
                .fs
                .copy_directory(&public_dir, &out_dir.join("client"))
                .await?;
            Logger::debug(&format!("Copied {} public assets", copied));
        }

        self.persist_manifest(&client_manifest, &out_dir.join("client-manifest.json"))
            .await?;
        self.persist_manifest(&server_manifest, &out_dir.join("server-manifest.json"))
            .await?;

        let mut stylesheets = discovery.stylesheets.clone();
        stylesheets.extend(client_crawl.stylesheets.clone());

        let mut outputs_by_entry = server_outcome.entry_outputs.clone();
        outputs_by_entry.extend(client_outcome.entry_outputs.clone());

        let build_time = build_start.elapsed();
        Logger::build_complete(
            server_outcome.outputs.len(),
            client_outcome.outputs.len(),
            build_time,
            &out_dir.display().to_string(),
        );

        let output_files = server_outcome
            .outputs
            .iter()
            .chain(client_outcome.outputs.iter())
            .map(|file| OutputFileInfo {
                name: file
                    .path
                    .strip_prefix(&out_dir)
                    .unwrap_or(&file.path)
                    .display()
                    .to_string(),
                size: file.size,
            })
            .collect();
        self.ui.show_completion(CompletionStats {
            out_dir: out_dir.display().to_string(),
            output_files,
            client_references: client_manifest.len(),
            server_references: server_manifest.len(),
        });

        Ok(BuildResult {
            server_outputs: server_outcome.outputs,
            client_outputs: client_outcome.outputs,
            outputs_by_entry,
            stylesheets,
            client_references: client_manifest.len(),
            server_references: server_manifest.len(),
            build_time,
            success: true,
            errors: vec![],
        })
    }
}
