use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::interfaces::{FileSystemService, ImportResolverService};
use crate::core::models::{BoundaryModule, CrawlOutcome, CrawlSide, ImportKind, ModuleRecord};
use crate::infrastructure::processors::scan_module;
use crate::infrastructure::resolver::NodeImportResolver;
use crate::utils::{Logger, Result, Timer};

/// Levels past the entrypoints before a branch is truncated
pub const MAX_CRAWL_DEPTH: u32 = 25;

/// Walks the static import graph breadth-first from a set of entrypoints.
/// One crawl per bundle side; modules at each level are visited
/// concurrently.
pub struct DependencyCrawler {
    fs: Arc<dyn FileSystemService>,
    resolver: Arc<dyn ImportResolverService>,
    /// Import specifiers never followed
    ignore: HashSet<String>,
}

/// All mutable crawl state, owned by one crawl invocation. Nothing here
/// outlives `crawl`, and nothing is shared between crawls.
struct CrawlContext {
    side: CrawlSide,
    visited: DashSet<PathBuf>,
    resolution_cache: DashMap<(PathBuf, String), Option<PathBuf>>,
    boundaries: DashMap<PathBuf, Vec<String>>,
    stylesheets: DashMap<PathBuf, Vec<PathBuf>>,
    truncation_warnings: AtomicUsize,
}

impl CrawlContext {
    fn new(side: CrawlSide) -> Self {
        Self {
            side,
            visited: DashSet::new(),
            resolution_cache: DashMap::new(),
            boundaries: DashMap::new(),
            stylesheets: DashMap::new(),
            truncation_warnings: AtomicUsize::new(0),
        }
    }

    fn into_outcome(self) -> CrawlOutcome {
        let mut boundary_modules: Vec<BoundaryModule> = self
            .boundaries
            .into_iter()
            .map(|(path, exports)| BoundaryModule { path, exports })
            .collect();
        boundary_modules.sort_by(|a, b| a.path.cmp(&b.path));

        let mut visited: Vec<PathBuf> = self.visited.into_iter().collect();
        visited.sort();

        let stylesheets = self
            .stylesheets
            .into_iter()
            .map(|(origin, mut sheets)| {
                sheets.sort();
                sheets.dedup();
                (origin, sheets)
            })
            .collect();

        CrawlOutcome {
            boundary_modules,
            visited,
            stylesheets,
            truncation_warnings: self.truncation_warnings.load(Ordering::Relaxed),
        }
    }
}

/// A pending module visit; the originating entrypoint travels with it so
/// discoveries can be attributed
struct WorkItem {
    origin: PathBuf,
    path: PathBuf,
}

impl DependencyCrawler {
    pub fn new(
        fs: Arc<dyn FileSystemService>,
        resolver: Arc<dyn ImportResolverService>,
        ignore: Vec<String>,
    ) -> Self {
        Self {
            fs,
            resolver,
            ignore: ignore.into_iter().collect(),
        }
    }

    pub async fn crawl(&self, entrypoints: &[PathBuf], side: CrawlSide) -> Result<CrawlOutcome> {
        let _timer = Timer::start(&format!("{} crawl", side.as_str()));
        Logger::crawl_start(side.as_str(), entrypoints.len());

        let ctx = CrawlContext::new(side);

        let mut frontier: Vec<WorkItem> = Vec::new();
        for entry in entrypoints {
            match entry.canonicalize() {
                Ok(path) => frontier.push(WorkItem {
                    origin: path.clone(),
                    path,
                }),
                Err(e) => {
                    Logger::warn(&format!(
                        "Skipping entrypoint {}: {}",
                        entry.display(),
                        e
                    ));
                }
            }
        }

        let mut depth = 0u32;
        while !frontier.is_empty() {
            if depth > MAX_CRAWL_DEPTH {
                ctx.truncation_warnings.fetch_add(1, Ordering::Relaxed);
                Logger::warn(&format!(
                    "Dependency graph exceeded {} levels; returning early. Too many levels of dependency.",
                    MAX_CRAWL_DEPTH
                ));
                break;
            }

            let visits = frontier.into_iter().map(|item| self.visit(&ctx, item));
            let discovered = join_all(visits).await;

            frontier = discovered.into_iter().flatten().collect();
            depth += 1;
        }

        let outcome = ctx.into_outcome();
        Logger::crawl_complete(
            side.as_str(),
            outcome.visited.len(),
            outcome.boundary_modules.len(),
        );
        Ok(outcome)
    }

    /// Visit one module: read, scan, record its boundary, and return the
    /// imports worth following. Failures here are soft.
    async fn visit(&self, ctx: &CrawlContext, item: WorkItem) -> Vec<WorkItem> {
        // Claim before any work; a path is visited at most once per crawl
        if !ctx.visited.insert(item.path.clone()) {
            return Vec::new();
        }

        Logger::visiting_module(&item.path.to_string_lossy());

        let source = match self.fs.read_file(&item.path).await {
            Ok(source) => source,
            Err(e) => {
                Logger::warn(&format!("Failed to read {}: {}", item.path.display(), e));
                return Vec::new();
            }
        };

        let scan_path = item.path.clone();
        let record = match tokio::task::spawn_blocking(move || {
            scan_module(&scan_path, &source).map(|facts| ModuleRecord {
                path: scan_path.clone(),
                source,
                facts,
            })
        })
        .await
        {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                Logger::warn(&format!(
                    "Skipping unparseable module {}: {}",
                    item.path.display(),
                    e
                ));
                return Vec::new();
            }
            Err(e) => {
                Logger::error(&format!("Scan task failed for {}: {}", item.path.display(), e));
                return Vec::new();
            }
        };

        let facts = record.facts;

        if facts.is_ambiguous() {
            Logger::error(&format!(
                "{} is marked 'use client' but declares 'use server' functions",
                item.path.display()
            ));
        }

        let collect_boundary = match ctx.side {
            CrawlSide::Client => facts.boundary.is_client_bound(),
            CrawlSide::Server => facts.boundary.is_server_bound(),
        };
        if collect_boundary {
            if ctx.side == CrawlSide::Client {
                Logger::client_component_found(&item.path.to_string_lossy());
            }
            ctx.boundaries
                .insert(item.path.clone(), facts.exports.clone());
        }

        let importer_dir = match item.path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => return Vec::new(),
        };

        let mut children = Vec::new();
        for import in &facts.imports {
            if self.ignore.contains(&import.specifier) {
                Logger::debug(&format!("Ignoring import '{}'", import.specifier));
                continue;
            }

            // Style sheets are collected for the originating entrypoint,
            // never recursed into
            if import.kind == ImportKind::Style {
                match self.resolve_cached(ctx, &importer_dir, &import.specifier) {
                    Some(sheet) => {
                        ctx.stylesheets
                            .entry(item.origin.clone())
                            .or_default()
                            .push(sheet);
                    }
                    None => Logger::warn(&format!(
                        "Failed to resolve style sheet '{}' from {}",
                        import.specifier,
                        importer_dir.display()
                    )),
                }
                continue;
            }

            // Packages are the client bundler's concern on the client side
            if ctx.side == CrawlSide::Client
                && NodeImportResolver::is_bare_specifier(&import.specifier)
            {
                Logger::debug(&format!(
                    "Leaving package import '{}' external",
                    import.specifier
                ));
                continue;
            }

            match self.resolve_cached(ctx, &importer_dir, &import.specifier) {
                Some(resolved) => children.push(WorkItem {
                    origin: item.origin.clone(),
                    path: resolved,
                }),
                None => Logger::warn(&format!(
                    "Failed to resolve '{}' from {}",
                    import.specifier,
                    importer_dir.display()
                )),
            }
        }

        children
    }

    /// Resolution memoized per (importing directory, specifier); negative
    /// results are cached too so failing imports skip repeat lookups
    fn resolve_cached(
        &self,
        ctx: &CrawlContext,
        importer_dir: &Path,
        specifier: &str,
    ) -> Option<PathBuf> {
        let key = (importer_dir.to_path_buf(), specifier.to_string());
        if let Some(cached) = ctx.resolution_cache.get(&key) {
            return cached.clone();
        }

        let resolved = self
            .resolver
            .resolve(specifier, importer_dir)
            .and_then(|path| path.canonicalize().ok());
        ctx.resolution_cache.insert(key, resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::file_system::TokioFileSystemService;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn crawler_for(root: &Path) -> DependencyCrawler {
        DependencyCrawler::new(
            Arc::new(TokioFileSystemService),
            Arc::new(NodeImportResolver::new(root.to_path_buf())),
            Vec::new(),
        )
    }

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn project() -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        (dir, root)
    }

    #[tokio::test]
    async fn diamond_imports_visit_each_module_once() {
        let (_dir, root) = project();
        let entry = write(
            &root,
            "entry.ts",
            "import './left';\nimport './right';\nexport const e = 1;",
        );
        write(&root, "left.ts", "import './shared';\nexport const l = 1;");
        write(&root, "right.ts", "import './shared';\nexport const r = 1;");
        write(&root, "shared.ts", "export const s = 1;");

        let crawler = crawler_for(&root);
        let outcome = crawler.crawl(&[entry], CrawlSide::Server).await.unwrap();

        assert_eq!(outcome.visited.len(), 4);
        assert_eq!(outcome.truncation_warnings, 0);
    }

    #[tokio::test]
    async fn cyclic_imports_terminate() {
        let (_dir, root) = project();
        let entry = write(&root, "a.ts", "import './b';\nexport const a = 1;");
        write(&root, "b.ts", "import './a';\nexport const b = 1;");

        let crawler = crawler_for(&root);
        let outcome = crawler.crawl(&[entry], CrawlSide::Server).await.unwrap();

        assert_eq!(outcome.visited.len(), 2);
    }

    #[tokio::test]
    async fn deep_chains_truncate_with_a_single_warning() {
        let (_dir, root) = project();
        for i in 0..30 {
            let content = if i < 29 {
                format!("import './m{}';\nexport const x{} = 1;", i + 1, i)
            } else {
                format!("export const x{} = 1;", i)
            };
            write(&root, &format!("m{}.ts", i), &content);
        }
        let entry = root.join("m0.ts");

        let crawler = crawler_for(&root);
        let outcome = crawler.crawl(&[entry], CrawlSide::Server).await.unwrap();

        // Levels 0 through 25 inclusive are visited, the rest truncated
        assert_eq!(outcome.visited.len(), 26);
        assert_eq!(outcome.truncation_warnings, 1);
    }

    #[tokio::test]
    async fn client_side_collects_client_components() {
        let (_dir, root) = project();
        let entry = write(
            &root,
            "pages/about.tsx",
            "import Button from '../components/Button';\nexport default function About() { return null; }",
        );
        let button = write(
            &root,
            "components/Button.tsx",
            "'use client';\nexport default function Button() { return null; }\nexport const Variant = 1;",
        );

        let crawler = crawler_for(&root);
        let outcome = crawler.crawl(&[entry], CrawlSide::Client).await.unwrap();

        assert_eq!(outcome.boundary_modules.len(), 1);
        let module = &outcome.boundary_modules[0];
        assert_eq!(module.path, button.canonicalize().unwrap());
        assert_eq!(module.exports, vec!["default", "Variant"]);
    }

    #[tokio::test]
    async fn style_imports_divert_to_the_entrypoint_channel() {
        let (_dir, root) = project();
        let entry = write(
            &root,
            "pages/home.tsx",
            "import './home.css';\nimport Card from '../components/Card';\nexport default function Home() { return null; }",
        );
        write(&root, "pages/home.css", "body {}");
        write(
            &root,
            "components/Card.tsx",
            "import './card.scss';\nexport default function Card() { return null; }",
        );
        write(&root, "components/card.scss", ".card {}");

        let crawler = crawler_for(&root);
        let outcome = crawler.crawl(&[entry.clone()], CrawlSide::Client).await.unwrap();

        let entry_key = entry.canonicalize().unwrap();
        let sheets = outcome.stylesheets.get(&entry_key).unwrap();
        assert_eq!(sheets.len(), 2);
        assert!(sheets.iter().all(|s| s.extension().is_some()));
        // Style sheets are never visited as modules
        assert!(outcome.visited.iter().all(|v| {
            let ext = v.extension().unwrap_or_default();
            ext != "css" && ext != "scss"
        }));
    }

    #[tokio::test]
    async fn client_side_leaves_bare_specifiers_external() {
        let (_dir, root) = project();
        write(
            &root,
            "node_modules/react/package.json",
            r#"{ "name": "react", "main": "index.js" }"#,
        );
        write(&root, "node_modules/react/index.js", "module.exports = {};");
        let entry = write(
            &root,
            "entry.tsx",
            "import React from 'react';\nimport './local';\nexport default 1;",
        );
        write(&root, "local.ts", "export const x = 1;");

        let crawler = crawler_for(&root);

        let client = crawler.crawl(&[entry.clone()], CrawlSide::Client).await.unwrap();
        assert_eq!(client.visited.len(), 2);

        let server = crawler.crawl(&[entry], CrawlSide::Server).await.unwrap();
        assert_eq!(server.visited.len(), 3);
    }

    #[tokio::test]
    async fn ignored_specifiers_are_never_followed() {
        let (_dir, root) = project();
        let entry = write(
            &root,
            "entry.ts",
            "import './skipme';\nimport './keep';\nexport const e = 1;",
        );
        write(&root, "skipme.ts", "export const s = 1;");
        write(&root, "keep.ts", "export const k = 1;");

        let crawler = DependencyCrawler::new(
            Arc::new(TokioFileSystemService),
            Arc::new(NodeImportResolver::new(root.clone())),
            vec!["./skipme".to_string()],
        );
        let outcome = crawler.crawl(&[entry], CrawlSide::Server).await.unwrap();

        assert_eq!(outcome.visited.len(), 2);
    }

    #[tokio::test]
    async fn unresolvable_imports_are_dropped_softly() {
        let (_dir, root) = project();
        let entry = write(
            &root,
            "entry.ts",
            "import './ghost';\nexport const e = 1;",
        );

        let crawler = crawler_for(&root);
        let outcome = crawler.crawl(&[entry], CrawlSide::Server).await.unwrap();

        assert_eq!(outcome.visited.len(), 1);
    }
}
