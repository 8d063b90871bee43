use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

pub struct Logger;

impl Logger {
    pub fn init() {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("duplex=info")),
            )
            .with_target(false)
            .init();
    }

    pub fn build_start(root: &str, outdir: &str) {
        info!("🔨 Duplex - Server Components Build");
        info!("═══════════════════════════════════════");
        info!("📁 Input: {}", root);
        info!("📦 Output: {}", outdir);
    }

    pub fn scanning_pages(dir: &str) {
        info!("📁 Scanning pages in {}...", dir);
    }

    pub fn found_entrypoints(count: usize) {
        info!("📄 Found {} page entrypoints", count);
    }

    pub fn crawl_start(side: &str, entry_count: usize) {
        info!("🕸️  Crawling {} graph from {} entrypoints", side, entry_count);
    }

    pub fn crawl_complete(side: &str, visited: usize, boundaries: usize) {
        info!(
            "🕸️  {} crawl: {} modules visited, {} boundary modules",
            side, visited, boundaries
        );
    }

    pub fn visiting_module(path: &str) {
        debug!("🔍 Visiting module: {}", path);
    }

    pub fn client_component_found(path: &str) {
        debug!("🧩 Client component: {}", path);
    }

    pub fn rewriting_module(path: &str, kind: &str) {
        debug!("✒️  Rewriting {} ({})", path, kind);
    }

    pub fn manifest_written(path: &str, entries: usize) {
        info!("📜 Manifest written: {} ({} entries)", path, entries);
    }

    pub fn build_complete(
        server_count: usize,
        client_count: usize,
        build_time: std::time::Duration,
        outdir: &str,
    ) {
        info!("");
        info!("📊 Build Statistics:");
        info!("  • Server modules emitted: {}", server_count);
        info!("  • Client modules emitted: {}", client_count);
        info!("  • Build time: {:.2?}", build_time);
        info!("  • Output directory: {}", outdir);
        info!("");
        info!("✅ Build completed successfully!");
    }

    pub fn error(msg: &str) {
        error!("❌ {}", msg);
    }

    pub fn warn(msg: &str) {
        warn!("⚠️  {}", msg);
    }

    pub fn debug(msg: &str) {
        debug!("{}", msg);
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("⏱️  Completed: {} in {:.2?}", self.name, self.elapsed());
    }
}
