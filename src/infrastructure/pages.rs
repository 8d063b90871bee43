use std::path::{Path, PathBuf};
use tokio::fs;

use crate::utils::{DuplexError, Logger, Result};

/// Directory nesting past the pages root before a subtree is skipped
pub const MAX_PAGES_DEPTH: u32 = 10;

const PAGE_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js"];

/// Collects page modules under the pages directory. Every page is a bundle
/// entrypoint; dynamic-segment names like `[slug].tsx` are collected like
/// any other file. The result is sorted so entrypoint order is stable.
pub struct PageScanner;

impl PageScanner {
    pub async fn collect_entrypoints(&self, pages_dir: &Path) -> Result<Vec<PathBuf>> {
        if !pages_dir.is_dir() {
            return Err(DuplexError::FileNotFound(format!(
                "pages directory {}",
                pages_dir.display()
            )));
        }

        let mut pages = Vec::new();
        let mut pending = vec![(pages_dir.to_path_buf(), 0u32)];
        let mut warned = false;

        while let Some((dir, depth)) = pending.pop() {
            if depth > MAX_PAGES_DEPTH {
                if !warned {
                    Logger::warn(&format!(
                        "Pages directory nests deeper than {} levels; skipping the rest",
                        MAX_PAGES_DEPTH
                    ));
                    warned = true;
                }
                continue;
            }

            let mut entries = fs::read_dir(&dir).await.map_err(DuplexError::Io)?;
            while let Some(entry) = entries.next_entry().await.map_err(DuplexError::Io)? {
                let path = entry.path();
                if path.is_dir() {
                    pending.push((path, depth + 1));
                } else if is_page(&path) {
                    pages.push(path);
                }
            }
        }

        pages.sort();
        Ok(pages)
    }
}

fn is_page(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| PAGE_EXTENSIONS.contains(&ext))
}
