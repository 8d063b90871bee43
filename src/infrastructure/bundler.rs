// Pass-through bundling engine
// Runs the load hook chain over every module and emits one .js file per
// module at its chunk path. Transpilation, minification and chunk
// splitting stay behind the Bundler trait.

use async_trait::async_trait;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::interfaces::{BundleOutcome, BundleRequest, Bundler, FileSystemService};
use crate::core::manifest;
use crate::core::models::OutputFile;
use crate::core::plugin::LoadHookRegistry;
use crate::utils::{Logger, Result};

pub struct PassthroughBundler {
    fs: Arc<dyn FileSystemService>,
}

impl PassthroughBundler {
    pub fn new(fs: Arc<dyn FileSystemService>) -> Self {
        Self { fs }
    }

    async fn emit_module(
        &self,
        request: &BundleRequest,
        hooks: &LoadHookRegistry,
        module: &Path,
    ) -> Result<OutputFile> {
        let source = self.fs.read_file(module).await?;
        let code = hooks.load(module, source).await?;

        let target = output_path(&request.out_dir, &request.root, module);
        self.fs.write_file(&target, &code).await?;

        Ok(OutputFile {
            path: target,
            size: code.len(),
            content: code,
        })
    }
}

/// Where a module lands in the output directory: its chunk path, rooted
/// at the direction's out dir.
fn output_path(out_dir: &Path, root: &Path, module: &Path) -> PathBuf {
    let chunk = manifest::chunk_path(root, module);
    out_dir.join(chunk.trim_start_matches('/'))
}

#[async_trait]
impl Bundler for PassthroughBundler {
    async fn bundle(
        &self,
        request: BundleRequest,
        hooks: &LoadHookRegistry,
    ) -> Result<BundleOutcome> {
        Logger::debug(&format!(
            "Emitting {} bundle: {} modules through {} hooks -> {}",
            request.side.as_str(),
            request.modules.len(),
            hooks.hook_count(),
            request.out_dir.display()
        ));

        let emits = request
            .modules
            .iter()
            .map(|module| self.emit_module(&request, hooks, module));
        let outputs = join_all(emits)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let entry_outputs = request
            .entrypoints
            .iter()
            .map(|entry| {
                (
                    entry.clone(),
                    output_path(&request.out_dir, &request.root, entry),
                )
            })
            .collect();

        Ok(BundleOutcome {
            outputs,
            entry_outputs,
        })
    }
}
