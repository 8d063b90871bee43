// Load hook system for the bundling pipeline
// Hooks intercept module source by path filter, in registration order

use crate::utils::{Logger, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

/// A source transform applied while a bundle direction is being emitted.
///
/// Hooks run in registration order; each hook receives the output of the
/// previous one. A hook only sees paths its filter matches.
#[async_trait]
pub trait LoadHook: Send + Sync {
    /// Unique name for this hook
    fn name(&self) -> &str;

    /// Path filter deciding which modules this hook loads
    fn filter(&self) -> &Regex;

    /// Transform module source.
    ///
    /// Return Some(new_source) to replace the content, or None to leave
    /// it unchanged.
    async fn load(&self, path: &Path, source: &str) -> Result<Option<String>>;
}

/// Manages hook registration and execution for one bundle direction
pub struct LoadHookRegistry {
    hooks: Vec<Arc<dyn LoadHook>>,
}

impl LoadHookRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Register a hook
    pub fn register(&mut self, hook: Arc<dyn LoadHook>) {
        Logger::debug(&format!("Registered load hook: {}", hook.name()));
        self.hooks.push(hook);
    }

    /// Get number of registered hooks
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Run every matching hook over the source, in registration order.
    /// Each hook receives the output of the previous hook.
    pub async fn load(&self, path: &Path, source: String) -> Result<String> {
        let mut code = source;
        let path_str = path.to_string_lossy().to_string();

        for hook in &self.hooks {
            if !hook.filter().is_match(&path_str) {
                continue;
            }
            if let Some(transformed) = hook.load(path, &code).await? {
                code = transformed;
            }
        }

        Ok(code)
    }
}

impl Default for LoadHookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
