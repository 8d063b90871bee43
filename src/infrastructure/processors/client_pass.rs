// Client-direction reference pass
// Server-directive modules become callable stubs that route through the
// transport; their implementations never reach the client bundle

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

use crate::core::manifest::ServerReferenceIndex;
use crate::core::plugin::LoadHook;
use crate::infrastructure::processors::module_scanner::scan_module;
use crate::infrastructure::processors::statements::{render_module, BuiltStatement};
use crate::infrastructure::processors::{
    CALL_SERVER_RUNTIME, CLIENT_REFERENCE_RUNTIME, MODULE_FILTER,
};
use crate::utils::{Logger, Result};

/// Rewrites modules for the client bundle.
///
/// Only module-level `"use server"` modules change; ids come from the
/// index the server pass recorded, so both bundles name the same
/// references. A server module the server pass never saw cannot be
/// stubbed correctly, so its body is elided and the miss reported.
pub struct ClientReferencePass {
    server_index: Arc<ServerReferenceIndex>,
}

impl ClientReferencePass {
    pub fn new(server_index: Arc<ServerReferenceIndex>) -> Self {
        Self { server_index }
    }

    fn build_stub_module(&self, module_id: &str, export_names: &[String]) -> String {
        let mut statements = vec![
            BuiltStatement::NamedImport {
                binding: "createServerReference".into(),
                source: CLIENT_REFERENCE_RUNTIME.into(),
            },
            BuiltStatement::NamedImport {
                binding: "callServer".into(),
                source: CALL_SERVER_RUNTIME.into(),
            },
        ];

        for export_name in export_names {
            statements.push(BuiltStatement::ServerStub {
                export_name: export_name.clone(),
                reference_id: format!("{}#{}", module_id, export_name),
            });
        }

        render_module(&statements)
    }
}

#[async_trait]
impl LoadHook for ClientReferencePass {
    fn name(&self) -> &str {
        "client-references"
    }

    fn filter(&self) -> &Regex {
        &MODULE_FILTER
    }

    async fn load(&self, path: &Path, source: &str) -> Result<Option<String>> {
        let facts = scan_module(path, source)?;

        if facts.has_reference_import {
            return Ok(None);
        }

        if !facts.boundary.is_server_bound() {
            return Ok(None);
        }

        match self.server_index.lookup(path) {
            Some(refs) => {
                Logger::rewriting_module(&path.display().to_string(), "server action stubs");
                Ok(Some(
                    self.build_stub_module(&refs.module_id, &refs.export_names),
                ))
            }
            None => {
                Logger::error(&format!(
                    "No server reference metadata for {}; eliding its body from the client bundle",
                    path.display()
                ));
                Ok(Some(String::new()))
            }
        }
    }
}
