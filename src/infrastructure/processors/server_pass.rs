// Server-direction reference pass
// Client-bound modules are replaced by reference stubs; server functions
// get registration calls spliced in after their declarations

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::manifest::{self, ManifestEntry, ReferenceManifest, ServerReferenceIndex};
use crate::core::models::ModuleFacts;
use crate::core::plugin::LoadHook;
use crate::infrastructure::processors::module_scanner::scan_module;
use crate::infrastructure::processors::statements::{render_module, BuiltStatement};
use crate::infrastructure::processors::{MODULE_FILTER, SERVER_REFERENCE_RUNTIME};
use crate::utils::{DuplexError, Logger, Result};

/// Rewrites modules for the server bundle.
///
/// Produces new module text from scanned facts; the input is left intact.
/// Every rewrite is recorded in the shared manifests so the client pass
/// and the persisted manifest files agree on ids.
pub struct ServerReferencePass {
    root: PathBuf,
    client_manifest: Arc<ReferenceManifest>,
    server_manifest: Arc<ReferenceManifest>,
    server_index: Arc<ServerReferenceIndex>,
}

impl ServerReferencePass {
    pub fn new(
        root: PathBuf,
        client_manifest: Arc<ReferenceManifest>,
        server_manifest: Arc<ReferenceManifest>,
        server_index: Arc<ServerReferenceIndex>,
    ) -> Self {
        Self {
            root,
            client_manifest,
            server_manifest,
            server_index,
        }
    }

    /// Replace a client-bound module with one reference stub per export.
    /// The original body never reaches the server bundle.
    fn rewrite_client_module(&self, path: &Path, facts: &ModuleFacts) -> String {
        if facts.exports.is_empty() {
            Logger::warn(&format!(
                "Client module {} has no exports; emitting an empty module",
                path.display()
            ));
            return String::new();
        }

        let chunk = manifest::chunk_path(&self.root, path);
        let mut statements = vec![
            BuiltStatement::NamedImport {
                binding: "registerClientReference".into(),
                source: SERVER_REFERENCE_RUNTIME.into(),
            },
            BuiltStatement::ClientProxyFactory,
        ];

        for export_name in &facts.exports {
            let id = manifest::reference_id(&self.root, path, export_name);
            self.client_manifest.put(
                id.clone(),
                ManifestEntry::for_chunk(chunk.clone(), export_name.clone()),
            );
            statements.push(BuiltStatement::ClientReference {
                export_name: export_name.clone(),
                reference_id: id,
            });
        }

        render_module(&statements)
    }

    /// Keep the module body and splice a registration call after each
    /// server function, then prepend the runtime import.
    fn register_server_functions(&self, path: &Path, source: &str, facts: &ModuleFacts) -> String {
        let chunk = manifest::chunk_path(&self.root, path);
        let module_id = manifest::module_id(&self.root, path);

        let mut insertions: Vec<(usize, String)> = Vec::new();
        let mut registered = Vec::new();
        for function in facts.server_functions() {
            let token = Uuid::new_v4().to_string();
            let registration = BuiltStatement::ServerRegistration {
                local_name: function.local_name.clone(),
                token,
                export_name: function.export_name.clone(),
            };
            insertions.push((function.insert_offset, registration.render()));

            let id = manifest::reference_id(&self.root, path, &function.export_name);
            self.server_manifest.put(
                id,
                ManifestEntry::for_chunk(chunk.clone(), function.export_name.clone()),
            );
            registered.push(function.export_name.clone());
        }

        self.server_index
            .record(path.to_path_buf(), module_id, registered);

        // Splice back to front so earlier offsets stay valid
        let mut output = source.to_string();
        insertions.sort_by_key(|(offset, _)| *offset);
        for (offset, statement) in insertions.iter().rev() {
            let at = (*offset).min(output.len());
            output.insert_str(at, &format!("\n{}", statement));
        }

        let import = BuiltStatement::NamedImport {
            binding: "registerServerReference".into(),
            source: SERVER_REFERENCE_RUNTIME.into(),
        };
        format!("{}\n{}", import.render(), output)
    }
}

#[async_trait]
impl LoadHook for ServerReferencePass {
    fn name(&self) -> &str {
        "server-references"
    }

    fn filter(&self) -> &Regex {
        &MODULE_FILTER
    }

    async fn load(&self, path: &Path, source: &str) -> Result<Option<String>> {
        let facts = scan_module(path, source)?;

        // Already rewritten, running again would double-register
        if facts.has_reference_import {
            return Ok(None);
        }

        if facts.is_ambiguous() {
            return Err(DuplexError::AmbiguousDirectives {
                path: path.to_path_buf(),
            });
        }

        if facts.boundary.is_client_bound() {
            Logger::client_component_found(&path.display().to_string());
            return Ok(Some(self.rewrite_client_module(path, &facts)));
        }

        if facts.server_functions().next().is_none() {
            return Ok(None);
        }

        Logger::rewriting_module(&path.display().to_string(), "server function registration");
        Ok(Some(self.register_server_functions(path, source, &facts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass() -> (
        ServerReferencePass,
        Arc<ReferenceManifest>,
        Arc<ReferenceManifest>,
        Arc<ServerReferenceIndex>,
    ) {
        let client_manifest = Arc::new(ReferenceManifest::new());
        let server_manifest = Arc::new(ReferenceManifest::new());
        let index = Arc::new(ServerReferenceIndex::new());
        let pass = ServerReferencePass::new(
            PathBuf::from("/app"),
            Arc::clone(&client_manifest),
            Arc::clone(&server_manifest),
            Arc::clone(&index),
        );
        (pass, client_manifest, server_manifest, index)
    }

    #[tokio::test]
    async fn client_modules_become_reference_stubs() {
        let (pass, client_manifest, _, _) = pass();
        let source = r#""use client";
export default function Button() { return null; }
export const Variant = () => null;
"#;

        let out = pass
            .load(Path::new("/app/components/Button.tsx"), source)
            .await
            .unwrap()
            .expect("client module should be rewritten");

        assert!(out.contains(
            "import { registerClientReference } from \"react-server-dom-webpack/server.node\";"
        ));
        assert!(out.contains("function createClientReferenceProxy(exportName)"));
        assert!(out.contains(
            "export default registerClientReference(createClientReferenceProxy(\"default\"), \"/components/Button.tsx#default\", \"default\");"
        ));
        assert!(out.contains(
            "export const Variant = registerClientReference(createClientReferenceProxy(\"Variant\"), \"/components/Button.tsx#Variant\", \"Variant\");"
        ));
        assert!(!out.contains("return null"));

        assert_eq!(client_manifest.len(), 2);
        let entry = client_manifest
            .get("/components/Button.tsx#Variant")
            .unwrap();
        assert_eq!(entry.id, "/components/Button.js");
        assert_eq!(entry.chunks, vec!["/components/Button.js"]);
        assert_eq!(entry.name, "Variant");
    }

    #[tokio::test]
    async fn client_module_without_exports_is_emptied() {
        let (pass, client_manifest, _, _) = pass();
        let source = "\"use client\";\nconsole.log(\"side effect\");\n";

        let out = pass
            .load(Path::new("/app/components/effect.ts"), source)
            .await
            .unwrap()
            .expect("client module should be rewritten");

        assert_eq!(out, "");
        assert_eq!(client_manifest.len(), 0);
    }

    #[tokio::test]
    async fn ambiguous_modules_are_rejected() {
        let (pass, _, _, _) = pass();
        let source = r#""use client";
export function save() {
  "use server";
  return 1;
}
"#;

        let err = pass
            .load(Path::new("/app/components/mixed.tsx"), source)
            .await
            .unwrap_err();
        assert!(matches!(err, DuplexError::AmbiguousDirectives { .. }));
    }

    #[tokio::test]
    async fn function_level_directives_get_registrations() {
        let (pass, _, server_manifest, index) = pass();
        let source = r#"import { db } from "./db";

export async function saveItem(data) {
  "use server";
  return db.save(data);
}

export const title = "Items";
"#;

        let out = pass
            .load(Path::new("/app/actions/items.ts"), source)
            .await
            .unwrap()
            .expect("module with server functions should be rewritten");

        assert!(out.starts_with(
            "import { registerServerReference } from \"react-server-dom-webpack/server.node\";"
        ));
        assert!(out.contains("import { db } from \"./db\";"));
        assert!(out.contains("return db.save(data);"));
        assert!(!out.contains("registerServerReference(title"));

        // Registration lands after the declaration it names
        let declaration = out.find("return db.save").unwrap();
        let registration = out.find("registerServerReference(saveItem, \"").unwrap();
        assert!(registration > declaration);

        // The token is a real uuid
        let after = &out[registration + "registerServerReference(saveItem, \"".len()..];
        let token = &after[..after.find('"').unwrap()];
        assert!(Uuid::parse_str(token).is_ok());

        assert_eq!(server_manifest.len(), 1);
        let entry = server_manifest.get("/actions/items.ts#saveItem").unwrap();
        assert_eq!(entry.id, "/actions/items.js");
        assert_eq!(entry.name, "saveItem");

        let refs = index.lookup(Path::new("/app/actions/items.ts")).unwrap();
        assert_eq!(refs.module_id, "/actions/items.ts");
        assert_eq!(refs.export_names, vec!["saveItem"]);
    }

    #[tokio::test]
    async fn module_level_server_registers_every_exported_function() {
        let (pass, _, server_manifest, index) = pass();
        let source = r#""use server";

export async function save(data) {
  return data;
}

export async function remove(id) {
  return id;
}

export const LIMIT = 10;
"#;

        let out = pass
            .load(Path::new("/app/actions.ts"), source)
            .await
            .unwrap()
            .expect("server module should be rewritten");

        assert!(out.contains("registerServerReference(save, \""));
        assert!(out.contains("registerServerReference(remove, \""));
        assert!(!out.contains("registerServerReference(LIMIT"));
        assert!(out.contains("export const LIMIT = 10;"));

        assert_eq!(server_manifest.len(), 2);
        let refs = index.lookup(Path::new("/app/actions.ts")).unwrap();
        assert_eq!(refs.export_names, vec!["save", "remove"]);
    }

    #[tokio::test]
    async fn rewritten_modules_are_not_rewritten_twice() {
        let (pass, _, _, _) = pass();
        let source = r#""use client";
export default function Button() { return null; }
"#;

        let stub = pass
            .load(Path::new("/app/components/Button.tsx"), source)
            .await
            .unwrap()
            .unwrap();
        let again = pass
            .load(Path::new("/app/components/Button.tsx"), &stub)
            .await
            .unwrap();
        assert!(again.is_none());

        let actions = r#"export async function save(data) {
  "use server";
  return data;
}
"#;
        let spliced = pass
            .load(Path::new("/app/actions.ts"), actions)
            .await
            .unwrap()
            .unwrap();
        let again = pass
            .load(Path::new("/app/actions.ts"), &spliced)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn neutral_modules_pass_through() {
        let (pass, client_manifest, server_manifest, _) = pass();
        let source = "export const shared = 1;\nexport function helper() { return 2; }\n";

        let out = pass.load(Path::new("/app/lib/util.ts"), source).await.unwrap();
        assert!(out.is_none());
        assert_eq!(client_manifest.len(), 0);
        assert_eq!(server_manifest.len(), 0);
    }
}
