use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::utils::{Logger, Result};

/// Derive the stable reference id for an export:
/// `/<root-relative path>#<export name>`, source extension preserved.
/// Pure function of its inputs, so every pass and process derives the
/// same id for the same export.
pub fn reference_id(root: &Path, module_path: &Path, export_name: &str) -> String {
    format!("{}#{}", module_id(root, module_path), export_name)
}

/// Root-relative module path with a leading slash and forward slashes,
/// whatever the platform.
pub fn module_id(root: &Path, module_path: &Path) -> String {
    let relative = module_path.strip_prefix(root).unwrap_or(module_path);
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{}", joined)
}

/// The chunk a module lands in once bundled: its root-relative path with
/// the source extension rewritten to `.js`.
pub fn chunk_path(root: &Path, module_path: &Path) -> String {
    module_id(root, &module_path.with_extension("js"))
}

/// One manifest row. `id` and `chunks` name the chunk that must be loaded
/// to obtain `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub chunks: Vec<String>,
    pub name: String,
}

impl ManifestEntry {
    pub fn for_chunk(chunk: String, name: String) -> Self {
        Self {
            id: chunk.clone(),
            chunks: vec![chunk],
            name,
        }
    }
}

/// Append-only map from reference id to manifest entry. Concurrent puts
/// during a build; serialized key-sorted so the persisted JSON is
/// byte-stable across runs.
#[derive(Debug, Default)]
pub struct ReferenceManifest {
    entries: DashMap<String, ManifestEntry>,
}

impl ReferenceManifest {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert an entry. Re-inserting the same entry is a no-op; a
    /// conflicting entry for an existing id is rejected and logged,
    /// the first write wins.
    pub fn put(&self, id: String, entry: ManifestEntry) {
        match self.entries.entry(id) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                if existing.get() != &entry {
                    Logger::error(&format!(
                        "manifest id {} already registered with a different entry; keeping the first",
                        existing.key()
                    ));
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<ManifestEntry> {
        self.entries.get(id).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty JSON with sorted keys.
    pub fn serialize(&self) -> Result<String> {
        let sorted: BTreeMap<String, ManifestEntry> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        Ok(serde_json::to_string_pretty(&sorted)?)
    }
}

/// Export names a server-directive module registered during the server
/// pass, keyed by module path. The client pass consumes this to emit
/// matching stubs without re-deriving ids.
#[derive(Debug, Clone)]
pub struct ServerModuleReferences {
    pub module_id: String,
    pub export_names: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ServerReferenceIndex {
    entries: DashMap<PathBuf, ServerModuleReferences>,
}

impl ServerReferenceIndex {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn record(&self, path: PathBuf, module_id: String, export_names: Vec<String>) {
        self.entries
            .insert(path, ServerModuleReferences { module_id, export_names });
    }

    pub fn lookup(&self, path: &Path) -> Option<ServerModuleReferences> {
        self.entries.get(path).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_ids_are_deterministic() {
        let root = Path::new("/app");
        let module = Path::new("/app/components/Button.tsx");
        let a = reference_id(root, module, "default");
        let b = reference_id(root, module, "default");
        assert_eq!(a, b);
        assert_eq!(a, "/components/Button.tsx#default");
    }

    #[test]
    fn chunk_paths_rewrite_the_extension() {
        let root = Path::new("/app");
        assert_eq!(
            chunk_path(root, Path::new("/app/components/Button.tsx")),
            "/components/Button.js"
        );
        assert_eq!(
            chunk_path(root, Path::new("/app/actions/save.ts")),
            "/actions/save.js"
        );
        assert_eq!(
            chunk_path(root, Path::new("/app/lib/util.js")),
            "/lib/util.js"
        );
    }

    #[test]
    fn manifest_puts_are_append_only() {
        let manifest = ReferenceManifest::new();
        let first = ManifestEntry::for_chunk("/a.js".into(), "default".into());
        let conflicting = ManifestEntry::for_chunk("/b.js".into(), "default".into());

        manifest.put("/a.tsx#default".into(), first.clone());
        manifest.put("/a.tsx#default".into(), conflicting);

        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("/a.tsx#default"), Some(first));
    }

    #[test]
    fn serialized_manifest_is_key_sorted() {
        let manifest = ReferenceManifest::new();
        manifest.put(
            "/z.tsx#default".into(),
            ManifestEntry::for_chunk("/z.js".into(), "default".into()),
        );
        manifest.put(
            "/a.tsx#default".into(),
            ManifestEntry::for_chunk("/a.js".into(), "default".into()),
        );

        let json = manifest.serialize().unwrap();
        let z = json.find("/z.tsx#default").unwrap();
        let a = json.find("/a.tsx#default").unwrap();
        assert!(a < z);
    }

    #[test]
    fn index_round_trips_module_references() {
        let index = ServerReferenceIndex::new();
        index.record(
            PathBuf::from("/app/actions.ts"),
            "/actions.ts".into(),
            vec!["save".into(), "remove".into()],
        );

        let refs = index.lookup(Path::new("/app/actions.ts")).unwrap();
        assert_eq!(refs.module_id, "/actions.ts");
        assert_eq!(refs.export_names, vec!["save", "remove"]);
        assert!(index.lookup(Path::new("/app/other.ts")).is_none());
    }
}
