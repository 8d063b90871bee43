use crate::core::interfaces::ImportResolverService;
use dashmap::DashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const FILE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "json", "mjs", "cjs"];
const INDEX_FILES: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.js",
    "index.jsx",
    "index.json",
];

/// The package.json fields entry resolution cares about
#[derive(Debug, Clone, Deserialize)]
pub struct PackageJson {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub browser: Option<serde_json::Value>,
}

/// Node.js-style import resolution: relative and absolute specifiers with
/// extension probing and index fallback, bare specifiers through
/// node_modules. All probing is metadata-only; results are not cached here
/// (the crawl memoizes per importing directory).
pub struct NodeImportResolver {
    root: PathBuf,
    /// Cache of parsed package.json files
    package_cache: DashMap<PathBuf, PackageJson>,
}

impl NodeImportResolver {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            package_cache: DashMap::new(),
        }
    }

    /// Bare specifiers name packages rather than files
    pub fn is_bare_specifier(specifier: &str) -> bool {
        !specifier.starts_with("./")
            && !specifier.starts_with("../")
            && !specifier.starts_with('/')
    }

    fn resolve_node_module(&self, specifier: &str, importer_dir: &Path) -> Option<PathBuf> {
        let (pkg_name, subpath) = parse_package_specifier(specifier);

        // Walk up the directory tree looking for node_modules
        let mut current_dir = importer_dir;
        loop {
            let package_dir = current_dir.join("node_modules").join(&pkg_name);
            if package_dir.is_dir() {
                if let Some(entry) = self.resolve_package_entry(&package_dir, subpath.as_deref()) {
                    return Some(entry);
                }
            }

            if current_dir == self.root {
                break;
            }
            match current_dir.parent() {
                Some(parent) => current_dir = parent,
                None => break,
            }
        }

        None
    }

    fn resolve_package_entry(&self, package_dir: &Path, subpath: Option<&str>) -> Option<PathBuf> {
        if let Some(subpath) = subpath {
            return self.resolve_file_or_directory(&package_dir.join(subpath));
        }

        let package_json_path = package_dir.join("package.json");
        if !package_json_path.exists() {
            return self.resolve_file_or_directory(&package_dir.join("index"));
        }

        let package_json = self.read_package_json(&package_json_path)?;

        // TODO: resolve the exports field map; module/main/browser cover the
        // packages seen in practice
        if let Some(module) = &package_json.module {
            if let Some(resolved) = self.resolve_as_file(&package_dir.join(module)) {
                return Some(resolved);
            }
        }

        if let Some(serde_json::Value::String(browser)) = &package_json.browser {
            if let Some(resolved) = self.resolve_as_file(&package_dir.join(browser)) {
                return Some(resolved);
            }
        }

        if let Some(main) = &package_json.main {
            if let Some(resolved) = self.resolve_as_file(&package_dir.join(main)) {
                return Some(resolved);
            }
        }

        self.resolve_file_or_directory(&package_dir.join("index"))
    }

    fn resolve_file_or_directory(&self, path: &Path) -> Option<PathBuf> {
        if let Some(file) = self.resolve_as_file(path) {
            return Some(file);
        }

        if !path.is_dir() {
            return None;
        }

        // Directory with its own package.json entry
        let package_json_path = path.join("package.json");
        if package_json_path.exists() {
            if let Some(pkg) = self.read_package_json(&package_json_path) {
                if let Some(main) = &pkg.main {
                    if let Some(resolved) = self.resolve_as_file(&path.join(main)) {
                        return Some(resolved);
                    }
                }
            }
        }

        for index in INDEX_FILES {
            let index_file = path.join(index);
            if index_file.is_file() {
                return Some(index_file);
            }
        }

        None
    }

    fn resolve_as_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        // Extensions are appended, not substituted: ./foo.view probes
        // foo.view.tsx, never foo.tsx
        let file_name = path.file_name()?;
        for ext in FILE_EXTENSIONS {
            let mut name = file_name.to_os_string();
            name.push(".");
            name.push(ext);
            let candidate = path.with_file_name(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        None
    }

    fn read_package_json(&self, path: &Path) -> Option<PackageJson> {
        if let Some(cached) = self.package_cache.get(path) {
            return Some(cached.clone());
        }

        let content = std::fs::read_to_string(path).ok()?;
        let package: PackageJson = serde_json::from_str(&content).ok()?;
        self.package_cache.insert(path.to_path_buf(), package.clone());

        Some(package)
    }
}

impl ImportResolverService for NodeImportResolver {
    fn resolve(&self, specifier: &str, importer_dir: &Path) -> Option<PathBuf> {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            return self.resolve_file_or_directory(&importer_dir.join(specifier));
        }

        if let Some(rest) = specifier.strip_prefix('/') {
            return self.resolve_file_or_directory(&self.root.join(rest));
        }

        self.resolve_node_module(specifier, importer_dir)
    }
}

/// Split a bare specifier into package name and optional subpath,
/// handling scoped packages like @scope/pkg/sub
fn parse_package_specifier(specifier: &str) -> (String, Option<String>) {
    let name_segments = if specifier.starts_with('@') { 2 } else { 1 };

    let mut split_at = None;
    let mut seen = 0;
    for (idx, ch) in specifier.char_indices() {
        if ch == '/' {
            seen += 1;
            if seen == name_segments {
                split_at = Some(idx);
                break;
            }
        }
    }

    match split_at {
        Some(idx) => (
            specifier[..idx].to_string(),
            Some(specifier[idx + 1..].to_string()),
        ),
        None => (specifier.to_string(), None),
    }
}
