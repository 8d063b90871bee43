use duplex::core::interfaces::{BuildService, Bundler, FileSystemService, ImportResolverService};
use duplex::core::models::BuildConfig;
use duplex::core::services::DuplexBuildService;
use duplex::infrastructure::{NodeImportResolver, PassthroughBundler, TokioFileSystemService};
use duplex::utils::DuplexError;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn build_service(root: &Path) -> DuplexBuildService {
    let fs: Arc<dyn FileSystemService> = Arc::new(TokioFileSystemService);
    let resolver: Arc<dyn ImportResolverService> =
        Arc::new(NodeImportResolver::new(root.to_path_buf()));
    let bundler: Arc<dyn Bundler> = Arc::new(PassthroughBundler::new(Arc::clone(&fs)));
    DuplexBuildService::new(fs, resolver, bundler)
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn manifest_keys(path: &Path) -> BTreeSet<String> {
    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    manifest
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect()
}

#[tokio::test]
async fn both_manifests_cover_exactly_the_discovered_references() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();

    write(
        &root,
        "pages/index.tsx",
        r#"import Panel from "../components/Panel";
import { Badge } from "../components/Badge";
import { shared } from "../lib/util";

export default function Home() {
  return [Panel, Badge, shared];
}
"#,
    );
    write(
        &root,
        "pages/admin.tsx",
        r#"import Panel from "../components/Panel";
import { save } from "../actions/items";

export default function Admin() {
  return [Panel, save];
}
"#,
    );
    write(
        &root,
        "components/Panel.tsx",
        r#""use client";
export const Title = "panel";
export default function Panel() { return Title; }
"#,
    );
    write(
        &root,
        "components/Badge.tsx",
        r#""use client";
import { save, remove } from "../actions/items";

export function Badge() { return [save, remove]; }
"#,
    );
    write(
        &root,
        "actions/items.ts",
        r#""use server";

export async function save(item) {
  return item;
}

export async function remove(id) {
  return id;
}
"#,
    );
    write(&root, "lib/util.ts", "export const shared = 1;\n");

    let config = BuildConfig {
        root: root.clone(),
        ..Default::default()
    };
    let result = build_service(&root).build(&config).await.unwrap();

    let client_keys = manifest_keys(&root.join("dist/client-manifest.json"));
    let expected_client: BTreeSet<String> = [
        "/components/Panel.tsx#default",
        "/components/Panel.tsx#Title",
        "/components/Badge.tsx#Badge",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(client_keys, expected_client);
    assert_eq!(result.client_references, 3);

    let server_keys = manifest_keys(&root.join("dist/server-manifest.json"));
    let expected_server: BTreeSet<String> =
        ["/actions/items.ts#save", "/actions/items.ts#remove"]
            .into_iter()
            .map(String::from)
            .collect();
    assert_eq!(server_keys, expected_server);

    // Every id a client stub dials must resolve through the server manifest
    let stub = std::fs::read_to_string(root.join("dist/client/actions/items.js")).unwrap();
    let dialed = Regex::new(r#"createServerReference\("([^"]+)""#).unwrap();
    let mut dialed_ids = 0;
    for capture in dialed.captures_iter(&stub) {
        assert!(
            server_keys.contains(&capture[1]),
            "stub id {} missing from server manifest",
            &capture[1]
        );
        dialed_ids += 1;
    }
    assert_eq!(dialed_ids, 2);

    // Every id the server bundle registers must resolve through the client manifest
    let server_panel =
        std::fs::read_to_string(root.join("dist/server/components/Panel.js")).unwrap();
    let registered = Regex::new(r#"registerClientReference\([^,]+, "([^"]+)""#).unwrap();
    let mut registered_ids = 0;
    for capture in registered.captures_iter(&server_panel) {
        assert!(
            client_keys.contains(&capture[1]),
            "registered id {} missing from client manifest",
            &capture[1]
        );
        registered_ids += 1;
    }
    assert_eq!(registered_ids, 2);
}

#[tokio::test]
async fn conflicting_directives_fail_the_build() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();

    write(
        &root,
        "pages/index.tsx",
        r#"import Bad from "../components/Bad";

export default function Home() {
  return Bad;
}
"#,
    );
    write(
        &root,
        "components/Bad.tsx",
        r#""use client";
export function leak() {
  "use server";
  return 1;
}
export default function Bad() { return leak; }
"#,
    );

    let config = BuildConfig {
        root: root.clone(),
        ..Default::default()
    };
    let err = build_service(&root).build(&config).await.unwrap_err();
    assert!(matches!(err, DuplexError::AmbiguousDirectives { .. }));
}

#[tokio::test]
async fn ignored_specifiers_never_reach_the_output() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();

    write(
        &root,
        "pages/index.tsx",
        r#"import { skipped } from "../lib/heavy";
import { used } from "../lib/light";

export default function Home() {
  return [skipped, used];
}
"#,
    );
    write(&root, "lib/heavy.ts", "export const skipped = 1;\n");
    write(&root, "lib/light.ts", "export const used = 2;\n");

    let config = BuildConfig {
        root: root.clone(),
        ignore: vec!["../lib/heavy".to_string()],
        ..Default::default()
    };
    build_service(&root).build(&config).await.unwrap();

    assert!(root.join("dist/server/lib/light.js").exists());
    assert!(!root.join("dist/server/lib/heavy.js").exists());
}

#[tokio::test]
async fn function_level_actions_in_neutral_modules_are_registered() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();

    write(
        &root,
        "pages/index.tsx",
        r#"import { submit } from "../lib/form";

export default function Home() {
  return submit;
}
"#,
    );
    write(
        &root,
        "lib/form.ts",
        r#"export async function submit(data) {
  "use server";
  return data;
}

export function validate(data) {
  return Boolean(data);
}
"#,
    );

    let config = BuildConfig {
        root: root.clone(),
        ..Default::default()
    };
    let result = build_service(&root).build(&config).await.unwrap();
    assert_eq!(result.server_references, 1);

    let emitted = std::fs::read_to_string(root.join("dist/server/lib/form.js")).unwrap();
    assert!(emitted.contains("registerServerReference(submit, \""));
    assert!(!emitted.contains("registerServerReference(validate"));

    let server_keys = manifest_keys(&root.join("dist/server-manifest.json"));
    assert!(server_keys.contains("/lib/form.ts#submit"));
    assert!(!server_keys.contains("/lib/form.ts#validate"));
}

#[tokio::test]
async fn rebuilding_from_emitted_output_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();

    write(
        &root,
        "pages/index.tsx",
        r#"import Widget from "../components/Widget";

export default function Home() {
  return Widget;
}
"#,
    );
    write(
        &root,
        "components/Widget.tsx",
        "\"use client\";\nexport default function Widget() { return null; }\n",
    );

    let config = BuildConfig {
        root: root.clone(),
        ..Default::default()
    };
    build_service(&root).build(&config).await.unwrap();
    let stub = std::fs::read_to_string(root.join("dist/server/components/Widget.js")).unwrap();

    // Feed the generated stub back through as if it were source
    std::fs::write(root.join("components/Widget.tsx"), &stub).unwrap();
    build_service(&root).build(&config).await.unwrap();
    let again = std::fs::read_to_string(root.join("dist/server/components/Widget.js")).unwrap();

    assert_eq!(stub, again);
}
