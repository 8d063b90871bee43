/// The statement shapes the reference compiler is allowed to inject.
/// Rewrites assemble these and render new module text; the parsed tree of
/// the input is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltStatement {
    /// `import { binding } from "source";`
    NamedImport { binding: String, source: String },
    /// Factory for stand-ins that throw when a client function is invoked
    /// on the server
    ClientProxyFactory,
    /// `export const name = registerClientReference(proxy, id, name);`
    ClientReference {
        export_name: String,
        reference_id: String,
    },
    /// `registerServerReference(local, token, name);`
    ServerRegistration {
        local_name: String,
        token: String,
        export_name: String,
    },
    /// `export const name = createServerReference(id, callServer);`
    ServerStub {
        export_name: String,
        reference_id: String,
    },
}

const CLIENT_PROXY_FACTORY: &str = "\
function createClientReferenceProxy(exportName) {
  return () => {
    throw new Error(`Attempted to call ${exportName}() from the server but ${exportName} is on the client. It's not possible to invoke a client function from the server, it can only be rendered as a Component or passed to props of a Client Component.`);
  };
}";

impl BuiltStatement {
    pub fn render(&self) -> String {
        match self {
            BuiltStatement::NamedImport { binding, source } => {
                format!("import {{ {} }} from \"{}\";", binding, source)
            }
            BuiltStatement::ClientProxyFactory => CLIENT_PROXY_FACTORY.to_string(),
            BuiltStatement::ClientReference {
                export_name,
                reference_id,
            } => {
                let call = format!(
                    "registerClientReference(createClientReferenceProxy(\"{name}\"), \"{id}\", \"{name}\")",
                    name = export_name,
                    id = reference_id
                );
                render_export(export_name, &call)
            }
            BuiltStatement::ServerRegistration {
                local_name,
                token,
                export_name,
            } => {
                format!(
                    "registerServerReference({}, \"{}\", \"{}\");",
                    local_name, token, export_name
                )
            }
            BuiltStatement::ServerStub {
                export_name,
                reference_id,
            } => {
                let call = format!("createServerReference(\"{}\", callServer)", reference_id);
                render_export(export_name, &call)
            }
        }
    }
}

fn render_export(export_name: &str, expression: &str) -> String {
    if export_name == "default" {
        format!("export default {};", expression)
    } else {
        format!("export const {} = {};", export_name, expression)
    }
}

/// Render a complete generated module
pub fn render_module(statements: &[BuiltStatement]) -> String {
    let mut out = statements
        .iter()
        .map(BuiltStatement::render)
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}
