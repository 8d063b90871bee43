use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Declaration, ExportDefaultDeclarationKind, Expression, FunctionBody, ModuleExportName,
    Program, Statement,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use std::collections::HashMap;
use std::path::Path;

use super::{CLIENT_REFERENCE_RUNTIME, SERVER_REFERENCE_RUNTIME};
use crate::core::models::{
    Boundary, ExportedFunction, FunctionInfo, ImportRecord, ModuleFacts,
};
use crate::utils::{DuplexError, ErrorContext, Logger, Result};

/// Parse a module once and distill everything later stages need: its
/// boundary, imports, exported names and which exported functions carry a
/// server directive. The syntax tree is dropped on return.
pub fn scan_module(path: &Path, source: &str) -> Result<ModuleFacts> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path)
        .unwrap_or_default()
        .with_module(true);

    let parser = Parser::new(&allocator, source, source_type);
    let parsed = parser.parse();

    if parsed.panicked {
        let message = parsed
            .errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unrecoverable syntax error".to_string());
        return Err(DuplexError::parse_with_context(
            message,
            ErrorContext::new().with_file(path.to_path_buf()),
        ));
    }

    if !parsed.errors.is_empty() {
        Logger::warn(&format!(
            "Parse warnings in {}: {} issues",
            path.display(),
            parsed.errors.len()
        ));
    }

    Ok(distill(&parsed.program))
}

struct LocalFn {
    has_server_directive: bool,
    decl_end: usize,
}

fn distill(program: &Program) -> ModuleFacts {
    let mut facts = ModuleFacts {
        boundary: module_boundary(program),
        ..Default::default()
    };

    // First sweep: every top-level function-like binding, wherever it is
    // declared, so aliased exports can be resolved against it later.
    let mut local_fns: HashMap<String, LocalFn> = HashMap::new();
    for stmt in &program.body {
        let stmt_end = stmt.span().end as usize;
        match stmt {
            Statement::FunctionDeclaration(func) => {
                collect_function(func, stmt_end, &mut local_fns, &mut facts.functions);
            }
            Statement::VariableDeclaration(var) => {
                collect_variable_functions(var, stmt_end, &mut local_fns, &mut facts.functions);
            }
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::FunctionDeclaration(func)) => {
                    collect_function(func, stmt_end, &mut local_fns, &mut facts.functions);
                }
                Some(Declaration::VariableDeclaration(var)) => {
                    collect_variable_functions(var, stmt_end, &mut local_fns, &mut facts.functions);
                }
                _ => {}
            },
            Statement::ExportDefaultDeclaration(export) => {
                // Anonymous defaults cannot be registered, but their
                // directives still count toward ambiguity
                let server = match &export.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        Some(function_uses_server(func.body.as_deref()))
                    }
                    ExportDefaultDeclarationKind::ArrowFunctionExpression(arrow) => {
                        Some(body_uses_server(&arrow.body))
                    }
                    ExportDefaultDeclarationKind::FunctionExpression(func) => {
                        Some(function_uses_server(func.body.as_deref()))
                    }
                    _ => None,
                };
                if let Some(has_server_directive) = server {
                    facts.functions.push(FunctionInfo {
                        name: "default".to_string(),
                        has_server_directive,
                    });
                }
            }
            _ => {}
        }
    }

    // Second sweep: imports and the export surface
    for stmt in &program.body {
        let stmt_end = stmt.span().end as usize;
        match stmt {
            Statement::ImportDeclaration(import) => {
                if import.import_kind.is_type() {
                    continue;
                }
                let specifier = import.source.value.to_string();
                if specifier == SERVER_REFERENCE_RUNTIME || specifier == CLIENT_REFERENCE_RUNTIME {
                    facts.has_reference_import = true;
                }
                facts.imports.push(ImportRecord::new(specifier));
            }
            Statement::ExportNamedDeclaration(export) => {
                if export.export_kind.is_type() {
                    continue;
                }

                if let Some(declaration) = &export.declaration {
                    for name in declaration_names(declaration) {
                        if let Some(local) = local_fns.get(&name) {
                            facts.exported_functions.push(ExportedFunction {
                                local_name: name.clone(),
                                export_name: name.clone(),
                                has_server_directive: local.has_server_directive,
                                insert_offset: stmt_end,
                            });
                        }
                        facts.exports.push(name);
                    }
                }

                for spec in &export.specifiers {
                    if spec.export_kind.is_type() {
                        continue;
                    }
                    let exported = export_name(&spec.exported);
                    let local = export_name(&spec.local);
                    if let Some(local_fn) = local_fns.get(&local) {
                        facts.exported_functions.push(ExportedFunction {
                            local_name: local,
                            export_name: exported.clone(),
                            has_server_directive: local_fn.has_server_directive,
                            // A const initializer may sit below the export
                            // statement; splice after whichever comes last
                            insert_offset: stmt_end.max(local_fn.decl_end),
                        });
                    }
                    facts.exports.push(exported);
                }

                // A re-export pulls its source into the graph
                if let Some(source) = &export.source {
                    facts.imports.push(ImportRecord::new(source.value.to_string()));
                }
            }
            Statement::ExportDefaultDeclaration(_) => {
                facts.exports.push("default".to_string());
            }
            Statement::ExportAllDeclaration(export) => {
                if export.export_kind.is_type() {
                    continue;
                }
                Logger::debug(&format!(
                    "export * from {:?} re-exports unknown names; crawling the source only",
                    export.source.value
                ));
                facts.imports.push(ImportRecord::new(export.source.value.to_string()));
            }
            _ => {}
        }
    }

    facts
}

fn module_boundary(program: &Program) -> Boundary {
    // Only the first directive of the prologue counts, and only with
    // bit-exact content: escape spellings do not qualify
    match program.directives.first() {
        Some(directive) if directive.directive.as_str() == "use client" => Boundary::ClientBound,
        Some(directive) if directive.directive.as_str() == "use server" => Boundary::ServerBound,
        _ => Boundary::Neutral,
    }
}

fn body_uses_server(body: &FunctionBody) -> bool {
    body.directives
        .first()
        .map_or(false, |d| d.directive.as_str() == "use server")
}

fn function_uses_server(body: Option<&FunctionBody>) -> bool {
    body.map_or(false, body_uses_server)
}

fn collect_function(
    func: &oxc_ast::ast::Function,
    decl_end: usize,
    local_fns: &mut HashMap<String, LocalFn>,
    functions: &mut Vec<FunctionInfo>,
) {
    let Some(id) = &func.id else {
        return;
    };
    let has_server_directive = function_uses_server(func.body.as_deref());
    functions.push(FunctionInfo {
        name: id.name.to_string(),
        has_server_directive,
    });
    local_fns.insert(
        id.name.to_string(),
        LocalFn {
            has_server_directive,
            decl_end,
        },
    );
}

fn collect_variable_functions(
    var: &oxc_ast::ast::VariableDeclaration,
    decl_end: usize,
    local_fns: &mut HashMap<String, LocalFn>,
    functions: &mut Vec<FunctionInfo>,
) {
    for declarator in &var.declarations {
        let oxc_ast::ast::BindingPatternKind::BindingIdentifier(id) = &declarator.id.kind else {
            continue;
        };
        let has_server_directive = match &declarator.init {
            Some(Expression::ArrowFunctionExpression(arrow)) => body_uses_server(&arrow.body),
            Some(Expression::FunctionExpression(func)) => function_uses_server(func.body.as_deref()),
            _ => continue,
        };
        functions.push(FunctionInfo {
            name: id.name.to_string(),
            has_server_directive,
        });
        local_fns.insert(
            id.name.to_string(),
            LocalFn {
                has_server_directive,
                decl_end,
            },
        );
    }
}

/// Every exported binding name a declaration introduces
fn declaration_names(declaration: &Declaration) -> Vec<String> {
    match declaration {
        Declaration::FunctionDeclaration(func) => {
            func.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) => {
            class.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .filter_map(|d| match &d.id.kind {
                oxc_ast::ast::BindingPatternKind::BindingIdentifier(id) => {
                    Some(id.name.to_string())
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}
