// Processors module: parse-side scanning and the two reference passes
pub mod client_pass;
pub mod module_scanner;
pub mod server_pass;
pub mod statements;

pub use client_pass::*;
pub use module_scanner::*;
pub use server_pass::*;
pub use statements::*;

use once_cell::sync::Lazy;
use regex::Regex;

/// Runtime module the server bundle registers references against
pub const SERVER_REFERENCE_RUNTIME: &str = "react-server-dom-webpack/server.node";

/// Runtime module the client bundle creates server references from
pub const CLIENT_REFERENCE_RUNTIME: &str = "react-server-dom-webpack/client";

/// Client-side transport that carries server action invocations
pub const CALL_SERVER_RUNTIME: &str = "duplex/client";

/// Paths the reference passes rewrite
pub static MODULE_FILTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(ts|tsx|js|jsx|mjs|cjs)$").unwrap());
