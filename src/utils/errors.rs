use std::path::PathBuf;
use thiserror::Error;

/// Error annotated with the file it came from
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }
}

#[derive(Error, Debug)]
pub enum DuplexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {message}")]
    Parse {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Build error: {message}")]
    Build {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Ambiguous directives in {}: module is marked 'use client' but declares 'use server' functions", .path.display())]
    AmbiguousDirectives { path: PathBuf },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl DuplexError {
    pub fn parse(message: String) -> Self {
        Self::Parse {
            message,
            context: None,
        }
    }

    /// Parse error pinned to the file it came from
    pub fn parse_with_context(message: String, context: ErrorContext) -> Self {
        Self::Parse {
            message,
            context: Some(context),
        }
    }

    pub fn build(message: String) -> Self {
        Self::Build {
            message,
            context: None,
        }
    }

    pub fn config(message: String) -> Self {
        Self::Config(message)
    }

    /// Format error with its context for terminal display
    pub fn format_detailed(&self) -> String {
        match self {
            DuplexError::Parse { message, context } => {
                Self::format_error_with_context("Parse Error", message, context)
            }
            DuplexError::Build { message, context } => {
                Self::format_error_with_context("Build Error", message, context)
            }
            _ => format!("❌ {}", self),
        }
    }

    fn format_error_with_context(
        error_type: &str,
        message: &str,
        context: &Option<ErrorContext>,
    ) -> String {
        let mut output = format!("❌ {}: {}", error_type, message);

        if let Some(file_path) = context.as_ref().and_then(|ctx| ctx.file_path.as_ref()) {
            output.push_str(&format!("\n📁 File: {}", file_path.display()));
        }

        output
    }
}

pub type Result<T> = std::result::Result<T, DuplexError>;

impl From<regex::Error> for DuplexError {
    fn from(err: regex::Error) -> Self {
        DuplexError::parse(format!("Regex error: {}", err))
    }
}

impl From<serde_json::Error> for DuplexError {
    fn from(err: serde_json::Error) -> Self {
        DuplexError::parse(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for DuplexError {
    fn from(err: anyhow::Error) -> Self {
        DuplexError::build(err.to_string())
    }
}
