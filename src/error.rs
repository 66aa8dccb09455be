//! Error types for every layer of the islands pipeline.
//!
//! Three classes matter to callers:
//! - build-fatal: [`CompileError`], [`RegistryError`], [`MarkerError`], [`PageError`]
//! - recoverable per island: [`EvalError`] raised while server-rendering an island
//! - client runtime failures never reach Rust; the browser runtime logs them.

use std::path::PathBuf;
use thiserror::Error;

use crate::ident::IslandId;

// ═══════════════════════════════════════════════════════════════════════════════
// EVALUATION (recoverable)
// ═══════════════════════════════════════════════════════════════════════════════

/// Failure while evaluating a template expression on the server.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("cannot parse expression `{code}`: {message}")]
    Syntax { code: String, message: String },

    #[error("`{0}` is not defined during server rendering")]
    UnknownIdentifier(String),

    #[error("`{name}` is unavailable during server rendering: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("unsupported expression on the server: {0}")]
    Unsupported(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUNDLING / HOOKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Failure reported by a module hook.
#[derive(Debug, Clone, Error)]
#[error("hook `{hook}` failed on `{id}`: {message}")]
pub struct HookError {
    pub hook: &'static str,
    pub id: String,
    pub message: String,
}

/// Failure of the bundling black box.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("cannot parse module `{id}`: {message}")]
    Parse { id: String, message: String },

    #[error("module `{id}` imports `{specifier}`, which the built-in bundler cannot inline")]
    Unbundlable { id: String, specifier: String },

    #[error(transparent)]
    Hook(#[from] HookError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse template in `{path}`: {message}")]
    Template { path: PathBuf, message: String },

    #[error("invalid script in `{path}`: {message}")]
    Script { path: PathBuf, message: String },

    #[error("`{path}` uses component <{name}>; islands cannot render other components")]
    NestedComponent { path: PathBuf, name: String },

    #[error("client bundle for `{path}` failed: {source}")]
    Bundle {
        path: PathBuf,
        #[source]
        source: BundleError,
    },

    #[error("stylesheet for `{path}` failed: {message}")]
    Style { path: PathBuf, message: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot read islands directory `{root}`: {source}")]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("island `{path}` failed to compile: {source}")]
    Compile {
        path: PathBuf,
        #[source]
        source: CompileError,
    },

    #[error("island `{id}` is defined by both `{first}` and `{second}`")]
    DuplicateIsland {
        id: IslandId,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKER RUNTIME
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarkerError {
    #[error("island `{0}` is not registered")]
    UnknownIsland(IslandId),

    #[error("island `{id}` has conflicting directives: {}", directives.join(", "))]
    ConflictingDirectives {
        id: IslandId,
        directives: Vec<&'static str>,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// PAGES / SITE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum PageError {
    #[error("failed to read page `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse page `{path}`: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("page `{path}` cannot import `{specifier}`: {message}")]
    Import {
        path: PathBuf,
        specifier: String,
        message: String,
    },

    #[error("page `{path}` uses <{name}>, which is not an imported island")]
    UnknownComponent { path: PathBuf, name: String },

    #[error("page `{path}`: {source}")]
    Eval {
        path: PathBuf,
        #[source]
        source: EvalError,
    },

    #[error("page `{path}`: {source}")]
    Marker {
        path: PathBuf,
        #[source]
        source: MarkerError,
    },

    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level build failure.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("cannot read pages directory `{root}`: {source}")]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
