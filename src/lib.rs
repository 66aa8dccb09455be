//! # Islands
//!
//! Build-time side of a static site with interactive islands.
//!
//! ## Pipeline
//!
//! 1. **Compile**: every `islands/**/*.zen` source becomes a server module
//!    (synchronous render, styling imports stubbed) and a content-hashed
//!    client bundle with its styles extracted to a sibling stylesheet.
//! 2. **Register**: the [`IslandRegistry`] holds one record per island,
//!    keyed by its project-relative [`IslandId`].
//! 3. **Intercept**: page imports of island sources resolve to proxies
//!    through the [`hooks`] chain, so pages never bundle island code.
//! 4. **Mark**: while a page renders, each island node goes through the
//!    [`MarkerRuntime`], which renders static markup and wraps it in an
//!    `<island-root>` element unless the invocation says `no:pasaran`.
//! 5. **Hydrate**: the browser runtime (see [`hydration`]) loads the bundle
//!    when the directive's trigger fires and mounts it onto the markup.
//!
//! ## Directives
//!
//! - `no:pasaran`: static only, no wrapper, no bundle reference.
//! - `lenin:awake`: hydrate as soon as the element connects.
//! - `comrade:visible`: hydrate on first viewport intersection (default).

pub mod assets;
pub mod bundler;
pub mod cache;
pub mod client;
pub mod compiler;
pub mod config;
pub mod discovery;
pub mod error;
pub mod eval;
pub mod hooks;
pub mod hydration;
pub mod ident;
pub mod marker;
pub mod page;
pub mod parse;
pub mod props;
pub mod registry;
pub mod render;
pub mod script;
pub mod server;
pub mod site;
pub mod style;
pub mod template;

#[cfg(feature = "napi")]
mod bridge;

#[cfg(test)]
mod pipeline_tests;

#[cfg(feature = "napi")]
pub use bridge::IslandsBridge;

pub use bundler::{Bundler, OxcBundler};
pub use compiler::{compile, CompiledIsland};
pub use config::{BuildMode, IslandsConfig};
pub use error::{BuildError, CompileError, MarkerError, PageError, RegistryError};
pub use ident::IslandId;
pub use marker::{Directive, MarkerRuntime, PageUsage};
pub use registry::{IslandRecord, IslandRegistry};
pub use site::{SiteBuilder, SiteReport};
