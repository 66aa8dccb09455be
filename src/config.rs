//! Build configuration.
//!
//! Loading the configuration file is the CLI's job; this crate only receives
//! the already-decoded values (the Node bridge hands them over as JSON).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The build mode determines minification and the live-reload script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Readable bundles, live-reload client injected.
    Dev,
    /// Minified bundles and stylesheets.
    #[default]
    Prod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IslandsConfig {
    pub project_root: PathBuf,
    /// Island sources, relative to the project root.
    pub islands_dir: PathBuf,
    /// Page sources, relative to the project root.
    pub pages_dir: PathBuf,
    /// Output directory, relative to the project root.
    pub out_dir: PathBuf,
    /// Public URL prefix of the output directory.
    pub base_url: String,
    pub mode: BuildMode,
    /// Explicitly enable/disable minification (overrides mode default).
    pub minify: Option<bool>,
    /// Enables the on-disk artifact cache when set.
    pub cache_dir: Option<PathBuf>,
    pub live_reload_endpoint: String,
}

impl Default for IslandsConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            islands_dir: PathBuf::from("islands"),
            pages_dir: PathBuf::from("pages"),
            out_dir: PathBuf::from("dist"),
            base_url: "/".to_string(),
            mode: BuildMode::Prod,
            minify: None,
            cache_dir: None,
            live_reload_endpoint: "/__islands/reload".to_string(),
        }
    }
}

impl IslandsConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn islands_root(&self) -> PathBuf {
        self.project_root.join(&self.islands_dir)
    }

    pub fn pages_root(&self) -> PathBuf {
        self.project_root.join(&self.pages_dir)
    }

    pub fn out_root(&self) -> PathBuf {
        self.project_root.join(&self.out_dir)
    }

    pub fn should_minify(&self) -> bool {
        self.minify.unwrap_or(self.mode == BuildMode::Prod)
    }

    /// Fingerprint of the options that change compiled island artifacts.
    /// Cached artifacts built under another fingerprint are not reused.
    pub fn artifact_settings(&self) -> String {
        format!("minify={}", self.should_minify())
    }

    pub fn is_dev(&self) -> bool {
        self.mode == BuildMode::Dev
    }

    /// Public URL for a path relative to the output directory.
    pub fn public_url(&self, relative: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{}/{}", base, relative.trim_start_matches('/'))
    }
}
