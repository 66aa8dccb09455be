//! Node bridge for the JS CLI.

use napi::bindgen_prelude::*;
use napi_derive::napi;
use std::path::Path;

use crate::config::IslandsConfig;
use crate::site::SiteBuilder;

#[napi]
pub struct IslandsBridge {
    site: SiteBuilder,
}

#[napi]
impl IslandsBridge {
    #[napi(constructor)]
    pub fn new(config_json: String) -> Result<Self> {
        let config = IslandsConfig::from_json(&config_json).map_err(|e| Error::from_reason(e.to_string()))?;
        Ok(Self {
            site: SiteBuilder::new(config),
        })
    }

    /// Returns the number of registered islands.
    #[napi]
    pub fn load(&self) -> Result<u32> {
        let count = self.site.load().map_err(|e| Error::from_reason(e.to_string()))?;
        Ok(count as u32)
    }

    /// Returns the final HTML of one page.
    #[napi]
    pub fn build_page(&self, path: String) -> Result<String> {
        let page = self
            .site
            .build_page(Path::new(&path))
            .map_err(|e| Error::from_reason(e.to_string()))?;
        Ok(page.html)
    }

    /// Returns every written HTML path.
    #[napi]
    pub fn build_site(&self) -> Result<Vec<String>> {
        let report = self.site.build().map_err(|e| Error::from_reason(format!("{}", e)))?;
        Ok(report
            .written_paths()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect())
    }
}
