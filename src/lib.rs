//! docsite: a documentation site composition engine
//!
//! Builds a navigable page tree from a directory of markdown documents,
//! resolves navigation and asset links against a cascading settings store
//! and renders every page through Tera layouts.

pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod generator;
pub mod helpers;
pub mod server;
pub mod templates;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::content::{ContentTreeBuilder, Site};
use crate::generator::{BuildReport, Generator, PageRenderer, RenderedSite};

/// Name of the defaults file looked up next to the instance settings
pub const DEFAULTS_FILE: &str = "defaults.yml";

/// Result of one full build
pub struct Build {
    pub site: Arc<Site>,
    pub rendered: RenderedSite,
    pub report: BuildReport,
}

/// The main docsite application
#[derive(Clone)]
pub struct DocSite {
    /// Cascading settings (defaults, then instance)
    pub settings: config::SettingsStore,
    /// Engine configuration read from the `site` settings
    pub config: config::SiteConfig,
    /// Instance settings file
    pub config_path: PathBuf,
    /// Defaults settings file
    pub defaults_path: PathBuf,
    /// Base directory; configured directories are relative to it
    pub base_dir: PathBuf,
    pub content_dir: PathBuf,
    pub public_dir: PathBuf,
    pub static_dir: PathBuf,
    pub layouts_dir: PathBuf,
}

impl DocSite {
    /// Load the settings cascade and resolve the site directories
    ///
    /// Without an explicit defaults file, `defaults.yml` next to the
    /// instance settings is used when it exists.
    pub fn new(config_path: &Path, defaults_path: Option<&Path>) -> Result<Self> {
        let base_dir = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let defaults_path = defaults_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| base_dir.join(DEFAULTS_FILE));

        let settings = config::SettingsStore::load(Some(&defaults_path), Some(config_path))?;
        let config = config::SiteConfig::from_settings(&settings)?;

        let content_dir = config.resolve_dir(&base_dir, &config.content_dir);
        let public_dir = config.resolve_dir(&base_dir, &config.public_dir);
        let static_dir = config.resolve_dir(&base_dir, &config.static_dir);
        let layouts_dir = config.resolve_dir(&base_dir, &config.layouts_dir);

        Ok(Self {
            settings,
            config,
            config_path: config_path.to_path_buf(),
            defaults_path,
            base_dir,
            content_dir,
            public_dir,
            static_dir,
            layouts_dir,
        })
    }

    /// Re-read the settings files
    pub fn reload(&self) -> Result<Self> {
        Self::new(&self.config_path, Some(&self.defaults_path))
    }

    /// Build the content tree and render every page in memory
    pub async fn build(&self) -> Result<Build> {
        let builder = ContentTreeBuilder::new(
            self.settings.clone(),
            self.config.clone(),
            self.content_dir.clone(),
        );
        let (site, content_issues) = builder
            .build()
            .await
            .with_context(|| format!("Failed to load content from {:?}", self.content_dir))?;
        let site = Arc::new(site);

        let renderer = PageRenderer::with_defaults(&site, &self.layouts_dir)?;
        let generator = Generator::new(renderer, self.config.worker_count());

        // Rendering is CPU bound
        let render_site = Arc::clone(&site);
        let (rendered, report) = tokio::task::spawn_blocking(move || {
            generator.render(&render_site, content_issues)
        })
        .await??;

        Ok(Build {
            site,
            rendered,
            report,
        })
    }

    /// Build the site and write it to the public directory
    pub async fn generate(&self) -> Result<BuildReport> {
        commands::build::run(self).await
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
