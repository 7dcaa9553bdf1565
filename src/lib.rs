//! blogsmith: a static site generator for Jekyll-style Markdown blogs
//!
//! A site is a source directory holding `_config.yml`, dated posts in
//! `_posts/`, pages with metadata blocks anywhere else, layouts in
//! `_layouts/`, includes in `_includes/` and plain files copied as-is.
//! Building renders everything in memory, checks that every output path
//! is unique and every internal link and asset resolves, and only then
//! writes the destination directory.

pub mod check;
pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod generator;
pub mod helpers;
pub mod server;
pub mod templates;

pub use error::{BuildFailed, BuildReport, SiteError};

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use config::SiteConfig;
use content::{ContentLoader, ContentSet};
use generator::{Generator, RenderedSite};
use templates::{Includes, LayoutSet};

/// Name of the configuration file in the source directory
pub const CONFIG_FILE: &str = "_config.yml";

/// A site on disk
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: SiteConfig,
    /// Source directory
    pub source_dir: PathBuf,
    /// Output directory
    pub dest_dir: PathBuf,
    pub layouts_dir: PathBuf,
    pub includes_dir: PathBuf,
}

impl Site {
    /// Open the site in `source_dir`, reading `_config.yml` when present
    pub fn new<P: AsRef<Path>>(source_dir: P) -> Result<Self> {
        let source_dir = source_dir.as_ref().to_path_buf();
        let config_path = source_dir.join(CONFIG_FILE);

        let config = if config_path.exists() {
            SiteConfig::load(&config_path)?
        } else {
            SiteConfig::default()
        };

        Ok(Self::with_config(source_dir, config))
    }

    pub fn with_config(source_dir: PathBuf, config: SiteConfig) -> Self {
        let dest_dir = source_dir.join(&config.destination);
        let layouts_dir = source_dir.join(&config.layouts_dir);
        let includes_dir = source_dir.join(&config.includes_dir);

        Self {
            config,
            source_dir,
            dest_dir,
            layouts_dir,
            includes_dir,
        }
    }

    /// Discover posts, pages and assets
    pub fn load_content(&self, drafts: bool) -> Result<ContentSet> {
        let loader = ContentLoader::new(&self.config, &self.source_dir, drafts)?;
        Ok(loader.load()?)
    }

    /// Render the site in memory and run every check; writes nothing
    pub fn render(&self, drafts: bool) -> Result<RenderedSite> {
        let content = self.load_content(drafts)?;
        tracing::info!(
            "Loaded {} posts and {} pages",
            content.posts.len(),
            content.pages.len()
        );

        let layouts = LayoutSet::load(&self.config, Some(self.layouts_dir.as_path()))?;
        let includes = Includes::load(&self.includes_dir)?;
        let generator = Generator::new(&self.config, &layouts, &includes);

        Ok(generator.render(&content)?)
    }

    /// Render, check, then replace the destination directory
    pub fn build(&self, drafts: bool) -> Result<RenderedSite> {
        let rendered = self.render(drafts)?;
        generator::write_site(&rendered, &self.source_dir, &self.dest_dir)?;
        Ok(rendered)
    }

    /// Remove the destination directory
    pub fn clean(&self) -> Result<()> {
        if self.dest_dir.exists() {
            fs::remove_dir_all(&self.dest_dir)?;
            tracing::info!("Deleted: {:?}", self.dest_dir);
        }
        Ok(())
    }
}
