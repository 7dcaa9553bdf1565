//! Site configuration (_config.yml)

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub author: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub baseurl: String,
    pub permalink: String,

    // Directory
    pub destination: String,
    pub layouts_dir: String,
    pub includes_dir: String,
    pub tag_dir: String,
    pub archive_dir: String,
    pub exclude: Vec<String>,
    pub include: Vec<String>,

    // Writing
    pub markdown_ext: String,
    pub excerpt_separator: String,
    pub show_drafts: bool,
    pub highlight: HighlightConfig,

    // Listings
    pub paginate: usize,
    pub paginate_path: String,
    pub listings: ListingsConfig,
    pub feed: FeedConfig,
    pub sitemap: bool,

    // Checks
    pub check_links: bool,

    // Store any additional fields, exposed to templates as `site.<key>`
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "My Blog".to_string(),
            description: String::new(),
            author: String::new(),
            timezone: String::new(),

            url: "http://localhost:4000".to_string(),
            baseurl: String::new(),
            permalink: "date".to_string(),

            destination: "_site".to_string(),
            layouts_dir: "_layouts".to_string(),
            includes_dir: "_includes".to_string(),
            tag_dir: "tags".to_string(),
            archive_dir: "archives".to_string(),
            exclude: vec![
                "Gemfile".to_string(),
                "Gemfile.lock".to_string(),
                "README.md".to_string(),
                "node_modules".to_string(),
                "vendor".to_string(),
            ],
            include: Vec::new(),

            markdown_ext: "markdown,mkdown,mkdn,mkd,md".to_string(),
            excerpt_separator: "<!-- more -->".to_string(),
            show_drafts: false,
            highlight: HighlightConfig::default(),

            paginate: 10,
            paginate_path: "/page:num/".to_string(),
            listings: ListingsConfig::default(),
            feed: FeedConfig::default(),
            sitemap: true,

            check_links: true,

            extra: BTreeMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        // An empty config file is valid and means "all defaults"
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: SiteConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        config.timezone()?;
        Ok(config)
    }

    /// Base path without a trailing slash: `""` or `"/blog"`
    pub fn base_path(&self) -> String {
        let trimmed = self.baseurl.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Site origin without a trailing slash
    pub fn origin(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Timezone used to interpret dates without an explicit offset
    pub fn timezone(&self) -> Result<Tz> {
        let name = self.timezone.trim();
        if name.is_empty() {
            return Ok(Tz::UTC);
        }
        name.parse::<Tz>()
            .map_err(|e| anyhow!("Unknown timezone `{}` in config: {}", name, e))
    }

    /// File extensions treated as Markdown
    pub fn markdown_extensions(&self) -> Vec<String> {
        self.markdown_ext
            .split(',')
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// Whether a file extension is rendered as Markdown
    pub fn is_markdown_ext(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.markdown_extensions().iter().any(|e| *e == ext)
    }

    /// Post permalink pattern, with the built-in style names expanded
    pub fn permalink_pattern(&self) -> &str {
        match self.permalink.trim() {
            "date" => "/:categories/:year/:month/:day/:title:output_ext",
            "pretty" => "/:categories/:year/:month/:day/:title/",
            "ordinal" => "/:categories/:year/:y_day/:title:output_ext",
            "none" => "/:categories/:title:output_ext",
            pattern => pattern,
        }
    }
}

/// Code highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub enable: bool,
    pub theme: String,
    pub line_numbers: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enable: true,
            theme: "base16-ocean.dark".to_string(),
            line_numbers: false,
        }
    }
}

/// Which generated listing pages to emit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingsConfig {
    pub index: bool,
    pub tags: bool,
    pub archive: bool,
}

impl Default for ListingsConfig {
    fn default() -> Self {
        Self {
            index: true,
            tags: true,
            archive: true,
        }
    }
}

/// Atom feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub enable: bool,
    pub path: String,
    pub limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enable: true,
            path: "/feed.xml".to_string(),
            limit: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.destination, "_site");
        assert_eq!(config.paginate, 10);
        assert_eq!(config.base_path(), "");
        assert!(config.is_markdown_ext("md"));
        assert!(config.is_markdown_ext("Markdown"));
        assert!(!config.is_markdown_ext("html"));
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: Side Projects
author: Test User
baseurl: /blog/
permalink: pretty
paginate: 5
listings:
  archive: false
github_username: someone
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "Side Projects");
        assert_eq!(config.author, "Test User");
        assert_eq!(config.base_path(), "/blog");
        assert_eq!(config.paginate, 5);
        assert!(config.listings.index);
        assert!(!config.listings.archive);
        assert_eq!(
            config.permalink_pattern(),
            "/:categories/:year/:month/:day/:title/"
        );
        assert_eq!(
            config.extra.get("github_username").and_then(|v| v.as_str()),
            Some("someone")
        );
    }

    #[test]
    fn test_custom_permalink_pattern_kept() {
        let config = SiteConfig {
            permalink: "/blog/:year/:title/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.permalink_pattern(), "/blog/:year/:title/");
    }

    #[test]
    fn test_timezone() {
        let mut config = SiteConfig::default();
        assert_eq!(config.timezone().unwrap(), Tz::UTC);
        config.timezone = "Europe/Berlin".to_string();
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Berlin);
        config.timezone = "Mars/Olympus".to_string();
        assert!(config.timezone().is_err());
    }
}
