//! Generator module - renders the whole site in memory, then writes it
//!
//! Nothing touches the destination until every item, listing and check
//! has succeeded.

pub mod feed;
pub mod listing;

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tera::Context;

use crate::check;
use crate::config::SiteConfig;
use crate::content::{permalink, ContentItem, ContentSet, MarkdownRenderer, SiteIndex};
use crate::error::{BuildFailed, BuildReport, SiteError};
use crate::templates::{Includes, LayoutSet, Link, Liquid, PageData, Scope, SiteData};

use feed::SitemapEntry;
use listing::ListingGenerator;

/// Contents of one output file
#[derive(Debug, Clone)]
pub enum OutputContent {
    Rendered(String),
    /// Copied byte-for-byte from this source file
    Copy(PathBuf),
}

#[derive(Debug, Clone)]
pub struct OutputFile {
    /// Source path or listing that produced the file
    pub origin: String,
    pub content: OutputContent,
}

/// Every file a build emits, keyed by path relative to the destination
#[derive(Debug, Default)]
pub struct RenderedSite {
    files: BTreeMap<String, OutputFile>,
}

impl RenderedSite {
    /// Add an output file; a second producer of the same path is an error
    pub fn insert(
        &mut self,
        path: String,
        origin: &str,
        content: OutputContent,
    ) -> Result<(), SiteError> {
        match self.files.entry(path) {
            Entry::Occupied(existing) => Err(SiteError::DuplicatePermalink {
                output: existing.key().clone(),
                first: existing.get().origin.clone(),
                second: origin.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(OutputFile {
                    origin: origin.to_string(),
                    content,
                });
                Ok(())
            }
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&OutputFile> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OutputFile)> {
        self.files.iter().map(|(path, file)| (path.as_str(), file))
    }

    /// Rendered HTML files: (output path, origin, html)
    pub fn html_pages(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.files.iter().filter_map(|(path, file)| match &file.content {
            OutputContent::Rendered(html) if is_html(path) => {
                Some((path.as_str(), file.origin.as_str(), html.as_str()))
            }
            _ => None,
        })
    }
}

fn is_html(path: &str) -> bool {
    path.ends_with(".html") || path.ends_with(".htm")
}

/// Body of an item after substitution and Markdown
#[derive(Debug, Clone)]
struct RenderedBody {
    html: String,
    excerpt: Option<String>,
}

/// Renders a loaded content set
pub struct Generator<'a> {
    config: &'a SiteConfig,
    layouts: &'a LayoutSet,
    includes: &'a Includes,
    markdown: MarkdownRenderer,
}

impl<'a> Generator<'a> {
    pub fn new(config: &'a SiteConfig, layouts: &'a LayoutSet, includes: &'a Includes) -> Self {
        Self {
            config,
            layouts,
            includes,
            markdown: MarkdownRenderer::with_options(&config.highlight),
        }
    }

    /// Render every item, listing and asset, then run the integrity checks
    pub fn render(&self, content: &ContentSet) -> Result<RenderedSite, BuildFailed> {
        let mut report = BuildReport::new();

        for item in content.items() {
            if !self.layouts.contains(&item.layout) {
                report.push(SiteError::UnknownLayout {
                    file: item.source.clone(),
                    layout: item.layout.clone(),
                });
            }
        }

        let index = SiteIndex::build(content.items());
        let liquid = Liquid::new(self.config, &index, self.includes);
        let neighbours = neighbours(&content.posts);

        // Bodies see `site` without excerpts, which only exist after this pass
        let body_site = to_value(&SiteData::new(
            self.config,
            &content.posts,
            &content.pages,
            &BTreeMap::new(),
        ));
        let mut bodies = BTreeMap::new();
        for item in content.items() {
            let page = self.page_data(item, &neighbours);
            match self.render_body(&liquid, item, &body_site, &page) {
                Ok(body) => {
                    bodies.insert(item.source.clone(), body);
                }
                Err(e) => report.push(e),
            }
        }

        let excerpts: BTreeMap<String, String> = bodies
            .iter()
            .filter_map(|(source, body)| Some((source.clone(), body.excerpt.clone()?)))
            .collect();
        let site_data = SiteData::new(self.config, &content.posts, &content.pages, &excerpts);
        let site_value = to_value(&site_data);

        let mut site = RenderedSite::default();
        for item in content.items() {
            let Some(body) = bodies.get(&item.source) else {
                continue;
            };
            if !self.layouts.contains(&item.layout) {
                continue;
            }

            let mut page = self.page_data(item, &neighbours);
            page.excerpt = body.excerpt.clone();
            let mut context = Context::new();
            context.insert("site", &site_value);
            context.insert("page", &page);

            let html = match self
                .layouts
                .render(&item.layout, &context, &body.html, &item.source)
            {
                Ok(html) => html,
                Err(e) => {
                    report.push(e);
                    continue;
                }
            };
            if let Err(e) = site.insert(
                item.output_file(),
                &item.source,
                OutputContent::Rendered(html),
            ) {
                report.push(e);
            }
        }

        let listings = ListingGenerator::new(self.config, self.layouts, &site_data, &site_value)
            .generate(&mut report);
        let mut sitemap_entries = sitemap_entries(content);
        for listing in listings {
            sitemap_entries.push(SitemapEntry {
                url: listing.url.clone(),
                lastmod: None,
            });
            if let Err(e) = site.insert(
                permalink::output_file(&listing.url),
                &listing.origin,
                OutputContent::Rendered(listing.html),
            ) {
                report.push(e);
            }
        }

        if self.config.feed.enable {
            let contents: BTreeMap<String, String> = bodies
                .iter()
                .map(|(source, body)| (source.clone(), body.html.clone()))
                .collect();
            let atom = feed::atom(self.config, &site_data, &contents);
            let path = permalink::output_file(&permalink::normalize(&self.config.feed.path));
            if let Err(e) = site.insert(path, "Atom feed", OutputContent::Rendered(atom)) {
                report.push(e);
            }
        }

        if self.config.sitemap {
            let xml = feed::sitemap(self.config, &sitemap_entries);
            if let Err(e) = site.insert(
                "sitemap.xml".to_string(),
                "sitemap",
                OutputContent::Rendered(xml),
            ) {
                report.push(e);
            }
        }

        for asset in &content.assets {
            if let Err(e) = site.insert(
                asset.output_file().to_string(),
                &asset.source,
                OutputContent::Copy(asset.full_source.clone()),
            ) {
                report.push(e);
            }
        }

        // Links into items that failed to render would only repeat those errors
        if self.config.check_links && report.is_empty() {
            report.extend(check::check_references(&site, self.config));
        }

        report.into_result()?;
        tracing::debug!("Rendered {} output files", site.len());
        Ok(site)
    }

    fn page_data(
        &self,
        item: &ContentItem,
        neighbours: &HashMap<String, (Option<Link>, Option<Link>)>,
    ) -> PageData {
        let mut page = PageData::from_item(item, self.config);
        if let Some((previous, next)) = neighbours.get(&item.source) {
            page.previous = previous.clone();
            page.next = next.clone();
        }
        page
    }

    fn render_body(
        &self,
        liquid: &Liquid<'_>,
        item: &ContentItem,
        site: &Value,
        page: &PageData,
    ) -> Result<RenderedBody, SiteError> {
        let page = to_value(page);
        let scope = Scope {
            site,
            page: &page,
            include: None,
        };
        let text = liquid.render(&item.body, item.markdown, &scope, &item.source)?;
        let excerpt =
            MarkdownRenderer::split_excerpt(&text, &self.config.excerpt_separator, item.markdown);

        let render = |text: &str| {
            if item.markdown {
                self.markdown.render(text)
            } else {
                text.to_string()
            }
        };
        Ok(RenderedBody {
            html: render(&text),
            excerpt: excerpt.map(render),
        })
    }
}

/// Older/newer links among visible posts, keyed by source path
fn neighbours(posts: &[ContentItem]) -> HashMap<String, (Option<Link>, Option<Link>)> {
    let visible: Vec<&ContentItem> = posts.iter().filter(|p| !p.hidden).collect();
    visible
        .iter()
        .enumerate()
        .map(|(i, post)| {
            let previous = visible.get(i + 1).map(|p| Link::from(*p));
            let next = i
                .checked_sub(1)
                .and_then(|j| visible.get(j))
                .map(|p| Link::from(*p));
            (post.source.clone(), (previous, next))
        })
        .collect()
}

/// Visible HTML items for the sitemap
fn sitemap_entries(content: &ContentSet) -> Vec<SitemapEntry> {
    content
        .items()
        .filter(|item| !item.hidden && is_html(&item.output_file()))
        .map(|item| SitemapEntry {
            url: item.url.clone(),
            lastmod: item.date.map(|d| d.format("%Y-%m-%d").to_string()),
        })
        .collect()
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

/// Replace the destination with the rendered site
pub fn write_site(site: &RenderedSite, source_dir: &Path, dest_dir: &Path) -> Result<()> {
    let source = source_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {:?}", source_dir))?;
    let dest = dest_dir.canonicalize().unwrap_or_else(|_| dest_dir.to_path_buf());
    if dest == source || source.starts_with(&dest) {
        bail!(
            "Refusing to write into {:?}: it contains the source directory",
            dest_dir
        );
    }

    let outside = |path: &str| {
        !Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
    };
    if let Some((path, _)) = site.iter().find(|(path, _)| outside(path)) {
        bail!("Refusing to write {:?} outside {:?}", path, dest_dir);
    }

    if dest_dir.exists() {
        fs::remove_dir_all(dest_dir)
            .with_context(|| format!("Failed to clear {:?}", dest_dir))?;
    }
    fs::create_dir_all(dest_dir).with_context(|| format!("Failed to create {:?}", dest_dir))?;

    for (path, file) in site.iter() {
        let output = dest_dir.join(path);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir {:?}", parent))?;
        }
        match &file.content {
            OutputContent::Rendered(text) => fs::write(&output, text)
                .with_context(|| format!("Failed to write {:?}", output))?,
            OutputContent::Copy(from) => {
                fs::copy(from, &output)
                    .with_context(|| format!("Failed to copy {:?} to {:?}", from, output))?;
            }
        }
        tracing::debug!("Generated: {}", path);
    }

    Ok(())
}
