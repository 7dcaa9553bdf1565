//! Generated listing pages: paginated home, tag pages, archive

use chrono::{DateTime, Datelike};
use serde_json::Value;
use std::collections::BTreeMap;
use tera::Context;

use crate::config::SiteConfig;
use crate::content::permalink;
use crate::error::{BuildReport, SiteError};
use crate::templates::{ArchiveYear, ItemSummary, LayoutSet, PageData, Pagination, SiteData, TagPage};

/// A rendered listing page
#[derive(Debug, Clone)]
pub struct Listing {
    pub url: String,
    /// Description used in duplicate-output errors
    pub origin: String,
    pub html: String,
}

/// Renders listings for one build
pub struct ListingGenerator<'a> {
    config: &'a SiteConfig,
    layouts: &'a LayoutSet,
    site: &'a SiteData,
    site_value: &'a Value,
}

impl<'a> ListingGenerator<'a> {
    pub fn new(
        config: &'a SiteConfig,
        layouts: &'a LayoutSet,
        site: &'a SiteData,
        site_value: &'a Value,
    ) -> Self {
        Self {
            config,
            layouts,
            site,
            site_value,
        }
    }

    /// Every listing enabled in the config
    pub fn generate(&self, report: &mut BuildReport) -> Vec<Listing> {
        let mut listings = Vec::new();
        if self.config.listings.index {
            listings.extend(self.home_pages(report));
        }
        if self.config.listings.tags {
            listings.extend(self.tag_pages(report));
        }
        if self.config.listings.archive {
            listings.extend(self.archive(report));
        }
        listings
    }

    /// Home page and its pagination pages. There is always a first page,
    /// even without posts.
    pub fn home_pages(&self, report: &mut BuildReport) -> Vec<Listing> {
        let posts = &self.site.posts;
        let per_page = match self.config.paginate {
            0 => posts.len().max(1),
            n => n,
        };
        let total_pages = posts.len().div_ceil(per_page).max(1);

        let mut listings = Vec::new();
        for page in 1..=total_pages {
            let url = self.page_path(page);
            let paginator = Pagination {
                page,
                per_page,
                total_pages,
                total_posts: posts.len(),
                posts: posts
                    .iter()
                    .skip((page - 1) * per_page)
                    .take(per_page)
                    .cloned()
                    .collect(),
                previous_page_path: (page > 1).then(|| self.page_path(page - 1)),
                next_page_path: (page < total_pages).then(|| self.page_path(page + 1)),
            };

            let mut context = self.context(&PageData::listing(&self.site.title, &url, "home"));
            context.insert("paginator", &paginator);
            let origin = format!("home page {}", page);
            self.render("home", &context, url, origin, report, &mut listings);
        }
        listings
    }

    /// URL of home page `n`
    fn page_path(&self, n: usize) -> String {
        if n == 1 {
            "/".to_string()
        } else {
            permalink::normalize(&self.config.paginate_path.replace(":num", &n.to_string()))
        }
    }

    /// One page per tag slug; tags differing only in case or punctuation share a page
    pub fn tag_pages(&self, report: &mut BuildReport) -> Vec<Listing> {
        let mut tags: BTreeMap<String, TagPage> = BTreeMap::new();
        for post in &self.site.posts {
            for tag in &post.tags {
                if tag.slug.is_empty() {
                    continue;
                }
                tags.entry(tag.slug.clone())
                    .or_insert_with(|| TagPage {
                        name: tag.name.clone(),
                        slug: tag.slug.clone(),
                        url: tag.url.clone(),
                        posts: Vec::new(),
                    })
                    .posts
                    .push(post.clone());
            }
        }

        let mut listings = Vec::new();
        for tag in tags.values() {
            let mut context = self.context(&PageData::listing(&tag.name, &tag.url, "tag"));
            context.insert("tag", tag);
            let origin = format!("tag page `{}`", tag.name);
            self.render("tag", &context, tag.url.clone(), origin, report, &mut listings);
        }
        listings
    }

    /// Posts grouped by year, newest first
    pub fn archive(&self, report: &mut BuildReport) -> Vec<Listing> {
        let url = permalink::normalize(&format!("/{}/", self.config.archive_dir));
        let archive = group_by_year(&self.site.posts);

        let mut context = self.context(&PageData::listing("Archive", &url, "archive"));
        context.insert("archive", &archive);

        let mut listings = Vec::new();
        self.render(
            "archive",
            &context,
            url,
            "archive page".to_string(),
            report,
            &mut listings,
        );
        listings
    }

    fn context(&self, page: &PageData) -> Context {
        let mut context = Context::new();
        context.insert("site", self.site_value);
        context.insert("page", page);
        context
    }

    fn render(
        &self,
        layout: &str,
        context: &Context,
        url: String,
        origin: String,
        report: &mut BuildReport,
        listings: &mut Vec<Listing>,
    ) {
        match self.layouts.render(layout, context, "", &origin) {
            Ok(html) => listings.push(Listing { url, origin, html }),
            Err(SiteError::UnknownLayout { layout, .. }) => report.push(SiteError::UnknownLayout {
                file: origin,
                layout,
            }),
            Err(e) => report.push(e),
        }
    }
}

fn group_by_year(posts: &[ItemSummary]) -> Vec<ArchiveYear> {
    let mut years: Vec<ArchiveYear> = Vec::new();
    for post in posts {
        let Some(year) = post
            .date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.year())
        else {
            continue;
        };
        match years.last_mut() {
            Some(last) if last.year == year => last.posts.push(post.clone()),
            _ => years.push(ArchiveYear {
                year,
                posts: vec![post.clone()],
            }),
        }
    }
    years
}
