//! Content item model

use chrono::{DateTime, FixedOffset, NaiveDate};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::path::PathBuf;

use super::permalink;

lazy_static! {
    static ref POST_NAME: Regex =
        Regex::new(r"^(\d{4})-(\d{2})-(\d{2})-(.+)\.([A-Za-z0-9]+)$").unwrap();
}

/// What kind of content file an item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A dated file under `_posts/`
    Post,
    /// An undated file under `_drafts/`, built only on request
    Draft,
    /// Any other file with a metadata block
    Page,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Post => "post",
            ItemKind::Draft => "draft",
            ItemKind::Page => "page",
        }
    }
}

/// A post or page
#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    pub kind: ItemKind,

    /// Source path relative to the source directory, `/`-separated.
    /// This is the item's identity.
    pub source: String,

    /// Full source file path
    #[serde(skip)]
    pub full_source: PathBuf,

    pub title: String,

    /// Layout template name
    pub layout: String,

    /// Output URL without the base path
    pub url: String,

    /// Slug taken from the file name
    pub slug: String,

    /// Publication date (posts and drafts; pages only when declared)
    pub date: Option<DateTime<FixedOffset>>,

    pub tags: Vec<String>,

    pub categories: Vec<String>,

    /// Excluded from listings, still rendered at its URL
    pub hidden: bool,

    /// Explicit position in page listings
    pub order: Option<i64>,

    /// Whether the body is Markdown (otherwise HTML)
    pub markdown: bool,

    /// Raw body after the metadata block
    #[serde(skip)]
    pub body: String,

    /// Custom front-matter fields
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl ContentItem {
    pub fn is_post(&self) -> bool {
        matches!(self.kind, ItemKind::Post | ItemKind::Draft)
    }

    /// File written for this item, relative to the destination
    pub fn output_file(&self) -> String {
        permalink::output_file(&self.url)
    }

    /// `post_url` identifier: the file stem (`2019-03-07-bf-macros`)
    pub fn post_id(&self) -> Option<String> {
        if self.kind != ItemKind::Post {
            return None;
        }
        let file_name = self.source.rsplit('/').next().unwrap_or(&self.source);
        Some(permalink::strip_extension(file_name).to_string())
    }
}

/// Newest first; ties by source path
pub fn compare_posts(a: &ContentItem, b: &ContentItem) -> Ordering {
    b.date.cmp(&a.date).then_with(|| a.source.cmp(&b.source))
}

/// Explicit `order` first, then source path
pub fn compare_pages(a: &ContentItem, b: &ContentItem) -> Ordering {
    let key = |item: &ContentItem| item.order.unwrap_or(i64::MAX);
    key(a)
        .cmp(&key(b))
        .then_with(|| a.source.cmp(&b.source))
}

/// Parsed `YYYY-MM-DD-slug.ext` post file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostName {
    pub date: NaiveDate,
    pub slug: String,
    pub ext: String,
}

impl PostName {
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = POST_NAME.captures(file_name)?;
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;

        Some(Self {
            date,
            slug: caps[4].to_string(),
            ext: caps[5].to_ascii_lowercase(),
        })
    }
}

/// Title used when front matter has none: the slug with dashes as spaces
pub fn title_from_slug(slug: &str) -> String {
    let words = slug.replace(['-', '_'], " ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// A tag with the URL of its listing page
#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub name: String,
    pub slug: String,
    pub url: String,
}

impl Tag {
    pub fn new(name: &str, tag_dir: &str) -> Self {
        let slug = slug::slugify(name);
        let url = permalink::normalize(&format!("/{}/{}/", tag_dir, slug));
        Self {
            name: name.to_string(),
            slug,
            url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_name() {
        let name = PostName::parse("2019-03-07-brainfuck-macros.md").unwrap();
        assert_eq!(name.date, NaiveDate::from_ymd_opt(2019, 3, 7).unwrap());
        assert_eq!(name.slug, "brainfuck-macros");
        assert_eq!(name.ext, "md");
    }

    #[test]
    fn test_reject_bad_post_names() {
        assert!(PostName::parse("brainfuck-macros.md").is_none());
        assert!(PostName::parse("2019-13-07-bad-month.md").is_none());
        assert!(PostName::parse("2019-03-07-no-extension").is_none());
    }

    #[test]
    fn test_title_from_slug() {
        assert_eq!(title_from_slug("wasm-game-of-life"), "Wasm game of life");
        assert_eq!(title_from_slug(""), "");
    }

    #[test]
    fn test_tag_url() {
        let tag = Tag::new("Web Assembly", "tags");
        assert_eq!(tag.slug, "web-assembly");
        assert_eq!(tag.url, "/tags/web-assembly/");
    }
}
