//! Data structures for template context

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::config::SiteConfig;
use crate::content::{ContentItem, ItemKind, Tag};

/// `site` in templates
#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub description: String,
    pub author: String,
    pub url: String,
    pub baseurl: String,
    pub tag_dir: String,
    pub archive_dir: String,
    pub feed_path: Option<String>,
    /// Whether tag listing pages are generated
    pub tag_pages: bool,
    /// Date of the newest post, RFC 3339
    pub updated: Option<String>,
    /// Visible posts, newest first
    pub posts: Vec<ItemSummary>,
    /// Visible pages, by `order` then path
    pub pages: Vec<ItemSummary>,
    /// Tag name to the visible posts carrying it
    pub tags: BTreeMap<String, Vec<ItemSummary>>,
    /// Custom `_config.yml` keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SiteData {
    /// Build from sorted posts and pages; `excerpts` maps source paths to
    /// rendered excerpts
    pub fn new(
        config: &SiteConfig,
        posts: &[ContentItem],
        pages: &[ContentItem],
        excerpts: &BTreeMap<String, String>,
    ) -> Self {
        let summarize = |items: &[ContentItem]| -> Vec<ItemSummary> {
            items
                .iter()
                .filter(|item| !item.hidden)
                .map(|item| ItemSummary::new(item, config, excerpts.get(&item.source)))
                .collect()
        };
        let posts = summarize(posts);
        let pages = summarize(pages);

        let mut tags: BTreeMap<String, Vec<ItemSummary>> = BTreeMap::new();
        for post in &posts {
            for tag in &post.tags {
                tags.entry(tag.name.clone()).or_default().push(post.clone());
            }
        }

        let extra = config
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), yaml_to_json(v)))
            .collect();

        Self {
            title: config.title.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            baseurl: config.base_path(),
            tag_dir: config.tag_dir.clone(),
            archive_dir: config.archive_dir.clone(),
            feed_path: config.feed.enable.then(|| config.feed.path.clone()),
            tag_pages: config.listings.tags,
            updated: posts.iter().filter_map(|p| p.date.clone()).next(),
            posts,
            pages,
            tags,
            extra,
        }
    }
}

/// A post or page as seen from listings
#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub title: String,
    pub url: String,
    pub source: String,
    pub kind: ItemKind,
    pub date: Option<String>,
    pub tags: Vec<Tag>,
    pub excerpt: Option<String>,
}

impl ItemSummary {
    pub fn new(item: &ContentItem, config: &SiteConfig, excerpt: Option<&String>) -> Self {
        Self {
            title: item.title.clone(),
            url: item.url.clone(),
            source: item.source.clone(),
            kind: item.kind,
            date: item.date.map(|d| d.to_rfc3339()),
            tags: item
                .tags
                .iter()
                .map(|t| Tag::new(t, &config.tag_dir))
                .collect(),
            excerpt: excerpt.cloned(),
        }
    }
}

/// Title and URL of a neighbouring item
#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub title: String,
    pub url: String,
}

impl From<&ContentItem> for Link {
    fn from(item: &ContentItem) -> Self {
        Self {
            title: item.title.clone(),
            url: item.url.clone(),
        }
    }
}

/// `page` in templates
#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub title: String,
    pub url: String,
    pub layout: String,
    pub source: String,
    pub slug: String,
    pub kind: Option<ItemKind>,
    pub date: Option<String>,
    pub tags: Vec<Tag>,
    pub categories: Vec<String>,
    pub hidden: bool,
    pub excerpt: Option<String>,
    /// Older post
    pub previous: Option<Link>,
    /// Newer post
    pub next: Option<Link>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageData {
    pub fn from_item(item: &ContentItem, config: &SiteConfig) -> Self {
        let extra = item
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), yaml_to_json(v)))
            .collect();

        Self {
            title: item.title.clone(),
            url: item.url.clone(),
            layout: item.layout.clone(),
            source: item.source.clone(),
            slug: item.slug.clone(),
            kind: Some(item.kind),
            date: item.date.map(|d| d.to_rfc3339()),
            tags: item
                .tags
                .iter()
                .map(|t| Tag::new(t, &config.tag_dir))
                .collect(),
            categories: item.categories.clone(),
            hidden: item.hidden,
            excerpt: None,
            previous: None,
            next: None,
            extra,
        }
    }

    /// A generated listing page
    pub fn listing(title: &str, url: &str, layout: &str) -> Self {
        Self {
            title: title.to_string(),
            url: url.to_string(),
            layout: layout.to_string(),
            source: String::new(),
            slug: String::new(),
            kind: None,
            date: None,
            tags: Vec::new(),
            categories: Vec::new(),
            hidden: false,
            excerpt: None,
            previous: None,
            next: None,
            extra: Map::new(),
        }
    }
}

/// `paginator` on home pages
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub total_posts: usize,
    pub posts: Vec<ItemSummary>,
    pub previous_page_path: Option<String>,
    pub next_page_path: Option<String>,
}

/// `tag` on tag pages
#[derive(Debug, Clone, Serialize)]
pub struct TagPage {
    pub name: String,
    pub slug: String,
    pub url: String,
    pub posts: Vec<ItemSummary>,
}

/// One year of `archive` on the archive page
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveYear {
    pub year: i32,
    pub posts: Vec<ItemSummary>,
}

/// Convert YAML front matter to JSON for templates.
/// Non-string mapping keys are rendered as YAML scalars.
pub fn yaml_to_json(value: &serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(items) => Value::Array(items.iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

fn yaml_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_to_json() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("a: 1\nb: [x, true]\n3: three\nc: 1.5").unwrap();
        let json = yaml_to_json(&yaml);
        assert_eq!(json["a"], 1);
        assert_eq!(json["b"][0], "x");
        assert_eq!(json["b"][1], true);
        assert_eq!(json["3"], "three");
        assert_eq!(json["c"], 1.5);
    }
}
