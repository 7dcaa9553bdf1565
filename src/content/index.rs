//! Lookup tables for cross-item links

use std::collections::HashMap;

use super::ContentItem;

/// Maps `post_url` ids and source paths to item URLs
#[derive(Debug, Default)]
pub struct SiteIndex {
    posts: HashMap<String, String>,
    sources: HashMap<String, String>,
}

impl SiteIndex {
    pub fn build<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a ContentItem>,
    {
        let mut index = Self::default();
        for item in items {
            if let Some(id) = item.post_id() {
                index.posts.insert(id, item.url.clone());
            }
            index.sources.insert(item.source.clone(), item.url.clone());
        }
        index
    }

    /// URL of the post with file stem `id` (`2019-03-07-bf-macros`).
    /// A leading directory inside `_posts/` is ignored.
    pub fn post_url(&self, id: &str) -> Option<&str> {
        let id = id.trim().trim_matches('/');
        let stem = id.rsplit('/').next().unwrap_or(id);
        self.posts.get(stem).map(String::as_str)
    }

    /// URL of the item whose source path is `source`
    pub fn source_url(&self, source: &str) -> Option<&str> {
        let source = source.trim().trim_start_matches('/');
        self.sources.get(source).map(String::as_str)
    }
}
