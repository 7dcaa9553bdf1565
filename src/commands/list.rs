//! List site content

use anyhow::Result;
use std::collections::BTreeMap;

use crate::content::{ContentItem, Tag};
use crate::templates::LayoutSet;
use crate::Site;

/// List site content by type
pub fn run(site: &Site, content_type: &str, drafts: bool) -> Result<()> {
    if matches!(content_type, "layout" | "layouts") {
        let layouts = LayoutSet::load(&site.config, Some(site.layouts_dir.as_path()))?;
        let names: Vec<_> = layouts.names().collect();
        println!("Layouts ({}):", names.len());
        for name in names {
            println!("  {}", name);
        }
        return Ok(());
    }

    let content = site.load_content(drafts)?;

    match content_type {
        "post" | "posts" => {
            println!("Posts ({}):", content.posts.len());
            for post in &content.posts {
                println!("  {} - {} [{}]{}", date(post), post.title, post.source, marker(post));
            }
        }
        "page" | "pages" => {
            println!("Pages ({}):", content.pages.len());
            for page in &content.pages {
                println!("  {} -> {} [{}]{}", page.title, page.url, page.source, marker(page));
            }
        }
        "tag" | "tags" => {
            let tags = count_tags(&content.posts, &site.config.tag_dir);
            println!("Tags ({}):", tags.len());
            let mut tags: Vec<_> = tags.into_values().collect();
            tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.slug.cmp(&b.0.slug)));
            for (tag, count) in tags {
                println!("  {} ({}) -> {}", tag.name, count, tag.url);
            }
        }
        "hidden" => {
            let hidden: Vec<_> = content.items().filter(|i| i.hidden).collect();
            println!("Hidden ({}):", hidden.len());
            for item in hidden {
                println!("  {} -> {} [{}]", item.title, item.url, item.source);
            }
        }
        _ => {
            anyhow::bail!(
                "Unknown type: {}. Available: post, page, tag, hidden, layout",
                content_type
            );
        }
    }

    Ok(())
}

fn date(item: &ContentItem) -> String {
    item.date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "----------".to_string())
}

fn marker(item: &ContentItem) -> &'static str {
    if item.hidden {
        " (hidden)"
    } else {
        ""
    }
}

/// Tags of visible posts keyed by slug, with post counts
fn count_tags(posts: &[ContentItem], tag_dir: &str) -> BTreeMap<String, (Tag, usize)> {
    let mut tags: BTreeMap<String, (Tag, usize)> = BTreeMap::new();
    for post in posts.iter().filter(|p| !p.hidden) {
        for name in &post.tags {
            let tag = Tag::new(name, tag_dir);
            if tag.slug.is_empty() {
                continue;
            }
            tags.entry(tag.slug.clone()).or_insert((tag, 0)).1 += 1;
        }
    }
    tags
}
