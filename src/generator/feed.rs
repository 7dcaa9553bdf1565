//! Atom feed and sitemap
//!
//! Both documents are derived only from content dates, never from the
//! clock, so rebuilding unchanged sources yields identical bytes.

use std::collections::BTreeMap;

use crate::config::SiteConfig;
use crate::helpers::{absolute_url, escape_xml, strip_invalid_xml_chars};
use crate::templates::SiteData;

/// Namespace for sitemap documents
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// `<updated>` for a feed with no posts
const EPOCH: &str = "1970-01-01T00:00:00+00:00";

/// Atom feed of the newest visible posts.
///
/// `contents` maps source paths to rendered bodies; the excerpt is used
/// when a post has one.
pub fn atom(config: &SiteConfig, site: &SiteData, contents: &BTreeMap<String, String>) -> String {
    let origin = absolute_url(config, "/");
    let mut feed = String::with_capacity(4096);

    feed.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
    feed.push('\n');
    feed.push_str(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#);
    feed.push('\n');
    feed.push_str(&format!("  <title>{}</title>\n", escape_xml(&site.title)));
    if !site.description.is_empty() {
        feed.push_str(&format!(
            "  <subtitle>{}</subtitle>\n",
            escape_xml(&site.description)
        ));
    }
    feed.push_str(&format!(
        "  <link href=\"{}\" rel=\"self\"/>\n",
        escape_xml(&absolute_url(config, &config.feed.path))
    ));
    feed.push_str(&format!("  <link href=\"{}\"/>\n", escape_xml(&origin)));
    feed.push_str(&format!(
        "  <updated>{}</updated>\n",
        site.updated.as_deref().unwrap_or(EPOCH)
    ));
    feed.push_str(&format!("  <id>{}</id>\n", escape_xml(&origin)));
    if !site.author.is_empty() {
        feed.push_str(&format!(
            "  <author><name>{}</name></author>\n",
            escape_xml(&site.author)
        ));
    }

    for post in site.posts.iter().take(config.feed.limit) {
        let link = escape_xml(&absolute_url(config, &post.url));
        let date = post.date.as_deref().unwrap_or(EPOCH);

        feed.push_str("  <entry>\n");
        feed.push_str(&format!("    <title>{}</title>\n", escape_xml(&post.title)));
        feed.push_str(&format!("    <link href=\"{}\"/>\n", link));
        feed.push_str(&format!("    <id>{}</id>\n", link));
        feed.push_str(&format!("    <published>{}</published>\n", date));
        feed.push_str(&format!("    <updated>{}</updated>\n", date));
        for tag in &post.tags {
            feed.push_str(&format!("    <category term=\"{}\"/>\n", escape_xml(&tag.name)));
        }

        let content = post
            .excerpt
            .as_ref()
            .or_else(|| contents.get(&post.source))
            .map(String::as_str)
            .unwrap_or("");
        let content = absolutize_urls(content, config.origin());
        let content = strip_invalid_xml_chars(&content).replace("]]>", "]]]]><![CDATA[>");
        feed.push_str(&format!(
            "    <content type=\"html\"><![CDATA[{}]]></content>\n",
            content
        ));
        feed.push_str("  </entry>\n");
    }

    feed.push_str("</feed>\n");
    feed
}

/// Root-relative `href`/`src` attributes made absolute for feed readers
fn absolutize_urls(content: &str, origin: &str) -> String {
    content
        .replace("href=\"/", &format!("href=\"{}/", origin))
        .replace("src=\"/", &format!("src=\"{}/", origin))
        .replace("href='/", &format!("href='{}/", origin))
        .replace("src='/", &format!("src='{}/", origin))
}

/// A sitemap entry: site URL and optional `YYYY-MM-DD` date
#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub url: String,
    pub lastmod: Option<String>,
}

/// Sitemap XML for the given entries, in order
pub fn sitemap(config: &SiteConfig, entries: &[SitemapEntry]) -> String {
    let mut xml = String::with_capacity(4096);

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#));
    xml.push('\n');

    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!(
            "    <loc>{}</loc>\n",
            escape_xml(&absolute_url(config, &entry.url))
        ));
        if let Some(lastmod) = &entry.lastmod {
            xml.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod));
        }
        xml.push_str("  </url>\n");
    }

    xml.push_str("</urlset>\n");
    xml
}
