//! Build-time integrity checks over rendered output
//!
//! Every `src`/`href` in a rendered HTML file that points into the site
//! must resolve to a file the build emits. Root-relative references must
//! carry the base path, since a forgotten `{{ site.baseurl }}` is the
//! usual way a link breaks once the site is served from a subdirectory.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

use crate::config::SiteConfig;
use crate::error::{BuildReport, SiteError};
use crate::generator::RenderedSite;
use crate::helpers::{decode_url, is_external, resolve_relative};

lazy_static! {
    static ref REFERENCE: Regex =
        Regex::new(r#"<[a-zA-Z][^<>]*?\s(src|href)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
    static ref SCRIPT: Regex = Regex::new(r"(?is)(<script\b[^>]*>).*?</script>").unwrap();
    static ref STYLE: Regex = Regex::new(r"(?is)(<style\b[^>]*>).*?</style>").unwrap();
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
}

/// A reference found in a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// `src` or `href`
    pub attribute: &'static str,
    pub value: String,
}

/// `src`/`href` values in `html`, outside scripts, styles and comments
pub fn references(html: &str) -> Vec<Reference> {
    let html = COMMENT.replace_all(html, "");
    let html = SCRIPT.replace_all(&html, "$1</script>");
    let html = STYLE.replace_all(&html, "$1</style>");

    REFERENCE
        .captures_iter(&html)
        .filter_map(|caps| {
            let attribute = if &caps[1] == "src" { "src" } else { "href" };
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
            Some(Reference {
                attribute,
                value: value.replace("&amp;", "&"),
            })
        })
        .collect()
}

/// Check every internal reference in every rendered HTML file
pub fn check_references(site: &RenderedSite, config: &SiteConfig) -> BuildReport {
    let mut report = BuildReport::new();
    let base = config.base_path();

    for (output, origin, html) in site.html_pages() {
        let page_url = format!("/{}", output);
        let mut seen = BTreeSet::new();

        for reference in references(html) {
            let Some(target) = internal_path(&reference.value) else {
                continue;
            };
            if !seen.insert(reference.value.clone()) {
                continue;
            }

            let resolved = if target.starts_with('/') {
                strip_base(&target, &base)
            } else {
                Some(resolve_relative(&page_url, &target))
            };

            let found = resolved.as_deref().is_some_and(|path| resolves(site, path));
            if !found {
                tracing::debug!("{}: unresolved {} `{}`", origin, reference.attribute, reference.value);
                report.push(missing(origin, &reference, &target));
            }
        }
    }

    report
}

/// The path part of a site-internal reference, percent-decoded
fn internal_path(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') || is_external(value) {
        return None;
    }
    let end = value.find(['?', '#']).unwrap_or(value.len());
    let path = &value[..end];
    if path.is_empty() {
        return None;
    }
    Some(decode_url(path))
}

/// Remove the base path from a root-relative reference; `None` when the
/// reference lies outside it
fn strip_base(path: &str, base: &str) -> Option<String> {
    if base.is_empty() {
        return Some(path.to_string());
    }
    if path == base {
        return Some("/".to_string());
    }
    path.strip_prefix(base)
        .filter(|rest| rest.starts_with('/'))
        .map(str::to_string)
}

/// Whether a site path names an emitted file, as a static server would map it
fn resolves(site: &RenderedSite, path: &str) -> bool {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return site.contains("index.html");
    }
    if let Some(dir) = path.strip_suffix('/') {
        return site.contains(&format!("{}/index.html", dir));
    }
    site.contains(path)
        || site.contains(&format!("{}/index.html", path))
        || site.contains(&format!("{}.html", path))
}

fn missing(origin: &str, reference: &Reference, target: &str) -> SiteError {
    let last = target.rsplit('/').next().unwrap_or(target);
    let is_page = match last.rsplit_once('.') {
        Some((_, ext)) => matches!(ext.to_ascii_lowercase().as_str(), "html" | "htm"),
        None => true,
    };

    if reference.attribute == "src" || !is_page {
        SiteError::MissingAsset {
            file: origin.to_string(),
            href: reference.value.clone(),
        }
    } else {
        SiteError::BrokenLink {
            file: origin.to_string(),
            href: reference.value.clone(),
        }
    }
}
