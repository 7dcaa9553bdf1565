//! Permalink patterns and output paths

use chrono::{DateTime, FixedOffset};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r":([a-z_]+)").unwrap();
}

/// Values available to a permalink pattern
#[derive(Debug, Clone, Copy)]
pub struct UrlParts<'a> {
    pub date: Option<&'a DateTime<FixedOffset>>,
    /// Slug taken from the file name
    pub title: &'a str,
    pub categories: &'a [String],
    /// Extension of the rendered file, with the dot (`.html`)
    pub output_ext: &'a str,
    /// Source path relative to the source dir, without extension
    pub path: &'a str,
}

/// Expand `:placeholders` in a permalink pattern and normalize the result.
///
/// Unknown placeholders are kept as written. Date placeholders expand to
/// nothing for items without a date.
pub fn expand(pattern: &str, parts: &UrlParts<'_>) -> String {
    let expanded = PLACEHOLDER.replace_all(pattern, |caps: &Captures| {
        placeholder(&caps[1], parts).unwrap_or_else(|| caps[0].to_string())
    });
    normalize(&expanded)
}

fn placeholder(name: &str, parts: &UrlParts<'_>) -> Option<String> {
    let date = |fmt: &str| {
        parts
            .date
            .map(|d| d.format(fmt).to_string())
            .unwrap_or_default()
    };

    let value = match name {
        "year" => date("%Y"),
        "short_year" => date("%y"),
        "month" => date("%m"),
        "i_month" => date("%-m"),
        "day" => date("%d"),
        "i_day" => date("%-d"),
        "y_day" => date("%j"),
        "hour" => date("%H"),
        "minute" => date("%M"),
        "second" => date("%S"),
        "title" => parts.title.to_string(),
        "slug" => slug::slugify(parts.title),
        "categories" => parts
            .categories
            .iter()
            .map(|c| slug::slugify(c))
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("/"),
        "output_ext" => parts.output_ext.to_string(),
        "path" => parts.path.to_string(),
        "basename" => parts
            .path
            .rsplit('/')
            .next()
            .unwrap_or(parts.path)
            .to_string(),
        _ => return None,
    };
    Some(value)
}

/// Collapse empty segments and make the URL absolute; a trailing slash is kept
pub fn normalize(url: &str) -> String {
    let trailing = url.ends_with('/');
    let parts: Vec<&str> = url.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", parts.join("/"));
    if trailing {
        result.push('/');
    }
    result
}

/// Whether a URL has `.` or `..` segments, which would point outside the
/// file its permalink names
pub fn has_dot_segments(url: &str) -> bool {
    url.split('/').any(|part| part == "." || part == "..")
}

/// Default URL of a page: its source path with the output extension,
/// with `index` files mapping to their directory
pub fn page_url(source: &str, output_ext: &str) -> String {
    let without_ext = strip_extension(source);
    if without_ext == "index" || without_ext.ends_with("/index") {
        normalize(&format!("/{}/", without_ext.trim_end_matches("index")))
    } else {
        normalize(&format!("/{}{}", without_ext, output_ext))
    }
}

/// Remove the final extension of a `/`-separated path
pub fn strip_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot) if dot > 0 && !path[dot..].contains('/') => &path[..dot],
        _ => path,
    }
}

/// File written for a URL, relative to the destination directory.
///
/// `/a/` and `/a` both become `a/index.html`; URLs whose last segment
/// has an extension are written as-is.
pub fn output_file(url: &str) -> String {
    let path = url.trim_start_matches('/');
    if path.is_empty() || path.ends_with('/') {
        return format!("{}index.html", path);
    }

    let last = path.rsplit('/').next().unwrap_or(path);
    if last.contains('.') {
        path.to_string()
    } else {
        format!("{}/index.html", path)
    }
}
