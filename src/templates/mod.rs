//! Layout templates (Tera) and body substitution
//!
//! Layouts live in `_layouts/<name>.html`. A layout may itself declare
//! `layout: <parent>` in a metadata block, in which case its output becomes
//! the parent's `content`. A small built-in set is embedded in the binary
//! so a site without `_layouts/` still renders; site layouts with the same
//! name take precedence.

pub mod data;
pub mod liquid;

pub use data::*;
pub use liquid::{Includes, Liquid, Scope};

use anyhow::{anyhow, Context as _, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tera::{Context, Tera};
use walkdir::WalkDir;

use crate::config::SiteConfig;
use crate::content::FrontMatter;
use crate::error::SiteError;
use crate::helpers::{absolute_url, escape_xml, format_rfc3339, relative_url, strip_html, truncate};

const BUILTIN_LAYOUTS: [(&str, &str); 6] = [
    ("default", include_str!("builtin/default.html")),
    ("post", include_str!("builtin/post.html")),
    ("page", include_str!("builtin/page.html")),
    ("home", include_str!("builtin/home.html")),
    ("tag", include_str!("builtin/tag.html")),
    ("archive", include_str!("builtin/archive.html")),
];

/// Chained layouts are rendered at most this deep
const MAX_LAYOUT_DEPTH: usize = 8;

/// Layout names meaning "emit the body as-is"
pub fn is_null_layout(name: &str) -> bool {
    matches!(name, "none" | "null")
}

#[derive(Debug, Clone)]
struct Layout {
    /// Tera template name
    template: String,
    /// Source file, for error messages
    file: String,
    parent: Option<String>,
}

/// All layouts known to a build
pub struct LayoutSet {
    tera: Tera,
    layouts: BTreeMap<String, Layout>,
}

impl LayoutSet {
    /// Built-in layouts only
    pub fn builtin(config: &SiteConfig) -> Result<Self> {
        Self::load(config, None)
    }

    /// Built-in layouts overridden by the files in `layouts_dir`.
    ///
    /// Top-level files define layouts named by their file stem; files in
    /// subdirectories are registered by relative path for `{% include %}`
    /// and `{% extends %}`.
    pub fn load(config: &SiteConfig, layouts_dir: Option<&Path>) -> Result<Self> {
        let mut tera = Tera::default();

        // Output is HTML assembled from already-rendered bodies
        tera.autoescape_on(vec![]);
        register_filters(&mut tera, config);

        let mut layouts = BTreeMap::new();
        let mut templates = Vec::new();
        for (name, source) in BUILTIN_LAYOUTS {
            let file = format!("<builtin>/{}.html", name);
            let (parent, body) = split_layout(source, &file)?;
            let template = format!("{}.html", name);
            templates.push((template.clone(), body.to_string()));
            layouts.insert(
                name.to_string(),
                Layout {
                    template,
                    file,
                    parent,
                },
            );
        }
        tera.add_raw_templates(templates)
            .map_err(|e| anyhow!("built-in layouts: {}", describe(&e)))?;

        if let Some(dir) = layouts_dir.filter(|dir| dir.exists()) {
            let mut templates = Vec::new();
            for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry.path().strip_prefix(dir)?;
                let template = relative.to_string_lossy().replace('\\', "/");
                let file = entry.path().display().to_string();
                let source = fs::read_to_string(entry.path())
                    .with_context(|| format!("Failed to read layout {:?}", entry.path()))?;
                let (parent, body) = split_layout(&source, &file)?;

                if !template.contains('/') {
                    let name = template
                        .rsplit_once('.')
                        .map(|(stem, _)| stem)
                        .unwrap_or(&template)
                        .to_string();
                    tracing::debug!("Loaded layout `{}` from {:?}", name, entry.path());
                    layouts.insert(
                        name,
                        Layout {
                            template: template.clone(),
                            file,
                            parent,
                        },
                    );
                }
                templates.push((template, body.to_string()));
            }
            tera.add_raw_templates(templates)
                .map_err(|e| anyhow!("layouts in {:?}: {}", dir, describe(&e)))?;
        }

        for layout in layouts.values() {
            if let Some(parent) = &layout.parent {
                if !is_null_layout(parent) && !layouts.contains_key(parent) {
                    return Err(SiteError::UnknownLayout {
                        file: layout.file.clone(),
                        layout: parent.clone(),
                    }
                    .into());
                }
            }
        }

        Ok(Self { tera, layouts })
    }

    /// Whether `name` can be used as a layout
    pub fn contains(&self, name: &str) -> bool {
        is_null_layout(name) || self.layouts.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }

    /// Render `content` through layout `name` and its parents.
    ///
    /// `context` supplies `site`, `page` and listing variables; `content`
    /// is inserted at each level. `file` names the item in errors.
    pub fn render(
        &self,
        name: &str,
        context: &Context,
        content: &str,
        file: &str,
    ) -> Result<String, SiteError> {
        let mut content = content.to_string();
        let mut current = Some(name.to_string());
        let mut depth = 0;

        while let Some(name) = current {
            if is_null_layout(&name) {
                break;
            }
            let layout = self
                .layouts
                .get(&name)
                .ok_or_else(|| SiteError::UnknownLayout {
                    file: file.to_string(),
                    layout: name.clone(),
                })?;

            depth += 1;
            if depth > MAX_LAYOUT_DEPTH {
                return Err(SiteError::Template {
                    file: file.to_string(),
                    message: format!("layouts chained deeper than {} at `{}`", MAX_LAYOUT_DEPTH, name),
                });
            }

            let mut context = context.clone();
            context.insert("content", &content);
            content = self
                .tera
                .render(&layout.template, &context)
                .map_err(|e| SiteError::Template {
                    file: file.to_string(),
                    message: format!("layout `{}`: {}", name, describe(&e)),
                })?;
            current = layout.parent.clone();
        }

        Ok(content)
    }
}

/// Split a layout file into (parent layout, template)
fn split_layout<'a>(source: &'a str, file: &str) -> Result<(Option<String>, &'a str)> {
    match FrontMatter::parse(source) {
        Ok(Some((fm, body))) => Ok((fm.layout().map(str::to_string), body)),
        Ok(None) => Ok((None, source)),
        Err(e) => Err(SiteError::FrontMatter {
            file: file.to_string(),
            message: e.to_string(),
        }
        .into()),
    }
}

/// Tera's error display stops at the outermost error; the cause is nested
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn register_filters(tera: &mut Tera, config: &SiteConfig) {
    tera.register_filter("strip_html", strip_html_filter);
    tera.register_filter("truncate_chars", truncate_chars_filter);
    tera.register_filter("date_format", date_format_filter);
    tera.register_filter("xml_escape", xml_escape_filter);

    let relative = config.clone();
    tera.register_filter(
        "relative_url",
        move |value: &tera::Value, _: &HashMap<String, tera::Value>| {
            let path = tera::try_get_value!("relative_url", "value", String, value);
            Ok(tera::Value::String(relative_url(&relative, &path)))
        },
    );
    let absolute = config.clone();
    tera.register_filter(
        "absolute_url",
        move |value: &tera::Value, _: &HashMap<String, tera::Value>| {
            let path = tera::try_get_value!("absolute_url", "value", String, value);
            Ok(tera::Value::String(absolute_url(&absolute, &path)))
        },
    );
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    Ok(tera::Value::String(strip_html(&s)))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "...".to_string(),
    };
    Ok(tera::Value::String(truncate(&s, length, &omission)))
}

/// Tera filter: strftime on an RFC 3339 date
fn date_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("date_format", "value", String, value);
    let format = match args.get("format") {
        Some(val) => tera::try_get_value!("date_format", "format", String, val),
        None => "%Y-%m-%d".to_string(),
    };
    Ok(tera::Value::String(format_rfc3339(&s, &format).unwrap_or(s)))
}

fn xml_escape_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("xml_escape", "value", String, value);
    Ok(tera::Value::String(escape_xml(&s)))
}
