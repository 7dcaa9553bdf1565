//! Template substitution in content bodies
//!
//! Bodies use a small Liquid-compatible subset:
//!
//! - `{{ site.baseurl }}`, `{{ page.title | escape }}`: variable output with filters
//! - `{% post_url 2019-03-07-bf-macros %}`, `{% link about.md %}`: cross-item URLs
//! - `{% include note.html text="..." %}`: files from the includes directory
//! - `{% raw %}`, `{% comment %}`, `{% highlight lang %}` blocks
//!
//! Markdown code blocks and inline code spans are never interpreted, so
//! posts can show template syntax as documentation.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::SiteConfig;
use crate::content::{code_ranges, SiteIndex};
use crate::error::SiteError;
use crate::helpers::{absolute_url, format_rfc3339, html_escape, relative_url};

/// Includes may include other files up to this depth
const MAX_INCLUDE_DEPTH: usize = 8;

lazy_static! {
    static ref RAW_OPEN: Regex = Regex::new(r"^\{%-?\s*raw\s*-?%\}").unwrap();
    static ref RAW_CLOSE: Regex = Regex::new(r"\{%-?\s*endraw\s*-?%\}").unwrap();
    static ref COMMENT_OPEN: Regex = Regex::new(r"^\{%-?\s*comment\s*-?%\}").unwrap();
    static ref COMMENT_CLOSE: Regex = Regex::new(r"\{%-?\s*endcomment\s*-?%\}").unwrap();
    static ref HIGHLIGHT_OPEN: Regex =
        Regex::new(r"^\{%-?\s*highlight\s+([A-Za-z0-9_+#.-]+)[^%]*%\}").unwrap();
    static ref HIGHLIGHT_CLOSE: Regex = Regex::new(r"\{%-?\s*endhighlight\s*-?%\}").unwrap();
    static ref TAG: Regex =
        Regex::new(r"(?s)\{\{-?\s*(.*?)\s*-?\}\}|\{%-?\s*(.*?)\s*-?%\}").unwrap();
    static ref INCLUDE_PARAM: Regex =
        Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*("[^"]*"|'[^']*'|[^\s"']+)"#).unwrap();
}

/// A piece of a body, as seen by the substitution pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text where tags and variables are substituted
    Template(&'a str),
    /// Text emitted exactly as written
    Verbatim(&'a str),
    /// A `{% highlight %}` block
    Highlight { lang: &'a str, code: &'a str },
}

/// Split a body into template and verbatim segments.
///
/// With `markdown` set, every code block and code span Markdown would
/// render (fenced, indented or nested in a list) is verbatim.
/// `{% raw %}` contents are verbatim and `{% comment %}` blocks are
/// dropped in every body.
pub fn segments(body: &str, markdown: bool) -> Vec<Segment<'_>> {
    let ranges = if markdown {
        code_ranges(body)
    } else {
        Vec::new()
    };
    let mut ranges = ranges.into_iter().peekable();
    let mut out = Vec::new();
    let mut pending = 0;
    let mut i = 0;

    while i < body.len() {
        while ranges.next_if(|range| range.end <= i).is_some() {}
        if let Some(range) = ranges.next_if(|range| range.start <= i) {
            push_template(&mut out, &body[pending..i]);
            out.push(Segment::Verbatim(&body[i..range.end]));
            i = range.end;
            pending = i;
            continue;
        }

        let rest = &body[i..];
        if rest.starts_with("{%") {
            if let Some((inner, consumed)) = block(rest, &RAW_OPEN, &RAW_CLOSE) {
                push_template(&mut out, &body[pending..i]);
                out.push(Segment::Verbatim(inner));
                i += consumed;
                pending = i;
                continue;
            }
            if let Some((_, consumed)) = block(rest, &COMMENT_OPEN, &COMMENT_CLOSE) {
                push_template(&mut out, &body[pending..i]);
                i += consumed;
                pending = i;
                continue;
            }
            if let Some(caps) = HIGHLIGHT_OPEN.captures(rest) {
                if let (Some(open), Some(lang)) = (caps.get(0), caps.get(1)) {
                    let after = &rest[open.end()..];
                    if let Some(close) = HIGHLIGHT_CLOSE.find(after) {
                        let code = after[..close.start()].trim_matches(['\n', '\r']);
                        push_template(&mut out, &body[pending..i]);
                        out.push(Segment::Highlight {
                            lang: lang.as_str(),
                            code,
                        });
                        i += open.end() + close.end();
                        pending = i;
                        continue;
                    }
                }
            }
            i += 2;
            continue;
        }

        i += rest.chars().next().map(char::len_utf8).unwrap_or(1);
    }

    push_template(&mut out, &body[pending..]);
    out
}

fn push_template<'a>(out: &mut Vec<Segment<'a>>, text: &'a str) {
    if !text.is_empty() {
        out.push(Segment::Template(text));
    }
}

/// Match an `open ... close` block at the start of `rest`.
/// Returns (inner text, bytes consumed); `None` if unopened or unclosed.
fn block<'a>(rest: &'a str, open: &Regex, close: &Regex) -> Option<(&'a str, usize)> {
    let open = open.find(rest)?;
    let after = &rest[open.end()..];
    let close = close.find(after)?;
    Some((&after[..close.start()], open.end() + close.end()))
}

/// Files from the includes directory, keyed by relative path
#[derive(Debug, Default)]
pub struct Includes {
    files: HashMap<String, String>,
}

impl Includes {
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let mut files = HashMap::new();
        if !dir.exists() {
            return Ok(Self { files });
        }

        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(dir)?;
            let key = relative.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(entry.path())?;
            files.insert(key, content);
        }
        tracing::debug!("Loaded {} includes from {:?}", files.len(), dir);

        Ok(Self { files })
    }

    pub fn insert(&mut self, name: &str, content: &str) {
        self.files.insert(name.to_string(), content.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }
}

/// Variables visible to a body
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub site: &'a Value,
    pub page: &'a Value,
    pub include: Option<&'a Value>,
}

/// Body substitution engine
pub struct Liquid<'a> {
    pub config: &'a SiteConfig,
    pub index: &'a SiteIndex,
    pub includes: &'a Includes,
}

impl<'a> Liquid<'a> {
    pub fn new(config: &'a SiteConfig, index: &'a SiteIndex, includes: &'a Includes) -> Self {
        Self {
            config,
            index,
            includes,
        }
    }

    /// Substitute tags and variables in `body`, leaving code untouched.
    ///
    /// `file` names the source in errors.
    pub fn render(
        &self,
        body: &str,
        markdown: bool,
        scope: &Scope<'_>,
        file: &str,
    ) -> Result<String, SiteError> {
        self.render_at_depth(body, markdown, scope, file, 0)
    }

    fn render_at_depth(
        &self,
        body: &str,
        markdown: bool,
        scope: &Scope<'_>,
        file: &str,
        depth: usize,
    ) -> Result<String, SiteError> {
        let mut out = String::with_capacity(body.len());
        for segment in segments(body, markdown) {
            match segment {
                Segment::Template(text) => self.substitute(text, scope, file, depth, &mut out)?,
                Segment::Verbatim(text) => out.push_str(text),
                Segment::Highlight { lang, code } => {
                    if markdown {
                        if !out.is_empty() && !out.ends_with('\n') {
                            out.push('\n');
                        }
                        out.push_str(&fenced_block(lang, code));
                    } else {
                        out.push_str(&format!(
                            r#"<pre><code class="language-{}">{}</code></pre>"#,
                            html_escape(lang),
                            html_escape(code)
                        ));
                    }
                }
            }
        }
        Ok(out)
    }

    fn substitute(
        &self,
        text: &str,
        scope: &Scope<'_>,
        file: &str,
        depth: usize,
        out: &mut String,
    ) -> Result<(), SiteError> {
        let mut last = 0;
        for caps in TAG.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            if let Some(expr) = caps.get(1) {
                let value = self
                    .output(expr.as_str(), scope)
                    .map_err(|message| SiteError::Template {
                        file: file.to_string(),
                        message,
                    })?;
                out.push_str(&value);
            } else if let Some(tag) = caps.get(2) {
                let rendered = self.tag(tag.as_str(), scope, file, depth)?;
                out.push_str(&rendered);
            }
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(())
    }

    /// Evaluate `{{ expr | filter: arg }}`
    fn output(&self, expr: &str, scope: &Scope<'_>) -> Result<String, String> {
        let mut parts = split_outside_quotes(expr, '|').into_iter();
        let head = parts.next().unwrap_or_default();
        let mut value = evaluate(head, scope);

        for filter in parts {
            let (name, args) = match filter.split_once(':') {
                Some((name, args)) => (
                    name.trim(),
                    split_outside_quotes(args, ',')
                        .into_iter()
                        .map(|arg| evaluate(arg, scope))
                        .collect::<Vec<_>>(),
                ),
                None => (filter.trim(), Vec::new()),
            };
            value = self.apply_filter(name, value, &args)?;
        }

        Ok(to_output_string(&value))
    }

    fn apply_filter(&self, name: &str, value: Value, args: &[Value]) -> Result<Value, String> {
        let result = match name {
            "relative_url" => Value::String(relative_url(self.config, &to_output_string(&value))),
            "absolute_url" => Value::String(absolute_url(self.config, &to_output_string(&value))),
            "escape" | "xml_escape" => Value::String(html_escape(&to_output_string(&value))),
            "slugify" => Value::String(slug::slugify(to_output_string(&value))),
            "upcase" => Value::String(to_output_string(&value).to_uppercase()),
            "downcase" => Value::String(to_output_string(&value).to_lowercase()),
            "strip" => Value::String(to_output_string(&value).trim().to_string()),
            "size" => Value::from(match &value {
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => to_output_string(other).chars().count(),
            }),
            "join" => {
                let separator = args.first().map(to_output_string).unwrap_or_default();
                match &value {
                    Value::Array(items) => Value::String(
                        items
                            .iter()
                            .map(to_output_string)
                            .collect::<Vec<_>>()
                            .join(&separator),
                    ),
                    _ => value,
                }
            }
            "date" => {
                let format = args
                    .first()
                    .map(to_output_string)
                    .unwrap_or_else(|| "%Y-%m-%d".to_string());
                let text = to_output_string(&value);
                Value::String(format_rfc3339(&text, &format).unwrap_or(text))
            }
            "default" => {
                if is_blank(&value) {
                    args.first().cloned().unwrap_or(Value::Null)
                } else {
                    value
                }
            }
            other => return Err(format!("unknown filter `{}`", other)),
        };
        Ok(result)
    }

    /// Evaluate `{% name args %}`
    fn tag(
        &self,
        content: &str,
        scope: &Scope<'_>,
        file: &str,
        depth: usize,
    ) -> Result<String, SiteError> {
        let content = content.trim();
        let (name, args) = match content.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (content, ""),
        };
        let template_error = |message: String| SiteError::Template {
            file: file.to_string(),
            message,
        };

        match name {
            "post_url" => {
                let id = unquote(args).unwrap_or(args);
                self.index
                    .post_url(id)
                    .map(|url| relative_url(self.config, url))
                    .ok_or_else(|| SiteError::UnknownPost {
                        file: file.to_string(),
                        name: id.to_string(),
                    })
            }
            "link" => {
                let target = unquote(args).unwrap_or(args);
                self.index
                    .source_url(target)
                    .map(|url| relative_url(self.config, url))
                    .ok_or_else(|| SiteError::UnknownLink {
                        file: file.to_string(),
                        target: target.to_string(),
                    })
            }
            "include" => self.include(args, scope, file, depth),
            "raw" | "comment" | "highlight" => Err(template_error(format!(
                "`{{% {} %}}` is never closed",
                name
            ))),
            "endraw" | "endcomment" | "endhighlight" => Err(template_error(format!(
                "unexpected `{{% {} %}}`",
                name
            ))),
            "" => Err(template_error("empty tag `{% %}`".to_string())),
            other => Err(template_error(format!("unsupported tag `{}`", other))),
        }
    }

    fn include(
        &self,
        args: &str,
        scope: &Scope<'_>,
        file: &str,
        depth: usize,
    ) -> Result<String, SiteError> {
        let (name, params) = match args.split_once(char::is_whitespace) {
            Some((name, params)) => (name, params),
            None => (args, ""),
        };
        let name = unquote(name).unwrap_or(name);

        if depth >= MAX_INCLUDE_DEPTH {
            return Err(SiteError::Template {
                file: file.to_string(),
                message: format!("includes nested deeper than {} at `{}`", MAX_INCLUDE_DEPTH, name),
            });
        }

        let content = self.includes.get(name).ok_or_else(|| SiteError::Include {
            file: file.to_string(),
            name: name.to_string(),
        })?;

        let mut include_vars = serde_json::Map::new();
        for caps in INCLUDE_PARAM.captures_iter(params) {
            include_vars.insert(caps[1].to_string(), evaluate(&caps[2], scope));
        }
        let include_vars = Value::Object(include_vars);

        let nested = Scope {
            site: scope.site,
            page: scope.page,
            include: Some(&include_vars),
        };
        let ext = name.rsplit('.').next().unwrap_or("");
        let markdown = self.config.is_markdown_ext(ext);

        self.render_at_depth(content, markdown, &nested, file, depth + 1)
    }
}

/// A fenced Markdown block holding `code` verbatim
fn fenced_block(lang: &str, code: &str) -> String {
    let longest = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    format!("{fence}{lang}\n{code}\n{fence}\n")
}

/// Evaluate a literal or a variable path
fn evaluate(token: &str, scope: &Scope<'_>) -> Value {
    let token = token.trim();
    if let Some(s) = unquote(token) {
        return Value::String(s.to_string());
    }
    if let Ok(n) = token.parse::<i64>() {
        return Value::from(n);
    }
    match token {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "nil" | "null" | "" => Value::Null,
        path => lookup(path, scope),
    }
}

/// Resolve `site.a.b`, `page.tags.0`, `site.posts.size`
fn lookup(path: &str, scope: &Scope<'_>) -> Value {
    let mut segments = path.split('.');
    let root = match segments.next() {
        Some("site") => scope.site,
        Some("page") => scope.page,
        Some("include") => match scope.include {
            Some(include) => include,
            None => return Value::Null,
        },
        _ => return Value::Null,
    };

    let mut current = root;
    for segment in segments {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => match segment {
                "first" => items.first(),
                "last" => items.last(),
                "size" => return Value::from(items.len()),
                index => index.parse::<usize>().ok().and_then(|i| items.get(i)),
            },
            Value::String(s) if segment == "size" => return Value::from(s.chars().count()),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// Liquid output: arrays are concatenated, nil is empty
fn to_output_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(to_output_string).collect(),
        Value::Object(_) => value.to_string(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn unquote(s: &str) -> Option<&str> {
    let s = s.trim();
    let first = s.chars().next()?;
    if s.len() >= 2 && (first == '"' || first == '\'') && s.ends_with(first) {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

/// Split on `sep` except inside single or double quotes
fn split_outside_quotes(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == sep => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&s[start..]);
    parts
}
