//! Markdown rendering with syntax highlighting

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::ops::Range;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::HighlightConfig;
use crate::helpers::html_escape;

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
    highlight: bool,
    line_numbers: bool,
}

impl MarkdownRenderer {
    /// Create a new markdown renderer
    pub fn new() -> Self {
        Self::with_options(&HighlightConfig::default())
    }

    /// Create with custom settings
    pub fn with_options(config: &HighlightConfig) -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            theme_name: config.theme.clone(),
            highlight: config.enable,
            line_numbers: config.line_numbers,
        }
    }

    /// Render markdown to HTML.
    ///
    /// Raw HTML blocks and inline HTML pass through untouched.
    pub fn render(&self, markdown: &str) -> String {
        // YAML metadata blocks are handled by FrontMatter::parse()
        let parser = Parser::new_ext(markdown, parser_options());

        let mut events: Vec<Event> = Vec::new();
        let mut in_code_block = false;
        let mut code_block_lang: Option<String> = None;
        let mut code_block_content = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_block_lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(str::to_string)
                            .filter(|lang| !lang.is_empty()),
                        CodeBlockKind::Indented => None,
                    };
                    code_block_content.clear();
                }
                Event::End(TagEnd::CodeBlock) => {
                    let block = self.code_block(&code_block_content, code_block_lang.as_deref());
                    events.push(Event::Html(CowStr::from(block)));
                    in_code_block = false;
                    code_block_lang = None;
                }
                Event::Text(text) if in_code_block => {
                    code_block_content.push_str(&text);
                }
                _ => {
                    if !in_code_block {
                        events.push(event);
                    }
                }
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Render a code block, highlighted when a known language is given
    fn code_block(&self, code: &str, lang: Option<&str>) -> String {
        match lang {
            Some(lang) if self.highlight => self
                .highlight_code(code, lang)
                .unwrap_or_else(|| plain_code_block(code, Some(lang))),
            _ => plain_code_block(code, lang),
        }
    }

    /// Highlight a code block, `None` if the language or theme is unknown
    fn highlight_code(&self, code: &str, lang: &str) -> Option<String> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))?;

        let theme = self.theme_set.themes.get(&self.theme_name)?;

        let highlighted = highlighted_html_for_string(code, &self.syntax_set, syntax, theme).ok()?;
        if self.line_numbers {
            Some(add_line_numbers(&highlighted, lang))
        } else {
            Some(format!(
                r#"<figure class="highlight {}">{}</figure>"#,
                lang, highlighted
            ))
        }
    }

    /// Split text at the excerpt separator, returning the part before it.
    ///
    /// In Markdown a separator inside a code block or code span is text,
    /// not a split point.
    pub fn split_excerpt<'a>(
        content: &'a str,
        separator: &str,
        markdown: bool,
    ) -> Option<&'a str> {
        if separator.is_empty() {
            return None;
        }
        let code = if markdown {
            code_ranges(content)
        } else {
            Vec::new()
        };
        content
            .match_indices(separator)
            .map(|(pos, _)| pos)
            .find(|pos| !code.iter().any(|range| range.contains(pos)))
            .map(|pos| content[..pos].trim())
    }
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Byte ranges of code blocks and code spans in a Markdown text, in order
/// and without overlaps.
///
/// Fenced blocks span their fence lines, so everything in a range is
/// shown literally by `render()`. Blocks indented by four spaces or
/// nested in list items and block quotes are found the same way.
pub fn code_ranges(markdown: &str) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    for (event, range) in Parser::new_ext(markdown, parser_options()).into_offset_iter() {
        if !matches!(event, Event::Start(Tag::CodeBlock(_)) | Event::Code(_)) {
            continue;
        }
        match ranges.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => ranges.push(range),
        }
    }
    ranges
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Escaped, unhighlighted code block
fn plain_code_block(code: &str, lang: Option<&str>) -> String {
    match lang {
        Some(lang) => format!(
            r#"<pre><code class="language-{}">{}</code></pre>"#,
            html_escape(lang),
            html_escape(code)
        ),
        None => format!("<pre><code>{}</code></pre>", html_escape(code)),
    }
}

/// Add a line-number gutter to highlighted code
fn add_line_numbers(code: &str, lang: &str) -> String {
    let lines: Vec<&str> = code.lines().collect();
    let line_count = lines.len();

    let mut gutter = String::new();
    let mut code_lines = String::new();

    for (i, line) in lines.iter().enumerate() {
        gutter.push_str(&format!(r#"<span class="line-number">{}</span>"#, i + 1));
        if i < line_count - 1 {
            gutter.push('\n');
        }

        code_lines.push_str(line);
        if i < line_count - 1 {
            code_lines.push('\n');
        }
    }

    format!(
        r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table></figure>"#,
        lang, gutter, code_lines
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("# Hello World\n\nThis is a test.");
        assert!(html.contains("<h1>Hello World</h1>"));
        assert!(html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_render_highlighted_code_block() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```rust\nfn main() {}\n```");
        assert!(html.contains("highlight rust"));
    }

    #[test]
    fn test_unlabelled_code_block_is_escaped_verbatim() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```\n<b>{{ site.baseurl }}</b>\n```");
        assert!(html.contains("<pre><code>&lt;b&gt;{{ site.baseurl }}&lt;/b&gt;\n</code></pre>"));
    }

    #[test]
    fn test_highlighting_disabled() {
        let config = HighlightConfig {
            enable: false,
            ..Default::default()
        };
        let renderer = MarkdownRenderer::with_options(&config);
        let html = renderer.render("```rust\nlet x = 1;\n```");
        assert!(html.contains(r#"<pre><code class="language-rust">let x = 1;"#));
    }

    #[test]
    fn test_raw_html_passthrough() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("<div id=\"demo\"><canvas></canvas></div>\n\nText");
        assert!(html.contains("<div id=\"demo\"><canvas></canvas></div>"));
    }

    #[test]
    fn test_split_excerpt() {
        let content = "This is excerpt.\n<!-- more -->\nThis is more content.";
        let excerpt = MarkdownRenderer::split_excerpt(content, "<!-- more -->", true);
        assert_eq!(excerpt, Some("This is excerpt."));
        assert_eq!(
            MarkdownRenderer::split_excerpt("No marker", "<!-- more -->", true),
            None
        );
    }

    #[test]
    fn test_split_excerpt_skips_separator_in_code() {
        let content = "Use the marker:\n\n```html\n<!-- more -->\n```\n\nThen `<!-- more -->` inline.\n\n<!-- more -->\n\nRest.";
        let excerpt = MarkdownRenderer::split_excerpt(content, "<!-- more -->", true).unwrap();
        assert!(excerpt.ends_with("inline."));
        assert!(excerpt.contains("```html\n<!-- more -->\n```"));

        let only_in_code = "```\n<!-- more -->\n```\n";
        assert_eq!(
            MarkdownRenderer::split_excerpt(only_in_code, "<!-- more -->", true),
            None
        );
    }

    #[test]
    fn test_split_excerpt_in_html_ignores_backticks() {
        let content = "<p>`a</p>\n<!-- more -->\n<p>b`</p>";
        assert_eq!(
            MarkdownRenderer::split_excerpt(content, "<!-- more -->", false),
            Some("<p>`a</p>")
        );
    }

    #[test]
    fn test_code_ranges_cover_every_kind_of_code() {
        let text = "Run `{{ a }}`.\n\n    {{ b }}\n\n1. Step\n\n    ```\n    {{ c }}\n    ```\n\n{{ d }}\n";
        let ranges = code_ranges(text);
        let covered = |needle: &str| {
            let pos = text.find(needle).unwrap();
            ranges.iter().any(|r| r.contains(&pos))
        };
        assert!(covered("{{ a }}"));
        assert!(covered("{{ b }}"));
        assert!(covered("{{ c }}"));
        assert!(!covered("{{ d }}"));
        assert!(ranges.windows(2).all(|w| w[0].end <= w[1].start));
    }
}
