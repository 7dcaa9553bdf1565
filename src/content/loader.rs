//! Content loader - discovers posts, pages and assets in the source directory

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::frontmatter::{has_front_matter, FrontMatter};
use super::item::{compare_pages, compare_posts, title_from_slug, ContentItem, ItemKind, PostName};
use super::permalink::{self, UrlParts};
use crate::config::SiteConfig;
use crate::error::{BuildFailed, BuildReport, SiteError};
use crate::helpers::{parse_date, start_of_day};

const POSTS_DIR: &str = "_posts";
const DRAFTS_DIR: &str = "_drafts";

/// A file copied verbatim to the destination
#[derive(Debug, Clone)]
pub struct Asset {
    /// Path relative to the source directory, `/`-separated
    pub source: String,
    pub full_source: PathBuf,
}

impl Asset {
    /// Output path relative to the destination
    pub fn output_file(&self) -> &str {
        &self.source
    }
}

/// Everything discovered in the source directory
#[derive(Debug, Default)]
pub struct ContentSet {
    /// Posts (and drafts when enabled), newest first
    pub posts: Vec<ContentItem>,
    /// Pages, by `order` then source path
    pub pages: Vec<ContentItem>,
    pub assets: Vec<Asset>,
}

impl ContentSet {
    pub fn items(&self) -> impl Iterator<Item = &ContentItem> {
        self.posts.iter().chain(self.pages.iter())
    }
}

/// Loads content from the source directory
pub struct ContentLoader<'a> {
    config: &'a SiteConfig,
    source_dir: PathBuf,
    timezone: Tz,
    drafts: bool,
    exclude: Vec<Pattern>,
    include: Vec<Pattern>,
    /// Directories that are never content: destination, layouts, includes
    reserved: Vec<PathBuf>,
}

impl<'a> ContentLoader<'a> {
    /// Create a loader; `drafts` also loads `_drafts/`
    pub fn new(config: &'a SiteConfig, source_dir: &Path, drafts: bool) -> anyhow::Result<Self> {
        let patterns = |globs: &[String]| -> anyhow::Result<Vec<Pattern>> {
            globs
                .iter()
                .map(|g| {
                    Pattern::new(g.trim_matches('/'))
                        .map_err(|e| anyhow::anyhow!("Invalid glob `{}` in config: {}", g, e))
                })
                .collect()
        };

        Ok(Self {
            config,
            source_dir: source_dir.to_path_buf(),
            timezone: config.timezone()?,
            drafts: drafts || config.show_drafts,
            exclude: patterns(&config.exclude)?,
            include: patterns(&config.include)?,
            reserved: vec![
                PathBuf::from(&config.destination),
                PathBuf::from(&config.layouts_dir),
                PathBuf::from(&config.includes_dir),
            ],
        })
    }

    /// Load every post, page and asset, collecting all errors
    pub fn load(&self) -> Result<ContentSet, BuildFailed> {
        let mut set = ContentSet::default();
        let mut report = BuildReport::new();

        let walker = WalkDir::new(&self.source_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.admit(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let file = e
                        .path()
                        .map(|p| self.relative(p))
                        .unwrap_or_else(|| self.source_dir.display().to_string());
                    report.push(SiteError::Io {
                        file,
                        source: e.into(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let source = self.relative(entry.path());
            match self.load_file(entry.path(), &source) {
                Ok(Loaded::Post(item)) => set.posts.push(item),
                Ok(Loaded::Page(item)) => set.pages.push(item),
                Ok(Loaded::Asset(asset)) => set.assets.push(asset),
                Ok(Loaded::Skipped) => {}
                Err(e) => report.push(e),
            }
        }

        report.into_result()?;

        set.posts.sort_by(compare_posts);
        set.pages.sort_by(compare_pages);
        tracing::debug!(
            "Loaded {} posts, {} pages, {} assets",
            set.posts.len(),
            set.pages.len(),
            set.assets.len()
        );

        Ok(set)
    }

    /// Whether the walk should enter or yield `entry`
    fn admit(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        let relative = match entry.path().strip_prefix(&self.source_dir) {
            Ok(relative) => relative,
            Err(_) => return false,
        };

        if self.reserved.iter().any(|dir| relative == dir) {
            return false;
        }

        let path = relative.to_string_lossy().replace('\\', "/");
        if self.exclude.iter().any(|p| p.matches(&path)) {
            return false;
        }

        if path == POSTS_DIR || (path == DRAFTS_DIR && self.drafts) {
            return true;
        }

        let name = entry.file_name().to_string_lossy();
        if name.starts_with('_') || name.starts_with('.') {
            return self.include.iter().any(|p| p.matches(&path));
        }

        true
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.source_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn load_file(&self, path: &Path, source: &str) -> Result<Loaded, SiteError> {
        let io_error = |e: std::io::Error| SiteError::Io {
            file: source.to_string(),
            source: e,
        };

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let kind = if source.starts_with("_posts/") {
            Some(ItemKind::Post)
        } else if source.starts_with("_drafts/") {
            Some(ItemKind::Draft)
        } else {
            None
        };

        if let Some(kind) = kind {
            if !self.config.is_markdown_ext(&ext) && ext != "html" {
                tracing::debug!("Ignoring {} in {}", source, kind.as_str());
                return Ok(Loaded::Skipped);
            }
            let content = fs::read_to_string(path).map_err(io_error)?;
            return self.load_post(path, source, &ext, kind, &content);
        }

        let bytes = fs::read(path).map_err(io_error)?;
        if !has_front_matter(&bytes) {
            return Ok(Loaded::Asset(Asset {
                source: source.to_string(),
                full_source: path.to_path_buf(),
            }));
        }

        let content = String::from_utf8(bytes).map_err(|e| {
            io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        self.load_page(source, &ext, &content, path)
    }

    fn load_post(
        &self,
        path: &Path,
        source: &str,
        ext: &str,
        kind: ItemKind,
        content: &str,
    ) -> Result<Loaded, SiteError> {
        let file_name = source.rsplit('/').next().unwrap_or(source);
        let name = PostName::parse(file_name);
        if kind == ItemKind::Post && name.is_none() {
            return Err(SiteError::InvalidPostName {
                file: source.to_string(),
            });
        }

        let (fm, body) = self.front_matter(source, content)?.ok_or_else(|| {
            SiteError::FrontMatter {
                file: source.to_string(),
                message: "posts must start with a `---` metadata block".to_string(),
            }
        })?;
        if !fm.published {
            tracing::debug!("Skipping unpublished {}", source);
            return Ok(Loaded::Skipped);
        }
        let layout = required_layout(&fm, source)?;

        let slug = match &name {
            Some(name) => name.slug.clone(),
            None => permalink::strip_extension(file_name).to_string(),
        };

        let date = match (&fm.date, &name) {
            (Some(date), _) => Some(self.parse_date(date, source)?),
            (None, Some(name)) => start_of_day(name.date, &self.timezone),
            (None, None) => Some(self.modified(path, source)?),
        };

        let markdown = self.config.is_markdown_ext(ext);
        let pattern = fm
            .permalink
            .as_deref()
            .unwrap_or_else(|| self.config.permalink_pattern());
        let url = checked_url(
            permalink::expand(
                pattern,
                &UrlParts {
                    date: date.as_ref(),
                    title: &slug,
                    categories: &fm.categories,
                    output_ext: ".html",
                    path: permalink::strip_extension(source),
                },
            ),
            source,
        )?;

        Ok(Loaded::Post(ContentItem {
            kind,
            source: source.to_string(),
            full_source: path.to_path_buf(),
            title: fm.title.clone().unwrap_or_else(|| title_from_slug(&slug)),
            layout,
            url,
            slug,
            date,
            tags: fm.tags,
            categories: fm.categories,
            hidden: fm.hidden,
            order: fm.order,
            markdown,
            body: body.to_string(),
            extra: fm.extra,
        }))
    }

    fn load_page(
        &self,
        source: &str,
        ext: &str,
        content: &str,
        path: &Path,
    ) -> Result<Loaded, SiteError> {
        let Some((fm, body)) = self.front_matter(source, content)? else {
            return Err(SiteError::FrontMatter {
                file: source.to_string(),
                message: "expected a `---` metadata block".to_string(),
            });
        };
        if !fm.published {
            tracing::debug!("Skipping unpublished {}", source);
            return Ok(Loaded::Skipped);
        }
        let layout = required_layout(&fm, source)?;

        let markdown = self.config.is_markdown_ext(ext);
        let output_ext = if markdown || ext.is_empty() {
            ".html".to_string()
        } else {
            format!(".{}", ext)
        };

        let file_name = source.rsplit('/').next().unwrap_or(source);
        let slug = permalink::strip_extension(file_name).to_string();
        let date = fm
            .date
            .as_deref()
            .map(|d| self.parse_date(d, source))
            .transpose()?;

        let url = match fm.permalink.as_deref() {
            Some(pattern) => permalink::expand(
                pattern,
                &UrlParts {
                    date: date.as_ref(),
                    title: &slug,
                    categories: &fm.categories,
                    output_ext: &output_ext,
                    path: permalink::strip_extension(source),
                },
            ),
            None => permalink::page_url(source, &output_ext),
        };
        let url = checked_url(url, source)?;

        Ok(Loaded::Page(ContentItem {
            kind: ItemKind::Page,
            source: source.to_string(),
            full_source: path.to_path_buf(),
            title: fm.title.clone().unwrap_or_else(|| title_from_slug(&slug)),
            layout,
            url,
            slug,
            date,
            tags: fm.tags,
            categories: fm.categories,
            hidden: fm.hidden,
            order: fm.order,
            markdown,
            body: body.to_string(),
            extra: fm.extra,
        }))
    }

    fn front_matter<'c>(
        &self,
        source: &str,
        content: &'c str,
    ) -> Result<Option<(FrontMatter, &'c str)>, SiteError> {
        FrontMatter::parse(content).map_err(|e| SiteError::FrontMatter {
            file: source.to_string(),
            message: e.to_string(),
        })
    }

    fn parse_date(&self, value: &str, source: &str) -> Result<DateTime<FixedOffset>, SiteError> {
        parse_date(value, &self.timezone).ok_or_else(|| SiteError::FrontMatter {
            file: source.to_string(),
            message: format!("cannot parse date `{}`", value),
        })
    }

    /// File modification time, used to date undated drafts
    fn modified(&self, path: &Path, source: &str) -> Result<DateTime<FixedOffset>, SiteError> {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| SiteError::Io {
                file: source.to_string(),
                source: e,
            })?;
        Ok(DateTime::<Utc>::from(modified)
            .with_timezone(&self.timezone)
            .fixed_offset())
    }
}

enum Loaded {
    Post(ContentItem),
    Page(ContentItem),
    Asset(Asset),
    Skipped,
}

/// Reject URLs that could write outside the destination directory
fn checked_url(url: String, source: &str) -> Result<String, SiteError> {
    if permalink::has_dot_segments(&url) {
        return Err(SiteError::FrontMatter {
            file: source.to_string(),
            message: format!("permalink `{}` has `.` or `..` segments", url),
        });
    }
    Ok(url)
}

fn required_layout(fm: &FrontMatter, source: &str) -> Result<String, SiteError> {
    fm.layout()
        .map(str::to_string)
        .ok_or_else(|| SiteError::MissingLayout {
            file: source.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, path: &str, content: &str) {
        let full = dir.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    fn load(dir: &Path, config: &SiteConfig) -> Result<ContentSet, BuildFailed> {
        ContentLoader::new(config, dir, false).unwrap().load()
    }

    #[test]
    fn test_discovers_posts_pages_and_assets() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "_posts/2019-03-07-bf-macros.md",
            "---\nlayout: post\ntitle: \"BF macros\"\ntags: rust compilers\n---\nBody",
        );
        write(
            dir.path(),
            "_posts/2020-01-02-later.md",
            "---\nlayout: post\n---\nLater",
        );
        write(dir.path(), "about.md", "---\nlayout: page\ntitle: About\n---\nMe");
        write(dir.path(), "img/a.png", "PNG");
        write(dir.path(), "_layouts/post.html", "{{ content }}");
        write(dir.path(), ".git/config", "x");

        let set = load(dir.path(), &SiteConfig::default()).unwrap();
        assert_eq!(set.posts.len(), 2);
        assert_eq!(set.posts[0].source, "_posts/2020-01-02-later.md");
        assert_eq!(set.posts[0].title, "Later");
        assert_eq!(set.posts[1].url, "/2019/03/07/bf-macros.html");
        assert_eq!(set.posts[1].tags, vec!["rust", "compilers"]);

        assert_eq!(set.pages.len(), 1);
        assert_eq!(set.pages[0].url, "/about.html");

        let assets: Vec<_> = set.assets.iter().map(|a| a.source.as_str()).collect();
        assert_eq!(assets, vec!["img/a.png"]);
    }

    #[test]
    fn test_collects_every_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "_posts/2019-03-07-a.md", "---\ntitle: no layout\n---\n");
        write(dir.path(), "_posts/not-dated.md", "---\nlayout: post\n---\n");
        write(dir.path(), "broken.md", "---\nlayout: [\n---\n");

        let failed = load(dir.path(), &SiteConfig::default()).unwrap_err();
        assert_eq!(failed.errors().len(), 3);
        assert!(failed
            .errors()
            .iter()
            .any(|e| matches!(e, SiteError::MissingLayout { file } if file == "_posts/2019-03-07-a.md")));
        assert!(failed
            .errors()
            .iter()
            .any(|e| matches!(e, SiteError::InvalidPostName { .. })));
        assert!(failed
            .errors()
            .iter()
            .any(|e| matches!(e, SiteError::FrontMatter { file, .. } if file == "broken.md")));
    }

    #[test]
    fn test_post_without_front_matter_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "_posts/2019-03-07-a.md", "Just text");
        let failed = load(dir.path(), &SiteConfig::default()).unwrap_err();
        assert!(matches!(failed.errors()[0], SiteError::FrontMatter { .. }));
    }

    #[test]
    fn test_permalink_override_and_unpublished() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "projects.html",
            "---\nlayout: page\npermalink: /projects/\norder: 2\n---\n<p>x</p>",
        );
        write(
            dir.path(),
            "wip.md",
            "---\nlayout: page\npublished: false\n---\n",
        );

        let set = load(dir.path(), &SiteConfig::default()).unwrap();
        assert_eq!(set.pages.len(), 1);
        assert_eq!(set.pages[0].url, "/projects/");
        assert!(!set.pages[0].markdown);
        assert_eq!(set.pages[0].order, Some(2));
    }

    #[test]
    fn test_permalink_with_parent_segments_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "a.md",
            "---\nlayout: page\npermalink: /../../escaped.html\n---\nHi.\n",
        );
        write(
            dir.path(),
            "_posts/2019-03-07-b.md",
            "---\nlayout: post\npermalink: /posts/../../:title.html\n---\nHi.\n",
        );

        let failed = load(dir.path(), &SiteConfig::default()).unwrap_err();
        assert_eq!(failed.errors().len(), 2);
        for file in ["a.md", "_posts/2019-03-07-b.md"] {
            assert!(failed.errors().iter().any(|e| matches!(
                e,
                SiteError::FrontMatter { file: f, message } if f == file && message.contains("..")
            )));
        }
    }

    #[test]
    fn test_exclude_and_include_globs() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "README.md", "---\nlayout: page\n---\n");
        write(dir.path(), "vendor/lib.js", "x");
        write(dir.path(), ".well-known/security.txt", "x");

        let config = SiteConfig {
            include: vec![".well-known".to_string()],
            ..Default::default()
        };
        let set = load(dir.path(), &config).unwrap();
        assert!(set.pages.is_empty());
        let assets: Vec<_> = set.assets.iter().map(|a| a.source.as_str()).collect();
        assert_eq!(assets, vec![".well-known/security.txt"]);
    }

    #[test]
    fn test_drafts_only_on_request() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "_drafts/idea.md", "---\nlayout: post\n---\nIdea");

        let config = SiteConfig::default();
        assert!(load(dir.path(), &config).unwrap().posts.is_empty());

        let set = ContentLoader::new(&config, dir.path(), true)
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(set.posts.len(), 1);
        assert_eq!(set.posts[0].kind, ItemKind::Draft);
        assert!(set.posts[0].date.is_some());
    }

    #[test]
    fn test_front_matter_date_wins() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "_posts/2019-03-07-a.md",
            "---\nlayout: post\ndate: 2019-03-08 10:30:00\n---\n",
        );
        let set = load(dir.path(), &SiteConfig::default()).unwrap();
        assert_eq!(set.posts[0].url, "/2019/03/08/a.html");
    }
}
