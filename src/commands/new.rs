//! Create a new post, draft or page

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

use crate::Site;

/// What `new` creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewKind {
    Post,
    Draft,
    Page,
}

impl NewKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "post" => Ok(NewKind::Post),
            "draft" => Ok(NewKind::Draft),
            "page" => Ok(NewKind::Page),
            _ => bail!("Unknown type: {}. Available: post, draft, page", s),
        }
    }

    fn default_layout(&self) -> &'static str {
        match self {
            NewKind::Post | NewKind::Draft => "post",
            NewKind::Page => "page",
        }
    }
}

/// Write a new content file with a metadata block and return its path
pub fn create(
    site: &Site,
    kind: NewKind,
    title: &str,
    layout: Option<&str>,
    slug: Option<&str>,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let slug = match slug {
        Some(s) => slug::slugify(s),
        None => slug::slugify(title),
    };
    if slug.is_empty() {
        bail!("Cannot derive a file name from title {:?}", title);
    }

    let tz = site.config.timezone()?;
    let local = now.with_timezone(&tz);

    let file_path = match kind {
        NewKind::Post => site
            .source_dir
            .join("_posts")
            .join(format!("{}-{}.md", local.format("%Y-%m-%d"), slug)),
        NewKind::Draft => site.source_dir.join("_drafts").join(format!("{}.md", slug)),
        NewKind::Page => site.source_dir.join(format!("{}.md", slug)),
    };

    if file_path.exists() {
        bail!("File already exists: {:?}", file_path);
    }

    let layout = layout.unwrap_or(kind.default_layout());
    let mut content = format!("---\nlayout: {}\ntitle: {}\n", layout, yaml_string(title));
    if kind == NewKind::Post {
        content.push_str(&format!("date: {}\n", local.format("%Y-%m-%d %H:%M:%S %z")));
    }
    if kind != NewKind::Page {
        content.push_str("tags: []\n");
    }
    content.push_str("---\n\n");

    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    tracing::info!("Created: {:?}", file_path);

    Ok(file_path)
}

pub fn run(
    site: &Site,
    kind: &str,
    title: &str,
    layout: Option<&str>,
    slug: Option<&str>,
) -> Result<()> {
    let path = create(site, NewKind::parse(kind)?, title, layout, slug, Utc::now())?;
    println!("Created: {}", path.display());
    Ok(())
}

/// Double-quoted YAML scalar
fn yaml_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FrontMatter;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_create_post() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        let now = Utc.with_ymd_and_hms(2019, 3, 7, 12, 0, 0).unwrap();

        let path = create(&site, NewKind::Post, "Say \"Hi\": BF", None, None, now).unwrap();
        assert_eq!(path, dir.path().join("_posts/2019-03-07-say-hi-bf.md"));

        let content = fs::read_to_string(&path).unwrap();
        let (fm, _) = FrontMatter::parse(&content).unwrap().unwrap();
        assert_eq!(fm.title.as_deref(), Some("Say \"Hi\": BF"));
        assert_eq!(fm.layout(), Some("post"));

        assert!(create(&site, NewKind::Post, "Say \"Hi\": BF", None, None, now).is_err());
    }

    #[test]
    fn test_create_page_and_draft() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();
        let now = Utc::now();

        let page = create(&site, NewKind::Page, "About", None, None, now).unwrap();
        assert_eq!(page, dir.path().join("about.md"));
        let draft = create(&site, NewKind::Draft, "Idea", Some("note"), Some("my idea"), now).unwrap();
        assert_eq!(draft, dir.path().join("_drafts/my-idea.md"));
        assert!(fs::read_to_string(draft).unwrap().contains("layout: note"));
    }

    #[test]
    fn test_unknown_kind() {
        assert!(NewKind::parse("category").is_err());
    }
}
