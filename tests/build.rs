use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use blogsmith::{BuildFailed, Site, SiteError};
use tempfile::TempDir;
use walkdir::WalkDir;

const CONFIG: &str = r#"
title: Side Projects
url: https://example.com
baseurl: /blog
highlight:
  enable: false
"#;

const POST: &str = r#"---
layout: post
title: BF macros
tags: [rust, macros]
---
Intro paragraph.

<!-- more -->

![diagram]({{ site.baseurl }}/img/diagram.png)

```markdown
![diagram]({{ site.baseurl }}/img/diagram.png)
```
"#;

fn write(root: &Path, path: &str, content: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "_config.yml", CONFIG);
    write(root, "_posts/2019-03-07-bf-macros.md", POST);
    write(
        root,
        "_posts/2019-05-01-follow-up.md",
        "---\nlayout: post\ntitle: Follow up\ntags: [Rust]\n---\nSee [the first post]({{ site.baseurl }}{% post_url 2019-03-07-bf-macros %}).\n",
    );
    write(
        root,
        "about.md",
        "---\nlayout: page\ntitle: About\n---\n{% include bio.html name=\"Ada\" %}\n",
    );
    write(root, "_includes/bio.html", "<p class=\"bio\">Written by {{ include.name }}</p>");
    write(root, "img/diagram.png", "not really a png");
    write(root, "README.md", "excluded by default");
    dir
}

fn read(dir: &TempDir, path: &str) -> String {
    fs::read_to_string(dir.path().join("_site").join(path)).unwrap()
}

fn build_errors(site: &Site) -> Vec<String> {
    let err = site.build(false).unwrap_err();
    let failed = err.downcast_ref::<BuildFailed>().expect("a build failure");
    failed.errors().iter().map(|e| e.to_string()).collect()
}

fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(dir).unwrap().to_string_lossy().to_string();
            (relative, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn test_build_fixture_site() {
    let dir = fixture();
    let site = Site::new(dir.path()).unwrap();
    site.build(false).unwrap();

    let files = snapshot(&dir.path().join("_site"));
    for expected in [
        "index.html",
        "about.html",
        "2019/03/07/bf-macros.html",
        "2019/05/01/follow-up.html",
        "tags/rust/index.html",
        "tags/macros/index.html",
        "archives/index.html",
        "feed.xml",
        "sitemap.xml",
        "img/diagram.png",
    ] {
        assert!(files.contains_key(expected), "missing {}", expected);
    }
    assert!(!files.contains_key("README.md"));
    assert!(!files.contains_key("_config.yml"));

    let about = read(&dir, "about.html");
    assert!(about.contains("<p class=\"bio\">Written by Ada</p>"));
    assert!(about.contains("<title>About | Side Projects</title>"));

    let follow_up = read(&dir, "2019/05/01/follow-up.html");
    assert!(follow_up.contains("href=\"/blog/2019/03/07/bf-macros.html\""));
}

#[test]
fn test_baseurl_substituted_outside_code_only() {
    let dir = fixture();
    Site::new(dir.path()).unwrap().build(false).unwrap();

    let post = read(&dir, "2019/03/07/bf-macros.html");
    assert!(post.contains("<img src=\"/blog/img/diagram.png\" alt=\"diagram\""));
    assert!(post.contains("![diagram]({{ site.baseurl }}/img/diagram.png)"));
    assert!(!post.contains("](/blog/img/diagram.png)"));
}

#[test]
fn test_indented_and_nested_code_render_literally() {
    let dir = fixture();
    write(
        dir.path(),
        "_posts/2019-06-01-templates.md",
        concat!(
            "---\nlayout: post\ntitle: Templates\n---\n",
            "Text {{ site.baseurl }}\n\n",
            "    <img src=\"{{ site.baseurl }}/a.png\">\n\n",
            "Loop example:\n\n",
            "    {% for post in site.posts %}\n",
            "    {% endfor %}\n\n",
            "1. Step\n\n",
            "    ```liquid\n",
            "    {% for tag in site.tags %}\n\n",
            "    {% endfor %}\n",
            "    ```\n",
        ),
    );
    Site::new(dir.path()).unwrap().build(false).unwrap();

    let post = read(&dir, "2019/06/01/templates.html");
    assert!(post.contains("<p>Text /blog</p>"));
    assert!(post.contains("{{ site.baseurl }}/a.png"));
    assert!(!post.contains("/blog/a.png"));
    assert!(post.contains("{% for post in site.posts %}\n{% endfor %}"));
    assert!(post.contains("<code class=\"language-liquid\">{% for tag in site.tags %}"));
}

#[test]
fn test_permalink_outside_destination_fails() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("site");
    write(&source, "_config.yml", CONFIG);
    write(
        &source,
        "a.md",
        "---\nlayout: page\npermalink: /../../escaped.html\n---\nHi.\n",
    );
    let errors = build_errors(&Site::new(&source).unwrap());

    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].starts_with("a.md: invalid front matter"));
    assert!(!dir.path().join("escaped.html").exists());
    assert!(!source.join("_site").exists());
}

#[test]
fn test_excerpt_separator_in_code_is_ignored() {
    let dir = fixture();
    write(
        dir.path(),
        "_posts/2019-06-01-markers.md",
        "---\nlayout: post\ntitle: Markers\n---\nMark excerpts like this:\n\n```html\n<!-- more -->\n```\n\nWhole post.\n",
    );
    Site::new(dir.path()).unwrap().build(false).unwrap();

    let home = read(&dir, "index.html");
    assert!(!home.contains("Mark excerpts like this"));
    let feed = read(&dir, "feed.xml");
    assert!(feed.contains("Whole post."));
}

#[test]
fn test_excerpt_on_home_and_feed() {
    let dir = fixture();
    Site::new(dir.path()).unwrap().build(false).unwrap();

    let home = read(&dir, "index.html");
    assert!(home.contains("<p>Intro paragraph.</p>"));
    let newest = home.find("Follow up").unwrap();
    let oldest = home.find("BF macros").unwrap();
    assert!(newest < oldest);

    let feed = read(&dir, "feed.xml");
    assert!(feed.contains("<updated>2019-05-01T00:00:00+00:00</updated>"));
    assert!(feed.contains("https://example.com/blog/2019/03/07/bf-macros.html"));
}

#[test]
fn test_tags_merge_by_slug() {
    let dir = fixture();
    Site::new(dir.path()).unwrap().build(false).unwrap();

    let rust = read(&dir, "tags/rust/index.html");
    assert!(rust.contains("BF macros"));
    assert!(rust.contains("Follow up"));
}

#[test]
fn test_hidden_item_rendered_but_not_listed() {
    let dir = fixture();
    write(
        dir.path(),
        "_posts/2020-01-01-secret.md",
        "---\nlayout: post\ntitle: Secret\nhidden: true\ntags: [hush]\n---\nShh.\n",
    );
    write(
        dir.path(),
        "unlisted.md",
        "---\nlayout: page\ntitle: Unlisted\nhidden: true\n---\nHi.\n",
    );
    Site::new(dir.path()).unwrap().build(false).unwrap();

    assert!(read(&dir, "2020/01/01/secret.html").contains("Shh."));
    assert!(read(&dir, "unlisted.html").contains("Hi."));

    for listing in ["index.html", "archives/index.html", "feed.xml", "sitemap.xml", "about.html"] {
        let html = read(&dir, listing);
        assert!(!html.contains("Secret"), "{} lists the hidden post", listing);
        assert!(!html.contains("secret.html"), "{} links the hidden post", listing);
        assert!(!html.contains("Unlisted"), "{} lists the hidden page", listing);
    }
    assert!(!dir.path().join("_site/tags/hush").exists());

    let neighbour = read(&dir, "2019/05/01/follow-up.html");
    assert!(!neighbour.contains("Secret"));
}

#[test]
fn test_duplicate_permalink_fails() {
    let dir = fixture();
    write(
        dir.path(),
        "contact.md",
        "---\nlayout: page\ntitle: Contact\npermalink: /about.html\n---\nMail me.\n",
    );
    let site = Site::new(dir.path()).unwrap();
    let errors = build_errors(&site);

    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("about.html"));
    assert!(errors[0].contains("about.md"));
    assert!(errors[0].contains("contact.md"));
    assert!(!dir.path().join("_site").exists());
}

#[test]
fn test_missing_layout_names_the_file() {
    let dir = fixture();
    write(dir.path(), "notes.md", "---\ntitle: Notes\n---\nNo layout here.\n");
    let site = Site::new(dir.path()).unwrap();

    let err = site.build(false).unwrap_err();
    let failed = err.downcast_ref::<BuildFailed>().unwrap();
    assert!(matches!(
        failed.errors(),
        [SiteError::MissingLayout { file }] if file == "notes.md"
    ));
}

#[test]
fn test_unknown_layout() {
    let dir = fixture();
    write(dir.path(), "notes.md", "---\nlayout: fancy\ntitle: Notes\n---\nHi.\n");
    let errors = build_errors(&Site::new(dir.path()).unwrap());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("notes.md"));
    assert!(errors[0].contains("fancy"));
}

#[test]
fn test_custom_layout_overrides_builtin() {
    let dir = fixture();
    write(
        dir.path(),
        "_layouts/page.html",
        "---\nlayout: default\n---\n<div class=\"custom\">{{ content }}</div>",
    );
    Site::new(dir.path()).unwrap().build(false).unwrap();

    let about = read(&dir, "about.html");
    assert!(about.contains("<div class=\"custom\">"));
    assert!(about.contains("<title>About | Side Projects</title>"));
}

#[test]
fn test_missing_asset_and_forgotten_baseurl() {
    let dir = fixture();
    write(
        dir.path(),
        "gallery.md",
        "---\nlayout: page\ntitle: Gallery\n---\n![a]({{ site.baseurl }}/img/missing.png)\n\n![b](/img/diagram.png)\n",
    );
    let errors = build_errors(&Site::new(dir.path()).unwrap());

    assert_eq!(errors.len(), 2, "{:?}", errors);
    assert!(errors.iter().all(|e| e.starts_with("gallery.md")));
    assert!(errors.iter().any(|e| e.contains("/blog/img/missing.png")));
    assert!(errors.iter().any(|e| e.contains("`/img/diagram.png`")));
}

#[test]
fn test_unknown_post_url() {
    let dir = fixture();
    write(
        dir.path(),
        "_posts/2019-06-01-dangling.md",
        "---\nlayout: post\ntitle: Dangling\n---\n{% post_url 2018-01-01-nope %}\n",
    );
    let errors = build_errors(&Site::new(dir.path()).unwrap());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("_posts/2019-06-01-dangling.md"));
    assert!(errors[0].contains("2018-01-01-nope"));
}

#[test]
fn test_all_errors_reported_at_once() {
    let dir = fixture();
    write(dir.path(), "a.md", "---\ntitle: A\n---\n");
    write(dir.path(), "b.md", "---\nlayout: [\n---\n");
    write(dir.path(), "_posts/not-dated.md", "---\nlayout: post\n---\n");
    let errors = build_errors(&Site::new(dir.path()).unwrap());
    assert_eq!(errors.len(), 3, "{:?}", errors);
}

#[test]
fn test_rebuild_is_byte_identical() {
    let dir = fixture();
    let site = Site::new(dir.path()).unwrap();

    site.build(false).unwrap();
    let first = snapshot(&dir.path().join("_site"));
    site.build(false).unwrap();
    let second = snapshot(&dir.path().join("_site"));

    assert_eq!(first, second);
}

#[test]
fn test_failed_build_keeps_previous_output() {
    let dir = fixture();
    let site = Site::new(dir.path()).unwrap();
    site.build(false).unwrap();
    let before = snapshot(&dir.path().join("_site"));

    write(dir.path(), "broken.md", "---\nlayout: page\n---\n[x]({{ site.baseurl }}/nowhere/)\n");
    assert!(site.build(false).is_err());

    assert_eq!(before, snapshot(&dir.path().join("_site")));
}

#[test]
fn test_stale_output_removed() {
    let dir = fixture();
    let site = Site::new(dir.path()).unwrap();
    write(dir.path(), "old.md", "---\nlayout: page\ntitle: Old\n---\nBye.\n");
    site.build(false).unwrap();
    assert!(dir.path().join("_site/old.html").exists());

    fs::remove_file(dir.path().join("old.md")).unwrap();
    site.build(false).unwrap();
    assert!(!dir.path().join("_site/old.html").exists());
}

#[test]
fn test_drafts_only_on_request() {
    let dir = fixture();
    write(
        dir.path(),
        "_drafts/idea.md",
        "---\nlayout: post\ntitle: Idea\ndate: 2019-04-01\n---\nMaybe.\n",
    );
    let site = Site::new(dir.path()).unwrap();

    let rendered = site.render(false).unwrap();
    assert!(!rendered.contains("2019/04/01/idea.html"));

    let rendered = site.render(true).unwrap();
    assert!(rendered.contains("2019/04/01/idea.html"));
}

#[test]
fn test_check_does_not_write() {
    let dir = fixture();
    let site = Site::new(dir.path()).unwrap();
    let rendered = site.render(false).unwrap();
    assert!(rendered.contains("index.html"));
    assert!(!dir.path().join("_site").exists());
}
