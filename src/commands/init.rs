//! Initialize a new site

use anyhow::{bail, Result};
use chrono::Utc;
use std::fs;
use std::path::Path;

use crate::CONFIG_FILE;

const CONFIG: &str = r#"# Site
title: My Blog
description: ''
author: ''
timezone: UTC

# URL
url: http://localhost:4000
baseurl: ''
permalink: date

# Writing
excerpt_separator: "<!-- more -->"
highlight:
  enable: true

# Listings
paginate: 10
paginate_path: /page:num/
listings:
  index: true
  tags: true
  archive: true
feed:
  enable: true
  path: /feed.xml
sitemap: true

# Fail the build on links and assets that do not resolve
check_links: true

exclude:
  - README.md
"#;

const ABOUT: &str = r#"---
layout: page
title: About
---

This blog is built with blogsmith.
"#;

const STYLE: &str = r#"body { max-width: 42rem; margin: 0 auto; padding: 1rem; font-family: sans-serif; }
pre { overflow-x: auto; padding: 0.5rem; }
"#;

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    if target_dir.join(CONFIG_FILE).exists() {
        bail!("{:?} already contains a {}", target_dir, CONFIG_FILE);
    }

    fs::create_dir_all(target_dir.join("_posts"))?;
    fs::create_dir_all(target_dir.join("_drafts"))?;
    fs::create_dir_all(target_dir.join("_layouts"))?;
    fs::create_dir_all(target_dir.join("_includes"))?;
    fs::create_dir_all(target_dir.join("css"))?;

    fs::write(target_dir.join(CONFIG_FILE), CONFIG)?;
    fs::write(target_dir.join("about.md"), ABOUT)?;
    fs::write(target_dir.join("css/style.css"), STYLE)?;

    let now = Utc::now();
    let sample_post = format!(
        r#"---
layout: post
title: Hello World
date: {}
tags: [meta]
---

Welcome to your new blog. Posts live in `_posts/` and are named
`YYYY-MM-DD-title.md`.

<!-- more -->

Links inside the site go through the base path:

```markdown
[About]({{{{ site.baseurl }}}}/about.html)
```

renders as [About]({{{{ site.baseurl }}}}/about.html).
"#,
        now.format("%Y-%m-%d %H:%M:%S %z")
    );

    fs::write(
        target_dir.join(format!("_posts/{}-hello-world.md", now.format("%Y-%m-%d"))),
        sample_post,
    )?;

    Ok(())
}
