//! Build the site into the destination directory

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::path::Path;
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use super::log_failure;
use crate::Site;

/// Build once, logging every error when the build fails
pub fn run(site: &Site, drafts: bool) -> Result<()> {
    let start = Instant::now();

    let rendered = match site.build(drafts) {
        Ok(rendered) => rendered,
        Err(e) => {
            log_failure(&e);
            return Err(e);
        }
    };

    tracing::info!(
        "Wrote {} files to {:?} in {:.2}s",
        rendered.len(),
        site.dest_dir,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Rebuild whenever a source file changes. A failed rebuild leaves the
/// previous output in place.
pub fn watch(site: &Site, drafts: bool) -> Result<()> {
    let (tx, rx) = channel();
    let mut debouncer = new_debouncer(Duration::from_millis(300), tx)?;
    debouncer
        .watcher()
        .watch(&site.source_dir, RecursiveMode::Recursive)?;

    tracing::info!("Watching {:?} for changes. Press Ctrl+C to stop.", site.source_dir);

    for result in rx {
        match result {
            Ok(events) => {
                let changed: Vec<_> = events
                    .iter()
                    .filter(|e| is_source_change(site, &e.path))
                    .collect();
                if changed.is_empty() {
                    continue;
                }
                for event in &changed {
                    tracing::info!("Changed: {}", event.path.display());
                }
                let _ = rebuild(site, drafts);
            }
            Err(e) => tracing::error!("Watch error: {:?}", e),
        }
    }

    Ok(())
}

/// Reload the configuration and build again
pub fn rebuild(site: &Site, drafts: bool) -> Result<Site> {
    let site = match Site::new(&site.source_dir) {
        Ok(site) => site,
        Err(e) => {
            tracing::error!("Failed to reload configuration: {:#}", e);
            return Err(e);
        }
    };
    run(&site, drafts)?;
    Ok(site)
}

/// Whether a changed path should trigger a rebuild; output and editor
/// noise are ignored
pub fn is_source_change(site: &Site, path: &Path) -> bool {
    if path.starts_with(&site.dest_dir) {
        return false;
    }
    let Ok(relative) = path.strip_prefix(&site.source_dir) else {
        return true;
    };
    !relative.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name == ".git" || name == ".DS_Store" || name.ends_with('~') || name.ends_with(".swp")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::path::PathBuf;

    #[test]
    fn test_is_source_change() {
        let site = Site::with_config(PathBuf::from("/blog"), SiteConfig::default());
        assert!(is_source_change(&site, Path::new("/blog/_posts/2019-03-07-a.md")));
        assert!(is_source_change(&site, Path::new("/blog/_config.yml")));
        assert!(!is_source_change(&site, Path::new("/blog/_site/index.html")));
        assert!(!is_source_change(&site, Path::new("/blog/.git/HEAD")));
        assert!(!is_source_change(&site, Path::new("/blog/about.md~")));
    }
}
