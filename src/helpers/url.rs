//! URL helper functions

use crate::config::SiteConfig;

/// Prefix a site path with the base path
///
/// # Examples
/// ```ignore
/// relative_url(&config, "/css/style.css") // -> "/blog/css/style.css"
/// ```
pub fn relative_url(config: &SiteConfig, path: &str) -> String {
    if is_external(path) {
        return path.to_string();
    }
    let base = config.base_path();
    let path = path.trim_start_matches('/');

    format!("{}/{}", base, path)
}

/// Generate a full URL including the origin
///
/// # Examples
/// ```ignore
/// absolute_url(&config, "/about/") // -> "https://example.com/blog/about/"
/// ```
pub fn absolute_url(config: &SiteConfig, path: &str) -> String {
    if is_external(path) {
        return path.to_string();
    }
    format!("{}{}", config.origin(), relative_url(config, path))
}

/// Whether a reference points outside the site (scheme, protocol-relative)
pub fn is_external(reference: &str) -> bool {
    if reference.starts_with("//") {
        return true;
    }
    match reference.find(':') {
        Some(colon) => {
            let scheme = &reference[..colon];
            !scheme.is_empty()
                && scheme
                    .chars()
                    .next()
                    .map(|c| c.is_ascii_alphabetic())
                    .unwrap_or(false)
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        }
        None => false,
    }
}

/// Resolve `reference` against the URL of the page it appears on.
///
/// Both inputs and the result are site paths (no base path). `.` and `..`
/// segments are collapsed.
///
/// # Examples
/// ```ignore
/// resolve_relative("/2019/05/01/post.html", "../img/x.png") // -> "/2019/05/img/x.png"
/// ```
pub fn resolve_relative(from: &str, reference: &str) -> String {
    let joined = if reference.starts_with('/') {
        reference.to_string()
    } else {
        let dir = match from.rfind('/') {
            Some(pos) => &from[..=pos],
            None => "/",
        };
        format!("{}{}", dir, reference)
    };

    let trailing = joined.ends_with('/') || joined.ends_with("/.") || joined.ends_with("/..");
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let mut result = format!("/{}", parts.join("/"));
    if trailing && !result.ends_with('/') {
        result.push('/');
    }
    result
}

/// Decode percent-escapes in a URL path
pub fn decode_url(path: &str) -> String {
    percent_encoding::percent_decode_str(path)
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SiteConfig {
        SiteConfig {
            url: "https://example.com".to_string(),
            baseurl: "/blog/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_relative_url() {
        let config = test_config();
        assert_eq!(relative_url(&config, "/css/style.css"), "/blog/css/style.css");
        assert_eq!(relative_url(&config, "about/"), "/blog/about/");
        assert_eq!(relative_url(&config, "/"), "/blog/");
        assert_eq!(
            relative_url(&config, "https://other.org/x"),
            "https://other.org/x"
        );
    }

    #[test]
    fn test_relative_url_without_base() {
        let config = SiteConfig::default();
        assert_eq!(relative_url(&config, "img/a.png"), "/img/a.png");
    }

    #[test]
    fn test_absolute_url() {
        let config = test_config();
        assert_eq!(
            absolute_url(&config, "/about/"),
            "https://example.com/blog/about/"
        );
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("https://example.com"));
        assert!(is_external("mailto:me@example.com"));
        assert!(is_external("//cdn.example.com/x.js"));
        assert!(!is_external("/img/a.png"));
        assert!(!is_external("img/a:b.png"));
        assert!(!is_external("#top"));
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_relative("/2019/05/01/post.html", "../img/x.png"),
            "/2019/05/img/x.png"
        );
        assert_eq!(resolve_relative("/about/", "team.html"), "/about/team.html");
        assert_eq!(resolve_relative("/about/", "/abs/"), "/abs/");
        assert_eq!(resolve_relative("/a/b/", ".."), "/a/");
    }

    #[test]
    fn test_decode_url() {
        assert_eq!(decode_url("/img/my%20photo.png"), "/img/my photo.png");
    }
}
