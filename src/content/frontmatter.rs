//! Front-matter parsing

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Why a metadata block could not be read
#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("metadata block opened with `---` is never closed")]
    Unterminated,

    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Custom deserializer for labels: a space-separated string or a list
fn words_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, SeqAccess, Visitor};
    use std::fmt;

    struct WordsOrList;

    impl<'de> Visitor<'de> for WordsOrList {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a space-separated string or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.split_whitespace().map(str::to_string).collect())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(item) = seq.next_element::<serde_yaml::Value>()? {
                match item {
                    serde_yaml::Value::String(s) => vec.push(s),
                    serde_yaml::Value::Number(n) => vec.push(n.to_string()),
                    serde_yaml::Value::Bool(b) => vec.push(b.to_string()),
                    serde_yaml::Value::Null => {}
                    _ => {
                        return Err(de::Error::custom("labels must be plain strings"));
                    }
                }
            }
            Ok(vec)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(WordsOrList)
}

/// Front-matter data from a post or page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub layout: Option<String>,
    pub title: Option<String>,
    pub permalink: Option<String>,
    #[serde(deserialize_with = "words_or_list", default)]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "words_or_list", default)]
    pub categories: Vec<String>,
    /// Excluded from listings but still published
    pub hidden: bool,
    pub date: Option<String>,
    pub order: Option<i64>,
    /// `published: false` drops the item from the build
    pub published: bool,

    /// Additional custom fields, in source order
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            layout: None,
            title: None,
            permalink: None,
            tags: Vec::new(),
            categories: Vec::new(),
            hidden: false,
            date: None,
            order: None,
            published: true,
            extra: IndexMap::new(),
        }
    }
}

impl FrontMatter {
    /// Parse front-matter from content string.
    ///
    /// Returns `Ok(None)` when the content does not open with a `---`
    /// line, i.e. the file is not a content item. On success returns
    /// (front_matter, body).
    pub fn parse(content: &str) -> Result<Option<(Self, &str)>, FrontMatterError> {
        let (yaml, body) = match split(content)? {
            Some(parts) => parts,
            None => return Ok(None),
        };

        let has_data = yaml.lines().any(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        });
        if !has_data {
            return Ok(Some((FrontMatter::default(), body)));
        }

        let fm = serde_yaml::from_str::<FrontMatter>(yaml)?;
        Ok(Some((fm, body)))
    }

    /// The declared layout, if present and non-blank
    pub fn layout(&self) -> Option<&str> {
        self.layout
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }
}

/// Whether raw file bytes open with a metadata block delimiter
pub fn has_front_matter(bytes: &[u8]) -> bool {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match bytes.strip_prefix(b"---") {
        Some(rest) => {
            let line_end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
            rest[..line_end].iter().all(|b| b.is_ascii_whitespace())
        }
        None => false,
    }
}

/// Split content into (yaml, body) when it opens with a `---` line.
///
/// The block ends at the next line that is exactly `---` or `...`.
/// Leading blank lines of the body are dropped.
pub fn split(content: &str) -> Result<Option<(&str, &str)>, FrontMatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut lines = content.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end() == "---" => {}
        _ => return Ok(None),
    }

    let yaml_start = content.find('\n').map(|p| p + 1).unwrap_or(content.len());
    let mut offset = yaml_start;
    for line in lines {
        let marker = line.trim_end();
        if marker == "---" || marker == "..." {
            let yaml = &content[yaml_start..offset];
            let body = &content[offset + line.len()..];
            let body = body.trim_start_matches(['\n', '\r']);
            return Ok(Some((yaml, body)));
        }
        offset += line.len();
    }

    Err(FrontMatterError::Unterminated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_front_matter() {
        let content = r#"---
layout: post
title: "Writing a toy interpreter"
tags: rust interpreters
hidden: true
series: toy-lang
---

This is the content.
"#;

        let (fm, body) = FrontMatter::parse(content).unwrap().unwrap();
        assert_eq!(fm.layout(), Some("post"));
        assert_eq!(fm.title.as_deref(), Some("Writing a toy interpreter"));
        assert_eq!(fm.tags, vec!["rust", "interpreters"]);
        assert!(fm.hidden);
        assert!(fm.published);
        assert_eq!(
            fm.extra.get("series").and_then(|v| v.as_str()),
            Some("toy-lang")
        );
        assert_eq!(body, "This is the content.\n");
    }

    #[test]
    fn test_tags_as_list() {
        let content = "---\nlayout: post\ntags:\n  - wasm\n  - 2019\n---\nbody";
        let (fm, _) = FrontMatter::parse(content).unwrap().unwrap();
        assert_eq!(fm.tags, vec!["wasm", "2019"]);
    }

    #[test]
    fn test_no_front_matter() {
        assert!(FrontMatter::parse("# Just markdown\n").unwrap().is_none());
        assert!(FrontMatter::parse("--- not a delimiter\n").unwrap().is_none());
    }

    #[test]
    fn test_empty_block_has_no_layout() {
        let (fm, body) = FrontMatter::parse("---\n---\nHello").unwrap().unwrap();
        assert_eq!(fm.layout(), None);
        assert_eq!(body, "Hello");
    }

    #[test]
    fn test_blank_layout_is_missing() {
        let (fm, _) = FrontMatter::parse("---\nlayout: \"  \"\n---\n")
            .unwrap()
            .unwrap();
        assert_eq!(fm.layout(), None);
    }

    #[test]
    fn test_unterminated_block() {
        let err = FrontMatter::parse("---\nlayout: post\nno end here\n").unwrap_err();
        assert!(matches!(err, FrontMatterError::Unterminated));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = FrontMatter::parse("---\nlayout: [post\n---\n").unwrap_err();
        assert!(matches!(err, FrontMatterError::Yaml(_)));
    }

    #[test]
    fn test_dots_close_block() {
        let (fm, body) = FrontMatter::parse("---\nlayout: page\n...\nText")
            .unwrap()
            .unwrap();
        assert_eq!(fm.layout(), Some("page"));
        assert_eq!(body, "Text");
    }

    #[test]
    fn test_body_keeps_later_rules() {
        let content = "---\nlayout: page\n---\n\nintro\n\n---\n\nafter rule\n";
        let (_, body) = FrontMatter::parse(content).unwrap().unwrap();
        assert!(body.starts_with("intro"));
        assert!(body.contains("after rule"));
    }

    #[test]
    fn test_has_front_matter() {
        assert!(has_front_matter(b"---\nlayout: post\n---\n"));
        assert!(has_front_matter(b"---\r\nlayout: post\r\n---\r\n"));
        assert!(!has_front_matter(b"\x89PNG\r\n"));
        assert!(!has_front_matter(b"----\n"));
    }
}
