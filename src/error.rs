//! Build error taxonomy
//!
//! Every problem found while loading, rendering or checking content is a
//! [`SiteError`] naming the offending file. Errors are collected into a
//! [`BuildReport`] so one build surfaces all of them at once.

use std::fmt;
use thiserror::Error;

/// A single author-facing build problem
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("{file}: invalid front matter: {message}")]
    FrontMatter { file: String, message: String },

    #[error("{file}: front matter has no `layout`")]
    MissingLayout { file: String },

    #[error("{file}: post file names must look like YYYY-MM-DD-slug.ext")]
    InvalidPostName { file: String },

    #[error("{file}: unknown layout `{layout}`")]
    UnknownLayout { file: String, layout: String },

    #[error("{file}: template error: {message}")]
    Template { file: String, message: String },

    #[error("{file}: include `{name}` not found")]
    Include { file: String, name: String },

    #[error("{file}: `post_url` refers to unknown post `{name}`")]
    UnknownPost { file: String, name: String },

    #[error("{file}: `link` refers to unknown file `{target}`")]
    UnknownLink { file: String, target: String },

    #[error("{file}: broken link `{href}`")]
    BrokenLink { file: String, href: String },

    #[error("{file}: missing asset `{href}`")]
    MissingAsset { file: String, href: String },

    #[error("output `{output}` is produced by both {first} and {second}")]
    DuplicatePermalink {
        output: String,
        first: String,
        second: String,
    },

    #[error("{file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

impl SiteError {
    /// The file this error is attributed to
    pub fn file(&self) -> &str {
        match self {
            SiteError::FrontMatter { file, .. }
            | SiteError::MissingLayout { file }
            | SiteError::InvalidPostName { file }
            | SiteError::UnknownLayout { file, .. }
            | SiteError::Template { file, .. }
            | SiteError::Include { file, .. }
            | SiteError::UnknownPost { file, .. }
            | SiteError::UnknownLink { file, .. }
            | SiteError::BrokenLink { file, .. }
            | SiteError::MissingAsset { file, .. }
            | SiteError::Io { file, .. } => file,
            SiteError::DuplicatePermalink { second, .. } => second,
        }
    }
}

/// Errors accumulated over one build
#[derive(Debug, Default)]
pub struct BuildReport {
    errors: Vec<SiteError>,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SiteError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: BuildReport) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[SiteError] {
        &self.errors
    }

    /// `Ok` when nothing was reported, otherwise every error as a [`BuildFailed`]
    pub fn into_result(self) -> Result<(), BuildFailed> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(BuildFailed(self.errors))
        }
    }
}

/// A build that found at least one problem
#[derive(Debug, Error)]
pub struct BuildFailed(pub Vec<SiteError>);

impl BuildFailed {
    pub fn errors(&self) -> &[SiteError] {
        &self.0
    }
}

impl fmt::Display for BuildFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "build failed with {} error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}
