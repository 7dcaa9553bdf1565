//! Content module - posts, pages, assets and their URLs

pub mod frontmatter;
mod index;
pub mod item;
pub mod loader;
mod markdown;
pub mod permalink;

pub use frontmatter::FrontMatter;
pub use index::SiteIndex;
pub use item::{ContentItem, ItemKind, Tag};
pub use loader::{Asset, ContentLoader, ContentSet};
pub use markdown::{code_ranges, MarkdownRenderer};
