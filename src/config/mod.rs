//! Configuration module

mod site;

pub use site::FeedConfig;
pub use site::HighlightConfig;
pub use site::ListingsConfig;
pub use site::SiteConfig;
