//! Helper functions shared by the renderer, generator and checker

mod date;
mod html;
mod url;

pub use date::*;
pub use html::*;
pub use url::*;
