//! Helper functions for templates
//!
//! Navigation and asset resolution, exposed to layouts through the render
//! context.

mod navigation;
mod url;

pub use navigation::{breadcrumb, side_menu, titles_at_level, Breadcrumb, MenuEntry, TitleEntry};
pub use url::AssetResolver;
