//! Content module - documents, the page tree and markup rendering

mod frontmatter;
pub mod loader;
mod manifest;
mod markdown;
mod page;
mod site;

pub use frontmatter::FrontMatter;
pub use loader::ContentTreeBuilder;
pub use manifest::DirManifest;
pub use markdown::{html_escape, MarkdownRenderer, MarkupRenderer};
pub use page::{NewPage, Page, PageId, PageKind};
pub use site::{Site, SiteBuilder, TreeError};

#[cfg(test)]
pub(crate) use site::tests::sample_site;
