//! Page and section models

use serde::Serialize;
use std::path::PathBuf;

use super::FrontMatter;

/// Index of a page in its site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PageId(pub(crate) usize);

impl PageId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Whether a page owns children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// A single content document
    Document,
    /// A directory; owns an ordered list of children
    Section,
}

/// A page of the site
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: PageId,

    /// Normalized URL, `/` for the home page and `/a/b` otherwise
    pub url: String,

    pub title: String,

    /// Depth in the tree, 0 for the home page
    pub level: usize,

    /// Containing section; never used to mutate it
    pub parent: Option<PageId>,

    pub kind: PageKind,

    /// Children in navigation order (sections only)
    pub children: Vec<PageId>,

    /// Markdown body without front-matter
    #[serde(skip)]
    pub raw_body: String,

    pub front_matter: FrontMatter,

    /// File the page was read from; `None` for sections without an index
    pub source: Option<PathBuf>,
}

impl Page {
    pub fn is_section(&self) -> bool {
        self.kind == PageKind::Section
    }

    /// Layout requested by the front-matter
    pub fn layout(&self) -> Option<&str> {
        self.front_matter.layout.as_deref()
    }
}

/// A page about to be added to a site
#[derive(Debug, Clone)]
pub struct NewPage {
    /// Last URL segment
    pub slug: String,
    pub title: String,
    pub kind: PageKind,
    pub raw_body: String,
    pub front_matter: FrontMatter,
    pub source: Option<PathBuf>,
}

impl NewPage {
    pub fn document(slug: &str, title: &str) -> Self {
        Self {
            slug: slug.to_string(),
            title: title.to_string(),
            kind: PageKind::Document,
            raw_body: String::new(),
            front_matter: FrontMatter::default(),
            source: None,
        }
    }

    pub fn section(slug: &str, title: &str) -> Self {
        Self {
            kind: PageKind::Section,
            ..Self::document(slug, title)
        }
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.raw_body = body.to_string();
        self
    }
}
