//! Site: the immutable page tree
//!
//! Pages live in a flat arena with parent/children relationships kept as
//! indices, so the tree has no ownership cycles and a built `Site` can be
//! shared read-only between render workers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::{FrontMatter, NewPage, Page, PageId, PageKind};
use crate::config::{normalize_url, SettingsStore, SiteConfig};

/// Why a page could not be attached to the tree
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TreeError {
    #[error("URL {0} is already taken")]
    DuplicateUrl(String),

    #[error("{0} is not a section and cannot own children")]
    NotASection(String),
}

/// A fully built site
#[derive(Debug)]
pub struct Site {
    settings: Arc<SettingsStore>,
    config: SiteConfig,
    content_root: PathBuf,
    pages: Vec<Page>,
    url_index: HashMap<String, PageId>,
}

impl Site {
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Shared handle to the settings, for render contexts
    pub fn settings_handle(&self) -> Arc<SettingsStore> {
        Arc::clone(&self.settings)
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    /// The home section
    pub fn root(&self) -> &Page {
        &self.pages[0]
    }

    pub fn page(&self, id: PageId) -> &Page {
        &self.pages[id.0]
    }

    /// Look up a page by URL; the URL is normalized first
    pub fn get(&self, url: &str) -> Option<&Page> {
        let url = normalize_url(url);
        self.url_index.get(&url).map(|&id| self.page(id))
    }

    pub fn parent(&self, page: &Page) -> Option<&Page> {
        page.parent.map(|id| self.page(id))
    }

    pub fn children<'a>(&'a self, page: &'a Page) -> impl Iterator<Item = &'a Page> + 'a {
        page.children.iter().map(move |&id| self.page(id))
    }

    /// All pages in pre-order, depth-first
    pub fn walk(&self) -> Vec<&Page> {
        let mut out = Vec::with_capacity(self.pages.len());
        let mut stack = vec![PageId(0)];
        while let Some(id) = stack.pop() {
            let page = self.page(id);
            out.push(page);
            stack.extend(page.children.iter().rev().copied());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// True exactly for the level-0 page at the configured home URL
    pub fn is_home(&self, page: &Page) -> bool {
        page.level == 0 && page.url == normalize_url(&self.config.home_url)
    }
}

/// Single-writer builder for a [`Site`]
pub struct SiteBuilder {
    site: Site,
}

impl SiteBuilder {
    /// Start a site whose home section sits at the configured home URL
    pub fn new(settings: SettingsStore, config: SiteConfig, content_root: PathBuf) -> Self {
        let root = Page {
            id: PageId(0),
            url: normalize_url(&config.home_url),
            title: config.home_title.clone(),
            level: 0,
            parent: None,
            kind: PageKind::Section,
            children: Vec::new(),
            raw_body: String::new(),
            front_matter: FrontMatter::default(),
            source: None,
        };
        let mut url_index = HashMap::new();
        url_index.insert(root.url.clone(), root.id);

        Self {
            site: Site {
                settings: Arc::new(settings),
                config,
                content_root,
                pages: vec![root],
                url_index,
            },
        }
    }

    pub fn root(&self) -> PageId {
        PageId(0)
    }

    /// Fill in the home section from the root index document
    pub fn set_root_content(
        &mut self,
        title: Option<String>,
        raw_body: String,
        front_matter: FrontMatter,
        source: Option<PathBuf>,
    ) {
        let root = &mut self.site.pages[0];
        if let Some(title) = title {
            root.title = title;
        }
        root.raw_body = raw_body;
        root.front_matter = front_matter;
        root.source = source;
    }

    /// Append a page to a section; children keep insertion order
    pub fn add(&mut self, parent: PageId, new: NewPage) -> Result<PageId, TreeError> {
        let parent_page = &self.site.pages[parent.0];
        if !parent_page.is_section() {
            return Err(TreeError::NotASection(parent_page.url.clone()));
        }

        let url = if parent_page.url == "/" {
            format!("/{}", new.slug)
        } else {
            format!("{}/{}", parent_page.url, new.slug)
        };
        if self.site.url_index.contains_key(&url) {
            return Err(TreeError::DuplicateUrl(url));
        }

        let id = PageId(self.site.pages.len());
        let level = parent_page.level + 1;
        self.site.pages.push(Page {
            id,
            url: url.clone(),
            title: new.title,
            level,
            parent: Some(parent),
            kind: new.kind,
            children: Vec::new(),
            raw_body: new.raw_body,
            front_matter: new.front_matter,
            source: new.source,
        });
        self.site.pages[parent.0].children.push(id);
        self.site.url_index.insert(url, id);
        Ok(id)
    }

    pub fn build(self) -> Site {
        self.site
    }
}
