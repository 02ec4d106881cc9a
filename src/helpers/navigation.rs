//! Navigation helpers: breadcrumbs, side menus and level indexes
//!
//! All of these are pure functions over a built [`Site`].

use serde::Serialize;

use crate::content::{Page, Site};

/// One breadcrumb entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub text: String,
    pub link: String,
}

/// One side menu entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub url: String,
    pub text: String,
    pub is_section: bool,
    /// The entry is the page being rendered
    pub active: bool,
}

/// One entry of a level index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleEntry {
    pub url: String,
    pub text: String,
}

/// Path from the home page to `page`, root first, `page` last
pub fn breadcrumb(site: &Site, page: &Page) -> Vec<Breadcrumb> {
    let mut trail = Vec::with_capacity(page.level + 1);
    let mut current = Some(page);
    while let Some(p) = current {
        trail.push(Breadcrumb {
            text: p.title.clone(),
            link: p.url.clone(),
        });
        current = site.parent(p);
    }
    trail.reverse();
    trail
}

/// Entries for the side menu of `page`
///
/// A section lists its own children. A document lists its parent's
/// children, itself included, so the menu looks the same on every page of
/// a section.
pub fn side_menu(site: &Site, page: &Page) -> Vec<MenuEntry> {
    let owner = if page.is_section() {
        page
    } else {
        match site.parent(page) {
            Some(parent) => parent,
            None => return Vec::new(),
        }
    };

    site.children(owner)
        .map(|child| MenuEntry {
            url: child.url.clone(),
            text: child.title.clone(),
            is_section: child.is_section(),
            active: child.id == page.id,
        })
        .collect()
}

/// Global index of pages at depth `n` below the home page
///
/// Depth 0 are the top sections (children of the home page), depth 1 their
/// immediate sub-pages. Entries keep pre-order, depth-first tree order.
pub fn titles_at_level(site: &Site, n: usize) -> Vec<TitleEntry> {
    site.walk()
        .into_iter()
        .filter(|p| p.level == n + 1)
        .map(|p| TitleEntry {
            url: p.url.clone(),
            text: p.title.clone(),
        })
        .collect()
}
