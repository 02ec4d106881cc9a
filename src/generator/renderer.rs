//! Page renderer - turns one page of a built site into a document

use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::Path;
use std::sync::Arc;

use crate::content::{MarkdownRenderer, MarkupRenderer, Page, Site};
use crate::error::RenderError;
use crate::helpers::{breadcrumb, side_menu, titles_at_level, AssetResolver};
use crate::templates::{RenderContext, TemplateEvaluator, TemplateSet, TeraEvaluator};

/// Layout used for the home page
pub const HOME_LAYOUT: &str = "home";
/// Layout used for every other page
pub const PAGE_LAYOUT: &str = "page";

/// Level indexes exposed to every page
const INDEX_LEVELS: usize = 2;

/// Renders pages of a site through the markup renderer and template evaluator
pub struct PageRenderer {
    templates: TemplateSet,
    markup: Arc<dyn MarkupRenderer>,
    evaluator: Arc<dyn TemplateEvaluator>,
    assets: Arc<AssetResolver>,
    generated_at: DateTime<Local>,
}

impl PageRenderer {
    pub fn new(
        templates: TemplateSet,
        markup: Arc<dyn MarkupRenderer>,
        evaluator: Arc<dyn TemplateEvaluator>,
        assets: AssetResolver,
    ) -> Self {
        Self {
            templates,
            markup,
            evaluator,
            assets: Arc::new(assets),
            generated_at: Local::now(),
        }
    }

    /// Markdown + Tera renderer with layouts from `layouts_dir`
    pub fn with_defaults(site: &Site, layouts_dir: &Path) -> Result<Self> {
        let templates = TemplateSet::load(layouts_dir)?;
        let evaluator = TeraEvaluator::new(&templates)?;
        let assets = AssetResolver::from_config(site.config())?;
        Ok(Self::new(
            templates,
            Arc::new(MarkdownRenderer::new()),
            Arc::new(evaluator),
            assets,
        ))
    }

    pub fn assets(&self) -> &AssetResolver {
        &self.assets
    }

    /// Layout name for a page
    fn layout_for(&self, page: &Page, site: &Site) -> String {
        match page.layout() {
            Some(layout) => layout.to_string(),
            None if site.is_home(page) => HOME_LAYOUT.to_string(),
            None => PAGE_LAYOUT.to_string(),
        }
    }

    /// Build the context a layout sees for `page`
    pub fn context(&self, page: &Page, site: &Site) -> Result<RenderContext, RenderError> {
        let content = self
            .markup
            .render(&page.raw_body)
            .map_err(|e| RenderError::Markup {
                url: page.url.clone(),
                message: format!("{:#}", e),
            })?;

        Ok(RenderContext {
            title: page.title.clone(),
            url: page.url.clone(),
            home_url: site.config().home_url.clone(),
            content,
            breadcrumb: breadcrumb(site, page),
            side_menu: side_menu(site, page),
            titles_at_level: (0..INDEX_LEVELS).map(|n| titles_at_level(site, n)).collect(),
            is_home: site.is_home(page),
            is_section: page.is_section(),
            layout: self.layout_for(page, site),
            meta: page.front_matter.extra.clone(),
            generated_at: self.generated_at.to_rfc3339(),
            current_year: self.generated_at.format("%Y").to_string(),
            settings: site.settings_handle(),
            assets: Arc::clone(&self.assets),
        })
    }

    /// Render a page to its final bytes; no partial output on failure
    pub fn render(&self, page: &Page, site: &Site) -> Result<Vec<u8>, RenderError> {
        let context = self.context(page, site)?;

        let template = self
            .templates
            .layout(&context.layout)
            .ok_or_else(|| RenderError::Template {
                url: page.url.clone(),
                message: format!("unknown layout `{}`", context.layout),
            })?;

        let html = self
            .evaluator
            .evaluate(template, &context)
            .map_err(|e| RenderError::Template {
                url: page.url.clone(),
                message: format!("{:#}", e),
            })?;

        Ok(html.into_bytes())
    }
}
