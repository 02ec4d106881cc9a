//! Generator module - renders every page of a site and writes the output

mod renderer;

pub use renderer::{PageRenderer, HOME_LAYOUT, PAGE_LAYOUT};

use anyhow::Result;
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::config::normalize_url;
use crate::content::loader::is_markdown_file;
use crate::content::{html_escape, Site};
use crate::error::{BuildIssue, ContentParseError, RenderError};

/// Rendered documents keyed by page URL, in tree order
#[derive(Debug, Clone, Default)]
pub struct RenderedSite {
    pages: IndexMap<String, Vec<u8>>,
}

impl RenderedSite {
    /// Rendered bytes of a page; the URL is normalized first
    pub fn get(&self, url: &str) -> Option<&[u8]> {
        self.pages.get(&normalize_url(url)).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.pages.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Write `<url>/index.html` for every page below `public_dir`
    pub fn write(&self, public_dir: &Path) -> Result<usize> {
        fs::create_dir_all(public_dir)?;
        for (url, bytes) in &self.pages {
            let output_path = output_path(public_dir, url);
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&output_path, bytes)?;
            tracing::debug!("Generated: {:?}", output_path);
        }
        Ok(self.pages.len())
    }
}

/// File a page URL is written to
pub fn output_path(public_dir: &Path, url: &str) -> PathBuf {
    let clean = url.trim_matches('/');
    if clean.is_empty() {
        public_dir.join("index.html")
    } else {
        public_dir.join(clean).join("index.html")
    }
}

/// Outcome of a build
#[derive(Debug)]
pub struct BuildReport {
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    /// Pages in the tree
    pub pages: usize,
    /// Pages rendered without error
    pub pages_rendered: usize,
    pub issues: Vec<BuildIssue>,
}

impl BuildReport {
    pub fn content_errors(&self) -> impl Iterator<Item = &ContentParseError> {
        self.issues.iter().filter_map(|issue| match issue {
            BuildIssue::Content(e) => Some(e),
            BuildIssue::Render(_) => None,
        })
    }

    pub fn render_errors(&self) -> impl Iterator<Item = &RenderError> {
        self.issues.iter().filter_map(|issue| match issue {
            BuildIssue::Render(e) => Some(e),
            BuildIssue::Content(_) => None,
        })
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Log a one-line summary plus every issue
    pub fn log(&self) {
        for issue in &self.issues {
            tracing::warn!("{}", issue);
        }
        tracing::info!(
            "Rendered {}/{} page(s) in {:?} with {} issue(s)",
            self.pages_rendered,
            self.pages,
            self.elapsed,
            self.issues.len()
        );
    }
}

/// Renders a whole site on a bounded worker pool
pub struct Generator {
    renderer: PageRenderer,
    workers: usize,
}

impl Generator {
    pub fn new(renderer: PageRenderer, workers: usize) -> Self {
        Self { renderer, workers }
    }

    /// Render every page; a failed page gets an error page and a report entry
    pub fn render(
        &self,
        site: &Site,
        content_issues: Vec<ContentParseError>,
    ) -> Result<(RenderedSite, BuildReport)> {
        let started_at = Local::now();
        let start = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("render-{}", i))
            .build()?;

        let pages = site.walk();
        let results: Vec<(String, Result<Vec<u8>, RenderError>)> = pool.install(|| {
            pages
                .par_iter()
                .map(|page| (page.url.clone(), self.renderer.render(page, site)))
                .collect()
        });

        let mut issues: Vec<BuildIssue> = content_issues.into_iter().map(BuildIssue::from).collect();
        let mut rendered = RenderedSite::default();
        let mut pages_rendered = 0;
        for (url, result) in results {
            let bytes = match result {
                Ok(bytes) => {
                    pages_rendered += 1;
                    bytes
                }
                Err(e) => {
                    tracing::warn!("Failed to render {}: {}", url, e);
                    let page = fallback_page(&e);
                    issues.push(e.into());
                    page
                }
            };
            rendered.pages.insert(url, bytes);
        }

        let report = BuildReport {
            started_at,
            elapsed: start.elapsed(),
            pages: pages.len(),
            pages_rendered,
            issues,
        };
        Ok((rendered, report))
    }
}

/// Error page served in place of a page that failed to render
pub fn fallback_page(error: &RenderError) -> Vec<u8> {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"utf-8\">\n  <title>Rendering failed</title>\n</head>\n<body>\n  <h1>Rendering failed</h1>\n  <p>{}</p>\n  <pre>{}</pre>\n</body>\n</html>\n",
        html_escape(error.url()),
        html_escape(&error.to_string())
    )
    .into_bytes()
}

/// Copy non-document files of the content tree into `public_dir`
///
/// Hidden and `_`-prefixed entries, markdown and directory manifests are
/// left behind.
pub fn copy_content_files(content_dir: &Path, public_dir: &Path, manifest: &str) -> Result<usize> {
    let mut copied = 0;
    let walker = WalkDir::new(content_dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || {
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.') && !name.starts_with('_')
            }
        });

    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() || is_markdown_file(path) || entry.file_name() == manifest {
            continue;
        }
        copy_file(path, &public_dir.join(path.strip_prefix(content_dir)?))?;
        copied += 1;
    }

    Ok(copied)
}

/// Copy the static directory into `public_dir`
pub fn copy_static_dir(static_dir: &Path, public_dir: &Path) -> Result<usize> {
    if !static_dir.exists() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(static_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() {
            copy_file(path, &public_dir.join(path.strip_prefix(static_dir)?))?;
            copied += 1;
        }
    }

    Ok(copied)
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    tracing::debug!("Copied: {:?} -> {:?}", from, to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{sample_site, MarkdownRenderer, MarkupRenderer};
    use crate::helpers::AssetResolver;
    use crate::templates::{RenderContext, TemplateEvaluator, TemplateSet};
    use std::sync::Arc;

    /// Fails on pages whose body mentions `boom`
    struct PickyMarkup;

    impl MarkupRenderer for PickyMarkup {
        fn render(&self, markdown: &str) -> Result<String> {
            if markdown.contains("boom") {
                anyhow::bail!("cannot render <boom>");
            }
            MarkdownRenderer::new().render(markdown)
        }
    }

    struct UrlEvaluator;

    impl TemplateEvaluator for UrlEvaluator {
        fn evaluate(&self, _template: &str, context: &RenderContext) -> Result<String> {
            Ok(format!("page {}", context.url))
        }
    }

    fn generator() -> Generator {
        let renderer = PageRenderer::new(
            TemplateSet::builtin(),
            Arc::new(PickyMarkup),
            Arc::new(UrlEvaluator),
            AssetResolver::default(),
        );
        Generator::new(renderer, 2)
    }

    #[test]
    fn test_render_all_pages() {
        let site = sample_site();
        let (rendered, report) = generator().render(&site, Vec::new()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.pages, 5);
        assert_eq!(report.pages_rendered, 5);
        let urls: Vec<_> = rendered.iter().map(|(url, _)| url).collect();
        assert_eq!(
            urls,
            vec!["/", "/db", "/db/getting-started", "/db/examples", "/about"]
        );
        assert_eq!(rendered.get("/db/examples/"), Some("page /db/examples".as_bytes()));
    }

    #[test]
    fn test_failed_page_gets_fallback() {
        let mut builder = crate::content::SiteBuilder::new(
            Default::default(),
            Default::default(),
            Default::default(),
        );
        let root = builder.root();
        builder
            .add(root, crate::content::NewPage::document("ok", "ok"))
            .unwrap();
        builder
            .add(
                root,
                crate::content::NewPage::document("broken", "broken").with_body("boom"),
            )
            .unwrap();
        let site = builder.build();

        let (rendered, report) = generator().render(&site, Vec::new()).unwrap();
        assert_eq!(report.pages_rendered, 2);
        assert_eq!(report.render_errors().count(), 1);
        assert_eq!(report.render_errors().next().unwrap().url(), "/broken");

        let fallback = String::from_utf8(rendered.get("/broken").unwrap().to_vec()).unwrap();
        assert!(fallback.contains("Rendering failed"));
        assert!(fallback.contains("&lt;boom&gt;"));
        assert_eq!(rendered.get("/ok"), Some("page /ok".as_bytes()));
    }

    #[test]
    fn test_content_issues_are_reported() {
        let site = sample_site();
        let issue = ContentParseError::FrontMatter {
            path: PathBuf::from("content/bad.md"),
            message: "oops".to_string(),
        };
        let (_, report) = generator().render(&site, vec![issue]).unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.content_errors().count(), 1);
        assert_eq!(report.render_errors().count(), 0);
    }

    #[test]
    fn test_write_output() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        let site = sample_site();
        let (rendered, _) = generator().render(&site, Vec::new()).unwrap();

        assert_eq!(rendered.write(&public).unwrap(), 5);
        assert_eq!(
            fs::read_to_string(public.join("index.html")).unwrap(),
            "page /"
        );
        assert_eq!(
            fs::read_to_string(public.join("db/examples/index.html")).unwrap(),
            "page /db/examples"
        );
    }

    #[test]
    fn test_copy_files() {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        let statics = dir.path().join("static");
        let public = dir.path().join("public");
        fs::create_dir_all(content.join("db/img")).unwrap();
        fs::create_dir_all(content.join("_drafts")).unwrap();
        fs::create_dir_all(statics.join("css")).unwrap();
        fs::write(content.join("db/index.md"), "# db").unwrap();
        fs::write(content.join("db/img/diagram.png"), "png").unwrap();
        fs::write(content.join("db/_dir.yml"), "title: db").unwrap();
        fs::write(content.join("_drafts/secret.txt"), "x").unwrap();
        fs::write(statics.join("css/site.css"), "body {}").unwrap();

        assert_eq!(copy_content_files(&content, &public, "_dir.yml").unwrap(), 1);
        assert!(public.join("db/img/diagram.png").exists());
        assert!(!public.join("db/index.md").exists());
        assert!(!public.join("_drafts").exists());

        assert_eq!(copy_static_dir(&statics, &public).unwrap(), 1);
        assert!(public.join("css/site.css").exists());
        assert_eq!(copy_static_dir(&dir.path().join("missing"), &public).unwrap(), 0);
    }

    #[test]
    fn test_output_path() {
        let public = Path::new("public");
        assert_eq!(output_path(public, "/"), public.join("index.html"));
        assert_eq!(
            output_path(public, "/db/examples"),
            public.join("db/examples").join("index.html")
        );
    }
}
