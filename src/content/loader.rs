//! Content tree builder - scans the content directory into a [`Site`]
//!
//! The build runs in three passes: a synchronous directory scan, bounded
//! reads of every document, and a single-writer assembly of the tree.
//! A document that fails to read or parse is skipped and reported; it never
//! aborts the rest of the build.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use super::manifest::DirManifest;
use super::site::{Site, SiteBuilder, TreeError};
use super::{FrontMatter, NewPage, PageId, PageKind};
use crate::config::{SettingsStore, SiteConfig};
use crate::error::ContentParseError;

/// File names that hold a directory's own content
const INDEX_FILES: [&str; 2] = ["index.md", "_index.md"];

/// A directory as found on disk
#[derive(Debug)]
struct DirScan {
    path: PathBuf,
    name: String,
    index: Option<PathBuf>,
    manifest: Option<DirManifest>,
    files: Vec<PathBuf>,
    dirs: Vec<DirScan>,
}

impl DirScan {
    fn has_documents(&self) -> bool {
        self.index.is_some() || !self.files.is_empty() || self.dirs.iter().any(Self::has_documents)
    }

    fn documents(&self, out: &mut Vec<PathBuf>) {
        out.extend(self.index.iter().cloned());
        out.extend(self.files.iter().cloned());
        for dir in &self.dirs {
            dir.documents(out);
        }
    }
}

/// A parsed document
#[derive(Debug)]
struct Document {
    front_matter: FrontMatter,
    body: String,
}

/// A sibling waiting to be ordered
struct Candidate<'a> {
    file_name: String,
    stem: String,
    order: Option<i64>,
    entry: Entry<'a>,
}

enum Entry<'a> {
    File(&'a Path),
    Dir(&'a DirScan),
}

/// Builds a [`Site`] from a content directory
pub struct ContentTreeBuilder {
    settings: SettingsStore,
    config: SiteConfig,
    content_root: PathBuf,
}

impl ContentTreeBuilder {
    pub fn new(settings: SettingsStore, config: SiteConfig, content_root: PathBuf) -> Self {
        Self {
            settings,
            config,
            content_root,
        }
    }

    /// Scan, read and assemble the content tree
    ///
    /// Only an unreadable content root is fatal; everything else is returned
    /// alongside the site as per-document errors.
    pub async fn build(self) -> Result<(Site, Vec<ContentParseError>), ContentParseError> {
        let mut issues = Vec::new();

        let root_meta = fs::metadata(&self.content_root).map_err(|source| ContentParseError::Io {
            path: self.content_root.clone(),
            source,
        })?;
        if !root_meta.is_dir() {
            return Err(ContentParseError::Io {
                path: self.content_root.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "content root is not a directory",
                ),
            });
        }

        let mut ancestors = Vec::new();
        let scan = scan_dir(
            &self.content_root,
            &self.config.manifest,
            &mut ancestors,
            &mut issues,
        );

        let mut paths = Vec::new();
        scan.documents(&mut paths);
        let timeout = Duration::from_millis(self.config.read_timeout_ms);
        let mut documents = HashMap::with_capacity(paths.len());
        for path in paths {
            match read_document(&path, timeout).await {
                Ok(doc) => {
                    documents.insert(path, doc);
                }
                Err(e) => {
                    tracing::warn!("Skipping document: {}", e);
                    issues.push(e);
                }
            }
        }
        tracing::debug!("Read {} document(s)", documents.len());

        let mut builder = SiteBuilder::new(self.settings, self.config, self.content_root);
        if let Some(index) = &scan.index {
            if let Some(doc) = documents.remove(index) {
                builder.set_root_content(
                    doc.front_matter.title.clone(),
                    doc.body,
                    doc.front_matter,
                    Some(index.clone()),
                );
            }
        }
        let root = builder.root();
        assemble(&mut builder, root, &scan, &mut documents, &mut issues);

        let site = builder.build();
        tracing::info!(
            "Built content tree with {} page(s), {} issue(s)",
            site.len(),
            issues.len()
        );
        Ok((site, issues))
    }
}

/// List a directory's entries in case-insensitive name order
///
/// `ancestors` holds the canonical paths of the directories being scanned,
/// so a link back to one of them is reported instead of followed.
fn scan_dir(
    dir: &Path,
    manifest_name: &str,
    ancestors: &mut Vec<PathBuf>,
    issues: &mut Vec<ContentParseError>,
) -> DirScan {
    ancestors.push(canonical(dir));

    let mut scan = DirScan {
        path: dir.to_path_buf(),
        name: dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        index: None,
        manifest: None,
        files: Vec::new(),
        dirs: Vec::new(),
    };

    match DirManifest::load(&dir.join(manifest_name)) {
        Ok(manifest) => scan.manifest = manifest,
        Err(e) => {
            tracing::warn!("Ignoring manifest: {}", e);
            issues.push(e);
        }
    }

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by(|a, b| {
            a.file_name()
                .to_string_lossy()
                .to_lowercase()
                .cmp(&b.file_name().to_string_lossy().to_lowercase())
        });

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Failed to list {:?}: {}", dir, e);
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path().to_path_buf();

        if INDEX_FILES.contains(&name.as_str()) {
            if scan.index.is_none() {
                scan.index = Some(path);
            } else {
                tracing::warn!("Ignoring second index document {:?}", path);
            }
            continue;
        }
        if name.starts_with('.') || name.starts_with('_') || name == manifest_name {
            continue;
        }

        if entry.file_type().is_dir() {
            if ancestors.contains(&canonical(&path)) {
                let e = ContentParseError::Cycle { path };
                tracing::warn!("Skipping directory: {}", e);
                issues.push(e);
                continue;
            }
            let sub = scan_dir(&path, manifest_name, ancestors, issues);
            if sub.has_documents() {
                scan.dirs.push(sub);
            }
        } else if entry.file_type().is_file() && is_markdown_file(&path) {
            // Pipes and devices never finish reading
            scan.files.push(path);
        }
    }

    ancestors.pop();
    scan
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Read and parse one document, bounded by `timeout`
async fn read_document(path: &Path, timeout: Duration) -> Result<Document, ContentParseError> {
    let content = read_bounded(path, timeout, tokio::fs::read_to_string(path)).await?;

    let (front_matter, body) =
        FrontMatter::parse(&content).map_err(|e| ContentParseError::FrontMatter {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(Document {
        body: body.to_string(),
        front_matter,
    })
}

/// Await `read`, giving up after `timeout`
async fn read_bounded<F>(path: &Path, timeout: Duration, read: F) -> Result<String, ContentParseError>
where
    F: Future<Output = std::io::Result<String>>,
{
    match tokio::time::timeout(timeout, read).await {
        Ok(Ok(content)) => Ok(content),
        Ok(Err(source)) => Err(ContentParseError::Io {
            path: path.to_path_buf(),
            source,
        }),
        Err(_) => Err(ContentParseError::Timeout {
            path: path.to_path_buf(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Attach the entries of `scan` under `parent`, recursing into directories
fn assemble(
    builder: &mut SiteBuilder,
    parent: PageId,
    scan: &DirScan,
    documents: &mut HashMap<PathBuf, Document>,
    issues: &mut Vec<ContentParseError>,
) {
    let mut candidates = Vec::with_capacity(scan.files.len() + scan.dirs.len());
    for file in &scan.files {
        // Unreadable documents were already reported
        let Some(doc) = documents.get(file) else {
            continue;
        };
        candidates.push(Candidate {
            file_name: file_name(file),
            stem: file_stem(file),
            order: doc.front_matter.order,
            entry: Entry::File(file),
        });
    }
    for dir in &scan.dirs {
        let order = dir
            .index
            .as_ref()
            .and_then(|index| documents.get(index))
            .and_then(|doc| doc.front_matter.order);
        candidates.push(Candidate {
            file_name: dir.name.clone(),
            stem: dir.name.clone(),
            order,
            entry: Entry::Dir(dir),
        });
    }

    order_candidates(&mut candidates, scan.manifest.as_ref());

    for candidate in candidates {
        match candidate.entry {
            Entry::File(path) => {
                let Some(doc) = documents.remove(path) else {
                    continue;
                };
                let title = doc
                    .front_matter
                    .title
                    .clone()
                    .unwrap_or_else(|| humanize(&candidate.stem));
                let new = NewPage {
                    slug: url_segment(&candidate.stem),
                    title,
                    kind: PageKind::Document,
                    raw_body: doc.body,
                    front_matter: doc.front_matter,
                    source: Some(path.to_path_buf()),
                };
                if let Err(e) = builder.add(parent, new) {
                    report_tree_error(path, e, issues);
                }
            }
            Entry::Dir(dir) => {
                let doc = dir.index.as_ref().and_then(|index| documents.remove(index));
                let (front_matter, body) = match doc {
                    Some(doc) => (doc.front_matter, doc.body),
                    None => (FrontMatter::default(), String::new()),
                };
                let title = front_matter
                    .title
                    .clone()
                    .or_else(|| dir.manifest.as_ref().and_then(|m| m.title.clone()))
                    .unwrap_or_else(|| humanize(&dir.name));
                let new = NewPage {
                    slug: url_segment(&dir.name),
                    title,
                    kind: PageKind::Section,
                    raw_body: body,
                    front_matter,
                    source: dir.index.clone(),
                };
                match builder.add(parent, new) {
                    Ok(id) => assemble(builder, id, dir, documents, issues),
                    Err(e) => report_tree_error(&dir.path, e, issues),
                }
            }
        }
    }
}

/// Default order: explicit `order` ascending, then case-insensitive name.
/// Manifest-listed entries go first, in manifest order.
fn order_candidates(candidates: &mut [Candidate<'_>], manifest: Option<&DirManifest>) {
    candidates.sort_by(|a, b| {
        let a_key = (a.order.is_none(), a.order, a.file_name.to_lowercase());
        let b_key = (b.order.is_none(), b.order, b.file_name.to_lowercase());
        a_key.cmp(&b_key)
    });

    if let Some(manifest) = manifest {
        // Stable, so unlisted entries keep their default order
        candidates.sort_by_key(|c| manifest.position(&c.file_name, &c.stem).unwrap_or(usize::MAX));
    }
}

fn report_tree_error(path: &Path, error: TreeError, issues: &mut Vec<ContentParseError>) {
    match error {
        TreeError::DuplicateUrl(url) => {
            let issue = ContentParseError::DuplicateUrl {
                path: path.to_path_buf(),
                url,
            };
            tracing::warn!("Skipping document: {}", issue);
            issues.push(issue);
        }
        // Parents handed to `assemble` are always sections
        TreeError::NotASection(url) => {
            tracing::error!("Cannot attach {:?} below document {}", path, url);
        }
    }
}

/// Check if a file is a markdown file
pub(crate) fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// URL segment for a file or directory name
fn url_segment(name: &str) -> String {
    let slug = slug::slugify(name);
    if slug.is_empty() {
        name.to_string()
    } else {
        slug
    }
}

/// Title derived from a file or directory name: `getting-started` -> `getting started`
pub fn humanize(name: &str) -> String {
    name.split(['-', '_', ' '])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
