//! Error types shared across the composition engine
//!
//! Configuration errors are fatal and abort startup. Content and render
//! errors are scoped to a single document or page and are collected into
//! the build report instead of being raised.

use std::path::PathBuf;
use thiserror::Error;

/// Settings could not be loaded
#[derive(Error, Debug)]
#[error("Failed to parse configuration {path:?}: {message}")]
pub struct ConfigParseError {
    pub path: PathBuf,
    pub message: String,
}

impl ConfigParseError {
    pub fn new(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// A single content document (or directory manifest) could not be loaded
#[derive(Error, Debug)]
pub enum ContentParseError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Reading {path:?} timed out after {timeout_ms}ms")]
    Timeout { path: PathBuf, timeout_ms: u64 },

    #[error("Invalid front-matter in {path:?}: {message}")]
    FrontMatter { path: PathBuf, message: String },

    #[error("Invalid directory manifest {path:?}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("{path:?} maps to {url}, which is already taken")]
    DuplicateUrl { path: PathBuf, url: String },

    #[error("Directory {path:?} links back to one of its parents")]
    Cycle { path: PathBuf },
}

impl ContentParseError {
    /// The file the error refers to
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Io { path, .. }
            | Self::Timeout { path, .. }
            | Self::FrontMatter { path, .. }
            | Self::Manifest { path, .. }
            | Self::DuplicateUrl { path, .. }
            | Self::Cycle { path } => path,
        }
    }
}

/// A page could not be rendered
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to render markup for {url}: {message}")]
    Markup { url: String, message: String },

    #[error("Failed to expand template for {url}: {message}")]
    Template { url: String, message: String },
}

impl RenderError {
    /// URL of the page that failed
    pub fn url(&self) -> &str {
        match self {
            Self::Markup { url, .. } | Self::Template { url, .. } => url,
        }
    }
}

/// The asset resolver was configured with an unusable base
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AssetResolutionError {
    #[error("Asset base {0:?} must not contain whitespace, '?' or '#'")]
    InvalidBase(String),
}

/// A per-document or per-page problem recorded during a build
#[derive(Error, Debug)]
pub enum BuildIssue {
    #[error(transparent)]
    Content(#[from] ContentParseError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
