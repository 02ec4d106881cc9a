//! Asset URL resolution
//!
//! Maps logical asset paths to the URLs templates link to. Resolution is
//! pure string composition: no filesystem or network access.

use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::config::SiteConfig;
use crate::error::AssetResolutionError;

/// Characters escaped inside asset paths
const PATH: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

/// Resolves logical asset paths against an optional base
#[derive(Debug, Clone, Default)]
pub struct AssetResolver {
    base: Option<String>,
    /// Logical path -> fingerprinted path, both without a leading slash
    fingerprints: IndexMap<String, String>,
}

impl AssetResolver {
    /// Create a resolver; an empty base counts as no base
    pub fn new(
        base: Option<&str>,
        fingerprints: &IndexMap<String, String>,
    ) -> Result<Self, AssetResolutionError> {
        let base = match base.map(|b| b.trim_end_matches('/')) {
            None | Some("") => None,
            Some(b) if b.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') => {
                return Err(AssetResolutionError::InvalidBase(b.to_string()))
            }
            Some(b) => Some(b.to_string()),
        };

        let fingerprints = fingerprints
            .iter()
            .map(|(k, v)| {
                (
                    k.trim_start_matches('/').to_string(),
                    v.trim_start_matches('/').to_string(),
                )
            })
            .collect();

        Ok(Self { base, fingerprints })
    }

    /// Build the resolver described by the site configuration
    pub fn from_config(config: &SiteConfig) -> Result<Self, AssetResolutionError> {
        Self::new(config.asset_base.as_deref(), &config.fingerprints)
    }

    /// Resolve a logical path to a URL
    ///
    /// # Examples
    /// ```ignore
    /// resolver.resolve("css/style.css") // -> "/css/style.css"
    /// // with base "https://cdn.example.com/static"
    /// resolver.resolve("css/style.css") // -> "https://cdn.example.com/static/css/style.css"
    /// ```
    pub fn resolve(&self, path: &str) -> String {
        if self.is_resolved(path) {
            return path.to_string();
        }

        let logical = path.trim_start_matches('/');
        let physical = self
            .fingerprints
            .get(logical)
            .map(String::as_str)
            .unwrap_or(logical);
        let encoded = utf8_percent_encode(physical, PATH).to_string();

        match &self.base {
            Some(base) => format!("{}/{}", base, encoded),
            None => format!("/{}", encoded),
        }
    }

    /// Whether `path` already is an output of [`resolve`](Self::resolve)
    fn is_resolved(&self, path: &str) -> bool {
        if path.starts_with("//") || path.starts_with("data:") || has_scheme(path) {
            return true;
        }
        match &self.base {
            Some(base) => path == base || path.starts_with(&format!("{}/", base)),
            None => false,
        }
    }
}

/// `scheme://...`
fn has_scheme(path: &str) -> bool {
    match path.find("://") {
        Some(pos) => {
            let scheme = &path[..pos];
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprints() -> IndexMap<String, String> {
        let mut map = IndexMap::new();
        map.insert("css/site.css".to_string(), "css/site.3f9a1c.css".to_string());
        map
    }

    #[test]
    fn test_resolve_without_base() {
        let resolver = AssetResolver::default();
        assert_eq!(resolver.resolve("css/style.css"), "/css/style.css");
        assert_eq!(resolver.resolve("/css/style.css"), "/css/style.css");
        assert_eq!(resolver.resolve("img/my logo.png"), "/img/my%20logo.png");
    }

    #[test]
    fn test_resolve_with_absolute_base() {
        let resolver =
            AssetResolver::new(Some("https://cdn.example.com/static/"), &IndexMap::new()).unwrap();
        assert_eq!(
            resolver.resolve("js/app.js"),
            "https://cdn.example.com/static/js/app.js"
        );
    }

    #[test]
    fn test_resolve_with_relative_base() {
        let resolver = AssetResolver::new(Some("/static"), &IndexMap::new()).unwrap();
        assert_eq!(resolver.resolve("js/app.js"), "/static/js/app.js");
        assert_eq!(resolver.resolve("/static/js/app.js"), "/static/js/app.js");
    }

    #[test]
    fn test_fingerprinted_paths() {
        let resolver = AssetResolver::new(None, &fingerprints()).unwrap();
        assert_eq!(resolver.resolve("css/site.css"), "/css/site.3f9a1c.css");
        assert_eq!(resolver.resolve("/css/site.css"), "/css/site.3f9a1c.css");
    }

    #[test]
    fn test_external_urls_unchanged() {
        let resolver = AssetResolver::new(Some("/static"), &IndexMap::new()).unwrap();
        for url in [
            "https://fonts.example.com/a.css",
            "//cdn.example.com/b.js",
            "data:image/png;base64,AAAA",
        ] {
            assert_eq!(resolver.resolve(url), url);
        }
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let resolvers = [
            AssetResolver::default(),
            AssetResolver::new(Some("/static"), &fingerprints()).unwrap(),
            AssetResolver::new(Some("https://cdn.example.com/x"), &fingerprints()).unwrap(),
            AssetResolver::new(None, &fingerprints()).unwrap(),
        ];
        let inputs = [
            "css/site.css",
            "/css/site.css",
            "img/my logo.png",
            "",
            "js/app.js?v=2",
            "https://example.com/x.js",
        ];
        for resolver in &resolvers {
            for input in inputs {
                let once = resolver.resolve(input);
                assert_eq!(resolver.resolve(&once), once, "input {:?}", input);
            }
        }
    }

    #[test]
    fn test_invalid_base() {
        assert_eq!(
            AssetResolver::new(Some("/static?x=1"), &IndexMap::new()).unwrap_err(),
            AssetResolutionError::InvalidBase("/static?x=1".to_string())
        );
    }
}
