//! Layout templates and the template evaluator
//!
//! Default layouts are embedded in the binary; a site may override any of
//! them by dropping a file with the same name into its layouts directory.

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tera::{Context, Tera, Value};
use walkdir::WalkDir;

use crate::config::SettingsStore;
use crate::helpers::{AssetResolver, Breadcrumb, MenuEntry, TitleEntry};

/// Named layout sources
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: IndexMap<String, String>,
}

impl TemplateSet {
    /// The embedded default layouts
    pub fn builtin() -> Self {
        let mut templates = IndexMap::new();
        for (name, source) in [
            ("base.html", include_str!("default/base.html")),
            ("home.html", include_str!("default/home.html")),
            ("page.html", include_str!("default/page.html")),
        ] {
            templates.insert(name.to_string(), source.to_string());
        }
        Self { templates }
    }

    /// Embedded defaults overridden by `*.html` files under `layouts_dir`
    pub fn load(layouts_dir: &Path) -> Result<Self> {
        let mut set = Self::builtin();
        if !layouts_dir.exists() {
            return Ok(set);
        }

        for entry in WalkDir::new(layouts_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let name = path
                .strip_prefix(layouts_dir)?
                .to_string_lossy()
                .replace('\\', "/");
            let source = fs::read_to_string(path)?;
            tracing::debug!("Loaded layout {} from {:?}", name, path);
            set.templates.insert(name, source);
        }

        Ok(set)
    }

    /// Source of a layout, by name with or without `.html`
    pub fn layout(&self, name: &str) -> Option<&str> {
        self.templates
            .get(&format!("{}.html", name))
            .or_else(|| self.templates.get(name))
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.templates.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Everything a layout can see while rendering one page
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    pub title: String,
    pub url: String,
    pub home_url: String,
    /// Rendered page body
    pub content: String,
    pub breadcrumb: Vec<Breadcrumb>,
    pub side_menu: Vec<MenuEntry>,
    /// Level indexes 0 (top sections) and 1 (their sub-pages)
    pub titles_at_level: Vec<Vec<TitleEntry>>,
    pub is_home: bool,
    pub is_section: bool,
    pub layout: String,
    /// Pass-through front-matter keys
    pub meta: IndexMap<String, serde_yaml::Value>,
    pub generated_at: String,
    pub current_year: String,

    /// Backs the `setting(key=...)` and `settings(key=...)` functions
    #[serde(skip)]
    pub settings: Arc<SettingsStore>,
    /// Backs the `asset(path=...)` function
    #[serde(skip)]
    pub assets: Arc<AssetResolver>,
}

/// Expands a template source against a render context
pub trait TemplateEvaluator: Send + Sync {
    fn evaluate(&self, template: &str, context: &RenderContext) -> Result<String>;
}

/// Tera-backed evaluator
///
/// Every layout of the set is registered so templates can `extends` and
/// `include` each other.
#[derive(Clone)]
pub struct TeraEvaluator {
    tera: Tera,
}

impl TeraEvaluator {
    pub fn new(templates: &TemplateSet) -> Result<Self> {
        let mut tera = Tera::default();

        // Content is already HTML
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(templates.iter())?;

        Ok(Self { tera })
    }
}

impl TemplateEvaluator for TeraEvaluator {
    fn evaluate(&self, template: &str, context: &RenderContext) -> Result<String> {
        let mut tera = self.tera.clone();

        let settings = context.settings.clone();
        tera.register_function("setting", move |args: &HashMap<String, Value>| {
            let key = string_arg("setting", "key", args)?;
            Ok(settings.get(&key).to_json())
        });

        let settings = context.settings.clone();
        tera.register_function("settings", move |args: &HashMap<String, Value>| {
            let key = string_arg("settings", "key", args)?;
            Ok(Value::Array(
                settings.get_all(&key).iter().map(|v| v.to_json()).collect(),
            ))
        });

        let assets = context.assets.clone();
        tera.register_function("asset", move |args: &HashMap<String, Value>| {
            let path = string_arg("asset", "path", args)?;
            Ok(Value::String(assets.resolve(&path)))
        });

        let ctx = Context::from_serialize(context)?;
        tera.render_str(template, &ctx)
            .map_err(|e| anyhow!("{}", error_chain(&e)))
    }
}

/// Required string argument of a template function
fn string_arg(function: &str, name: &str, args: &HashMap<String, Value>) -> tera::Result<String> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(tera::Error::msg(format!(
            "`{}`: argument `{}` must be a string, got {}",
            function, name, other
        ))),
        None => Err(tera::Error::msg(format!(
            "`{}`: missing argument `{}`",
            function, name
        ))),
    }
}

/// Tera errors carry the useful detail in their sources
fn error_chain(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(e) = source {
        message.push_str(": ");
        message.push_str(&e.to_string());
        source = std::error::Error::source(e);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(settings: SettingsStore) -> RenderContext {
        RenderContext {
            title: "Examples".to_string(),
            url: "/db/examples".to_string(),
            home_url: "/".to_string(),
            content: "<p>Hello</p>".to_string(),
            breadcrumb: vec![
                Breadcrumb {
                    text: "Home".to_string(),
                    link: "/".to_string(),
                },
                Breadcrumb {
                    text: "Examples".to_string(),
                    link: "/db/examples".to_string(),
                },
            ],
            side_menu: Vec::new(),
            titles_at_level: vec![Vec::new(), Vec::new()],
            is_home: false,
            is_section: false,
            layout: "page".to_string(),
            meta: IndexMap::new(),
            generated_at: String::new(),
            current_year: "2026".to_string(),
            settings: Arc::new(settings),
            assets: Arc::new(AssetResolver::default()),
        }
    }

    #[test]
    fn test_builtin_layouts() {
        let set = TemplateSet::builtin();
        assert!(set.layout("home").is_some());
        assert!(set.layout("page.html").is_some());
        assert!(set.layout("missing").is_none());
    }

    #[test]
    fn test_layout_override() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.html"), "custom {{ title }}").unwrap();
        let set = TemplateSet::load(dir.path()).unwrap();
        assert_eq!(set.layout("page"), Some("custom {{ title }}"));
        assert!(set.layout("home").is_some());
    }

    #[test]
    fn test_setting_functions() {
        let store = SettingsStore::from_yaml(
            "page:\n  brand: Docs\n  body:\n    menu: [a, b]\n",
            "",
        )
        .unwrap();
        let evaluator = TeraEvaluator::new(&TemplateSet::builtin()).unwrap();
        let template = r#"{% set brand = setting(key="page/brand") %}{% set missing = setting(key="page/nope") %}{{ brand }}|{% if missing %}yes{% else %}no{% endif %}|{% for m in settings(key="page/body/menu") %}{{ m }}{% endfor %}|{{ asset(path="css/x.css") }}"#;
        let html = evaluator.evaluate(template, &context(store)).unwrap();
        assert_eq!(html, "Docs|no|ab|/css/x.css");
    }

    #[test]
    fn test_page_layout_renders_breadcrumb() {
        let evaluator = TeraEvaluator::new(&TemplateSet::builtin()).unwrap();
        let set = TemplateSet::builtin();
        let html = evaluator
            .evaluate(set.layout("page").unwrap(), &context(SettingsStore::default()))
            .unwrap();
        assert!(html.contains(r#"<li><a href="/">Home</a></li>"#));
        assert!(html.contains(r#"<li class="active">Examples</li>"#));
        assert!(html.contains("<p>Hello</p>"));
    }

    #[test]
    fn test_template_error() {
        let evaluator = TeraEvaluator::new(&TemplateSet::builtin()).unwrap();
        let result = evaluator.evaluate("{{ asset() }}", &context(SettingsStore::default()));
        assert!(result.is_err());
    }
}
