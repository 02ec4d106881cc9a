//! Preview server
//!
//! Serves the last good build from memory. With watching enabled, any change
//! below the content, layouts or static directories (or to the settings
//! files) triggers a full rebuild whose result replaces the served snapshot.
//! A rebuild that fails leaves the previous snapshot in place.

use anyhow::Result;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    Router,
};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use percent_encoding::percent_decode_str;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::normalize_url;
use crate::content::loader::is_markdown_file;
use crate::{Build, DocSite};

/// Server state
struct ServerState {
    snapshot: RwLock<Arc<Build>>,
    static_dir: PathBuf,
    content_dir: PathBuf,
}

impl ServerState {
    fn new(build: Build, app: &DocSite) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(build)),
            static_dir: app.static_dir.clone(),
            content_dir: app.content_dir.clone(),
        }
    }

    async fn snapshot(&self) -> Arc<Build> {
        Arc::clone(&*self.snapshot.read().await)
    }

    async fn replace(&self, build: Build) {
        *self.snapshot.write().await = Arc::new(build);
    }
}

/// Build the site, then serve it until interrupted
pub async fn start(app: &DocSite, port: Option<u16>, watch: bool) -> Result<()> {
    let build = app.build().await?;
    build.report.log();

    let state = Arc::new(ServerState::new(build, app));

    let router = Router::new()
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let bind_ip = if app.config.bind == "localhost" {
        "127.0.0.1"
    } else {
        app.config.bind.as_str()
    };
    let port = port.unwrap_or(app.config.port);
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", app.config.bind, port);
    if watch {
        println!("Watching for changes...");
    }
    println!("Press Ctrl+C to stop.");

    if watch {
        let app = app.clone();
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = watch_and_rebuild(app, state).await {
                tracing::error!("File watcher error: {}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Paths whose changes require a rebuild
fn watched_paths(app: &DocSite) -> Vec<(PathBuf, RecursiveMode)> {
    vec![
        (app.content_dir.clone(), RecursiveMode::Recursive),
        (app.layouts_dir.clone(), RecursiveMode::Recursive),
        (app.static_dir.clone(), RecursiveMode::Recursive),
        (app.config_path.clone(), RecursiveMode::NonRecursive),
        (app.defaults_path.clone(), RecursiveMode::NonRecursive),
    ]
}

/// Changes to editor and VCS files never trigger a rebuild
fn is_relevant(path: &Path) -> bool {
    if path.components().any(|c| c.as_os_str() == ".git") {
        return false;
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name != ".DS_Store" && !name.ends_with('~') && !name.ends_with(".swp")
}

/// Watch for file changes and swap in a fresh build after each one
async fn watch_and_rebuild(app: DocSite, state: Arc<ServerState>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();

    // Create debouncer to avoid multiple rapid rebuilds
    let mut debouncer = new_debouncer(Duration::from_millis(500), move |res| {
        let _ = tx.send(res);
    })?;

    for (path, mode) in watched_paths(&app) {
        if path.exists() {
            debouncer.watcher().watch(&path, mode)?;
            tracing::debug!("Watching: {:?}", path);
        }
    }

    while let Some(res) = rx.recv().await {
        let events = match res {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Watch error: {:?}", e);
                continue;
            }
        };

        let changed: Vec<_> = events.iter().filter(|e| is_relevant(&e.path)).collect();
        if changed.is_empty() {
            continue;
        }
        for event in &changed {
            tracing::info!("File changed: {}", event.path.display());
        }

        match rebuild(&app).await {
            Ok(build) => {
                build.report.log();
                state.replace(build).await;
                tracing::info!("Rebuilt successfully");
            }
            Err(e) => {
                tracing::error!("Rebuild failed, still serving the previous build: {:#}", e);
            }
        }
    }

    Ok(())
}

/// Full rebuild, re-reading the settings files first
async fn rebuild(app: &DocSite) -> Result<Build> {
    let app = app.reload()?;
    app.build().await
}

/// Serve a rendered page, else a static or content file, else 404
async fn fallback_handler(
    State(state): State<Arc<ServerState>>,
    request: Request<Body>,
) -> Response {
    let path = percent_decode_str(request.uri().path())
        .decode_utf8_lossy()
        .to_string();
    let url = normalize_url(path.trim_end_matches("index.html"));

    let snapshot = state.snapshot().await;
    if let Some(bytes) = snapshot.rendered.get(&url) {
        return Html(bytes.to_vec()).into_response();
    }

    if !is_servable(&path) {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    let mut service = ServeDir::new(&state.static_dir).fallback(ServeDir::new(&state.content_dir));
    match service.try_call(request).await {
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Sources, manifests and hidden entries are never served raw
fn is_servable(path: &str) -> bool {
    !is_markdown_file(Path::new(path))
        && path
            .split('/')
            .all(|segment| !segment.starts_with('.') && !segment.starts_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    async fn state(root: &Path) -> (DocSite, Arc<ServerState>) {
        write(root, "config.yml", "");
        write(root, "content/index.md", "Welcome");
        write(root, "content/db/examples.md", "# Examples");
        write(root, "content/db/diagram.svg", "<svg/>");
        write(root, "static/css/site.css", "body {}");

        let app = DocSite::new(&root.join("config.yml"), None).unwrap();
        let build = app.build().await.unwrap();
        let state = Arc::new(ServerState::new(build, &app));
        (app, state)
    }

    async fn get(state: &Arc<ServerState>, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = fallback_handler(State(Arc::clone(state)), request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    #[tokio::test]
    async fn test_serves_rendered_pages() {
        let dir = tempfile::tempdir().unwrap();
        let (_, state) = state(dir.path()).await;

        let (status, body) = get(&state, "/db/examples/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<h1>Examples</h1>"));

        let (status, _) = get(&state, "/db/examples/index.html").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_static_fallback_and_404() {
        let dir = tempfile::tempdir().unwrap();
        let (_, state) = state(dir.path()).await;

        let (status, body) = get(&state, "/css/site.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body {}");

        let (status, body) = get(&state, "/db/diagram.svg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<svg/>");

        let (status, _) = get(&state, "/db/examples.md").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get(&state, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = state(dir.path()).await;

        // Content root gone: the rebuild fails wholesale
        fs::remove_dir_all(&app.content_dir).unwrap();
        assert!(rebuild(&app).await.is_err());
        let (status, _) = get(&state, "/db/examples").await;
        assert_eq!(status, StatusCode::OK);

        write(dir.path(), "content/new.md", "fresh");
        let build = rebuild(&app).await.unwrap();
        state.replace(build).await;
        let (status, _) = get(&state, "/db/examples").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = get(&state, "/new").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("fresh"));
    }

    #[test]
    fn test_is_servable() {
        assert!(is_servable("/css/site.css"));
        assert!(!is_servable("/db/examples.md"));
        assert!(!is_servable("/_drafts/x.png"));
        assert!(!is_servable("/.git/config"));
    }

    #[test]
    fn test_is_relevant() {
        assert!(is_relevant(Path::new("content/db/examples.md")));
        assert!(!is_relevant(Path::new("content/.git/index")));
        assert!(!is_relevant(Path::new("content/notes.md~")));
        assert!(!is_relevant(Path::new("content/.notes.md.swp")));
        assert!(!is_relevant(Path::new("static/.DS_Store")));
        assert!(is_relevant(Path::new("static/.github/workflows/ci.yml")));
        assert!(is_relevant(Path::new("content/my.gitnotes.md")));
        assert!(is_relevant(Path::new("content/.gitignore")));
    }
}
