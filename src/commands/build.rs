//! Build the site into the public directory

use anyhow::Result;

use crate::generator::{copy_content_files, copy_static_dir, BuildReport};
use crate::DocSite;

/// Render every page, write the output and copy static files
pub async fn run(app: &DocSite) -> Result<BuildReport> {
    let build = app.build().await?;

    let written = build.rendered.write(&app.public_dir)?;
    let files = copy_content_files(&app.content_dir, &app.public_dir, &app.config.manifest)?;
    let statics = copy_static_dir(&app.static_dir, &app.public_dir)?;
    tracing::info!(
        "Wrote {} page(s) and copied {} file(s) to {:?}",
        written,
        files + statics,
        app.public_dir
    );

    build.report.log();
    Ok(build.report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_build_writes_public_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "config.yml", "site:\n  public_dir: out\n");
        write(dir.path(), "content/index.md", "Welcome");
        write(dir.path(), "content/guide/intro.md", "# Intro");
        write(dir.path(), "content/guide/img/logo.png", "png");
        write(dir.path(), "content/broken.md", "---\ntitle: [unclosed\n---\nbody");
        write(dir.path(), "static/css/site.css", "body {}");

        let app = DocSite::new(&dir.path().join("config.yml"), None).unwrap();
        let report = run(&app).await.unwrap();
        assert_eq!(report.content_errors().count(), 1);
        assert_eq!(report.render_errors().count(), 0);

        let out = dir.path().join("out");
        assert!(out.join("index.html").exists());
        assert!(out.join("guide/index.html").exists());
        assert!(out.join("guide/intro/index.html").exists());
        assert!(out.join("guide/img/logo.png").exists());
        assert!(out.join("css/site.css").exists());
        assert!(!out.join("broken/index.html").exists());
    }
}
