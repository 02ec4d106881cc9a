//! Clean the public directory

use anyhow::Result;
use std::fs;

use crate::DocSite;

/// Delete the public directory
pub fn run(app: &DocSite) -> Result<()> {
    if app.public_dir.exists() {
        fs::remove_dir_all(&app.public_dir)?;
        tracing::info!("Deleted: {:?}", app.public_dir);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_public_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "").unwrap();
        fs::create_dir_all(dir.path().join("public/db")).unwrap();
        fs::write(dir.path().join("public/db/index.html"), "x").unwrap();

        let app = DocSite::new(&dir.path().join("config.yml"), None).unwrap();
        run(&app).unwrap();
        assert!(!app.public_dir.exists());
        // Nothing left to delete
        run(&app).unwrap();
    }
}
