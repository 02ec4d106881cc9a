//! Directory manifest (`_dir.yml`)
//!
//! ```yaml
//! title: Database adapters
//! order:
//!   - getting-started
//!   - examples.md
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ContentParseError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DirManifest {
    /// Section title used when the index document has none
    pub title: Option<String>,
    /// Entry names listed first, in this order
    pub order: Vec<String>,
}

impl DirManifest {
    /// Load the manifest of a directory, `Ok(None)` when there is none
    pub fn load(path: &Path) -> Result<Option<Self>, ContentParseError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ContentParseError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Some(Self::default()));
        }

        serde_yaml::from_str(&content)
            .map(Some)
            .map_err(|e| ContentParseError::Manifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Position of an entry in the explicit order
    ///
    /// Entries may be listed by full file name or by stem.
    pub fn position(&self, file_name: &str, stem: &str) -> Option<usize> {
        self.order
            .iter()
            .position(|listed| listed == file_name || listed == stem)
    }
}
