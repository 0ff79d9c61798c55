//! Layouts read from the editor's JSON file.
//!
//! The file maps layout names to documents:
//!
//! ```json
//! { "Arrows": { "items": [ { "i": "up_button", "keybinds": { "default": "ArrowUp" } } ] } }
//! ```
//!
//! The file is re-read on every lookup, so a layout saved in the editor is
//! picked up by the next phone that connects without restarting the host.
//! Sessions that are already open keep their snapshot.
//!
//! A missing, empty, or malformed file yields the built-in seed layouts
//! (`Arrows` and `default`) so a fresh install is immediately playable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use padlink_core::{default_layouts, Layout, LayoutDocument};

use crate::application::{LayoutStore, StoreError};

#[derive(Debug, Clone)]
pub struct JsonFileLayoutStore {
    path: PathBuf,
}

impl JsonFileLayoutStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every layout document in the file.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] for read failures other than "not found".
    pub async fn load_all(&self) -> Result<BTreeMap<String, LayoutDocument>, StoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not found; serving seed layouts", self.path.display());
                return Ok(default_layouts());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_str::<BTreeMap<String, LayoutDocument>>(&text) {
            Ok(docs) if !docs.is_empty() => Ok(docs),
            Ok(_) => {
                debug!("{} holds no layouts; serving seed layouts", self.path.display());
                Ok(default_layouts())
            }
            Err(e) => {
                warn!(
                    "{} is malformed ({e}); serving seed layouts",
                    self.path.display()
                );
                Ok(default_layouts())
            }
        }
    }
}

#[async_trait]
impl LayoutStore for JsonFileLayoutStore {
    async fn get_layout(&self, name: &str) -> Result<Layout, StoreError> {
        let mut docs = self.load_all().await?;
        let doc = docs
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        Ok(Layout::from_document(name, doc)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
