//! Fixed in-memory layouts, for tests and embedding.

use std::collections::HashMap;

use async_trait::async_trait;

use padlink_core::{Item, Layout, LayoutDocument};

use crate::application::{LayoutStore, StoreError};

#[derive(Debug, Clone, Default)]
pub struct InMemoryLayoutStore {
    layouts: HashMap<String, Vec<Item>>,
}

impl InMemoryLayoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of one named layout.
    pub fn with_layout(mut self, name: impl Into<String>, items: Vec<Item>) -> Self {
        self.insert(name, items);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, items: Vec<Item>) {
        self.layouts.insert(name.into(), items);
    }

    pub fn from_documents(docs: impl IntoIterator<Item = (String, LayoutDocument)>) -> Self {
        Self {
            layouts: docs.into_iter().map(|(name, doc)| (name, doc.items)).collect(),
        }
    }
}

#[async_trait]
impl LayoutStore for InMemoryLayoutStore {
    async fn get_layout(&self, name: &str) -> Result<Layout, StoreError> {
        let items = self
            .layouts
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        Ok(Layout::new(name, items.iter().cloned())?)
    }
}
