use tracing::info;

use crate::api::{ApiError, CollectionApi};
use crate::model::{Collection, Tag};

/// Sidebar state: the collection list and the tag cache, kept apart
/// from the open session. Selection is tracked by identifier so it
/// survives reloads.
pub struct Explorer<A> {
    api: A,
    collections: Vec<Collection>,
    tags: Vec<Tag>,
    selected_id: Option<i64>,
}

impl<A: CollectionApi> Explorer<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            collections: Vec::new(),
            tags: Vec::new(),
            selected_id: None,
        }
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag_name(&self, tag_id: Option<i64>) -> Option<&str> {
        let tag_id = tag_id?;
        self.tags
            .iter()
            .find(|tag| tag.id == tag_id)
            .map(|tag| tag.name.as_str())
    }

    pub fn selected(&self) -> Option<&Collection> {
        let id = self.selected_id?;
        self.collections.iter().find(|collection| collection.id == id)
    }

    pub fn selected_index(&self) -> Option<usize> {
        let id = self.selected_id?;
        self.collections.iter().position(|collection| collection.id == id)
    }

    pub fn select_index(&mut self, index: usize) {
        self.selected_id = self.collections.get(index).map(|collection| collection.id);
    }

    pub fn move_selection(&mut self, delta: i32) {
        if self.collections.is_empty() {
            self.selected_id = None;
            return;
        }
        let current = self.selected_index().unwrap_or(0) as i32;
        let len = self.collections.len() as i32;
        let next = (current + delta).rem_euclid(len) as usize;
        self.select_index(next);
    }

    /// Reload collections and tags. Keeps the current selection when
    /// the collection still exists, otherwise falls back to the first.
    pub async fn load(&mut self) -> Result<(), ApiError> {
        self.collections = self.api.list_collections().await?;
        self.tags = self.api.list_tags().await?;
        if self.selected().is_none() {
            self.selected_id = self.collections.first().map(|collection| collection.id);
        }
        Ok(())
    }

    /// Create a collection. An empty name is a validation no-op.
    pub async fn create(&mut self, name: &str) -> Result<Option<Collection>, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let created = self.api.create_collection(name).await?;
        info!(collection = created.id, "created collection");
        self.load().await?;
        self.selected_id = Some(created.id);
        Ok(Some(created))
    }

    pub async fn delete(&mut self, collection_id: i64) -> Result<(), ApiError> {
        self.api.delete_collection(collection_id).await?;
        info!(collection = collection_id, "deleted collection");
        self.load().await
    }

    /// Rename a collection. Empty or unchanged names are a no-op; the
    /// server's response is authoritative for the resulting name.
    pub async fn rename(
        &mut self,
        collection_id: i64,
        new_name: &str,
    ) -> Result<Option<Collection>, ApiError> {
        let new_name = new_name.trim();
        let unchanged = self
            .collections
            .iter()
            .find(|collection| collection.id == collection_id)
            .map(|collection| collection.name == new_name)
            .unwrap_or(false);
        if new_name.is_empty() || unchanged {
            return Ok(None);
        }
        let updated = self.api.rename_collection(collection_id, new_name).await?;
        self.load().await?;
        Ok(Some(updated))
    }

    /// Assign or clear a collection's tag.
    pub async fn set_tag(
        &mut self,
        collection_id: i64,
        tag_id: Option<i64>,
    ) -> Result<Collection, ApiError> {
        let updated = self.api.update_collection_tag(collection_id, tag_id).await?;
        self.load().await?;
        Ok(updated)
    }

    /// Create a tag. An empty name is a validation no-op.
    pub async fn create_tag(&mut self, name: &str) -> Result<Option<Tag>, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let created = self.api.create_tag(name).await?;
        self.load().await?;
        Ok(Some(created))
    }

    pub async fn delete_tag(&mut self, tag_id: i64) -> Result<(), ApiError> {
        self.api.delete_tag(tag_id).await?;
        self.load().await
    }
}

#[cfg(test)]
#[path = "explorer_tests.rs"]
mod explorer_tests;
