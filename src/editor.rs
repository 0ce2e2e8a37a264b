use tracing::{debug, info};

use crate::api::{ApiError, CollectionApi};
use crate::model::{Block, BlockContent, BlockType, Collection, ListType, MediaType};
use crate::reorder::{Placement, reordered};
use crate::store::ContentStore;

/// The state tied to the currently open collection: its identity and
/// metadata plus the content store. Exactly one session is open at a
/// time; everything that used to be ambient state lives here.
#[derive(Clone, Debug)]
pub struct Session {
    pub collection_id: i64,
    pub collection_name: String,
    pub tag_id: Option<i64>,
    pub store: ContentStore,
}

/// Where focus should land after an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusTarget {
    Start,
    End,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FocusRequest {
    pub block_id: String,
    pub position: FocusTarget,
}

impl FocusRequest {
    fn start(block_id: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            position: FocusTarget::Start,
        }
    }

    fn end(block_id: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            position: FocusTarget::End,
        }
    }
}

/// Result of parsing a picker type token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeTarget {
    Text,
    Header(u8),
    List(ListType),
    Link,
}

/// Parse a type token such as `text`, `header 2` or `list number`.
/// `table` and `file …` tokens are handled by their own flows and are
/// not accepted here.
pub fn parse_type_token(token: &str) -> Option<TypeTarget> {
    let lowered = token.to_lowercase();
    let kind = lowered.split_whitespace().next()?;
    match kind {
        "text" => Some(TypeTarget::Text),
        "header" => {
            let level = lowered
                .chars()
                .last()
                .and_then(|ch| ch.to_digit(10))
                .map(|digit| digit as u8)
                .unwrap_or(1);
            Some(TypeTarget::Header(level))
        }
        "list" => {
            let list_type = if lowered.contains("number") {
                ListType::Number
            } else {
                ListType::Bullet
            };
            Some(TypeTarget::List(list_type))
        }
        "link" => Some(TypeTarget::Link),
        _ => None,
    }
}

/// Rebuild a table grid for new dimensions, preserving cell values at
/// matching coordinates and blanking everything new.
pub fn resized_grid(old: &[Vec<String>], rows: usize, columns: usize) -> Vec<Vec<String>> {
    (0..rows)
        .map(|row| {
            (0..columns)
                .map(|column| {
                    old.get(row)
                        .and_then(|cells| cells.get(column))
                        .cloned()
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect()
}

/// Mutates blocks and the order list, keeping the backend authoritative.
///
/// Every operation that changes the order list persists it before
/// returning, so the caller's redraw never runs ahead of the server.
/// Operations return focus requests instead of touching the UI.
pub struct BlockEditor<A> {
    api: A,
}

impl<A: CollectionApi> BlockEditor<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Fetch a collection's content and open a session for it. An empty
    /// collection is immediately seeded with one empty text block so
    /// the order list is never empty while the page is displayed.
    pub async fn open(&self, collection: &Collection) -> Result<Session, ApiError> {
        let content = self.api.fetch_collection_content(collection.id).await?;
        let mut store = ContentStore::from_content(content);
        if store.is_empty() {
            let created = self.api.put_block(collection.id, &Block::empty_text(0)).await?;
            store.push(created);
            self.api
                .update_order(collection.id, store.order())
                .await?;
        }
        info!(collection = collection.id, blocks = store.len(), "opened collection");
        Ok(Session {
            collection_id: collection.id,
            collection_name: collection.name.clone(),
            tag_id: collection.tag_id,
            store,
        })
    }

    /// Create the follow-up block for Enter: a list block of the same
    /// style after a non-empty list item, a plain text block otherwise
    /// (an emptied list item demotes to plain text).
    pub async fn split_after(
        &self,
        session: &mut Session,
        block_id: &str,
        draft_empty: bool,
    ) -> Result<FocusRequest, ApiError> {
        let continue_list = !draft_empty
            && session
                .store
                .get(block_id)
                .map(|block| block.block_type == BlockType::List)
                .unwrap_or(false);
        if continue_list {
            self.create_list_after(session, block_id).await
        } else {
            self.create_text_after(session, block_id).await
        }
    }

    pub async fn create_text_after(
        &self,
        session: &mut Session,
        block_id: &str,
    ) -> Result<FocusRequest, ApiError> {
        let index = session
            .store
            .index_of(block_id)
            .map(|index| index + 1)
            .unwrap_or(0);
        self.create_at(session, Block::empty_text(index), index).await
    }

    pub async fn create_list_after(
        &self,
        session: &mut Session,
        block_id: &str,
    ) -> Result<FocusRequest, ApiError> {
        let list_type = session
            .store
            .get(block_id)
            .and_then(|block| block.list_type)
            .unwrap_or(ListType::Bullet);
        let index = session
            .store
            .index_of(block_id)
            .map(|index| index + 1)
            .unwrap_or(0);
        self.create_at(session, Block::empty_list(list_type, index), index)
            .await
    }

    async fn create_at(
        &self,
        session: &mut Session,
        payload: Block,
        index: usize,
    ) -> Result<FocusRequest, ApiError> {
        let created = self.api.put_block(session.collection_id, &payload).await?;
        let id = session
            .store
            .insert_at(index, created)
            .unwrap_or_default();
        self.api
            .update_order(session.collection_id, session.store.order())
            .await?;
        debug!(block = %id, index, "created block");
        Ok(FocusRequest::start(id))
    }

    /// Persist edited string content. A no-op for unchanged content on
    /// every type except link blocks, which are always written. The
    /// server's response replaces the local block since it may
    /// normalize fields.
    pub async fn save_content(
        &self,
        session: &mut Session,
        block_id: &str,
        new_text: &str,
    ) -> Result<bool, ApiError> {
        let Some(block) = session.store.get(block_id) else {
            return Ok(false);
        };
        if block.block_type == BlockType::Table {
            return Ok(false);
        }
        if block.block_type != BlockType::Link && block.text() == new_text {
            return Ok(false);
        }
        let mut payload = block.clone();
        payload.content = BlockContent::Text(new_text.to_string());
        let saved = self.api.put_block(session.collection_id, &payload).await?;
        session.store.replace(block_id, saved);
        Ok(true)
    }

    /// Persist an edited table grid.
    pub async fn save_table(
        &self,
        session: &mut Session,
        block_id: &str,
        grid: Vec<Vec<String>>,
    ) -> Result<(), ApiError> {
        let Some(block) = session.store.get(block_id) else {
            return Ok(());
        };
        let mut payload = block.clone();
        payload.content = BlockContent::Grid(grid);
        let saved = self.api.put_block(session.collection_id, &payload).await?;
        session.store.replace(block_id, saved);
        Ok(())
    }

    /// Switch a block to the type named by a picker token, carrying the
    /// current text over. Table and file tokens never reach this
    /// operation. Returns `None` for tokens that do not name a type.
    pub async fn replace_type(
        &self,
        session: &mut Session,
        block_id: &str,
        token: &str,
        current_text: &str,
    ) -> Result<Option<FocusRequest>, ApiError> {
        let Some(target) = parse_type_token(token) else {
            return Ok(None);
        };
        let Some(existing) = session.store.get(block_id) else {
            return Ok(None);
        };

        let clean = current_text.trim().to_string();
        let mut payload = existing.clone();
        payload.clear_type_fields();
        match target {
            TypeTarget::Text => {
                payload.block_type = BlockType::Text;
                payload.content = BlockContent::Text(clean);
            }
            TypeTarget::Header(level) => {
                payload.block_type = BlockType::Header;
                payload.content = BlockContent::Text(clean);
                payload.level = Some(level);
            }
            TypeTarget::List(list_type) => {
                payload.block_type = BlockType::List;
                payload.content = BlockContent::Text(clean);
                payload.list_type = Some(list_type);
            }
            TypeTarget::Link => {
                payload.block_type = BlockType::Link;
                payload.media_type = Some(MediaType::Link);
                payload.content = BlockContent::Text("https://".to_string());
            }
        }

        let replaced = self.api.put_block(session.collection_id, &payload).await?;
        session.store.replace(block_id, replaced);
        let focus = match target {
            TypeTarget::Link => FocusRequest::start(block_id),
            _ => FocusRequest::end(block_id),
        };
        Ok(Some(focus))
    }

    /// Create a fresh 3x3 table, either replacing an existing block or
    /// appended at the end of the page.
    pub async fn create_table(
        &self,
        session: &mut Session,
        replace_block_id: Option<&str>,
    ) -> Result<Option<FocusRequest>, ApiError> {
        let mut payload = Block::empty_table(3, 3);
        if let Some(block_id) = replace_block_id {
            payload.id = session.store.get(block_id).and_then(|block| block.id.clone());
        }
        let created = self.api.put_block(session.collection_id, &payload).await?;
        match replace_block_id {
            Some(block_id) => {
                session.store.replace(block_id, created);
                Ok(Some(FocusRequest::start(block_id)))
            }
            None => {
                session.store.push(created);
                self.api
                    .update_order(session.collection_id, session.store.order())
                    .await?;
                Ok(None)
            }
        }
    }

    /// Delete a block. Rejected while it is the only one left, so the
    /// page never shows an empty order list. Optionally hands focus to
    /// the end of the preceding block.
    pub async fn delete(
        &self,
        session: &mut Session,
        block_id: &str,
        focus_previous: bool,
    ) -> Result<Option<FocusRequest>, ApiError> {
        if session.store.len() <= 1 || !session.store.contains(block_id) {
            return Ok(None);
        }
        let previous = session.store.previous_id(block_id).map(str::to_string);

        self.api.delete_block(session.collection_id, block_id).await?;
        session.store.remove(block_id);
        self.api
            .update_order(session.collection_id, session.store.order())
            .await?;
        debug!(block = block_id, "deleted block");

        Ok(match (focus_previous, previous) {
            (true, Some(previous)) => Some(FocusRequest::end(previous)),
            _ => None,
        })
    }

    /// Resize a table by whole rows/columns, clamped to a 1x1 minimum.
    /// Existing cell values keep their coordinates, new cells are blank.
    pub async fn resize_table(
        &self,
        session: &mut Session,
        block_id: &str,
        delta_rows: i64,
        delta_columns: i64,
    ) -> Result<bool, ApiError> {
        let Some(block) = session.store.get(block_id) else {
            return Ok(false);
        };
        if block.block_type != BlockType::Table {
            return Ok(false);
        }
        let (rows, columns) = block.table_dimensions();
        let new_rows = (rows as i64 + delta_rows).max(1) as usize;
        let new_columns = (columns as i64 + delta_columns).max(1) as usize;
        if new_rows == rows && new_columns == columns {
            return Ok(false);
        }

        let empty = Vec::new();
        let grid = resized_grid(block.grid().unwrap_or(&empty), new_rows, new_columns);
        let mut payload = block.clone();
        payload.content = BlockContent::Grid(grid);
        payload.row_count = Some(new_rows);
        payload.column_count = Some(new_columns);

        let saved = self.api.put_block(session.collection_id, &payload).await?;
        session.store.replace(block_id, saved);
        Ok(true)
    }

    /// Upload a file into a block and replace it with the server's
    /// resulting representation.
    pub async fn upload_file(
        &self,
        session: &mut Session,
        block_id: &str,
        media_type: MediaType,
        path: &std::path::Path,
    ) -> Result<FocusRequest, ApiError> {
        let updated = self
            .api
            .upload_file(session.collection_id, block_id, media_type, path)
            .await?;
        session.store.replace(block_id, updated);
        Ok(FocusRequest::start(block_id))
    }

    /// Apply a drop: optimistically install the new order, persist it,
    /// and roll back to the pre-drag snapshot if persisting fails.
    pub async fn apply_reorder(
        &self,
        session: &mut Session,
        source_id: &str,
        target_id: &str,
        placement: Placement,
        snapshot: &[String],
    ) -> Result<bool, ApiError> {
        let Some(new_order) = reordered(session.store.order(), source_id, target_id, placement)
        else {
            return Ok(false);
        };
        if !session.store.set_order(new_order) {
            return Ok(false);
        }
        match self
            .api
            .update_order(session.collection_id, session.store.order())
            .await
        {
            Ok(()) => Ok(true),
            Err(error) => {
                session.store.set_order(snapshot.to_vec());
                Err(error)
            }
        }
    }
}

#[cfg(test)]
#[path = "editor_tests.rs"]
mod editor_tests;
