use serde::{Deserialize, Serialize};

/// Kind of a content block, as spoken on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Text,
    Header,
    Table,
    List,
    File,
    Link,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Bullet,
    Number,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Audio,
    Document,
    Link,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Photo => "photo",
            MediaType::Audio => "audio",
            MediaType::Document => "document",
            MediaType::Link => "link",
        }
    }
}

/// Block content is a plain string for every type except tables, which
/// carry a row-major grid of cell strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockContent {
    Text(String),
    Grid(Vec<Vec<String>>),
}

impl Default for BlockContent {
    fn default() -> Self {
        BlockContent::Text(String::new())
    }
}

impl BlockContent {
    pub fn text(&self) -> &str {
        match self {
            BlockContent::Text(text) => text,
            BlockContent::Grid(_) => "",
        }
    }

    pub fn grid(&self) -> Option<&Vec<Vec<String>>> {
        match self {
            BlockContent::Text(_) => None,
            BlockContent::Grid(grid) => Some(grid),
        }
    }
}

/// A single block of a collection.
///
/// The server assigns identifiers and owns the linkage fields at the
/// bottom; those are accepted from responses but never serialized back,
/// so any payload built from a `Block` is already stripped the way the
/// save and replace operations require.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub content: BlockContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_type: Option<ListType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_count: Option<usize>,
    /// Insertion index, only meaningful on creation payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    #[serde(default, skip_serializing)]
    pub collection_id: Option<i64>,
    #[serde(default, skip_serializing)]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing)]
    pub tag_id: Option<i64>,
    #[serde(default, skip_serializing)]
    pub name: Option<String>,
    #[serde(default, skip_serializing)]
    pub qdrant_collection_name: Option<String>,
}

impl Block {
    pub fn new(block_type: BlockType) -> Self {
        Self {
            id: None,
            block_type,
            content: BlockContent::default(),
            level: None,
            list_type: None,
            media_type: None,
            file_path: None,
            file_name: None,
            row_count: None,
            column_count: None,
            index: None,
            collection_id: None,
            user_id: None,
            tag_id: None,
            name: None,
            qdrant_collection_name: None,
        }
    }

    /// An empty text block to be created at `index`.
    pub fn empty_text(index: usize) -> Self {
        let mut block = Self::new(BlockType::Text);
        block.index = Some(index);
        block
    }

    /// An empty list block of the given style to be created at `index`.
    pub fn empty_list(list_type: ListType, index: usize) -> Self {
        let mut block = Self::new(BlockType::List);
        block.list_type = Some(list_type);
        block.index = Some(index);
        block
    }

    /// A fresh table with a blank `rows` x `columns` grid.
    pub fn empty_table(rows: usize, columns: usize) -> Self {
        let mut block = Self::new(BlockType::Table);
        block.content = BlockContent::Grid(vec![vec![String::new(); columns]; rows]);
        block.row_count = Some(rows);
        block.column_count = Some(columns);
        block
    }

    pub fn text(&self) -> &str {
        self.content.text()
    }

    pub fn grid(&self) -> Option<&Vec<Vec<String>>> {
        self.content.grid()
    }

    /// Effective table dimensions, falling back to the grid shape.
    pub fn table_dimensions(&self) -> (usize, usize) {
        let grid_rows = self.grid().map(|g| g.len()).unwrap_or(0);
        let grid_cols = self
            .grid()
            .and_then(|g| g.first())
            .map(|row| row.len())
            .unwrap_or(0);
        (
            self.row_count.unwrap_or(grid_rows.max(1)),
            self.column_count.unwrap_or(grid_cols.max(1)),
        )
    }

    /// Drop every type-specific attribute before a type switch.
    pub fn clear_type_fields(&mut self) {
        self.level = None;
        self.list_type = None;
        self.media_type = None;
        self.file_path = None;
        self.file_name = None;
        self.row_count = None;
        self.column_count = None;
    }
}

/// A collection row as listed by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub tag_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Response body of `GET /collections/{cid}`.
#[derive(Clone, Debug, Deserialize)]
pub struct CollectionContent {
    pub content: Vec<Block>,
    pub order_list: Vec<String>,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod model_tests;
