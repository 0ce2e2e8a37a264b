use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::*;
use crate::api::{ApiError, CollectionApi};
use crate::model::{Collection, CollectionContent, Tag};

/// Records every mutation and hands out server-assigned identifiers;
/// responses carry a `collection_id` so tests can tell a server echo
/// from the local payload.
#[derive(Default)]
struct MockApi {
    puts: Mutex<Vec<serde_json::Value>>,
    order_updates: Mutex<Vec<Vec<String>>>,
    deletes: Mutex<Vec<String>>,
    fail_order_updates: Mutex<bool>,
    content: Mutex<Option<CollectionContent>>,
    next_id: AtomicUsize,
}

impl MockApi {
    fn with_content(content: CollectionContent) -> Self {
        let api = Self::default();
        *api.content.lock().unwrap() = Some(content);
        api
    }

    fn fail_order_updates(&self) {
        *self.fail_order_updates.lock().unwrap() = true;
    }

    fn last_put(&self) -> serde_json::Value {
        self.puts.lock().unwrap().last().cloned().expect("no put recorded")
    }

    fn order_update_count(&self) -> usize {
        self.order_updates.lock().unwrap().len()
    }
}

fn transport_error() -> ApiError {
    ApiError::Status {
        status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        operation: "test".to_string(),
    }
}

#[async_trait]
impl CollectionApi for MockApi {
    async fn fetch_collection_content(
        &self,
        _collection_id: i64,
    ) -> Result<CollectionContent, ApiError> {
        Ok(self
            .content
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(CollectionContent {
                content: Vec::new(),
                order_list: Vec::new(),
            }))
    }

    async fn put_block(&self, _collection_id: i64, block: &Block) -> Result<Block, ApiError> {
        self.puts
            .lock()
            .unwrap()
            .push(serde_json::to_value(block).unwrap());
        let mut response = block.clone();
        if response.id.is_none() {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            response.id = Some(format!("srv-{id}"));
        }
        response.index = None;
        response.collection_id = Some(99);
        Ok(response)
    }

    async fn delete_block(&self, _collection_id: i64, block_id: &str) -> Result<(), ApiError> {
        self.deletes.lock().unwrap().push(block_id.to_string());
        Ok(())
    }

    async fn update_order(&self, _collection_id: i64, order: &[String]) -> Result<(), ApiError> {
        if *self.fail_order_updates.lock().unwrap() {
            return Err(transport_error());
        }
        self.order_updates.lock().unwrap().push(order.to_vec());
        Ok(())
    }

    async fn upload_file(
        &self,
        _collection_id: i64,
        block_id: &str,
        media_type: MediaType,
        path: &Path,
    ) -> Result<Block, ApiError> {
        let mut block = Block::new(BlockType::File);
        block.id = Some(block_id.to_string());
        block.media_type = Some(media_type);
        block.file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        block.file_path = Some(path.display().to_string());
        Ok(block)
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, ApiError> {
        Ok(Vec::new())
    }

    async fn create_collection(&self, _name: &str) -> Result<Collection, ApiError> {
        Err(transport_error())
    }

    async fn delete_collection(&self, _collection_id: i64) -> Result<(), ApiError> {
        Ok(())
    }

    async fn rename_collection(
        &self,
        _collection_id: i64,
        _name: &str,
    ) -> Result<Collection, ApiError> {
        Err(transport_error())
    }

    async fn update_collection_tag(
        &self,
        _collection_id: i64,
        _tag_id: Option<i64>,
    ) -> Result<Collection, ApiError> {
        Err(transport_error())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        Ok(Vec::new())
    }

    async fn create_tag(&self, _name: &str) -> Result<Tag, ApiError> {
        Err(transport_error())
    }

    async fn delete_tag(&self, _tag_id: i64) -> Result<(), ApiError> {
        Ok(())
    }
}

fn stored_block(id: &str, block_type: BlockType) -> Block {
    let mut block = Block::new(block_type);
    block.id = Some(id.to_string());
    block
}

fn stored_text(id: &str, content: &str) -> Block {
    let mut block = stored_block(id, BlockType::Text);
    block.content = BlockContent::Text(content.to_string());
    block
}

fn stored_list(id: &str, list_type: ListType, content: &str) -> Block {
    let mut block = stored_block(id, BlockType::List);
    block.list_type = Some(list_type);
    block.content = BlockContent::Text(content.to_string());
    block
}

fn session_of(blocks: Vec<Block>) -> Session {
    let mut store = ContentStore::new();
    for block in blocks {
        store.push(block);
    }
    Session {
        collection_id: 7,
        collection_name: "Notes".to_string(),
        tag_id: None,
        store,
    }
}

fn collection() -> Collection {
    Collection {
        id: 7,
        name: "Notes".to_string(),
        tag_id: None,
        user_id: None,
    }
}

#[tokio::test]
async fn opening_an_empty_collection_seeds_one_text_block() {
    let editor = BlockEditor::new(MockApi::default());
    let session = editor.open(&collection()).await.unwrap();

    assert_eq!(session.store.len(), 1);
    let seeded = session.store.ordered_blocks().next().unwrap();
    assert_eq!(seeded.block_type, BlockType::Text);
    assert_eq!(seeded.text(), "");

    let payload = editor.api().last_put();
    assert_eq!(payload["type"], "text");
    assert_eq!(payload["index"], 0);
    assert_eq!(editor.api().order_update_count(), 1);
}

#[tokio::test]
async fn opening_a_populated_collection_does_not_touch_the_backend() {
    let api = MockApi::with_content(CollectionContent {
        content: vec![stored_text("a", "hello")],
        order_list: vec!["a".to_string()],
    });
    let editor = BlockEditor::new(api);
    let session = editor.open(&collection()).await.unwrap();
    assert_eq!(session.store.order(), ["a"]);
    assert!(editor.api().puts.lock().unwrap().is_empty());
    assert_eq!(editor.api().order_update_count(), 0);
}

#[tokio::test]
async fn enter_on_a_nonempty_list_item_continues_the_list() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![
        stored_list("a", ListType::Bullet, "first"),
        stored_text("b", "tail"),
    ]);

    let focus = editor.split_after(&mut session, "a", false).await.unwrap();

    let payload = editor.api().last_put();
    assert_eq!(payload["type"], "list");
    assert_eq!(payload["list_type"], "bullet");
    assert_eq!(payload["index"], 1);

    assert_eq!(session.store.order(), ["a", "srv-0", "b"]);
    assert_eq!(focus, FocusRequest {
        block_id: "srv-0".to_string(),
        position: FocusTarget::Start,
    });
    // The new order was persisted before the operation returned.
    assert_eq!(
        editor.api().order_updates.lock().unwrap().last().unwrap(),
        &vec!["a".to_string(), "srv-0".to_string(), "b".to_string()]
    );
}

#[tokio::test]
async fn enter_on_an_emptied_list_item_demotes_to_text() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![stored_list("a", ListType::Number, "was emptied")]);

    editor.split_after(&mut session, "a", true).await.unwrap();

    let payload = editor.api().last_put();
    assert_eq!(payload["type"], "text");
    assert!(payload.get("list_type").is_none());
}

#[tokio::test]
async fn save_is_a_noop_for_unchanged_content_except_links() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![
        stored_text("a", "same"),
        {
            let mut link = stored_block("l", BlockType::Link);
            link.media_type = Some(MediaType::Link);
            link.content = BlockContent::Text("https://example.org".to_string());
            link
        },
    ]);

    assert!(!editor.save_content(&mut session, "a", "same").await.unwrap());
    assert!(editor.api().puts.lock().unwrap().is_empty());

    assert!(
        editor
            .save_content(&mut session, "l", "https://example.org")
            .await
            .unwrap()
    );
    assert_eq!(editor.api().puts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn save_replaces_the_local_block_with_the_server_response() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![stored_text("a", "old")]);

    assert!(editor.save_content(&mut session, "a", "new").await.unwrap());
    let block = session.store.get("a").unwrap();
    assert_eq!(block.text(), "new");
    // The normalization marker proves the response, not the payload,
    // landed in the store.
    assert_eq!(block.collection_id, Some(99));
}

#[tokio::test]
async fn replace_type_builds_the_target_payload() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![stored_list("a", ListType::Bullet, "title")]);

    let focus = editor
        .replace_type(&mut session, "a", "header 2", "  title  ")
        .await
        .unwrap()
        .unwrap();

    let payload = editor.api().last_put();
    assert_eq!(payload["type"], "header");
    assert_eq!(payload["level"], 2);
    assert_eq!(payload["content"], "title");
    assert_eq!(payload["id"], "a");
    // The old list attribute was reset, and foreign fields never leave.
    assert!(payload.get("list_type").is_none());
    assert!(payload.get("tag_id").is_none());
    assert_eq!(focus.position, FocusTarget::End);
    assert_eq!(session.store.get("a").unwrap().block_type, BlockType::Header);
}

#[tokio::test]
async fn replace_type_with_link_resets_content_to_a_placeholder() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![stored_text("a", "some text")]);

    let focus = editor
        .replace_type(&mut session, "a", "link", "some text")
        .await
        .unwrap()
        .unwrap();

    let payload = editor.api().last_put();
    assert_eq!(payload["type"], "link");
    assert_eq!(payload["media_type"], "link");
    assert_eq!(payload["content"], "https://");
    assert_eq!(focus.position, FocusTarget::Start);
}

#[tokio::test]
async fn replace_type_rejects_unknown_tokens_without_a_request() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![stored_text("a", "text")]);
    let result = editor
        .replace_type(&mut session, "a", "gadget", "text")
        .await
        .unwrap();
    assert!(result.is_none());
    assert!(editor.api().puts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn deleting_the_sole_block_is_rejected() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![stored_text("a", "only")]);

    let focus = editor.delete(&mut session, "a", true).await.unwrap();
    assert!(focus.is_none());
    assert_eq!(session.store.len(), 1);
    assert!(editor.api().deletes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn deleting_removes_exactly_one_entry_and_focuses_the_predecessor() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![
        stored_text("a", "first"),
        stored_text("b", "second"),
        stored_text("c", "third"),
    ]);

    let focus = editor.delete(&mut session, "b", true).await.unwrap();
    assert_eq!(focus, Some(FocusRequest {
        block_id: "a".to_string(),
        position: FocusTarget::End,
    }));
    assert_eq!(session.store.order(), ["a", "c"]);
    assert!(!session.store.contains("b"));
    assert_eq!(editor.api().deletes.lock().unwrap().as_slice(), ["b"]);
    assert_eq!(
        editor.api().order_updates.lock().unwrap().last().unwrap(),
        &vec!["a".to_string(), "c".to_string()]
    );
}

#[tokio::test]
async fn resizing_a_table_preserves_existing_cells() {
    let editor = BlockEditor::new(MockApi::default());
    let mut table = stored_block("t", BlockType::Table);
    let grid: Vec<Vec<String>> = (0..3)
        .map(|row| (0..3).map(|column| format!("{row}:{column}")).collect())
        .collect();
    table.content = BlockContent::Grid(grid.clone());
    table.row_count = Some(3);
    table.column_count = Some(3);
    let mut session = session_of(vec![table]);

    assert!(editor.resize_table(&mut session, "t", 1, 0).await.unwrap());
    let resized = session.store.get("t").unwrap();
    let new_grid = resized.grid().unwrap();
    assert_eq!(new_grid.len(), 4);
    for row in 0..3 {
        for column in 0..3 {
            assert_eq!(new_grid[row][column], grid[row][column]);
        }
    }
    assert!(new_grid[3].iter().all(String::is_empty));
    assert_eq!(resized.row_count, Some(4));
    assert_eq!(resized.column_count, Some(3));
}

#[tokio::test]
async fn table_dimensions_clamp_at_one_by_one() {
    let editor = BlockEditor::new(MockApi::default());
    let mut table = stored_block("t", BlockType::Table);
    table.content = BlockContent::Grid(vec![vec!["x".to_string()]]);
    table.row_count = Some(1);
    table.column_count = Some(1);
    let mut session = session_of(vec![table]);

    assert!(!editor.resize_table(&mut session, "t", -1, -1).await.unwrap());
    assert!(editor.api().puts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn creating_a_table_in_place_keeps_the_order_list() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![stored_text("a", ""), stored_text("b", "")]);

    let focus = editor.create_table(&mut session, Some("a")).await.unwrap();
    assert_eq!(focus.unwrap().block_id, "a");
    assert_eq!(session.store.order(), ["a", "b"]);
    assert_eq!(session.store.get("a").unwrap().block_type, BlockType::Table);
    assert_eq!(editor.api().order_update_count(), 0);

    let payload = editor.api().last_put();
    assert_eq!(payload["id"], "a");
    assert_eq!(payload["row_count"], 3);
}

#[tokio::test]
async fn creating_a_table_without_a_target_appends_and_persists() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![stored_text("a", "")]);

    let focus = editor.create_table(&mut session, None).await.unwrap();
    assert!(focus.is_none());
    assert_eq!(session.store.order(), ["a", "srv-0"]);
    assert_eq!(editor.api().order_update_count(), 1);
}

#[tokio::test]
async fn reorder_persists_the_optimistic_order() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![
        stored_text("a", ""),
        stored_text("b", ""),
        stored_text("c", ""),
        stored_text("d", ""),
    ]);
    let snapshot: Vec<String> = session.store.order().to_vec();

    let moved = editor
        .apply_reorder(&mut session, "a", "c", Placement::After, &snapshot)
        .await
        .unwrap();
    assert!(moved);
    assert_eq!(session.store.order(), ["b", "c", "a", "d"]);
    assert_eq!(
        editor.api().order_updates.lock().unwrap().last().unwrap(),
        &vec![
            "b".to_string(),
            "c".to_string(),
            "a".to_string(),
            "d".to_string()
        ]
    );
}

#[tokio::test]
async fn failed_reorder_rolls_back_to_the_snapshot() {
    let editor = BlockEditor::new(MockApi::default());
    editor.api().fail_order_updates();
    let mut session = session_of(vec![
        stored_text("a", ""),
        stored_text("b", ""),
        stored_text("c", ""),
    ]);
    let snapshot: Vec<String> = session.store.order().to_vec();

    let result = editor
        .apply_reorder(&mut session, "a", "c", Placement::After, &snapshot)
        .await;
    assert!(result.is_err());
    assert_eq!(session.store.order(), ["a", "b", "c"]);
}

#[tokio::test]
async fn uploading_a_file_replaces_the_block() {
    let editor = BlockEditor::new(MockApi::default());
    let mut session = session_of(vec![stored_text("a", "")]);

    let focus = editor
        .upload_file(
            &mut session,
            "a",
            MediaType::Document,
            Path::new("/tmp/report.pdf"),
        )
        .await
        .unwrap();
    assert_eq!(focus.position, FocusTarget::Start);
    let block = session.store.get("a").unwrap();
    assert_eq!(block.block_type, BlockType::File);
    assert_eq!(block.file_name.as_deref(), Some("report.pdf"));
}

#[test]
fn type_tokens_parse_like_the_picker_emits_them() {
    assert_eq!(parse_type_token("text"), Some(TypeTarget::Text));
    assert_eq!(parse_type_token("header 1"), Some(TypeTarget::Header(1)));
    assert_eq!(parse_type_token("Header 3"), Some(TypeTarget::Header(3)));
    assert_eq!(parse_type_token("header"), Some(TypeTarget::Header(1)));
    assert_eq!(
        parse_type_token("list bullet"),
        Some(TypeTarget::List(ListType::Bullet))
    );
    assert_eq!(
        parse_type_token("list number"),
        Some(TypeTarget::List(ListType::Number))
    );
    assert_eq!(parse_type_token("link"), Some(TypeTarget::Link));
    assert_eq!(parse_type_token("table"), None);
    assert_eq!(parse_type_token("file photo"), None);
    assert_eq!(parse_type_token(""), None);
}

#[test]
fn resized_grid_pads_and_truncates() {
    let old = vec![
        vec!["a".to_string(), "b".to_string()],
        vec!["c".to_string(), "d".to_string()],
    ];
    let grown = resized_grid(&old, 3, 3);
    assert_eq!(grown[0], ["a", "b", ""]);
    assert_eq!(grown[2], ["", "", ""]);

    let shrunk = resized_grid(&old, 1, 1);
    assert_eq!(shrunk, vec![vec!["a".to_string()]]);
}
