use super::*;
use crate::model::{Block, BlockContent};
use crate::reorder::DropTarget;

fn block(id: &str, block_type: BlockType) -> Block {
    let mut block = Block::new(block_type);
    block.id = Some(id.to_string());
    block
}

fn text_block(id: &str, content: &str) -> Block {
    let mut block = block(id, BlockType::Text);
    block.content = BlockContent::Text(content.to_string());
    block
}

fn list_block(id: &str, list_type: ListType, content: &str) -> Block {
    let mut block = block(id, BlockType::List);
    block.list_type = Some(list_type);
    block.content = BlockContent::Text(content.to_string());
    block
}

fn store_of(blocks: Vec<Block>) -> ContentStore {
    let mut store = ContentStore::new();
    for block in blocks {
        store.push(block);
    }
    store
}

fn view(width: usize) -> ViewState<'static> {
    ViewState {
        width,
        ..ViewState::default()
    }
}

fn line_text(line: &Line<'_>) -> String {
    line.spans
        .iter()
        .map(|span| span.content.as_ref())
        .collect()
}

#[test]
fn numbering_resets_after_a_broken_run() {
    let store = store_of(vec![
        list_block("a", ListType::Number, "one"),
        list_block("b", ListType::Number, "two"),
        list_block("c", ListType::Bullet, "dash"),
        list_block("d", ListType::Number, "restart"),
    ]);
    let markers = numbered_markers(&store);
    assert_eq!(markers.get("a"), Some(&1));
    assert_eq!(markers.get("b"), Some(&2));
    assert_eq!(markers.get("c"), None);
    assert_eq!(markers.get("d"), Some(&1));
}

#[test]
fn non_list_blocks_break_numbered_runs_too() {
    let store = store_of(vec![
        list_block("a", ListType::Number, "one"),
        text_block("t", "interlude"),
        list_block("b", ListType::Number, "one again"),
    ]);
    let markers = numbered_markers(&store);
    assert_eq!(markers.get("a"), Some(&1));
    assert_eq!(markers.get("b"), Some(&1));
}

#[test]
fn rendered_markers_show_run_scoped_numbers() {
    let store = store_of(vec![
        list_block("a", ListType::Number, "one"),
        list_block("b", ListType::Number, "two"),
        list_block("c", ListType::Bullet, "dash"),
        list_block("d", ListType::Number, "restart"),
    ]);
    let page = render_page(&store, &view(40));
    let rows: Vec<String> = page.lines.iter().map(line_text).collect();
    assert!(rows.iter().any(|row| row.contains("1. one")));
    assert!(rows.iter().any(|row| row.contains("2. two")));
    assert!(rows.iter().any(|row| row.contains("• dash")));
    assert!(rows.iter().any(|row| row.contains("1. restart")));
}

#[test]
fn layouts_cover_every_block_in_order() {
    let store = store_of(vec![
        text_block("a", "alpha"),
        text_block("b", "beta"),
        text_block("c", "gamma"),
    ]);
    let page = render_page(&store, &view(40));
    let ids: Vec<&str> = page.layouts.iter().map(|layout| layout.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    for layout in &page.layouts {
        assert!(layout.height >= 1);
        assert_eq!(page.block_at_line(layout.first_line).unwrap().id, layout.id);
    }
    // The blank separator between blocks belongs to no block.
    let separator = page.layouts[0].first_line + page.layouts[0].height;
    assert!(page.block_at_line(separator).is_none());
}

#[test]
fn long_text_wraps_and_extends_the_layout() {
    let store = store_of(vec![text_block("a", "alpha beta gamma delta epsilon")]);
    let page = render_page(&store, &view(16));
    let layout = page.layout_of("a").unwrap();
    assert!(layout.height > 1);
}

#[test]
fn drop_indicator_is_drawn_on_the_requested_side() {
    let store = store_of(vec![text_block("a", "alpha"), text_block("b", "beta")]);
    let target = DropTarget {
        block_id: "b".to_string(),
        placement: Placement::Before,
    };
    let state = ViewState {
        width: 40,
        dragging_id: Some("a"),
        drop_target: Some(&target),
        ..ViewState::default()
    };
    let page = render_page(&store, &state);

    let b_layout = page.layout_of("b").unwrap();
    let indicator = line_text(&page.lines[b_layout.first_line - 1]);
    assert!(indicator.contains('─'));

    let target_after = DropTarget {
        block_id: "b".to_string(),
        placement: Placement::After,
    };
    let state = ViewState {
        drop_target: Some(&target_after),
        ..state
    };
    let page = render_page(&store, &state);
    let b_layout = page.layout_of("b").unwrap();
    let below = line_text(&page.lines[b_layout.first_line + b_layout.height]);
    assert!(below.contains('─'));
}

#[test]
fn focused_draft_replaces_stored_content_and_places_the_cursor() {
    let store = store_of(vec![text_block("a", "stored")]);
    let mut state = view(40);
    state.focused_id = Some("a");
    state.focus = Some(FocusView::Text {
        draft: "draft",
        caret: 5,
    });
    let page = render_page(&store, &state);
    let row = line_text(&page.lines[0]);
    assert!(row.contains("draft"));
    assert!(!row.contains("stored"));
    let cursor = page.cursor.unwrap();
    assert_eq!(cursor.line, 0);
    assert_eq!(cursor.column as usize, GUTTER_WIDTH + 5);
}

#[test]
fn table_renders_focused_cell_draft() {
    let mut table = block("t", BlockType::Table);
    table.content = BlockContent::Grid(vec![
        vec!["h1".to_string(), "h2".to_string()],
        vec!["x".to_string(), "y".to_string()],
    ]);
    table.row_count = Some(2);
    table.column_count = Some(2);
    let store = store_of(vec![table]);

    let mut state = view(40);
    state.focused_id = Some("t");
    state.focus = Some(FocusView::Cell {
        row: 1,
        column: 1,
        draft: "edited",
        caret: 0,
    });
    let page = render_page(&store, &state);
    let rows: Vec<String> = page.lines.iter().map(line_text).collect();
    assert!(rows.iter().any(|row| row.contains("edited")));
    assert!(!rows.iter().any(|row| row.contains("| y")));
    assert!(page.cursor.is_some());
}

#[test]
fn delete_affordance_hits_only_the_first_line_gutter() {
    let store = store_of(vec![text_block("a", "alpha beta gamma delta epsilon")]);
    let page = render_page(&store, &view(16));
    let layout = page.layout_of("a").unwrap();
    assert!(page.is_delete_hit(layout.first_line, 0));
    assert!(!page.is_delete_hit(layout.first_line, GUTTER_WIDTH + 1));
    assert!(!page.is_delete_hit(layout.first_line + 1, 0));
}

#[test]
fn file_block_shows_media_label_and_name() {
    let mut file = block("f", BlockType::File);
    file.media_type = Some(MediaType::Photo);
    file.file_name = Some("cat.jpg".to_string());
    file.file_path = Some("/static/cat.jpg".to_string());
    let store = store_of(vec![file]);
    let page = render_page(&store, &view(60));
    let row = line_text(&page.lines[0]);
    assert!(row.contains("[photo]"));
    assert!(row.contains("cat.jpg"));
}
