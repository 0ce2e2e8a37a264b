use super::*;

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn key_with(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
    KeyEvent::new(code, modifiers)
}

fn ctx(block_type: BlockType) -> EditContext {
    EditContext {
        block_type,
        draft_empty: false,
        caret_at_start: false,
        block_count: 3,
    }
}

#[test]
fn vertical_arrows_always_switch_blocks_outside_tables() {
    for block_type in [BlockType::Text, BlockType::Header, BlockType::List, BlockType::Link] {
        assert_eq!(
            route_key(&key(KeyCode::Up), &ctx(block_type)),
            Some(EditorCommand::FocusPrevious)
        );
        assert_eq!(
            route_key(&key(KeyCode::Down), &ctx(block_type)),
            Some(EditorCommand::FocusNext)
        );
    }
}

#[test]
fn modified_arrows_resize_tables() {
    let table = ctx(BlockType::Table);
    assert_eq!(
        route_key(&key_with(KeyCode::Down, KeyModifiers::CONTROL), &table),
        Some(EditorCommand::ResizeTable {
            delta_rows: 1,
            delta_columns: 0
        })
    );
    assert_eq!(
        route_key(&key_with(KeyCode::Left, KeyModifiers::SUPER), &table),
        Some(EditorCommand::ResizeTable {
            delta_rows: 0,
            delta_columns: -1
        })
    );
    // Without the modifier the arrows move between cells instead.
    assert_eq!(
        route_key(&key(KeyCode::Up), &table),
        Some(EditorCommand::MoveCell {
            delta_rows: -1,
            delta_columns: 0
        })
    );
}

#[test]
fn modified_arrows_outside_tables_still_switch_blocks() {
    assert_eq!(
        route_key(
            &key_with(KeyCode::Down, KeyModifiers::CONTROL),
            &ctx(BlockType::Text)
        ),
        Some(EditorCommand::FocusNext)
    );
}

#[test]
fn enter_splits_unless_shifted() {
    assert_eq!(
        route_key(&key(KeyCode::Enter), &ctx(BlockType::List)),
        Some(EditorCommand::SplitBlock)
    );
    assert_eq!(
        route_key(
            &key_with(KeyCode::Enter, KeyModifiers::SHIFT),
            &ctx(BlockType::Text)
        ),
        None
    );
}

#[test]
fn backspace_on_empty_block_deletes_it_only_when_others_remain() {
    let mut context = ctx(BlockType::Text);
    context.draft_empty = true;
    assert_eq!(
        route_key(&key(KeyCode::Backspace), &context),
        Some(EditorCommand::DeleteEmptyBlock)
    );

    context.block_count = 1;
    assert_eq!(
        route_key(&key(KeyCode::Backspace), &context),
        Some(EditorCommand::DeleteBackward)
    );

    context.block_count = 3;
    context.draft_empty = false;
    assert_eq!(
        route_key(&key(KeyCode::Backspace), &context),
        Some(EditorCommand::DeleteBackward)
    );
}

#[test]
fn slash_opens_the_picker_only_on_a_fresh_block() {
    let mut context = ctx(BlockType::Text);
    context.draft_empty = true;
    context.caret_at_start = true;
    assert_eq!(
        route_key(&key(KeyCode::Char('/')), &context),
        Some(EditorCommand::OpenPicker)
    );

    context.caret_at_start = false;
    assert_eq!(
        route_key(&key(KeyCode::Char('/')), &context),
        Some(EditorCommand::InsertChar('/'))
    );

    context.caret_at_start = true;
    context.draft_empty = false;
    assert_eq!(
        route_key(&key(KeyCode::Char('/')), &context),
        Some(EditorCommand::InsertChar('/'))
    );
}

#[test]
fn plain_characters_are_inserted() {
    assert_eq!(
        route_key(&key(KeyCode::Char('x')), &ctx(BlockType::Text)),
        Some(EditorCommand::InsertChar('x'))
    );
    assert_eq!(
        route_key(
            &key_with(KeyCode::Char('x'), KeyModifiers::CONTROL),
            &ctx(BlockType::Text)
        ),
        None
    );
}
