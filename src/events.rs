use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::model::BlockType;

/// What the app should do in response to a key press on the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorCommand {
    /// Save the current draft, then move focus to the previous block
    /// with the caret at its end.
    FocusPrevious,
    /// Save the current draft, then move focus to the next block with
    /// the caret at its start.
    FocusNext,
    /// Grow or shrink the focused table by one row/column.
    ResizeTable { delta_rows: i64, delta_columns: i64 },
    /// Move the focused table cell.
    MoveCell { delta_rows: i64, delta_columns: i64 },
    /// Save the current block, then create a follow-up block after it.
    SplitBlock,
    /// Delete the focused (empty) block and focus the previous one.
    DeleteEmptyBlock,
    /// Open the block-type picker anchored at the caret.
    OpenPicker,
    InsertChar(char),
    DeleteBackward,
    DeleteForward,
    CaretLeft,
    CaretRight,
    CaretStart,
    CaretEnd,
}

/// Everything the router needs to know about the focused block.
#[derive(Clone, Copy, Debug)]
pub struct EditContext {
    pub block_type: BlockType,
    /// Trimmed draft (or focused cell) is empty.
    pub draft_empty: bool,
    pub caret_at_start: bool,
    /// Number of blocks currently in the order list.
    pub block_count: usize,
}

fn has_primary_modifier(modifiers: KeyModifiers) -> bool {
    modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER)
}

/// Map a key press on the editable page to an editor command.
///
/// Arrow Up/Down never move the caret across a block boundary: outside
/// tables they are always intercepted and switch focus to the adjacent
/// block. Inside a table the plain arrows move between cells, and with
/// Ctrl/Cmd held they resize the grid instead.
pub fn route_key(key: &KeyEvent, ctx: &EditContext) -> Option<EditorCommand> {
    let in_table = ctx.block_type == BlockType::Table;

    if in_table && has_primary_modifier(key.modifiers) {
        match key.code {
            KeyCode::Down => {
                return Some(EditorCommand::ResizeTable {
                    delta_rows: 1,
                    delta_columns: 0,
                });
            }
            KeyCode::Up => {
                return Some(EditorCommand::ResizeTable {
                    delta_rows: -1,
                    delta_columns: 0,
                });
            }
            KeyCode::Right => {
                return Some(EditorCommand::ResizeTable {
                    delta_rows: 0,
                    delta_columns: 1,
                });
            }
            KeyCode::Left => {
                return Some(EditorCommand::ResizeTable {
                    delta_rows: 0,
                    delta_columns: -1,
                });
            }
            _ => {}
        }
    }

    match (key.code, key.modifiers) {
        (KeyCode::Up, _) if !in_table => Some(EditorCommand::FocusPrevious),
        (KeyCode::Down, _) if !in_table => Some(EditorCommand::FocusNext),
        (KeyCode::Up, _) => Some(EditorCommand::MoveCell {
            delta_rows: -1,
            delta_columns: 0,
        }),
        (KeyCode::Down, _) => Some(EditorCommand::MoveCell {
            delta_rows: 1,
            delta_columns: 0,
        }),
        (KeyCode::Tab, _) if in_table => Some(EditorCommand::MoveCell {
            delta_rows: 0,
            delta_columns: 1,
        }),
        (KeyCode::BackTab, _) if in_table => Some(EditorCommand::MoveCell {
            delta_rows: 0,
            delta_columns: -1,
        }),
        (KeyCode::Enter, modifiers) if !modifiers.contains(KeyModifiers::SHIFT) => {
            Some(EditorCommand::SplitBlock)
        }
        (KeyCode::Backspace, _) => {
            if ctx.draft_empty && ctx.block_count > 1 {
                Some(EditorCommand::DeleteEmptyBlock)
            } else {
                Some(EditorCommand::DeleteBackward)
            }
        }
        (KeyCode::Delete, _) => Some(EditorCommand::DeleteForward),
        (KeyCode::Char('/'), modifiers)
            if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                && ctx.caret_at_start
                && ctx.draft_empty =>
        {
            Some(EditorCommand::OpenPicker)
        }
        (KeyCode::Left, _) => Some(EditorCommand::CaretLeft),
        (KeyCode::Right, _) => Some(EditorCommand::CaretRight),
        (KeyCode::Home, _) => Some(EditorCommand::CaretStart),
        (KeyCode::End, _) => Some(EditorCommand::CaretEnd),
        (KeyCode::Char(ch), modifiers)
            if !modifiers.contains(KeyModifiers::CONTROL)
                && !modifiers.contains(KeyModifiers::ALT) =>
        {
            Some(EditorCommand::InsertChar(ch))
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod events_tests;
