use std::collections::HashMap;

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthChar;

use crate::model::{Block, BlockType, ListType, MediaType};
use crate::reorder::{DropTarget, Placement};
use crate::store::ContentStore;

/// Width of the gutter column that carries the per-block delete
/// affordance on a block's first line.
pub const GUTTER_WIDTH: usize = 3;

#[derive(Clone, Copy, Debug)]
pub struct CursorVisual {
    pub line: usize,
    pub column: u16,
}

/// Line range a block occupies in the rendered page, used for mouse
/// hit-testing, drop placement, and the delete affordance.
#[derive(Clone, Debug)]
pub struct BlockLayout {
    pub id: String,
    pub first_line: usize,
    pub height: usize,
}

impl BlockLayout {
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.first_line && line < self.first_line + self.height
    }
}

#[derive(Debug)]
pub struct PageRender {
    pub lines: Vec<Line<'static>>,
    pub layouts: Vec<BlockLayout>,
    pub cursor: Option<CursorVisual>,
    pub total_lines: usize,
}

impl PageRender {
    pub fn block_at_line(&self, line: usize) -> Option<&BlockLayout> {
        self.layouts.iter().find(|layout| layout.contains_line(line))
    }

    pub fn layout_of(&self, id: &str) -> Option<&BlockLayout> {
        self.layouts.iter().find(|layout| layout.id == id)
    }

    /// True when the pointer position hits a block's delete affordance.
    pub fn is_delete_hit(&self, line: usize, column: usize) -> bool {
        column < GUTTER_WIDTH - 1
            && self
                .block_at_line(line)
                .map(|layout| layout.first_line == line)
                .unwrap_or(false)
    }
}

/// Where the caret currently lives, if the page owns one.
#[derive(Clone, Copy, Debug)]
pub enum FocusView<'a> {
    /// Editing a string-content block: the draft replaces the stored
    /// content and the caret is a char offset into it.
    Text { draft: &'a str, caret: usize },
    /// Editing one table cell.
    Cell {
        row: usize,
        column: usize,
        draft: &'a str,
        caret: usize,
    },
    /// The block is focused without an editable draft (file blocks).
    Whole,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ViewState<'a> {
    pub width: usize,
    pub focused_id: Option<&'a str>,
    pub focus: Option<FocusView<'a>>,
    pub dragging_id: Option<&'a str>,
    pub drop_target: Option<&'a DropTarget>,
}

/// Render the page: a pure function of the order list, the content map,
/// and the transient view state.
pub fn render_page(store: &ContentStore, view: &ViewState) -> PageRender {
    let mut renderer = PageRenderer::new(store, view);
    renderer.render();
    renderer.finish()
}

/// Markers for number-style list blocks. The counter is scoped to a
/// contiguous run: any block that is not a numbered list entry resets it.
pub fn numbered_markers(store: &ContentStore) -> HashMap<String, usize> {
    let mut markers = HashMap::new();
    let mut next = 1usize;
    for id in store.order() {
        let numbered = store
            .get(id)
            .map(|block| {
                block.block_type == BlockType::List && block.list_type == Some(ListType::Number)
            })
            .unwrap_or(false);
        if numbered {
            markers.insert(id.clone(), next);
            next += 1;
        } else {
            next = 1;
        }
    }
    markers
}

struct PageRenderer<'a> {
    store: &'a ContentStore,
    view: &'a ViewState<'a>,
    markers: HashMap<String, usize>,
    lines: Vec<Line<'static>>,
    layouts: Vec<BlockLayout>,
    cursor: Option<CursorVisual>,
}

impl<'a> PageRenderer<'a> {
    fn new(store: &'a ContentStore, view: &'a ViewState<'a>) -> Self {
        Self {
            store,
            view,
            markers: numbered_markers(store),
            lines: Vec::new(),
            layouts: Vec::new(),
            cursor: None,
        }
    }

    fn render(&mut self) {
        let order: Vec<String> = self.store.order().to_vec();
        for (index, id) in order.iter().enumerate() {
            let Some(block) = self.store.get(id) else {
                continue;
            };
            if index > 0 {
                self.lines.push(Line::from(""));
            }
            if self.indicator_wanted(id, Placement::Before) {
                self.push_indicator();
            }
            let first_line = self.lines.len();
            self.render_block(id, block);
            let height = self.lines.len() - first_line;
            self.layouts.push(BlockLayout {
                id: id.clone(),
                first_line,
                height: height.max(1),
            });
            if self.indicator_wanted(id, Placement::After) {
                self.push_indicator();
            }
        }
    }

    fn finish(mut self) -> PageRender {
        if self.lines.is_empty() {
            self.lines.push(Line::from(""));
        }
        let total_lines = self.lines.len();
        PageRender {
            lines: self.lines,
            layouts: self.layouts,
            cursor: self.cursor,
            total_lines,
        }
    }

    fn indicator_wanted(&self, id: &str, placement: Placement) -> bool {
        self.view
            .drop_target
            .map(|target| target.block_id == id && target.placement == placement)
            .unwrap_or(false)
    }

    fn push_indicator(&mut self) {
        let width = self.view.width.max(GUTTER_WIDTH + 1) - GUTTER_WIDTH;
        let bar: String = "─".repeat(width);
        self.lines.push(Line::from(vec![
            Span::raw(" ".repeat(GUTTER_WIDTH)),
            Span::styled(bar, Style::default().fg(Color::Yellow)),
        ]));
    }

    fn block_base_style(&self, id: &str) -> Style {
        if self.view.dragging_id == Some(id) {
            Style::default().add_modifier(Modifier::DIM)
        } else {
            Style::default()
        }
    }

    fn focus_for(&self, id: &str) -> Option<FocusView<'a>> {
        if self.view.focused_id == Some(id) {
            self.view.focus
        } else {
            None
        }
    }

    fn render_block(&mut self, id: &str, block: &Block) {
        let base = self.block_base_style(id);
        match block.block_type {
            BlockType::Text => self.render_text_like(id, block, base, String::new()),
            BlockType::Header => self.render_header(id, block, base),
            BlockType::List => self.render_list(id, block, base),
            BlockType::Link => self.render_text_like(
                id,
                block,
                base.fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
                String::new(),
            ),
            BlockType::Table => self.render_table(id, block, base),
            BlockType::File => self.render_file(id, block, base),
        }
    }

    fn render_header(&mut self, id: &str, block: &Block, base: Style) {
        let level = block.level.unwrap_or(1);
        let style = base.add_modifier(Modifier::BOLD);
        let first_line = self.lines.len();
        self.render_text_like(id, block, style, String::new());
        let underline_char = match level {
            1 => Some('='),
            2 => Some('-'),
            _ => None,
        };
        if let Some(ch) = underline_char {
            let width = self.lines[first_line..]
                .iter()
                .map(line_width)
                .max()
                .unwrap_or(0)
                .saturating_sub(GUTTER_WIDTH);
            let underline: String = std::iter::repeat(ch).take(width.max(1)).collect();
            self.lines.push(Line::from(vec![
                Span::raw(" ".repeat(GUTTER_WIDTH)),
                Span::styled(underline, base),
            ]));
        }
    }

    fn render_list(&mut self, id: &str, block: &Block, base: Style) {
        let marker = match block.list_type {
            Some(ListType::Number) => {
                let number = self.markers.get(id).copied().unwrap_or(1);
                format!("{number}. ")
            }
            _ => "• ".to_string(),
        };
        self.render_text_like(id, block, base, marker);
    }

    /// Render a block whose content is a single editable string,
    /// word-wrapped below the gutter, with an optional list marker on
    /// the first line.
    fn render_text_like(&mut self, id: &str, block: &Block, style: Style, marker: String) {
        let focus = self.focus_for(id);
        let (text, caret) = match focus {
            Some(FocusView::Text { draft, caret }) => (draft, Some(caret)),
            _ => (block.text(), None),
        };

        let gutter_rest = " ".repeat(GUTTER_WIDTH);
        let marker_width = visible_width(&marker);
        let avail = self
            .view
            .width
            .saturating_sub(GUTTER_WIDTH + marker_width)
            .max(8);

        let wrapped = wrap_plain(text, avail);
        let last_row = wrapped.len() - 1;
        for (row, range) in wrapped.iter().enumerate() {
            let segment: String = text
                .chars()
                .skip(range.start)
                .take(range.end - range.start)
                .collect();
            let (prefix, lead) = if row == 0 {
                (gutter(), marker.clone())
            } else {
                (gutter_rest.clone(), " ".repeat(marker_width))
            };
            if let Some(caret) = caret {
                let within = caret >= range.start && caret < range.end;
                let at_end = row == last_row && caret >= range.end;
                if within || at_end {
                    let head: String = text
                        .chars()
                        .skip(range.start)
                        .take(caret.min(range.end) - range.start)
                        .collect();
                    self.cursor = Some(CursorVisual {
                        line: self.lines.len(),
                        column: (GUTTER_WIDTH + marker_width + visible_width(&head)) as u16,
                    });
                }
            }
            self.lines.push(Line::from(vec![
                Span::styled(prefix, Style::default().fg(Color::DarkGray)),
                Span::styled(lead, Style::default().fg(Color::DarkGray)),
                Span::styled(segment, style),
            ]));
        }
    }

    fn render_table(&mut self, id: &str, block: &Block, base: Style) {
        let focus = self.focus_for(id);
        let empty = Vec::new();
        let grid = block.grid().unwrap_or(&empty);

        let rows = grid.len();
        let columns = grid.first().map(Vec::len).unwrap_or(0);
        let mut widths = vec![3usize; columns];
        for row in 0..rows {
            for (column, width) in widths.iter_mut().enumerate() {
                *width = (*width).max(visible_width(table_cell(grid, focus, row, column)));
            }
        }

        let gutter_rest = " ".repeat(GUTTER_WIDTH);
        for row in 0..rows {
            let style = if row == 0 {
                base.add_modifier(Modifier::BOLD)
            } else {
                base
            };
            let mut spans = vec![Span::styled(
                if row == 0 { gutter() } else { gutter_rest.clone() },
                Style::default().fg(Color::DarkGray),
            )];
            let mut column_offset = GUTTER_WIDTH;
            for (column, width) in widths.iter().enumerate() {
                spans.push(Span::styled("| ", Style::default().fg(Color::DarkGray)));
                column_offset += 2;
                let text = table_cell(grid, focus, row, column);
                if let Some(FocusView::Cell {
                    row: focus_row,
                    column: focus_column,
                    draft,
                    caret,
                }) = focus
                {
                    if focus_row == row && focus_column == column {
                        let head: String = draft.chars().take(caret).collect();
                        self.cursor = Some(CursorVisual {
                            line: self.lines.len(),
                            column: (column_offset + visible_width(&head)) as u16,
                        });
                    }
                }
                let padding = width.saturating_sub(visible_width(text));
                spans.push(Span::styled(text.to_string(), style));
                spans.push(Span::raw(" ".repeat(padding + 1)));
                column_offset += width + 1;
            }
            spans.push(Span::styled("|", Style::default().fg(Color::DarkGray)));
            self.lines.push(Line::from(spans));
        }
    }

    fn render_file(&mut self, _id: &str, block: &Block, base: Style) {
        let label = match block.media_type {
            Some(MediaType::Photo) => "photo",
            Some(MediaType::Audio) => "audio",
            Some(MediaType::Document) => "document",
            Some(MediaType::Link) => "link",
            None => "file",
        };
        let name = block
            .file_name
            .as_deref()
            .or(block.file_path.as_deref())
            .unwrap_or("(no file attached)");
        let mut spans = vec![
            Span::styled(gutter(), Style::default().fg(Color::DarkGray)),
            Span::styled(format!("[{label}] "), base.add_modifier(Modifier::BOLD)),
            Span::styled(name.to_string(), base),
        ];
        if block.file_name.is_some() {
            if let Some(path) = block.file_path.as_deref() {
                spans.push(Span::styled(format!("  {path}"), base.fg(Color::DarkGray)));
            }
        }
        self.lines.push(Line::from(spans));
    }
}

/// First-line gutter carrying the delete affordance.
fn gutter() -> String {
    format!("✕{}", " ".repeat(GUTTER_WIDTH - 1))
}

/// A cell's display text: the focused cell shows its draft, everything
/// else comes from the stored grid.
fn table_cell<'g>(
    grid: &'g [Vec<String>],
    focus: Option<FocusView<'g>>,
    row: usize,
    column: usize,
) -> &'g str {
    if let Some(FocusView::Cell {
        row: focus_row,
        column: focus_column,
        draft,
        ..
    }) = focus
    {
        if focus_row == row && focus_column == column {
            return draft;
        }
    }
    grid.get(row)
        .and_then(|cells| cells.get(column))
        .map(String::as_str)
        .unwrap_or("")
}

fn visible_width(text: &str) -> usize {
    text.chars()
        .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0))
        .sum()
}

fn line_width(line: &Line<'_>) -> usize {
    line.spans
        .iter()
        .map(|span| visible_width(span.content.as_ref()))
        .sum()
}

/// Character range of each visual line after greedy word wrapping.
/// Ranges are char offsets into `text`; words wider than the limit are
/// broken mid-word.
fn wrap_plain(text: &str, width: usize) -> Vec<std::ops::Range<usize>> {
    let width = width.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut ranges = Vec::new();
    let mut line_start = 0usize;
    let mut line_cells = 0usize;
    let mut last_break: Option<usize> = None;

    let mut index = 0usize;
    while index < chars.len() {
        let ch = chars[index];
        let cell = UnicodeWidthChar::width(ch).unwrap_or(0);
        if line_cells + cell > width && index > line_start {
            let break_at = match last_break {
                Some(space) if space >= line_start => space + 1,
                _ => index,
            };
            ranges.push(line_start..break_at);
            line_start = break_at;
            line_cells = 0;
            last_break = None;
            index = break_at;
            continue;
        }
        if ch.is_whitespace() {
            last_break = Some(index);
        }
        line_cells += cell;
        index += 1;
    }
    ranges.push(line_start..chars.len());
    ranges
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod render_tests;
