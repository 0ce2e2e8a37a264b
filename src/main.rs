use std::{
    env,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use tracing::error;
use tracing_subscriber::EnvFilter;

use tabula_tui::api::ApiClient;
use tabula_tui::editor::{BlockEditor, FocusRequest, FocusTarget, Session};
use tabula_tui::events::{EditContext, EditorCommand, route_key};
use tabula_tui::explorer::Explorer;
use tabula_tui::model::{BlockType, Collection, MediaType};
use tabula_tui::picker::{BlockPicker, PICKER_OPTIONS, PickerOption};
use tabula_tui::render::{FocusView, PageRender, ViewState, render_page};
use tabula_tui::reorder::{DragReorder, DropOutcome, placement_for};

const DEFAULT_SERVER: &str = "http://localhost:8000";
const STATUS_TIMEOUT: Duration = Duration::from_secs(4);
const MOUSE_SCROLL_LINES: usize = 3;
const SIDEBAR_WIDTH: u16 = 26;

#[derive(Parser)]
#[command(name = "tabula", about = "Terminal block editor for Tabula collection servers")]
struct Cli {
    /// Base URL of the collection server; falls back to TABULA_SERVER.
    #[arg(long)]
    server: Option<String>,

    /// Log file path.
    #[arg(long, default_value = "tabula.log")]
    log_file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.log_file)?;

    let server = cli
        .server
        .clone()
        .or_else(|| env::var("TABULA_SERVER").ok())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    runtime.block_on(run(server))
}

fn init_logging(path: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

async fn run(server: String) -> Result<()> {
    let api = ApiClient::new(server);
    let mut app = App::new(api);
    if let Err(err) = app.explorer.load().await {
        app.report_error("load collections", err);
    }

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().ok();

    let res = run_app(&mut terminal, &mut app).await.context("application error");

    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .ok();
    terminal.show_cursor().ok();

    res
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    while !app.should_quit {
        terminal
            .draw(|frame| app.draw(frame))
            .context("failed to draw frame")?;

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(event)) => app.handle_event(event).await?,
                Some(Err(err)) => return Err(err).context("failed to read event"),
                None => break,
            },
            _ = tick.tick() => app.on_tick(),
        }
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pane {
    Sidebar,
    Page,
}

/// The focused block's local editing state. Drafts live here until a
/// blur, Enter, or explicit operation persists them.
struct EditState {
    block_id: String,
    kind: EditKind,
}

enum EditKind {
    Text { draft: String, caret: usize },
    Table {
        grid: Vec<Vec<String>>,
        row: usize,
        column: usize,
        caret: usize,
    },
    File,
}

struct Prompt {
    title: String,
    value: String,
    purpose: PromptPurpose,
}

enum PromptPurpose {
    CreateCollection,
    RenameCollection { collection_id: i64 },
    CreateTag,
    UploadFile {
        block_id: String,
        media_type: MediaType,
    },
}

struct Confirm {
    message: String,
    action: ConfirmAction,
}

enum ConfirmAction {
    DeleteCollection { collection_id: i64 },
}

struct TagPopup {
    selected: usize,
}

enum Popup {
    Picker(BlockPicker),
    Prompt(Prompt),
    Confirm(Confirm),
    Tags(TagPopup),
    Error(String),
}

struct DragPress {
    block_id: String,
    line: usize,
}

struct App {
    editor: BlockEditor<ApiClient>,
    explorer: Explorer<ApiClient>,
    session: Option<Session>,
    edit: Option<EditState>,
    drag: DragReorder,
    drag_press: Option<DragPress>,
    popup: Option<Popup>,
    pane: Pane,
    scroll_top: usize,
    sidebar_area: Rect,
    page_area: Rect,
    last_page: Option<PageRender>,
    status_message: Option<(String, Instant)>,
    should_quit: bool,
}

impl App {
    fn new(api: ApiClient) -> Self {
        Self {
            editor: BlockEditor::new(api.clone()),
            explorer: Explorer::new(api),
            session: None,
            edit: None,
            drag: DragReorder::new(),
            drag_press: None,
            popup: None,
            pane: Pane::Sidebar,
            scroll_top: 0,
            sidebar_area: Rect::default(),
            page_area: Rect::default(),
            last_page: None,
            status_message: None,
            should_quit: false,
        }
    }

    // ── drawing ─────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        if area.height < 3 || area.width < 10 {
            return;
        }

        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(2)])
            .split(area);
        let main_area = vertical[0];
        let status_area = vertical[1];

        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)])
            .split(main_area);
        self.sidebar_area = horizontal[0];
        self.page_area = horizontal[1];

        self.draw_sidebar(frame, horizontal[0]);
        self.draw_page(frame, horizontal[1]);

        let status_text = self.status_line();
        let status_widget = Paragraph::new(Line::from(Span::raw(status_text)))
            .block(Block::default().borders(Borders::TOP));
        frame.render_widget(status_widget, status_area);

        if self.popup.is_some() {
            self.draw_popup(frame, area);
        }
    }

    fn draw_sidebar(&mut self, frame: &mut Frame, area: Rect) {
        let open_id = self.session.as_ref().map(|session| session.collection_id);
        let items: Vec<ListItem> = self
            .explorer
            .collections()
            .iter()
            .map(|collection| {
                let marker = if Some(collection.id) == open_id { "• " } else { "  " };
                let mut label = format!("{marker}{}", collection.name);
                if let Some(tag) = self.explorer.tag_name(collection.tag_id) {
                    label.push_str(&format!("  #{tag}"));
                }
                ListItem::new(Line::from(label))
            })
            .collect();

        let border_style = if self.pane == Pane::Sidebar {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let list = List::new(items)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .block(
                Block::default()
                    .title("Collections")
                    .borders(Borders::ALL)
                    .border_style(border_style),
            );
        let mut state = ListState::default();
        state.select(self.explorer.selected_index());
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_page(&mut self, frame: &mut Frame, area: Rect) {
        let border_style = if self.pane == Pane::Page {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let title = self
            .session
            .as_ref()
            .map(|session| session.collection_name.clone())
            .unwrap_or_else(|| "Tabula".to_string());
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        self.page_area = inner;

        let Some(session) = &self.session else {
            let hint = Paragraph::new("Select a collection from the left panel to view its content.")
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(hint, inner);
            self.last_page = None;
            return;
        };

        let focus = self.edit.as_ref().map(|edit| match &edit.kind {
            EditKind::Text { draft, caret } => FocusView::Text {
                draft,
                caret: *caret,
            },
            EditKind::Table {
                grid,
                row,
                column,
                caret,
            } => FocusView::Cell {
                row: *row,
                column: *column,
                draft: grid
                    .get(*row)
                    .and_then(|cells| cells.get(*column))
                    .map(String::as_str)
                    .unwrap_or(""),
                caret: *caret,
            },
            EditKind::File => FocusView::Whole,
        });
        let view = ViewState {
            width: inner.width as usize,
            focused_id: self.edit.as_ref().map(|edit| edit.block_id.as_str()),
            focus,
            dragging_id: self.drag.source_id(),
            drop_target: self.drag.target(),
        };
        let page = render_page(&session.store, &view);

        let viewport = inner.height as usize;
        self.adjust_scroll(&page, viewport);

        let paragraph = Paragraph::new(Text::from(page.lines.clone()))
            .scroll((self.scroll_top as u16, 0));
        frame.render_widget(paragraph, inner);

        if self.pane == Pane::Page && self.popup.is_none() {
            if let Some(cursor) = page.cursor {
                if cursor.line >= self.scroll_top
                    && cursor.line < self.scroll_top + viewport
                    && inner.width > 0
                {
                    let x = inner.x + cursor.column.min(inner.width - 1);
                    let y = inner.y + (cursor.line - self.scroll_top) as u16;
                    frame.set_cursor_position(Position::new(x, y));
                }
            }
        }

        self.last_page = Some(page);
    }

    fn adjust_scroll(&mut self, page: &PageRender, viewport: usize) {
        let viewport = viewport.max(1);
        let max_scroll = page.total_lines.saturating_sub(viewport);
        if self.scroll_top > max_scroll {
            self.scroll_top = max_scroll;
        }
        if let Some(cursor) = &page.cursor {
            if cursor.line < self.scroll_top {
                self.scroll_top = cursor.line;
            } else if cursor.line >= self.scroll_top + viewport {
                self.scroll_top = cursor.line + 1 - viewport;
            }
        }
    }

    fn draw_popup(&self, frame: &mut Frame, area: Rect) {
        match &self.popup {
            Some(Popup::Picker(picker)) => self.draw_picker(frame, area, picker),
            Some(Popup::Prompt(prompt)) => self.draw_prompt(frame, area, prompt),
            Some(Popup::Confirm(confirm)) => {
                self.draw_message_box(frame, area, "Confirm", &confirm.message, " y / n ");
            }
            Some(Popup::Tags(tags)) => self.draw_tags(frame, area, tags),
            Some(Popup::Error(message)) => {
                self.draw_message_box(frame, area, "Error", message, " Esc to dismiss ");
            }
            None => {}
        }
    }

    fn draw_picker(&self, frame: &mut Frame, area: Rect, picker: &BlockPicker) {
        let width = 22u16.min(area.width);
        let height = (PICKER_OPTIONS.len() as u16 + 2).min(area.height);
        let (anchor_x, anchor_y) = picker.anchor();
        let x = anchor_x.min(area.width.saturating_sub(width));
        let y = anchor_y.min(area.height.saturating_sub(height));
        let popup_area = Rect::new(x, y, width, height);

        frame.render_widget(Clear, popup_area);
        let items: Vec<ListItem> = PICKER_OPTIONS
            .iter()
            .map(|option| {
                ListItem::new(Line::from(format!("{} {}", option.shortcut, option.label)))
            })
            .collect();
        let mut state = ListState::default();
        state.select(Some(picker.selected_index()));
        let list = List::new(items)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .block(Block::default().title("Turn into").borders(Borders::ALL));
        frame.render_stateful_widget(list, popup_area, &mut state);
    }

    fn draw_prompt(&self, frame: &mut Frame, area: Rect, prompt: &Prompt) {
        let width = (area.width.saturating_sub(8)).min(60).max(20);
        let popup_area = centered_rect(area, width, 3);
        frame.render_widget(Clear, popup_area);
        let paragraph = Paragraph::new(Line::from(vec![
            Span::raw(prompt.value.clone()),
            Span::styled("▏", Style::default().fg(Color::DarkGray)),
        ]))
        .block(
            Block::default()
                .title(prompt.title.clone())
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, popup_area);
    }

    fn draw_tags(&self, frame: &mut Frame, area: Rect, tags: &TagPopup) {
        let entries = self.tag_entries();
        let height = (entries.len() as u16 + 2).min(area.height);
        let popup_area = centered_rect(area, 30.min(area.width), height.max(3));
        frame.render_widget(Clear, popup_area);
        let items: Vec<ListItem> = entries
            .into_iter()
            .map(|label| ListItem::new(Line::from(label)))
            .collect();
        let mut state = ListState::default();
        state.select(Some(tags.selected));
        let list = List::new(items)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .block(
                Block::default()
                    .title("Tag (n: new, d: delete)")
                    .borders(Borders::ALL),
            );
        frame.render_stateful_widget(list, popup_area, &mut state);
    }

    fn tag_entries(&self) -> Vec<String> {
        let mut entries = vec!["(no tag)".to_string()];
        entries.extend(self.explorer.tags().iter().map(|tag| tag.name.clone()));
        entries
    }

    fn draw_message_box(
        &self,
        frame: &mut Frame,
        area: Rect,
        title: &str,
        message: &str,
        footer: &str,
    ) {
        let width = (area.width.saturating_sub(8)).min(60).max(20);
        let height = 4u16.min(area.height);
        let popup_area = centered_rect(area, width, height);
        frame.render_widget(Clear, popup_area);
        let paragraph = Paragraph::new(message.to_string())
            .wrap(ratatui::widgets::Wrap { trim: true })
            .block(
                Block::default()
                    .title(title.to_string())
                    .title_bottom(footer.to_string())
                    .borders(Borders::ALL),
            );
        frame.render_widget(paragraph, popup_area);
    }

    fn status_line(&mut self) -> String {
        self.prune_status_message();
        let mut parts = Vec::new();
        if let Some(session) = &self.session {
            let tag = self
                .explorer
                .tag_name(session.tag_id)
                .map(|name| format!("#{name}"))
                .unwrap_or_else(|| "no tag".to_string());
            parts.push(format!(
                "{} | {} | {} blocks",
                session.collection_name,
                tag,
                session.store.len()
            ));
        } else {
            parts.push("no collection".to_string());
        }
        if let Some((message, _)) = &self.status_message {
            parts.push(message.clone());
        } else {
            parts.push("Tab: switch pane | /: block type | Ctrl-Q: quit".to_string());
        }
        parts.join(" | ")
    }

    fn prune_status_message(&mut self) {
        if let Some((_, instant)) = &self.status_message {
            if instant.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    fn report_error(&mut self, operation: &str, err: tabula_tui::ApiError) {
        error!(operation, %err, "backend call failed");
        self.popup = Some(Popup::Error(format!("Failed to {operation}: {err}")));
    }

    fn on_tick(&mut self) {
        self.prune_status_message();
    }

    // ── event dispatch ──────────────────────────────────────────────

    async fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key).await,
            Event::Mouse(mouse) => self.handle_mouse(mouse).await,
            _ => Ok(()),
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.popup.is_some() {
            self.handle_popup_key(key).await;
            return Ok(());
        }

        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), m) | (KeyCode::Char('c'), m)
                if m.contains(KeyModifiers::CONTROL) =>
            {
                self.blur().await;
                self.should_quit = true;
                return Ok(());
            }
            (KeyCode::Tab, _) if self.pane == Pane::Sidebar => {
                if self.session.is_some() {
                    self.pane = Pane::Page;
                }
                return Ok(());
            }
            (KeyCode::Tab, _) if self.edit.is_none() => {
                self.pane = Pane::Sidebar;
                return Ok(());
            }
            (KeyCode::Esc, _) if self.pane == Pane::Page => {
                if self.edit.is_some() {
                    self.blur().await;
                } else {
                    self.pane = Pane::Sidebar;
                }
                return Ok(());
            }
            _ => {}
        }

        match self.pane {
            Pane::Sidebar => self.handle_sidebar_key(key).await,
            Pane::Page => self.handle_page_key(key).await,
        }
        Ok(())
    }

    async fn handle_sidebar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.explorer.move_selection(-1),
            KeyCode::Down => self.explorer.move_selection(1),
            KeyCode::Enter => {
                if let Some(collection) = self.explorer.selected().cloned() {
                    self.open_collection(collection).await;
                }
            }
            KeyCode::Char('n') => {
                self.popup = Some(Popup::Prompt(Prompt {
                    title: "New collection name".to_string(),
                    value: String::new(),
                    purpose: PromptPurpose::CreateCollection,
                }));
            }
            KeyCode::Char('r') => {
                if let Some(collection) = self.explorer.selected() {
                    self.popup = Some(Popup::Prompt(Prompt {
                        title: "Rename collection".to_string(),
                        value: collection.name.clone(),
                        purpose: PromptPurpose::RenameCollection {
                            collection_id: collection.id,
                        },
                    }));
                }
            }
            KeyCode::Char('d') => {
                if let Some(collection) = self.explorer.selected() {
                    self.popup = Some(Popup::Confirm(Confirm {
                        message: format!("Delete collection \"{}\"?", collection.name),
                        action: ConfirmAction::DeleteCollection {
                            collection_id: collection.id,
                        },
                    }));
                }
            }
            KeyCode::Char('t') => {
                if self.explorer.selected().is_some() {
                    self.popup = Some(Popup::Tags(TagPopup { selected: 0 }));
                }
            }
            _ => {}
        }
    }

    async fn open_collection(&mut self, collection: Collection) {
        self.blur().await;
        match self.editor.open(&collection).await {
            Ok(session) => {
                let first = session.store.id_at(0).map(str::to_string);
                self.session = Some(session);
                self.scroll_top = 0;
                self.pane = Pane::Page;
                self.edit = None;
                if let Some(id) = first {
                    self.focus_block(&id, FocusTarget::Start);
                }
            }
            Err(err) => self.report_error("load collection content", err),
        }
    }

    async fn handle_page_key(&mut self, key: KeyEvent) {
        let Some(session) = &self.session else {
            return;
        };

        let Some(edit) = &self.edit else {
            // Nothing focused yet: any navigation key lands on the page's
            // first block.
            if matches!(key.code, KeyCode::Up | KeyCode::Down | KeyCode::Enter) {
                if let Some(first) = session.store.id_at(0).map(str::to_string) {
                    self.focus_block(&first, FocusTarget::Start);
                }
            }
            return;
        };

        let block_type = session
            .store
            .get(&edit.block_id)
            .map(|block| block.block_type)
            .unwrap_or(BlockType::Text);
        let (draft_empty, caret_at_start) = match &edit.kind {
            EditKind::Text { draft, caret } => (draft.trim().is_empty(), *caret == 0),
            EditKind::Table {
                grid, row, column, caret, ..
            } => {
                let cell = grid
                    .get(*row)
                    .and_then(|cells| cells.get(*column))
                    .map(String::as_str)
                    .unwrap_or("");
                (cell.trim().is_empty(), *caret == 0)
            }
            EditKind::File => (true, true),
        };
        let ctx = EditContext {
            block_type,
            draft_empty,
            caret_at_start,
            block_count: session.store.len(),
        };

        if let Some(command) = route_key(&key, &ctx) {
            self.execute_command(command, draft_empty).await;
        }
    }

    async fn execute_command(&mut self, command: EditorCommand, draft_empty: bool) {
        match command {
            EditorCommand::FocusPrevious => self.focus_neighbor(-1).await,
            EditorCommand::FocusNext => self.focus_neighbor(1).await,
            EditorCommand::SplitBlock => self.split_block(draft_empty).await,
            EditorCommand::DeleteEmptyBlock => self.delete_focused_block(true).await,
            EditorCommand::OpenPicker => self.open_picker(),
            EditorCommand::ResizeTable {
                delta_rows,
                delta_columns,
            } => self.resize_focused_table(delta_rows, delta_columns).await,
            EditorCommand::MoveCell {
                delta_rows,
                delta_columns,
            } => self.move_focused_cell(delta_rows, delta_columns).await,
            EditorCommand::InsertChar(ch) => self.edit_draft(|draft, caret| {
                insert_char_at(draft, *caret, ch);
                *caret += 1;
            }),
            EditorCommand::DeleteBackward => self.edit_draft(|draft, caret| {
                if *caret > 0 {
                    *caret -= 1;
                    remove_char_at(draft, *caret);
                }
            }),
            EditorCommand::DeleteForward => self.edit_draft(|draft, caret| {
                if *caret < draft.chars().count() {
                    remove_char_at(draft, *caret);
                }
            }),
            EditorCommand::CaretLeft => self.edit_draft(|_, caret| {
                *caret = caret.saturating_sub(1);
            }),
            EditorCommand::CaretRight => self.edit_draft(|draft, caret| {
                *caret = (*caret + 1).min(draft.chars().count());
            }),
            EditorCommand::CaretStart => self.edit_draft(|_, caret| *caret = 0),
            EditorCommand::CaretEnd => self.edit_draft(|draft, caret| {
                *caret = draft.chars().count();
            }),
        }
    }

    /// Apply a closure to the focused draft (or focused table cell) and
    /// its caret.
    fn edit_draft(&mut self, apply: impl FnOnce(&mut String, &mut usize)) {
        match self.edit.as_mut().map(|edit| &mut edit.kind) {
            Some(EditKind::Text { draft, caret }) => apply(draft, caret),
            Some(EditKind::Table {
                grid, row, column, caret,
            }) => {
                if let Some(cell) = grid.get_mut(*row).and_then(|cells| cells.get_mut(*column)) {
                    apply(cell, caret);
                }
            }
            _ => {}
        }
    }

    // ── focus and drafts ────────────────────────────────────────────

    /// Install edit state for a block, with the caret at the requested
    /// end of its text (or its first/last cell for tables).
    fn focus_block(&mut self, block_id: &str, position: FocusTarget) {
        let Some(session) = &self.session else {
            return;
        };
        let Some(block) = session.store.get(block_id) else {
            self.edit = None;
            return;
        };
        let kind = match block.block_type {
            BlockType::Table => {
                let grid = block
                    .grid()
                    .cloned()
                    .unwrap_or_else(|| vec![vec![String::new(); 3]; 3]);
                let (row, column) = match position {
                    FocusTarget::Start => (0, 0),
                    FocusTarget::End => (
                        grid.len().saturating_sub(1),
                        grid.first().map(Vec::len).unwrap_or(1).saturating_sub(1),
                    ),
                };
                let caret = match position {
                    FocusTarget::Start => 0,
                    FocusTarget::End => grid
                        .get(row)
                        .and_then(|cells| cells.get(column))
                        .map(|cell| cell.chars().count())
                        .unwrap_or(0),
                };
                EditKind::Table {
                    grid,
                    row,
                    column,
                    caret,
                }
            }
            BlockType::File => EditKind::File,
            _ => {
                let draft = block.text().to_string();
                let caret = match position {
                    FocusTarget::Start => 0,
                    FocusTarget::End => draft.chars().count(),
                };
                EditKind::Text { draft, caret }
            }
        };
        self.edit = Some(EditState {
            block_id: block_id.to_string(),
            kind,
        });
        self.pane = Pane::Page;
    }

    fn apply_focus(&mut self, request: FocusRequest) {
        self.focus_block(&request.block_id, request.position);
    }

    /// Persist the focused draft the way a blur does, leaving focus in
    /// place.
    async fn save_focused_draft(&mut self) {
        enum PendingSave {
            Text(String),
            Grid(Vec<Vec<String>>),
        }
        let Some((block_id, pending)) = self.edit.as_ref().and_then(|edit| match &edit.kind {
            EditKind::Text { draft, .. } => {
                Some((edit.block_id.clone(), PendingSave::Text(draft.clone())))
            }
            EditKind::Table { grid, .. } => {
                Some((edit.block_id.clone(), PendingSave::Grid(grid.clone())))
            }
            EditKind::File => None,
        }) else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match pending {
            PendingSave::Text(draft) => {
                if let Err(err) = self.editor.save_content(session, &block_id, &draft).await {
                    self.report_error("save block", err);
                }
            }
            PendingSave::Grid(grid) => {
                let unchanged = session
                    .store
                    .get(&block_id)
                    .and_then(|block| block.grid())
                    .map(|stored| *stored == grid)
                    .unwrap_or(false);
                if !unchanged {
                    if let Err(err) = self.editor.save_table(session, &block_id, grid).await {
                        self.report_error("save table", err);
                    }
                }
            }
        }
    }

    /// Save the focused draft and drop focus.
    async fn blur(&mut self) {
        self.save_focused_draft().await;
        self.edit = None;
    }

    async fn focus_neighbor(&mut self, direction: i32) {
        let Some(current) = self.edit.as_ref().map(|edit| edit.block_id.clone()) else {
            return;
        };
        self.save_focused_draft().await;
        let Some(session) = &self.session else {
            return;
        };
        let neighbor = if direction < 0 {
            session.store.previous_id(&current)
        } else {
            session.store.next_id(&current)
        }
        .map(str::to_string);
        if let Some(id) = neighbor {
            let position = if direction < 0 {
                FocusTarget::End
            } else {
                FocusTarget::Start
            };
            self.focus_block(&id, position);
        }
    }

    async fn split_block(&mut self, draft_empty: bool) {
        let Some(block_id) = self.edit.as_ref().map(|edit| edit.block_id.clone()) else {
            return;
        };
        self.save_focused_draft().await;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match self.editor.split_after(session, &block_id, draft_empty).await {
            Ok(request) => self.apply_focus(request),
            Err(err) => self.report_error("create block", err),
        }
    }

    async fn delete_focused_block(&mut self, focus_previous: bool) {
        let Some(block_id) = self.edit.as_ref().map(|edit| edit.block_id.clone()) else {
            return;
        };
        self.delete_block(&block_id, focus_previous).await;
    }

    async fn delete_block(&mut self, block_id: &str, focus_previous: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match self.editor.delete(session, block_id, focus_previous).await {
            Ok(request) => {
                let deleted = !self
                    .session
                    .as_ref()
                    .map(|session| session.store.contains(block_id))
                    .unwrap_or(false);
                if deleted {
                    if self
                        .edit
                        .as_ref()
                        .map(|edit| edit.block_id == block_id)
                        .unwrap_or(false)
                    {
                        self.edit = None;
                    }
                    if let Some(request) = request {
                        self.apply_focus(request);
                    }
                }
            }
            Err(err) => self.report_error("delete block", err),
        }
    }

    fn open_picker(&mut self) {
        let Some(block_id) = self.edit.as_ref().map(|edit| edit.block_id.clone()) else {
            return;
        };
        let anchor = self
            .last_page
            .as_ref()
            .and_then(|page| page.cursor)
            .map(|cursor| {
                let x = self.page_area.x + cursor.column;
                let y = self.page_area.y
                    + (cursor.line.saturating_sub(self.scroll_top) as u16)
                    + 1;
                (x, y)
            })
            .unwrap_or((self.page_area.x, self.page_area.y));
        self.popup = Some(Popup::Picker(BlockPicker::new(block_id, anchor)));
    }

    async fn resize_focused_table(&mut self, delta_rows: i64, delta_columns: i64) {
        let Some(block_id) = self.edit.as_ref().map(|edit| edit.block_id.clone()) else {
            return;
        };
        self.save_focused_draft().await;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match self
            .editor
            .resize_table(session, &block_id, delta_rows, delta_columns)
            .await
        {
            Ok(true) => {
                // Re-seat the cell inside the new dimensions.
                self.focus_block(&block_id, FocusTarget::Start);
            }
            Ok(false) => {}
            Err(err) => self.report_error("resize table", err),
        }
    }

    async fn move_focused_cell(&mut self, delta_rows: i64, delta_columns: i64) {
        self.save_focused_draft().await;
        let Some(EditState {
            kind: EditKind::Table {
                grid, row, column, caret,
            },
            ..
        }) = self.edit.as_mut()
        else {
            return;
        };
        let rows = grid.len().max(1);
        let columns = grid.first().map(Vec::len).unwrap_or(1).max(1);
        *row = (*row as i64 + delta_rows).clamp(0, rows as i64 - 1) as usize;
        *column = (*column as i64 + delta_columns).clamp(0, columns as i64 - 1) as usize;
        *caret = grid
            .get(*row)
            .and_then(|cells| cells.get(*column))
            .map(|cell| cell.chars().count())
            .unwrap_or(0);
    }

    // ── popups ──────────────────────────────────────────────────────

    async fn handle_popup_key(&mut self, key: KeyEvent) {
        match self.popup.take() {
            Some(Popup::Error(message)) => match key.code {
                KeyCode::Esc | KeyCode::Enter => {}
                _ => self.popup = Some(Popup::Error(message)),
            },
            Some(Popup::Picker(mut picker)) => match key.code {
                KeyCode::Esc => {}
                KeyCode::Up => {
                    picker.move_selection(-1);
                    self.popup = Some(Popup::Picker(picker));
                }
                KeyCode::Down => {
                    picker.move_selection(1);
                    self.popup = Some(Popup::Picker(picker));
                }
                KeyCode::Enter => {
                    let option = *picker.selected_option();
                    self.pick_block_type(picker.block_id().to_string(), option).await;
                }
                KeyCode::Char(ch) => {
                    if let Some(option) = picker.shortcut(ch).copied() {
                        self.pick_block_type(picker.block_id().to_string(), option).await;
                    } else {
                        self.popup = Some(Popup::Picker(picker));
                    }
                }
                _ => self.popup = Some(Popup::Picker(picker)),
            },
            Some(Popup::Prompt(mut prompt)) => match key.code {
                KeyCode::Esc => {}
                KeyCode::Enter => self.commit_prompt(prompt).await,
                KeyCode::Backspace => {
                    prompt.value.pop();
                    self.popup = Some(Popup::Prompt(prompt));
                }
                KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    prompt.value.push(ch);
                    self.popup = Some(Popup::Prompt(prompt));
                }
                _ => self.popup = Some(Popup::Prompt(prompt)),
            },
            Some(Popup::Confirm(confirm)) => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.run_confirmed(confirm.action).await,
                KeyCode::Char('n') | KeyCode::Esc => {}
                _ => self.popup = Some(Popup::Confirm(confirm)),
            },
            Some(Popup::Tags(mut tags)) => {
                let entry_count = self.explorer.tags().len() + 1;
                match key.code {
                    KeyCode::Esc => {}
                    KeyCode::Up => {
                        tags.selected = tags.selected.checked_sub(1).unwrap_or(entry_count - 1);
                        self.popup = Some(Popup::Tags(tags));
                    }
                    KeyCode::Down => {
                        tags.selected = (tags.selected + 1) % entry_count;
                        self.popup = Some(Popup::Tags(tags));
                    }
                    KeyCode::Enter => self.assign_tag(tags.selected).await,
                    KeyCode::Char('n') => {
                        self.popup = Some(Popup::Prompt(Prompt {
                            title: "New tag name".to_string(),
                            value: String::new(),
                            purpose: PromptPurpose::CreateTag,
                        }));
                    }
                    KeyCode::Char('d') => {
                        let tag_id = tags
                            .selected
                            .checked_sub(1)
                            .and_then(|index| self.explorer.tags().get(index))
                            .map(|tag| tag.id);
                        match tag_id {
                            Some(tag_id) => {
                                if let Err(err) = self.explorer.delete_tag(tag_id).await {
                                    self.report_error("delete tag", err);
                                } else {
                                    self.set_status("Tag deleted");
                                    self.popup = Some(Popup::Tags(TagPopup { selected: 0 }));
                                }
                            }
                            None => self.popup = Some(Popup::Tags(tags)),
                        }
                    }
                    _ => self.popup = Some(Popup::Tags(tags)),
                }
            }
            None => {}
        }
    }

    async fn pick_block_type(&mut self, block_id: String, option: PickerOption) {
        if let Some(media) = option.token.strip_prefix("file ") {
            let media_type = match media {
                "photo" => MediaType::Photo,
                "audio" => MediaType::Audio,
                _ => MediaType::Document,
            };
            self.popup = Some(Popup::Prompt(Prompt {
                title: format!("Path of {media} file"),
                value: String::new(),
                purpose: PromptPurpose::UploadFile {
                    block_id,
                    media_type,
                },
            }));
            return;
        }

        if option.token == "table" {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            match self.editor.create_table(session, Some(&block_id)).await {
                Ok(Some(request)) => self.apply_focus(request),
                Ok(None) => {}
                Err(err) => self.report_error("create table", err),
            }
            return;
        }

        let draft = match self.edit.as_ref() {
            Some(EditState {
                block_id: focused,
                kind: EditKind::Text { draft, .. },
            }) if *focused == block_id => draft.clone(),
            _ => self
                .session
                .as_ref()
                .and_then(|session| session.store.get(&block_id))
                .map(|block| block.text().to_string())
                .unwrap_or_default(),
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match self
            .editor
            .replace_type(session, &block_id, option.token, &draft)
            .await
        {
            Ok(Some(request)) => self.apply_focus(request),
            Ok(None) => {}
            Err(err) => self.report_error("replace block", err),
        }
    }

    async fn commit_prompt(&mut self, prompt: Prompt) {
        match prompt.purpose {
            PromptPurpose::CreateCollection => {
                match self.explorer.create(&prompt.value).await {
                    Ok(Some(created)) => {
                        self.set_status(format!("Created \"{}\"", created.name));
                        self.open_collection(created).await;
                    }
                    Ok(None) => {}
                    Err(err) => self.report_error("create collection", err),
                }
            }
            PromptPurpose::RenameCollection { collection_id } => {
                match self.explorer.rename(collection_id, &prompt.value).await {
                    Ok(Some(updated)) => {
                        if let Some(session) = self.session.as_mut() {
                            if session.collection_id == updated.id {
                                session.collection_name = updated.name.clone();
                            }
                        }
                        self.set_status("Renamed");
                    }
                    Ok(None) => {}
                    Err(err) => self.report_error("rename collection", err),
                }
            }
            PromptPurpose::CreateTag => match self.explorer.create_tag(&prompt.value).await {
                Ok(Some(tag)) => {
                    self.set_status(format!("Created tag #{}", tag.name));
                    self.popup = Some(Popup::Tags(TagPopup { selected: 0 }));
                }
                Ok(None) => {}
                Err(err) => self.report_error("create tag", err),
            },
            PromptPurpose::UploadFile {
                block_id,
                media_type,
            } => {
                let path = prompt.value.trim().to_string();
                if path.is_empty() {
                    return;
                }
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                match self
                    .editor
                    .upload_file(session, &block_id, media_type, Path::new(&path))
                    .await
                {
                    Ok(request) => {
                        self.set_status("File uploaded");
                        self.apply_focus(request);
                    }
                    Err(err) => self.report_error("upload file", err),
                }
            }
        }
    }

    async fn run_confirmed(&mut self, action: ConfirmAction) {
        match action {
            ConfirmAction::DeleteCollection { collection_id } => {
                if let Err(err) = self.explorer.delete(collection_id).await {
                    self.report_error("delete collection", err);
                    return;
                }
                if self
                    .session
                    .as_ref()
                    .map(|session| session.collection_id == collection_id)
                    .unwrap_or(false)
                {
                    self.session = None;
                    self.edit = None;
                    self.pane = Pane::Sidebar;
                }
                self.set_status("Collection deleted");
            }
        }
    }

    async fn assign_tag(&mut self, selected: usize) {
        let Some(collection) = self.explorer.selected() else {
            return;
        };
        let collection_id = collection.id;
        let tag_id = selected
            .checked_sub(1)
            .and_then(|index| self.explorer.tags().get(index))
            .map(|tag| tag.id);
        match self.explorer.set_tag(collection_id, tag_id).await {
            Ok(updated) => {
                if let Some(session) = self.session.as_mut() {
                    if session.collection_id == updated.id {
                        session.tag_id = updated.tag_id;
                    }
                }
                self.set_status("Tag updated");
            }
            Err(err) => self.report_error("update collection tag", err),
        }
    }

    // ── mouse ───────────────────────────────────────────────────────

    async fn handle_mouse(&mut self, event: MouseEvent) -> Result<()> {
        if self.popup.is_some() {
            if matches!(event.kind, MouseEventKind::Down(MouseButton::Left)) {
                self.popup = None;
            }
            return Ok(());
        }

        match event.kind {
            MouseEventKind::ScrollUp => {
                self.scroll_top = self.scroll_top.saturating_sub(MOUSE_SCROLL_LINES);
            }
            MouseEventKind::ScrollDown => {
                self.scroll_top += MOUSE_SCROLL_LINES;
            }
            MouseEventKind::Down(MouseButton::Left) => self.handle_mouse_down(event).await,
            MouseEventKind::Drag(MouseButton::Left) => self.handle_mouse_drag(event),
            MouseEventKind::Up(MouseButton::Left) => self.handle_mouse_up().await,
            _ => {}
        }
        Ok(())
    }

    fn page_position(&self, event: &MouseEvent) -> Option<(usize, usize)> {
        let area = self.page_area;
        if event.column < area.x
            || event.column >= area.x + area.width
            || event.row < area.y
            || event.row >= area.y + area.height
        {
            return None;
        }
        let line = (event.row - area.y) as usize + self.scroll_top;
        let column = (event.column - area.x) as usize;
        Some((line, column))
    }

    fn sidebar_row(&self, event: &MouseEvent) -> Option<usize> {
        let area = self.sidebar_area;
        if event.column < area.x
            || event.column >= area.x + area.width
            || event.row <= area.y
            || event.row >= area.y + area.height - 1
        {
            return None;
        }
        Some((event.row - area.y - 1) as usize)
    }

    async fn handle_mouse_down(&mut self, event: MouseEvent) {
        if let Some(row) = self.sidebar_row(&event) {
            self.pane = Pane::Sidebar;
            if row < self.explorer.collections().len() {
                self.explorer.select_index(row);
                if let Some(collection) = self.explorer.selected().cloned() {
                    self.open_collection(collection).await;
                }
            }
            return;
        }

        let Some((line, column)) = self.page_position(&event) else {
            return;
        };
        let (delete_hit, hit) = {
            let Some(page) = &self.last_page else {
                return;
            };
            let hit = page.block_at_line(line).map(|layout| layout.id.clone());
            (page.is_delete_hit(line, column), hit)
        };

        if delete_hit {
            if let Some(block_id) = hit {
                self.delete_block(&block_id, false).await;
            }
            return;
        }

        match hit {
            Some(block_id) => {
                let refocus = self
                    .edit
                    .as_ref()
                    .map(|edit| edit.block_id != block_id)
                    .unwrap_or(true);
                if refocus {
                    self.blur().await;
                    self.focus_block(&block_id, FocusTarget::End);
                }
                self.pane = Pane::Page;
                self.drag_press = Some(DragPress { block_id, line });
            }
            None => {
                self.blur().await;
            }
        }
    }

    fn handle_mouse_drag(&mut self, event: MouseEvent) {
        let Some((line, _)) = self.page_position(&event) else {
            if self.drag.is_dragging() {
                self.drag.hover(None);
            }
            return;
        };

        if !self.drag.is_dragging() {
            let Some(press) = &self.drag_press else {
                return;
            };
            if press.line == line {
                return;
            }
            let Some(session) = &self.session else {
                return;
            };
            self.drag
                .begin(press.block_id.clone(), session.store.order().to_vec());
        }

        let candidate = self
            .last_page
            .as_ref()
            .and_then(|page| page.block_at_line(line))
            .map(|layout| {
                (
                    layout.id.clone(),
                    placement_for(layout.first_line, layout.height, line),
                )
            });
        self.drag
            .hover(candidate.as_ref().map(|(id, placement)| (id.as_str(), *placement)));
    }

    async fn handle_mouse_up(&mut self) {
        self.drag_press = None;
        match self.drag.finish() {
            DropOutcome::Move {
                source_id,
                target,
                snapshot,
            } => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                match self
                    .editor
                    .apply_reorder(session, &source_id, &target.block_id, target.placement, &snapshot)
                    .await
                {
                    Ok(true) => self.set_status("Block moved"),
                    Ok(false) => {}
                    Err(err) => self.report_error("reorder blocks", err),
                }
            }
            DropOutcome::Cancelled | DropOutcome::NotDragging => {}
        }
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn byte_index(text: &str, caret: usize) -> usize {
    text.char_indices()
        .nth(caret)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

fn insert_char_at(text: &mut String, caret: usize, ch: char) {
    let index = byte_index(text, caret);
    text.insert(index, ch);
}

fn remove_char_at(text: &mut String, caret: usize) {
    let index = byte_index(text, caret);
    if index < text.len() {
        text.remove(index);
    }
}
