//! Application state and the terminal event loop. Input arrives on a
//! dedicated reader thread and is bridged into the async loop over a
//! channel; capture polling runs on the update interval.

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Position, Rect},
    widgets::ListState,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::backend::{CaptureBackend, CaptureTarget};
use crate::columns::ColumnSet;
use crate::devices::Device;
use crate::hexgrid::{BYTES_PER_LINE, byte_at_column, nearest_byte_at_column};
use crate::session::Session;
use crate::themes::{Theme, ThemeName};
use crate::ui;
use crate::window::RowLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Devices,
    Inspect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    PacketTable,
    DetailTree,
    HexDump,
}

pub struct App<B: CaptureBackend> {
    pub session: Session<B>,
    pub theme: Theme,
    pub screen: Screen,
    pub focus: Pane,
    pub show_help: bool,
    pub mouse_enabled: bool,
    pub debug: bool,
    pub follow_tail: bool,
    update_interval: Duration,
    initial_target: Option<CaptureTarget>,

    pub devices: Vec<Device>,
    pub device_cursor: usize,
    pub device_state: ListState,

    pub columns: ColumnSet,
    pub focused_column: usize,
    pub table_layout: RowLayout,
    pub table_cursor: usize,
    pub table_scroll: usize,
    pub table_visible: usize,
    pub tree_cursor: usize,
    pub tree_scroll: usize,
    pub tree_visible: usize,
    pub hex_scroll: usize,
    pub hex_visible: usize,

    // Content areas recorded at render time for mouse hit-testing
    pub device_list_area: Option<Rect>,
    pub table_area: Option<Rect>,
    pub tree_area: Option<Rect>,
    pub hex_area: Option<Rect>,

    should_quit: bool,
}

impl<B: CaptureBackend> App<B> {
    pub fn new(
        update_interval: Duration,
        debug: bool,
        theme_name: ThemeName,
        backend: B,
        initial_target: Option<CaptureTarget>,
        mouse_enabled: bool,
    ) -> Self {
        let session = Session::new(backend);
        let devices = session.devices();
        let screen = if initial_target.is_some() {
            Screen::Inspect
        } else {
            Screen::Devices
        };

        App {
            session,
            theme: Theme::new(theme_name),
            screen,
            focus: Pane::PacketTable,
            show_help: false,
            mouse_enabled,
            debug,
            follow_tail: true,
            update_interval,
            initial_target,
            devices,
            device_cursor: 0,
            device_state: ListState::default(),
            columns: ColumnSet::packet_table(),
            focused_column: 0,
            table_layout: RowLayout::new(1),
            table_cursor: 0,
            table_scroll: 0,
            table_visible: 0,
            tree_cursor: 0,
            tree_scroll: 0,
            tree_visible: 0,
            hex_scroll: 0,
            hex_visible: 0,
            device_list_area: None,
            table_area: None,
            tree_area: None,
            hex_area: None,
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if self.mouse_enabled {
            execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        } else {
            execute!(stdout, EnterAlternateScreen)?;
        }
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal).await;

        disable_raw_mode()?;
        if self.mouse_enabled {
            execute!(
                terminal.backend_mut(),
                LeaveAlternateScreen,
                DisableMouseCapture
            )?;
        } else {
            execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        }
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        let mut input = spawn_input_reader();
        let mut ticker = tokio::time::interval(self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if let Some(target) = self.initial_target.take() {
            self.session.start(target).await;
        }

        while !self.should_quit {
            terminal.draw(|f| ui::ui(f, self))?;

            tokio::select! {
                _ = ticker.tick() => {
                    if self.session.capturing {
                        self.session.poll().await;
                    }
                }
                maybe_event = input.recv() => {
                    let Some(event) = maybe_event else { break };
                    self.handle_event(event).await;
                    // Drain whatever queued up while we were drawing so a
                    // mouse drag doesn't fall a frame behind per event
                    while let Ok(event) = input.try_recv() {
                        self.handle_event(event).await;
                    }
                }
            }
        }

        if self.session.capturing {
            self.session.stop().await;
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: Event) {
        if self.debug {
            debug!(?event, "input event");
        }
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key).await,
            Event::Mouse(mouse) if self.mouse_enabled => self.handle_mouse(mouse).await,
            _ => {}
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        if self.show_help {
            match key.code {
                KeyCode::Char('q') | KeyCode::Char('h') | KeyCode::Esc | KeyCode::F(1) => {
                    self.show_help = false;
                }
                _ => {}
            }
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('h') | KeyCode::F(1) => self.show_help = true,
            _ => match self.screen {
                Screen::Devices => self.handle_device_key(key).await,
                Screen::Inspect => self.handle_inspect_key(key).await,
            },
        }
    }

    async fn handle_device_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.device_cursor = self.device_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if !self.devices.is_empty() {
                    self.device_cursor = (self.device_cursor + 1).min(self.devices.len() - 1);
                }
            }
            KeyCode::Char('r') => self.refresh_devices(),
            KeyCode::Enter => self.start_on_selected_device().await,
            KeyCode::Esc => self.screen = Screen::Inspect,
            _ => {}
        }
    }

    async fn handle_inspect_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('d') => {
                // A drag must not keep extending against the picker screen
                self.session.selection.clear();
                self.refresh_devices();
                self.screen = Screen::Devices;
            }
            KeyCode::Char('s') => self.session.stop().await,
            KeyCode::Char('c') => {
                self.session.clear().await;
                self.table_cursor = 0;
                self.table_scroll = 0;
                self.tree_cursor = 0;
                self.tree_scroll = 0;
                self.hex_scroll = 0;
            }
            KeyCode::Char('f') => self.follow_tail = !self.follow_tail,
            KeyCode::Tab => self.next_pane(),
            KeyCode::BackTab => self.prev_pane(),
            KeyCode::Esc => self.session.selection.clear(),
            KeyCode::Left => {
                if self.focus == Pane::PacketTable {
                    self.focused_column = self.focused_column.saturating_sub(1);
                }
            }
            KeyCode::Right => {
                if self.focus == Pane::PacketTable {
                    self.focused_column = (self.focused_column + 1).min(self.columns.len() - 1);
                }
            }
            KeyCode::Char('<') | KeyCode::Char('-') => {
                self.columns.adjust(self.focused_column, -1);
            }
            KeyCode::Char('>') | KeyCode::Char('+') => {
                self.columns.adjust(self.focused_column, 1);
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_focused(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_focused(1),
            KeyCode::PageUp => self.move_focused(-(self.focused_page() as isize)),
            KeyCode::PageDown => self.move_focused(self.focused_page() as isize),
            KeyCode::Home => self.jump_focused(true),
            KeyCode::End => self.jump_focused(false),
            KeyCode::Enter => match self.focus {
                Pane::PacketTable => self.inspect_row(self.table_cursor).await,
                Pane::DetailTree => self.select_tree_field(),
                Pane::HexDump => {}
            },
            _ => {}
        }
    }

    async fn handle_mouse(&mut self, mouse: MouseEvent) {
        let at = Position::new(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.handle_click(at).await,
            MouseEventKind::Drag(MouseButton::Left) => self.handle_drag(at),
            // Release anywhere ends the drag, even outside the hex pane
            MouseEventKind::Up(MouseButton::Left) => self.session.selection.end_drag(),
            MouseEventKind::ScrollUp => self.scroll_under_pointer(at, -3),
            MouseEventKind::ScrollDown => self.scroll_under_pointer(at, 3),
            _ => {}
        }
    }

    async fn handle_click(&mut self, at: Position) {
        if self.show_help {
            self.show_help = false;
            return;
        }

        if self.screen == Screen::Devices {
            if let Some(area) = self.device_list_area
                && area.contains(at)
            {
                let index = self.device_state.offset() + (at.y - area.y) as usize;
                if index < self.devices.len() {
                    self.device_cursor = index;
                }
            }
            return;
        }

        if let Some(area) = self.table_area
            && area.contains(at)
        {
            self.focus = Pane::PacketTable;
            if let Some(index) = hit_row(area, self.table_scroll, at.y)
                && index < self.session.store.len()
            {
                self.follow_tail = false;
                self.table_cursor = index;
                self.inspect_row(index).await;
            }
            return;
        }

        if let Some(area) = self.tree_area
            && area.contains(at)
        {
            self.focus = Pane::DetailTree;
            let rows = self.session.detail.as_ref().map(|d| d.tree.len()).unwrap_or(0);
            if let Some(index) = hit_row(area, self.tree_scroll, at.y)
                && index < rows
            {
                self.tree_cursor = index;
                self.select_tree_field();
            }
            return;
        }

        if let Some(area) = self.hex_area
            && area.contains(at)
        {
            self.focus = Pane::HexDump;
            let position = match &self.session.detail {
                Some(detail) => hex_press_position(area, self.hex_scroll, at.x, at.y)
                    .filter(|p| detail.grid.cell_at(*p).is_some()),
                None => None,
            };
            if let Some(position) = position {
                self.session.selection.begin_drag(position);
            }
        }
    }

    fn handle_drag(&mut self, at: Position) {
        if !self.session.selection.is_dragging() {
            return;
        }
        let Some(area) = self.hex_area else { return };
        let Some(detail) = &self.session.detail else {
            return;
        };
        let total = detail.grid.total_bytes();
        if total == 0 {
            return;
        }
        let position = hex_drag_position(area, self.hex_scroll, at.x, at.y, total);
        self.session.selection.extend_drag(position);
    }

    fn scroll_under_pointer(&mut self, at: Position, delta: isize) {
        if self.screen == Screen::Devices {
            if self.device_list_area.is_some_and(|area| area.contains(at)) {
                let step = if delta < 0 { -1 } else { 1 };
                self.move_device_cursor(step);
            }
            return;
        }

        if self.table_area.is_some_and(|area| area.contains(at)) {
            self.follow_tail = false;
            self.table_scroll = saturating_scroll(self.table_scroll, delta);
        } else if self.tree_area.is_some_and(|area| area.contains(at)) {
            self.tree_scroll = saturating_scroll(self.tree_scroll, delta);
        } else if self.hex_area.is_some_and(|area| area.contains(at)) {
            self.hex_scroll = saturating_scroll(self.hex_scroll, delta);
        }
    }

    fn move_device_cursor(&mut self, delta: isize) {
        if self.devices.is_empty() {
            return;
        }
        self.device_cursor = saturating_scroll(self.device_cursor, delta).min(self.devices.len() - 1);
    }

    fn refresh_devices(&mut self) {
        self.devices = self.session.devices();
        self.device_cursor = self.device_cursor.min(self.devices.len().saturating_sub(1));
    }

    async fn start_on_selected_device(&mut self) {
        let Some(device) = self.devices.get(self.device_cursor) else {
            return;
        };
        let target = CaptureTarget::Live {
            device: device.name.clone(),
        };
        self.session.start(target).await;
        if self.session.capturing {
            self.screen = Screen::Inspect;
            self.focus = Pane::PacketTable;
            self.follow_tail = true;
            self.table_cursor = 0;
            self.table_scroll = 0;
        }
    }

    /// Fetches the decode for a table row; scroll state of the detail panes
    /// resets only when the shown frame actually changes.
    async fn inspect_row(&mut self, index: usize) {
        let before = self.session.detail.as_ref().map(|d| d.frame_number);
        self.session.select_row(index).await;
        let after = self.session.detail.as_ref().map(|d| d.frame_number);
        if before != after {
            self.tree_cursor = 0;
            self.tree_scroll = 0;
            self.hex_scroll = 0;
        }
    }

    /// Highlights the bytes of the tree row under the cursor and brings
    /// them into the hex pane's view. Rows without a byte range (layer
    /// headers, zero-length fields) do nothing.
    fn select_tree_field(&mut self) {
        let Some(detail) = &self.session.detail else {
            return;
        };
        let Some(row) = detail.tree.get(self.tree_cursor) else {
            return;
        };
        if let Some((offset, length)) = row.range {
            self.session.selection.select_field(offset, length);
            self.scroll_hex_to(offset);
        }
    }

    fn scroll_hex_to(&mut self, position: usize) {
        let line = position / BYTES_PER_LINE;
        let visible = self.hex_visible.max(1);
        if line < self.hex_scroll {
            self.hex_scroll = line;
        } else if line >= self.hex_scroll + visible {
            self.hex_scroll = line + 1 - visible;
        }
    }

    fn next_pane(&mut self) {
        if self.session.detail.is_none() {
            self.focus = Pane::PacketTable;
            return;
        }
        self.focus = match self.focus {
            Pane::PacketTable => Pane::DetailTree,
            Pane::DetailTree => Pane::HexDump,
            Pane::HexDump => Pane::PacketTable,
        };
    }

    fn prev_pane(&mut self) {
        if self.session.detail.is_none() {
            self.focus = Pane::PacketTable;
            return;
        }
        self.focus = match self.focus {
            Pane::PacketTable => Pane::HexDump,
            Pane::DetailTree => Pane::PacketTable,
            Pane::HexDump => Pane::DetailTree,
        };
    }

    fn focused_page(&self) -> usize {
        match self.focus {
            Pane::PacketTable => self.table_visible.max(1),
            Pane::DetailTree => self.tree_visible.max(1),
            Pane::HexDump => self.hex_visible.max(1),
        }
    }

    fn move_focused(&mut self, delta: isize) {
        match self.focus {
            Pane::PacketTable => {
                let len = self.session.store.len();
                if len == 0 {
                    return;
                }
                self.follow_tail = false;
                self.table_cursor = saturating_scroll(self.table_cursor, delta).min(len - 1);
                self.ensure_table_visible();
            }
            Pane::DetailTree => {
                let rows = self
                    .session
                    .detail
                    .as_ref()
                    .map(|d| d.tree.len())
                    .unwrap_or(0);
                if rows == 0 {
                    return;
                }
                self.tree_cursor = saturating_scroll(self.tree_cursor, delta).min(rows - 1);
                self.ensure_tree_visible();
            }
            Pane::HexDump => {
                self.hex_scroll = saturating_scroll(self.hex_scroll, delta);
            }
        }
    }

    fn jump_focused(&mut self, to_start: bool) {
        match self.focus {
            Pane::PacketTable => {
                let len = self.session.store.len();
                if len == 0 {
                    return;
                }
                self.follow_tail = false;
                self.table_cursor = if to_start { 0 } else { len - 1 };
                self.ensure_table_visible();
            }
            Pane::DetailTree => {
                let rows = self
                    .session
                    .detail
                    .as_ref()
                    .map(|d| d.tree.len())
                    .unwrap_or(0);
                if rows == 0 {
                    return;
                }
                self.tree_cursor = if to_start { 0 } else { rows - 1 };
                self.ensure_tree_visible();
            }
            Pane::HexDump => {
                let lines = self
                    .session
                    .detail
                    .as_ref()
                    .map(|d| d.grid.lines().len())
                    .unwrap_or(0);
                self.hex_scroll = if to_start {
                    0
                } else {
                    lines.saturating_sub(self.hex_visible.max(1))
                };
            }
        }
    }

    fn ensure_table_visible(&mut self) {
        let visible = self.table_visible.max(1);
        if self.table_cursor < self.table_scroll {
            self.table_scroll = self.table_cursor;
        } else if self.table_cursor >= self.table_scroll + visible {
            self.table_scroll = self.table_cursor + 1 - visible;
        }
    }

    fn ensure_tree_visible(&mut self) {
        let visible = self.tree_visible.max(1);
        if self.tree_cursor < self.tree_scroll {
            self.tree_scroll = self.tree_cursor;
        } else if self.tree_cursor >= self.tree_scroll + visible {
            self.tree_scroll = self.tree_cursor + 1 - visible;
        }
    }
}

/// Blocking crossterm reads on a plain thread, bridged into the async loop.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<Event> {
    let (sender, receiver) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            match event::read() {
                Ok(event) => {
                    if sender.send(event).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    receiver
}

fn saturating_scroll(value: usize, delta: isize) -> usize {
    if delta < 0 {
        value.saturating_sub(delta.unsigned_abs())
    } else {
        value.saturating_add(delta as usize)
    }
}

/// Maps a pointer row inside a content area to an absolute row index.
fn hit_row(area: Rect, scroll: usize, y: u16) -> Option<usize> {
    if y < area.y || y >= area.y + area.height {
        return None;
    }
    Some(scroll + (y - area.y) as usize)
}

/// Byte position for a press that lands exactly on a hex or ascii cell.
/// Presses on the offset label or in a gap return None.
fn hex_press_position(area: Rect, scroll: usize, x: u16, y: u16) -> Option<usize> {
    let line = hit_row(area, scroll, y)?;
    let column = x.checked_sub(area.x)? as usize;
    let byte = byte_at_column(column)?;
    Some(line * BYTES_PER_LINE + byte)
}

/// Nearest byte position while dragging. The pointer may be above, below,
/// or beside the grid; the result clamps into `[0, total_bytes)`.
fn hex_drag_position(area: Rect, scroll: usize, x: u16, y: u16, total_bytes: usize) -> usize {
    let line = if y < area.y {
        scroll.saturating_sub(1)
    } else {
        let within = ((y - area.y) as usize).min(area.height.saturating_sub(1) as usize);
        scroll + within
    };
    let column = x.saturating_sub(area.x) as usize;
    let byte = nearest_byte_at_column(column);
    (line * BYTES_PER_LINE + byte).min(total_bytes.saturating_sub(1))
}
