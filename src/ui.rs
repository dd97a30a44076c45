use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Cell, List, ListItem, Paragraph, Row, Table, TableState, Wrap,
    },
};

use crate::{
    app::{App, Pane, Screen},
    backend::CaptureBackend,
    hexgrid::{ASCII_FIELD_START, BYTES_PER_LINE, HexLine, hex_column},
    selection::Selection,
    themes::Theme,
    version,
    window::DEFAULT_OVERSCAN,
};

pub fn ui<B: CaptureBackend>(f: &mut Frame, app: &mut App<B>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    render_header(f, chunks[0], app);

    if app.show_help {
        render_help(f, chunks[1], app);
    } else {
        match app.screen {
            Screen::Devices => render_device_picker(f, chunks[1], app),
            Screen::Inspect => render_inspect(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header<B: CaptureBackend>(f: &mut Frame, area: Rect, app: &App<B>) {
    let theme = &app.theme;

    let mut header_spans = vec![
        Span::styled(
            "Wirescope",
            Style::default()
                .fg(theme.header_fg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {}", version::get_version()),
            Style::default()
                .fg(theme.text_accent)
                .add_modifier(Modifier::BOLD),
        ),
    ];

    if app.session.capturing {
        header_spans.push(Span::styled(
            " [CAPTURING]",
            Style::default()
                .fg(theme.text_accent)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let header_content = vec![
        Line::from(header_spans),
        Line::from(vec![Span::styled(
            format!(
                "Built: {} | Git: {}",
                version::get_build_time(),
                version::get_git_hash()
            ),
            Style::default()
                .fg(theme.text_secondary)
                .add_modifier(Modifier::ITALIC),
        )]),
    ];

    let header = Paragraph::new(header_content)
        .style(Style::default().bg(theme.header_bg))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme.border_normal)),
        );

    f.render_widget(header, area);
}

fn render_device_picker<B: CaptureBackend>(f: &mut Frame, area: Rect, app: &mut App<B>) {
    let theme = &app.theme;

    app.device_list_area = Some(Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    });

    if app.devices.is_empty() {
        let empty = Paragraph::new("No capture interfaces found (r to rescan)")
            .style(Style::default().fg(theme.text_secondary))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Capture Interfaces")
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(theme.border_focused)),
            );
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .devices
        .iter()
        .map(|device| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    device.name.clone(),
                    Style::default()
                        .fg(theme.text_accent)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    device
                        .display_line()
                        .strip_prefix(&device.name)
                        .unwrap_or_default()
                        .to_string(),
                    Style::default().fg(theme.text_primary),
                ),
            ]))
        })
        .collect();

    let title = format!(
        "Capture Interfaces ({}) - ↑/↓ select, Enter start, r rescan",
        app.devices.len()
    );

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme.border_focused)),
        )
        .style(Style::default().bg(theme.background))
        .highlight_style(
            Style::default()
                .bg(theme.selected_row_background)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    app.device_state.select(Some(app.device_cursor));
    f.render_stateful_widget(list, area, &mut app.device_state);
}

fn render_inspect<B: CaptureBackend>(f: &mut Frame, area: Rect, app: &mut App<B>) {
    if app.session.detail.is_some() {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        render_packet_table(f, chunks[0], app);

        let detail_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        render_field_tree(f, detail_chunks[0], app);
        render_hex_dump(f, detail_chunks[1], app);
    } else {
        app.tree_area = None;
        app.hex_area = None;
        render_packet_table(f, area, app);
    }
}

fn render_packet_table<B: CaptureBackend>(f: &mut Frame, area: Rect, app: &mut App<B>) {
    // Subtract 3 for top border, header row, and bottom border
    let visible_height = area.height.saturating_sub(3) as usize;
    app.table_visible = visible_height;
    app.table_area = Some(Rect {
        x: area.x + 1,
        y: area.y + 2,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(3),
    });

    let total = app.session.store.len();
    app.table_cursor = app.table_cursor.min(total.saturating_sub(1));
    app.table_layout.set_count(total);
    let max_scroll = app.table_layout.max_scroll(visible_height as u64) as usize;
    if app.follow_tail {
        app.table_scroll = max_scroll;
    } else {
        app.table_scroll = app.table_scroll.min(max_scroll);
    }

    let theme = &app.theme;

    let header_cells = app.columns.columns().iter().enumerate().map(|(i, column)| {
        let style = if i == app.focused_column && app.focus == Pane::PacketTable {
            Style::default()
                .fg(theme.text_accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(theme.table_header)
                .add_modifier(Modifier::BOLD)
        };
        Cell::from(column.header).style(style)
    });
    let header = Row::new(header_cells).height(1);

    // Only rows inside the window become widgets; the ones above the scroll
    // position are skipped again at draw time through the table offset.
    let range = app.table_layout.window(
        app.table_scroll as u64,
        visible_height as u64,
        DEFAULT_OVERSCAN,
    );
    // Each packet row renders one terminal line; report that back as the
    // measured height
    for i in range.clone() {
        app.table_layout.measure(i, 1);
    }
    let rows: Vec<Row> = range
        .clone()
        .filter_map(|i| app.session.store.get(i).map(|row| (i, row)))
        .map(|(i, row)| {
            let mut style = Style::default().fg(if row.dissected.is_some() {
                theme.protocol_color(&row.protocol)
            } else {
                theme.text_secondary
            });
            if i == app.table_cursor {
                style = style
                    .bg(theme.selected_row_background)
                    .add_modifier(Modifier::BOLD);
            }
            let cells = app
                .columns
                .columns()
                .iter()
                .map(|column| Cell::from(column.value(row, i)));
            Row::new(cells)
                .style(style)
                .height(app.table_layout.height_of(i) as u16)
        })
        .collect();

    let focused_header = app
        .columns
        .get(app.focused_column)
        .map(|c| c.header)
        .unwrap_or_default();
    let title = format!(
        "Packets ({}/{}) - Col: {} (</> resize{})",
        total,
        app.session.store.total(),
        focused_header,
        if app.follow_tail { ", following" } else { "" }
    );

    let table = Table::new(rows, app.columns.constraints())
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title.as_str())
                .border_type(BorderType::Rounded)
                .border_style(match app.focus {
                    Pane::PacketTable => Style::default().fg(theme.border_focused),
                    _ => Style::default().fg(theme.border_normal),
                }),
        )
        .style(Style::default().bg(theme.background));

    let mut state = TableState::default().with_offset(app.table_scroll - range.start);
    f.render_stateful_widget(table, area, &mut state);

    // Thumb geometry is in the layout's extent units, not row counts
    let extent = app.table_layout.total_extent() as usize;
    if extent > visible_height {
        let position = app.table_layout.offset_of(app.table_scroll) as usize;
        render_scrollbar(f, area, extent, position, visible_height, theme);
    }
}

fn render_field_tree<B: CaptureBackend>(f: &mut Frame, area: Rect, app: &mut App<B>) {
    let theme = &app.theme;
    let Some(detail) = &app.session.detail else {
        return;
    };

    let visible_height = area.height.saturating_sub(2) as usize;
    app.tree_visible = visible_height;
    app.tree_area = Some(Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    });

    let total = detail.tree.len();
    app.tree_cursor = app.tree_cursor.min(total.saturating_sub(1));
    let max_scroll = total.saturating_sub(visible_height);
    app.tree_scroll = app.tree_scroll.min(max_scroll);

    let selected_range = app.session.selection.range();
    let lines: Vec<Line> = detail
        .tree
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let indent = "  ".repeat(row.depth);
            let mut style = if row.is_layer {
                Style::default()
                    .fg(theme.text_accent)
                    .add_modifier(Modifier::BOLD)
            } else if row.range.is_some() {
                Style::default().fg(theme.text_primary)
            } else {
                Style::default().fg(theme.text_secondary)
            };
            let is_selected_field = selected_range
                .zip(row.range)
                .is_some_and(|(sel, (offset, length))| sel.intersects(offset, length));
            if is_selected_field {
                style = style
                    .fg(theme.selection_foreground)
                    .bg(theme.selection_background);
            }
            if i == app.tree_cursor && app.focus == Pane::DetailTree {
                style = style.bg(theme.selected_row_background);
            }
            Line::from(vec![
                Span::raw(indent),
                Span::styled(row.label.clone(), style),
            ])
        })
        .collect();

    let start = app.tree_scroll;
    let end = (start + visible_height).min(total);
    let visible_lines: Vec<Line> = if total == 0 {
        vec![Line::from(Span::styled(
            "No decoded fields for this packet",
            Style::default().fg(theme.text_secondary),
        ))]
    } else if start < total && visible_height > 0 {
        lines[start..end].to_vec()
    } else {
        Vec::new()
    };

    let title = format!(
        "Decoded - frame {} (j/k move, Enter highlight)",
        detail.frame_number
    );

    let paragraph = Paragraph::new(visible_lines)
        .style(Style::default().bg(theme.background))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_type(BorderType::Rounded)
                .border_style(match app.focus {
                    Pane::DetailTree => Style::default().fg(theme.border_focused),
                    _ => Style::default().fg(theme.border_normal),
                }),
        );

    f.render_widget(paragraph, area);

    if total > visible_height {
        render_scrollbar(f, area, total, app.tree_scroll, visible_height, theme);
    }
}

fn render_hex_dump<B: CaptureBackend>(f: &mut Frame, area: Rect, app: &mut App<B>) {
    let theme = &app.theme;
    let Some(detail) = &app.session.detail else {
        return;
    };
    let grid = &detail.grid;

    // Subtract 3 for the borders and the pinned ruler line
    let visible_height = area.height.saturating_sub(3) as usize;
    app.hex_visible = visible_height;
    app.hex_area = Some(Rect {
        x: area.x + 1,
        y: area.y + 2,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(3),
    });

    let total = grid.lines().len();
    let max_scroll = total.saturating_sub(visible_height);
    app.hex_scroll = app.hex_scroll.min(max_scroll);

    let mut lines = vec![ruler_line(theme)];
    let start = app.hex_scroll.min(total);
    let end = (start + visible_height).min(total);
    for line in &grid.lines()[start..end] {
        lines.push(hex_line(line, &app.session.selection, theme));
    }

    let mut title = if grid.is_empty() {
        "Hex Dump - no data".to_string()
    } else {
        format!(
            "Hex Dump - {} bytes, lines {}-{}/{}",
            grid.total_bytes(),
            start + 1,
            end,
            total
        )
    };
    if let Some(sel) = app.session.selection.range() {
        if let (Some(cell), Some(ascii)) = (grid.cell_at(sel.start), grid.ascii_at(sel.start)) {
            title.push_str(&format!(
                " | sel {}+{} = 0x{} '{}'",
                sel.start, sel.length, cell.text, ascii.ch
            ));
        }
    }

    let paragraph = Paragraph::new(lines)
        .style(Style::default().bg(theme.background))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_type(BorderType::Rounded)
                .border_style(match app.focus {
                    Pane::HexDump => Style::default().fg(theme.border_focused),
                    _ => Style::default().fg(theme.border_normal),
                }),
        );

    f.render_widget(paragraph, area);

    if total > visible_height {
        render_scrollbar(f, area, total, app.hex_scroll, visible_height, theme);
    }
}

fn ruler_line(theme: &Theme) -> Line<'static> {
    let mut ruler = String::new();
    for i in 0..BYTES_PER_LINE {
        while ruler.len() < hex_column(i) {
            ruler.push(' ');
        }
        ruler.push_str(&format!("{:02X}", i));
    }
    while ruler.len() < ASCII_FIELD_START {
        ruler.push(' ');
    }
    ruler.push_str("ASCII");
    Line::from(Span::styled(
        ruler,
        Style::default()
            .fg(theme.table_header)
            .add_modifier(Modifier::BOLD),
    ))
}

/// One rendered hex-dump line. Every hex and ascii cell gets its own span so
/// the highlight can follow the selected byte range exactly; a separator
/// between two highlighted cells is highlighted too, which keeps a selected
/// run looking contiguous.
fn hex_line<'a>(line: &HexLine, selection: &Selection, theme: &Theme) -> Line<'a> {
    let normal = Style::default().fg(theme.text_primary);
    let marked = Style::default()
        .fg(theme.selection_foreground)
        .bg(theme.selection_background);

    let mut spans = vec![Span::styled(
        format!("{}  ", line.offset_label),
        Style::default().fg(theme.text_secondary),
    )];

    for (i, cell) in line.cells.iter().enumerate() {
        if i > 0 {
            let gap = if i == 8 { "  " } else { " " };
            let joined = selection.is_highlighted(cell.position)
                && selection.is_highlighted(cell.position - 1);
            spans.push(Span::styled(gap, if joined { marked } else { normal }));
        }
        let style = if selection.is_highlighted(cell.position) {
            marked
        } else {
            normal
        };
        spans.push(Span::styled(cell.text.clone(), style));
    }

    if let Some(last) = line.cells.len().checked_sub(1) {
        let col = hex_column(last) + 2;
        spans.push(Span::raw(" ".repeat(ASCII_FIELD_START.saturating_sub(col))));
    }

    for cell in &line.ascii {
        let style = if selection.is_highlighted(cell.position) {
            marked
        } else {
            Style::default().fg(theme.text_accent)
        };
        spans.push(Span::styled(cell.ch.to_string(), style));
    }

    Line::from(spans)
}

fn render_status_bar<B: CaptureBackend>(f: &mut Frame, area: Rect, app: &App<B>) {
    let theme = &app.theme;

    let hints = match app.screen {
        Screen::Devices => "q quit | ↑/↓ select | Enter start | r rescan | h help",
        Screen::Inspect => {
            "q quit | Tab pane | Enter select | s stop | c clear | d devices | h help"
        }
    };

    let mut spans = vec![Span::raw(format!("KEYS: {}", hints))];
    if !app.session.status.is_empty() {
        spans.push(Span::raw(" | "));
        let style = if app.session.status_error {
            Style::default()
                .fg(theme.status_error)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        spans.push(Span::styled(app.session.status.clone(), style));
    }

    let bar = Paragraph::new(Line::from(spans))
        .style(Style::default().bg(theme.header_bg).fg(theme.header_fg));
    f.render_widget(bar, area);
}

fn render_help<B: CaptureBackend>(f: &mut Frame, area: Rect, app: &App<B>) {
    let theme = &app.theme;

    let section = |text: &'static str| {
        Line::from(vec![Span::styled(
            text,
            Style::default()
                .fg(theme.table_header)
                .add_modifier(Modifier::BOLD),
        )])
    };

    let mut help_text = vec![
        Line::from(vec![Span::styled(
            "Wirescope Help",
            Style::default()
                .fg(theme.text_accent)
                .add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        section("Navigation:"),
        Line::from("  Tab        - Cycle: Packet Table → Decoded Fields → Hex Dump"),
        Line::from("  ↑/k        - Move selection up or scroll the focused pane"),
        Line::from("  ↓/j        - Move selection down or scroll the focused pane"),
        Line::from("  PgUp/PgDn  - Page up/down in the focused pane"),
        Line::from("  Home/End   - Jump to top/bottom of the focused pane"),
        Line::from("  Enter      - Select packet (table) or highlight field bytes (tree)"),
        Line::from("  Esc        - Clear the byte highlight"),
        Line::from(""),
    ];

    if app.mouse_enabled {
        help_text.extend_from_slice(&[
            section("Mouse Support:"),
            Line::from("  Click      - Select a packet row or a decoded field"),
            Line::from("  Drag       - Sweep a byte range across the hex dump"),
            Line::from("  Scroll wheel - Scroll the pane under the pointer"),
            Line::from("  Note: Use --no-mouse flag to disable mouse support"),
            Line::from(""),
        ]);
    }

    help_text.extend_from_slice(&[
        section("Capture:"),
        Line::from("  d          - Open the interface picker"),
        Line::from("  Enter      - Start capturing on the highlighted interface"),
        Line::from("  r          - Rescan interfaces (picker open)"),
        Line::from("  s          - Stop the running capture (rows are kept)"),
        Line::from("  c          - Clear all captured packets"),
        Line::from("  f          - Toggle follow mode (stick to newest packets)"),
        Line::from(""),
        section("Columns:"),
        Line::from("  ←/→        - Choose the active table column"),
        Line::from("  < or -     - Narrow the active column"),
        Line::from("  > or +     - Widen the active column"),
        Line::from("  Note: Columns never drop below their minimum width;"),
        Line::from("        the Info column always takes the leftover space"),
        Line::from(""),
        section("General:"),
        Line::from("  h/F1       - Show/hide this help"),
        Line::from("  q          - Close help or quit application"),
        Line::from(""),
        section("Notes:"),
        Line::from("  • Packet rows stream in while a capture is running"),
        Line::from("  • Stopping a capture keeps rows and details readable"),
        Line::from("  • Fields without byte offsets cannot be highlighted"),
    ]);

    let help_paragraph = Paragraph::new(help_text)
        .style(Style::default().fg(theme.text_primary).bg(theme.background))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(theme.border_normal)),
        )
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(help_paragraph, area);
}

fn render_scrollbar(
    f: &mut Frame,
    area: Rect,
    total_items: usize,
    scroll_offset: usize,
    visible_items: usize,
    theme: &Theme,
) {
    if total_items <= visible_items {
        return;
    }

    let scrollbar_area = Rect {
        x: area.x + area.width - 1,
        y: area.y + 1, // Skip top border
        width: 1,
        height: area.height.saturating_sub(2), // Skip top and bottom borders
    };

    let scrollbar_height = scrollbar_area.height as usize;
    let thumb_size = (visible_items * scrollbar_height / total_items).max(1);

    let max_scroll_offset = total_items.saturating_sub(visible_items);
    let thumb_position = if max_scroll_offset == 0 {
        0
    } else {
        let max_thumb_position = scrollbar_height.saturating_sub(thumb_size);
        (scroll_offset.min(max_scroll_offset) * max_thumb_position) / max_scroll_offset
    };

    for y in 0..scrollbar_height {
        let cell_area = Rect {
            x: scrollbar_area.x,
            y: scrollbar_area.y + y as u16,
            width: 1,
            height: 1,
        };

        let on_thumb = y >= thumb_position && y < thumb_position + thumb_size;
        let symbol = if on_thumb { "█" } else { "░" };
        let style = if on_thumb {
            Style::default().fg(theme.border_focused)
        } else {
            Style::default().fg(theme.border_normal)
        };

        f.render_widget(Paragraph::new(symbol).style(style), cell_area);
    }
}
