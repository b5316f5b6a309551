use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block as Panel, Borders, Clear, Paragraph, Wrap},
};
use opschat_core::{Block, ChatMessage, Inline, Markup, QuickAction, Sender};
use crate::app::{App, InputMode, SettingsField};

/// Colors for the light and dark variants of the interface
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub muted: Color,
    pub header_bg: Color,
    pub user: Color,
    pub agent: Color,
    pub code: Color,
    pub link: Color,
    pub border: Color,
}

impl Theme {
    pub fn new(dark_mode: bool) -> Self {
        if dark_mode {
            Self {
                bg: Color::Black,
                fg: Color::Gray,
                muted: Color::DarkGray,
                header_bg: Color::DarkGray,
                user: Color::Cyan,
                agent: Color::Yellow,
                code: Color::LightMagenta,
                link: Color::LightBlue,
                border: Color::DarkGray,
            }
        } else {
            Self {
                bg: Color::Reset,
                fg: Color::Reset,
                muted: Color::Gray,
                header_bg: Color::Blue,
                user: Color::Blue,
                agent: Color::Magenta,
                code: Color::Red,
                link: Color::Blue,
                border: Color::Gray,
            }
        }
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let theme = Theme::new(app.dark_mode());

    frame.render_widget(Panel::default().style(Style::default().bg(theme.bg).fg(theme.fg)), area);

    // Main layout: header, transcript, input, footer
    let input_height = (app.input.split('\n').count() as u16 + 2).clamp(3, 8);
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area, &theme);
    render_chat(app, frame, chat_area, &theme);
    render_input(app, frame, input_area, &theme);
    render_footer(app, frame, footer_area, &theme);

    // Popups
    if app.settings.is_some() {
        render_settings(app, frame, area, &theme);
    }
    if app.notice.is_some() {
        render_notice(app, frame, area, &theme);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let config = app.session.config();
    let topic = config.topic_name.as_deref().unwrap_or("any pipeline");

    let title = Line::from(vec![
        Span::styled(" Pipeline Agent ", Style::default().fg(Color::White).bold()),
        Span::styled(
            format!(" {} · last {}h ", topic, config.lookback_hours),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::White).add_modifier(Modifier::DIM),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(theme.header_bg));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect, theme: &Theme) {
    // Store area for mouse hit-testing and scroll calculations (inner size minus borders)
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Panel::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .title(format!(" {} ", app.client.chat_url()));

    let messages = app.session.transcript().messages();
    let text = if messages.is_empty() {
        Text::from(Span::styled(
            "Ask about a pipeline, or press F1-F3 for a quick action...",
            Style::default().fg(theme.muted),
        ))
    } else {
        let mut lines: Vec<Line<'static>> = Vec::new();
        for msg in messages {
            lines.extend(message_lines(msg, theme, app.animation_frame));
            lines.push(Line::default());
        }
        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn message_lines(msg: &ChatMessage, theme: &Theme, animation_frame: u8) -> Vec<Line<'static>> {
    let color = match msg.sender {
        Sender::User => theme.user,
        Sender::Agent => theme.agent,
    };
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("{}:", msg.sender.display_name()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {}", msg.timestamp.format("%H:%M")),
            Style::default().fg(theme.muted),
        ),
    ])];

    if msg.typing {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Analyzing{}", dots),
            Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC),
        )));
        return lines;
    }

    match msg.sender {
        Sender::User => lines.extend(msg.text.split('\n').map(|l| Line::from(l.to_string()))),
        Sender::Agent => lines.extend(markup_lines(&msg.markup, theme)),
    }
    lines
}

/// Lay rendered markup out as terminal lines. Each `Break` ends a line;
/// a list occupies its own lines, so the break that follows it is absorbed.
pub fn markup_lines(markup: &Markup, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut after_list = false;

    for block in &markup.blocks {
        match block {
            Block::Header(inlines) => {
                let header_style = Style::default().fg(theme.agent).add_modifier(Modifier::BOLD);
                current.extend(inline_spans(inlines, theme, header_style));
                after_list = false;
            }
            Block::Line(inlines) => {
                current.extend(inline_spans(inlines, theme, Style::default()));
                after_list = false;
            }
            Block::List(items) => {
                if !current.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current)));
                }
                for item in items {
                    let mut spans = vec![Span::styled("  • ", Style::default().fg(theme.agent))];
                    spans.extend(inline_spans(item, theme, Style::default()));
                    lines.push(Line::from(spans));
                }
                after_list = true;
            }
            Block::Break => {
                if after_list {
                    after_list = false;
                } else {
                    lines.push(Line::from(std::mem::take(&mut current)));
                }
            }
        }
    }

    if !current.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

fn inline_spans(inlines: &[Inline], theme: &Theme, base: Style) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) => spans.push(Span::styled(text.clone(), base)),
            Inline::Code(code) => spans.push(Span::styled(code.clone(), base.fg(theme.code))),
            Inline::Bold(children) => {
                spans.extend(inline_spans(children, theme, base.add_modifier(Modifier::BOLD)))
            }
            Inline::Link(url) => spans.push(Span::styled(
                url.clone(),
                base.fg(theme.link).add_modifier(Modifier::UNDERLINED),
            )),
        }
    }
    spans
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if app.session.is_sending() {
        theme.muted
    } else if editing {
        Color::Yellow
    } else {
        theme.border
    };
    let title = if app.session.is_sending() {
        " Waiting for the agent... "
    } else {
        " Message (Enter to send, Shift+Enter for newline) "
    };

    let block = Panel::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Locate the cursor: row is the number of newlines before it, column the
    // chars since the last one
    let before: String = app.input.chars().take(app.input_cursor).collect();
    let cursor_row = before.matches('\n').count();
    let cursor_col = before.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0);

    // Keep the cursor visible with horizontal and vertical scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let col_offset = if inner_width > 0 && cursor_col >= inner_width {
        cursor_col - inner_width + 1
    } else {
        0
    };
    let row_offset = if inner_height > 0 && cursor_row >= inner_height {
        cursor_row - inner_height + 1
    } else {
        0
    };

    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(theme.user))
        .block(block)
        .scroll((row_offset as u16, col_offset as u16));
    frame.render_widget(input, area);

    if editing && app.settings.is_none() {
        frame.set_cursor_position((
            area.x + (cursor_col - col_offset) as u16 + 1,
            area.y + (cursor_row - row_offset) as u16 + 1,
        ));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(theme.fg);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (i, action) in QuickAction::all().iter().enumerate() {
        spans.push(Span::styled(format!(" F{} ", i + 1), key_style));
        spans.push(Span::styled(format!(" {} ", action.display_name()), label_style));
    }
    let common = match app.input_mode {
        InputMode::Normal => [(" j/k ", " scroll "), (" i ", " type "), (" q ", " quit ")],
        InputMode::Editing => [(" ^S ", " settings "), (" ^D ", " theme "), (" Esc ", " normal ")],
    };
    for (key, label) in common {
        spans.push(Span::styled(key, key_style));
        spans.push(Span::styled(label, label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_settings(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let Some(form) = &app.settings else {
        return;
    };

    let popup_area = centered_rect(64, 12, area);
    frame.render_widget(Clear, popup_area);

    let block = Panel::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(theme.bg))
        .title(" Settings ");

    let mut lines = vec![
        Line::from(Span::styled(
            "Tab to move, Space toggles, Enter to save, Esc to cancel.",
            Style::default().fg(theme.muted),
        )),
        Line::default(),
    ];
    for field in SettingsField::all() {
        let selected = field == form.field;
        let marker = if selected { "> " } else { "  " };
        let value_style = if selected {
            Style::default().fg(theme.user).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.fg)
        };
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Yellow)),
            Span::styled(format!("{:<18}", field.label()), Style::default().fg(theme.muted)),
            Span::styled(form.value(field), value_style),
        ]));
        lines.push(Line::default());
    }

    let body = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(body, popup_area);
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect, theme: &Theme) {
    let Some(notice) = &app.notice else {
        return;
    };

    let width = (notice.text.chars().count() as u16 + 4).min(area.width);
    let notice_area = Rect::new(area.right().saturating_sub(width + 1), area.y + 1, width, 3)
        .intersection(area);
    frame.render_widget(Clear, notice_area);

    let block = Panel::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .style(Style::default().bg(theme.bg));
    let text = Paragraph::new(notice.text.as_str())
        .style(Style::default().fg(Color::Green))
        .block(block);
    frame.render_widget(text, notice_area);
}

/// Centered popup of the given size, clipped to `area`
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opschat_core::{render as render_markup, KeyValueStore, MemoryStore};
    use ratatui::{backend::TestBackend, Terminal};

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn plain_lines(text: &str) -> Vec<String> {
        let theme = Theme::new(false);
        markup_lines(&render_markup(text), &theme)
            .iter()
            .map(line_text)
            .collect()
    }

    #[test]
    fn test_markup_lines_header_and_list() {
        let lines = plain_lines("1) Summary\n- ok\n- slow\nDone");
        assert_eq!(lines, vec!["1) Summary", "  • ok", "  • slow", "Done"]);
    }

    #[test]
    fn test_markup_lines_keep_blank_lines() {
        let lines = plain_lines("first\n\nsecond");
        assert_eq!(lines, vec!["first", "", "second"]);
    }

    #[test]
    fn test_markup_lines_style_inlines() {
        let theme = Theme::new(true);
        let lines = markup_lines(&render_markup("run `job` **now**"), &theme);
        assert_eq!(lines.len(), 1);

        let spans = &lines[0].spans;
        let code = spans.iter().find(|s| s.content == "job").unwrap();
        assert_eq!(code.style.fg, Some(theme.code));
        let bold = spans.iter().find(|s| s.content == "now").unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_markup_lines_nested_bold() {
        let theme = Theme::new(false);
        let lines = markup_lines(&render_markup("**Pipeline `etl` see https://x.io**"), &theme);
        assert_eq!(line_text(&lines[0]), "Pipeline etl see https://x.io");

        let spans = &lines[0].spans;
        assert!(spans
            .iter()
            .all(|s| s.style.add_modifier.contains(Modifier::BOLD)));
        let code = spans.iter().find(|s| s.content == "etl").unwrap();
        assert_eq!(code.style.fg, Some(theme.code));
        let link = spans.iter().find(|s| s.content == "https://x.io").unwrap();
        assert!(link.style.add_modifier.contains(Modifier::UNDERLINED));
    }

    #[test]
    fn test_centered_rect_fits_small_area() {
        let area = Rect::new(0, 0, 30, 8);
        let popup = centered_rect(64, 12, area);
        assert!(popup.width <= area.width);
        assert!(popup.height <= area.height);
    }

    #[tokio::test]
    async fn test_render_transcript_and_settings() {
        let mut store = MemoryStore::new();
        store.set("apiUrl", "http://127.0.0.1:1".to_string()).unwrap();
        let mut app = App::new(Box::new(store));
        app.input = "Analyze pipeline etl".to_string();
        app.submit_input();
        app.open_settings();
        app.show_notice("Configuration saved!");

        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(content.contains("Analyzing"));
        assert!(content.contains("Settings"));
        assert!(content.contains("Configuration saved!"));
        assert_eq!(app.chat_height, 30 - 1 - 3 - 1 - 2);
    }
}
