use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::App;
use crate::state::Role;
use crate::toast::Severity;

const MAX_INPUT_LINES: u16 = 5;
const TOAST_WIDTH: u16 = 48;

/// Parse a line of model output, styling **bold** and `code` spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        let (marker, style) = if rest.starts_with("**") {
            ("**", Style::default().add_modifier(Modifier::BOLD))
        } else if rest.starts_with('`') {
            ("`", Style::default().fg(Color::Magenta))
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                plain.push(c);
            }
            rest = chars.as_str();
            continue;
        };

        let after_open = &rest[marker.len()..];
        match after_open.find(marker) {
            Some(end) if end > 0 => {
                if !plain.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut plain)));
                }
                spans.push(Span::styled(after_open[..end].to_string(), style));
                rest = &after_open[end + marker.len()..];
            }
            // Unclosed or empty marker, keep it literal
            _ => {
                plain.push_str(marker);
                rest = after_open;
            }
        }
    }

    if !plain.is_empty() {
        spans.push(Span::raw(plain));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let input_lines = (app.session.pending_input.split('\n').count() as u16).clamp(1, MAX_INPUT_LINES);

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_lines + 2),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
    render_toasts(app, frame, chat_area);

    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Gemini Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("Powered by Google Gemini API · {} ", app.model),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Indexed(54)));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Indexed(61)));
    let inner = block.inner(area);

    if app.session.conversation.is_empty() && !app.session.awaiting_response {
        app.set_chat_layout(0, inner.height);
        let hint = Text::from(vec![
            Line::default(),
            Line::from(Span::styled("Start a conversation!", Style::default().fg(Color::Gray).bold())),
            Line::from(Span::styled(
                "Type your message below and press Enter.",
                Style::default().fg(Color::DarkGray),
            )),
        ]);
        frame.render_widget(Paragraph::new(hint).alignment(Alignment::Center).block(block), area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();

    for msg in app.session.conversation.messages() {
        let label = msg.role.display_name();
        match msg.role {
            Role::User => {
                lines.push(
                    Line::from(Span::styled(label, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)))
                        .alignment(Alignment::Right),
                );
                for line in msg.text.split('\n') {
                    lines.push(Line::from(line.to_string()).alignment(Alignment::Right));
                }
            }
            Role::Model => {
                lines.push(Line::from(Span::styled(
                    label,
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                for line in msg.text.split('\n') {
                    lines.push(parse_markdown_line(line));
                }
            }
            Role::Error => {
                lines.push(Line::from(Span::styled(
                    label,
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )));
                for line in msg.text.split('\n') {
                    lines.push(Line::from(Span::styled(line.to_string(), Style::default().fg(Color::Red))));
                }
            }
        }
        lines.push(Line::default());
    }

    if app.session.awaiting_response {
        lines.push(Line::from(Span::styled(
            Role::Model.display_name(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Gemini is thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    // Count with the same word wrapping the paragraph renders with
    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    let total_lines = chat.line_count(inner.width).min(u16::MAX as usize) as u16;
    app.set_chat_layout(total_lines, inner.height);

    frame.render_widget(chat.block(block).scroll((app.chat_scroll, 0)), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let awaiting = app.session.awaiting_response;

    let (title, border_color) = if awaiting {
        (" Waiting for Gemini... ", Color::DarkGray)
    } else if app.shift_enter_newline {
        (" Message (Enter to send, Shift+Enter for newline) ", Color::Yellow)
    } else {
        (" Message (Enter to send, Alt+Enter for newline) ", Color::Yellow)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let (cursor_line, cursor_col) = app.cursor_position();

    // Keep the cursor line and column inside the box
    let line_offset = (cursor_line + 1).saturating_sub(inner_height);
    let col_offset = if inner_width == 0 {
        0
    } else {
        (cursor_col + 1).saturating_sub(inner_width)
    };

    let visible: Vec<Line> = app
        .session
        .pending_input
        .split('\n')
        .skip(line_offset)
        .take(inner_height)
        .map(|line| Line::from(line.chars().skip(col_offset).take(inner_width).collect::<String>()))
        .collect();

    let text_style = if awaiting {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };

    frame.render_widget(Paragraph::new(visible).style(text_style).block(block), area);

    if !awaiting && !app.show_api_key_input {
        frame.set_cursor_position((
            area.x + 1 + cursor_col.saturating_sub(col_offset) as u16,
            area.y + 1 + cursor_line.saturating_sub(line_offset) as u16,
        ));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().fg(Color::Cyan);
    let hint_style = Style::default().fg(Color::DarkGray);

    let hints = Line::from(vec![
        Span::styled(" Enter", key_style),
        Span::styled(" send  ", hint_style),
        Span::styled("PgUp/PgDn", key_style),
        Span::styled(" scroll  ", hint_style),
        Span::styled("Ctrl+K", key_style),
        Span::styled(" API key  ", hint_style),
        Span::styled("Esc", key_style),
        Span::styled(" quit", hint_style),
        Span::styled(
            format!("  {} messages", app.session.conversation.len()),
            hint_style,
        ),
    ]);

    frame.render_widget(Paragraph::new(hints), area);
}

/// Stack active toasts in the bottom-right corner of `area`, newest lowest
fn render_toasts(app: &App, frame: &mut Frame, area: Rect) {
    let width = TOAST_WIDTH.min(area.width.saturating_sub(2));
    if width < 4 {
        return;
    }

    let mut bottom = area.y + area.height.saturating_sub(1);
    for toast in app.session.toasts.active().iter().rev() {
        let text_width = (width - 2) as usize;
        let text_lines = toast.message.chars().count().div_ceil(text_width).max(1) as u16;
        let height = text_lines + 2;
        if bottom < area.y + height {
            break;
        }

        let toast_area = Rect::new(area.x + area.width - width - 1, bottom - height, width, height);
        bottom -= height;

        let color = match toast.severity {
            Severity::Info => Color::Blue,
            Severity::Success => Color::Green,
            Severity::Error => Color::Red,
        };

        frame.render_widget(Clear, toast_area);
        let widget = Paragraph::new(toast.message.as_str())
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color)));
        frame.render_widget(widget, toast_area);
    }
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 7;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height.min(area.height));

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Gemini API Key ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);
    if inner.height < 5 {
        return;
    }

    let instructions = Paragraph::new("Paste your API key. Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);

    // Show only the last 4 characters of the key
    let char_count = app.api_key_input.chars().count();
    let display_text = if char_count <= 4 {
        "*".repeat(char_count)
    } else {
        let masked_len = char_count - 4;
        let last_four: String = app.api_key_input.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    };
    let display_width = display_text.chars().count();

    frame.render_widget(
        Paragraph::new(display_text).style(Style::default().fg(Color::Cyan)),
        input_area,
    );
    let cursor_x = display_width.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let status = Paragraph::new(format!("{} characters · stored in your config directory", char_count))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 1));
}
