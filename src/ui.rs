use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, InputMode};
use crate::conversation::{ChatRole, Conversation};
use crate::markdown::render_markdown;
use unicode_width::UnicodeWidthChar;

const USER_LABEL_STYLE: Style = Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD);
const BOT_LABEL_STYLE: Style = Style::new().fg(Color::Magenta).add_modifier(Modifier::BOLD);

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if let Some(message) = app.conversation.alert() {
        render_alert(message, frame, area);
    } else if app.show_upload_prompt {
        render_upload_prompt(app, frame, area);
    }
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" 🧠 CodeGenie — AI Code Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Chat history as display lines, with the typing indicator last.
pub fn chat_lines(conversation: &Conversation, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in conversation.messages() {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled("You:", USER_LABEL_STYLE)));
                lines.extend(render_markdown(&msg.content));
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled("CodeGenie:", BOT_LABEL_STYLE)));
                lines.extend(render_markdown(&msg.content));
            }
        }
        lines.push(Line::default());
    }

    if conversation.is_typing() {
        lines.push(Line::from(Span::styled("CodeGenie:", BOT_LABEL_STYLE)));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("✨ CodeGenie is typing{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// The chat body, wrapped the same way for measuring and drawing.
fn chat_paragraph(lines: Vec<Line<'static>>) -> Paragraph<'static> {
    Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false })
}

/// Rows the lines take up once word-wrapped to `width` columns.
pub fn wrapped_height(lines: &[Line<'static>], width: u16) -> u16 {
    let rows = chat_paragraph(lines.to_vec()).line_count(width);
    rows.min(u16::MAX as usize) as u16
}

/// The part of `text` that fits in `width` columns with the cursor in view,
/// and the cursor's column inside it. `cursor` counts chars.
fn visible_window(text: &str, cursor: usize, width: usize) -> (String, u16) {
    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());
    let columns = |slice: &[char]| -> usize { slice.iter().map(|c| c.width().unwrap_or(0)).sum() };

    // Leave one cell free for the cursor itself
    let mut start = 0;
    while start < cursor && columns(&chars[start..cursor]) >= width {
        start += 1;
    }

    let mut visible = String::new();
    let mut used = 0;
    for c in &chars[start..] {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        visible.push(*c);
        used += w;
    }

    (visible, columns(&chars[start..cursor]) as u16)
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let lines = chat_lines(&app.conversation, app.animation_frame);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    let total = wrapped_height(&lines, inner_width);
    app.update_chat_viewport(area, inner_width, inner_height, total);

    let border_color = if app.input_mode == InputMode::Normal {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    let chat = chat_paragraph(lines)
        .block(chat_block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let conversation = &app.conversation;
    let editing = app.input_mode == InputMode::Editing;

    let (title, border_color) = if conversation.is_listening() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        (format!(" 🎙 Listening{} ", dots), Color::Red)
    } else if editing {
        (" Message (Enter to send, Esc for commands) ".to_string(), Color::Yellow)
    } else {
        (" Message (i to type) ".to_string(), Color::DarkGray)
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = visible_window(&conversation.draft, app.cursor, inner_width);

    let input = if conversation.draft.is_empty() {
        let placeholder = match conversation.pending_file() {
            Some(name) => format!("📎 {}", name),
            None => "Ask CodeGenie about your code...".to_string(),
        };
        Paragraph::new(placeholder).style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(visible_text).style(Style::default().fg(Color::Cyan))
    };

    frame.render_widget(input.block(input_block), area);

    // Show cursor when editing
    if editing && conversation.alert().is_none() && !app.show_upload_prompt {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    let hints = if app.conversation.alert().is_some() {
        " Enter/Esc: dismiss"
    } else if app.show_upload_prompt {
        " Enter: upload | Esc: cancel"
    } else {
        match app.input_mode {
            InputMode::Normal => " i: type | u: upload | v: voice | j/k: scroll | g/G: top/bottom | q: quit",
            InputMode::Editing => " Enter: send | Esc: commands | Ctrl+C: quit",
        }
    };

    let footer = Line::from(vec![
        Span::styled(mode_text, mode_style),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(footer), area);
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height);

    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;

    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

fn render_upload_prompt(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 64, 7);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Upload File ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Path of the file to upload. Enter to upload, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let (visible, cursor_x) =
        visible_window(&app.upload_input, app.upload_cursor, input_area.width as usize);
    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)),
        input_area,
    );

    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

fn render_alert(message: &str, frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 60, 8);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Alert ");

    let text = Text::from(vec![
        Line::from(message.to_string()),
        Line::default(),
        Line::from(Span::styled("Press Enter to dismiss", Style::default().fg(Color::DarkGray))),
    ]);

    let alert = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(alert, popup_area);
}
