use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Chat(event) => app.handle_chat_event(event),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // An alert blocks everything until it is dismissed
    if app.conversation.alert().is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            app.conversation.dismiss_alert();
        }
        return;
    }

    if app.show_upload_prompt {
        handle_upload_prompt(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.cursor = app.conversation.draft.chars().count();
        }
        KeyCode::Char('u') => app.open_upload_prompt(),
        KeyCode::Char('v') => app.conversation.start_voice(),

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    let draft = &mut app.conversation.draft;
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => app.send_draft(),
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(draft, app.cursor);
                draft.remove(byte_pos);
            } else if draft.is_empty() {
                app.conversation.clear_pending_file();
            }
        }
        KeyCode::Delete => {
            let char_count = draft.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(draft, app.cursor);
                draft.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = draft.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = draft.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(draft, app.cursor);
            draft.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn handle_upload_prompt(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_upload_prompt(),
        KeyCode::Enter => app.submit_upload(),
        KeyCode::Backspace => {
            if app.upload_cursor > 0 {
                app.upload_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.upload_input, app.upload_cursor);
                app.upload_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.upload_cursor = app.upload_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.upload_input.chars().count();
            app.upload_cursor = (app.upload_cursor + 1).min(char_count);
        }
        KeyCode::Home => app.upload_cursor = 0,
        KeyCode::End => app.upload_cursor = app.upload_input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.upload_input, app.upload_cursor);
            app.upload_input.insert(byte_pos, c);
            app.upload_cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::test_app;
    use crate::conversation::{ChatEvent, VOICE_UNAVAILABLE};
    use crate::upload::UploadAck;
    use crate::voice::SpeechCapability;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 0), 0);
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("héllo", 10), 6);
    }

    #[test]
    fn test_typing_and_enter_sends() {
        let (mut app, transport, _) = test_app(SpeechCapability::Unavailable);
        type_text(&mut app, "fix my loop");
        assert_eq!(app.conversation.draft, "fix my loop");

        handle_event(&mut app, key(KeyCode::Enter));

        assert!(app.conversation.draft.is_empty());
        assert_eq!(transport.emitted().len(), 1);
        assert_eq!(transport.emitted()[0].1["message"], "fix my loop");
    }

    #[test]
    fn test_cursor_editing_is_utf8_safe() {
        let (mut app, _, _) = test_app(SpeechCapability::Unavailable);
        type_text(&mut app, "añb");
        handle_event(&mut app, key(KeyCode::Left));
        handle_event(&mut app, key(KeyCode::Backspace));
        assert_eq!(app.conversation.draft, "ab");

        handle_event(&mut app, key(KeyCode::Home));
        type_text(&mut app, "é");
        assert_eq!(app.conversation.draft, "éab");
        assert_eq!(app.cursor, 1);
    }

    #[test]
    fn test_ctrl_c_quits_from_any_mode() {
        let (mut app, _, _) = test_app(SpeechCapability::Unavailable);
        handle_event(
            &mut app,
            AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        );
        assert!(app.should_quit);
    }

    #[test]
    fn test_normal_mode_keys() {
        let (mut app, _, _) = test_app(SpeechCapability::Unavailable);
        handle_event(&mut app, key(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);

        handle_event(&mut app, key(KeyCode::Char('u')));
        assert!(app.show_upload_prompt);
        handle_event(&mut app, key(KeyCode::Esc));
        assert!(!app.show_upload_prompt);

        handle_event(&mut app, key(KeyCode::Char('i')));
        assert_eq!(app.input_mode, InputMode::Editing);
        type_text(&mut app, "q");
        assert!(!app.should_quit);

        handle_event(&mut app, key(KeyCode::Esc));
        handle_event(&mut app, key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn test_alert_swallows_keys_until_dismissed() {
        let (mut app, _, _) = test_app(SpeechCapability::Unavailable);
        handle_event(&mut app, key(KeyCode::Esc));
        handle_event(&mut app, key(KeyCode::Char('v')));
        assert_eq!(app.conversation.alert(), Some(VOICE_UNAVAILABLE));

        handle_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.should_quit);
        assert!(app.conversation.alert().is_some());

        handle_event(&mut app, key(KeyCode::Enter));
        assert_eq!(app.conversation.alert(), None);
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn test_upload_prompt_selects_file() {
        let (mut app, transport, _) = test_app(SpeechCapability::Unavailable);
        handle_event(&mut app, key(KeyCode::Esc));
        handle_event(&mut app, key(KeyCode::Char('u')));
        type_text(&mut app, "/tmp/solver.py");
        handle_event(&mut app, key(KeyCode::Enter));

        assert!(!app.show_upload_prompt);
        assert_eq!(app.conversation.pending_file(), Some("solver.py"));

        handle_event(
            &mut app,
            AppEvent::Chat(ChatEvent::UploadFinished {
                file_name: "solver.py".to_string(),
                result: Ok(UploadAck {
                    ok: true,
                    filename: Some("solver.py".to_string()),
                    error: None,
                }),
            }),
        );
        assert_eq!(transport.emitted().len(), 1);
    }

    #[tokio::test]
    async fn test_backspace_on_empty_draft_drops_pending_file() {
        let (mut app, _, _) = test_app(SpeechCapability::Unavailable);
        app.conversation.select_file("/tmp/notes.txt".into());
        assert!(app.conversation.pending_file().is_some());

        handle_event(&mut app, key(KeyCode::Backspace));
        assert_eq!(app.conversation.pending_file(), None);
    }

    #[test]
    fn test_mouse_scroll_only_inside_chat() {
        let (mut app, _, _) = test_app(SpeechCapability::Unavailable);
        app.update_chat_viewport(Rect::new(0, 1, 40, 12), 38, 10, 30);
        assert_eq!(app.chat_scroll, 20);

        let wheel = |row| {
            AppEvent::Mouse(MouseEvent {
                kind: MouseEventKind::ScrollUp,
                column: 5,
                row,
                modifiers: KeyModifiers::NONE,
            })
        };
        handle_event(&mut app, wheel(30));
        assert_eq!(app.chat_scroll, 20);

        handle_event(&mut app, wheel(4));
        assert_eq!(app.chat_scroll, 17);
    }
}
