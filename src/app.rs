use std::path::PathBuf;

use ratatui::layout::Rect;
use tracing::debug;

use crate::conversation::{ChatEvent, Conversation};
use crate::voice::VoiceEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    /// Cursor position in the draft, in chars.
    pub cursor: usize,

    // Upload prompt state
    pub show_upload_prompt: bool,
    pub upload_input: String,
    pub upload_cursor: usize,

    // Chat viewport (updated during render)
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub chat_total_lines: u16,
    pub follow_tail: bool,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub conversation: Conversation,
    seen_revision: u64,
}

impl App {
    pub fn new(conversation: Conversation) -> Self {
        let seen_revision = conversation.revision();
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            cursor: 0,
            show_upload_prompt: false,
            upload_input: String::new(),
            upload_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_total_lines: 0,
            follow_tail: true,
            chat_area: None,
            animation_frame: 0,
            conversation,
            seen_revision,
        }
    }

    pub fn handle_chat_event(&mut self, event: ChatEvent) {
        let fills_draft = matches!(event, ChatEvent::Voice(VoiceEvent::Transcript(_)));
        self.conversation.handle(event);

        let draft_len = self.conversation.draft.chars().count();
        if fills_draft {
            self.cursor = draft_len;
        } else {
            self.cursor = self.cursor.min(draft_len);
        }
        self.sync_revision();
    }

    pub fn send_draft(&mut self) {
        if self.conversation.send() {
            self.cursor = 0;
            self.sync_revision();
        }
    }

    pub fn open_upload_prompt(&mut self) {
        self.show_upload_prompt = true;
        self.upload_input.clear();
        self.upload_cursor = 0;
    }

    pub fn close_upload_prompt(&mut self) {
        self.show_upload_prompt = false;
        self.upload_input.clear();
        self.upload_cursor = 0;
    }

    /// Start uploading the path typed into the prompt.
    pub fn submit_upload(&mut self) {
        let typed = self.upload_input.trim().to_string();
        self.close_upload_prompt();
        if typed.is_empty() {
            return;
        }
        let path = expand_home(&typed);
        debug!(path = %path.display(), "File selected");
        self.conversation.select_file(path);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        self.follow_tail = self.chat_scroll >= self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = self.chat_scroll >= self.max_scroll();
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_tail = self.max_scroll() == 0;
    }

    /// Keep the newest message in view from now on.
    pub fn scroll_to_bottom(&mut self) {
        self.follow_tail = true;
        self.chat_scroll = self.max_scroll();
    }

    pub fn max_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }

    /// Record the chat viewport measured by the last render.
    pub fn update_chat_viewport(&mut self, area: Rect, inner_width: u16, inner_height: u16, total_lines: u16) {
        self.chat_area = Some(area);
        self.chat_width = inner_width;
        self.chat_height = inner_height;
        self.chat_total_lines = total_lines;

        if self.follow_tail {
            self.chat_scroll = self.max_scroll();
        } else {
            self.chat_scroll = self.chat_scroll.min(self.max_scroll());
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.conversation.is_typing() || self.conversation.is_listening() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    fn sync_revision(&mut self) {
        let revision = self.conversation.revision();
        if revision != self.seen_revision {
            self.seen_revision = revision;
            self.scroll_to_bottom();
        }
    }
}

fn expand_home(typed: &str) -> PathBuf {
    if let Some(rest) = typed.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(typed)
}
