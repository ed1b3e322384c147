use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::UploadError;
use crate::transport::{events, ListenerId, Transport};
use crate::upload::{self, UploadAck, UploadClient};
use crate::voice::{SpeechCapability, VoiceEvent};

pub const GREETING: &str = "👋 **Hi! I'm CodeGenie — your AI coding assistant.**\n\nI can generate, debug, and explain your code.";

pub const VOICE_UNAVAILABLE: &str = "Speech recognition is not available. Set `speech_command` in the config file to enable it.";

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug)]
pub enum ChatEvent {
    /// Inbound `bot_response` text, not yet shown.
    BotResponse(String),
    /// Settle delay elapsed for a response.
    ResponseSettled(String),
    /// Inbound `error` event payload.
    TransportError(Value),
    UploadFinished {
        file_name: String,
        result: Result<UploadAck, UploadError>,
    },
    Voice(VoiceEvent),
}

/// Chat state, mutated only through `&mut self` on the event loop.
/// Listeners and background work post a [`ChatEvent`] back instead.
pub struct Conversation {
    pub draft: String,
    messages: Vec<ChatMessage>,
    pending_file: Option<String>,
    typing: bool,
    listening: bool,
    alert: Option<String>,
    revision: u64,
    listeners: Vec<ListenerId>,
    transport: Arc<dyn Transport>,
    uploader: UploadClient,
    speech: SpeechCapability,
    settle_delay: Duration,
    events: mpsc::UnboundedSender<ChatEvent>,
}

impl Conversation {
    pub fn new(
        transport: Arc<dyn Transport>,
        uploader: UploadClient,
        speech: SpeechCapability,
        settle_delay: Duration,
        events: mpsc::UnboundedSender<ChatEvent>,
    ) -> Self {
        Self {
            draft: String::new(),
            messages: vec![ChatMessage {
                role: ChatRole::Assistant,
                content: GREETING.to_string(),
            }],
            pending_file: None,
            typing: false,
            listening: false,
            alert: None,
            revision: 0,
            listeners: Vec::new(),
            transport,
            uploader,
            speech,
            settle_delay,
            events,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn pending_file(&self) -> Option<&str> {
        self.pending_file.as_deref()
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    /// Bumped on every change to the message sequence.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_mounted(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Register the transport listeners. Calling it twice is a no-op.
    pub fn mount(&mut self) {
        if self.is_mounted() {
            return;
        }

        let connect = self.transport.on(
            events::CONNECT,
            Arc::new(|_: Value| info!("Connected to backend")),
        );

        let tx = self.events.clone();
        let response = self.transport.on(
            events::BOT_RESPONSE,
            Arc::new(move |payload: Value| {
                let text = response_text(&payload);
                let _ = tx.send(ChatEvent::BotResponse(text));
            }),
        );

        let tx = self.events.clone();
        let error = self.transport.on(
            events::ERROR,
            Arc::new(move |payload: Value| {
                let _ = tx.send(ChatEvent::TransportError(payload));
            }),
        );

        self.listeners = vec![connect, response, error];
        debug!("Conversation mounted");
    }

    /// Deregister the transport listeners. The connection itself stays open.
    pub fn unmount(&mut self) {
        for id in self.listeners.drain(..) {
            self.transport.off(id);
        }
        debug!("Conversation unmounted");
    }

    /// Send the draft, or a marker for the pending file when the draft is
    /// blank. Returns false when there was nothing to send.
    pub fn send(&mut self) -> bool {
        let message = if !self.draft.trim().is_empty() {
            self.draft.clone()
        } else if let Some(name) = &self.pending_file {
            format!("📎 Uploaded: {}", name)
        } else {
            return false;
        };

        self.typing = true;
        self.push_message(ChatRole::User, message.clone());
        self.draft.clear();
        self.pending_file = None;

        if let Err(e) = self
            .transport
            .emit(events::USER_MESSAGE, json!({ "message": message }))
        {
            warn!(error = %e, "Failed to emit user message");
        }
        true
    }

    /// Start uploading `path`. The result comes back as
    /// [`ChatEvent::UploadFinished`].
    pub fn select_file(&mut self, path: PathBuf) {
        let file_name = upload::display_name(&path);
        self.pending_file = Some(file_name.clone());

        let uploader = self.uploader.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = uploader.upload(&path).await;
            let _ = tx.send(ChatEvent::UploadFinished { file_name, result });
        });
    }

    pub fn start_voice(&mut self) {
        match &self.speech {
            SpeechCapability::Unavailable => {
                self.alert = Some(VOICE_UNAVAILABLE.to_string());
            }
            SpeechCapability::Available(recognizer) => {
                if self.listening {
                    return;
                }
                self.listening = true;
                recognizer.start(self.events.clone());
            }
        }
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    /// Drop the pending file without sending anything.
    pub fn clear_pending_file(&mut self) {
        self.pending_file = None;
    }

    pub fn handle(&mut self, event: ChatEvent) {
        if !self.is_mounted() {
            debug!(?event, "Ignoring event while unmounted");
            return;
        }

        match event {
            ChatEvent::BotResponse(text) => {
                self.typing = true;
                if self.settle_delay.is_zero() {
                    self.reveal(text);
                } else {
                    let tx = self.events.clone();
                    let delay = self.settle_delay;
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(ChatEvent::ResponseSettled(text));
                    });
                }
            }
            ChatEvent::ResponseSettled(text) => self.reveal(text),
            ChatEvent::TransportError(payload) => {
                error!(%payload, "Socket error");
            }
            ChatEvent::UploadFinished { file_name, result } => {
                self.finish_upload(file_name, result);
            }
            ChatEvent::Voice(voice) => self.handle_voice(voice),
        }
    }

    fn reveal(&mut self, text: String) {
        self.push_message(ChatRole::Assistant, text);
        self.typing = false;
    }

    fn finish_upload(&mut self, file_name: String, result: Result<UploadAck, UploadError>) {
        match result {
            Ok(UploadAck { ok: true, filename, .. }) => {
                let name = filename.unwrap_or(file_name);
                info!(file = %name, "File uploaded");
                if let Err(e) = self.transport.emit(
                    events::USER_MESSAGE,
                    json!({ "message": format!("📄 File uploaded: {}", name) }),
                ) {
                    warn!(error = %e, "Failed to announce upload");
                }
            }
            Ok(UploadAck { error, .. }) => {
                let reason = error.unwrap_or_else(|| "unknown error".to_string());
                warn!(file = %file_name, %reason, "Upload rejected");
                self.pending_file = None;
                self.alert = Some(format!("File upload failed: {}", reason));
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "Upload failed");
                self.pending_file = None;
                self.alert = Some(format!("File upload failed: {}", e));
            }
        }
    }

    fn handle_voice(&mut self, event: VoiceEvent) {
        match event {
            VoiceEvent::Transcript(text) => {
                if self.listening {
                    self.draft = text;
                    self.listening = false;
                }
            }
            VoiceEvent::Error(reason) => {
                debug!(%reason, "Dictation error");
                self.listening = false;
            }
            VoiceEvent::End => self.listening = false,
        }
    }

    fn push_message(&mut self, role: ChatRole, content: String) {
        self.messages.push(ChatMessage { role, content });
        self.revision += 1;
    }
}

/// Pull the reply text out of a `bot_response` payload.
fn response_text(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.clone(),
        other => other
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}
