use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::conversation::ChatEvent;

pub const LANGUAGE_ENV: &str = "CODEGENIE_SPEECH_LANG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    Transcript(String),
    Error(String),
    End,
}

/// Starts one capture session. Results are posted back as
/// [`ChatEvent::Voice`], always finishing with [`VoiceEvent::End`].
pub trait SpeechRecognizer: Send + Sync {
    fn start(&self, events: mpsc::UnboundedSender<ChatEvent>);
}

#[derive(Clone)]
pub enum SpeechCapability {
    Unavailable,
    Available(Arc<dyn SpeechRecognizer>),
}

impl SpeechCapability {
    /// Resolve from configuration. No command means no voice input.
    pub fn resolve(command: Option<&[String]>, language: &str) -> Self {
        match command {
            Some([program, args @ ..]) if !program.trim().is_empty() => {
                SpeechCapability::Available(Arc::new(CommandRecognizer {
                    program: program.clone(),
                    args: args.to_vec(),
                    language: language.to_string(),
                }))
            }
            _ => SpeechCapability::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, SpeechCapability::Available(_))
    }
}

/// Runs an external dictation command and takes the first non-empty line
/// of its stdout as the transcript.
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    language: String,
}

impl SpeechRecognizer for CommandRecognizer {
    fn start(&self, events: mpsc::UnboundedSender<ChatEvent>) {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env(LANGUAGE_ENV, &self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        let program = self.program.clone();

        tokio::spawn(async move {
            debug!(%program, "Starting dictation");
            match command.output().await {
                Ok(output) if output.status.success() => {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    if let Some(line) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
                        let _ = events.send(ChatEvent::Voice(VoiceEvent::Transcript(line.to_string())));
                    }
                }
                Ok(output) => {
                    warn!(%program, status = %output.status, "Dictation command failed");
                    let _ = events.send(ChatEvent::Voice(VoiceEvent::Error(format!(
                        "{} exited with {}",
                        program, output.status
                    ))));
                }
                Err(e) => {
                    warn!(%program, error = %e, "Could not run dictation command");
                    let _ = events.send(ChatEvent::Voice(VoiceEvent::Error(e.to_string())));
                }
            }
            let _ = events.send(ChatEvent::Voice(VoiceEvent::End));
        });
    }
}
