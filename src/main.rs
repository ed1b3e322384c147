use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

mod app;
mod config;
mod conversation;
mod error;
mod handler;
mod logging;
mod markdown;
mod transport;
mod tui;
mod ui;
mod upload;
mod voice;

use app::App;
use config::Config;
use conversation::Conversation;
use transport::SocketIoTransport;
use tui::EventHandler;
use upload::UploadClient;
use voice::SpeechCapability;

#[tokio::main]
async fn main() -> Result<()> {
    let log_path = logging::configure_logging()?;
    let config = Config::load()?;
    info!(server = %config.server_url, log = %log_path.display(), "Starting CodeGenie");

    let transport = Arc::new(SocketIoTransport::spawn(&config.server_url)?);
    let uploader = UploadClient::new(&config.upload_url());
    info!(url = %uploader.url(), "Uploads enabled");
    let speech = SpeechCapability::resolve(config.speech_command.as_deref(), &config.speech_language);
    if !speech.is_available() {
        info!("No speech command configured, voice input disabled");
    }

    let (chat_tx, chat_rx) = mpsc::unbounded_channel();
    let mut conversation = Conversation::new(
        transport.clone(),
        uploader,
        speech,
        config.settle_delay(),
        chat_tx,
    );
    conversation.mount();

    let mut app = App::new(conversation);
    let mut events = EventHandler::new(chat_rx);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &mut app, &mut events).await;

    app.conversation.unmount();
    transport.close().await;
    tui::restore()?;

    if let Err(e) = &result {
        warn!(error = %e, "Exited with error");
    }
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
