//! Keyboard reader thread
//!
//! Polls the terminal for key presses and forwards the ones that map to a
//! [`Command`] over a channel, so the session loop never blocks on input.

use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use alt_session::{ChannelCommands, Command, ShutdownToken};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Start the reader thread and return the command source it feeds
///
/// The thread exits once `token` is cancelled, the receiving side is
/// dropped, or the terminal cannot be read.
pub fn spawn(token: ShutdownToken) -> (ChannelCommands, Option<JoinHandle<()>>) {
    let (tx, commands) = ChannelCommands::channel();
    let handle = thread::Builder::new()
        .name("keyboard".to_string())
        .spawn(move || read_keys(tx, token))
        .map_err(|e| tracing::warn!("Keyboard input unavailable: {}", e))
        .ok();

    (commands, handle)
}

fn read_keys(tx: Sender<Command>, token: ShutdownToken) {
    while token.is_running() {
        match event::poll(POLL_INTERVAL) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => {
                tracing::debug!("Stopped reading keyboard: {}", e);
                return;
            }
        }

        let key = match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("Stopped reading keyboard: {}", e);
                return;
            }
        };

        if let KeyCode::Char(c) = key.code {
            if let Some(command) = Command::from_key(c) {
                if tx.send(command).is_err() {
                    return;
                }
            }
        }
    }
}
