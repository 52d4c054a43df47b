use std::sync::mpsc::{SendError, Sender};

use eframe::egui::Context;

use crate::audio::TempAudioFile;

/// ask the gui thread to show a fullscreen countdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownRequest {
    pub seconds: u32,
    pub label: String,
}

/// hand an exported clip to the playback engine
/// the file is removed once the request is dropped
#[derive(Debug)]
pub struct PlayRequest {
    pub file: TempAudioFile,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    Restore,
    Exit,
}

/// Sends countdown requests from any thread to the gui.
///
/// Every send also wakes the event loop so the request is picked up right away
/// even when nothing else is repainting.
#[derive(Debug, Clone)]
pub struct CountdownSender {
    sender: Sender<CountdownRequest>,
    ctx: Context,
}

impl CountdownSender {
    #[must_use]
    pub const fn new(sender: Sender<CountdownRequest>, ctx: Context) -> Self {
        Self { sender, ctx }
    }

    /// # Errors
    /// if the gui has already shut down
    pub fn send(&self, request: CountdownRequest) -> Result<(), SendError<CountdownRequest>> {
        self.sender.send(request)?;
        self.ctx.request_repaint();
        Ok(())
    }
}
