use std::{io, path::PathBuf, sync::Arc, thread};

use crate::{
    alarm::AlarmSpec,
    audio::{AudioError, PreloadedAudio},
    communication::{CountdownRequest, CountdownSender, PlayRequest},
    log_sink::LogSink,
    player::{PlaybackEngine, PlaybackError},
    trigger::AlarmHandler,
};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("no audio was preloaded")]
    NoAudio,
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error("couldn't start the audio thread: {0}")]
    Spawn(io::Error),
    #[error("the countdown window is gone")]
    Countdown,
}

/// Starts the audio tail and the on screen countdown for a fired alarm.
///
/// The two run independently: audio is prepared on its own thread and played by the
/// [`PlaybackEngine`], the countdown is drawn by the gui thread. A failure in one is
/// logged and leaves the other running.
pub struct Coordinator {
    audio: Option<Arc<PreloadedAudio>>,
    engine: PlaybackEngine,
    countdowns: CountdownSender,
    log: LogSink,
    temp_dir: PathBuf,
}

impl Coordinator {
    #[must_use]
    pub fn new(
        audio: Option<Arc<PreloadedAudio>>,
        engine: PlaybackEngine,
        countdowns: CountdownSender,
        log: LogSink,
    ) -> Self {
        Self {
            audio,
            engine,
            countdowns,
            log,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// where the trimmed clips are exported to
    #[must_use]
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    /// # Errors
    /// if the countdown couldn't be handed to the gui, audio problems are only logged
    pub fn play_and_count_down(
        &self,
        alarm: &AlarmSpec,
        countdown_seconds: u32,
    ) -> Result<(), CoordinatorError> {
        let label = alarm.to_string();
        if let Err(e) = self.spawn_audio(label.clone(), countdown_seconds) {
            self.log
                .error(format!("error in audio playback for {label}: {e}"));
        }
        self.countdowns
            .send(CountdownRequest {
                seconds: countdown_seconds,
                label,
            })
            .map_err(|_| CoordinatorError::Countdown)
    }

    fn spawn_audio(&self, label: String, countdown_seconds: u32) -> Result<(), CoordinatorError> {
        let audio = self.audio.clone();
        let engine = self.engine.clone();
        let log = self.log.clone();
        let temp_dir = self.temp_dir.clone();
        thread::Builder::new()
            .name(format!("audio {label}"))
            .spawn(move || {
                if let Err(e) =
                    play_tail(audio.as_deref(), countdown_seconds, &temp_dir, &engine, &label, &log)
                {
                    log.error(format!("error playing preloaded audio for {label}: {e}"));
                }
            })
            .map_err(CoordinatorError::Spawn)?;
        Ok(())
    }
}

fn play_tail(
    audio: Option<&PreloadedAudio>,
    countdown_seconds: u32,
    temp_dir: &std::path::Path,
    engine: &PlaybackEngine,
    label: &str,
    log: &LogSink,
) -> Result<(), CoordinatorError> {
    let audio = audio.ok_or(CoordinatorError::NoAudio)?;
    let clip = audio.tail(countdown_seconds);
    if clip.clamped() {
        log.warn(format!(
            "{countdown_seconds}s countdown is longer than the {}ms clip, playing all of it",
            audio.duration_ms()
        ));
    }
    if clip.is_empty() {
        log.info(format!("nothing left of the clip to play for {label}"));
        return Ok(());
    }
    let file = clip.export(temp_dir)?;
    engine.play(PlayRequest {
        file,
        label: label.to_string(),
    })?;
    Ok(())
}

impl AlarmHandler for Coordinator {
    type Error = CoordinatorError;

    fn fire(&self, alarm: &AlarmSpec, countdown_seconds: u32) -> Result<(), Self::Error> {
        self.play_and_count_down(alarm, countdown_seconds)
    }
}
