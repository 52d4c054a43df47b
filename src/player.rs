use std::{
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread,
    time::Duration,
};

use rodio::{decoder::DecoderError, Decoder, OutputStream, OutputStreamBuilder, Sink, StreamError};

use crate::{audio::TempAudioFile, communication::PlayRequest, log_sink::LogSink};

/// how often running sinks are checked for completion
pub const BUSY_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("couldn't open audio output: {0}")]
    Output(#[from] StreamError),
    #[error("couldn't open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("couldn't decode clip: {0}")]
    Decode(#[from] DecoderError),
    #[error("the playback engine has stopped")]
    Stopped,
}

/// Handle to the playback thread.
///
/// The thread is the only owner of the output stream, so firings that overlap
/// never touch the audio device concurrently. Each clip gets its own sink on the
/// shared mixer and plays until it is empty.
#[derive(Debug, Clone)]
pub struct PlaybackEngine {
    sender: Sender<PlayRequest>,
}

struct Playing {
    sink: Sink,
    label: String,
    // dropped after the sink, removes the file
    _file: TempAudioFile,
}

impl PlaybackEngine {
    /// # Errors
    /// if the playback thread can't be started
    pub fn spawn(log: LogSink) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || run(&receiver, &log))?;
        Ok(Self { sender })
    }

    #[cfg(test)]
    pub(crate) const fn from_sender(sender: Sender<PlayRequest>) -> Self {
        Self { sender }
    }

    /// queues a clip, returns as soon as the engine has it
    ///
    /// # Errors
    /// if the engine thread is gone, the clip is dropped (and its file removed)
    pub fn play(&self, request: PlayRequest) -> Result<(), PlaybackError> {
        self.sender.send(request).map_err(|_| PlaybackError::Stopped)
    }
}

fn run(receiver: &Receiver<PlayRequest>, log: &LogSink) {
    let mut output: Option<OutputStream> = None;
    let mut playing: Vec<Playing> = Vec::new();
    let mut disconnected = false;
    loop {
        playing.retain(|clip| {
            if clip.sink.empty() {
                log.info(format!("finished playing audio for {}", clip.label));
                false
            } else {
                true
            }
        });
        if playing.is_empty() {
            if disconnected {
                break;
            }
            // nothing playing, give the device back
            output = None;
        }
        if disconnected {
            thread::sleep(BUSY_POLL);
            continue;
        }
        match receiver.recv_timeout(BUSY_POLL) {
            Ok(request) => {
                let label = request.label.clone();
                match start(&mut output, request) {
                    Ok(clip) => {
                        log.info(format!("playing audio for {label}"));
                        playing.push(clip);
                    }
                    Err(e) => log.error(format!("error playing audio for {label}: {e}")),
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => disconnected = true,
        }
    }
}

fn start(output: &mut Option<OutputStream>, request: PlayRequest) -> Result<Playing, PlaybackError> {
    let stream = match output.take() {
        Some(stream) => stream,
        None => open_output()?,
    };
    let stream = output.insert(stream);

    let path = request.file.path();
    let file = File::open(path).map_err(|source| PlaybackError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let source = Decoder::new(BufReader::new(file))?;
    let sink = Sink::connect_new(stream.mixer());
    sink.append(source);
    sink.play();
    Ok(Playing {
        sink,
        label: request.label,
        _file: request.file,
    })
}

fn open_output() -> Result<OutputStream, StreamError> {
    let mut stream = OutputStreamBuilder::open_default_stream()?;
    stream.log_on_drop(false);
    Ok(stream)
}
