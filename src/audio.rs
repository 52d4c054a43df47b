use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use rodio::{decoder::DecoderError, Decoder, Source};

use crate::log_sink::LogSink;

/// the tail starts slightly after the exact boundary
pub const LEAD_IN_MS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("couldn't open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("couldn't decode audio: {0}")]
    Decode(#[from] DecoderError),
    #[error("{} contains no audio", .0.display())]
    Empty(PathBuf),
    #[error("couldn't export clip: {0}")]
    Export(#[from] hound::Error),
}

/// A fully decoded clip kept in memory for the lifetime of the process.
///
/// Samples are interleaved f32, shared between firings and never modified,
/// every firing derives its own [`Clip`].
#[derive(Debug, Clone)]
pub struct PreloadedAudio {
    channels: u16,
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl PreloadedAudio {
    /// # Errors
    /// if the file can't be opened or decoded
    pub fn load(path: &Path) -> Result<Self, AudioError> {
        let file = File::open(path).map_err(|source| AudioError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder = Decoder::new(BufReader::new(file))?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<f32> = decoder.collect();
        if samples.is_empty() {
            return Err(AudioError::Empty(path.to_path_buf()));
        }
        Ok(Self::from_samples(channels, sample_rate, samples))
    }

    /// loads the clip once at startup, a failure is logged and later
    /// firings just go without sound
    #[must_use]
    pub fn preload(path: &Path, log: &LogSink) -> Option<Arc<Self>> {
        match Self::load(path) {
            Ok(audio) => {
                log.info(format!(
                    "preloaded {} ({:.1}s, {} channel(s), {} Hz)",
                    path.display(),
                    audio.duration().as_secs_f64(),
                    audio.channels,
                    audio.sample_rate
                ));
                Some(Arc::new(audio))
            }
            Err(e) => {
                log.error(format!("error preloading audio: {e}"));
                None
            }
        }
    }

    #[must_use]
    pub fn from_samples(channels: u16, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            channels: channels.max(1),
            sample_rate: sample_rate.max(1),
            samples: samples.into(),
        }
    }

    #[must_use]
    pub const fn channels(&self) -> u16 {
        self.channels
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frames(&self) -> u64 {
        (self.samples.len() / usize::from(self.channels)) as u64
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms())
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.frames() * 1000 / u64::from(self.sample_rate)
    }

    /// the last `countdown_seconds` of the clip, minus the lead in
    #[must_use]
    pub fn tail(&self, countdown_seconds: u32) -> Clip {
        let requested = tail_start_ms(self.duration_ms(), countdown_seconds);
        // a countdown longer than the clip plays the whole clip
        let start_ms = u64::try_from(requested).unwrap_or(0);
        let start_frame = (start_ms * u64::from(self.sample_rate) / 1000).min(self.frames());
        let start_sample = usize::try_from(start_frame)
            .map_or(self.samples.len(), |frame| frame * usize::from(self.channels));
        Clip {
            channels: self.channels,
            sample_rate: self.sample_rate,
            samples: self.samples[start_sample..].to_vec(),
            start_ms,
            clamped: requested < 0,
        }
    }
}

/// where the tail of a clip of `total_ms` starts for a countdown of `countdown_seconds`
/// negative when the countdown is longer than the clip
#[must_use]
pub fn tail_start_ms(total_ms: u64, countdown_seconds: u32) -> i64 {
    i64::try_from(total_ms).unwrap_or(i64::MAX) - i64::from(countdown_seconds) * 1000 + LEAD_IN_MS
}

/// a trimmed copy of the preloaded audio, ready to be exported for playback
#[derive(Debug, Clone)]
pub struct Clip {
    channels: u16,
    sample_rate: u32,
    samples: Vec<f32>,
    start_ms: u64,
    clamped: bool,
}

impl Clip {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// offset into the preloaded audio this clip starts at
    #[must_use]
    pub const fn start_ms(&self) -> u64 {
        self.start_ms
    }

    /// true if the requested start was before the beginning of the audio
    #[must_use]
    pub const fn clamped(&self) -> bool {
        self.clamped
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() / usize::from(self.channels)) as u64 * 1000
            / u64::from(self.sample_rate)
    }

    /// writes the clip as 16 bit wav into a uniquely named file in `dir`
    ///
    /// # Errors
    /// if the file can't be written, a partially written file is removed again
    pub fn export(&self, dir: &Path) -> Result<TempAudioFile, AudioError> {
        let file = TempAudioFile::new_in(dir);
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(file.path(), spec)?;
        for &sample in &self.samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(file)
    }
}

/// A temporary audio file that is deleted when dropped.
///
/// Names are random so overlapping firings never share a file.
#[derive(Debug)]
pub struct TempAudioFile {
    path: PathBuf,
}

impl TempAudioFile {
    #[must_use]
    pub fn new_in(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("temp_audio_{}.wav", uuid::Uuid::new_v4())),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempAudioFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "couldn't remove temporary audio file {}: {e}",
                self.path.display()
            ),
        }
    }
}
