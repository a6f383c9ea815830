//! Quality gate for reference voice clips.
//!
//! Voice cloning needs a clean, reasonably short sample. The checks run as a
//! fail-fast ladder, so the first failing check decides the message:
//!
//! 1. duration below the minimum (2 s)
//! 2. duration above the maximum (30 s)
//! 3. sample rate below 16 kHz
//! 4. peak amplitude below 0.01 (silent or too quiet)
//!
//! Clips may be WAV, MP3 or FLAC. Passing the gate does not guarantee good
//! cloning, it only filters out obviously unusable clips before the
//! expensive synthesis step.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::default::formats::{FlacReader, MpaReader};

/// Message returned for an accepted sample.
pub const ACCEPTED_MESSAGE: &str = "Audio quality validated";

/// Limits applied by [`AudioValidator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationThresholds {
    pub min_duration_secs: f64,
    /// Recommended ceiling; longer clips are still rejected.
    pub max_duration_secs: f64,
    pub min_sample_rate: u32,
    /// Peak absolute amplitude with samples normalised to [-1, 1].
    pub min_peak: f32,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_duration_secs: 2.0,
            max_duration_secs: 30.0,
            min_sample_rate: 16_000,
            min_peak: 0.01,
        }
    }
}

/// Measurements taken from a reference voice clip.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSample {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub peak: f32,
}

/// Why a voice clip was turned down. `Display` is the user-facing message.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("Audio too short ({duration:.1}s). Need at least {min} seconds.")]
    TooShort { duration: f64, min: f64 },
    #[error("Audio too long ({duration:.1}s). Recommended max {max} seconds.")]
    TooLong { duration: f64, max: f64 },
    #[error("Sample rate too low ({rate}Hz). Need at least {}kHz.", khz(.min))]
    LowSampleRate { rate: u32, min: u32 },
    #[error("Audio appears to be silent or too quiet.")]
    Silent { peak: f32 },
    #[error("Validation error: {0}")]
    Unreadable(String),
}

fn khz(hz: &u32) -> f64 {
    *hz as f64 / 1000.0
}

/// Checks reference clips against [`ValidationThresholds`].
#[derive(Debug, Clone, Default)]
pub struct AudioValidator {
    thresholds: ValidationThresholds,
}

impl AudioValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: ValidationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ValidationThresholds {
        &self.thresholds
    }

    /// Validate a clip, returning whether it is usable and a message.
    ///
    /// Never fails: unreadable files come back as `(false, "Validation error: ...")`.
    pub fn validate(&self, path: &Path) -> (bool, String) {
        match self.inspect(path) {
            Ok(_) => (true, ACCEPTED_MESSAGE.to_string()),
            Err(rejection) => {
                if let Rejection::Unreadable(_) = rejection {
                    log::error!("Error validating audio {}: {rejection}", path.display());
                } else {
                    log::info!("Voice sample {} rejected: {rejection}", path.display());
                }
                (false, rejection.to_string())
            }
        }
    }

    /// Measure a clip and run the check ladder.
    pub fn inspect(&self, path: &Path) -> Result<VoiceSample, Rejection> {
        let sample = read_sample(path).map_err(|e| Rejection::Unreadable(e.to_string()))?;
        self.check(&sample)?;
        Ok(sample)
    }

    /// Run the check ladder on already measured values.
    pub fn check(&self, sample: &VoiceSample) -> Result<(), Rejection> {
        let t = &self.thresholds;
        if sample.duration_secs < t.min_duration_secs {
            return Err(Rejection::TooShort {
                duration: sample.duration_secs,
                min: t.min_duration_secs,
            });
        }
        if sample.duration_secs > t.max_duration_secs {
            return Err(Rejection::TooLong {
                duration: sample.duration_secs,
                max: t.max_duration_secs,
            });
        }
        if sample.sample_rate < t.min_sample_rate {
            return Err(Rejection::LowSampleRate {
                rate: sample.sample_rate,
                min: t.min_sample_rate,
            });
        }
        if sample.peak < t.min_peak {
            return Err(Rejection::Silent { peak: sample.peak });
        }
        Ok(())
    }
}

/// Validate a clip with the default thresholds.
pub fn validate_voice_sample(path: &Path) -> (bool, String) {
    AudioValidator::new().validate(path)
}

#[derive(thiserror::Error, Debug)]
enum ReadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Wav(#[from] hound::Error),
    #[error(transparent)]
    Decode(#[from] symphonia::core::errors::Error),
    #[error("{0}")]
    Format(&'static str),
}

/// Measure a clip. WAV goes through `hound`; FLAC and MP3 are decoded with
/// `symphonia`. Anything else is read as MPEG audio and fails there.
fn read_sample(path: &Path) -> Result<VoiceSample, ReadError> {
    match &magic(path)? {
        b"RIFF" => read_wav(path),
        b"fLaC" => read_compressed::<FlacReader>(path),
        _ => read_compressed::<MpaReader>(path),
    }
}

/// First four bytes of the file, zero-filled when it is shorter.
fn magic(path: &Path) -> std::io::Result<[u8; 4]> {
    let mut magic = [0u8; 4];
    let mut file = std::fs::File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok([0; 4]),
        Err(e) => Err(e),
    }
}

fn read_wav(path: &Path) -> Result<VoiceSample, ReadError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(ReadError::Format("sample rate is zero"));
    }
    // Frames, i.e. samples per channel.
    let frames = reader.duration();

    let peak = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .try_fold(0f32, |peak, s| s.map(|v| peak.max(v.abs())))?,
        hound::SampleFormat::Int => {
            let full_scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            let peak = reader
                .samples::<i32>()
                .try_fold(0u32, |peak, s| s.map(|v| peak.max(v.unsigned_abs())))?;
            peak as f32 / full_scale
        }
    };

    Ok(VoiceSample {
        path: path.to_path_buf(),
        sample_rate: spec.sample_rate,
        duration_secs: frames as f64 / spec.sample_rate as f64,
        peak,
    })
}

fn read_compressed<R: FormatReader>(path: &Path) -> Result<VoiceSample, ReadError> {
    let src = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());
    let mut format = R::try_new(mss, &FormatOptions::default())?;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(ReadError::Format("no decodable audio track"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut frames = 0u64;
    let mut peak = 0f32;
    let mut buffer: Option<SampleBuffer<f32>> = None;
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("Skipping undecodable packet in {}: {e}", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        frames += decoded.frames() as u64;
        let buffer = buffer.get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
        buffer.copy_interleaved_ref(decoded);
        peak = buffer.samples().iter().fold(peak, |peak, s| peak.max(s.abs()));
    }

    if sample_rate == 0 {
        return Err(ReadError::Format("sample rate is unknown"));
    }
    Ok(VoiceSample {
        path: path.to_path_buf(),
        sample_rate,
        duration_secs: frames as f64 / sample_rate as f64,
        peak,
    })
}
