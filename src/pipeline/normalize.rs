// Duration normalization: force a raw capture to exactly the length the
// tempo and bar count dictate, by truncating excess samples or appending
// silence. Results are memoized per (capture, target length) because
// re-encoding is not byte-stable; normalizing the same capture twice must
// return the identical blob.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use crate::audio::{CaptureId, StereoFrame};
use crate::error::DecodeError;

pub struct Normalizer {
    cache: HashMap<(CaptureId, u64), Arc<Vec<u8>>>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Decode `wav`, trim or zero-pad every channel to
    /// `round(sample_rate * expected_sec)` frames, and re-encode. Repeating
    /// the same capture + duration returns the cached blob untouched.
    pub fn normalize(
        &mut self,
        id: CaptureId,
        wav: &[u8],
        expected_sec: f64,
    ) -> Result<Arc<Vec<u8>>, DecodeError> {
        let mut reader = hound::WavReader::new(Cursor::new(wav))?;
        let spec = reader.spec();
        let target_frames = (spec.sample_rate as f64 * expected_sec).round() as u64;

        let key = (id, target_frames);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }

        let channels = spec.channels as usize;
        let mut interleaved = samples;
        let target_len = target_frames as usize * channels;
        if interleaved.len() > target_len {
            interleaved.truncate(target_len);
        } else {
            interleaved.resize(target_len, 0.0);
        }

        let out_spec = hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut out = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut out, out_spec)?;
            for s in &interleaved {
                writer.write_sample(*s)?;
            }
            writer.finalize()?;
        }

        let blob = Arc::new(out.into_inner());
        self.cache.insert(key, blob.clone());
        Ok(blob)
    }
}

/// Encode a captured frame buffer as a mono 32-bit float WAV blob — the
/// transport format for everything downstream (normalizer, analysis upload).
pub fn encode_wav_mono(frames: &[StereoFrame], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut out = Cursor::new(Vec::new());
    {
        // writing to an in-memory cursor can't fail
        let mut writer = hound::WavWriter::new(&mut out, spec).expect("wav header");
        for f in frames {
            writer.write_sample(f.mono()).expect("wav sample");
        }
        writer.finalize().expect("wav finalize");
    }
    out.into_inner()
}

/// Decoded frame count of a WAV blob; used by tests and the min-size guard
/// diagnostics.
pub fn decoded_len(wav: &[u8]) -> Result<u64, DecodeError> {
    let reader = hound::WavReader::new(Cursor::new(wav))?;
    Ok(reader.duration() as u64)
}
