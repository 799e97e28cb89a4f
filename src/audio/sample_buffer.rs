use std::path::Path;

use super::frame::StereoFrame;

#[derive(Clone, Debug)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>,
}

impl SampleBuffer {
    // Load a WAV file from disk, converting to stereo f32 at the engine rate.
    pub fn load_wav(path: &Path, target_rate: u32) -> anyhow::Result<Self> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let file_rate = spec.sample_rate;
        let file_channels = spec.channels;

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

        let mut frames: Vec<StereoFrame> = if file_channels == 1 {
            samples.into_iter().map(StereoFrame::splat).collect()
        } else {
            samples
                .chunks_exact(file_channels as usize)
                .map(|c| StereoFrame {
                    left: c[0],
                    right: if c.len() > 1 { c[1] } else { c[0] },
                })
                .collect()
        };

        if file_rate != target_rate {
            frames = resample_linear(&frames, file_rate, target_rate);
        }

        Ok(Self { data: frames })
    }

    pub fn from_frames(data: Vec<StereoFrame>) -> Self {
        Self { data }
    }
}

fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;
        if idx >= frames.len().saturating_sub(1) {
            out.push(*frames.last().unwrap_or(&StereoFrame::zero()));
        } else {
            let a = frames[idx];
            let b = frames[idx + 1];
            out.push(StereoFrame {
                left: a.left * (1.0 - frac) + b.left * frac,
                right: a.right * (1.0 - frac) + b.right * frac,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_halves_length_when_downsampling_by_two() {
        let frames: Vec<StereoFrame> = (0..100)
            .map(|i| StereoFrame::splat(i as f32 / 100.0))
            .collect();
        let out = resample_linear(&frames, 88200, 44100);
        assert_eq!(out.len(), 50);
    }

    #[test]
    fn resample_is_identity_at_equal_rates() {
        let frames = vec![StereoFrame::splat(0.5); 10];
        let out = resample_linear(&frames, 44100, 44100);
        assert_eq!(out.len(), 10);
    }
}
