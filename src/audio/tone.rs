use super::frame::StereoFrame;

const RELEASE_FRAMES: u32 = 220; // ~5ms at 44.1k, enough to avoid a click

/// A synthesized pitched voice: a decaying sine plus two quieter harmonics,
/// held for a fixed duration then faded out. Used for chords, melody notes
/// and the metronome click, so playback needs no instrument sample assets.
#[derive(Clone, Copy, Debug)]
pub struct ToneVoice {
    phase: f32,
    phase_inc: f32,
    amp: f32,
    decay: f32,
    remaining: u32, // frames until release starts
    release: u32,   // frames of fade-out left once remaining hits zero
    pub active: bool,
}

impl ToneVoice {
    pub fn new(freq: f32, duration_sec: f64, gain: f32, sample_rate: f32) -> Self {
        let frames = (duration_sec * sample_rate as f64).max(0.0) as u32;
        Self {
            phase: 0.0,
            phase_inc: (std::f32::consts::TAU * freq) / sample_rate,
            amp: gain,
            // tuned so a held note rings without vanishing before its slot ends
            decay: 0.99996,
            remaining: frames,
            release: RELEASE_FRAMES,
            active: true,
        }
    }

    pub fn render_into(&mut self, out: &mut [StereoFrame], offset: usize) {
        if !self.active {
            return;
        }
        for frame in out.iter_mut().skip(offset) {
            if !self.active {
                break;
            }
            let s = self.amp
                * (self.phase.sin()
                    + 0.35 * (2.0 * self.phase).sin()
                    + 0.15 * (3.0 * self.phase).sin());
            frame.left += s;
            frame.right += s;

            self.phase += self.phase_inc;
            if self.phase > std::f32::consts::TAU {
                self.phase -= std::f32::consts::TAU;
            }
            self.amp *= self.decay;

            if self.remaining > 0 {
                self.remaining -= 1;
            } else if self.release > 0 {
                // linear fade over the release window
                self.amp *= 1.0 - 1.0 / self.release as f32;
                self.release -= 1;
            } else {
                self.active = false;
            }
            if self.amp < 0.0002 {
                self.active = false;
            }
        }
    }
}
