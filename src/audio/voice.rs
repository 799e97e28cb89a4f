use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

/// One-shot playback of a registered sample buffer. No looping, no retrigger;
/// a voice plays its buffer once and goes inactive.
#[derive(Clone, Debug)]
pub struct SampleVoice {
    pos: usize,
    gain: f32,
    pub active: bool,
}

impl SampleVoice {
    pub fn new(gain: f32) -> Self {
        Self {
            pos: 0,
            gain,
            active: true,
        }
    }

    /// Mix this voice into `out`, starting at frame `offset` within the
    /// block (sample-accurate onsets within a render quantum).
    pub fn render_into(&mut self, buffer: &SampleBuffer, out: &mut [StereoFrame], offset: usize) {
        if !self.active {
            return;
        }
        let data = &buffer.data;
        for frame in out.iter_mut().skip(offset) {
            match data.get(self.pos) {
                Some(s) => {
                    frame.left += s.left * self.gain;
                    frame.right += s.right * self.gain;
                    self.pos += 1;
                }
                None => {
                    self.active = false;
                    break;
                }
            }
        }
        if self.pos >= data.len() {
            self.active = false;
        }
    }
}
