// The smallest unit of audio; one stereo frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn splat(v: f32) -> Self {
        Self { left: v, right: v }
    }

    /// Collapse to mono; captures are stored and analyzed single-channel.
    pub fn mono(self) -> f32 {
        0.5 * (self.left + self.right)
    }
}
