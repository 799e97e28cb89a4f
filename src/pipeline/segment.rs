// The shared value type for one labeled time slice of audio, plus the store
// holding the current rhythm and melody tracks. Lists are replaced wholesale
// on every new analysis; individual segments are only ever patched in place
// by the editor surface, never deleted.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::shared::Mode;

use super::note;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub label: String,
    pub start: f64, // seconds, end > start; one track's segments are contiguous
    pub end: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>, // "C4" / "rest" for melodic segments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_rms: Option<f64>,
}

/// Index-based partial update from the segment editor. Only set fields are
/// applied.
#[derive(Clone, Debug, Default)]
pub struct SegmentPatch {
    pub label: Option<String>,
    pub note: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SegmentStore {
    pub rhythm: Vec<Segment>,
    pub melody: Vec<Segment>,
}

impl SegmentStore {
    pub fn new_shared() -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn replace(&mut self, mode: Mode, segments: Vec<Segment>) {
        match mode {
            Mode::Rhythm => self.rhythm = segments,
            Mode::Melody => self.melody = segments,
        }
    }

    pub fn track(&self, mode: Mode) -> &[Segment] {
        match mode {
            Mode::Rhythm => &self.rhythm,
            Mode::Melody => &self.melody,
        }
    }

    pub fn update(&mut self, mode: Mode, index: usize, patch: SegmentPatch) {
        let track = match mode {
            Mode::Rhythm => &mut self.rhythm,
            Mode::Melody => &mut self.melody,
        };
        let Some(seg) = track.get_mut(index) else {
            return;
        };
        if let Some(label) = patch.label {
            seg.label = label;
        }
        if let Some(n) = patch.note {
            seg.note = Some(n);
        }
    }

    /// The melody track as per-step labels for the quantizer. Anything that
    /// isn't a well-formed pitch name becomes a rest, so analyzer error
    /// placeholders can't leak into playback.
    pub fn raw_melody(&self) -> Vec<String> {
        self.melody
            .iter()
            .map(|seg| match &seg.note {
                Some(n) if note::parse(n).is_some() => n.clone(),
                _ => "rest".to_string(),
            })
            .collect()
    }
}
