// The external analysis service boundary. The server takes a normalized
// capture plus tempo/bar_count as multipart form data and answers with
// either labeled rhythm segments or a per-sixteenth pitch series.

use serde::Deserialize;

use crate::error::AnalysisError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RhythmMethod {
    /// Onset-energy segmentation (`analyze` endpoint).
    Energy,
    /// Classifier inference (`predict` endpoint).
    Classifier,
}

impl RhythmMethod {
    pub fn endpoint(self) -> &'static str {
        match self {
            RhythmMethod::Energy => "analyze",
            RhythmMethod::Classifier => "predict",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "energy" => Some(RhythmMethod::Energy),
            "classifier" => Some(RhythmMethod::Classifier),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RhythmSegment {
    pub label: String,
    pub start: f64,
    pub end: f64,
}

/// One step of the melody pitch series. Every field is optional; the
/// recorder fills in defaults when mapping into Segments.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PitchPoint {
    pub hz: Option<f64>,
    pub note: Option<String>,
    pub label: Option<String>,
    pub confidence: Option<f64>,
    pub rms: Option<f64>,
    pub confidence_rms: Option<f64>,
}

#[derive(Deserialize)]
struct RhythmResponse {
    segments: Vec<RhythmSegment>,
}

#[derive(Deserialize)]
struct PitchResponse {
    pitch_series: Vec<PitchPoint>,
}

pub trait AnalysisClient: Send + Sync {
    fn analyze_rhythm(
        &self,
        wav: &[u8],
        tempo: f64,
        bar_count: u32,
        method: RhythmMethod,
    ) -> Result<Vec<RhythmSegment>, AnalysisError>;

    fn analyze_melody(
        &self,
        wav: &[u8],
        tempo: f64,
        bar_count: u32,
    ) -> Result<Vec<PitchPoint>, AnalysisError>;
}

pub struct HttpAnalysisClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn post_capture(
        &self,
        endpoint: &str,
        wav: &[u8],
        tempo: f64,
        bar_count: u32,
    ) -> Result<reqwest::blocking::Response, AnalysisError> {
        let part = reqwest::blocking::multipart::Part::bytes(wav.to_vec())
            .file_name("capture.wav")
            .mime_str("audio/wav")
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("tempo", tempo.to_string())
            .text("bar_count", bar_count.to_string());

        let res = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .multipart(form)
            .send()?;
        if !res.status().is_success() {
            return Err(AnalysisError::Status(res.status().as_u16()));
        }
        Ok(res)
    }
}

impl AnalysisClient for HttpAnalysisClient {
    fn analyze_rhythm(
        &self,
        wav: &[u8],
        tempo: f64,
        bar_count: u32,
        method: RhythmMethod,
    ) -> Result<Vec<RhythmSegment>, AnalysisError> {
        let res = self.post_capture(method.endpoint(), wav, tempo, bar_count)?;
        let body: RhythmResponse = res
            .json()
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;
        Ok(body.segments)
    }

    fn analyze_melody(
        &self,
        wav: &[u8],
        tempo: f64,
        bar_count: u32,
    ) -> Result<Vec<PitchPoint>, AnalysisError> {
        let res = self.post_capture("pitch", wav, tempo, bar_count)?;
        let body: PitchResponse = res
            .json()
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;
        Ok(body.pitch_series)
    }
}
