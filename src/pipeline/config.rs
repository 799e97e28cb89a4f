// App configuration: the analysis server location, the rhythm analysis
// method, and the count-in latency calibration. Loaded from
// <dir>/.looplab/config.json when present, otherwise defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const LOOPLAB_DIR: &str = ".looplab";
const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the analysis service.
    pub api_base_url: String,

    /// "energy" or "classifier"; which rhythm endpoint to hit.
    pub rhythm_method: String,

    /// Count-in timing compensation, in beats per BPM above 60. Playback
    /// devices add their own output latency before the click is audible, so
    /// the wait before capture opens shrinks slightly as tempo rises. This
    /// is hardware-dependent; calibrate per setup rather than trusting the
    /// default.
    pub latency_slope: f64,

    /// Count-in length in beats, including the fraction that absorbs the
    /// fixed part of the device delay.
    pub count_in_beats: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000".to_string(),
            rhythm_method: "energy".to_string(),
            latency_slope: 0.005,
            count_in_beats: 4.1,
        }
    }
}

fn config_file_path(dir: &Path) -> PathBuf {
    dir.join(LOOPLAB_DIR).join(CONFIG_FILE)
}

pub fn load_config(dir: &Path) -> Config {
    let path = config_file_path(dir);
    match std::fs::read_to_string(&path) {
        Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
            log::warn!("ignoring malformed {}: {e}", path.display());
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

// Write the config back, creating .looplab/ if needed.
pub fn save_config(dir: &Path, config: &Config) -> anyhow::Result<()> {
    let path = config_file_path(dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

impl Config {
    /// Seconds to wait between the first click and opening the capture:
    /// the count-in minus the tempo-scaled device latency.
    pub fn count_in_delay(&self, tempo: f64) -> f64 {
        let beat = 60.0 / tempo;
        beat * (self.count_in_beats - self.latency_slope * (tempo - 60.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_file_exists() {
        let cfg = load_config(Path::new("/nonexistent/definitely/not/here"));
        assert_eq!(cfg.rhythm_method, "energy");
        assert!((cfg.latency_slope - 0.005).abs() < 1e-12);
    }

    #[test]
    fn count_in_shrinks_as_tempo_rises() {
        let cfg = Config::default();
        // at 60 bpm the slope term vanishes: exactly count_in_beats beats
        assert!((cfg.count_in_delay(60.0) - 4.1).abs() < 1e-9);
        assert!(cfg.count_in_delay(180.0) < cfg.count_in_delay(120.0));
    }
}
