//! Engine configuration.
//!
//! All tunable parameters live in one owned struct. The controller mutates
//! it, the pattern builder and orchestrators read it, and every mutation
//! path rebuilds the derived state atomically so the active pattern never
//! drifts out of sync with the configuration.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Which synthesis path the engine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioMode {
    /// Log-spaced tone bank with slope-shaped gains.
    Tone,
    /// Looping sloped-noise buffer with notch filtering.
    ShapedNoise,
}

/// A user-placed frequency marker for custom pattern building.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionMarker {
    /// Spatial channel the marker belongs to.
    pub channel: usize,
    /// Marker frequency in Hz.
    pub freq_hz: f64,
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Active synthesis mode.
    pub mode: AudioMode,
    /// Mask center frequency in Hz (100-10000).
    pub center_freq_hz: f64,
    /// Mask bandwidth in octaves (0.1-4.0).
    pub bandwidth_octaves: f64,
    /// Number of spatial channels (1-5).
    pub channel_count: usize,
    /// Delay between per-channel burst onsets within a step, in ms (0-200).
    pub stagger_delay_ms: f64,
    /// Number of frequencies in the tone bank (10-500).
    pub frequency_count: usize,
    /// Delay between pattern steps in ms (50-2000).
    pub step_delay_ms: f64,
    /// Envelope attack time in ms (2-200).
    pub attack_ms: f64,
    /// Envelope release time in ms (2-200).
    pub release_ms: f64,
    /// Spectral slope applied to the tone bank in dB/octave.
    pub slope_db_per_octave: f64,
    /// Burst peak level for tone voices (0-1).
    pub tone_volume: f64,
    /// Burst peak level for noise voices (0-1).
    pub noise_volume: f64,
    /// Lower bound of the generated frequency set in Hz.
    pub min_freq_hz: f64,
    /// Upper bound of the generated frequency set in Hz.
    pub max_freq_hz: f64,
    /// Master seed for all per-voice random state.
    pub seed: u32,
    /// Optional user-placed frequency markers. Empty means uniform mode.
    pub custom_positions: Vec<PositionMarker>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: AudioMode::ShapedNoise,
            center_freq_hz: 500.0,
            bandwidth_octaves: 2.0,
            channel_count: 1,
            stagger_delay_ms: 50.0,
            frequency_count: 100,
            step_delay_ms: 500.0,
            attack_ms: 100.0,
            release_ms: 100.0,
            slope_db_per_octave: -4.5,
            tone_volume: 0.5,
            noise_volume: 1.0,
            min_freq_hz: 40.0,
            max_freq_hz: 14000.0,
            seed: 0,
            custom_positions: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Validates all parameters against their declared ranges.
    pub fn validate(&self) -> EngineResult<()> {
        range_check("center_freq_hz", self.center_freq_hz, 100.0, 10_000.0)?;
        range_check("bandwidth_octaves", self.bandwidth_octaves, 0.1, 4.0)?;
        count_check("channel_count", self.channel_count, 1, 5)?;
        range_check("stagger_delay_ms", self.stagger_delay_ms, 0.0, 200.0)?;
        count_check("frequency_count", self.frequency_count, 10, 500)?;
        range_check("step_delay_ms", self.step_delay_ms, 50.0, 2000.0)?;
        range_check("attack_ms", self.attack_ms, 2.0, 200.0)?;
        range_check("release_ms", self.release_ms, 2.0, 200.0)?;
        range_check("tone_volume", self.tone_volume, 0.0, 1.0)?;
        range_check("noise_volume", self.noise_volume, 0.0, 1.0)?;

        if !self.slope_db_per_octave.is_finite() {
            return Err(EngineError::invalid_param("slope_db_per_octave", "must be finite"));
        }
        if !(self.min_freq_hz.is_finite() && self.min_freq_hz > 0.0) {
            return Err(EngineError::invalid_param("min_freq_hz", "must be a positive frequency"));
        }
        if !self.max_freq_hz.is_finite() || self.max_freq_hz <= self.min_freq_hz {
            return Err(EngineError::invalid_param(
                "max_freq_hz",
                "must be a finite frequency greater than min_freq_hz",
            ));
        }

        for marker in &self.custom_positions {
            if marker.channel >= self.channel_count {
                return Err(EngineError::invalid_param(
                    "custom_positions",
                    format!(
                        "marker channel {} is out of range for {} channels",
                        marker.channel, self.channel_count
                    ),
                ));
            }
            range_check("custom_positions", marker.freq_hz, 100.0, 10_000.0)?;
        }

        Ok(())
    }
}

fn range_check(name: &str, value: f64, min: f64, max: f64) -> EngineResult<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::invalid_param(
            name,
            format!("must be between {} and {}, got {}", min, max, value),
        ))
    }
}

fn count_check(name: &str, value: usize, min: usize, max: usize) -> EngineResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::invalid_param(
            name,
            format!("must be between {} and {}, got {}", min, max, value),
        ))
    }
}
