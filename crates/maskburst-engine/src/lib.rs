//! MaskBurst Engine
//!
//! This crate implements a masking-pattern burst engine: short tone and
//! noise bursts arranged into a repeating spatial pattern around a
//! configurable frequency band.
//!
//! # Overview
//!
//! A [`controller::PlaybackController`] owns the configuration and drives
//! one orchestrator per synthesis mode:
//!
//! - **Tone mode** - Banks of log-spaced oscillators with slope-shaped
//!   gains, band-rejected by dropping in-band frequencies
//! - **Shaped noise mode** - Looping sloped-noise buffers, band-rejected
//!   with biquad notch filters
//!
//! Each pattern step fires one staggered burst per spatial channel. The
//! first step masks every channel; each following step lets one channel
//! burst with the full band while the rest stay masked. Control code runs
//! single-threaded and sends sample-stamped events to a lock-free render
//! engine, which applies them on block boundaries.
//!
//! # Determinism
//!
//! All random state is seeded. Given the same configuration and seed,
//! [`offline::render_offline`] produces byte-identical output across runs.
//! The crate uses PCG32 for all random number generation, with per-voice
//! seeds derived via BLAKE3 hashing.
//!
//! # Example
//!
//! ```ignore
//! use maskburst_engine::config::EngineConfig;
//! use maskburst_engine::offline::render_offline;
//! use maskburst_engine::wav::{samples_to_pcm16, write_wav_to_vec, WavFormat};
//!
//! let samples = render_offline(EngineConfig::default(), 2.0, 44_100.0)?;
//!
//! let pcm = samples_to_pcm16(&samples);
//! let wav = write_wav_to_vec(&WavFormat::stereo(44_100), &pcm);
//! std::fs::write("bursts.wav", &wav)?;
//! ```
//!
//! # Crate Structure
//!
//! - [`controller`] - Playback facade tying configuration to orchestrators
//! - [`config`] - Engine configuration with validated parameter ranges
//! - [`engine`] - Block renderer consuming sample-stamped events
//! - [`envelope`] - Attack/release burst envelopes
//! - [`filter`] - Biquad filter implementations
//! - [`frequency`] - Log-spaced frequency sets and mask filtering
//! - [`noise`] - Sloped-noise buffer synthesis
//! - [`offline`] - Device-free rendering
//! - [`orchestrator`] - Pattern stepping and burst scheduling
//! - [`output`] - Audio device wiring and the control/render link
//! - [`pattern`] - Mask band geometry and pattern building
//! - [`rng`] - Deterministic RNG with seed derivation
//! - [`scheduler`] - Sample-clock task queue
//! - [`slope`] - Spectral slope gain curves
//! - [`voice`] - Tone and noise burst voices
//! - [`wav`] - Deterministic WAV file writer

pub mod config;
pub mod controller;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod frequency;
pub mod noise;
pub mod offline;
pub mod orchestrator;
pub mod output;
pub mod pattern;
pub mod rng;
pub mod scheduler;
pub mod slope;
pub mod voice;
pub mod wav;

// Re-export main types at crate root
pub use config::{AudioMode, EngineConfig, PositionMarker};
pub use controller::PlaybackController;
pub use error::{EngineError, EngineResult};
pub use offline::render_offline;
pub use pattern::{build_pattern, BurstPattern, FrequencyMask};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::engine::RENDER_BLOCK_FRAMES;
    use crate::output::link;
    use rustfft::num_complex::Complex;
    use rustfft::FftPlanner;

    /// Interleaved stereo to left channel only.
    fn left_channel(samples: &[f32]) -> Vec<f32> {
        samples.iter().step_by(2).copied().collect()
    }

    /// Total spectral power between two frequencies.
    fn band_power(spectrum: &[Complex<f32>], sample_rate: f64, low_hz: f64, high_hz: f64) -> f64 {
        let n = spectrum.len() as f64;
        let lo = (low_hz * n / sample_rate).round() as usize;
        let hi = (high_hz * n / sample_rate).round() as usize;
        spectrum[lo..hi]
            .iter()
            .map(|c| (c.norm_sqr()) as f64)
            .sum()
    }

    #[test]
    fn test_multi_channel_tone_playback_renders() {
        let (handle, mut engine) = link(44_100.0);
        let mut config = EngineConfig::default();
        config.mode = AudioMode::Tone;
        config.channel_count = 3;
        config.center_freq_hz = 1000.0;
        config.bandwidth_octaves = 1.0;

        let mut controller = PlaybackController::with_output(config, handle.clone()).unwrap();
        controller.toggle_playback().unwrap();

        let mut peak = 0.0f32;
        let mut block = vec![0.0f32; RENDER_BLOCK_FRAMES * 2];
        for _ in 0..30 {
            controller.tick(handle.now());
            engine.render_block(&mut block);
            peak = block.iter().fold(peak, |max, s| max.max(s.abs()));
        }

        assert_eq!(engine.voice_count(), 6);
        assert!(peak > 0.01, "expected audible output, peak {}", peak);
        assert!(peak <= 1.0, "master clip must bound output, peak {}", peak);
    }

    #[test]
    fn test_noise_spectrum_slopes_downward() {
        // Mask band placed above the measured range so notch filtering
        // does not disturb the octave comparison.
        let mut config = EngineConfig::default();
        config.center_freq_hz = 8000.0;
        config.bandwidth_octaves = 0.1;

        let samples = render_offline(config, 1.0, 44_100.0).unwrap();
        let left = left_channel(&samples);

        let n = 32_768;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        let mut buffer: Vec<Complex<f32>> = left[..n]
            .iter()
            .map(|&s| Complex::new(s, 0.0))
            .collect();
        fft.process(&mut buffer);

        let low = band_power(&buffer, 44_100.0, 80.0, 160.0);
        let mid = band_power(&buffer, 44_100.0, 320.0, 640.0);
        let high = band_power(&buffer, 44_100.0, 1280.0, 2560.0);

        assert!(low > 0.0);
        assert!(mid < low, "expected falling spectrum, {} !< {}", mid, low);
        assert!(high < mid, "expected falling spectrum, {} !< {}", high, mid);
        assert!(
            high < 0.6 * low,
            "expected at least 2 dB of fall over four octaves, {} vs {}",
            high,
            low
        );
    }

    #[test]
    fn test_custom_marker_render_is_deterministic() {
        let mut config = EngineConfig::default();
        config.channel_count = 2;
        config.bandwidth_octaves = 0.5;
        config.custom_positions = vec![
            PositionMarker {
                channel: 0,
                freq_hz: 500.0,
            },
            PositionMarker {
                channel: 1,
                freq_hz: 4000.0,
            },
        ];

        let first = render_offline(config.clone(), 0.5, 44_100.0).unwrap();
        let second = render_offline(config, 0.5, 44_100.0).unwrap();

        let peak = first.iter().fold(0.0f32, |max, s| max.max(s.abs()));
        assert!(peak > 0.01, "expected audible output, peak {}", peak);
        assert_eq!(first, second);
    }

    #[test]
    fn test_mode_switch_keeps_engine_fed() {
        let (handle, mut engine) = link(44_100.0);
        let mut controller =
            PlaybackController::with_output(EngineConfig::default(), handle.clone()).unwrap();
        controller.toggle_playback().unwrap();

        let mut block = vec![0.0f32; RENDER_BLOCK_FRAMES * 2];
        for _ in 0..10 {
            controller.tick(handle.now());
            engine.render_block(&mut block);
        }

        controller.set_mode(AudioMode::Tone);
        assert!(controller.is_playing());

        let mut peak = 0.0f32;
        for _ in 0..30 {
            controller.tick(handle.now());
            engine.render_block(&mut block);
            peak = block.iter().fold(peak, |max, s| max.max(s.abs()));
        }

        assert!(peak > 0.01, "expected audible output, peak {}", peak);
    }
}
