//! Mask pattern data model and builder.
//!
//! A burst pattern is an ordered list of steps, each holding one mask list
//! per spatial channel. The mask list is dense and indexed by channel; an
//! empty list means the channel plays unmasked on that step.

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, PositionMarker};

/// A closed frequency interval to exclude, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyMask {
    /// Lower edge in Hz (inclusive).
    pub low_hz: f64,
    /// Upper edge in Hz (inclusive).
    pub high_hz: f64,
}

impl FrequencyMask {
    /// Creates a mask over a closed interval.
    pub fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    /// Derives mask bounds from a center frequency and a bandwidth in
    /// octaves: the interval spans half the bandwidth on each side of the
    /// center.
    pub fn from_center(center_hz: f64, bandwidth_octaves: f64) -> Self {
        let half = bandwidth_octaves / 2.0;
        Self {
            low_hz: center_hz / 2.0_f64.powf(half),
            high_hz: center_hz * 2.0_f64.powf(half),
        }
    }

    /// Returns true when the frequency falls inside the closed interval.
    ///
    /// An inverted interval (`low_hz > high_hz`) contains nothing, so a
    /// degenerate mask excludes nothing.
    pub fn contains(&self, freq_hz: f64) -> bool {
        freq_hz >= self.low_hz && freq_hz <= self.high_hz
    }
}

/// One step of a burst pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternStep {
    /// Mask lists indexed by channel.
    pub masks: Vec<Vec<FrequencyMask>>,
}

impl PatternStep {
    /// Creates a step with no masks on any channel.
    pub fn unmasked(channel_count: usize) -> Self {
        Self {
            masks: vec![Vec::new(); channel_count],
        }
    }

    /// Creates a step with the same mask applied to every channel.
    pub fn all_masked(channel_count: usize, mask: FrequencyMask) -> Self {
        Self {
            masks: vec![vec![mask]; channel_count],
        }
    }

    /// Gets the masks for one channel. Channels beyond the stored size are
    /// treated as unmasked.
    pub fn channel_masks(&self, channel: usize) -> &[FrequencyMask] {
        self.masks.get(channel).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// An ordered sequence of pattern steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstPattern {
    /// Steps in playback order.
    pub steps: Vec<PatternStep>,
    /// When false the sequence plays once and stops after the last step.
    pub repeat: bool,
}

/// Builds a burst pattern from the current configuration.
///
/// Uniform mode alternates between masked and unmasked steps (one channel)
/// or rotates a single unmasked channel around the set (multiple channels).
/// Custom mode emits one step per placed marker plus a trailing all-masked
/// step that creates an audible rhythmic gap. A single channel always uses
/// the alternating form, even when markers are present.
pub fn build_pattern(config: &EngineConfig) -> BurstPattern {
    let channel_count = config.channel_count;

    if channel_count > 1 {
        let markers: Vec<PositionMarker> = config
            .custom_positions
            .iter()
            .copied()
            .filter(|m| m.channel < channel_count)
            .collect();
        if !markers.is_empty() {
            return build_custom(channel_count, config.bandwidth_octaves, &markers);
        }
    }

    build_uniform(config)
}

fn build_uniform(config: &EngineConfig) -> BurstPattern {
    let band = FrequencyMask::from_center(config.center_freq_hz, config.bandwidth_octaves);
    let channel_count = config.channel_count;
    let mut steps = Vec::new();

    if channel_count == 1 {
        steps.push(PatternStep::all_masked(1, band));
        steps.push(PatternStep::unmasked(1));
    } else {
        // All channels masked first, then the unmasked band rotates exactly
        // once around the channel set per pattern cycle.
        steps.push(PatternStep::all_masked(channel_count, band));
        for unmasked in 0..channel_count {
            let masks = (0..channel_count)
                .map(|ch| if ch == unmasked { Vec::new() } else { vec![band] })
                .collect();
            steps.push(PatternStep { masks });
        }
    }

    BurstPattern {
        steps,
        repeat: true,
    }
}

fn build_custom(
    channel_count: usize,
    bandwidth_octaves: f64,
    markers: &[PositionMarker],
) -> BurstPattern {
    let mut steps = Vec::with_capacity(markers.len() + 1);

    for marker in markers {
        let band = FrequencyMask::from_center(marker.freq_hz, bandwidth_octaves);
        let masks = (0..channel_count)
            .map(|ch| {
                if ch == marker.channel {
                    Vec::new()
                } else {
                    vec![band]
                }
            })
            .collect();
        steps.push(PatternStep { masks });
    }

    // Trailing silence step: every channel masked with the first marker's band
    let first_band = FrequencyMask::from_center(markers[0].freq_hz, bandwidth_octaves);
    steps.push(PatternStep::all_masked(channel_count, first_band));

    BurstPattern {
        steps,
        repeat: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config_with(channel_count: usize) -> EngineConfig {
        EngineConfig {
            channel_count,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_mask_contains_closed_interval() {
        let mask = FrequencyMask::new(100.0, 200.0);

        assert!(mask.contains(100.0));
        assert!(mask.contains(150.0));
        assert!(mask.contains(200.0));
        assert!(!mask.contains(99.999));
        assert!(!mask.contains(200.001));
    }

    #[test]
    fn test_inverted_mask_contains_nothing() {
        let mask = FrequencyMask::new(200.0, 100.0);

        assert!(!mask.contains(150.0));
        assert!(!mask.contains(100.0));
        assert!(!mask.contains(200.0));
    }

    #[test]
    fn test_from_center_spans_half_bandwidth_each_side() {
        let mask = FrequencyMask::from_center(1000.0, 1.0);

        assert!((mask.low_hz - 707.1).abs() < 0.1);
        assert!((mask.high_hz - 1414.2).abs() < 0.1);
        assert!(mask.low_hz < 1000.0 && 1000.0 < mask.high_hz);
    }

    #[test]
    fn test_zero_bandwidth_collapses_to_center() {
        let mask = FrequencyMask::from_center(500.0, 0.0);

        assert_eq!(mask.low_hz, 500.0);
        assert_eq!(mask.high_hz, 500.0);
    }

    #[test]
    fn test_single_channel_alternates() {
        let pattern = build_pattern(&config_with(1));

        assert_eq!(pattern.steps.len(), 2);
        assert!(pattern.repeat);
        assert_eq!(pattern.steps[0].channel_masks(0).len(), 1);
        assert!(pattern.steps[1].channel_masks(0).is_empty());
    }

    #[test]
    fn test_multi_channel_rotates_unmasked_band() {
        let mut config = config_with(3);
        config.center_freq_hz = 1000.0;
        config.bandwidth_octaves = 1.0;

        let pattern = build_pattern(&config);

        assert_eq!(pattern.steps.len(), 4);
        // Step 0 masks every channel
        for ch in 0..3 {
            assert_eq!(pattern.steps[0].channel_masks(ch).len(), 1);
        }
        // Step i leaves channel i-1 unmasked and masks the rest
        for (i, step) in pattern.steps.iter().enumerate().skip(1) {
            for ch in 0..3 {
                if ch == i - 1 {
                    assert!(step.channel_masks(ch).is_empty());
                } else {
                    assert_eq!(step.channel_masks(ch).len(), 1);
                }
            }
        }

        let mask = pattern.steps[0].channel_masks(0)[0];
        assert!((mask.low_hz - 707.1).abs() < 0.1);
        assert!((mask.high_hz - 1414.2).abs() < 0.1);
    }

    #[test]
    fn test_steps_are_dense_over_channels() {
        let pattern = build_pattern(&config_with(4));

        for step in &pattern.steps {
            assert_eq!(step.masks.len(), 4);
        }
    }

    #[test]
    fn test_custom_positions_one_step_per_marker() {
        let mut config = config_with(2);
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

        let pattern = build_pattern(&config);

        assert_eq!(pattern.steps.len(), 3);

        // Each position step unmasks exactly its own channel
        let first_band = FrequencyMask::from_center(500.0, 0.5);
        assert!(pattern.steps[0].channel_masks(0).is_empty());
        assert_eq!(pattern.steps[0].channel_masks(1), &[first_band]);

        let second_band = FrequencyMask::from_center(4000.0, 0.5);
        assert!(pattern.steps[1].channel_masks(1).is_empty());
        assert_eq!(pattern.steps[1].channel_masks(0), &[second_band]);

        // Trailer masks every channel with the first marker's band
        assert_eq!(pattern.steps[2].channel_masks(0), &[first_band]);
        assert_eq!(pattern.steps[2].channel_masks(1), &[first_band]);
    }

    #[test]
    fn test_single_channel_ignores_custom_positions() {
        let mut config = config_with(1);
        config.custom_positions = vec![PositionMarker {
            channel: 0,
            freq_hz: 800.0,
        }];

        let pattern = build_pattern(&config);

        assert_eq!(pattern.steps.len(), 2);
        assert!(pattern.steps[1].channel_masks(0).is_empty());
    }

    #[test]
    fn test_out_of_range_markers_fall_back_to_uniform() {
        let mut config = config_with(2);
        config.custom_positions = vec![PositionMarker {
            channel: 7,
            freq_hz: 800.0,
        }];

        let pattern = build_pattern(&config);

        // Uniform mode for 2 channels: all-masked step plus one per channel
        assert_eq!(pattern.steps.len(), 3);
    }

    #[test]
    fn test_channel_masks_beyond_step_size_are_empty() {
        let step = PatternStep::unmasked(2);

        assert!(step.channel_masks(9).is_empty());
    }
}
