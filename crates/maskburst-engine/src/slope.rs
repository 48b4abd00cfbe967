//! Spectral slope shaping.
//!
//! Converts a dB-per-octave tilt into per-frequency linear gains so a tone
//! bank takes on the same long-term spectral envelope as the shaped noise.

/// Linear gain at `freq` for a tilt of `slope_db_per_octave`, referenced to
/// `reference_hz` (gain 1.0 there).
///
/// `gain(f) = 10^(slope * log2(f / f_ref) / 20)`; negative slopes attenuate
/// frequencies above the reference.
pub fn slope_gain(freq: f64, reference_hz: f64, slope_db_per_octave: f64) -> f64 {
    let octaves = (freq / reference_hz).log2();
    10.0_f64.powf(slope_db_per_octave * octaves / 20.0)
}

/// Gains for a whole frequency set, referenced to the set's minimum.
///
/// An empty set yields an empty gain list.
pub fn slope_gains(frequencies: &[f64], slope_db_per_octave: f64) -> Vec<f64> {
    let reference = frequencies.iter().copied().fold(f64::INFINITY, f64::min);
    if !reference.is_finite() {
        return Vec::new();
    }
    frequencies
        .iter()
        .map(|&f| slope_gain(f, reference, slope_db_per_octave))
        .collect()
}
