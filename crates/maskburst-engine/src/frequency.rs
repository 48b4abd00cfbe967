//! Log-spaced frequency set generation and mask application.

use crate::error::{EngineError, EngineResult};
use crate::pattern::FrequencyMask;

/// Generates a logarithmically spaced frequency set.
///
/// Frequencies are spaced uniformly in log10 between `min_hz` and `max_hz`:
/// the first element is `min_hz`, the last is `max_hz`, and the ratio
/// between neighbors is constant.
///
/// A `count` of 1 degenerates to `[min_hz]`.
///
/// # Errors
/// Returns an error when `count` is 0, either bound is not a positive finite
/// frequency, or `max_hz <= min_hz` (with `count > 1`).
pub fn generate_frequency_set(min_hz: f64, max_hz: f64, count: usize) -> EngineResult<Vec<f64>> {
    if count == 0 {
        return Err(EngineError::invalid_param("count", "must be at least 1"));
    }
    if !(min_hz.is_finite() && min_hz > 0.0) {
        return Err(EngineError::InvalidFrequency { freq: min_hz });
    }
    if count == 1 {
        return Ok(vec![min_hz]);
    }
    if !(max_hz.is_finite() && max_hz > 0.0) {
        return Err(EngineError::InvalidFrequency { freq: max_hz });
    }
    if max_hz <= min_hz {
        return Err(EngineError::invalid_param(
            "max_hz",
            "must be greater than min_hz",
        ));
    }

    let log_min = min_hz.log10();
    let log_max = max_hz.log10();
    let log_step = (log_max - log_min) / (count - 1) as f64;

    let mut frequencies = Vec::with_capacity(count);
    for i in 0..count {
        frequencies.push(10.0_f64.powf(log_min + i as f64 * log_step));
    }

    Ok(frequencies)
}

/// Removes every frequency that falls inside any of the given masks.
///
/// Masks are closed intervals; a frequency equal to either bound is
/// excluded. An inverted mask (`high < low`) excludes nothing.
pub fn apply_frequency_masks(frequencies: &[f64], masks: &[FrequencyMask]) -> Vec<f64> {
    frequencies
        .iter()
        .copied()
        .filter(|&f| !masks.iter().any(|m| m.contains(f)))
        .collect()
}
