//! Noise buffer synthesis.
//!
//! Voices loop a fixed-length noise buffer whose long-term spectrum already
//! carries the target -4.5 dB/octave slope. The buffer is built once per
//! voice from tiered pink noise split into one-octave bands, weighted, and
//! summed back together.

use std::f64::consts::FRAC_1_SQRT_2;

use rand::Rng;
use rand_pcg::Pcg32;

use crate::filter::BiquadFilter;

/// Duration of the looping noise buffer in seconds.
pub const NOISE_BUFFER_SECONDS: f64 = 2.0;

/// Number of update-rate tiers in the pink noise generator.
const PINK_TIERS: usize = 16;

/// One-octave bands with their octave index relative to the 640-1280 Hz
/// reference octave. Band weights are derived from the octave index.
const OCTAVE_BANDS: [(f64, f64, i32); 10] = [
    (20.0, 40.0, -5),
    (40.0, 80.0, -4),
    (80.0, 160.0, -3),
    (160.0, 320.0, -2),
    (320.0, 640.0, -1),
    (640.0, 1280.0, 0),
    (1280.0, 2560.0, 1),
    (2560.0, 5120.0, 2),
    (5120.0, 10240.0, 3),
    (10240.0, 20000.0, 4),
];

/// Generates pink noise with a multi-tier update scheme.
///
/// Tier `k` holds a uniform random value for `2^k` samples, so lower tiers
/// contribute fast variation and higher tiers slow variation. The sum of
/// all tiers approximates a 1/f spectrum (-3 dB/octave).
pub fn pink_noise(rng: &mut Pcg32, num_samples: usize) -> Vec<f64> {
    let mut tiers = [0.0_f64; PINK_TIERS];
    let mut samples = Vec::with_capacity(num_samples);

    for i in 0..num_samples {
        let mut sum = 0.0;
        for (k, tier) in tiers.iter_mut().enumerate() {
            if i % (1usize << k) == 0 {
                *tier = rng.gen::<f64>() * 2.0 - 1.0;
            }
            sum += *tier;
        }
        samples.push(sum / (PINK_TIERS as f64 * 0.75));
    }

    samples
}

/// Builds the looping sloped-noise buffer.
///
/// Pink noise is split into one-octave bands with a highpass at each band's
/// low edge and a lowpass at its high edge (both Butterworth, Q = 0.707).
/// Each band is weighted by an extra -1.5 dB per octave relative to the
/// reference octave, which on top of pink noise's inherent -3 dB/octave
/// realizes the -4.5 dB/octave target. The weighted bands are summed and
/// peak-normalized to 0.95.
pub fn sloped_noise_buffer(sample_rate: f64, rng: &mut Pcg32) -> Vec<f64> {
    let num_samples = (sample_rate * NOISE_BUFFER_SECONDS) as usize;
    let pink = pink_noise(rng, num_samples);

    let mut output = vec![0.0_f64; num_samples];
    let nyquist = sample_rate / 2.0;
    let attenuation_per_octave = 10.0_f64.powf(-1.5 / 20.0);

    for &(low, high, center_octave) in OCTAVE_BANDS.iter() {
        if low >= nyquist {
            continue;
        }
        // Keep the upper cutoff strictly below Nyquist
        let high = high.min(nyquist * 0.99);

        let mut highpass = BiquadFilter::highpass(low, FRAC_1_SQRT_2, sample_rate);
        let mut lowpass = BiquadFilter::lowpass(high, FRAC_1_SQRT_2, sample_rate);
        let gain = attenuation_per_octave.powi(center_octave);

        for (out, &sample) in output.iter_mut().zip(pink.iter()) {
            *out += lowpass.process(highpass.process(sample)) * gain;
        }
    }

    normalize_peak(&mut output, 0.95);
    output
}

/// Normalizes samples so the absolute peak lands on `target`.
fn normalize_peak(samples: &mut [f64], target: f64) {
    let peak = samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f64, |a, b| a.max(b));

    if peak > 0.0 {
        let scale = target / peak;
        for s in samples.iter_mut() {
            *s *= scale;
        }
    }
}
