//! Control-plane burst voices.
//!
//! A voice is the control side of one render-engine channel: it owns a voice
//! id, translates burst parameters into engine events, and removes its
//! render state when dropped. Two variants exist, a tone bank and a filtered
//! noise source, behind the shared [`BurstVoice`] trait the orchestrator
//! drives.

use std::sync::Arc;

use rand::Rng;
use rand_pcg::Pcg32;
use tracing::warn;

use crate::engine::{EngineEvent, NoiseFilter, TonePartial, VoiceId};
use crate::envelope::ArParams;
use crate::noise::sloped_noise_buffer;
use crate::output::OutputHandle;
use crate::pattern::FrequencyMask;
use crate::rng::create_rng;
use crate::slope::slope_gains;

/// Per-burst parameters handed to a voice before each trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct BurstParams {
    /// Frequencies the burst should contain, after mask application.
    pub frequencies: Vec<f64>,
    /// Envelope attack time in milliseconds.
    pub attack_ms: f64,
    /// Envelope release time in milliseconds.
    pub release_ms: f64,
    /// Spectral tilt of the tone bank in dB/octave.
    pub slope_db_per_octave: f64,
    /// Burst peak level, 0 to 1.
    pub volume: f64,
}

/// A schedulable burst source bound to one spatial position.
///
/// `set_params` must run before the first `play`; playing an unparameterized
/// voice logs a warning and does nothing.
pub trait BurstVoice {
    /// Applies burst parameters. `mask` carries the rejection band used by
    /// banded noise voices.
    fn set_params(&mut self, params: &BurstParams, mask: Option<FrequencyMask>);

    /// Starts a burst at the current audio clock position.
    fn play(&mut self);
}

impl<T: BurstVoice + ?Sized> BurstVoice for Box<T> {
    fn set_params(&mut self, params: &BurstParams, mask: Option<FrequencyMask>) {
        (**self).set_params(params, mask);
    }

    fn play(&mut self) {
        (**self).play();
    }
}

/// Bank-of-oscillators voice.
///
/// Each requested frequency becomes one oscillator with a slope-shaped gain.
/// Oscillators get a random sub-millisecond start offset, realized as an
/// initial phase, so a rebuilt bank never starts phase-locked.
pub struct ToneVoice {
    output: OutputHandle,
    id: VoiceId,
    rng: Pcg32,
    trigger_params: Option<ArParams>,
}

impl ToneVoice {
    /// Creates a tone voice at a fixed pan position.
    pub fn new(output: OutputHandle, pan: f64, seed: u32) -> Self {
        let id = output.allocate_voice_id();
        output.send(EngineEvent::AddVoice { id, pan });
        Self {
            output,
            id,
            rng: create_rng(seed),
            trigger_params: None,
        }
    }
}

impl BurstVoice for ToneVoice {
    fn set_params(&mut self, params: &BurstParams, _mask: Option<FrequencyMask>) {
        let gains = slope_gains(&params.frequencies, params.slope_db_per_octave);
        let partials = params
            .frequencies
            .iter()
            .zip(&gains)
            .map(|(&freq_hz, &gain)| {
                let jitter = self.rng.gen::<f64>() * 1.0e-3;
                TonePartial {
                    freq_hz,
                    gain,
                    phase: (freq_hz * jitter).fract(),
                }
            })
            .collect();
        self.output.send(EngineEvent::SetTone {
            id: self.id,
            partials,
        });
        self.trigger_params = Some(ArParams::new(
            params.attack_ms / 1000.0,
            params.release_ms / 1000.0,
            params.volume,
        ));
    }

    fn play(&mut self) {
        let Some(params) = self.trigger_params else {
            warn!("tone voice cannot play without parameters set");
            return;
        };
        self.output.send(EngineEvent::Trigger {
            id: self.id,
            at: self.output.now(),
            params,
        });
    }
}

impl Drop for ToneVoice {
    fn drop(&mut self) {
        self.output.send(EngineEvent::RemoveVoice { id: self.id });
    }
}

/// Filtering applied by a noise voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseFlavor {
    /// One narrow notch per requested frequency.
    Discrete,
    /// A single notch spanning the supplied mask bounds.
    Banded,
}

/// Looping shaped-noise voice.
///
/// The sloped noise buffer is generated once at construction from the
/// voice's seed and shared with the render side. Mask application happens in
/// the filter chain: either discrete notches at the requested frequencies or
/// one band notch over the mask bounds.
pub struct NoiseVoice {
    output: OutputHandle,
    id: VoiceId,
    buffer: Arc<Vec<f64>>,
    flavor: NoiseFlavor,
    trigger_params: Option<ArParams>,
}

impl NoiseVoice {
    /// Creates a noise voice at a fixed pan position.
    pub fn new(output: OutputHandle, pan: f64, seed: u32, flavor: NoiseFlavor) -> Self {
        let id = output.allocate_voice_id();
        output.send(EngineEvent::AddVoice { id, pan });
        let mut rng = create_rng(seed);
        let buffer = Arc::new(sloped_noise_buffer(output.sample_rate(), &mut rng));
        Self {
            output,
            id,
            buffer,
            flavor,
            trigger_params: None,
        }
    }
}

impl BurstVoice for NoiseVoice {
    fn set_params(&mut self, params: &BurstParams, mask: Option<FrequencyMask>) {
        let filter = match self.flavor {
            NoiseFlavor::Banded => match mask {
                Some(band) => NoiseFilter::Band {
                    low_hz: band.low_hz,
                    high_hz: band.high_hz,
                },
                None => NoiseFilter::Unfiltered,
            },
            NoiseFlavor::Discrete => {
                if params.frequencies.is_empty() {
                    NoiseFilter::Unfiltered
                } else {
                    NoiseFilter::Notches(params.frequencies.clone())
                }
            }
        };
        self.output.send(EngineEvent::SetNoise {
            id: self.id,
            buffer: self.buffer.clone(),
            filter,
        });
        self.trigger_params = Some(ArParams::new(
            params.attack_ms / 1000.0,
            params.release_ms / 1000.0,
            params.volume,
        ));
    }

    fn play(&mut self) {
        let Some(params) = self.trigger_params else {
            warn!("noise voice cannot play without parameters set");
            return;
        };
        self.output.send(EngineEvent::Trigger {
            id: self.id,
            at: self.output.now(),
            params,
        });
    }
}

impl Drop for NoiseVoice {
    fn drop(&mut self) {
        self.output.send(EngineEvent::RemoveVoice { id: self.id });
    }
}
