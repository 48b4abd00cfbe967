//! Top-level playback control.
//!
//! [`PlaybackController`] owns the configuration, the audio device, and one
//! orchestrator per synthesis mode. Every parameter change funnels through a
//! setter that validates against [`EngineConfig`] ranges, commits, and then
//! rebuilds exactly the derived state the parameter feeds: pattern geometry
//! for mask changes, voice banks for topology changes, plain forwarding for
//! timing changes.
//!
//! The audio device is opened lazily on the first playback request, so a
//! controller can be constructed, configured, and queried without touching
//! the host audio stack. For offline rendering and tests,
//! [`PlaybackController::with_output`] accepts a pre-linked [`OutputHandle`]
//! and never opens a device.

use tracing::debug;

use crate::config::{AudioMode, EngineConfig, PositionMarker};
use crate::error::{EngineError, EngineResult};
use crate::frequency::generate_frequency_set;
use crate::orchestrator::PatternOrchestrator;
use crate::output::{AudioOutput, OutputHandle};
use crate::pattern::build_pattern;
use crate::rng::derive_voice_seed;
use crate::voice::{BurstVoice, NoiseFlavor, NoiseVoice, ToneVoice};

type VoiceBank = PatternOrchestrator<Box<dyn BurstVoice>>;

/// Equal-spread stereo positions for `channel_count` voices.
///
/// A single channel sits at center. Two or more channels span the full
/// stereo field from hard left to hard right in equal increments.
pub fn pan_layout(channel_count: usize) -> Vec<f64> {
    if channel_count <= 1 {
        return vec![0.0];
    }
    let last = (channel_count - 1) as f64;
    (0..channel_count)
        .map(|i| -1.0 + 2.0 * i as f64 / last)
        .collect()
}

/// Drives tone and noise orchestrators from a single configuration.
pub struct PlaybackController {
    config: EngineConfig,
    output: Option<OutputHandle>,
    device: Option<AudioOutput>,
    tone: Option<VoiceBank>,
    noise: Option<VoiceBank>,
}

impl PlaybackController {
    /// Creates a controller that opens the default audio device on first
    /// playback.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            output: None,
            device: None,
            tone: None,
            noise: None,
        })
    }

    /// Creates a controller bound to an existing output link. No audio
    /// device is ever opened; the caller renders the linked engine itself.
    pub fn with_output(config: EngineConfig, output: OutputHandle) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            output: Some(output),
            device: None,
            tone: None,
            noise: None,
        })
    }

    /// Current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the active orchestrator is stepping through its pattern.
    pub fn is_playing(&self) -> bool {
        self.active().map(VoiceBank::is_playing).unwrap_or(false)
    }

    /// Current audio clock position in frames rendered, or zero before the
    /// output link exists.
    pub fn position(&self) -> u64 {
        self.now()
    }

    /// Starts playback if stopped, stops it if playing. Returns the new
    /// playing state.
    pub fn toggle_playback(&mut self) -> EngineResult<bool> {
        if self.is_playing() {
            if let Some(orchestrator) = self.active_mut() {
                orchestrator.stop();
            }
            debug!("playback stopped");
            return Ok(false);
        }

        self.ensure_ready()?;
        let now = self.now();
        if let Some(orchestrator) = self.active_mut() {
            orchestrator.play(now);
        }
        debug!(mode = ?self.config.mode, "playback started");
        Ok(self.is_playing())
    }

    /// Runs all orchestrator tasks due at `now`.
    ///
    /// Both orchestrators tick so that staggered triggers left over from a
    /// mode switch still fire and decay.
    pub fn tick(&mut self, now: u64) {
        for orchestrator in self.both() {
            orchestrator.tick(now);
        }
    }

    /// Earliest pending task deadline across both orchestrators.
    pub fn next_deadline(&self) -> Option<u64> {
        let tone = self.tone.as_ref().and_then(PatternOrchestrator::next_deadline);
        let noise = self.noise.as_ref().and_then(PatternOrchestrator::next_deadline);
        match (tone, noise) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Switches the synthesis mode. If playback is running, the active
    /// orchestrator stops and the newly selected one starts in its place.
    pub fn set_mode(&mut self, mode: AudioMode) {
        if self.config.mode == mode {
            return;
        }
        let was_playing = self.is_playing();
        if was_playing {
            if let Some(orchestrator) = self.active_mut() {
                orchestrator.stop();
            }
        }
        self.config.mode = mode;
        if was_playing {
            let now = self.now();
            if let Some(orchestrator) = self.active_mut() {
                orchestrator.play(now);
            }
        }
        debug!(?mode, "synthesis mode switched");
    }

    /// Sets the mask center frequency and rebuilds the pattern.
    pub fn set_center_freq_hz(&mut self, hz: f64) -> EngineResult<()> {
        self.commit(|config| config.center_freq_hz = hz)?;
        self.rebuild_pattern();
        Ok(())
    }

    /// Sets the mask bandwidth and rebuilds the pattern.
    pub fn set_bandwidth_octaves(&mut self, octaves: f64) -> EngineResult<()> {
        self.commit(|config| config.bandwidth_octaves = octaves)?;
        self.rebuild_pattern();
        Ok(())
    }

    /// Sets the number of spatial channels and rebuilds voice banks and
    /// pattern. Playback restarts from the first step if it was running.
    pub fn set_channel_count(&mut self, count: usize) -> EngineResult<()> {
        self.commit(|config| config.channel_count = count)?;
        self.rebuild_topology()
    }

    /// Replaces the user-placed frequency markers and rebuilds the pattern.
    /// An empty list returns the pattern to uniform mode.
    pub fn set_custom_positions(&mut self, markers: Vec<PositionMarker>) -> EngineResult<()> {
        self.commit(|config| config.custom_positions = markers)?;
        self.rebuild_pattern();
        Ok(())
    }

    /// Sets the per-channel onset stagger within a step.
    pub fn set_stagger_delay_ms(&mut self, ms: f64) -> EngineResult<()> {
        self.commit(|config| config.stagger_delay_ms = ms)?;
        for orchestrator in self.both() {
            orchestrator.set_stagger_delay_ms(ms);
        }
        Ok(())
    }

    /// Sets the delay between pattern steps. Takes effect when the next
    /// step advance is scheduled.
    pub fn set_step_delay_ms(&mut self, ms: f64) -> EngineResult<()> {
        self.commit(|config| config.step_delay_ms = ms)?;
        for orchestrator in self.both() {
            orchestrator.set_step_delay_ms(ms);
        }
        Ok(())
    }

    /// Sets the envelope attack time for subsequent bursts.
    pub fn set_attack_ms(&mut self, ms: f64) -> EngineResult<()> {
        self.commit(|config| config.attack_ms = ms)?;
        for orchestrator in self.both() {
            orchestrator.set_attack_ms(ms);
        }
        Ok(())
    }

    /// Sets the envelope release time for subsequent bursts.
    pub fn set_release_ms(&mut self, ms: f64) -> EngineResult<()> {
        self.commit(|config| config.release_ms = ms)?;
        for orchestrator in self.both() {
            orchestrator.set_release_ms(ms);
        }
        Ok(())
    }

    /// Sets the spectral slope applied to tone banks.
    pub fn set_slope_db(&mut self, db_per_octave: f64) -> EngineResult<()> {
        self.commit(|config| config.slope_db_per_octave = db_per_octave)?;
        for orchestrator in self.both() {
            orchestrator.set_slope_db(db_per_octave);
        }
        Ok(())
    }

    /// Sets the tone bank size and regenerates the base frequency set.
    pub fn set_frequency_count(&mut self, count: usize) -> EngineResult<()> {
        self.commit(|config| config.frequency_count = count)?;
        self.rebuild_frequencies()
    }

    /// Stops playback and releases voices, orchestrators, and the audio
    /// device.
    pub fn dispose(&mut self) {
        for orchestrator in self.both() {
            orchestrator.dispose();
        }
        self.tone = None;
        self.noise = None;
        self.device = None;
        self.output = None;
        debug!("controller disposed");
    }

    /// Applies `mutate` to a copy of the configuration, validates it, and
    /// commits only if valid. The live configuration is untouched on error.
    fn commit(&mut self, mutate: impl FnOnce(&mut EngineConfig)) -> EngineResult<()> {
        let mut config = self.config.clone();
        mutate(&mut config);
        config.validate()?;
        self.config = config;
        Ok(())
    }

    fn active(&self) -> Option<&VoiceBank> {
        match self.config.mode {
            AudioMode::Tone => self.tone.as_ref(),
            AudioMode::ShapedNoise => self.noise.as_ref(),
        }
    }

    fn active_mut(&mut self) -> Option<&mut VoiceBank> {
        match self.config.mode {
            AudioMode::Tone => self.tone.as_mut(),
            AudioMode::ShapedNoise => self.noise.as_mut(),
        }
    }

    fn both(&mut self) -> impl Iterator<Item = &mut VoiceBank> + '_ {
        self.tone.iter_mut().chain(self.noise.iter_mut())
    }

    fn handle(&self) -> EngineResult<OutputHandle> {
        self.output
            .clone()
            .ok_or_else(|| EngineError::device("output not initialized"))
    }

    fn now(&self) -> u64 {
        self.output.as_ref().map(OutputHandle::now).unwrap_or(0)
    }

    /// Opens the audio device and builds both orchestrators if not already
    /// done.
    fn ensure_ready(&mut self) -> EngineResult<()> {
        if self.output.is_none() {
            let device = AudioOutput::open()?;
            self.output = Some(device.handle().clone());
            self.device = Some(device);
            debug!("audio device acquired");
        }
        if self.tone.is_none() {
            self.build_orchestrators()?;
        }
        Ok(())
    }

    fn build_orchestrators(&mut self) -> EngineResult<()> {
        let sample_rate = self.handle()?.sample_rate();

        let mut tone = PatternOrchestrator::new(sample_rate);
        tone.set_volume(self.config.tone_volume);
        let mut noise = PatternOrchestrator::new(sample_rate);
        noise.set_volume(self.config.noise_volume);
        self.tone = Some(tone);
        self.noise = Some(noise);

        self.rebuild_voices()?;
        self.apply_timing();
        self.rebuild_frequencies()?;
        self.rebuild_pattern();
        Ok(())
    }

    /// Builds fresh voice banks for the current channel count. Tone and
    /// noise voices at the same channel index share a pan position but get
    /// distinct derived seeds.
    fn rebuild_voices(&mut self) -> EngineResult<()> {
        let handle = self.handle()?;
        let seed = self.config.seed;
        let pans = pan_layout(self.config.channel_count);

        let tone_voices: Vec<Box<dyn BurstVoice>> = pans
            .iter()
            .enumerate()
            .map(|(i, &pan)| {
                let voice_seed = derive_voice_seed(seed, 2 * i as u32);
                Box::new(ToneVoice::new(handle.clone(), pan, voice_seed)) as Box<dyn BurstVoice>
            })
            .collect();
        let noise_voices: Vec<Box<dyn BurstVoice>> = pans
            .iter()
            .enumerate()
            .map(|(i, &pan)| {
                let voice_seed = derive_voice_seed(seed, 2 * i as u32 + 1);
                Box::new(NoiseVoice::new(
                    handle.clone(),
                    pan,
                    voice_seed,
                    NoiseFlavor::Banded,
                )) as Box<dyn BurstVoice>
            })
            .collect();

        if let Some(orchestrator) = self.tone.as_mut() {
            orchestrator.set_voices(tone_voices);
        }
        if let Some(orchestrator) = self.noise.as_mut() {
            orchestrator.set_voices(noise_voices);
        }
        Ok(())
    }

    fn apply_timing(&mut self) {
        let stagger = self.config.stagger_delay_ms;
        let step = self.config.step_delay_ms;
        let attack = self.config.attack_ms;
        let release = self.config.release_ms;
        let slope = self.config.slope_db_per_octave;
        for orchestrator in self.both() {
            orchestrator.set_stagger_delay_ms(stagger);
            orchestrator.set_step_delay_ms(step);
            orchestrator.set_attack_ms(attack);
            orchestrator.set_release_ms(release);
            orchestrator.set_slope_db(slope);
        }
    }

    fn rebuild_frequencies(&mut self) -> EngineResult<()> {
        if self.tone.is_none() {
            return Ok(());
        }
        let set = generate_frequency_set(
            self.config.min_freq_hz,
            self.config.max_freq_hz,
            self.config.frequency_count,
        )?;
        for orchestrator in self.both() {
            orchestrator.set_base_frequencies(set.clone());
        }
        Ok(())
    }

    fn rebuild_pattern(&mut self) {
        if self.tone.is_none() {
            return;
        }
        let pattern = build_pattern(&self.config);
        for orchestrator in self.both() {
            orchestrator.set_pattern(pattern.clone());
        }
    }

    /// Tears down and rebuilds everything that depends on the channel
    /// count, restarting playback if it was running.
    fn rebuild_topology(&mut self) -> EngineResult<()> {
        if self.tone.is_none() {
            return Ok(());
        }
        let was_playing = self.is_playing();
        self.rebuild_voices()?;
        self.rebuild_pattern();
        if was_playing {
            let now = self.now();
            if let Some(orchestrator) = self.active_mut() {
                orchestrator.play(now);
            }
        }
        Ok(())
    }
}
