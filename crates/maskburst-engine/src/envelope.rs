//! Attack-release envelope generator.
//!
//! Bursts are shaped by a linear attack-release envelope: the level ramps
//! from 0 to the peak over the attack time, then straight back to 0 over
//! the release time. There is no sustain; a burst always runs to completion
//! unless it is retriggered.

/// Attack-release envelope parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArParams {
    /// Attack time in seconds.
    pub attack: f64,
    /// Release time in seconds.
    pub release: f64,
    /// Peak level reached at the end of the attack ramp (0.0 to 1.0).
    pub peak: f64,
}

impl Default for ArParams {
    fn default() -> Self {
        Self {
            attack: 0.1,
            release: 0.1,
            peak: 1.0,
        }
    }
}

impl ArParams {
    /// Creates new attack-release parameters.
    pub fn new(attack: f64, release: f64, peak: f64) -> Self {
        Self {
            attack: attack.max(0.0),
            release: release.max(0.0),
            peak: peak.clamp(0.0, 1.0),
        }
    }
}

/// Envelope generator state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvelopeState {
    /// Attack phase - level rising from 0 to the peak.
    Attack,
    /// Release phase - level falling from the peak to 0.
    Release,
    /// Envelope completed - level is 0.
    Idle,
}

/// Attack-release envelope generator.
#[derive(Debug, Clone)]
pub struct BurstEnvelope {
    params: ArParams,
    sample_rate: f64,
    state: EnvelopeState,
    time: f64,
    level: f64,
}

impl BurstEnvelope {
    /// Creates a new envelope in the idle state.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            params: ArParams::default(),
            sample_rate,
            state: EnvelopeState::Idle,
            time: 0.0,
            level: 0.0,
        }
    }

    /// Triggers a burst with the given parameters.
    ///
    /// The level always restarts from 0, even when a previous burst is
    /// still in its release phase.
    pub fn trigger(&mut self, params: ArParams) {
        self.params = params;
        self.state = EnvelopeState::Attack;
        self.time = 0.0;
        self.level = 0.0;
    }

    /// Gets the current envelope state.
    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Returns true if the envelope has completed.
    pub fn is_idle(&self) -> bool {
        self.state == EnvelopeState::Idle
    }

    /// Gets the current level.
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Generates the next envelope sample.
    pub fn next_sample(&mut self) -> f64 {
        let dt = 1.0 / self.sample_rate;

        match self.state {
            EnvelopeState::Attack => {
                if self.params.attack > 0.0 {
                    let progress = self.time / self.params.attack;
                    self.level = progress * self.params.peak;
                    if progress >= 1.0 {
                        self.level = self.params.peak;
                        self.state = EnvelopeState::Release;
                        self.time = 0.0;
                    } else {
                        self.time += dt;
                    }
                } else {
                    self.level = self.params.peak;
                    self.state = EnvelopeState::Release;
                    self.time = 0.0;
                }
            }
            EnvelopeState::Release => {
                if self.params.release > 0.0 {
                    let progress = self.time / self.params.release;
                    self.level = self.params.peak * (1.0 - progress);
                    if progress >= 1.0 {
                        self.level = 0.0;
                        self.state = EnvelopeState::Idle;
                    } else {
                        self.time += dt;
                    }
                } else {
                    self.level = 0.0;
                    self.state = EnvelopeState::Idle;
                }
            }
            EnvelopeState::Idle => {
                self.level = 0.0;
            }
        }

        self.level
    }
}
