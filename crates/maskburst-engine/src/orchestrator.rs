//! Pattern step sequencing.
//!
//! The orchestrator is a passive state machine: a driver supplies the
//! current audio clock through [`tick`](PatternOrchestrator::tick) and the
//! orchestrator dispatches whatever came due. Each pattern step schedules
//! one trigger task per channel, staggered by the configured delay, then one
//! step-advance task that moves the sequence along. `stop` cancels only the
//! step-advance task; triggers already in the queue fire and decay on their
//! own.

use tracing::warn;

use crate::frequency::apply_frequency_masks;
use crate::pattern::{BurstPattern, FrequencyMask};
use crate::scheduler::{TaskId, TaskQueue};
use crate::voice::{BurstParams, BurstVoice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrchestratorState {
    Idle,
    Stepping,
}

enum OrchestratorTask {
    Trigger {
        channel: usize,
        params: BurstParams,
        mask: Option<FrequencyMask>,
    },
    StepAdvance,
}

/// Drives a bank of voices through the steps of a [`BurstPattern`].
pub struct PatternOrchestrator<V: BurstVoice> {
    sample_rate: f64,
    voices: Vec<V>,
    base_frequencies: Vec<f64>,
    pattern: Option<BurstPattern>,
    state: OrchestratorState,
    current_step: usize,
    queue: TaskQueue<OrchestratorTask>,
    step_task: Option<TaskId>,
    stagger_delay_ms: f64,
    step_delay_ms: f64,
    attack_ms: f64,
    release_ms: f64,
    slope_db_per_octave: f64,
    volume: f64,
}

impl<V: BurstVoice> PatternOrchestrator<V> {
    /// Creates an idle orchestrator with no voices, pattern, or frequencies.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            voices: Vec::new(),
            base_frequencies: Vec::new(),
            pattern: None,
            state: OrchestratorState::Idle,
            current_step: 0,
            queue: TaskQueue::new(),
            step_task: None,
            stagger_delay_ms: 50.0,
            step_delay_ms: 500.0,
            attack_ms: 100.0,
            release_ms: 100.0,
            slope_db_per_octave: -4.5,
            volume: 0.5,
        }
    }

    /// Replaces the voice bank.
    ///
    /// Playback stops and all pending tasks are dropped first so nothing in
    /// the queue can reference a released voice.
    pub fn set_voices(&mut self, voices: Vec<V>) {
        self.stop();
        self.queue.clear();
        self.voices = voices;
    }

    /// Replaces the pattern. The sequence restarts from step zero.
    pub fn set_pattern(&mut self, pattern: BurstPattern) {
        self.pattern = Some(pattern);
        self.current_step = 0;
    }

    /// Replaces the base frequency set masks are applied to.
    pub fn set_base_frequencies(&mut self, frequencies: Vec<f64>) {
        self.base_frequencies = frequencies;
    }

    /// Sets the delay between channel onsets within one step.
    pub fn set_stagger_delay_ms(&mut self, ms: f64) {
        self.stagger_delay_ms = ms;
    }

    /// Sets the delay between pattern steps.
    pub fn set_step_delay_ms(&mut self, ms: f64) {
        self.step_delay_ms = ms;
    }

    /// Sets the envelope attack time for subsequent bursts.
    pub fn set_attack_ms(&mut self, ms: f64) {
        self.attack_ms = ms;
    }

    /// Sets the envelope release time for subsequent bursts.
    pub fn set_release_ms(&mut self, ms: f64) {
        self.release_ms = ms;
    }

    /// Sets the spectral slope for subsequent bursts.
    pub fn set_slope_db(&mut self, db_per_octave: f64) {
        self.slope_db_per_octave = db_per_octave;
    }

    /// Sets the burst peak level for subsequent bursts.
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    /// True while the step sequence is running.
    pub fn is_playing(&self) -> bool {
        self.state == OrchestratorState::Stepping
    }

    /// Clock position of the earliest pending task, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.next_deadline()
    }

    /// Number of pending tasks.
    pub fn pending_tasks(&self) -> usize {
        self.queue.pending()
    }

    /// Starts the step sequence from step zero.
    ///
    /// Requires a pattern with steps and a non-empty frequency set. Calling
    /// `play` while already stepping is ignored so the cadence never
    /// doubles.
    pub fn play(&mut self, now: u64) {
        if self.state == OrchestratorState::Stepping {
            warn!("already playing, ignoring play request");
            return;
        }
        match &self.pattern {
            None => {
                warn!("cannot play without a pattern");
                return;
            }
            Some(pattern) if pattern.steps.is_empty() => {
                warn!("cannot play an empty pattern");
                return;
            }
            Some(_) => {}
        }
        if self.base_frequencies.is_empty() {
            warn!("cannot play without frequencies");
            return;
        }

        self.state = OrchestratorState::Stepping;
        self.current_step = 0;
        self.execute_step(now);
    }

    /// Stops the step sequence.
    ///
    /// Cancels only the pending step-advance task. Per-channel triggers
    /// already scheduled fire normally and their envelopes decay on their
    /// own. Idempotent.
    pub fn stop(&mut self) {
        self.state = OrchestratorState::Idle;
        if let Some(id) = self.step_task.take() {
            self.queue.cancel(id);
        }
    }

    /// Stops, drops every pending task, and releases all voices.
    ///
    /// No voice method runs after this returns.
    pub fn dispose(&mut self) {
        self.stop();
        self.queue.clear();
        self.voices.clear();
    }

    /// Executes every task due at `now`.
    pub fn tick(&mut self, now: u64) {
        while let Some(task) = self.queue.pop_due(now) {
            match task {
                OrchestratorTask::Trigger {
                    channel,
                    params,
                    mask,
                } => {
                    if let Some(voice) = self.voices.get_mut(channel) {
                        voice.set_params(&params, mask);
                        voice.play();
                    }
                }
                OrchestratorTask::StepAdvance => {
                    self.step_task = None;
                    if self.state == OrchestratorState::Stepping {
                        self.execute_step(now);
                    }
                }
            }
        }
    }

    /// Schedules the current step's triggers and the next step advance.
    fn execute_step(&mut self, now: u64) {
        let Some(pattern) = self.pattern.as_ref() else {
            self.state = OrchestratorState::Idle;
            return;
        };
        let step_count = pattern.steps.len();
        if step_count == 0 {
            self.state = OrchestratorState::Idle;
            return;
        }
        let repeat = pattern.repeat;
        let step = pattern.steps[self.current_step % step_count].clone();

        for channel in 0..self.voices.len() {
            let masks = step.channel_masks(channel);
            let params = BurstParams {
                frequencies: apply_frequency_masks(&self.base_frequencies, masks),
                attack_ms: self.attack_ms,
                release_ms: self.release_ms,
                slope_db_per_octave: self.slope_db_per_octave,
                volume: self.volume,
            };
            let mask = masks.first().copied();
            let at = now + self.samples_from_ms(channel as f64 * self.stagger_delay_ms);
            self.queue.schedule(
                at,
                OrchestratorTask::Trigger {
                    channel,
                    params,
                    mask,
                },
            );
        }

        self.current_step = (self.current_step + 1) % step_count;
        if repeat || self.current_step != 0 {
            // A zero step delay would respawn the step task at the same
            // instant, so the advance always lands at least one sample out.
            let delay = self.samples_from_ms(self.step_delay_ms).max(1);
            self.step_task = Some(self.queue.schedule(now + delay, OrchestratorTask::StepAdvance));
        } else {
            self.state = OrchestratorState::Idle;
            self.step_task = None;
        }
    }

    fn samples_from_ms(&self, ms: f64) -> u64 {
        (ms / 1000.0 * self.sample_rate).round() as u64
    }
}
