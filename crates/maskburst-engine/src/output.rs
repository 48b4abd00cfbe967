//! Audio output plumbing.
//!
//! [`link`] wires a control-side [`OutputHandle`] to a [`RenderEngine`] over
//! an event channel and a shared sample clock. [`AudioOutput`] couples that
//! pair to the default output device: a render thread fills an SPSC ring
//! with interleaved stereo blocks and the device callback drains it,
//! converting to the stream's sample format. The offline renderer drives the
//! same pair without a device.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use tracing::{debug, error};

use crate::engine::{EngineEvent, RenderEngine, VoiceId, RENDER_BLOCK_FRAMES};
use crate::error::{EngineError, EngineResult};

/// Depth of the device ring buffer in seconds of audio.
const RING_BUFFER_SECONDS: f64 = 0.15;

/// Control-side endpoint of a render engine.
///
/// Cheap to clone; every clone shares the same event channel, sample clock,
/// and voice id counter. All voice and controller communication with the
/// render side goes through a handle.
#[derive(Clone)]
pub struct OutputHandle {
    tx: mpsc::Sender<EngineEvent>,
    clock: Arc<AtomicU64>,
    sample_rate: f64,
    next_voice_id: Arc<AtomicU64>,
}

impl OutputHandle {
    /// Sends an event to the render engine.
    ///
    /// Events sent after the render side has shut down are dropped.
    pub fn send(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            debug!("engine event dropped, render side closed");
        }
    }

    /// Current engine position in samples.
    ///
    /// This is the number of frames rendered so far and serves as the audio
    /// clock for all scheduling.
    pub fn now(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    /// Sample rate of the connected engine.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Reserves a fresh voice id.
    pub fn allocate_voice_id(&self) -> VoiceId {
        VoiceId(self.next_voice_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Creates a connected handle/engine pair without attaching a device.
pub fn link(sample_rate: f64) -> (OutputHandle, RenderEngine) {
    let clock = Arc::new(AtomicU64::new(0));
    let (tx, rx) = mpsc::channel();
    let handle = OutputHandle {
        tx,
        clock: clock.clone(),
        sample_rate,
        next_voice_id: Arc::new(AtomicU64::new(0)),
    };
    let engine = RenderEngine::new(sample_rate, rx, clock);
    (handle, engine)
}

/// Real-time audio output bound to the default device.
///
/// Owns the render thread and the device stream. Dropping it stops the
/// render thread, then releases the stream.
pub struct AudioOutput {
    handle: OutputHandle,
    shutdown: Arc<AtomicBool>,
    render_thread: Option<JoinHandle<()>>,
    _stream: cpal::Stream,
}

impl AudioOutput {
    /// Opens the default output device and starts rendering.
    ///
    /// # Errors
    /// Returns [`EngineError::DeviceUnavailable`] when no device exists, the
    /// stream cannot be built, or the sample format is unsupported.
    pub fn open() -> EngineResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::device("no default output device"))?;
        let config = device
            .default_output_config()
            .map_err(|e| EngineError::device(e.to_string()))?;

        let sample_rate = config.sample_rate().0 as f64;
        let channels = config.channels() as usize;
        let (handle, engine) = link(sample_rate);

        let ring_frames = (sample_rate * RING_BUFFER_SECONDS) as usize;
        let ring = HeapRb::<f32>::new(ring_frames * 2);
        let (producer, mut consumer) = ring.split();

        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = shutdown.clone();
        let render_thread = thread::Builder::new()
            .name("maskburst-render".to_string())
            .spawn(move || render_loop(engine, producer, thread_shutdown))?;

        let err_fn = |err| error!("audio stream error: {}", err);
        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let left = consumer.try_pop().unwrap_or(0.0);
                        let right = consumer.try_pop().unwrap_or(0.0);
                        write_frame_f32(frame, left, right);
                    }
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_output_stream(
                &config.into(),
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let left = consumer.try_pop().unwrap_or(0.0);
                        let right = consumer.try_pop().unwrap_or(0.0);
                        write_frame_i16(frame, left, right);
                    }
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::U16 => device.build_output_stream(
                &config.into(),
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let left = consumer.try_pop().unwrap_or(0.0);
                        let right = consumer.try_pop().unwrap_or(0.0);
                        write_frame_u16(frame, left, right);
                    }
                },
                err_fn,
                None,
            ),
            other => {
                return Err(EngineError::device(format!(
                    "unsupported sample format: {}",
                    other
                )))
            }
        };
        let stream = stream.map_err(|e| EngineError::device(e.to_string()))?;
        stream.play().map_err(|e| EngineError::device(e.to_string()))?;

        debug!("audio output open: {} Hz, {} channels", sample_rate, channels);

        Ok(Self {
            handle,
            shutdown,
            render_thread: Some(render_thread),
            _stream: stream,
        })
    }

    /// Control handle for this output.
    pub fn handle(&self) -> &OutputHandle {
        &self.handle
    }

    /// Sample rate of the device stream.
    pub fn sample_rate(&self) -> f64 {
        self.handle.sample_rate
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.render_thread.take() {
            let _ = thread.join();
        }
        debug!("audio output closed");
    }
}

/// Render thread body: fill the ring whenever a whole block fits.
fn render_loop(mut engine: RenderEngine, mut producer: HeapProd<f32>, shutdown: Arc<AtomicBool>) {
    let mut block = vec![0.0f32; RENDER_BLOCK_FRAMES * 2];
    let mut primed = false;
    let mut underruns = 0u64;
    let mut last_report = Instant::now();
    while !shutdown.load(Ordering::Acquire) {
        // An empty ring after priming means the device callback ran dry
        // and emitted silence.
        if primed && producer.is_empty() {
            underruns += 1;
        }
        if producer.vacant_len() >= block.len() {
            engine.render_block(&mut block);
            producer.push_slice(&block);
            primed = true;
        } else {
            thread::sleep(Duration::from_millis(1));
        }
        if underruns > 0 && last_report.elapsed() >= Duration::from_secs(1) {
            debug!("ring buffer ran dry {} times in the last second", underruns);
            underruns = 0;
            last_report = Instant::now();
        }
    }
}

fn write_frame_f32(frame: &mut [f32], left: f32, right: f32) {
    match frame {
        [mono] => *mono = 0.5 * (left + right),
        [l, r, rest @ ..] => {
            *l = left;
            *r = right;
            rest.fill(0.0);
        }
        [] => {}
    }
}

fn write_frame_i16(frame: &mut [i16], left: f32, right: f32) {
    match frame {
        [mono] => *mono = to_i16(0.5 * (left + right)),
        [l, r, rest @ ..] => {
            *l = to_i16(left);
            *r = to_i16(right);
            rest.fill(0);
        }
        [] => {}
    }
}

fn write_frame_u16(frame: &mut [u16], left: f32, right: f32) {
    match frame {
        [mono] => *mono = to_u16(0.5 * (left + right)),
        [l, r, rest @ ..] => {
            *l = to_u16(left);
            *r = to_u16(right);
            // Unsigned silence sits at mid-scale.
            rest.fill(32768);
        }
        [] => {}
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

fn to_u16(sample: f32) -> u16 {
    (sample * 32767.0 + 32768.0).clamp(0.0, 65535.0) as u16
}
