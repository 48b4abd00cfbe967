//! Play command implementation
//!
//! Drives real-time playback on the default audio output device.

use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use colored::Colorize;
use maskburst_engine::config::{AudioMode, EngineConfig};
use maskburst_engine::controller::PlaybackController;
use tracing::debug;

/// Poll interval for the control loop.
const TICK_INTERVAL: Duration = Duration::from_millis(5);

/// Run the play command
///
/// # Arguments
/// * `config` - Validated engine configuration
/// * `duration_secs` - How long to play before stopping
pub fn run(config: EngineConfig, duration_secs: f64) -> Result<ExitCode> {
    if !(duration_secs.is_finite() && duration_secs > 0.0) {
        anyhow::bail!("duration must be a positive number of seconds");
    }

    let mode = match config.mode {
        AudioMode::Tone => "tone",
        AudioMode::ShapedNoise => "shaped-noise",
    };
    println!("{} {}", "Mode:".cyan().bold(), mode);
    println!(
        "{} {:.1} Hz center, {:.2} octaves",
        "Mask band:".cyan().bold(),
        config.center_freq_hz,
        config.bandwidth_octaves
    );
    println!(
        "{} {} channel(s), {:.0} ms stagger, {:.0} ms steps",
        "Spatial:".cyan().bold(),
        config.channel_count,
        config.stagger_delay_ms,
        config.step_delay_ms
    );

    let mut controller = PlaybackController::new(config)?;
    debug!("output device open");
    controller.toggle_playback()?;
    println!("{} {:.1} s", "Playing for".green().bold(), duration_secs);

    let deadline = Instant::now() + Duration::from_secs_f64(duration_secs);
    while Instant::now() < deadline {
        let now = controller.position();
        controller.tick(now);
        thread::sleep(TICK_INTERVAL);
    }

    controller.toggle_playback()?;
    debug!("stopped at sample {}", controller.position());
    // Let the release tail ring out before tearing the device down.
    thread::sleep(Duration::from_millis(300));
    controller.dispose();

    Ok(ExitCode::SUCCESS)
}
