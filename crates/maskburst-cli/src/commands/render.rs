//! Render command implementation
//!
//! Bounces a configuration offline and writes a 16-bit stereo WAV file.

use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;
use maskburst_engine::config::EngineConfig;
use maskburst_engine::offline::render_offline;
use maskburst_engine::wav::{pcm_hash, samples_to_pcm16, write_wav_to_vec, WavFormat};
use tracing::debug;

/// Run the render command
///
/// # Arguments
/// * `config` - Validated engine configuration
/// * `duration_secs` - Length of the rendered bounce
/// * `sample_rate` - Output sample rate in Hz
/// * `out` - Destination WAV path
pub fn run(
    config: EngineConfig,
    duration_secs: f64,
    sample_rate: u32,
    out: &str,
) -> Result<ExitCode> {
    let start = Instant::now();
    println!(
        "{} {:.1} s at {} Hz",
        "Rendering:".cyan().bold(),
        duration_secs,
        sample_rate
    );

    let samples = render_offline(config, duration_secs, f64::from(sample_rate))?;
    debug!("rendered {} stereo frames in {:.2?}", samples.len() / 2, start.elapsed());
    let pcm = samples_to_pcm16(&samples);
    let hash = pcm_hash(&pcm);
    let wav = write_wav_to_vec(&WavFormat::stereo(sample_rate), &pcm);

    std::fs::write(Path::new(out), &wav)
        .with_context(|| format!("Failed to write WAV file: {}", out))?;
    debug!("wrote {} bytes to {}", wav.len(), out);

    println!(
        "{} {} ({} frames)",
        "Wrote:".green().bold(),
        out,
        samples.len() / 2
    );
    println!("{} {}", "PCM hash:".cyan().bold(), hash);
    println!("{} {:.2?}", "Elapsed:".dimmed(), start.elapsed());
    Ok(ExitCode::SUCCESS)
}
