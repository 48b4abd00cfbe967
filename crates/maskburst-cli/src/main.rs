//! MaskBurst CLI - Command-line interface for the masking-pattern burst engine
//!
//! This binary provides commands for real-time playback, offline rendering,
//! and pattern inspection.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use maskburst_engine::config::{AudioMode, EngineConfig, PositionMarker};

mod commands;

/// MaskBurst - Masking-Pattern Burst Engine
#[derive(Parser)]
#[command(name = "maskburst")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a configuration in real time on the default audio device
    Play {
        #[command(flatten)]
        config: ConfigArgs,

        /// Playback duration in seconds
        #[arg(short, long, default_value_t = 10.0)]
        duration: f64,
    },

    /// Render a configuration offline to a 16-bit stereo WAV file
    Render {
        #[command(flatten)]
        config: ConfigArgs,

        /// Render duration in seconds
        #[arg(short, long, default_value_t = 10.0)]
        duration: f64,

        /// Output WAV path
        #[arg(short, long, default_value = "bursts.wav")]
        out: String,

        /// Output sample rate in Hz
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
    },

    /// Print the derived pattern step table
    Pattern {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Synthesis mode flag.
#[derive(Clone, Copy, PartialEq, Eq, Debug, ValueEnum)]
enum ModeArg {
    /// Log-spaced tone bank with slope-shaped gains
    Tone,
    /// Looping sloped-noise buffer with notch filtering
    ShapedNoise,
}

impl From<ModeArg> for AudioMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Tone => AudioMode::Tone,
            ModeArg::ShapedNoise => AudioMode::ShapedNoise,
        }
    }
}

/// Engine parameters shared by every subcommand.
#[derive(Args)]
struct ConfigArgs {
    /// Synthesis mode
    #[arg(long, value_enum, default_value = "shaped-noise")]
    mode: ModeArg,

    /// Mask center frequency in Hz (100-10000)
    #[arg(long, default_value_t = 500.0)]
    center: f64,

    /// Mask bandwidth in octaves (0.1-4.0)
    #[arg(long, default_value_t = 2.0)]
    bandwidth: f64,

    /// Number of spatial channels (1-5)
    #[arg(long, default_value_t = 1)]
    channels: usize,

    /// Per-channel onset stagger within a step in ms (0-200)
    #[arg(long, default_value_t = 50.0)]
    stagger: f64,

    /// Number of frequencies in the tone bank (10-500)
    #[arg(long, default_value_t = 100)]
    freq_count: usize,

    /// Delay between pattern steps in ms (50-2000)
    #[arg(long, default_value_t = 500.0)]
    step: f64,

    /// Envelope attack time in ms (2-200)
    #[arg(long, default_value_t = 100.0)]
    attack: f64,

    /// Envelope release time in ms (2-200)
    #[arg(long, default_value_t = 100.0)]
    release: f64,

    /// Spectral slope for tone banks in dB/octave
    #[arg(long, default_value_t = -4.5, allow_negative_numbers = true)]
    slope: f64,

    /// Burst peak level for tone voices (0-1)
    #[arg(long, default_value_t = 0.5)]
    tone_volume: f64,

    /// Burst peak level for noise voices (0-1)
    #[arg(long, default_value_t = 1.0)]
    noise_volume: f64,

    /// Lower bound of the generated frequency set in Hz
    #[arg(long, default_value_t = 40.0)]
    min_freq: f64,

    /// Upper bound of the generated frequency set in Hz
    #[arg(long, default_value_t = 14_000.0)]
    max_freq: f64,

    /// Master seed for per-voice random state
    #[arg(long, default_value_t = 0)]
    seed: u32,

    /// Custom position marker as `channel:freq_hz` (repeatable)
    #[arg(long = "marker", value_parser = parse_marker)]
    markers: Vec<PositionMarker>,
}

impl ConfigArgs {
    /// Builds a validated engine configuration from the parsed flags.
    fn into_config(self) -> anyhow::Result<EngineConfig> {
        let config = EngineConfig {
            mode: self.mode.into(),
            center_freq_hz: self.center,
            bandwidth_octaves: self.bandwidth,
            channel_count: self.channels,
            stagger_delay_ms: self.stagger,
            frequency_count: self.freq_count,
            step_delay_ms: self.step,
            attack_ms: self.attack,
            release_ms: self.release,
            slope_db_per_octave: self.slope,
            tone_volume: self.tone_volume,
            noise_volume: self.noise_volume,
            min_freq_hz: self.min_freq,
            max_freq_hz: self.max_freq,
            seed: self.seed,
            custom_positions: self.markers,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parses a `channel:freq_hz` marker flag.
fn parse_marker(s: &str) -> Result<PositionMarker, String> {
    let (channel, freq) = s
        .split_once(':')
        .ok_or_else(|| format!("expected channel:freq_hz, got '{}'", s))?;
    let channel = channel
        .trim()
        .parse::<usize>()
        .map_err(|_| format!("invalid channel index '{}'", channel))?;
    let freq_hz = freq
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid frequency '{}'", freq))?;
    Ok(PositionMarker { channel, freq_hz })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Play { config, duration } => config
            .into_config()
            .and_then(|config| commands::play::run(config, duration)),
        Commands::Render {
            config,
            duration,
            out,
            sample_rate,
        } => config
            .into_config()
            .and_then(|config| commands::render::run(config, duration, sample_rate, &out)),
        Commands::Pattern { config, json } => config
            .into_config()
            .and_then(|config| commands::pattern::run(config, json)),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_parses_render_defaults() {
        let cli = Cli::try_parse_from(["maskburst", "render"]).unwrap();
        match cli.command {
            Commands::Render {
                config,
                duration,
                out,
                sample_rate,
            } => {
                assert_eq!(config.mode, ModeArg::ShapedNoise);
                assert_eq!(duration, 10.0);
                assert_eq!(out, "bursts.wav");
                assert_eq!(sample_rate, 44_100);
            }
            _ => panic!("expected render command"),
        }
    }

    #[test]
    fn test_cli_parses_play_flags() {
        let cli = Cli::try_parse_from([
            "maskburst",
            "play",
            "--mode",
            "tone",
            "--center",
            "1000",
            "--channels",
            "3",
            "--slope",
            "-6",
            "--duration",
            "4",
        ])
        .unwrap();
        match cli.command {
            Commands::Play { config, duration } => {
                assert_eq!(config.mode, ModeArg::Tone);
                assert_eq!(config.center, 1000.0);
                assert_eq!(config.channels, 3);
                assert_eq!(config.slope, -6.0);
                assert_eq!(duration, 4.0);
            }
            _ => panic!("expected play command"),
        }
    }

    #[test]
    fn test_cli_parses_markers() {
        let cli = Cli::try_parse_from([
            "maskburst",
            "pattern",
            "--channels",
            "2",
            "--marker",
            "0:500",
            "--marker",
            "1:4000",
        ])
        .unwrap();
        match cli.command {
            Commands::Pattern { config, json } => {
                assert!(!json);
                assert_eq!(config.markers.len(), 2);
                assert_eq!(config.markers[0].channel, 0);
                assert_eq!(config.markers[0].freq_hz, 500.0);
                assert_eq!(config.markers[1].channel, 1);
                assert_eq!(config.markers[1].freq_hz, 4000.0);
            }
            _ => panic!("expected pattern command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        let err = Cli::try_parse_from(["maskburst", "play", "--mode", "sine"])
            .err()
            .unwrap();
        assert!(err.to_string().contains("sine"));
    }

    #[test]
    fn test_marker_parser_rejects_garbage() {
        assert!(parse_marker("nope").is_err());
        assert!(parse_marker("x:500").is_err());
        assert!(parse_marker("1:abc").is_err());
        assert!(parse_marker("0:250").is_ok());
    }

    #[test]
    fn test_into_config_validates_ranges() {
        let cli = Cli::try_parse_from(["maskburst", "pattern", "--center", "50"]).unwrap();
        let config = match cli.command {
            Commands::Pattern { config, .. } => config,
            _ => panic!("expected pattern command"),
        };

        let err = config.into_config().unwrap_err();
        assert!(err.to_string().contains("center_freq_hz"));
    }

    #[test]
    fn test_into_config_builds_defaults() {
        let cli = Cli::try_parse_from(["maskburst", "pattern"]).unwrap();
        let config = match cli.command {
            Commands::Pattern { config, .. } => config,
            _ => panic!("expected pattern command"),
        };

        assert_eq!(config.into_config().unwrap(), EngineConfig::default());
    }
}
