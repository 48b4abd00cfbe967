//! Pattern command implementation
//!
//! Prints the derived step table for a configuration, either as a colored
//! table or as JSON.

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use maskburst_engine::config::EngineConfig;
use maskburst_engine::pattern::{build_pattern, BurstPattern};

/// Run the pattern command
pub fn run(config: EngineConfig, json: bool) -> Result<ExitCode> {
    let pattern = build_pattern(&config);

    if json {
        println!("{}", serde_json::to_string_pretty(&pattern)?);
        return Ok(ExitCode::SUCCESS);
    }

    print_table(&pattern);
    Ok(ExitCode::SUCCESS)
}

fn print_table(pattern: &BurstPattern) {
    println!(
        "{} {} steps, {}",
        "Pattern:".cyan().bold(),
        pattern.steps.len(),
        if pattern.repeat {
            "repeating"
        } else {
            "one-shot"
        }
    );

    for (index, step) in pattern.steps.iter().enumerate() {
        println!("{}", format!("step {}", index).bold());
        for (channel, masks) in step.masks.iter().enumerate() {
            if masks.is_empty() {
                println!("  ch {}: {}", channel, "full band".green());
            } else {
                let bands: Vec<String> = masks
                    .iter()
                    .map(|m| format!("{:.1}-{:.1} Hz", m.low_hz, m.high_hz))
                    .collect();
                println!(
                    "  ch {}: {} {}",
                    channel,
                    "masked".yellow(),
                    bands.join(", ")
                );
            }
        }
    }
}
