use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use livedub::cli::{CalibrationAction, Cli, Commands, ConfigAction};
use livedub::config::Config;
use livedub::output::render_record;
use livedub::pipeline::calibration::{CalibrationModel, CalibrationStore};
use livedub::pipeline::latency::format_duration;
use livedub::pipeline::{Pipeline, PipelineConfig};
use livedub::recognizer::{LanguagePair, ScriptedRecognizer, parse_script};
use livedub::tts::{SimulatedSynthesizer, SimulatedTiming, VoiceSettings};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    tracing::debug!(version = %livedub::version_string(), "livedub starting");

    match cli.command {
        Commands::Replay {
            script,
            time_scale,
            no_intermediate,
            rate,
            drain_timeout,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if no_intermediate {
                config.translation.intermediate_translations = false;
            }
            if let Some(rate) = rate {
                config.synthesis.prosody_rate = rate;
            }
            if let Some(ms) = drain_timeout {
                config.pipeline.drain_timeout_ms = ms;
            }
            config.validate()?;
            run_replay(&config, &script, time_scale, cli.quiet)?;
        }
        Commands::Calibration { action } => {
            let config = load_config(cli.config.as_deref())?;
            handle_calibration_command(&config, action)?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "livedub",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("livedub={level}"))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        // Load from custom path
        Config::load(path)?
    } else {
        // Try default path, fall back to defaults
        Config::load_or_default(&Config::default_path())?
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

/// Replays a recognizer script against the simulated voice.
fn run_replay(config: &Config, script: &Path, time_scale: f64, quiet: bool) -> Result<()> {
    let contents = std::fs::read_to_string(script)
        .with_context(|| format!("Failed to read script {}", script.display()))?;
    let steps = parse_script(&contents)?;
    if steps.is_empty() {
        anyhow::bail!("Script {} contains no events", script.display());
    }

    let store = CalibrationStore::new(config.calibration_path());
    let model = match store.load(&config.synthesis.prosody_rate) {
        Ok(model) => model.unwrap_or_default(),
        Err(e) => {
            eprintln!("{} {e}; using default timing", "Warning:".yellow());
            CalibrationModel::default()
        }
    };
    let timing = SimulatedTiming::from(&model).scaled(time_scale);

    let recognizer = ScriptedRecognizer::new(steps).with_languages(LanguagePair {
        source: config.translation.source_language.clone(),
        target: config.translation.target_language.clone(),
    });
    let synthesizer = SimulatedSynthesizer::new(VoiceSettings::from(config), timing);

    let handle = Pipeline::new(PipelineConfig::from(config))
        .with_calibration_store(store)
        .start(Box::new(recognizer), Box::new(synthesizer))?;

    let color = std::io::stderr().is_terminal();
    for record in handle.records().iter() {
        if !quiet {
            render_record(&record, color);
        }
    }

    let report = handle.wait()?;
    if !quiet {
        eprintln!("{} {}", "Session:".dimmed(), report.stats.summary());
    }
    Ok(())
}

fn handle_calibration_command(config: &Config, action: CalibrationAction) -> Result<()> {
    let store = CalibrationStore::new(config.calibration_path());

    match action {
        CalibrationAction::Show { rate } => {
            let key = rate.unwrap_or_else(|| config.synthesis.prosody_rate.clone());
            match store.load(&key)? {
                Some(model) => print_model(&key, &model, store.path()),
                None => {
                    println!(
                        "No calibration recorded for rate {} in {}",
                        key.green(),
                        store.path().display()
                    );
                    print_model(&key, &CalibrationModel::default(), store.path());
                }
            }
        }
        CalibrationAction::Reset { rate } => {
            let key = rate.unwrap_or_else(|| config.synthesis.prosody_rate.clone());
            if store.reset(&key)? {
                println!("{}", format!("Calibration for rate {key} reset").green());
            } else {
                println!("No calibration recorded for rate {key}");
            }
        }
    }

    Ok(())
}

fn print_model(key: &str, model: &CalibrationModel, path: &Path) {
    println!("  {}       {}", "Rate:".dimmed(), key);
    println!("  {}       {}", "File:".dimmed(), path.display());
    println!(
        "  {}       {:.3}s",
        "Base:".dimmed(),
        model.base_latency_seconds
    );
    println!(
        "  {}   {:.4}s",
        "Per char:".dimmed(),
        model.per_char_latency_seconds
    );
    println!("  {}    {}", "Samples:".dimmed(), model.samples.len());
    if let Some(mean) = model.mean_latency() {
        println!("  {}       {}", "Mean:".dimmed(), format_duration(mean));
    }
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Path => {
            let path: PathBuf = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            print!("{rendered}");
        }
    }
    Ok(())
}
