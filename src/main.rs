use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clinscribe::audio::asset::{AudioAsset, format_size};
use clinscribe::audio::format::AudioFormat;
use clinscribe::audio::segmenter;
use clinscribe::audio::size_gate::SizeGate;
use clinscribe::cli::{Cli, Commands, ConfigAction};
use clinscribe::config::Config;
use clinscribe::pipeline::{
    Pipeline, PipelineConfig, PipelineEvent, PipelineState, TranscriptionResponse,
};
use clinscribe::stt::HttpProvider;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    tracing::debug!(version = %clinscribe::version_string(), "starting");

    match cli.command {
        Commands::Transcribe {
            file,
            mime,
            language,
            prompt,
            temperature,
            timeout,
            json,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(language) = language {
                config.transcription.language = language;
            }
            if let Some(prompt) = prompt {
                config.transcription.prompt = prompt;
            }
            if let Some(temperature) = temperature {
                config.transcription.temperature = temperature;
            }
            if let Some(timeout) = timeout {
                config.provider.timeout_secs = timeout.as_secs().max(1);
            }
            config.validate()?;

            let success =
                handle_transcribe(&config, &file, mime.as_deref(), json, cli.quiet).await?;
            if !success {
                std::process::exit(1);
            }
        }
        Commands::Plan {
            file,
            mime,
            max_bytes,
        } => {
            let config = load_config(cli.config.as_deref())?;
            handle_plan(&config, &file, mime.as_deref(), max_bytes)?;
        }
        Commands::Formats => {
            let config = load_config(cli.config.as_deref())?;
            list_formats(&config);
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "clinscribe",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Route `tracing` output to stderr. `RUST_LOG` wins over `-v`/`-q`.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clinscribe={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        }
    };

    let config = config.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Run the full pipeline against the configured provider.
///
/// Returns whether the transcription succeeded (fully or partially).
async fn handle_transcribe(
    config: &Config,
    file: &Path,
    mime: Option<&str>,
    json: bool,
    quiet: bool,
) -> Result<bool> {
    let asset = AudioAsset::from_path(file, mime)?;
    let provider = HttpProvider::from_config(&config.provider)?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let pipeline = Pipeline::new(
        PipelineConfig::from_config(config).with_events(event_tx),
        Arc::new(provider),
    );
    let progress = tokio::spawn(report_progress(event_rx, quiet || json));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted; finishing without further requests".yellow());
            on_interrupt.cancel();
        }
    });

    let result = pipeline
        .run_with_cancel(&asset, &config.transcription_options(), &cancel)
        .await;
    // Dropping the pipeline closes the event channel so the reporter ends
    drop(pipeline);
    if let Err(e) = progress.await {
        eprintln!("Progress reporter stopped unexpectedly: {}", e);
    }

    let response = TranscriptionResponse::from_result(&result, asset.len());
    if json {
        println!("{}", response.to_json()?);
    } else {
        if let Some(transcript) = response.printable_transcript() {
            println!("{}", transcript);
        } else if response.success {
            println!();
        }
        if let Some(message) = &response.message {
            if response.success {
                eprintln!("{}", message.yellow());
            } else {
                eprintln!("{}", message.red());
            }
        }
        if !quiet {
            for error in &response.errors {
                eprintln!(
                    "  {} segment {}: {}",
                    "failed".red(),
                    error.index,
                    error.message
                );
            }
        }
    }

    Ok(response.success)
}

async fn report_progress(mut events: mpsc::UnboundedReceiver<PipelineEvent>, silent: bool) {
    while let Some(event) = events.recv().await {
        if silent {
            continue;
        }
        match event {
            PipelineEvent::StateChanged(PipelineState::Splitting) => {
                eprintln!("{}", "Recording exceeds provider limit; splitting".dimmed());
            }
            PipelineEvent::SegmentStarted { index, total } if total > 1 => {
                eprintln!(
                    "{}",
                    format!("Transcribing segment {}/{}", index + 1, total).dimmed()
                );
            }
            PipelineEvent::SegmentFinished {
                index,
                success: false,
                attempts,
                ..
            } => {
                eprintln!(
                    "{}",
                    format!("Segment {} failed after {} attempt(s)", index + 1, attempts).yellow()
                );
            }
            _ => {}
        }
    }
}

/// Validate and segment a recording without calling the provider.
fn handle_plan(
    config: &Config,
    file: &Path,
    mime: Option<&str>,
    max_bytes: Option<u64>,
) -> Result<()> {
    let asset = AudioAsset::from_path(file, mime)?;
    let format = config.format_validator().validate(asset.mime_type())?;
    let ceiling = max_bytes.unwrap_or(config.limits.max_segment_bytes);
    if ceiling == 0 {
        anyhow::bail!("--max-bytes must be greater than 0");
    }

    println!("{} ({}, {})", file.display(), format, asset.human_size());
    if !SizeGate::new(ceiling).needs_splitting(&asset) {
        println!(
            "Fits the {} ceiling; sent as a single request",
            format_size(ceiling)
        );
        return Ok(());
    }

    let segments = segmenter::split(&asset, ceiling)?;
    println!(
        "{} segments under the {} ceiling:",
        segments.len(),
        format_size(ceiling)
    );
    for segment in &segments {
        let duration = segment
            .duration
            .map(|d| format!("~{:.1}s", d.as_secs_f64()))
            .unwrap_or_else(|| "?".to_string());
        println!(
            "  {}  {:>10}  bytes {}..{}  {}",
            segment.file_name(),
            format_size(segment.len()),
            segment.byte_range.start,
            segment.byte_range.end,
            duration.dimmed()
        );
    }
    Ok(())
}

fn list_formats(config: &Config) {
    let validator = config.format_validator();
    println!("Supported audio formats:");
    for format in AudioFormat::ALL {
        let enabled = validator.allowed().contains(&format);
        let note = if format.is_splittable() {
            "splits when oversized"
        } else {
            "single request only"
        };
        let line = format!("  {:<5} {:<11} {}", format.name(), format.mime_type(), note);
        if enabled {
            println!("{}", line);
        } else {
            println!("{} {}", line.dimmed(), "(disabled)".dimmed());
        }
    }
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut config = load_config(custom_path)?;
            if !config.provider.api_key.is_empty() {
                config.provider.api_key = "<redacted>".to_string();
            }
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            let path: Option<PathBuf> = custom_path
                .map(Path::to_path_buf)
                .or_else(Config::default_path);
            match path {
                Some(path) => println!("{}", path.display()),
                None => anyhow::bail!("Cannot determine the configuration directory"),
            }
        }
    }
    Ok(())
}
