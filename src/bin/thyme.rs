//! Headless kiosk runner.
//!
//! Writes every sink event to stdout as newline-delimited JSON and reads
//! simple line commands from stdin:
//!
//! - `reload` fetches every feed now
//! - `alarm add HH:MM` / `alarm remove HH:MM`
//! - `alarms` prints the alarm panel text
//! - `status` prints per-task refresh status
//!
//! All tracing output goes to stderr and a daily log file so that stdout
//! stays a clean JSON channel.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use thyme::{AlarmTime, ChannelSink, Kiosk, SinkEvent, SystemClock, ThymeConfig, thyme_dirs};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Thyme: kiosk clock core.
#[derive(Parser)]
#[command(name = "thyme", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "THYME_CONFIG")]
    config: Option<PathBuf>,

    /// Do not write a log file.
    #[arg(long)]
    no_log_file: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_layer = if cli.no_log_file {
        None
    } else {
        let appender = tracing_appender::rolling::daily(thyme_dirs::logs_dir(), "thyme.log");
        Some(tracing_appender::non_blocking(appender))
    };
    let (file_writer, _guard) = match file_layer {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("thyme=info,thyme_feeds=info")),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w)))
        .init();

    let config_path = cli.config.unwrap_or_else(ThymeConfig::default_config_path);
    let mut config = ThymeConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.resolve_relative_paths(&thyme_dirs::data_dir());

    tracing::info!(config = %config_path.display(), "thyme starting");

    let (sink, mut events) = ChannelSink::channel();
    let mut kiosk = Kiosk::new(config, Arc::new(sink), Arc::new(SystemClock))?;
    kiosk.add_configured_feeds()?;
    kiosk.start()?;

    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received");
                break;
            }
            Some(event) = events.recv() => emit(&event),
            line = commands.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_command(&kiosk, line.trim()),
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
        }
    }

    kiosk.stop();
    tracing::info!("thyme shut down cleanly");
    Ok(())
}

fn emit(event: &SinkEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!(error = %e, "failed to encode event"),
    }
}

fn handle_command(kiosk: &Kiosk, line: &str) {
    let words: Vec<&str> = line.split_whitespace().collect();
    let result = match words.as_slice() {
        [] => Ok(()),
        ["reload"] => kiosk.reload().map(|outcomes| {
            for (task, outcome) in outcomes {
                tracing::info!(task = %task, ?outcome, "reload");
            }
        }),
        ["alarm", "add", time] => parse_alarm(time).and_then(|t| kiosk.add_alarm(t)),
        ["alarm", "remove", time] => parse_alarm(time).and_then(|t| kiosk.remove_alarm(t)),
        ["alarms"] => {
            println!("{}", serde_json::json!({ "alarms": kiosk.alarm_summary() }));
            Ok(())
        }
        ["status"] => {
            match serde_json::to_string(&kiosk.statuses()) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!(error = %e, "failed to encode status"),
            }
            Ok(())
        }
        _ => {
            tracing::warn!(command = line, "unknown command");
            Ok(())
        }
    };
    if let Err(e) = result {
        tracing::warn!(command = line, error = %e, "command failed");
    }
}

fn parse_alarm(text: &str) -> thyme::Result<AlarmTime> {
    text.parse()
}
