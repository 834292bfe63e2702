//! # grader
//!
//! Command-line front end for the performance grader.
//!
//! - `grader score` reads one JSON request on stdin and answers on stdout/stderr
//! - `grader serve` exposes the same request over HTTP
//! - `grader notes` prints the notes segmented from a WAV file

mod config;
mod request;
mod server;
mod stream;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use grader_core::{ProficiencyScorer, load_wav, tuning};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "grader", version, about = "Grade a recorded performance against expected pitches")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one JSON request from stdin
    Score,
    /// Serve POST /calculate_proficiency over HTTP
    Serve {
        /// Address to listen on, overrides the config file
        #[arg(long)]
        listen: Option<String>,
    },
    /// Print the notes found in a WAV recording
    Notes {
        /// WAV file to analyse
        path: PathBuf,

        /// Print notes as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // `score` answers on stderr, so it stays quiet unless asked.
    let log_level = match cli.verbose {
        0 if matches!(cli.command, Commands::Score) => "off",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Score => std::process::exit(stream::run_stdio(config_path)),
        Commands::Serve { listen } => serve(config_path, listen),
        Commands::Notes { path, json } => print_notes(config_path, &path, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn serve(config_path: Option<&std::path::Path>, listen: Option<String>) -> anyhow::Result<()> {
    let mut config = AppConfig::load(config_path)?;
    if let Some(addr) = listen {
        config.server.listen_addr = addr;
    }
    let scorer = ProficiencyScorer::new(config.analysis)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(server::run_server(&config.server, scorer))
}

fn print_notes(config_path: Option<&std::path::Path>, path: &std::path::Path, json: bool) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path)?;
    let scorer = ProficiencyScorer::new(config.analysis)?;
    let buffer = load_wav(path).with_context(|| format!("Failed to load {}", path.display()))?;
    let notes = scorer.extract_notes(&buffer)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }

    if notes.is_empty() {
        println!("No notes detected in {}", path.display());
        return Ok(());
    }
    for note in &notes {
        let (name, cents) = tuning::nearest_note(note.freq).unwrap_or_else(|| ("?".to_string(), 0.0));
        println!(
            "Time: {:.2}-{:.2}s Duration: {:.2}s Pitch: {} {:+.0}c ({:.1} Hz)",
            note.start_time,
            note.end_time(),
            note.duration,
            name,
            cents,
            note.freq
        );
    }
    Ok(())
}
