//! promptsh - turn natural language into shell commands.
//!
//! Two independent flows: `suggest` asks a completion endpoint for a
//! command, `run` executes a command line through the host shell. Nothing
//! wires them together; what you run is what you typed (or pasted).

mod config;
mod exec;
mod suggest;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::process::Command as ProcessCommand;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "promptsh")]
#[command(author, version, about = "Turn natural language into shell commands")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the completion endpoint for a shell command
    Suggest {
        /// The query; prompts on stdin when omitted
        #[arg(value_name = "QUERY")]
        query: Option<String>,
    },
    /// Execute a command line through the host shell
    Run {
        /// The command; prompts on stdin when omitted
        #[arg(value_name = "COMMAND")]
        command: Option<String>,
    },
    /// Open configuration file in $EDITOR
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Suggest { query } => handle_suggest(query).await,
        Commands::Run { command } => handle_run(command),
        Commands::Config => handle_config(),
    }
}

/// Handle the suggest subcommand.
async fn handle_suggest(query: Option<String>) -> Result<()> {
    let config = config::Config::load()?;

    let query = match query {
        Some(q) => q,
        None => prompt_line("What do you want to do? ")?,
    };

    let suggester = suggest::Suggester::new(&config);
    let command = suggester.suggest(&query).await?;

    // Just the command on stdout, ready to paste
    println!("{}", command);
    Ok(())
}

/// Handle the run subcommand.
fn handle_run(command: Option<String>) -> Result<()> {
    let command = match command {
        Some(c) => c,
        None => prompt_line("What command do you want to execute? ")?,
    };

    if looks_destructive(&command)
        && !confirm("This command may be destructive. Proceed? (y/N): ")?
    {
        eprintln!("Aborting command execution.");
        return Ok(());
    }

    let output = exec::run_command(&command)?;
    io::stdout().write_all(&output)?;
    Ok(())
}

/// Handle the config command.
fn handle_config() -> Result<()> {
    let config_path = config::Config::config_path()?;

    // Ensure config directory exists
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Create default config if it doesn't exist
    if !config_path.exists() {
        let default_config = config::Config::default();
        default_config.save()?;
        println!("Created default config at {}", config_path.display());
    }

    // Open in editor
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = ProcessCommand::new(&editor)
        .arg(&config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        eprintln!("Editor exited with non-zero status");
    }

    Ok(())
}

/// Read one line from stdin.
/// Note: The prompt itself goes to stderr to avoid polluting stdout (which
/// may be captured by the shell), and is skipped when stdin is piped.
fn prompt_line(label: &str) -> Result<String> {
    if atty::is(atty::Stream::Stdin) {
        eprint!("{}", label);
        io::stderr().flush()?;
    }

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Ask a yes/no question; anything but y/yes declines.
fn confirm(label: &str) -> Result<bool> {
    let answer = prompt_line(label)?.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Flag commands that remove or disrupt things so `run` can ask first.
fn looks_destructive(command: &str) -> bool {
    let lower = command.to_lowercase();
    if lower.contains("delete") || lower.contains("drain") {
        return true;
    }
    lower
        .split_whitespace()
        .any(|word| matches!(word, "rm" | "rmdir" | "mkfs"))
}
