//! Toolgate CLI - Main entry point

mod cli;
mod prompt;
mod repl;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use toolgate_tool::OutputFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Toolgate - run policy-gated tools inside a sandbox directory
#[derive(Parser, Debug)]
#[command(name = "toolgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (TOML or JSON); default is discovered from the sandbox root
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sandbox root (defaults to the current directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tools with their permission state
    Tools,
    /// Run a single tool call
    Run {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
        /// Skip the confirmation step for this call (deny still applies)
        #[arg(short, long)]
        force: bool,
        /// Answer "allow once" to any approval prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Interactive session (default)
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let root = cli::resolve_root(args.root)?;
    let config = cli::load_config(&root, args.config.as_deref())?;
    let registry = cli::build_registry(&root, &config)?;
    let filter = OutputFilter::from(&config.output);

    match args.command.unwrap_or(Command::Repl) {
        Command::Tools => cli::list_tools(&registry),
        Command::Run {
            tool,
            args,
            force,
            yes,
        } => {
            let ok = cli::run_once(&registry, &filter, &tool, &args, force, yes).await?;
            if !ok {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Repl => repl::run(&registry, &filter).await?,
    }

    Ok(ExitCode::SUCCESS)
}
