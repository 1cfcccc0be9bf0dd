use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "paperlog")]
#[command(version, about = "Turn a research paper into a reviewed blog post")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to paperlog.toml (defaults to ./paperlog.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the paper-to-blog workflow
    Run {
        /// Paper to convert: a file path or URI
        source: String,

        /// Output directory (default: pdf/PaperLog)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Continue from the latest checkpoint in the output directory
        #[arg(long)]
        resume: bool,
    },
    /// List checkpoints recorded for the run in an output directory
    Checkpoints {
        /// Output directory (default: pdf/PaperLog)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default paperlog.toml in the current directory
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    paperlog::logging::init(cli.verbose);

    match &cli.command {
        Commands::Run {
            source,
            output,
            resume,
        } => {
            cmd::cmd_run(&cli, source, output.clone(), *resume).await?;
        }
        Commands::Checkpoints { output } => cmd::cmd_checkpoints(&cli, output.clone())?,
        Commands::Config { command } => cmd::cmd_config(&cli, command.clone())?,
    }

    Ok(())
}
