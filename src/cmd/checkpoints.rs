//! Checkpoint listing: `paperlog checkpoints`.

use anyhow::Result;
use std::path::PathBuf;

use super::super::Cli;

pub fn cmd_checkpoints(cli: &Cli, output: Option<PathBuf>) -> Result<()> {
    use paperlog::config::PaperlogConfig;
    use paperlog::workflow::{CheckpointStore, ManifestStatus};

    let config = PaperlogConfig::with_cli_args(cli.config.clone(), cli.verbose, output)?;
    let dir = config.output_dir().join(config.checkpoint_dir_name());

    let Some(manifest) = CheckpointStore::load_manifest(&dir)? else {
        println!("No checkpoints found in {}", dir.display());
        return Ok(());
    };

    let status = match manifest.status {
        ManifestStatus::Approved => console::style(manifest.status).green(),
        ManifestStatus::BudgetExhausted => console::style(manifest.status).yellow(),
        ManifestStatus::Failed => console::style(manifest.status).red(),
        ManifestStatus::Running => console::style(manifest.status).cyan(),
    };

    println!();
    println!("{} {}", console::style("Run").bold(), manifest.run_id);
    println!("  Source:  {}", manifest.source);
    println!("  Status:  {}", status);
    println!(
        "  Started: {}",
        manifest.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(ended) = manifest.ended_at {
        println!("  Ended:   {}", ended.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(ref path) = manifest.output_path {
        println!("  Output:  {}", path.display());
    }
    if let Some(ref error) = manifest.error {
        println!("  Error:   {}", console::style(error).red());
    }
    println!();

    for record in &manifest.checkpoints {
        let verdict = if record.approved {
            console::style("approved").green()
        } else {
            console::style("rejected").yellow()
        };
        println!(
            "  v{}  {:<8}  {}  {}",
            record.iteration,
            verdict,
            record.recorded_at.format("%H:%M:%S"),
            record.candidate_path.display()
        );
    }
    println!();

    Ok(())
}
