//! Workflow execution: `paperlog run`.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::super::Cli;

pub async fn cmd_run(cli: &Cli, source: &str, output: Option<PathBuf>, resume: bool) -> Result<()> {
    use paperlog::agent::AgentInvoker;
    use paperlog::config::PaperlogConfig;
    use paperlog::workflow::{RunController, RunStatus, WorkflowInput};

    let config = PaperlogConfig::with_cli_args(cli.config.clone(), cli.verbose, output)?;
    for warning in config.validate() {
        eprintln!("{} {}", console::style("⚠").yellow(), warning);
    }

    let input = WorkflowInput::new(source, config.output_dir())?;
    let invoker = Arc::new(AgentInvoker::new(config.agent_config()));

    let (tx, rx) = mpsc::channel(64);
    let printer = tokio::spawn(print_events(rx));

    let controller = RunController::new(invoker)
        .with_stage_timeout(config.stage_timeout())
        .with_checkpoint_dir(config.checkpoint_dir_name())
        .with_event_channel(tx);

    let result = if resume {
        controller.resume(&input).await
    } else {
        controller.run(&input).await
    };
    // Closes the event channel.
    drop(controller);
    printer.await.ok();

    match result {
        Ok(report) => {
            let status = match report.status {
                RunStatus::Approved => console::style("Approved").green().bold(),
                RunStatus::BudgetExhausted => console::style("Budget exhausted").yellow().bold(),
            };
            eprintln!(
                "{} \"{}\" after {} iteration(s), {} checkpoint(s)",
                status,
                report.title,
                report.iterations,
                report.checkpoints.len()
            );
            if report.status == RunStatus::BudgetExhausted {
                eprintln!(
                    "  {}",
                    console::style("Shipping the latest candidate without approval.").dim()
                );
            }
            println!("{}", report.output_path.display());
            Ok(())
        }
        Err(e) => {
            if let Some(stage) = e.stage_error() {
                eprintln!(
                    "  {} {} failed",
                    console::style("Error:").red().bold(),
                    console::style(stage.role).bold()
                );
            }
            if let Some(hint) = checkpoint_hint(&input, config.checkpoint_dir_name()) {
                eprintln!("  {}", console::style(hint).dim());
            }
            Err(e.into())
        }
    }
}

fn checkpoint_hint(
    input: &paperlog::workflow::WorkflowInput,
    checkpoint_dir: &str,
) -> Option<String> {
    let dir = input.output_dir().join(checkpoint_dir);
    let manifest = paperlog::workflow::CheckpointStore::load_manifest(&dir).ok()??;
    if manifest.checkpoints.is_empty() {
        return None;
    }
    Some(format!(
        "{} checkpoint(s) kept in {}; rerun with --resume to continue",
        manifest.checkpoints.len(),
        dir.display()
    ))
}

async fn print_events(mut rx: mpsc::Receiver<paperlog::workflow::RunEvent>) {
    use paperlog::workflow::{MAX_ITERATIONS, RunEvent, RunPhase};

    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::PhaseChanged { phase, iteration } => match phase {
                RunPhase::Parsing => {
                    eprintln!("{} Parsing paper", console::style("▸").cyan())
                }
                RunPhase::Producing => eprintln!(
                    "{} Generating draft, figures and cover",
                    console::style("▸").cyan()
                ),
                RunPhase::Reviewing => eprintln!(
                    "{} Review {}/{}",
                    console::style("▸").cyan(),
                    iteration,
                    MAX_ITERATIONS
                ),
                _ => {}
            },
            RunEvent::ReworkPlanned { iteration, roles } => {
                let roles: Vec<_> = roles.iter().map(|r| r.as_str()).collect();
                let targets = if roles.is_empty() {
                    "nothing targeted".to_string()
                } else {
                    roles.join(", ")
                };
                eprintln!(
                    "  {} rejected iteration {}: reworking {}",
                    console::style("✗").yellow(),
                    iteration,
                    targets
                );
            }
            RunEvent::CheckpointWritten { iteration, path } => eprintln!(
                "  {}",
                console::style(format!("checkpoint v{} → {}", iteration, path.display())).dim()
            ),
            RunEvent::Finished { .. } => {}
        }
    }
}
