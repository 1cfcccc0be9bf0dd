//! Configuration view and validation commands: `paperlog config`.

use anyhow::Result;

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    use paperlog::config::{CONFIG_FILE, PaperlogConfig, PaperlogToml};

    match command {
        None | Some(ConfigCommands::Show) => {
            let config = PaperlogConfig::with_cli_args(cli.config.clone(), cli.verbose, None)?;

            println!();
            println!("Paperlog Configuration");
            println!("======================");
            println!();

            match config.config_path {
                Some(ref path) => println!("Config file: {}", path.display()),
                None => println!("No {} found; using defaults.", CONFIG_FILE),
            }
            println!();
            print!("{}", config.toml.to_toml_string()?);
            println!();

            // Effective values (including env overrides)
            let agent = config.agent_config();
            println!("Effective values (with env overrides):");
            println!("  agent command = \"{}\"", agent.command);
            println!("  agent args = {:?}", agent.args);
            println!("  skip_permissions = {}", agent.skip_permissions);
            match config.stage_timeout() {
                Some(timeout) => println!("  stage timeout = {}s", timeout.as_secs()),
                None => println!("  stage timeout = none"),
            }
            println!("  output dir = {}", config.output_dir().display());
            println!(
                "  checkpoints = {}",
                config
                    .output_dir()
                    .join(config.checkpoint_dir_name())
                    .display()
            );
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = PaperlogConfig::with_cli_args(cli.config.clone(), cli.verbose, None)?;
            if config.config_path.is_none() {
                println!("No {} found. Using defaults (valid).", CONFIG_FILE);
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", console::style(warning).yellow());
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            let config_path = cli
                .config
                .clone()
                .unwrap_or_else(|| CONFIG_FILE.into());
            if config_path.exists() {
                println!("{} already exists", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            PaperlogToml::default().save(&config_path)?;

            println!("Created {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [agent] command, args, skip_permissions, working_dir, stage_timeout_secs");
            println!("  - [output] default_dir, checkpoint_dir");
            println!();
        }
    }

    Ok(())
}
