//! Parley - LLM chat CLI with persistent sessions
//!
#![doc = "Main entry point for the parley binary."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley::cli::{Cli, Commands};
use parley::commands;
use parley::commands::setup;
use parley::config::{default_config_path, Config, ResolvedSettings};
use parley::confirm::StdinPrompter;
use parley::ParleyError;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().or_else(default_config_path);

    // Commands that must work without a valid config file
    match &cli.command {
        Commands::Version { short } => {
            println!("{}", setup::version_text(*short));
            return Ok(());
        }
        Commands::Init { force } => {
            let path = config_path.as_deref().ok_or_else(|| {
                ParleyError::Config(
                    "Could not determine config directory; pass --config".to_string(),
                )
            })?;
            setup::init_config(path, *force)?;
            return Ok(());
        }
        _ => {}
    }

    // Load configuration
    let config = match config_path.as_deref() {
        Some(path) => Config::load(path)?,
        None => {
            tracing::warn!("Could not determine config directory, using defaults");
            Config::default()
        }
    };

    if let Commands::Config { field } = &cli.command {
        println!(
            "{}",
            setup::show_config(&config, config_path.as_deref(), field.as_deref())?
        );
        return Ok(());
    }

    // Validate configuration
    config.validate()?;

    let (cli_model, template) = match &cli.command {
        Commands::Chat(args) => (args.model.as_deref(), args.template.as_deref()),
        _ => (None, None),
    };
    let settings = ResolvedSettings::resolve(
        &config,
        cli_model,
        template,
        cli.session_dir.as_deref(),
        config_path.as_deref(),
    )?;

    let mut prompter = StdinPrompter;

    // Execute command
    match cli.command {
        Commands::Chat(args) => commands::run_chat(args, &settings, &mut prompter).await?,
        Commands::Sessions { command } => {
            tracing::info!("Running sessions command: {:?}", command);
            commands::handle_sessions(command, &settings, &mut prompter).await?
        }
        Commands::Init { .. } | Commands::Config { .. } | Commands::Version { .. } => {}
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "parley=debug" } else { "parley=warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
