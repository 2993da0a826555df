use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use symbiosis_config::{ConfigLoader, SymbiosisConfig, WarningSeverity};
use symbiosis_core::{SessionMode, SymbiosisError};
use symbiosis_runtime::Pipeline;

mod chat;
mod setup;

/// Symbiosis: a memory-grounded conversational companion
#[derive(Parser)]
#[command(name = "symbiosis", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to symbiosis.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat in the terminal
    Chat {
        /// Start without restoring the stored chat log
        #[arg(long)]
        fresh: bool,
    },
    /// Run a single turn and print the reply as JSON
    Ask {
        /// What to say
        text: String,
        /// Run the turn in director mode
        #[arg(long, conflicts_with = "interrogate")]
        director: bool,
        /// Run the turn in interrogation mode
        #[arg(long)]
        interrogate: bool,
    },
    /// List the images linked to an entity deck
    Visuals {
        /// Entity name
        entity: String,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check the configuration for problems
    Doctor,
    /// Initialize a new symbiosis.toml in the current or home directory
    Init {
        /// Create in current directory instead of ~/.symbiosis/
        #[arg(long)]
        local: bool,
    },
    /// Show version and build info
    Version,
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    pub async fn run(self) -> symbiosis_core::Result<()> {
        // Commands that must work without a valid config
        match self.command {
            Commands::Init { local } => return setup::cmd_init(local),
            Commands::Version => return Self::cmd_version(),
            Commands::Completions { shell } => return Self::cmd_completions(shell),
            _ => {}
        }

        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug".to_string()
        } else if self.quiet {
            "error".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone())
        };
        init_tracing(&config.logging.format, &log_level);

        match self.command {
            Commands::Chat { fresh } => chat::cmd_chat(config, fresh).await,
            Commands::Ask {
                text,
                director,
                interrogate,
            } => {
                let mode = if director {
                    SessionMode::Director
                } else if interrogate {
                    SessionMode::Interrogation
                } else {
                    SessionMode::Standard
                };
                Self::cmd_ask(config, text, mode).await
            }
            Commands::Visuals { entity } => Self::cmd_visuals(config, entity).await,
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Doctor => Self::cmd_doctor(config),
            Commands::Init { .. } | Commands::Version | Commands::Completions { .. } => Ok(()),
        }
    }

    async fn cmd_ask(config: SymbiosisConfig, text: String, mode: SessionMode) -> symbiosis_core::Result<()> {
        let pipeline = Pipeline::from_config(&config)?;
        let mut session = pipeline.new_session().with_mode(mode);
        pipeline
            .restore_session(&mut session, chrono::Utc::now())
            .await;

        let reply = pipeline
            .run_turn(&mut session, &text, chrono::Local::now().date_naive())
            .await;
        pipeline.shutdown().await;

        println!("{}", serde_json::to_string_pretty(&reply)?);
        Ok(())
    }

    async fn cmd_visuals(config: SymbiosisConfig, entity: String) -> symbiosis_core::Result<()> {
        let pipeline = Pipeline::from_config(&config)?;
        let images = pipeline.entity_visuals(&entity).await;
        pipeline.shutdown().await;

        if images.is_empty() {
            println!("No visuals found for '{entity}'.");
            return Ok(());
        }
        println!("\x1b[1m{entity}\x1b[0m ({} images)", images.len());
        for image in &images {
            println!("  {}", image.url);
        }
        Ok(())
    }

    fn cmd_config(mut config: SymbiosisConfig, json: bool) -> symbiosis_core::Result<()> {
        if config.services.openrouter_api_key.is_some() {
            config.services.openrouter_api_key = Some("********".into());
        }
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| SymbiosisError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_doctor(config: SymbiosisConfig) -> symbiosis_core::Result<()> {
        println!("Symbiosis Doctor: configuration audit");
        println!();

        let warnings = match config.validate() {
            Ok(w) => w,
            Err(e) => {
                println!("{e}");
                return Ok(());
            }
        };

        let mut warn_count = 0;
        let mut info_count = 0;
        for w in &warnings {
            println!("  {w}");
            match w.severity {
                WarningSeverity::Warning => warn_count += 1,
                WarningSeverity::Info => info_count += 1,
                WarningSeverity::Error => {}
            }
        }

        let backend = match &config.memory.backend_url {
            Some(url) => format!("remote ({url})"),
            None => format!("local sqlite ({})", config.memory.db_path.display()),
        };
        println!("  memory backend: {backend}");
        println!();
        println!("  {warn_count} warnings, {info_count} suggestions");
        Ok(())
    }

    fn cmd_version() -> symbiosis_core::Result<()> {
        println!("Symbiosis v{}", env!("CARGO_PKG_VERSION"));
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> symbiosis_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "symbiosis", &mut std::io::stdout());
        Ok(())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
fn init_tracing(format: &str, level: &str) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
    };
    // Logs go to stderr so `ask` output stays pipeable.
    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .json()
            .with_target(true)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_ask_modes() {
        let cli = Cli::try_parse_from(["symbiosis", "ask", "play Alex", "--director"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ask { director: true, interrogate: false, .. }
        ));
    }

    #[test]
    fn test_cli_rejects_both_modes() {
        let parsed = Cli::try_parse_from(["symbiosis", "ask", "hi", "--director", "--interrogate"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_cli_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["symbiosis", "-v", "-q", "chat"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
