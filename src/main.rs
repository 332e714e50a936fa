//! Rclone Supervisor CLI application
//!
//! Command-line interface for running rclone transfers with live progress,
//! inactivity timeouts and classified failure reports.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use rclone_supervisor::cli::{handle_check, handle_config, handle_transfer, Cli, Commands};
use rclone_supervisor::config::AppConfig;
use rclone_supervisor::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let flag_level = cli.log_level().to_string().to_lowercase();

    // Config commands must work even when the config file is broken
    if let Commands::Config(args) = cli.command {
        init_logging(&flag_level, cli.global.very_verbose, true);
        return handle_config(args, cli.global.config).await;
    }

    let config = AppConfig::load(cli.global.config.clone()).await?;
    let level = if cli.has_verbosity_flag() {
        flag_level
    } else {
        config.logging.level.to_lowercase()
    };
    init_logging(&level, cli.global.very_verbose, config.logging.colored_output);

    info!("Rclone Supervisor v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Transfer(args) => {
            info!("Executing transfer command");
            handle_transfer(args, &config, cli.global.quiet).await
        }
        Commands::Check(args) => {
            info!("Executing check command");
            handle_check(args, &config).await
        }
        Commands::Config(_) => Ok(()),
    }
}

/// Initialize logging on stderr so stdout stays free for JSON output
fn init_logging(level: &str, show_levels: bool, colored: bool) {
    let directive = format!("rclone_supervisor={}", level);
    let filter = match directive.parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(e) => {
            eprintln!("Ignoring invalid log level '{}': {}", level, e);
            EnvFilter::from_default_env()
        }
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(show_levels)
        .with_ansi(colored && atty::is(atty::Stream::Stderr))
        .init();

    if show_levels {
        info!("Very verbose logging enabled");
    }
}
