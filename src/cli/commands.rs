//! Command handlers for Rclone Supervisor CLI
//!
//! This module implements the command handlers that connect CLI arguments to
//! the supervisor, the pre-transfer checks and the configuration layer.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::app::{
    CheckReport, CheckStatus, CommandBuilder, Preflight, TerminalOutcome, TransferRequest,
    TransferSupervisor,
};
use crate::cli::{
    cancel_on_signal, CheckArgs, ConfigAction, ConfigArgs, ProgressConfig, TransferArgs,
    TransferDisplay,
};
use crate::config::{AppConfig, ToolConfig};
use crate::errors::{AppError, Result};

/// Handle the transfer command
///
/// Runs the pre-transfer checks (unless skipped), then supervises the
/// transfer until it reaches a terminal outcome. Ctrl+C cancels the transfer.
pub async fn handle_transfer(args: TransferArgs, config: &AppConfig, quiet: bool) -> Result<()> {
    let start_time = Instant::now();
    args.validate().map_err(AppError::generic)?;

    let (tool, mut supervisor_config, flags) = config.to_runtime_config();
    tool.validate()?;

    if let Some(timeout) = args.inactivity_timeout {
        supervisor_config = supervisor_config.with_inactivity_timeout(timeout);
    }
    supervisor_config.validate().map_err(AppError::generic)?;

    let mut builder = command_builder(&tool).with_flags(flags);
    if let Some(limit) = args.bwlimit {
        builder = builder.with_bandwidth_limit(limit);
    }

    let request = args.request();
    info!(
        "Transfer requested: {} -> {} ({:?})",
        request.source, request.destination, request.direction
    );

    if args.skip_checks {
        debug!("Pre-transfer checks skipped");
    } else {
        run_checks(&builder, &request, args.json || quiet).await?;
    }

    let command = builder.transfer(&request)?;
    let handle = TransferSupervisor::start(command, supervisor_config)?;
    info!("Started {} (pid {:?})", handle.description(), handle.pid());

    let signal_listener = cancel_on_signal(handle.cancel_token());

    let progress_config = ProgressConfig {
        enable_progress_bars: true,
        json: args.json,
        quiet,
    };
    let mut display = TransferDisplay::new(progress_config, request.display_name())?;

    let report = handle.wait_with(|event| display.handle(event)).await;
    signal_listener.abort();
    display.finish(&report);

    info!(
        "Transfer finished in {:?} with {} progress and {} status events",
        start_time.elapsed(),
        report.progress_events,
        report.status_events
    );

    match report.outcome {
        TerminalOutcome::Success => Ok(()),
        TerminalOutcome::Cancelled => {
            warn!("Transfer cancelled");
            Err(AppError::Cancelled)
        }
        TerminalOutcome::Failure { kind, message } => {
            error!("Transfer failed ({:?})", kind);
            if !args.json {
                eprintln!();
                eprintln!("{}", message);
            }
            Err(AppError::TransferFailed {
                message: first_line(&message),
            })
        }
    }
}

/// Handle the check command
pub async fn handle_check(args: CheckArgs, config: &AppConfig) -> Result<()> {
    let (tool, _, flags) = config.to_runtime_config();
    tool.validate()?;

    let builder = command_builder(&tool).with_flags(flags);
    run_checks(&builder, &args.request(), false).await?;

    println!("All pre-transfer checks passed");
    Ok(())
}

/// Handle configuration commands
pub async fn handle_config(args: ConfigArgs, config_override: Option<PathBuf>) -> Result<()> {
    match args.action {
        ConfigAction::Init { force, path } => {
            let path = match path.or(config_override) {
                Some(path) => path,
                None => AppConfig::get_default_config_path()?,
            };

            if path.exists() && !force {
                println!("Configuration already exists: {}", path.display());
                println!("Use --force to overwrite it");
                return Ok(());
            }

            AppConfig::write_default_config(&path).await?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = AppConfig::load(config_override).await?;
            let (tool, _, _) = config.to_runtime_config();

            println!("{}", config.to_toml()?);
            println!("# Resolved rclone executable: {}", tool.rclone_path.display());
            println!("# Resolved rclone config: {}", tool.config_path.display());
            Ok(())
        }
    }
}

fn command_builder(tool: &ToolConfig) -> CommandBuilder {
    CommandBuilder::new(&tool.rclone_path).with_config_path(&tool.config_path)
}

/// Run the pre-transfer checks, printing each report unless `silent`
async fn run_checks(builder: &CommandBuilder, request: &TransferRequest, silent: bool) -> Result<()> {
    let preflight = Preflight::new(builder.clone());

    let reports = match preflight.run(request).await {
        Ok(reports) => reports,
        Err(e) => {
            error!("Pre-transfer check failed: {}", e);
            return Err(e.into());
        }
    };

    for report in &reports {
        print_report(report, silent);
    }
    Ok(())
}

fn print_report(report: &CheckReport, silent: bool) {
    match report.status {
        CheckStatus::Passed if silent => {}
        CheckStatus::Passed | CheckStatus::Skipped => eprintln!("{}", report),
        CheckStatus::Warning => {
            warn!("{}", report);
            eprintln!("{}", report);
        }
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or(message).trim().to_string()
}
