//! Transfer Simulation Binary
//!
//! A stand-in for rclone that prints realistic one-line stats to stderr, so
//! the supervisor can be exercised end to end without network access or
//! remotes. Stalls, failures and exit codes are controlled by flags.
//!
//! Run with:
//! `cargo run --bin simulate -- copyto remote:big.iso /tmp/big.iso --steps 20`
//!
//! Every option can also be set through a `SIMULATE_*` environment variable,
//! which is how it is driven when it stands in for rclone behind the CLI.

use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Args, Parser};
use rand::prelude::*;
use tokio::time::sleep;

/// Fake rclone transfer
#[derive(Parser, Debug)]
#[command(name = "simulate", about = "Emit rclone-style transfer output")]
struct SimulationArgs {
    /// Subcommand and paths, accepted and echoed like rclone would
    #[arg(value_name = "ARGS")]
    operands: Vec<String>,

    /// Number of stats lines until 100%
    #[arg(long, env = "SIMULATE_STEPS", default_value_t = 10)]
    steps: u32,

    /// Delay between stats lines
    #[arg(
        long,
        env = "SIMULATE_INTERVAL",
        default_value = "100ms",
        value_parser = humantime::parse_duration
    )]
    interval: Duration,

    /// Go silent for this long halfway through
    #[arg(long, env = "SIMULATE_STALL", value_parser = humantime::parse_duration)]
    stall: Option<Duration>,

    /// Total size in MiB
    #[arg(long, env = "SIMULATE_SIZE_MIB", default_value_t = 64.0)]
    size_mib: f64,

    /// Exit with this code after the last line
    #[arg(long, env = "SIMULATE_EXIT_CODE", default_value_t = 0)]
    exit_code: i32,

    /// Print this as an ERROR line before a failing exit
    #[arg(long, env = "SIMULATE_ERROR")]
    error: Option<String>,

    /// Also print each percentage on stdout
    #[arg(long)]
    stdout: bool,

    #[command(flatten)]
    rclone: RcloneFlags,
}

/// rclone flags the supervisor passes; accepted and ignored
#[derive(Args, Debug)]
#[allow(dead_code)]
struct RcloneFlags {
    #[arg(long)]
    config: Option<String>,
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
    #[arg(long)]
    stats: Option<String>,
    #[arg(long)]
    stats_one_line: bool,
    #[arg(long)]
    stats_file_name_length: Option<u32>,
    #[arg(long)]
    transfers: Option<u32>,
    #[arg(long)]
    checkers: Option<u32>,
    #[arg(long)]
    bwlimit: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = SimulationArgs::parse();

    if args.steps == 0 {
        bail!("--steps must be at least 1");
    }

    log("NOTICE", &format!("simulating {}", args.operands.join(" ")));

    let mut rng = thread_rng();
    let halfway = args.steps / 2;

    for step in 1..=args.steps {
        sleep(args.interval).await;

        if step == halfway {
            if let Some(stall) = args.stall {
                sleep(stall).await;
            }
        }

        let fraction = f64::from(step) / f64::from(args.steps);
        let percent = (fraction * 100.0).round() as u32;
        let done = args.size_mib * fraction;
        let speed: f64 = rng.gen_range(5.0..15.0);
        let remaining = ((args.size_mib - done) / speed).round() as u64;

        log(
            "INFO",
            &format!(
                "   {:.3} MiB / {:.3} MiB, {}%, {:.3} MiB/s, ETA {}s",
                done, args.size_mib, percent, speed, remaining
            ),
        );

        if args.stdout {
            println!("{}%", percent);
        }
    }

    if args.exit_code != 0 {
        if let Some(message) = &args.error {
            log("ERROR", message);
        }
        std::process::exit(args.exit_code);
    }

    Ok(())
}

/// Print one timestamped log line the way rclone does
fn log(level: &str, message: &str) {
    let timestamp = Local::now().format("%Y/%m/%d %H:%M:%S");
    eprintln!("{} {:<6}: {}", timestamp, level, message);
}
