//! fbclock - a digital clock at the bottom of the framebuffer console.
//!
//! Opens the framebuffer device, detaches from the terminal and redraws
//! the time (plus battery percentage, when configured) once per second
//! until SIGINT or SIGTERM.

mod clock;
mod daemon;
mod fb;
mod power;
mod shutdown;

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use crate::clock::Clock;
use crate::daemon::DaemonError;
use crate::fb::Surface;

#[derive(Parser, Debug)]
#[command(name = "fbclock")]
#[command(about = "Digital clock rendered at the bottom of the Linux framebuffer console")]
struct Args {
    /// Battery capacity file, e.g. /sys/class/power_supply/BAT0/capacity
    #[arg(short = 'b', long = "battery", value_name = "PATH")]
    battery: Option<PathBuf>,

    /// Framebuffer device node
    #[arg(short = 'f', long = "fbdev", value_name = "DEVICE", default_value = "/dev/fb0")]
    fbdev: PathBuf,
}

fn main() {
    // Argument errors exit 1, not clap's default 2; help and version
    // remain success exits.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    process::exit(match run(args) {
        Ok(()) => 0,
        Err(err) => {
            log::error!("{err:#}");
            match err.downcast_ref::<DaemonError>() {
                Some(DaemonError::Session(_)) => 2,
                _ => 1,
            }
        }
    });
}

fn run(args: Args) -> Result<()> {
    log::info!("device: {}", args.fbdev.display());
    if let Some(battery) = &args.battery {
        log::info!("battery capacity file: {}", battery.display());
    }

    // Open and map before detaching so setup failures still reach the
    // invoking terminal.
    let surface = Surface::open(&args.fbdev)?;

    daemon::daemonize()?;
    let flag = shutdown::install().context("failed to install signal handlers")?;

    Clock::new(surface, args.battery).run(flag);
    Ok(())
}
