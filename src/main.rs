//! rks - Remote Keyless System toolkit.
//!
//! Command-line front end for the rolling-code lock system: an offline
//! provisioning tool (`keygen`) that derives the BlowFish32 subkey tables
//! from an operator seed, and a loopback simulation (`simulate`) that runs
//! a remote and a receiver back-to-back through the real protocol stack.

mod config;
mod crypto;
mod device;
mod keyfile;
mod protocol;
mod sim;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crypto::blowfish32::Subkeys;
use crypto::keygen;
use keyfile::Keyfile;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "rks", version, about = "Remote Keyless System toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive subkey tables from a seed and write the provisioning keyfile
    Keygen {
        /// Hexadecimal seed; prompts interactively when omitted
        #[arg(long)]
        seed: Option<String>,
        /// Output path (defaults to the configured keyfile location)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the derived tables to stdout as well
        #[arg(long)]
        show: bool,
    },
    /// Run a remote and a receiver back-to-back over a loopback line
    Simulate {
        /// Number of trigger presses to simulate
        #[arg(long, default_value_t = 4)]
        presses: u32,
        /// Frames per burst (defaults to the configured burst length)
        #[arg(long)]
        burst: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rks=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    tracing::debug!("rks v{}", VERSION);

    match Cli::parse().command {
        Commands::Keygen { seed, out, show } => cmd_keygen(seed, out, show),
        Commands::Simulate { presses, burst } => cmd_simulate(presses, burst),
    }
}

fn cmd_keygen(seed: Option<String>, out: Option<PathBuf>, show: bool) -> Result<()> {
    let config = config::load_or_init()?;

    let subkeys = match seed {
        Some(seed) => keygen::derive(&seed).map_err(|e| anyhow::anyhow!("invalid seed: {e}"))?,
        None => prompt_for_seed()?,
    };

    let path = out.unwrap_or(config.keyfile);
    Keyfile::new(subkeys.clone()).save(&path)?;

    if show {
        print_tables(&subkeys);
    }
    println!("Keyfile written to {}", path.display());
    Ok(())
}

/// Interactive seed entry: re-prompt until the input parses. A partial or
/// invalid seed is never accepted.
fn prompt_for_seed() -> Result<Subkeys> {
    if !atty::is(atty::Stream::Stdin) {
        bail!("stdin is not a terminal; pass --seed for scripted use");
    }

    loop {
        print!("Enter seed-key in hexadecimal (Ex: 573BE15A): ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin()
            .read_line(&mut line)
            .context("Could not read line")?
            == 0
        {
            bail!("end of input before a valid seed was entered");
        }

        match keygen::derive(line.trim()) {
            Ok(keys) => return Ok(keys),
            Err(e) => eprintln!("{e}; try again"),
        }
    }
}

fn print_tables(keys: &Subkeys) {
    let row = |words: &[u16]| {
        words
            .iter()
            .map(|w| format!("0x{w:04X}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("P : {}", row(&keys.p));
    println!("S1: {}", row(&keys.s1));
    println!("S2: {}", row(&keys.s2));
    println!("S3: {}", row(&keys.s3));
    println!("S4: {}", row(&keys.s4));
}

fn cmd_simulate(presses: u32, burst: Option<usize>) -> Result<()> {
    let config = config::load_or_init()?;

    let keys = Keyfile::load(&config.keyfile).with_context(|| {
        format!(
            "No usable keyfile at {:?} - run `rks keygen` first",
            config.keyfile
        )
    })?;

    let burst_len = burst.unwrap_or(config.burst_len).max(1);
    let report = sim::run(&config, keys, presses, burst_len)?;

    println!(
        "{} presses: {} stored, {} accepted, {} rejected, {} unlock cycles",
        report.presses,
        report.stats.stored,
        report.stats.accepted,
        report.stats.rejected,
        report.unlocks
    );
    Ok(())
}
