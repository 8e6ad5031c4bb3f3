//! Keypool provisioning simulator CLI
//!
//! Runs the provisioner against simulated collaborators over many virtual days
//! and prints a summary.

use anyhow::{bail, Context};
use clap::Parser;
use keypool_provisioner::ProvisionerConfig;
use keypool_simulation::{SimulationConfig, SimulationRunner};
use keypool_types::{EcCurve, ImplInfo, SecurityLevel};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keypool-sim")]
#[command(about = "Deterministic attestation key pool provisioning simulator")]
#[command(version)]
struct Cli {
    /// Simulated days
    #[arg(long, default_value = "30")]
    days: u32,

    /// Random seed
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// Periodic triggers per day
    #[arg(long, default_value = "1")]
    triggers_per_day: u32,

    /// Keys apps consume from each level per day
    #[arg(long, default_value = "2")]
    consume: u32,

    /// Buffer size served by the backend (0 disables provisioning)
    #[arg(long, default_value = "6")]
    extra_keys: u32,

    /// Certificate validity in days
    #[arg(long, default_value = "30")]
    cert_validity_days: u64,

    /// Probability that a device config fetch fails (0.0 to 1.0)
    #[arg(long, default_value = "0.0")]
    fetch_failure_rate: f64,

    /// Probability that the network is metered at a trigger (0.0 to 1.0)
    #[arg(long, default_value = "0.0")]
    metered: f64,

    /// CSR batch ceiling
    #[arg(long, default_value = "20")]
    batch_size: u32,

    /// Expose only the TEE level (no StrongBox)
    #[arg(long)]
    tee_only: bool,

    /// Log filter, e.g. "info" or "keypool_provisioner=debug"
    #[arg(long, default_value = "warn")]
    log: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&cli.log))
                .context("invalid log filter")?,
        )
        .init();

    if !(0.0..=1.0).contains(&cli.fetch_failure_rate) {
        bail!("--fetch-failure-rate must be between 0.0 and 1.0");
    }
    let batch_size = NonZeroU32::new(cli.batch_size).context("--batch-size must be at least 1")?;

    let mut levels = vec![ImplInfo::new(
        SecurityLevel::TrustedEnvironment,
        EcCurve::Curve25519,
    )];
    if !cli.tee_only {
        levels.push(ImplInfo::new(SecurityLevel::StrongBox, EcCurve::P256));
    }

    let config = SimulationConfig::new(cli.days)
        .with_seed(cli.seed)
        .with_triggers_per_day(cli.triggers_per_day)
        .with_levels(levels)
        .with_keys_consumed_per_day(cli.consume)
        .with_extra_keys(cli.extra_keys)
        .with_cert_validity(Duration::from_secs(cli.cert_validity_days * 24 * 60 * 60))
        .with_fetch_failure_rate(cli.fetch_failure_rate)
        .with_metered_probability(cli.metered)
        .with_provisioner(ProvisionerConfig::default().with_batch_size(batch_size));

    let stats = SimulationRunner::new(config).run();
    print!("{stats}");

    Ok(())
}
