//! Multi-day simulation of periodic provisioning.

use crate::SimEnvironment;
use keypool_core::{Clock, RunOutcome};
use keypool_provisioner::{Provisioner, ProvisionerConfig};
use keypool_types::{EcCurve, ImplInfo, PoolStatus, SecurityLevel};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for a simulation run.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Random seed for deterministic simulation.
    pub seed: u64,

    /// Simulated days.
    pub days: u32,

    /// Periodic triggers per simulated day.
    pub triggers_per_day: u32,

    /// Security levels the key store exposes.
    pub levels: Vec<ImplInfo>,

    /// Keys apps take from each level per day.
    pub keys_consumed_per_day: u32,

    /// Buffer size served by the backend.
    pub extra_keys: u32,

    /// Lifetime of certificates issued by the backend.
    pub cert_validity: Duration,

    /// Probability that a config fetch fails.
    pub fetch_failure_rate: f64,

    /// Probability that the network is metered at a trigger.
    pub metered_probability: f64,

    pub provisioner: ProvisionerConfig,
}

impl SimulationConfig {
    pub fn new(days: u32) -> Self {
        Self {
            seed: 12345,
            days,
            triggers_per_day: 1,
            levels: vec![
                ImplInfo::new(SecurityLevel::TrustedEnvironment, EcCurve::Curve25519),
                ImplInfo::new(SecurityLevel::StrongBox, EcCurve::P256),
            ],
            keys_consumed_per_day: 2,
            extra_keys: 6,
            cert_validity: 30 * DAY,
            fetch_failure_rate: 0.0,
            metered_probability: 0.0,
            provisioner: ProvisionerConfig::default(),
        }
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_triggers_per_day(mut self, triggers: u32) -> Self {
        self.triggers_per_day = triggers.max(1);
        self
    }

    pub fn with_levels(mut self, levels: Vec<ImplInfo>) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_keys_consumed_per_day(mut self, keys: u32) -> Self {
        self.keys_consumed_per_day = keys;
        self
    }

    pub fn with_extra_keys(mut self, extra: u32) -> Self {
        self.extra_keys = extra;
        self
    }

    pub fn with_cert_validity(mut self, validity: Duration) -> Self {
        self.cert_validity = validity;
        self
    }

    pub fn with_fetch_failure_rate(mut self, rate: f64) -> Self {
        self.fetch_failure_rate = rate;
        self
    }

    pub fn with_metered_probability(mut self, probability: f64) -> Self {
        self.metered_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn with_provisioner(mut self, provisioner: ProvisionerConfig) -> Self {
        self.provisioner = provisioner;
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(30)
    }
}

/// Aggregated results of a simulation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub runs: u64,
    /// Run outcomes keyed by [`RunOutcome::type_name`].
    pub outcomes: BTreeMap<&'static str, u64>,
    pub refills: u64,
    pub keys_generated: u64,
    pub keys_certified: u64,
    pub keys_assigned: u64,
    pub keys_expired: u64,
    /// Times an app found no unassigned key.
    pub starved: u64,
    pub fetch_failures: u64,
    pub resets: u64,
    pub certify_batches: u64,
    pub largest_batch: u32,
    pub time_paused: Duration,
    pub final_pools: BTreeMap<SecurityLevel, PoolStatus>,
}

impl SimulationStats {
    fn record(&mut self, outcome: &RunOutcome) {
        *self.outcomes.entry(outcome.type_name()).or_default() += 1;
        if let RunOutcome::ConfigFetchFailed { reset: true, .. } = outcome {
            self.resets += 1;
        }
    }

    pub fn outcome_count(&self, type_name: &str) -> u64 {
        self.outcomes.get(type_name).copied().unwrap_or(0)
    }
}

impl fmt::Display for SimulationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation Results")?;
        writeln!(f, "==================")?;
        writeln!(f, "Runs:            {}", self.runs)?;
        for (name, count) in &self.outcomes {
            writeln!(f, "  {name:<16} {count}")?;
        }
        writeln!(f, "Refills:         {}", self.refills)?;
        writeln!(f, "Keys generated:  {}", self.keys_generated)?;
        writeln!(f, "Keys certified:  {}", self.keys_certified)?;
        writeln!(f, "Keys assigned:   {}", self.keys_assigned)?;
        writeln!(f, "Keys expired:    {}", self.keys_expired)?;
        writeln!(f, "Starved lookups: {}", self.starved)?;
        writeln!(f, "Fetch failures:  {}", self.fetch_failures)?;
        writeln!(f, "Resets:          {}", self.resets)?;
        writeln!(
            f,
            "CSR batches:     {} (largest {})",
            self.certify_batches, self.largest_batch
        )?;
        writeln!(f, "Time paused:     {:?}", self.time_paused)?;
        for (level, status) in &self.final_pools {
            writeln!(f, "Final {level:<10} {status}")?;
        }
        Ok(())
    }
}

/// Drives periodic triggers and app key consumption over simulated days.
pub struct SimulationRunner {
    config: SimulationConfig,
    env: SimEnvironment,
    provisioner: Provisioner,
    rng: ChaCha8Rng,
    stats: SimulationStats,
}

impl SimulationRunner {
    pub fn new(config: SimulationConfig) -> Self {
        let env = SimEnvironment::new(config.levels.clone(), config.seed);
        env.endorsement.set_extra_keys(config.extra_keys);
        env.endorsement.set_cert_validity(config.cert_validity);
        env.endorsement
            .set_fetch_failure_rate(config.fetch_failure_rate);
        let provisioner = env.provisioner(config.provisioner.clone());
        // Offset so the backend and the runner draw from different streams.
        let rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1));

        Self {
            config,
            env,
            provisioner,
            rng,
            stats: SimulationStats::default(),
        }
    }

    pub fn environment(&self) -> &SimEnvironment {
        &self.env
    }

    /// Run every configured day and return the stats.
    pub fn run(mut self) -> SimulationStats {
        info!(
            days = self.config.days,
            seed = self.config.seed,
            levels = self.config.levels.len(),
            "Starting simulation"
        );

        for day in 0..self.config.days {
            for trigger in 0..self.config.triggers_per_day {
                self.step(trigger);
            }
            debug!(day, runs = self.stats.runs, "Simulated day complete");
        }

        self.finish()
    }

    fn step(&mut self, trigger: u32) {
        let triggers = self.config.triggers_per_day;
        let env = &self.env;
        env.clock.advance(DAY / triggers);

        self.stats.keys_expired += u64::from(env.key_store.prune_expired(env.clock.now()));
        let metered = self.rng.gen_bool(self.config.metered_probability);
        env.network.set_metered(metered);

        let report = self.provisioner.run();
        self.stats.runs += 1;
        self.stats.record(&report.outcome);

        let per_day = self.config.keys_consumed_per_day;
        let consume = per_day / triggers + u32::from(trigger < per_day % triggers);
        let levels: Vec<SecurityLevel> = self
            .config
            .levels
            .iter()
            .map(|info| info.security_level)
            .collect();
        for level in levels {
            for _ in 0..consume {
                self.consume_key(level);
            }
        }
    }

    /// An app takes a key, refilling the level if it took the last one.
    fn consume_key(&mut self, level: SecurityLevel) {
        if !self.env.key_store.assign_key(level) {
            self.stats.starved += 1;
            return;
        }
        self.stats.keys_assigned += 1;

        if self.env.key_store.status_at(level, Duration::ZERO).unassigned == 0 {
            let outcome = self.provisioner.refill(level);
            debug!(%level, outcome = outcome.type_name(), "Refill after last key taken");
            self.stats.refills += 1;
            self.stats.record(&outcome);
        }
    }

    fn finish(mut self) -> SimulationStats {
        let key_store = self.env.key_store.counters();
        let endorsement = self.env.endorsement.counters();

        self.stats.keys_generated = key_store.generated;
        self.stats.keys_certified = endorsement.certified_keys;
        self.stats.fetch_failures = endorsement.fetch_failures;
        self.stats.certify_batches = endorsement.batch_sizes.len() as u64;
        self.stats.largest_batch = endorsement.batch_sizes.iter().copied().max().unwrap_or(0);
        self.stats.time_paused = self.env.clock.total_slept();

        let now = self.env.clock.now();
        for info in &self.config.levels {
            let level = info.security_level;
            self.stats
                .final_pools
                .insert(level, self.env.key_store.status_at(level, now));
        }

        info!(
            runs = self.stats.runs,
            certified = self.stats.keys_certified,
            starved = self.stats.starved,
            "Simulation complete"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn quiet() -> ProvisionerConfig {
        ProvisionerConfig::default().with_generation_pause(Duration::from_millis(1))
    }

    #[test]
    fn test_deterministic_with_seed() {
        let config = SimulationConfig::new(20)
            .with_seed(42)
            .with_fetch_failure_rate(0.3)
            .with_metered_probability(0.5)
            .with_provisioner(quiet());

        let a = SimulationRunner::new(config.clone()).run();
        let b = SimulationRunner::new(config).run();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pool_stays_stocked_on_healthy_backend() {
        let stats = SimulationRunner::new(
            SimulationConfig::new(60)
                .with_keys_consumed_per_day(3)
                .with_provisioner(quiet()),
        )
        .run();

        assert_eq!(stats.runs, 60);
        assert_eq!(stats.starved, 0);
        assert!(stats.keys_certified > 0);
        assert!(stats.largest_batch <= 20);
        assert_eq!(stats.outcome_count("Aborted"), 0);
    }

    #[test]
    fn test_flaky_backend_triggers_resets() {
        let stats = SimulationRunner::new(
            SimulationConfig::new(40)
                .with_fetch_failure_rate(1.0)
                .with_provisioner(quiet()),
        )
        .run();

        // Every sixth consecutive failure clears the persisted state.
        assert_eq!(stats.resets, stats.fetch_failures / 6);
        assert_eq!(stats.keys_certified, 0);
    }

    #[test]
    #[traced_test]
    fn test_backend_disabled() {
        let stats = SimulationRunner::new(
            SimulationConfig::new(5)
                .with_extra_keys(0)
                .with_provisioner(quiet()),
        )
        .run();

        assert_eq!(stats.keys_generated, 0);
        assert!(stats.final_pools.values().all(PoolStatus::is_empty));
        assert!(logs_contain("Simulation complete"));
    }
}
