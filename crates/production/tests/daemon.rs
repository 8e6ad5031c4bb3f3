//! Daemon lifecycle against simulated collaborators.

use keypool_core::{RunOutcome, SettingsStore};
use keypool_production::{run_daemon, DaemonConfig, DaemonPorts, FileSettingsStore};
use keypool_provisioner::ProvisionerConfig;
use keypool_simulation::SimEnvironment;
use keypool_test_helpers::tee;
use keypool_types::RunId;
use std::time::Duration;

fn ports(env: &SimEnvironment) -> DaemonPorts {
    DaemonPorts {
        key_store: env.connector.clone(),
        endorsement: env.endorsement.clone(),
        network: env.network.clone(),
        clock: Some(env.clock.clone()),
    }
}

#[tokio::test]
async fn test_daemon_runs_immediately_and_persists_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let env = SimEnvironment::new(vec![tee()], 1);
    let config = DaemonConfig::default()
        .with_settings_path(&path)
        .with_trigger_interval(Duration::from_secs(3600));

    let summary = run_daemon(
        config,
        ports(&env),
        tokio::time::sleep(Duration::from_millis(100)),
    )
    .await
    .unwrap();

    assert_eq!(summary.periodic_runs, 1);
    let report = summary.last_report.unwrap();
    assert_eq!(report.run_id, RunId(1));
    assert!(matches!(report.outcome, RunOutcome::Provisioned { .. }));

    let store = FileSettingsStore::open(&path).unwrap();
    assert_eq!(store.get("provisioning_run_id").as_deref(), Some("1"));
    assert_eq!(store.get("extra_signed_keys_available").as_deref(), Some("6"));
}

#[tokio::test]
async fn test_run_id_continues_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let env = SimEnvironment::new(vec![tee()], 1);

    for expected in 1..=2 {
        let config = DaemonConfig::default()
            .with_settings_path(&path)
            .with_provisioner(ProvisionerConfig::default().with_failure_maximum(2));
        let summary = run_daemon(config, ports(&env), tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(summary.last_report.unwrap().run_id, RunId(expected));
    }
}

#[tokio::test]
async fn test_corrupt_settings_file_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{").unwrap();
    let env = SimEnvironment::new(vec![tee()], 1);

    let result = run_daemon(
        DaemonConfig::default().with_settings_path(&path),
        ports(&env),
        std::future::ready(()),
    )
    .await;

    assert!(result.is_err());
}
