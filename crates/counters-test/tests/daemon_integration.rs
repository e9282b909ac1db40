//! Daemon runtime integration tests
//!
//! Runs the daemon against the sample configuration shipped with it

use std::future;

use pretty_assertions::assert_eq;

use gpio_pulsed::{Daemon, DaemonConfig, RunOptions};

const SAMPLE_CONFIG: &str = include_str!("../../gpio-pulsed/gpio-pulsed.yaml");

#[test]
fn test_sample_config_is_valid() {
    let config = DaemonConfig::from_yaml(SAMPLE_CONFIG).expect("sample config does not parse");
    config.validate().expect("sample config is invalid");
    assert_eq!(
        config.platform.map(|tree| tree.children.len()),
        Some(3)
    );
}

#[tokio::test]
async fn test_simulated_run_counts_and_tears_down() {
    let config = DaemonConfig::from_yaml(SAMPLE_CONFIG).unwrap();
    let daemon = Daemon::new(config);
    assert_eq!(daemon.start().expect("probe failed"), 3);

    let handled = daemon
        .run(RunOptions::from_millis(5, 20, 60), future::pending())
        .await;
    assert!(handled >= 3, "handled {handled}");

    let reports = daemon.report();
    let names: Vec<_> = reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["water-meter", "anemometer", "rain-gauge"]);
    assert_eq!(
        reports.iter().map(|r| r.count).sum::<u64>(),
        handled as u64
    );

    assert!(daemon.stop());
    assert_eq!(daemon.irq_chip().total_handlers(), 0);
    assert_eq!(daemon.gpio_chip().requested_count(), 0);
}
