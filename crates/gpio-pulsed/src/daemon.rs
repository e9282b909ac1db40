//! The daemon runtime: wiring, the simulation loop and periodic reports.

use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use counters_class::{AttributeTree, TimeVal};
use counters_hal::{SimGpioChip, SimIrqChip};

use crate::config::DaemonConfig;
use crate::error::RegistryResult;
use crate::registry::{PulseCounterClass, PulseCounterRegistry};

/// Timing of [`Daemon::run`]. `None` disables the corresponding timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Fire every bound simulated line at this interval.
    pub simulate_interval: Option<Duration>,
    /// Log a report of every device at this interval.
    pub report_interval: Option<Duration>,
    /// Stop after this long.
    pub run_for: Option<Duration>,
}

impl RunOptions {
    /// Builds options from millisecond values where 0 means disabled.
    pub fn from_millis(simulate: u64, report: u64, run_for: u64) -> Self {
        let opt = |ms: u64| (ms > 0).then(|| Duration::from_millis(ms));
        Self {
            simulate_interval: opt(simulate),
            report_interval: opt(report),
            run_for: opt(run_for),
        }
    }
}

/// Statistics of one bound pulse source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub dev_name: String,
    pub name: String,
    pub count: u64,
    pub last_period: TimeVal,
    pub average_period: TimeVal,
}

/// A pulse counter daemon on simulated controllers.
pub struct Daemon {
    config: DaemonConfig,
    irq: Arc<SimIrqChip>,
    gpio: Arc<SimGpioChip>,
    tree: Arc<AttributeTree>,
    registry: PulseCounterRegistry,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Self {
        let irq = Arc::new(SimIrqChip::new());
        let gpio = Arc::new(SimGpioChip::new(
            config.simulation.gpio_lines,
            config.simulation.irq_base,
        ));
        let tree = Arc::new(AttributeTree::new());
        let class = Arc::new(
            PulseCounterClass::new(config.class.clone()).with_publisher(tree.clone()),
        );
        let registry = PulseCounterRegistry::new(class, irq.clone(), gpio.clone());

        Self {
            config,
            irq,
            gpio,
            tree,
            registry,
        }
    }

    pub fn irq_chip(&self) -> &Arc<SimIrqChip> {
        &self.irq
    }

    pub fn gpio_chip(&self) -> &Arc<SimGpioChip> {
        &self.gpio
    }

    pub fn attributes(&self) -> &Arc<AttributeTree> {
        &self.tree
    }

    pub fn registry(&self) -> &PulseCounterRegistry {
        &self.registry
    }

    pub fn class(&self) -> &Arc<PulseCounterClass> {
        self.registry.class()
    }

    /// Binds the configured platform description.
    pub fn start(&self) -> RegistryResult<usize> {
        let bound = self.registry.probe(self.config.platform.as_ref())?;
        debug!("Published attributes: {:?}", self.tree.list());
        Ok(bound)
    }

    /// Collects and logs the statistics of every bound device. Counts are
    /// not cleared.
    pub fn report(&self) -> Vec<DeviceReport> {
        let class = self.class();
        let mut reports = Vec::new();

        for entry in self.registry.devices() {
            let (Ok(dev_name), Ok(stats)) = (class.dev_name(entry.id), class.snapshot(entry.id))
            else {
                continue;
            };
            let report = DeviceReport {
                dev_name,
                name: entry.name,
                count: stats.pulse_count(),
                last_period: stats.last_pulse_period(),
                average_period: stats.average_pulse_period(),
            };
            info!(
                "{} ({}): count={} last_pulse_period={} average_pulse_period={}",
                report.dev_name,
                report.name,
                report.count,
                report.last_period,
                report.average_period
            );
            reports.push(report);
        }

        reports
    }

    /// Runs timers until `shutdown` completes or `run_for` elapses.
    ///
    /// Returns the number of simulated pulses that were handled.
    pub async fn run<F>(&self, options: RunOptions, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        let mut simulate = options.simulate_interval.map(interval);
        let mut report = options.report_interval.map(interval);
        let deadline = async {
            match options.run_for {
                Some(d) => time::sleep(d).await,
                None => future::pending().await,
            }
        };
        tokio::pin!(shutdown);
        tokio::pin!(deadline);

        let mut handled = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = &mut deadline => {
                    info!("Run time elapsed");
                    break;
                }
                _ = tick(&mut simulate) => {
                    handled += self.irq.fire_all();
                }
                _ = tick(&mut report) => {
                    self.report();
                }
            }
        }

        handled
    }

    /// Tears down every device. Returns true when the class is idle
    /// afterwards.
    pub fn stop(&self) -> bool {
        self.registry.remove();
        let idle = self.class().is_idle();
        if !idle {
            warn!(
                "{} devices still alive after teardown",
                self.class().device_count()
            );
        }
        idle
    }
}

fn interval(period: Duration) -> Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::description::{DeviceNode, DeviceTree};

    fn config() -> DaemonConfig {
        DaemonConfig {
            platform: Some(
                DeviceTree::new()
                    .with_child(DeviceNode::new("meter").with_gpio(1))
                    .with_child(DeviceNode::new("gauge").with_interrupt(7)),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_run_options_from_millis() {
        let options = RunOptions::from_millis(0, 250, 1000);
        assert_eq!(options.simulate_interval, None);
        assert_eq!(options.report_interval, Some(Duration::from_millis(250)));
        assert_eq!(options.run_for, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_start_publishes_attributes() {
        let daemon = Daemon::new(config());
        assert_eq!(daemon.start().unwrap(), 2);
        assert_eq!(daemon.attributes().devices(), vec!["counter0", "counter1"]);
        assert_eq!(
            daemon
                .attributes()
                .read(daemon.class(), "counter0/name")
                .unwrap(),
            "meter\n"
        );
        assert!(daemon.stop());
    }

    #[test]
    fn test_start_without_platform_fails() {
        let daemon = Daemon::new(DaemonConfig::default());
        let err = daemon.start().unwrap_err();
        assert_eq!(err.errno(), -19);
        assert!(daemon.stop());
    }

    #[tokio::test]
    async fn test_run_until_deadline_counts_pulses() {
        let daemon = Daemon::new(config());
        daemon.start().unwrap();

        let options = RunOptions::from_millis(5, 0, 50);
        let handled = daemon.run(options, future::pending()).await;
        assert!(handled >= 2, "handled {handled}");

        let reports = daemon.report();
        assert_eq!(reports.len(), 2);
        let total: u64 = reports.iter().map(|r| r.count).sum();
        assert_eq!(total, handled as u64);
        assert!(daemon.stop());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let daemon = Daemon::new(config());
        daemon.start().unwrap();

        let handled = daemon.run(RunOptions::default(), async {}).await;
        assert_eq!(handled, 0);
        assert!(daemon.stop());
    }
}
