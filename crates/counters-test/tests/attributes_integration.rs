//! Measurement behaviour observed through the attribute tree
//!
//! Pulses arrive as simulated interrupts timestamped by the bench clock;
//! every check reads the published endpoints.

use pretty_assertions::assert_eq;

use counters_class::{CounterError, TimeVal};
use counters_test::{gpio_irq, tree_fixtures::gpio_node, CounterVerifier, TestBench};
use gpio_pulsed::DeviceTree;

const COUNT: &str = "counter0/values/count";
const LAST: &str = "counter0/values/last_pulse_period";
const AVERAGE: &str = "counter0/values/average_pulse_period";
const PULSE: &str = "counter0/values/pulse";

fn bench() -> TestBench {
    let bench = TestBench::new();
    let tree = DeviceTree::new().with_child(gpio_node("meter", 1));
    bench.registry.probe(Some(&tree)).expect("probe failed");
    bench
}

#[test]
fn test_device_directory() {
    let bench = bench();
    let verifier = CounterVerifier::new(&bench);

    verifier.assert_attribute("counter0/name", "meter").unwrap();
    assert_eq!(bench.class().devnode(bench.device("meter")).unwrap(), "counters/counter0");
}

#[test]
fn test_count_is_monotonic() {
    let bench = bench();
    for _ in 0..25 {
        assert_eq!(bench.irq.fire(gpio_irq(1)), 1);
    }
    assert_eq!(bench.read(COUNT), "25\n");
    assert_eq!(bench.read(COUNT), "25\n");
}

#[test]
fn test_periods_undefined_before_second_pulse() {
    let bench = bench();
    assert_eq!(bench.read(LAST), "0\n");
    assert_eq!(bench.read(AVERAGE), "0\n");

    bench.pulse_at(gpio_irq(1), TimeVal::new(10, 0));
    assert_eq!(bench.read(LAST), "0\n");
    assert_eq!(bench.read(AVERAGE), "0\n");
}

#[test]
fn test_two_pulse_period() {
    let bench = bench();
    bench.pulse_at(gpio_irq(1), TimeVal::new(10, 0));
    bench.pulse_at(gpio_irq(1), TimeVal::new(10, 500_000));

    assert_eq!(bench.read(LAST), "0500000\n");
    assert_eq!(bench.read(AVERAGE), "0500000\n");
}

#[test]
fn test_constant_spacing_average() {
    let bench = bench();
    for sec in 10..16 {
        bench.pulse_at(gpio_irq(1), TimeVal::new(sec, 0));
        if sec > 10 {
            assert_eq!(bench.read(AVERAGE), "10\n");
        }
    }
    let stats = bench.class().snapshot(bench.device("meter")).unwrap();
    assert_eq!(stats.average_pulse_period(), TimeVal::new(1, 0));
}

#[test]
fn test_clear_count_when_reading() {
    let bench = bench();
    bench.write(PULSE, "1");
    bench.write(PULSE, "1");
    bench.write(PULSE, "1");

    bench.write("clear_count_when_reading", "1\n");
    assert_eq!(bench.read("clear_count_when_reading"), "1\n");
    assert_eq!(bench.read(COUNT), "3\n");
    assert_eq!(bench.read(COUNT), "0\n");

    bench.write("clear_count_when_reading", "0");
    bench.write(PULSE, "1");
    assert_eq!(bench.read(COUNT), "1\n");
    assert_eq!(bench.read(COUNT), "1\n");
}

#[test]
fn test_count_overwrite() {
    let bench = bench();
    for _ in 0..5 {
        bench.irq.fire(gpio_irq(1));
    }

    bench.write(COUNT, "42\n");
    assert_eq!(bench.read(COUNT), "42\n");

    let err = bench.tree().write(bench.class(), COUNT, "abc").unwrap_err();
    assert!(matches!(err, CounterError::InvalidArgument { .. }));
    assert_eq!(bench.read(COUNT), "42\n");

    bench.irq.fire(gpio_irq(1));
    assert_eq!(bench.read(COUNT), "43\n");
}

#[test]
fn test_period_reset_on_write() {
    let bench = bench();
    bench.pulse_at(gpio_irq(1), TimeVal::new(20, 0));
    bench.pulse_at(gpio_irq(1), TimeVal::new(22, 250_000));
    assert_eq!(bench.read(LAST), "2250000\n");

    bench.write(LAST, "");
    assert_eq!(bench.read(LAST), "0\n");
    assert_eq!(bench.read(AVERAGE), "2250000\n");

    bench.write(AVERAGE, "999");
    assert_eq!(bench.read(AVERAGE), "0\n");

    // the next period seeds the average again
    bench.pulse_at(gpio_irq(1), TimeVal::new(23, 0));
    assert_eq!(bench.read(LAST), "0750000\n");
    assert_eq!(bench.read(AVERAGE), "0750000\n");
}

#[test]
fn test_clock_rollback_keeps_average() {
    let bench = bench();
    bench.pulse_at(gpio_irq(1), TimeVal::new(10, 0));
    bench.pulse_at(gpio_irq(1), TimeVal::new(11, 0));
    assert_eq!(bench.read(AVERAGE), "10\n");

    bench.pulse_at(gpio_irq(1), TimeVal::new(5, 0));
    assert_eq!(bench.read(LAST), "0\n");
    assert_eq!(bench.read(AVERAGE), "10\n");
    assert_eq!(bench.read(COUNT), "3\n");
}

#[test]
fn test_endpoint_permissions() {
    let bench = bench();
    let err = bench.tree().read(bench.class(), PULSE).unwrap_err();
    assert_eq!(err.errno(), -13);

    let err = bench
        .tree()
        .write(bench.class(), "counter0/name", "renamed")
        .unwrap_err();
    assert_eq!(err.errno(), -13);
    assert_eq!(bench.read("counter0/name"), "meter\n");
}
