//! Concurrency tests
//!
//! Interrupts, attribute access and teardown racing each other

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use pretty_assertions::assert_eq;

use counters_test::{gpio_irq, tree_fixtures::three_meters, CounterVerifier, TestBench};

const FIRES_PER_THREAD: usize = 500;

#[test]
fn test_interrupts_and_readers_in_parallel() {
    let bench = TestBench::new();
    bench.registry.probe(Some(&three_meters())).unwrap();

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..FIRES_PER_THREAD {
                    for line in 1..=3 {
                        assert_eq!(bench.irq.fire(gpio_irq(line)), 1);
                    }
                }
            });
        }
        for _ in 0..2 {
            s.spawn(|| {
                for _ in 0..FIRES_PER_THREAD {
                    for dev in ["counter0", "counter1", "counter2"] {
                        let text = bench.read(&format!("{dev}/values/count"));
                        assert!(text.trim_end().parse::<u64>().is_ok(), "{text:?}");
                        bench.read(&format!("{dev}/values/average_pulse_period"));
                    }
                }
            });
        }
    });

    let expected = format!("{}\n", 4 * FIRES_PER_THREAD);
    for dev in ["counter0", "counter1", "counter2"] {
        assert_eq!(bench.read(&format!("{dev}/values/count")), expected);
    }

    bench.registry.remove();
    CounterVerifier::new(&bench).assert_idle().unwrap();
}

#[test]
fn test_clear_on_read_loses_no_pulses() {
    let bench = TestBench::new();
    bench.registry.probe(Some(&three_meters())).unwrap();
    bench.write("clear_count_when_reading", "1");

    let done = AtomicBool::new(false);
    let collected: u64 = thread::scope(|s| {
        let firers: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(|| {
                    for _ in 0..FIRES_PER_THREAD {
                        bench.irq.fire(gpio_irq(1));
                    }
                })
            })
            .collect();

        let reader = s.spawn(|| {
            let mut total = 0;
            while !done.load(Ordering::Acquire) {
                total += bench.class().snapshot_count(bench.device("meter-1")).unwrap();
            }
            total
        });

        for firer in firers {
            firer.join().unwrap();
        }
        done.store(true, Ordering::Release);
        reader.join().unwrap()
    });

    let rest = bench
        .class()
        .snapshot_count(bench.device("meter-1"))
        .unwrap();
    assert_eq!(collected + rest, 2 * FIRES_PER_THREAD as u64);
}

#[test]
fn test_removal_while_interrupts_fire() {
    let bench = TestBench::new();
    bench.registry.probe(Some(&three_meters())).unwrap();
    let stop = AtomicBool::new(false);

    thread::scope(|s| {
        for line in 1..=3 {
            let bench = &bench;
            let stop = &stop;
            s.spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    bench.irq.fire(gpio_irq(line));
                }
            });
        }

        thread::sleep(std::time::Duration::from_millis(10));
        bench.registry.remove();
        stop.store(true, Ordering::Release);
    });

    CounterVerifier::new(&bench).assert_idle().unwrap();
}
