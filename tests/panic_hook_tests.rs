// ABOUTME: Tests for the process panic hook installed by the binary
// ABOUTME: A contained panic must be logged only, never counted as a critical failure

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use std::sync::Mutex;

/// Remembers the name of every counter touched while installed
#[derive(Default)]
struct CounterNames(Mutex<Vec<String>>);

impl CounterNames {
    fn names(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Recorder for CounterNames {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        self.0.lock().unwrap().push(key.name().to_string());
        Counter::noop()
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

#[test]
fn test_contained_panic_is_not_reported_as_critical() {
    skidbot::install_panic_hook();
    let recorder = CounterNames::default();

    metrics::with_local_recorder(&recorder, || {
        let result = std::panic::catch_unwind(|| panic!("handler exploded"));
        assert!(result.is_err());
    });
    assert!(!recorder
        .names()
        .iter()
        .any(|name| name == "skidbot_task_failures_total"));

    // The critical path itself still counts
    metrics::with_local_recorder(&recorder, || {
        skidbot::error::report_critical("event task", "handler exploded");
    });
    assert!(recorder
        .names()
        .iter()
        .any(|name| name == "skidbot_task_failures_total"));
}
