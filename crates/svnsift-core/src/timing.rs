//! Opt-in phase timing.
//!
//! Enabled by `--timing` or `SVNSIFT_TIMING=1`. Each phase of a run is
//! wrapped in [`timed`]; [`collect_report`] drains the samples into a
//! [`TimingReport`] rendered on stderr as a table or JSON.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::json;

/// Aggregated timing report across instrumented phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingReport {
    /// Per-phase totals, in name order.
    pub phases: Vec<PhaseTiming>,
}

/// Accumulated time spent in one named phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTiming {
    pub name: String,
    pub total: Duration,
    /// Longest single sample.
    pub max: Duration,
    pub count: usize,
}

#[derive(Debug, Clone)]
struct Sample {
    name: String,
    elapsed: Duration,
}

thread_local! {
    static SAMPLES: RefCell<Vec<Sample>> = const { RefCell::new(Vec::new()) };
}

static TIMING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Returns true when `SVNSIFT_TIMING` enables timing collection.
///
/// Supported truthy values: `1`, `true`, `yes`, `on` (case-insensitive).
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("SVNSIFT_TIMING")
        .ok()
        .is_some_and(|value| is_truthy(value.as_str()))
}

pub fn set_timing_enabled(enabled: bool) {
    TIMING_ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        clear_timings();
    }
}

#[must_use]
pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::Relaxed)
}

/// Clears all recorded timings for the current thread.
pub fn clear_timings() {
    SAMPLES.with(|samples| samples.borrow_mut().clear());
}

/// Execute a closure while recording its duration under `name`.
///
/// Nothing is recorded unless enabled via [`set_timing_enabled`].
pub fn timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    if !is_timing_enabled() {
        return f();
    }

    let started = Instant::now();
    let result = f();
    record_sample(name, started.elapsed());
    result
}

/// Drain the current thread's samples into a report.
#[must_use]
pub fn collect_report() -> TimingReport {
    let samples = SAMPLES.with(|samples| std::mem::take(&mut *samples.borrow_mut()));

    let mut grouped: BTreeMap<String, PhaseTiming> = BTreeMap::new();
    for sample in samples {
        let phase = grouped
            .entry(sample.name.clone())
            .or_insert_with(|| PhaseTiming {
                name: sample.name,
                total: Duration::ZERO,
                max: Duration::ZERO,
                count: 0,
            });
        phase.total += sample.elapsed;
        phase.max = phase.max.max(sample.elapsed);
        phase.count += 1;
    }

    TimingReport {
        phases: grouped.into_values().collect(),
    }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Sum of every phase total.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.phases.iter().map(|phase| phase.total).sum()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let phases = self
            .phases
            .iter()
            .map(|phase| {
                json!({
                    "name": phase.name,
                    "count": phase.count,
                    "total_us": phase.total.as_micros(),
                    "max_us": phase.max.as_micros(),
                })
            })
            .collect::<Vec<_>>();

        json!({ "phases": phases, "total_us": self.total().as_micros() })
    }

    /// Render the report as a simple table for terminal output.
    #[must_use]
    pub fn display_table(&self) -> String {
        if self.phases.is_empty() {
            return "No timing samples recorded.".to_string();
        }

        let total = self.total();
        let mut out = String::new();
        out.push_str("phase                    count      total        max  share\n");
        out.push_str("-----------------------------------------------------------\n");

        for phase in &self.phases {
            out.push_str(&format!(
                "{:<24} {:>6} {:>10} {:>10} {:>5}%\n",
                phase.name,
                phase.count,
                format_duration(phase.total),
                format_duration(phase.max),
                share(phase.total, total)
            ));
        }

        out
    }
}

fn record_sample(name: &str, elapsed: Duration) {
    SAMPLES.with(|samples| {
        samples.borrow_mut().push(Sample {
            name: name.to_string(),
            elapsed,
        });
    });
}

fn share(part: Duration, total: Duration) -> u128 {
    if total.is_zero() {
        return 0;
    }
    part.as_nanos() * 100 / total.as_nanos()
}

fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();

    if micros >= 1_000_000 {
        let secs = micros / 1_000_000;
        let millis = (micros % 1_000_000) / 1_000;
        format!("{secs}.{millis:03}s")
    } else if micros >= 1_000 {
        let millis = micros / 1_000;
        let rem = micros % 1_000;
        format!("{millis}.{rem:03}ms")
    } else {
        format!("{micros}µs")
    }
}

fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|truthy| value.trim().eq_ignore_ascii_case(truthy))
}
