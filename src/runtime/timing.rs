use std::time::{Duration, Instant};

use serde_json::{Map, Value};

/// Records how long each labelled phase of a run took.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    started: Instant,
    lap_start: Instant,
    laps: Vec<(String, Duration)>,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}

impl Stopwatch {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            lap_start: now,
            laps: Vec::new(),
        }
    }

    /// Closes the current phase under `label` and starts the next one.
    pub fn lap(&mut self, label: impl Into<String>) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.lap_start);
        self.lap_start = now;
        self.laps.push((label.into(), elapsed));
        elapsed
    }

    /// Runs `work` as one phase. Time spent since the previous lap is not
    /// attributed to any phase; it only shows up in [`Stopwatch::total`].
    pub fn time<T>(&mut self, label: impl Into<String>, work: impl FnOnce() -> T) -> T {
        self.lap_start = Instant::now();
        let out = work();
        self.lap(label);
        out
    }

    pub fn laps(&self) -> &[(String, Duration)] {
        &self.laps
    }

    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }

    /// Milliseconds per phase plus `total`, ready for a JSON report.
    pub fn to_json_ms(&self) -> Value {
        let mut out = Map::new();
        for (label, elapsed) in &self.laps {
            out.insert(label.clone(), Value::from(elapsed.as_secs_f64() * 1000.0));
        }
        out.insert(
            "total".to_string(),
            Value::from(self.total().as_secs_f64() * 1000.0),
        );
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_recorded_in_order() {
        let mut watch = Stopwatch::start();
        let answer = watch.time("compute", || 6 * 7);
        watch.lap("report");
        assert_eq!(answer, 42);
        let labels: Vec<&str> = watch.laps().iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, vec!["compute", "report"]);
        assert!(watch.total() >= watch.laps()[0].1);

        let report = watch.to_json_ms();
        assert!(report["compute"].is_number());
        assert!(report["total"].as_f64().unwrap() >= 0.0);
    }

    #[test]
    fn gap_before_a_timed_phase_counts_only_towards_total() {
        let mut watch = Stopwatch::start();
        std::thread::sleep(Duration::from_millis(20));
        watch.time("compute", || ());
        let phases: Duration = watch.laps().iter().map(|(_, elapsed)| *elapsed).sum();
        assert!(phases < Duration::from_millis(20));
        assert!(watch.total() >= phases + Duration::from_millis(20));
    }
}
