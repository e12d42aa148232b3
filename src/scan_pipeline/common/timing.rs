use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::info;

#[derive(Debug, Clone)]
pub struct StepTiming {
    pub name: String,
    pub duration: Duration,
}

/// Per-step durations of a capture, in the order they were recorded.
#[derive(Debug, Default)]
pub struct CaptureTimings {
    steps: Vec<StepTiming>,
    totals: HashMap<String, Duration>,
}

impl CaptureTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, timer: Timer) {
        let (name, duration) = timer.stop();
        self.add_step(name, duration);
    }

    pub fn add_step(&mut self, name: impl Into<String>, duration: Duration) {
        let name = name.into();
        *self.totals.entry(name.clone()).or_insert(Duration::ZERO) += duration;
        self.steps.push(StepTiming { name, duration });
    }

    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.duration).sum()
    }

    /// Summed duration of every step recorded under `name`.
    pub fn get_step(&self, name: &str) -> Option<Duration> {
        self.totals.get(name).copied()
    }

    pub fn steps(&self) -> &[StepTiming] {
        &self.steps
    }

    pub fn log_summary(&self) {
        let total = self.total_duration();
        for step in &self.steps {
            let share = if total.is_zero() {
                0.0
            } else {
                step.duration.as_secs_f64() / total.as_secs_f64() * 100.0
            };
            info!(
                step = %step.name,
                ms = step.duration.as_secs_f64() * 1000.0,
                share = %format!("{share:.1}%"),
                "Capture step"
            );
        }
        info!(ms = total.as_secs_f64() * 1000.0, "Capture total");
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    pub fn stop(self) -> (String, Duration) {
        (self.name, self.start.elapsed())
    }
}
