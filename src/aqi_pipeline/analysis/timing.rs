use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_nanos() as f64 / 1e6)
}

/// Wall-clock duration of each analysis stage, in the order they ran.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PipelineTimings {
    steps: Vec<StepTiming>,
    #[serde(skip)]
    totals: HashMap<String, Duration>,
}

impl PipelineTimings {
    pub fn new() -> Self {
        Self::default()
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
}

impl fmt::Display for PipelineTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total_duration().as_secs_f64();
        writeln!(f, "Analysis Timing Summary:")?;
        writeln!(f, "{:-<56}", "")?;
        for step in &self.steps {
            let secs = step.duration.as_secs_f64();
            let share = if total > 0.0 { secs / total * 100.0 } else { 0.0 };
            writeln!(f, "{:<26} {:>12.3}ms ({:>5.1}%)", step.name, secs * 1000.0, share)?;
        }
        writeln!(f, "{:-<56}", "")?;
        write!(f, "{:<26} {:>12.3}ms", "Total", total * 1000.0)
    }
}

pub struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    pub fn stop(self, timings: &mut PipelineTimings) {
        timings.add_step(self.name, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_steps_accumulate() {
        let mut timings = PipelineTimings::new();
        timings.add_step("dehaze", Duration::from_millis(5));
        timings.add_step("estimate", Duration::from_millis(1));
        timings.add_step("dehaze", Duration::from_millis(3));

        assert_eq!(timings.steps().len(), 3);
        assert_eq!(timings.get_step("dehaze"), Some(Duration::from_millis(8)));
        assert_eq!(timings.get_step("decode"), None);
        assert_eq!(timings.total_duration(), Duration::from_millis(9));
    }

    #[test]
    fn test_summary_lists_steps() {
        let mut timings = PipelineTimings::new();
        timings.add_step("preprocess", Duration::from_millis(2));
        let summary = timings.to_string();
        assert!(summary.contains("preprocess"));
        assert!(summary.contains("Total"));
    }

    #[test]
    fn test_serializes_in_milliseconds() {
        let mut timings = PipelineTimings::new();
        timings.add_step("decode", Duration::from_micros(1500));
        let json = serde_json::to_value(&timings).unwrap();
        assert_eq!(json["steps"][0]["name"], "decode");
        assert_eq!(json["steps"][0]["duration_ms"], 1.5);
    }

    #[test]
    fn test_timer_records_step() {
        let mut timings = PipelineTimings::new();
        Timer::start("categorize").stop(&mut timings);
        assert!(timings.get_step("categorize").is_some());
    }
}
