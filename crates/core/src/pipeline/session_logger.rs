use std::collections::HashMap;
use std::time::Instant;

use crate::inference::domain::inference_dispatcher::InferenceTier;

/// Cross-cutting logger for session orchestration events.
///
/// Keeps the controller independent of where its messages end up (stdout,
/// a window, or nowhere in tests).
pub trait SessionLogger: Send {
    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Record how long a named stage took (`infer`, `classify`, ...).
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric.
    fn metric(&mut self, name: &str, value: f64);

    /// Record which inference tier produced a word's scores.
    fn served_by(&mut self, tier: InferenceTier);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Logger that discards all events.
pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn info(&mut self, _message: &str) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn served_by(&mut self, _tier: InferenceTier) {}
}

/// CLI logger that forwards messages to `log` and keeps per-stage timings
/// and per-tier counts for the summary.
pub struct StdoutSessionLogger {
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    tiers: HashMap<InferenceTier, usize>,
    start_time: Instant,
    messages: Vec<String>,
}

impl StdoutSessionLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            tiers: HashMap::new(),
            start_time: Instant::now(),
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() && self.tiers.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let words: usize = self.tiers.values().sum();
        let mut lines = vec![format!(
            "Session summary ({words} words, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            lines.push(format!(
                "  {stage:10}: avg {avg_ms:7.1}ms  total {total_ms:8.0}ms  ({} runs)",
                durations.len()
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        if words > 0 {
            lines.push(format!(
                "  Served: remote {}, local {}",
                self.served_count(InferenceTier::Remote),
                self.served_count(InferenceTier::Local)
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn served_count(&self, tier: InferenceTier) -> usize {
        self.tiers.get(&tier).copied().unwrap_or(0)
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl Default for StdoutSessionLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLogger for StdoutSessionLogger {
    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn served_by(&mut self, tier: InferenceTier) {
        *self.tiers.entry(tier).or_default() += 1;
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullSessionLogger;
        logger.info("hello");
        logger.timing("infer", 5.0);
        logger.metric("frames_skipped", 3.0);
        logger.served_by(InferenceTier::Local);
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = StdoutSessionLogger::new();
        logger.timing("infer", 20.0);
        logger.timing("infer", 30.0);
        logger.timing("sentence", 5.0);

        let infer = logger.timings_for("infer").unwrap();
        assert_eq!(infer.len(), 2);
        assert_relative_eq!(infer[0], 20.0);
        assert_relative_eq!(infer[1], 30.0);
        assert_eq!(logger.timings_for("sentence").unwrap().len(), 1);
        assert!(logger.timings_for("speech").is_none());
    }

    #[test]
    fn test_metric_records_values() {
        let mut logger = StdoutSessionLogger::new();
        logger.metric("frames_skipped", 3.0);
        logger.metric("frames_skipped", 4.0);

        let values = logger.metrics_for("frames_skipped").unwrap();
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        assert_relative_eq!(avg, 3.5);
    }

    #[test]
    fn test_served_by_counts_per_tier() {
        let mut logger = StdoutSessionLogger::new();
        logger.served_by(InferenceTier::Local);
        logger.served_by(InferenceTier::Remote);
        logger.served_by(InferenceTier::Local);

        assert_eq!(logger.served_count(InferenceTier::Local), 2);
        assert_eq!(logger.served_count(InferenceTier::Remote), 1);
    }

    #[test]
    fn test_summary_includes_stages_metrics_and_tiers() {
        let mut logger = StdoutSessionLogger::new();
        logger.timing("infer", 20.0);
        logger.timing("classify", 1.0);
        logger.metric("frames_skipped", 3.0);
        logger.metric("frames_skipped", 4.0);
        logger.served_by(InferenceTier::Remote);
        logger.served_by(InferenceTier::Local);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Session summary (2 words"));
        assert!(summary.contains("infer"));
        assert!(summary.contains("classify"));
        assert!(summary.contains("frames_skipped: avg 3.5"));
        assert!(summary.contains("Served: remote 1, local 1"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutSessionLogger::new().summary_string().is_none());
    }

    #[test]
    fn test_info_stores_messages() {
        let mut logger = StdoutSessionLogger::default();
        logger.info("Sequence capture started...");
        assert_eq!(logger.messages(), &["Sequence capture started...".to_string()]);
    }
}
