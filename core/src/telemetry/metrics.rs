use serde::Serialize;
use std::sync::Mutex;

/// Counters gathered across analyses; safe to share between worker threads.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub analyzed: usize,
    pub errors: usize,
    pub degraded_fits: usize,
    pub skipped_lines: usize,
    pub unconverged_solves: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut Metrics)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_analysis(&self, degraded_fits: usize, skipped_lines: usize, converged: bool) {
        self.update(|metrics| {
            metrics.analyzed += 1;
            metrics.degraded_fits += degraded_fits;
            metrics.skipped_lines += skipped_lines;
            if !converged {
                metrics.unconverged_solves += 1;
            }
        });
    }

    pub fn record_error(&self) {
        self.update(|metrics| metrics.errors += 1);
    }

    pub fn snapshot(&self) -> Metrics {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_threads() {
        let recorder = MetricsRecorder::new();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| recorder.record_analysis(1, 2, false));
            }
        });
        recorder.record_error();
        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.analyzed, 4);
        assert_eq!(snapshot.degraded_fits, 4);
        assert_eq!(snapshot.skipped_lines, 8);
        assert_eq!(snapshot.unconverged_solves, 4);
        assert_eq!(snapshot.errors, 1);
    }
}
