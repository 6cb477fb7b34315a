//! Rolling error monitor.
//!
//! A side channel the pipeline ticks on every swallowed failure. Counters
//! roll up per (kind, component); crossing the threshold within the
//! configured window produces an alert-level log so an operator notices
//! a failing backend before the queue of silent drops gets long.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct MonitorState {
    total: u64,
    by_key: HashMap<(String, String), u64>,
    recent: VecDeque<Instant>,
    alerted: bool,
}

/// Rolling counter of swallowed errors with an alert threshold.
#[derive(Debug)]
pub struct ErrorMonitor {
    threshold: usize,
    window: Duration,
    state: Mutex<MonitorState>,
}

impl Default for ErrorMonitor {
    /// Ten errors within an hour trips the alert.
    fn default() -> Self {
        Self::new(10, Duration::from_secs(3600))
    }
}

impl ErrorMonitor {
    /// Create a monitor that alerts after `threshold` errors within
    /// `window`.
    pub fn new(threshold: usize, window: Duration) -> Self {
        Self {
            threshold,
            window,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Record one error of `kind` in `component`.
    pub fn record(&self, kind: &str, component: &str) {
        let mut state = self.state.lock().expect("monitor lock poisoned");
        state.total += 1;
        *state
            .by_key
            .entry((kind.to_string(), component.to_string()))
            .or_insert(0) += 1;

        let now = Instant::now();
        state.recent.push_back(now);
        while let Some(&front) = state.recent.front() {
            if now.duration_since(front) > self.window {
                state.recent.pop_front();
            } else {
                break;
            }
        }

        tracing::error!(kind, component, total = state.total, "error recorded");

        if state.recent.len() >= self.threshold {
            if !state.alerted {
                state.alerted = true;
                tracing::warn!(
                    errors_in_window = state.recent.len(),
                    threshold = self.threshold,
                    "error threshold exceeded"
                );
            }
        } else {
            state.alerted = false;
        }
    }

    /// Total errors recorded since construction or the last reset.
    pub fn total(&self) -> u64 {
        self.state.lock().expect("monitor lock poisoned").total
    }

    /// Errors recorded for a specific (kind, component) pair.
    pub fn count(&self, kind: &str, component: &str) -> u64 {
        self.state
            .lock()
            .expect("monitor lock poisoned")
            .by_key
            .get(&(kind.to_string(), component.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Errors currently inside the rolling window.
    pub fn in_window(&self) -> usize {
        let mut state = self.state.lock().expect("monitor lock poisoned");
        let now = Instant::now();
        while let Some(&front) = state.recent.front() {
            if now.duration_since(front) > self.window {
                state.recent.pop_front();
            } else {
                break;
            }
        }
        state.recent.len()
    }

    /// Zero every counter.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("monitor lock poisoned");
        *state = MonitorState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_roll_up_per_kind_and_component() {
        let monitor = ErrorMonitor::new(100, Duration::from_secs(60));
        monitor.record("persist", "store");
        monitor.record("persist", "store");
        monitor.record("classify", "client");

        assert_eq!(monitor.total(), 3);
        assert_eq!(monitor.count("persist", "store"), 2);
        assert_eq!(monitor.count("classify", "client"), 1);
        assert_eq!(monitor.count("missing", "store"), 0);
    }

    #[test]
    fn window_drops_old_entries() {
        let monitor = ErrorMonitor::new(100, Duration::from_millis(10));
        monitor.record("persist", "store");
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(monitor.in_window(), 0);
        // Lifetime totals survive the window.
        assert_eq!(monitor.total(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let monitor = ErrorMonitor::default();
        monitor.record("persist", "store");
        monitor.reset();
        assert_eq!(monitor.total(), 0);
        assert_eq!(monitor.in_window(), 0);
    }
}
