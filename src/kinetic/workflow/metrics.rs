// SPDX-License-Identifier: MIT

//! Elapsed-time tracking for a workflow run

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Default)]
struct MetricsInner {
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    duration: Duration,
    is_running: bool,
}

/// Thread-safe start/stop timer; both operations are idempotent
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    inner: RwLock<MetricsInner>,
}

/// Serializable view of `WorkflowMetrics`, embedded in run metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl MetricsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.started_at.is_none() && self.completed_at.is_none() && self.duration_seconds.is_none()
    }
}

fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or_default()
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        let mut inner = self.inner.write();
        if inner.is_running {
            return;
        }
        if inner.started_at.is_none() {
            inner.started_at = Some(Utc::now());
        }
        inner.is_running = true;
    }

    /// Stop the timer and return the final duration. Later calls return the
    /// same value.
    pub fn stop(&self) -> Duration {
        let mut inner = self.inner.write();
        if !inner.is_running && inner.completed_at.is_some() {
            return inner.duration;
        }
        let now = Utc::now();
        let started_at = *inner.started_at.get_or_insert(now);
        inner.completed_at = Some(now);
        inner.duration = elapsed(started_at, now);
        inner.is_running = false;
        inner.duration
    }

    /// Elapsed time while running, the final duration once stopped
    pub fn duration(&self) -> Duration {
        let inner = self.inner.read();
        match inner.started_at {
            None => Duration::ZERO,
            Some(started_at) if inner.is_running => elapsed(started_at, Utc::now()),
            Some(_) => inner.duration,
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.read().is_running
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read();
        let duration_seconds = if !inner.duration.is_zero() {
            Some(inner.duration.as_secs_f64())
        } else if inner.is_running {
            inner
                .started_at
                .map(|started_at| elapsed(started_at, Utc::now()).as_secs_f64())
        } else {
            None
        };
        MetricsSnapshot {
            started_at: inner.started_at,
            completed_at: inner.completed_at,
            duration_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unstarted_metrics() {
        let metrics = WorkflowMetrics::new();
        assert_eq!(metrics.duration(), Duration::ZERO);
        assert!(!metrics.is_running());
        assert!(metrics.snapshot().is_empty());
    }

    #[test]
    fn test_start_stop_is_idempotent() {
        let metrics = WorkflowMetrics::new();
        metrics.start();
        metrics.start();
        assert!(metrics.is_running());
        std::thread::sleep(Duration::from_millis(5));

        let first = metrics.stop();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(metrics.stop(), first);
        assert_eq!(metrics.duration(), first);
        assert!(first >= Duration::from_millis(5));
    }

    #[test]
    fn test_snapshot_after_stop() {
        let metrics = WorkflowMetrics::new();
        metrics.start();
        std::thread::sleep(Duration::from_millis(2));
        metrics.stop();

        let snapshot = metrics.snapshot();
        assert!(snapshot.started_at.is_some());
        assert!(snapshot.completed_at.is_some());
        assert!(snapshot.duration_seconds.unwrap() > 0.0);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("duration_seconds").is_some());
    }

    #[test]
    fn test_stop_without_start() {
        let metrics = WorkflowMetrics::new();
        metrics.stop();
        assert!(!metrics.is_running());
        assert!(metrics.snapshot().completed_at.is_some());
    }
}
