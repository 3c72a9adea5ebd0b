use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One unit of progress output produced by a running scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Completed fraction of the scenario. Expected to grow towards 1.0 but
    /// neither monotonicity nor the upper bound is enforced.
    pub progress: f64,

    /// When the event was produced
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(progress: f64, timestamp: DateTime<Utc>) -> Self {
        Event { progress, timestamp }
    }

    /// Event stamped with the current wall-clock time
    pub fn now(progress: f64) -> Self {
        Event::new(progress, Utc::now())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{progress: {:.4}, timestamp: {}}}",
            self.progress,
            self.timestamp.to_rfc3339()
        )
    }
}
