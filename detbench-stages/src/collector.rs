// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Sinks for the final metrics reported by training and evaluation stages.
//!
//! Every scoring action reports a `metric_name` of the form
//! `<stage>/<score name>` followed by the matching `metric_value`.

use parking_lot::Mutex;
use serde_json::Value;

pub trait MetricsCollector: Send + Sync {
    fn log_final_metric(&self, key: &str, value: Value);
}

/// Emits final metrics as tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCollector;

impl MetricsCollector for TracingCollector {
    fn log_final_metric(&self, key: &str, value: Value) {
        tracing::info!(target: "detbench::metrics", key, %value, "final metric");
    }
}

/// Keeps final metrics in memory, in reporting order.
#[derive(Debug, Default)]
pub struct MemoryCollector {
    metrics: Mutex<Vec<(String, Value)>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn final_metrics(&self) -> Vec<(String, Value)> {
        self.metrics.lock().clone()
    }

    /// Most recent value reported under `key`.
    pub fn last(&self, key: &str) -> Option<Value> {
        self.metrics
            .lock()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

impl MetricsCollector for MemoryCollector {
    fn log_final_metric(&self, key: &str, value: Value) {
        self.metrics.lock().push((key.to_string(), value));
    }
}
