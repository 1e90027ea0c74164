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

//! # Detbench Metric Validation
//!
//! Quality gates for evaluation stages.
//!
//! ## Features
//!
//! - **Tolerance bands**: symmetric (`max_diff`) or asymmetric
//!   (`max_diff_if_less_threshold` / `max_diff_if_greater_threshold`) ranges
//!   around a target value
//! - **Relative targets**: a target can point into the results of another
//!   stage with a dot-separated `base` address
//! - **Expected-metrics files**: YAML keyed by test identity, checked statically
//!   with [`ExpectedMetrics::lint`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use detbench_evals::{ExpectationLookup, ExpectedMetrics, Validator};
//! use std::sync::Arc;
//!
//! let expected = Arc::new(ExpectedMetrics::from_file("expected_metrics.yaml")?);
//! let validator = Validator::new(Some(ExpectationLookup::new(Some(expected), test_id)));
//! validator.validate(&result, &store)?;
//! ```

use detbench_core::AddressError;
use std::path::PathBuf;
use thiserror::Error;

pub mod expectations;
pub mod tolerance;
pub mod validator;

pub use expectations::{ExpectedMetrics, LintIssue, MetricExpectations};
pub use tolerance::{compare, Bounds, Comparison, MetricRequirement, Target, Tolerance};
pub use validator::{ExpectationLookup, Validator};

/// Errors that can occur during validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Wrong metric requirements: {0}")]
    Config(String),

    #[error("Cannot resolve base value '{address}': {source}")]
    BaseNotFound {
        address: String,
        #[source]
        source: AddressError,
    },

    #[error("Cannot get metric {address} from the current result: {reason}")]
    MetricNotFound { address: String, reason: String },

    #[error("No expected metrics for this test: {0}")]
    MissingExpectation(String),

    #[error("Validation failed:\n{}", .reasons.join("\n"))]
    Failed { reasons: Vec<String> },

    #[error("Cannot read expected metrics file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse expected metrics: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
