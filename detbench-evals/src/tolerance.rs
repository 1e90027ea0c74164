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

//! Tolerance bands around a target metric value.
//!
//! A requirement names its target either directly (`target_value`) or as a
//! dot-address into previously stored stage results (`base`). The acceptable
//! range is either `[T - max_diff, T + max_diff]` or the asymmetric
//! `[T - max_diff_if_less_threshold, T + max_diff_if_greater_threshold]`, where
//! a missing side is unbounded. All bounds are inclusive.

use crate::ValidationError;
use detbench_core::ResultStore;
use serde::{Deserialize, Serialize};

/// One entry of the expected-metrics file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricRequirement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_diff: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_diff_if_less_threshold: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_diff_if_greater_threshold: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target<'a> {
    Value(f64),
    Base(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    Symmetric(f64),
    /// At least one side is present.
    Asymmetric {
        below: Option<f64>,
        above: Option<f64>,
    },
}

/// Resolved acceptable range; at least one of `min`/`max` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub target: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Outcome of checking one observed metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub passed: bool,
    /// Set when the check failed.
    pub reason: Option<String>,
}

fn non_negative(name: &str, value: f64) -> Result<f64, ValidationError> {
    // Written so NaN is rejected too.
    if !(value >= 0.0) {
        return Err(ValidationError::Config(format!(
            "{} {} should be a non-negative number",
            name, value
        )));
    }
    Ok(value)
}

impl MetricRequirement {
    pub fn target(&self) -> Result<Target<'_>, ValidationError> {
        match (self.target_value, self.base.as_deref()) {
            (Some(value), None) => Ok(Target::Value(value)),
            (None, Some(address)) => Ok(Target::Base(address)),
            (None, None) => Err(ValidationError::Config(
                "either \"target_value\" or \"base\" should be pointed".to_string(),
            )),
            (Some(_), Some(_)) => Err(ValidationError::Config(
                "either \"target_value\" or \"base\" should be pointed, not both".to_string(),
            )),
        }
    }

    pub fn tolerance(&self) -> Result<Tolerance, ValidationError> {
        let less = self.max_diff_if_less_threshold;
        let greater = self.max_diff_if_greater_threshold;
        match self.max_diff {
            Some(_) if less.is_some() || greater.is_some() => Err(ValidationError::Config(
                "either \"max_diff\" or one/two of \"max_diff_if_less_threshold\" and \
                 \"max_diff_if_greater_threshold\" should be pointed, not both"
                    .to_string(),
            )),
            Some(diff) => Ok(Tolerance::Symmetric(non_negative("max_diff", diff)?)),
            None if less.is_none() && greater.is_none() => Err(ValidationError::Config(
                "either \"max_diff\" or one/two of \"max_diff_if_less_threshold\" and \
                 \"max_diff_if_greater_threshold\" should be pointed"
                    .to_string(),
            )),
            None => Ok(Tolerance::Asymmetric {
                below: less
                    .map(|v| non_negative("max_diff_if_less_threshold", v))
                    .transpose()?,
                above: greater
                    .map(|v| non_negative("max_diff_if_greater_threshold", v))
                    .transpose()?,
            }),
        }
    }

    /// Check the requirement shape without resolving `base`.
    pub fn check_shape(&self) -> Result<(), ValidationError> {
        self.target()?;
        self.tolerance()?;
        Ok(())
    }

    /// Resolve the target and turn the tolerance into a range.
    pub fn bounds(&self, store: &ResultStore) -> Result<Bounds, ValidationError> {
        let target = match self.target()? {
            Target::Value(value) => value,
            Target::Base(address) => {
                let node = store
                    .resolve(address)
                    .map_err(|source| ValidationError::BaseNotFound {
                        address: address.to_string(),
                        source,
                    })?;
                node.as_f64().ok_or_else(|| {
                    ValidationError::Config(format!(
                        "base value '{}' is not numeric (found {})",
                        address,
                        node.kind()
                    ))
                })?
            }
        };
        Ok(Bounds::around(target, self.tolerance()?))
    }
}

impl Bounds {
    pub fn around(target: f64, tolerance: Tolerance) -> Self {
        match tolerance {
            Tolerance::Symmetric(diff) => Bounds {
                target,
                min: Some(target - diff),
                max: Some(target + diff),
            },
            Tolerance::Asymmetric { below, above } => Bounds {
                target,
                min: below.map(|d| target - d),
                max: above.map(|d| target + d),
            },
        }
    }
}

/// Check an observed metric against its bounds, logging the verdict.
pub fn compare(observed: f64, address: &str, bounds: &Bounds) -> Comparison {
    let target = bounds.target;

    let (passed, message) = match (bounds.min, bounds.max) {
        (Some(min), Some(max)) => {
            debug_assert!(min <= target && target <= max);
            if min <= observed && observed <= max {
                (
                    true,
                    format!(
                        "Validation: passed: The metric {} is in the acceptable range near the target value {}: {} is in [{}, {}]",
                        address, target, observed, min, max
                    ),
                )
            } else {
                (
                    false,
                    format!(
                        "Validation: failed: The metric {} is NOT in the acceptable range near the target value {}: {} is NOT in [{}, {}]",
                        address, target, observed, min, max
                    ),
                )
            }
        }
        (Some(min), None) => one_sided(observed, address, target, min, true),
        (None, Some(max)) => one_sided(observed, address, target, max, false),
        (None, None) => (
            true,
            format!(
                "Validation: passed: The metric {} has no bounds around the target value {}",
                address, target
            ),
        ),
    };

    if passed {
        tracing::info!("{}", message);
        Comparison {
            passed,
            reason: None,
        }
    } else {
        tracing::error!("{}", message);
        Comparison {
            passed,
            reason: Some(message),
        }
    }
}

fn one_sided(
    observed: f64,
    address: &str,
    target: f64,
    threshold: f64,
    lower: bool,
) -> (bool, String) {
    let (relation, op_true, op_false) = if lower {
        ("greater or equal", ">=", "<")
    } else {
        ("less or equal", "<=", ">")
    };
    let passed = if lower {
        observed >= threshold
    } else {
        observed <= threshold
    };
    let acceptable_error = (threshold - target).abs();

    let message = if passed {
        format!(
            "Validation: passed: The metric {} is {} the target value {} with acceptable error {}: {} {} {}",
            address, relation, target, acceptable_error, observed, op_true, threshold
        )
    } else {
        format!(
            "Validation: failed: The metric {} is NOT {} the target value {} with acceptable error {}: {} {} {}",
            address, relation, target, acceptable_error, observed, op_false, threshold
        )
    };
    (passed, message)
}
