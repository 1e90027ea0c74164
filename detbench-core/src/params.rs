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

//! Parameters identifying one test invocation.

use crate::stage_name::StageName;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Sentinel for "use the harness default for this field".
pub const DEFAULT_FIELD_VALUE_FOR_USING_IN_TEST: &str = "DEFAULT_FIELD_VALUE_FOR_USING_IN_TEST";

/// Sentinel for "keep the value from the model template".
pub const KEEP_CONFIG_FIELD_VALUE: &str = "KEEP_CONFIG_FIELD_VALUE";

/// Usecase whose evaluation stages are checked against expected metrics.
pub const REALLIFE_USECASE: &str = "reallife";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("Invalid parameter value '{0}': expected an integer, {KEEP_CONFIG_FIELD_VALUE} or {DEFAULT_FIELD_VALUE_FOR_USING_IN_TEST}")]
    InvalidOverride(String),

    #[error("Parameter {0} still holds {DEFAULT_FIELD_VALUE_FOR_USING_IN_TEST}; defaults were not filled")]
    Unresolved(&'static str),
}

/// An integer training parameter or one of the two sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawOverride", into = "RawOverride")]
pub enum ParamOverride {
    Value(u32),
    KeepConfig,
    UseDefault,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawOverride {
    Int(u32),
    Text(String),
}

impl TryFrom<RawOverride> for ParamOverride {
    type Error = ParamError;

    fn try_from(raw: RawOverride) -> Result<Self, Self::Error> {
        match raw {
            RawOverride::Int(v) => Ok(ParamOverride::Value(v)),
            RawOverride::Text(s) => s.parse(),
        }
    }
}

impl From<ParamOverride> for RawOverride {
    fn from(value: ParamOverride) -> Self {
        match value {
            ParamOverride::Value(v) => RawOverride::Int(v),
            other => RawOverride::Text(other.to_string()),
        }
    }
}

impl std::str::FromStr for ParamOverride {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            KEEP_CONFIG_FIELD_VALUE => Ok(ParamOverride::KeepConfig),
            DEFAULT_FIELD_VALUE_FOR_USING_IN_TEST => Ok(ParamOverride::UseDefault),
            other => other
                .trim()
                .parse()
                .map(ParamOverride::Value)
                .map_err(|_| ParamError::InvalidOverride(other.to_string())),
        }
    }
}

impl fmt::Display for ParamOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamOverride::Value(v) => write!(f, "{}", v),
            ParamOverride::KeepConfig => f.write_str(KEEP_CONFIG_FIELD_VALUE),
            ParamOverride::UseDefault => f.write_str(DEFAULT_FIELD_VALUE_FOR_USING_IN_TEST),
        }
    }
}

impl Default for ParamOverride {
    fn default() -> Self {
        ParamOverride::UseDefault
    }
}

impl ParamOverride {
    /// Replace `UseDefault` with a concrete value.
    pub fn or_default(self, default: u32) -> Self {
        match self {
            ParamOverride::UseDefault => ParamOverride::Value(default),
            other => other,
        }
    }

    /// The explicit value, if any.
    pub fn value(self) -> Option<u32> {
        match self {
            ParamOverride::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Key deciding whether a cached test case can be reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub model_name: String,
    pub dataset_name: String,
    pub num_training_iters: ParamOverride,
    pub batch_size: ParamOverride,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestParameters {
    pub test_stage: StageName,
    pub model_name: String,
    pub dataset_name: String,
    #[serde(default)]
    pub num_training_iters: ParamOverride,
    #[serde(default)]
    pub batch_size: ParamOverride,
    pub usecase: String,
}

impl TestParameters {
    /// Identity of the test, e.g.
    /// `ACTION-training,model-m,dataset-d,num_iters-1,batch-2,usecase-precommit`.
    pub fn test_id(&self) -> String {
        [
            ("ACTION", self.test_stage.to_string()),
            ("model", self.model_name.clone()),
            ("dataset", self.dataset_name.clone()),
            ("num_iters", self.num_training_iters.to_string()),
            ("batch", self.batch_size.to_string()),
            ("usecase", self.usecase.clone()),
        ]
        .iter()
        .map(|(short, value)| format!("{}-{}", short, value))
        .collect::<Vec<_>>()
        .join(",")
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            model_name: self.model_name.clone(),
            dataset_name: self.dataset_name.clone(),
            num_training_iters: self.num_training_iters,
            batch_size: self.batch_size,
        }
    }

    pub fn is_reallife(&self) -> bool {
        self.usecase == REALLIFE_USECASE
    }

    /// Fail if a `UseDefault` sentinel survived defaults filling.
    pub fn ensure_resolved(&self) -> Result<(), ParamError> {
        if self.num_training_iters == ParamOverride::UseDefault {
            return Err(ParamError::Unresolved("num_training_iters"));
        }
        if self.batch_size == ParamOverride::UseDefault {
            return Err(ParamError::Unresolved("batch_size"));
        }
        Ok(())
    }
}
