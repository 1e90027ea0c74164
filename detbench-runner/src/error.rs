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

use detbench_core::ParamError;
use detbench_evals::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    // Files
    #[error("Cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Cannot walk template directory: {0}")]
    Walk(#[from] walkdir::Error),

    // Definitions
    #[error("Dataset '{0}' is absent in the dataset definitions")]
    UnknownDataset(String),

    #[error("Dataset definitions for name={dataset} does not contain all required fields: missing {missing:?}")]
    IncompleteDataset {
        dataset: String,
        missing: Vec<&'static str>,
    },

    #[error("Model '{0}' has no template")]
    UnknownModel(String),

    #[error("Duplication of template names: {first:?} and {second:?}")]
    DuplicateTemplate { first: PathBuf, second: PathBuf },

    // Test parameters and expectations
    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),

    #[error("Expected metrics error: {0}")]
    Expectations(#[from] ValidationError),
}
