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

//! Names of the ten harness stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One node of the fixed stage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Training,
    TrainingEvaluation,
    Export,
    ExportEvaluation,
    Quantize,
    QuantizeEvaluation,
    Compress,
    CompressEvaluation,
    CompressExport,
    CompressExportEvaluation,
}

impl StageName {
    /// All stages in their canonical order.
    pub const ALL: [StageName; 10] = [
        StageName::Training,
        StageName::TrainingEvaluation,
        StageName::Export,
        StageName::ExportEvaluation,
        StageName::Quantize,
        StageName::QuantizeEvaluation,
        StageName::Compress,
        StageName::CompressEvaluation,
        StageName::CompressExport,
        StageName::CompressExportEvaluation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Training => "training",
            StageName::TrainingEvaluation => "training_evaluation",
            StageName::Export => "export",
            StageName::ExportEvaluation => "export_evaluation",
            StageName::Quantize => "quantize",
            StageName::QuantizeEvaluation => "quantize_evaluation",
            StageName::Compress => "compress",
            StageName::CompressEvaluation => "compress_evaluation",
            StageName::CompressExport => "compress_export",
            StageName::CompressExportEvaluation => "compress_export_evaluation",
        }
    }

    /// Evaluation stages are the only ones whose results are quality-gated.
    pub fn is_evaluation(self) -> bool {
        matches!(
            self,
            StageName::TrainingEvaluation
                | StageName::ExportEvaluation
                | StageName::QuantizeEvaluation
                | StageName::CompressEvaluation
                | StageName::CompressExportEvaluation
        )
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown stage name: {0}")]
pub struct UnknownStageName(pub String);

impl FromStr for StageName {
    type Err = UnknownStageName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageName::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownStageName(s.to_string()))
    }
}
