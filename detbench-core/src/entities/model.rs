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

use super::environment::Hyperparameters;
use super::label::LabelSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelStatus {
    NotReady,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelFormat {
    BaseFramework,
    Openvino,
}

/// How a model artifact was produced from the trained weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelOptimizationType {
    None,
    /// Model Optimizer conversion (plain export).
    Mo,
    /// Post-training quantization.
    Pot,
    /// Compression-aware fine-tuning.
    Nncf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelPrecision {
    Fp32,
    Fp16,
    Int8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetric {
    pub name: String,
    pub value: f64,
}

impl ScoreMetric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub score: ScoreMetric,
}

impl Performance {
    pub fn new(score: ScoreMetric) -> Self {
        Self { score }
    }
}

/// What a backend needs to know to build or load a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfiguration {
    pub label_schema: LabelSchema,
    pub hyper_parameters: Hyperparameters,
}

/// A model artifact and its production status.
///
/// Stages create a `NotReady` placeholder and hand it to a backend, which
/// fills in the status, format, optimization type and data blobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEntity {
    pub configuration: ModelConfiguration,
    pub status: ModelStatus,
    pub format: ModelFormat,
    pub optimization_type: ModelOptimizationType,
    pub precision: Vec<ModelPrecision>,
    pub performance: Option<Performance>,
    data: HashMap<String, Vec<u8>>,
}

impl ModelEntity {
    pub fn new(configuration: ModelConfiguration) -> Self {
        Self {
            configuration,
            status: ModelStatus::NotReady,
            format: ModelFormat::BaseFramework,
            optimization_type: ModelOptimizationType::None,
            precision: vec![ModelPrecision::Fp32],
            performance: None,
            data: HashMap::new(),
        }
    }

    pub fn set_data(&mut self, key: impl Into<String>, blob: Vec<u8>) {
        self.data.insert(key.into(), blob);
    }

    pub fn get_data(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    pub fn data_keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }
}
