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

//! Entities exchanged between the harness and the training/inference backends.

mod dataset;
mod environment;
mod label;
mod model;

pub use dataset::{Annotation, BoundingBox, DatasetEntity, DatasetItem, Subset};
pub use environment::{
    Entrypoints, Hyperparameters, LearningParameters, ModelTemplate, TaskEnvironment,
    TemplateError,
};
pub use label::{Label, LabelSchema};
pub use model::{
    ModelConfiguration, ModelEntity, ModelFormat, ModelOptimizationType, ModelPrecision,
    ModelStatus, Performance, ScoreMetric,
};
