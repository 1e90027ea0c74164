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

//! Detbench Core
//!
//! Fundamental data structures shared by the detection regression harness:
//! the entities exchanged with training/inference backends, the task and
//! dataset-loader contracts, the stage result store and its dot-address
//! resolver, and the parameters identifying one test invocation.

pub mod address;
pub mod entities;
pub mod loader;
pub mod params;
pub mod stage_name;
pub mod task;
pub mod value;

pub use address::{resolve, AddressError, Node};
pub use entities::{
    Annotation, BoundingBox, DatasetEntity, DatasetItem, Entrypoints, Hyperparameters, Label,
    LabelSchema, LearningParameters, ModelConfiguration, ModelEntity, ModelFormat,
    ModelOptimizationType, ModelPrecision, ModelStatus, ModelTemplate, Performance, ScoreMetric,
    Subset, TaskEnvironment, TemplateError,
};
pub use loader::{CocoLoader, DatasetError, DatasetLoader, DatasetParameters};
pub use params::{
    CacheKey, ParamError, ParamOverride, TestParameters, DEFAULT_FIELD_VALUE_FOR_USING_IN_TEST,
    KEEP_CONFIG_FIELD_VALUE, REALLIFE_USECASE,
};
pub use stage_name::{StageName, UnknownStageName};
pub use task::{
    ExportType, InferenceParameters, OptimizationKind, OptimizationParameters, ResultSet, Task,
    TaskError, TaskFactory, TaskKind, TaskRegistry,
};
pub use value::{Bundle, BundleExt, DuplicateResult, ResultStore, StageValue};
