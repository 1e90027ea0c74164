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

//! Task contract implemented by training/inference backends, and the
//! registry that turns a template's entry-point string into a task.

use crate::entities::{DatasetEntity, ModelEntity, Performance, TaskEnvironment};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportType {
    Openvino,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationKind {
    /// Post-training quantization.
    Pot,
    /// Compression-aware fine-tuning.
    Nncf,
}

#[derive(Debug, Clone, Default)]
pub struct InferenceParameters {
    pub is_evaluation: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OptimizationParameters {
    /// Resume from the weights already present in the output model.
    pub resume: bool,
}

/// Ground truth paired with predictions, scored by [`Task::evaluate`].
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub model: Arc<ModelEntity>,
    pub ground_truth: DatasetEntity,
    pub prediction: DatasetEntity,
    pub performance: Option<Performance>,
}

impl ResultSet {
    pub fn new(model: Arc<ModelEntity>, ground_truth: DatasetEntity, prediction: DatasetEntity) -> Self {
        Self {
            model,
            ground_truth,
            prediction,
            performance: None,
        }
    }
}

/// Which entry point of a template a task is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Base,
    Openvino,
    Compression,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Base => "base",
            TaskKind::Openvino => "openvino",
            TaskKind::Compression => "compression",
        })
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Operation not supported by this task: {0}")]
    Unsupported(&'static str),

    #[error("Model template declares no {0} entry point")]
    NoEntryPoint(TaskKind),

    #[error("Unknown task entry point: {0}")]
    UnknownEntryPoint(String),

    #[error("Task entry point already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Task backend error: {0}")]
    Backend(String),
}

/// Capability set of a detection task.
///
/// Backends implement the subset they support; the rest report
/// [`TaskError::Unsupported`]. Output models are passed as `&mut` and the
/// task records status, format and optimization type on them.
pub trait Task: Send + Sync {
    fn train(&self, _dataset: &DatasetEntity, _output_model: &mut ModelEntity) -> Result<(), TaskError> {
        Err(TaskError::Unsupported("train"))
    }

    fn infer(
        &self,
        _dataset: &DatasetEntity,
        _params: &InferenceParameters,
    ) -> Result<DatasetEntity, TaskError> {
        Err(TaskError::Unsupported("infer"))
    }

    fn evaluate(&self, _result_set: &mut ResultSet) -> Result<(), TaskError> {
        Err(TaskError::Unsupported("evaluate"))
    }

    fn export(&self, _export_type: ExportType, _output_model: &mut ModelEntity) -> Result<(), TaskError> {
        Err(TaskError::Unsupported("export"))
    }

    fn optimize(
        &self,
        _kind: OptimizationKind,
        _dataset: &DatasetEntity,
        _output_model: &mut ModelEntity,
        _params: &OptimizationParameters,
    ) -> Result<(), TaskError> {
        Err(TaskError::Unsupported("optimize"))
    }
}

/// Builds a task for an environment.
pub type TaskFactory =
    Arc<dyn Fn(TaskEnvironment) -> Result<Arc<dyn Task>, TaskError> + Send + Sync>;

/// Registry mapping entry-point strings to task factories.
pub struct TaskRegistry {
    factories: DashMap<String, TaskFactory>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Register a factory under an entry-point string.
    pub fn register<F>(&self, entry_point: impl Into<String>, factory: F) -> Result<(), TaskError>
    where
        F: Fn(TaskEnvironment) -> Result<Arc<dyn Task>, TaskError> + Send + Sync + 'static,
    {
        let entry_point = entry_point.into();
        if self.factories.contains_key(&entry_point) {
            return Err(TaskError::AlreadyRegistered(entry_point));
        }
        self.factories.insert(entry_point, Arc::new(factory));
        Ok(())
    }

    pub fn contains(&self, entry_point: &str) -> bool {
        self.factories.contains_key(entry_point)
    }

    pub fn create(
        &self,
        entry_point: &str,
        environment: TaskEnvironment,
    ) -> Result<Arc<dyn Task>, TaskError> {
        // Clone the factory out so the map guard is not held while it runs.
        let factory = self
            .factories
            .get(entry_point)
            .map(|f| f.clone())
            .ok_or_else(|| TaskError::UnknownEntryPoint(entry_point.to_string()))?;
        tracing::debug!("Creating {} task", entry_point);
        factory(environment)
    }

    /// Create the task of the given kind declared by the environment's template.
    pub fn create_for(
        &self,
        kind: TaskKind,
        environment: TaskEnvironment,
    ) -> Result<Arc<dyn Task>, TaskError> {
        let entrypoints = &environment.model_template.entrypoints;
        let entry_point = match kind {
            TaskKind::Base => Some(entrypoints.base.clone()),
            TaskKind::Openvino => entrypoints.openvino.clone(),
            TaskKind::Compression => entrypoints.compression.clone(),
        }
        .ok_or(TaskError::NoEntryPoint(kind))?;
        self.create(&entry_point, environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Entrypoints, Hyperparameters, LabelSchema, LearningParameters, ModelTemplate};

    struct NoopTask;
    impl Task for NoopTask {}

    fn environment(compression: Option<&str>) -> TaskEnvironment {
        let template = ModelTemplate {
            model_template_id: "t".to_string(),
            name: "model".to_string(),
            task_type: None,
            hyper_parameters: Hyperparameters {
                learning_parameters: LearningParameters {
                    num_iters: 10,
                    batch_size: 2,
                    learning_rate: None,
                },
            },
            entrypoints: Entrypoints {
                base: "base.Task".to_string(),
                openvino: None,
                compression: compression.map(str::to_string),
            },
        };
        TaskEnvironment::new(
            template.hyper_parameters.clone(),
            LabelSchema::default(),
            Arc::new(template),
        )
    }

    #[test]
    fn test_register_and_create() {
        let registry = TaskRegistry::new();
        registry
            .register("base.Task", |_env| Ok(Arc::new(NoopTask) as Arc<dyn Task>))
            .unwrap();
        assert!(registry.contains("base.Task"));

        let task = registry.create_for(TaskKind::Base, environment(None)).unwrap();
        assert!(matches!(
            task.train(&DatasetEntity::default(), &mut ModelEntity::new(environment(None).get_model_configuration())),
            Err(TaskError::Unsupported("train"))
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = TaskRegistry::new();
        registry
            .register("base.Task", |_env| Ok(Arc::new(NoopTask) as Arc<dyn Task>))
            .unwrap();
        let err = registry
            .register("base.Task", |_env| Ok(Arc::new(NoopTask) as Arc<dyn Task>))
            .unwrap_err();
        assert!(matches!(err, TaskError::AlreadyRegistered(_)));
    }

    #[test]
    fn test_missing_entry_points() {
        let registry = TaskRegistry::new();
        let err = registry
            .create_for(TaskKind::Openvino, environment(None))
            .err()
            .unwrap();
        assert!(matches!(err, TaskError::NoEntryPoint(TaskKind::Openvino)));

        let err = registry
            .create_for(TaskKind::Compression, environment(Some("nncf.Task")))
            .err()
            .unwrap();
        assert!(matches!(err, TaskError::UnknownEntryPoint(ref e) if e == "nncf.Task"));
    }
}
