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

//! Stage actions
//!
//! An [`Action`] reads the results of the stages it depends on from the
//! [`ResultStore`] and produces a new result [`Bundle`]. Result keys per stage:
//!
//! | stage | keys |
//! |---|---|
//! | `training` | `model_template`, `task`, `dataset`, `environment`, `output_model` |
//! | `*_evaluation` | `metrics.accuracy.<score name>` |
//! | `export`, `compress_export` | `environment`, `exported_model` |
//! | `quantize` | `quantization_task`, `quantized_model` |
//! | `compress` | `compression_task`, `compressed_model`, `compression_environment` |

mod evaluation;
mod export;
mod optimize;
mod training;

pub use evaluation::{
    CompressEvaluationAction, CompressExportEvaluationAction, ExportEvaluationAction,
    QuantizeEvaluationAction, TrainingEvaluationAction,
};
pub use export::{CompressExportAction, ExportAction};
pub use optimize::{CompressAction, QuantizeAction};
pub use training::TrainingAction;

use crate::collector::MetricsCollector;
use crate::error::{ActionError, ActionResult};
use detbench_core::{
    Bundle, BundleExt, DatasetEntity, DatasetLoader, ExportType, InferenceParameters,
    ModelEntity, ModelFormat, ModelOptimizationType, ModelStatus, ModelTemplate, ResultSet,
    ResultStore, StageName, StageValue, Subset, Task, TaskEnvironment, TaskRegistry,
};
use serde_json::json;
use std::sync::Arc;

/// Collaborators shared by all actions of a test case.
#[derive(Clone)]
pub struct ActionContext {
    pub loader: Arc<dyn DatasetLoader>,
    pub tasks: Arc<TaskRegistry>,
    pub collector: Arc<dyn MetricsCollector>,
    /// Whether the compression backend is installed.
    pub compression_available: bool,
}

/// One unit of work of the stage graph.
pub trait Action: Send + Sync {
    fn name(&self) -> StageName;

    /// Only evaluation stages are checked against expected metrics.
    fn requires_validation(&self) -> bool {
        self.name().is_evaluation()
    }

    /// Stages whose results must be present before the action runs.
    fn required_stages(&self) -> &[StageName];

    fn execute(&self, ctx: &ActionContext, prior: &ResultStore) -> ActionResult<Bundle>;

    /// Check required stages, then execute.
    fn call(&self, ctx: &ActionContext, prior: &ResultStore) -> ActionResult<Bundle> {
        for stage in self.required_stages() {
            if !prior.contains(stage.as_str()) {
                return Err(ActionError::MissingDependency {
                    action: self.name(),
                    stage: *stage,
                });
            }
        }
        self.execute(ctx, prior)
    }
}

/// Typed access to the results of earlier stages on behalf of one action.
pub(crate) struct Prior<'a> {
    action: StageName,
    store: &'a ResultStore,
}

impl<'a> Prior<'a> {
    pub(crate) fn new(action: StageName, store: &'a ResultStore) -> Self {
        Self { action, store }
    }

    fn bundle(&self, stage: StageName) -> ActionResult<&'a Bundle> {
        self.store
            .get(stage.as_str())
            .map(|b| &**b)
            .ok_or(ActionError::MissingDependency {
                action: self.action,
                stage,
            })
    }

    fn lookup<T: ?Sized>(
        &self,
        stage: StageName,
        key: &'static str,
        kind: &'static str,
        get: impl FnOnce(&'a Bundle) -> Option<&'a Arc<T>>,
    ) -> ActionResult<&'a Arc<T>> {
        get(self.bundle(stage)?).ok_or(ActionError::MissingEntity {
            action: self.action,
            stage,
            key,
            kind,
        })
    }

    pub(crate) fn dataset(&self, stage: StageName, key: &'static str) -> ActionResult<&'a Arc<DatasetEntity>> {
        self.lookup(stage, key, "dataset", |b| b.dataset(key))
    }

    pub(crate) fn model(&self, stage: StageName, key: &'static str) -> ActionResult<&'a Arc<ModelEntity>> {
        self.lookup(stage, key, "model", |b| b.model(key))
    }

    pub(crate) fn task(&self, stage: StageName, key: &'static str) -> ActionResult<&'a Arc<dyn Task>> {
        self.lookup(stage, key, "task", |b| b.task(key))
    }

    pub(crate) fn environment(
        &self,
        stage: StageName,
        key: &'static str,
    ) -> ActionResult<&'a Arc<TaskEnvironment>> {
        self.lookup(stage, key, "environment", |b| b.environment(key))
    }

    pub(crate) fn template(&self, stage: StageName, key: &'static str) -> ActionResult<&'a Arc<ModelTemplate>> {
        self.lookup(stage, key, "model_template", |b| b.template(key))
    }
}

/// Report `<stage>/<score name>` and its value to the collector.
pub(crate) fn log_score(ctx: &ActionContext, stage: StageName, name: &str, value: f64) {
    ctx.collector
        .log_final_metric("metric_name", json!(format!("{}/{}", stage, name)));
    ctx.collector.log_final_metric("metric_value", json!(value));
}

/// Infer on the testing split of `dataset` and score the predictions.
///
/// Returns `{metrics: {accuracy: {<score name>: <value>}}}`.
pub(crate) fn run_evaluation(
    ctx: &ActionContext,
    stage: StageName,
    dataset: &DatasetEntity,
    task: &Arc<dyn Task>,
    model: &Arc<ModelEntity>,
) -> ActionResult<Bundle> {
    let testing = dataset.get_subset(Subset::Testing);

    tracing::debug!("Evaluation: Get predictions on the dataset");
    let predicted = task.infer(
        &testing.with_empty_annotations(),
        &InferenceParameters { is_evaluation: true },
    )?;
    let mut result_set = ResultSet::new(model.clone(), testing, predicted);

    tracing::debug!("Evaluation: Estimate quality on dataset");
    task.evaluate(&mut result_set)?;
    let score = result_set
        .performance
        .map(|p| p.score)
        .filter(|s| !s.name.is_empty())
        .ok_or(ActionError::MissingPerformance(stage))?;
    tracing::info!("Evaluation: {}: {}", score.name, score.value);

    log_score(ctx, stage, &score.name, score.value);

    let mut accuracy = Bundle::new();
    accuracy.insert(score.name, StageValue::Float(score.value));
    let mut metrics = Bundle::new();
    metrics.insert("accuracy".to_string(), StageValue::Map(accuracy));
    let mut results = Bundle::new();
    results.insert("metrics".to_string(), StageValue::Map(metrics));
    Ok(results)
}

/// Export `task`'s model to OpenVINO and check the produced artifact.
///
/// Returns a copy of `environment` carrying the exported model.
pub(crate) fn run_export(
    stage: StageName,
    environment: &TaskEnvironment,
    task: &Arc<dyn Task>,
    expected_optimization: ModelOptimizationType,
) -> ActionResult<(TaskEnvironment, Arc<ModelEntity>)> {
    tracing::debug!("For action \"{}\": Copy environment for export", stage);
    let mut environment = environment.clone();

    let mut exported = ModelEntity::new(environment.get_model_configuration());
    tracing::debug!("For action \"{}\": Run export", stage);
    task.export(ExportType::Openvino, &mut exported)?;

    let failure = |reason: String| ActionError::ExportFailed {
        action: stage,
        reason,
    };
    if exported.status != ModelStatus::Success {
        return Err(failure("Export to OpenVINO was not successful".to_string()));
    }
    if exported.format != ModelFormat::Openvino {
        return Err(failure(format!(
            "Wrong model format after export: {:?}",
            exported.format
        )));
    }
    if exported.optimization_type != expected_optimization {
        return Err(failure(format!(
            "Wrong optimization type: expected {:?}, got {:?}",
            expected_optimization, exported.optimization_type
        )));
    }

    let exported = Arc::new(exported);
    environment.model = Some(exported.clone());
    Ok((environment, exported))
}
