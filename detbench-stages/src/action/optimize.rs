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

//! Quantization (POT) and compression (NNCF) actions.

use super::{Action, ActionContext, Prior};
use crate::error::{ActionError, ActionResult};
use detbench_core::{
    Bundle, ModelEntity, ModelFormat, ModelOptimizationType, ModelStatus, OptimizationKind,
    OptimizationParameters, ResultStore, StageName, StageValue, Subset, TaskKind,
};
use std::sync::Arc;

const WEIGHTS_KEY: &str = "weights.pth";

/// `Err(reason)` unless the model has the expected status, format and type.
fn check_optimized(
    model: &ModelEntity,
    format: ModelFormat,
    optimization: ModelOptimizationType,
) -> Result<(), String> {
    if model.status != ModelStatus::Success {
        return Err(format!("model status is {:?}", model.status));
    }
    if model.format != format {
        return Err(format!("wrong model format {:?}", model.format));
    }
    if model.optimization_type != optimization {
        return Err(format!("wrong optimization type {:?}", model.optimization_type));
    }
    Ok(())
}

/// Post-training quantization of the exported model on the training split.
#[derive(Debug, Default)]
pub struct QuantizeAction;

impl Action for QuantizeAction {
    fn name(&self) -> StageName {
        StageName::Quantize
    }

    fn required_stages(&self) -> &[StageName] {
        &[StageName::Training, StageName::Export]
    }

    fn execute(&self, ctx: &ActionContext, prior: &ResultStore) -> ActionResult<Bundle> {
        let prior = Prior::new(self.name(), prior);
        let dataset = prior.dataset(StageName::Training, "dataset")?;
        let environment = prior.environment(StageName::Export, "environment")?;

        tracing::debug!("Creating environment and task for POT optimization");
        let environment = environment.as_ref().clone();
        let task = ctx.tasks.create_for(TaskKind::Openvino, environment.clone())?;

        let mut quantized = ModelEntity::new(environment.get_model_configuration());
        tracing::info!("Run POT optimization");
        task.optimize(
            OptimizationKind::Pot,
            &dataset.get_subset(Subset::Training),
            &mut quantized,
            &OptimizationParameters::default(),
        )?;
        check_optimized(&quantized, ModelFormat::Openvino, ModelOptimizationType::Pot)
            .map_err(ActionError::QuantizeFailed)?;
        tracing::info!("POT optimization is finished");

        let mut results = Bundle::new();
        results.insert("quantization_task".to_string(), StageValue::Task(task));
        results.insert(
            "quantized_model".to_string(),
            StageValue::Model(Arc::new(quantized)),
        );
        Ok(results)
    }
}

/// Compression-aware fine-tuning starting from the trained weights.
///
/// Skipped when the template declares no compression entry point or the
/// compression backend is not installed.
#[derive(Debug, Default)]
pub struct CompressAction;

impl Action for CompressAction {
    fn name(&self) -> StageName {
        StageName::Compress
    }

    fn required_stages(&self) -> &[StageName] {
        &[StageName::Training]
    }

    fn execute(&self, ctx: &ActionContext, prior: &ResultStore) -> ActionResult<Bundle> {
        let prior = Prior::new(self.name(), prior);
        let template = prior.template(StageName::Training, "model_template")?;
        let dataset = prior.dataset(StageName::Training, "dataset")?;
        let trained = prior.model(StageName::Training, "output_model")?;
        let environment = prior.environment(StageName::Training, "environment")?;

        if template.entrypoints.compression.is_none() {
            return Err(ActionError::Skipped(
                "Compression is not enabled for this template".to_string(),
            ));
        }
        if !ctx.compression_available {
            return Err(ActionError::Skipped(
                "Compression backend is not installed".to_string(),
            ));
        }

        tracing::info!("Creating compression task and structures");
        let mut environment = environment.as_ref().clone();
        let mut compressed = ModelEntity::new(environment.get_model_configuration());
        let weights = trained.get_data(WEIGHTS_KEY).ok_or_else(|| {
            ActionError::CompressFailed(format!("trained model carries no {}", WEIGHTS_KEY))
        })?;
        compressed.set_data(WEIGHTS_KEY, weights.to_vec());
        environment.model = Some(Arc::new(compressed.clone()));

        let task = ctx
            .tasks
            .create_for(TaskKind::Compression, environment.clone())?;

        tracing::info!("Run compression");
        task.optimize(
            OptimizationKind::Nncf,
            dataset,
            &mut compressed,
            &OptimizationParameters::default(),
        )?;
        check_optimized(
            &compressed,
            ModelFormat::BaseFramework,
            ModelOptimizationType::Nncf,
        )
        .map_err(ActionError::CompressFailed)?;
        tracing::info!("Compression is finished");

        let compressed = Arc::new(compressed);
        environment.model = Some(compressed.clone());

        let mut results = Bundle::new();
        results.insert("compression_task".to_string(), StageValue::Task(task));
        results.insert(
            "compressed_model".to_string(),
            StageValue::Model(compressed),
        );
        results.insert(
            "compression_environment".to_string(),
            StageValue::Environment(Arc::new(environment)),
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detbench_core::{
        Hyperparameters, LabelSchema, LearningParameters, ModelConfiguration,
    };

    fn model() -> ModelEntity {
        ModelEntity::new(ModelConfiguration {
            label_schema: LabelSchema::default(),
            hyper_parameters: Hyperparameters {
                learning_parameters: LearningParameters {
                    num_iters: 1,
                    batch_size: 2,
                    learning_rate: None,
                },
            },
        })
    }

    #[test]
    fn test_check_optimized() {
        let mut m = model();
        assert!(check_optimized(&m, ModelFormat::Openvino, ModelOptimizationType::Pot)
            .unwrap_err()
            .contains("status"));

        m.status = ModelStatus::Success;
        m.format = ModelFormat::Openvino;
        m.optimization_type = ModelOptimizationType::Pot;
        assert!(check_optimized(&m, ModelFormat::Openvino, ModelOptimizationType::Pot).is_ok());
        assert!(check_optimized(&m, ModelFormat::BaseFramework, ModelOptimizationType::Pot)
            .unwrap_err()
            .contains("format"));
        assert!(check_optimized(&m, ModelFormat::Openvino, ModelOptimizationType::Nncf)
            .unwrap_err()
            .contains("optimization type"));
    }
}
