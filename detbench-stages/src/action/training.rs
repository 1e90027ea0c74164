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

use super::{log_score, Action, ActionContext};
use crate::error::{ActionError, ActionResult};
use detbench_core::{
    Bundle, DatasetEntity, DatasetParameters, LabelSchema, ModelEntity, ModelStatus,
    ModelTemplate, ParamError, ParamOverride, ResultStore, StageName, StageValue, Subset,
    TaskEnvironment, TaskKind,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Loads the dataset, applies parameter overrides to the template and trains
/// the base task.
#[derive(Debug, Clone)]
pub struct TrainingAction {
    dataset: DatasetParameters,
    template_path: PathBuf,
    num_training_iters: ParamOverride,
    batch_size: ParamOverride,
}

impl TrainingAction {
    pub fn new(
        dataset: DatasetParameters,
        template_path: impl Into<PathBuf>,
        num_training_iters: ParamOverride,
        batch_size: ParamOverride,
    ) -> Self {
        Self {
            dataset,
            template_path: template_path.into(),
            num_training_iters,
            batch_size,
        }
    }

    fn load_dataset(&self, ctx: &ActionContext) -> ActionResult<(DatasetEntity, LabelSchema)> {
        let mut labels = Vec::new();
        let mut items = Vec::new();
        for (annotations, images, subset) in self.dataset.splits() {
            tracing::debug!("Using for {:?} annotation file {:?}", subset, annotations);
            items.extend(ctx.loader.load_items(annotations, images, subset, &mut labels)?);
        }
        let dataset = DatasetEntity::new(items);
        tracing::info!(
            "train dataset: {} items, validation dataset: {} items",
            dataset.count(Subset::Training),
            dataset.count(Subset::Validation)
        );
        Ok((dataset, LabelSchema::from_labels(labels)))
    }
}

fn apply_override(field: &'static str, value: ParamOverride, target: &mut u32) -> ActionResult<()> {
    match value {
        ParamOverride::Value(v) => {
            *target = v;
            tracing::debug!("Set params.learning_parameters.{}={}", field, v);
        }
        ParamOverride::KeepConfig => {
            tracing::debug!("Keep params.learning_parameters.{}={}", field, target);
        }
        ParamOverride::UseDefault => return Err(ParamError::Unresolved(field).into()),
    }
    Ok(())
}

impl Action for TrainingAction {
    fn name(&self) -> StageName {
        StageName::Training
    }

    fn required_stages(&self) -> &[StageName] {
        &[]
    }

    fn execute(&self, ctx: &ActionContext, _prior: &ResultStore) -> ActionResult<Bundle> {
        tracing::debug!("template_path = {:?}", self.template_path);
        let (dataset, label_schema) = self.load_dataset(ctx)?;

        tracing::debug!("Load model template");
        let template = Arc::new(ModelTemplate::from_file(&self.template_path)?);

        let mut hyper_parameters = template.hyper_parameters.clone();
        let learning = &mut hyper_parameters.learning_parameters;
        apply_override("num_iters", self.num_training_iters, &mut learning.num_iters)?;
        apply_override("batch_size", self.batch_size, &mut learning.batch_size)?;

        let environment = TaskEnvironment::new(hyper_parameters, label_schema, template.clone());
        tracing::info!("Create base Task");
        let task = ctx.tasks.create_for(TaskKind::Base, environment.clone())?;

        tracing::debug!("Train model");
        let mut output_model = ModelEntity::new(environment.get_model_configuration());
        task.train(&dataset, &mut output_model)?;
        if output_model.status != ModelStatus::Success {
            return Err(ActionError::TrainingFailed(format!(
                "model status is {:?}",
                output_model.status
            )));
        }

        if let Some(performance) = &output_model.performance {
            tracing::info!("performance={:?}", performance);
            log_score(ctx, self.name(), &performance.score.name, performance.score.value);
        }

        let mut results = Bundle::new();
        results.insert("model_template".to_string(), StageValue::Template(template));
        results.insert("task".to_string(), StageValue::Task(task));
        results.insert("dataset".to_string(), StageValue::Dataset(Arc::new(dataset)));
        results.insert(
            "environment".to_string(),
            StageValue::Environment(Arc::new(environment)),
        );
        results.insert(
            "output_model".to_string(),
            StageValue::Model(Arc::new(output_model)),
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_override() {
        let mut iters = 300;
        apply_override("num_iters", ParamOverride::KeepConfig, &mut iters).unwrap();
        assert_eq!(iters, 300);
        apply_override("num_iters", ParamOverride::Value(1), &mut iters).unwrap();
        assert_eq!(iters, 1);

        let err = apply_override("batch_size", ParamOverride::UseDefault, &mut iters).unwrap_err();
        assert!(matches!(err, ActionError::Param(ParamError::Unresolved("batch_size"))));
    }
}
