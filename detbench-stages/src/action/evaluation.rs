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

//! Evaluation actions. Each scores one model on the testing split.

use super::{run_evaluation, Action, ActionContext, Prior};
use crate::error::ActionResult;
use detbench_core::{Bundle, ResultStore, StageName, Task, TaskEnvironment, TaskKind};
use std::sync::Arc;

/// Scores the trained model with the training task.
#[derive(Debug, Default)]
pub struct TrainingEvaluationAction;

impl Action for TrainingEvaluationAction {
    fn name(&self) -> StageName {
        StageName::TrainingEvaluation
    }

    fn required_stages(&self) -> &[StageName] {
        &[StageName::Training]
    }

    fn execute(&self, ctx: &ActionContext, prior: &ResultStore) -> ActionResult<Bundle> {
        let prior = Prior::new(self.name(), prior);
        let dataset = prior.dataset(StageName::Training, "dataset")?;
        let task = prior.task(StageName::Training, "task")?;
        let model = prior.model(StageName::Training, "output_model")?;

        tracing::info!("Begin evaluation of trained model");
        let results = run_evaluation(ctx, self.name(), dataset, task, model)?;
        tracing::info!("End evaluation of trained model");
        Ok(results)
    }
}

/// Builds an OpenVINO task over an exported environment.
fn openvino_task(
    ctx: &ActionContext,
    environment: &TaskEnvironment,
) -> ActionResult<Arc<dyn Task>> {
    tracing::debug!("Create OpenVINO Task");
    Ok(ctx.tasks.create_for(TaskKind::Openvino, environment.clone())?)
}

/// Scores the exported model with an OpenVINO task.
#[derive(Debug, Default)]
pub struct ExportEvaluationAction;

impl Action for ExportEvaluationAction {
    fn name(&self) -> StageName {
        StageName::ExportEvaluation
    }

    fn required_stages(&self) -> &[StageName] {
        &[StageName::Training, StageName::Export]
    }

    fn execute(&self, ctx: &ActionContext, prior: &ResultStore) -> ActionResult<Bundle> {
        let prior = Prior::new(self.name(), prior);
        let dataset = prior.dataset(StageName::Training, "dataset")?;
        let environment = prior.environment(StageName::Export, "environment")?;
        let model = prior.model(StageName::Export, "exported_model")?;

        tracing::info!("Begin evaluation of exported model");
        let task = openvino_task(ctx, environment)?;
        let results = run_evaluation(ctx, self.name(), dataset, &task, model)?;
        tracing::info!("End evaluation of exported model");
        Ok(results)
    }
}

#[derive(Debug, Default)]
pub struct QuantizeEvaluationAction;

impl Action for QuantizeEvaluationAction {
    fn name(&self) -> StageName {
        StageName::QuantizeEvaluation
    }

    fn required_stages(&self) -> &[StageName] {
        &[StageName::Training, StageName::Quantize]
    }

    fn execute(&self, ctx: &ActionContext, prior: &ResultStore) -> ActionResult<Bundle> {
        let prior = Prior::new(self.name(), prior);
        let dataset = prior.dataset(StageName::Training, "dataset")?;
        let task = prior.task(StageName::Quantize, "quantization_task")?;
        let model = prior.model(StageName::Quantize, "quantized_model")?;

        tracing::info!("Begin evaluation of quantized model");
        let results = run_evaluation(ctx, self.name(), dataset, task, model)?;
        tracing::info!("End evaluation of quantized model");
        Ok(results)
    }
}

#[derive(Debug, Default)]
pub struct CompressEvaluationAction;

impl Action for CompressEvaluationAction {
    fn name(&self) -> StageName {
        StageName::CompressEvaluation
    }

    fn required_stages(&self) -> &[StageName] {
        &[StageName::Training, StageName::Compress]
    }

    fn execute(&self, ctx: &ActionContext, prior: &ResultStore) -> ActionResult<Bundle> {
        let prior = Prior::new(self.name(), prior);
        let dataset = prior.dataset(StageName::Training, "dataset")?;
        let task = prior.task(StageName::Compress, "compression_task")?;
        let model = prior.model(StageName::Compress, "compressed_model")?;

        tracing::info!("Begin evaluation of compressed model");
        let results = run_evaluation(ctx, self.name(), dataset, task, model)?;
        tracing::info!("End evaluation of compressed model");
        Ok(results)
    }
}

#[derive(Debug, Default)]
pub struct CompressExportEvaluationAction;

impl Action for CompressExportEvaluationAction {
    fn name(&self) -> StageName {
        StageName::CompressExportEvaluation
    }

    fn required_stages(&self) -> &[StageName] {
        &[StageName::Training, StageName::CompressExport]
    }

    fn execute(&self, ctx: &ActionContext, prior: &ResultStore) -> ActionResult<Bundle> {
        let prior = Prior::new(self.name(), prior);
        let dataset = prior.dataset(StageName::Training, "dataset")?;
        let environment = prior.environment(StageName::CompressExport, "environment")?;
        let model = prior.model(StageName::CompressExport, "exported_model")?;

        tracing::info!("Begin evaluation of compressed exported model");
        let task = openvino_task(ctx, environment)?;
        let results = run_evaluation(ctx, self.name(), dataset, &task, model)?;
        tracing::info!("End evaluation of compressed exported model");
        Ok(results)
    }
}
