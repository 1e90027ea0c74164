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

use super::{run_export, Action, ActionContext, Prior};
use crate::error::ActionResult;
use detbench_core::{
    Bundle, ModelEntity, ModelOptimizationType, ResultStore, StageName, StageValue, TaskEnvironment,
};
use std::sync::Arc;

fn export_results(
    environment: TaskEnvironment,
    exported: Arc<ModelEntity>,
) -> Bundle {
    let mut results = Bundle::new();
    results.insert(
        "environment".to_string(),
        StageValue::Environment(Arc::new(environment)),
    );
    results.insert("exported_model".to_string(), StageValue::Model(exported));
    results
}

/// Exports the trained model to OpenVINO.
#[derive(Debug, Default)]
pub struct ExportAction;

impl Action for ExportAction {
    fn name(&self) -> StageName {
        StageName::Export
    }

    fn required_stages(&self) -> &[StageName] {
        &[StageName::Training]
    }

    fn execute(&self, _ctx: &ActionContext, prior: &ResultStore) -> ActionResult<Bundle> {
        let prior = Prior::new(self.name(), prior);
        let environment = prior.environment(StageName::Training, "environment")?;
        let task = prior.task(StageName::Training, "task")?;

        let (environment, exported) =
            run_export(self.name(), environment, task, ModelOptimizationType::Mo)?;
        Ok(export_results(environment, exported))
    }
}

/// Exports the compressed model to OpenVINO.
#[derive(Debug, Default)]
pub struct CompressExportAction;

impl Action for CompressExportAction {
    fn name(&self) -> StageName {
        StageName::CompressExport
    }

    fn required_stages(&self) -> &[StageName] {
        &[StageName::Training, StageName::Compress]
    }

    fn execute(&self, _ctx: &ActionContext, prior: &ResultStore) -> ActionResult<Bundle> {
        let prior = Prior::new(self.name(), prior);
        let environment = prior.environment(StageName::Compress, "compression_environment")?;
        let task = prior.task(StageName::Compress, "compression_task")?;

        tracing::info!("Begin export of compressed model");
        let (environment, exported) =
            run_export(self.name(), environment, task, ModelOptimizationType::Nncf)?;
        tracing::info!("End export of compressed model");
        Ok(export_results(environment, exported))
    }
}
