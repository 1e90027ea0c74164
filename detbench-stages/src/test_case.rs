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

use crate::action::{
    Action, ActionContext, CompressAction, CompressEvaluationAction, CompressExportAction,
    CompressExportEvaluationAction, ExportAction, ExportEvaluationAction, QuantizeAction,
    QuantizeEvaluationAction, TrainingAction, TrainingEvaluationAction,
};
use crate::error::StageError;
use crate::stage::Stage;
use detbench_core::{
    Bundle, DatasetParameters, ParamOverride, ResultStore, StageName, UnknownStageName,
};
use detbench_evals::Validator;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// Stages each stage depends on.
pub fn dependencies(stage: StageName) -> &'static [StageName] {
    use StageName::*;
    match stage {
        Training => &[],
        TrainingEvaluation => &[Training],
        Export => &[Training],
        ExportEvaluation => &[Export],
        Quantize => &[Export],
        QuantizeEvaluation => &[Quantize, TrainingEvaluation],
        Compress => &[Training],
        CompressEvaluation => &[Compress, TrainingEvaluation],
        CompressExport => &[Compress],
        CompressExportEvaluation => &[CompressExport, CompressEvaluation],
    }
}

/// The ten stages of one (model, dataset, iterations, batch) combination
/// together with the results they share.
pub struct TestCase {
    stages: IndexMap<StageName, Arc<Stage>>,
    store: Mutex<ResultStore>,
    ctx: ActionContext,
}

impl TestCase {
    pub fn new(
        ctx: ActionContext,
        dataset: DatasetParameters,
        template_path: impl Into<PathBuf>,
        num_training_iters: ParamOverride,
        batch_size: ParamOverride,
    ) -> Self {
        let training = TrainingAction::new(dataset, template_path, num_training_iters, batch_size);
        Self::with_actions(ctx, move |stage| -> Box<dyn Action> {
            match stage {
                StageName::Training => Box::new(training.clone()),
                StageName::TrainingEvaluation => Box::new(TrainingEvaluationAction),
                StageName::Export => Box::new(ExportAction),
                StageName::ExportEvaluation => Box::new(ExportEvaluationAction),
                StageName::Quantize => Box::new(QuantizeAction),
                StageName::QuantizeEvaluation => Box::new(QuantizeEvaluationAction),
                StageName::Compress => Box::new(CompressAction),
                StageName::CompressEvaluation => Box::new(CompressEvaluationAction),
                StageName::CompressExport => Box::new(CompressExportAction),
                StageName::CompressExportEvaluation => Box::new(CompressExportEvaluationAction),
            }
        })
    }

    /// Build the stage graph over caller-supplied actions.
    ///
    /// `factory` is called once per stage, in [`StageName::ALL`] order, and must
    /// return an action with that name.
    pub fn with_actions(
        ctx: ActionContext,
        mut factory: impl FnMut(StageName) -> Box<dyn Action>,
    ) -> Self {
        let mut stages: IndexMap<StageName, Arc<Stage>> = IndexMap::new();
        for name in StageName::ALL {
            let action = factory(name);
            debug_assert_eq!(action.name(), name);

            // ALL is topologically ordered, so every dependency already exists.
            let depends = dependencies(name)
                .iter()
                .filter_map(|dep| stages.get(dep).cloned())
                .collect();
            stages.insert(name, Arc::new(Stage::new(action, depends)));
        }

        Self {
            stages,
            store: Mutex::new(ResultStore::new()),
            ctx,
        }
    }

    /// Run one stage (and, first, everything it depends on).
    pub fn run_stage(
        &self,
        stage: StageName,
        validator: Option<&Validator>,
    ) -> Result<Arc<Bundle>, StageError> {
        let Some(target) = self.stages.get(&stage) else {
            return Err(StageError::UnknownStage(UnknownStageName(stage.to_string())));
        };
        let mut store = self.store.lock();
        target.run_once(&self.ctx, &mut store, validator)
    }

    pub fn run_stage_by_name(
        &self,
        stage: &str,
        validator: Option<&Validator>,
    ) -> Result<Arc<Bundle>, StageError> {
        self.run_stage(stage.parse()?, validator)
    }

    pub fn stage(&self, name: StageName) -> Option<&Arc<Stage>> {
        self.stages.get(&name)
    }

    /// Names of the stages whose results are stored, in completion order.
    pub fn stored_stages(&self) -> Vec<String> {
        self.store.lock().keys().map(str::to_string).collect()
    }

    pub fn context(&self) -> &ActionContext {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MemoryCollector;
    use crate::error::{ActionError, ActionResult};
    use detbench_core::{CocoLoader, StageValue, TaskRegistry};
    use detbench_evals::{ExpectationLookup, ExpectedMetrics, ValidationError};
    use std::collections::HashMap;

    /// Records every execution and returns a fixed f-measure.
    struct StubAction {
        name: StageName,
        score: f64,
        log: Arc<Mutex<Vec<StageName>>>,
        fail: bool,
    }

    impl Action for StubAction {
        fn name(&self) -> StageName {
            self.name
        }

        fn required_stages(&self) -> &[StageName] {
            dependencies(self.name)
        }

        fn execute(&self, _ctx: &ActionContext, _prior: &ResultStore) -> ActionResult<Bundle> {
            self.log.lock().push(self.name);
            if self.fail {
                return Err(ActionError::ExportFailed {
                    action: self.name,
                    reason: "stub".to_string(),
                });
            }
            let mut accuracy = Bundle::new();
            accuracy.insert("f-measure".to_string(), StageValue::Float(self.score));
            accuracy.insert("recall".to_string(), StageValue::Float(self.score));
            let mut metrics = Bundle::new();
            metrics.insert("accuracy".to_string(), StageValue::Map(accuracy));
            let mut bundle = Bundle::new();
            bundle.insert("metrics".to_string(), StageValue::Map(metrics));
            Ok(bundle)
        }
    }

    fn ctx() -> ActionContext {
        ActionContext {
            loader: Arc::new(CocoLoader::new()),
            tasks: Arc::new(TaskRegistry::new()),
            collector: Arc::new(MemoryCollector::new()),
            compression_available: true,
        }
    }

    fn stub_case(
        scores: HashMap<StageName, f64>,
        failing: &[StageName],
    ) -> (TestCase, Arc<Mutex<Vec<StageName>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for_actions = log.clone();
        let failing = failing.to_vec();
        let case = TestCase::with_actions(ctx(), move |name| {
            Box::new(StubAction {
                name,
                score: scores.get(&name).copied().unwrap_or(0.5),
                log: log_for_actions.clone(),
                fail: failing.contains(&name),
            })
        });
        (case, log)
    }

    fn validator(test_id: &str, yaml: &str) -> Validator {
        let expected = Arc::new(ExpectedMetrics::from_yaml_str(yaml).unwrap());
        Validator::new(Some(ExpectationLookup::new(Some(expected), test_id)))
    }

    #[test]
    fn test_graph_shape() {
        let (case, _) = stub_case(HashMap::new(), &[]);
        let deps: Vec<_> = case
            .stage(StageName::CompressExportEvaluation)
            .unwrap()
            .depends()
            .collect();
        assert_eq!(
            deps,
            vec![StageName::CompressExport, StageName::CompressEvaluation]
        );
        assert_eq!(case.stages.len(), 10);
    }

    #[test]
    fn test_quantize_evaluation_runs_chain_once() {
        let (case, log) = stub_case(HashMap::from([(StageName::QuantizeEvaluation, 0.8)]), &[]);
        // training_evaluation runs here only as a dependency.
        let validator = validator(
            "q",
            "'q':\n  'metrics.accuracy.f-measure':\n    'base': 'training_evaluation.metrics.accuracy.f-measure'\n    'max_diff_if_less_threshold': 0.0\n",
        );

        case.run_stage(StageName::QuantizeEvaluation, Some(&validator))
            .unwrap();
        case.run_stage(StageName::QuantizeEvaluation, Some(&validator))
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                StageName::Training,
                StageName::Export,
                StageName::Quantize,
                StageName::TrainingEvaluation,
                StageName::QuantizeEvaluation,
            ]
        );
        assert_eq!(
            case.stored_stages(),
            vec![
                "training",
                "export",
                "quantize",
                "training_evaluation",
                "quantize_evaluation"
            ]
        );
    }

    #[test]
    fn test_dependencies_run_ungated() {
        let (case, _) = stub_case(
            HashMap::from([
                (StageName::QuantizeEvaluation, 0.8),
                (StageName::TrainingEvaluation, 0.5),
            ]),
            &[],
        );
        // training_evaluation scores far outside this range.
        let validator = validator(
            "q",
            "'q':\n  'metrics.accuracy.f-measure':\n    'target_value': 0.8\n    'max_diff': 0.05\n",
        );

        case.run_stage(StageName::QuantizeEvaluation, Some(&validator))
            .unwrap();

        let err = case
            .run_stage(StageName::TrainingEvaluation, Some(&validator))
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::Validation {
                stage: StageName::TrainingEvaluation,
                ..
            }
        ));
    }

    #[test]
    fn test_cached_stage_is_validated_when_requested() {
        let (case, log) = stub_case(HashMap::new(), &[]);
        case.run_stage(StageName::ExportEvaluation, None).unwrap();

        let strict = validator(
            "e",
            "'e':\n  'metrics.accuracy.f-measure':\n    'target_value': 0.9\n    'max_diff': 0.01\n",
        );
        let err = case
            .run_stage(StageName::ExportEvaluation, Some(&strict))
            .unwrap_err();
        assert!(matches!(err, StageError::Validation { stage: StageName::ExportEvaluation, .. }));
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn test_validation_failure_lists_all_metrics() {
        let (case, log) = stub_case(HashMap::from([(StageName::TrainingEvaluation, 0.1)]), &[]);
        let validator = validator(
            "t",
            "'t':\n  'metrics.accuracy.f-measure':\n    'target_value': 0.8\n    'max_diff': 0.05\n  'metrics.accuracy.recall':\n    'target_value': 0.8\n    'max_diff_if_less_threshold': 0.05\n",
        );

        let err = case
            .run_stage(StageName::TrainingEvaluation, Some(&validator))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("metrics.accuracy.f-measure"));
        assert!(message.contains("metrics.accuracy.recall"));
        match err {
            StageError::Validation {
                source: ValidationError::Failed { reasons },
                ..
            } => assert_eq!(reasons.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }

        // The result is kept and reused by dependents.
        case.run_stage(StageName::QuantizeEvaluation, None).unwrap();
        let runs = log
            .lock()
            .iter()
            .filter(|s| **s == StageName::TrainingEvaluation)
            .count();
        assert_eq!(runs, 1);
    }

    #[test]
    fn test_dependency_failure_keeps_siblings() {
        let (case, log) = stub_case(HashMap::new(), &[StageName::Export]);
        case.run_stage(StageName::TrainingEvaluation, None).unwrap();

        let first = case.run_stage(StageName::Quantize, None).unwrap_err();
        let second = case.run_stage(StageName::ExportEvaluation, None).unwrap_err();
        assert!(Arc::ptr_eq(
            first.action_error().unwrap(),
            second.action_error().unwrap()
        ));

        let exports = log.lock().iter().filter(|s| **s == StageName::Export).count();
        assert_eq!(exports, 1);
        assert!(!case.stage(StageName::Quantize).unwrap().is_processed());
        assert_eq!(case.stored_stages(), vec!["training", "training_evaluation"]);
    }

    #[test]
    fn test_unknown_stage_name() {
        let (case, _) = stub_case(HashMap::new(), &[]);
        let err = case.run_stage_by_name("pot", None).unwrap_err();
        assert!(matches!(err, StageError::UnknownStage(_)));
    }

    #[test]
    fn test_missing_dependency_is_checked_by_call() {
        let store = ResultStore::new();
        let err = ExportAction.call(&ctx(), &store).unwrap_err();
        assert!(matches!(
            err,
            ActionError::MissingDependency {
                action: StageName::Export,
                stage: StageName::Training
            }
        ));
    }
}
