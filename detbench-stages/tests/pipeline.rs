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

//! End-to-end stage runs over in-process fake tasks.

use detbench_core::{
    DatasetEntity, DatasetError, DatasetItem, DatasetLoader, DatasetParameters, ExportType,
    InferenceParameters, Label, ModelEntity, ModelFormat, ModelOptimizationType, ModelStatus,
    OptimizationKind, OptimizationParameters, ParamError, ParamOverride, Performance, ResultSet,
    ScoreMetric, StageName, Subset, Task, TaskError, TaskRegistry,
};
use detbench_evals::{ExpectationLookup, ExpectedMetrics, Validator};
use detbench_stages::{ActionContext, ActionError, MemoryCollector, StageError, TestCase};
use parking_lot::Mutex;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const TEMPLATE: &str = r#"
model_template_id: Fake_Detection
name: fake_detector
hyper_parameters:
  learning_parameters:
    num_iters: 300
    batch_size: 8
entrypoints:
  base: fake.BaseTask
  openvino: fake.OpenVINOTask
  nncf: fake.CompressionTask
"#;

/// One item per split, all labelled "car".
struct FakeLoader;

impl DatasetLoader for FakeLoader {
    fn load_items(
        &self,
        _annotation_path: &Path,
        images_dir: &Path,
        subset: Subset,
        labels: &mut Vec<Label>,
    ) -> Result<Vec<DatasetItem>, DatasetError> {
        if labels.is_empty() {
            labels.push(Label::new(0, "car"));
        }
        Ok(vec![DatasetItem {
            media: images_dir.join("0.jpg"),
            width: 64,
            height: 64,
            subset,
            annotations: Vec::new(),
        }])
    }
}

#[derive(Clone)]
struct Behaviour {
    train_succeeds: bool,
    base_score: f64,
    openvino_score: f64,
    compression_score: f64,
    seen_iters: Arc<Mutex<Vec<u32>>>,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            train_succeeds: true,
            base_score: 0.70,
            openvino_score: 0.68,
            compression_score: 0.69,
            seen_iters: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

fn score(result_set: &mut ResultSet, value: f64) {
    result_set.performance = Some(Performance::new(ScoreMetric::new("f-measure", value)));
}

struct FakeBaseTask(Behaviour);

impl Task for FakeBaseTask {
    fn train(&self, _dataset: &DatasetEntity, output_model: &mut ModelEntity) -> Result<(), TaskError> {
        if !self.0.train_succeeds {
            output_model.status = ModelStatus::Failed;
            return Ok(());
        }
        output_model.status = ModelStatus::Success;
        output_model.set_data("weights.pth", vec![1, 2, 3]);
        output_model.performance = Some(Performance::new(ScoreMetric::new(
            "f-measure",
            self.0.base_score,
        )));
        Ok(())
    }

    fn infer(&self, dataset: &DatasetEntity, params: &InferenceParameters) -> Result<DatasetEntity, TaskError> {
        assert!(params.is_evaluation);
        Ok(dataset.clone())
    }

    fn evaluate(&self, result_set: &mut ResultSet) -> Result<(), TaskError> {
        score(result_set, self.0.base_score);
        Ok(())
    }

    fn export(&self, _export_type: ExportType, output_model: &mut ModelEntity) -> Result<(), TaskError> {
        output_model.status = ModelStatus::Success;
        output_model.format = ModelFormat::Openvino;
        output_model.optimization_type = ModelOptimizationType::Mo;
        Ok(())
    }
}

struct FakeOpenvinoTask(Behaviour);

impl Task for FakeOpenvinoTask {
    fn infer(&self, dataset: &DatasetEntity, _params: &InferenceParameters) -> Result<DatasetEntity, TaskError> {
        Ok(dataset.clone())
    }

    fn evaluate(&self, result_set: &mut ResultSet) -> Result<(), TaskError> {
        score(result_set, self.0.openvino_score);
        Ok(())
    }

    fn optimize(
        &self,
        kind: OptimizationKind,
        dataset: &DatasetEntity,
        output_model: &mut ModelEntity,
        _params: &OptimizationParameters,
    ) -> Result<(), TaskError> {
        assert_eq!(kind, OptimizationKind::Pot);
        assert_eq!(dataset.count(Subset::Testing), 0);
        output_model.status = ModelStatus::Success;
        output_model.format = ModelFormat::Openvino;
        output_model.optimization_type = ModelOptimizationType::Pot;
        Ok(())
    }
}

struct FakeCompressionTask(Behaviour);

impl Task for FakeCompressionTask {
    fn infer(&self, dataset: &DatasetEntity, _params: &InferenceParameters) -> Result<DatasetEntity, TaskError> {
        Ok(dataset.clone())
    }

    fn evaluate(&self, result_set: &mut ResultSet) -> Result<(), TaskError> {
        score(result_set, self.0.compression_score);
        Ok(())
    }

    fn optimize(
        &self,
        kind: OptimizationKind,
        _dataset: &DatasetEntity,
        output_model: &mut ModelEntity,
        _params: &OptimizationParameters,
    ) -> Result<(), TaskError> {
        assert_eq!(kind, OptimizationKind::Nncf);
        assert!(output_model.get_data("weights.pth").is_some());
        output_model.status = ModelStatus::Success;
        output_model.format = ModelFormat::BaseFramework;
        output_model.optimization_type = ModelOptimizationType::Nncf;
        Ok(())
    }

    fn export(&self, _export_type: ExportType, output_model: &mut ModelEntity) -> Result<(), TaskError> {
        output_model.status = ModelStatus::Success;
        output_model.format = ModelFormat::Openvino;
        output_model.optimization_type = ModelOptimizationType::Nncf;
        Ok(())
    }
}

fn registry(behaviour: &Behaviour) -> TaskRegistry {
    let tasks = TaskRegistry::new();
    let b = behaviour.clone();
    tasks
        .register("fake.BaseTask", move |env| {
            b.seen_iters
                .lock()
                .push(env.hyper_parameters.learning_parameters.num_iters);
            Ok(Arc::new(FakeBaseTask(b.clone())) as Arc<dyn Task>)
        })
        .unwrap();
    let b = behaviour.clone();
    tasks
        .register("fake.OpenVINOTask", move |env| {
            assert!(env.model.is_some());
            Ok(Arc::new(FakeOpenvinoTask(b.clone())) as Arc<dyn Task>)
        })
        .unwrap();
    let b = behaviour.clone();
    tasks
        .register("fake.CompressionTask", move |env| {
            assert!(env.model.is_some());
            Ok(Arc::new(FakeCompressionTask(b.clone())) as Arc<dyn Task>)
        })
        .unwrap();
    tasks
}

struct Fixture {
    _dir: TempDir,
    case: TestCase,
    collector: Arc<MemoryCollector>,
    behaviour: Behaviour,
}

fn fixture_with(
    template: &str,
    behaviour: Behaviour,
    compression_available: bool,
    num_iters: ParamOverride,
) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("template.yaml");
    std::fs::write(&template_path, template).unwrap();

    let collector = Arc::new(MemoryCollector::new());
    let ctx = ActionContext {
        loader: Arc::new(FakeLoader),
        tasks: Arc::new(registry(&behaviour)),
        collector: collector.clone(),
        compression_available,
    };
    let root = dir.path();
    let dataset = DatasetParameters {
        annotations_train: root.join("train.json"),
        images_train_dir: root.join("train"),
        annotations_val: root.join("val.json"),
        images_val_dir: root.join("val"),
        annotations_test: root.join("test.json"),
        images_test_dir: root.join("test"),
    };
    let case = TestCase::new(ctx, dataset, template_path, num_iters, ParamOverride::Value(2));
    Fixture {
        _dir: dir,
        case,
        collector,
        behaviour,
    }
}

fn fixture() -> Fixture {
    fixture_with(TEMPLATE, Behaviour::default(), true, ParamOverride::Value(1))
}

fn validator(test_id: &str, yaml: &str) -> Validator {
    let expected = Arc::new(ExpectedMetrics::from_yaml_str(yaml).unwrap());
    Validator::new(Some(ExpectationLookup::new(Some(expected), test_id)))
}

/// The deepest stage pulls in its whole compression chain, and nothing else.
#[test]
fn test_compress_export_evaluation_runs_full_chain() {
    let f = fixture();
    let results = f
        .case
        .run_stage(StageName::CompressExportEvaluation, None)
        .unwrap();

    let accuracy = results["metrics"].as_bundle().unwrap()["accuracy"]
        .as_bundle()
        .unwrap();
    assert_eq!(accuracy["f-measure"].as_f64(), Some(0.68));

    assert_eq!(
        f.case.stored_stages(),
        vec![
            "training",
            "compress",
            "compress_export",
            "training_evaluation",
            "compress_evaluation",
            "compress_export_evaluation",
        ]
    );
    assert_eq!(
        f.collector.last("metric_name"),
        Some(json!("compress_export_evaluation/f-measure"))
    );
    assert_eq!(*f.behaviour.seen_iters.lock(), vec![1]);
}

/// Explicit iteration overrides reach the base task; KEEP_CONFIG keeps the template value.
#[test]
fn test_iteration_override() {
    let f = fixture_with(TEMPLATE, Behaviour::default(), true, ParamOverride::KeepConfig);
    f.case.run_stage(StageName::Training, None).unwrap();
    assert_eq!(*f.behaviour.seen_iters.lock(), vec![300]);
    assert_eq!(
        f.collector.last("metric_name"),
        Some(json!("training/f-measure"))
    );
}

/// A placeholder value must be resolved before the stage runs.
#[test]
fn test_unresolved_override_fails_training() {
    let f = fixture_with(TEMPLATE, Behaviour::default(), true, ParamOverride::UseDefault);
    let err = f.case.run_stage(StageName::Training, None).unwrap_err();
    let source = err.action_error().unwrap();
    assert!(matches!(
        source.as_ref(),
        ActionError::Param(ParamError::Unresolved("num_iters"))
    ));
}

/// Quantized quality is compared against the training evaluation of the same case.
#[test]
fn test_quantize_evaluation_against_base() {
    let yaml = "\
'ACTION-quantize_evaluation,model-fake_detector,dataset-d,num_iters-KEEP_CONFIG_FIELD_VALUE,batch-KEEP_CONFIG_FIELD_VALUE,usecase-reallife':
  'metrics.accuracy.f-measure':
    'base': 'training_evaluation.metrics.accuracy.f-measure'
    'max_diff_if_less_threshold': 0.05
";
    let id = "ACTION-quantize_evaluation,model-fake_detector,dataset-d,num_iters-KEEP_CONFIG_FIELD_VALUE,batch-KEEP_CONFIG_FIELD_VALUE,usecase-reallife";
    let f = fixture();
    f.case
        .run_stage(StageName::QuantizeEvaluation, Some(&validator(id, yaml)))
        .unwrap();
    assert!(f.case.stored_stages().contains(&"training_evaluation".to_string()));

    let strict = yaml.replace("0.05", "0.01");
    let err = f
        .case
        .run_stage(StageName::QuantizeEvaluation, Some(&validator(id, &strict)))
        .unwrap_err();
    assert!(matches!(err, StageError::Validation { stage: StageName::QuantizeEvaluation, .. }));
    assert!(err.to_string().contains("is NOT greater or equal the target value"));
}

/// Templates without a compression entry skip every compression stage.
#[test]
fn test_compress_skipped_without_entry_point() {
    let template = TEMPLATE.replace("  nncf: fake.CompressionTask\n", "");
    let f = fixture_with(&template, Behaviour::default(), true, ParamOverride::Value(1));

    let err = f.case.run_stage(StageName::CompressEvaluation, None).unwrap_err();
    assert!(err.is_skip());
    let err = f
        .case
        .run_stage(StageName::CompressExportEvaluation, None)
        .unwrap_err();
    assert!(err.is_skip());
    assert!(err.to_string().contains("Compression is not enabled"));

    // Non-compression stages are unaffected.
    f.case.run_stage(StageName::ExportEvaluation, None).unwrap();
}

/// A missing compression backend is a skip, not a failure.
#[test]
fn test_compress_skipped_without_backend() {
    let f = fixture_with(TEMPLATE, Behaviour::default(), false, ParamOverride::Value(1));
    let err = f.case.run_stage(StageName::Compress, None).unwrap_err();
    assert!(matches!(err, StageError::Skipped { stage: StageName::Compress, .. }));
}

/// A training failure is reported once and replayed to every dependent.
#[test]
fn test_training_failure_propagates() {
    let behaviour = Behaviour {
        train_succeeds: false,
        ..Behaviour::default()
    };
    let f = fixture_with(TEMPLATE, behaviour, true, ParamOverride::Value(1));

    let export = f.case.run_stage(StageName::Export, None).unwrap_err();
    let evaluation = f
        .case
        .run_stage(StageName::TrainingEvaluation, None)
        .unwrap_err();

    let first = export.action_error().unwrap();
    let second = evaluation.action_error().unwrap();
    assert!(Arc::ptr_eq(first, second));
    assert!(matches!(first.as_ref(), ActionError::TrainingFailed(_)));
    assert_eq!(f.behaviour.seen_iters.lock().len(), 1);
    assert!(f.case.stored_stages().is_empty());
}
