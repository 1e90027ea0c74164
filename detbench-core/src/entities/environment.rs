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

//! Model templates and the task environment built from them.

use super::label::LabelSchema;
use super::model::{ModelConfiguration, ModelEntity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningParameters {
    pub num_iters: u32,
    pub batch_size: u32,
    #[serde(default)]
    pub learning_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub learning_parameters: LearningParameters,
}

/// Class paths of the task implementations a template can be run with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entrypoints {
    pub base: String,
    #[serde(default)]
    pub openvino: Option<String>,
    /// Absent when the model does not support compression.
    #[serde(default, alias = "nncf")]
    pub compression: Option<String>,
}

/// Parsed `template.yaml` of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTemplate {
    #[serde(default)]
    pub model_template_id: String,
    pub name: String,
    #[serde(default)]
    pub task_type: Option<String>,
    pub hyper_parameters: Hyperparameters,
    pub entrypoints: Entrypoints,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Cannot read model template {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse model template: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl ModelTemplate {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, TemplateError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Everything a task needs to be constructed.
///
/// Cloning an environment yields an independent copy; the model and template
/// are immutable once shared.
#[derive(Debug, Clone)]
pub struct TaskEnvironment {
    pub model: Option<Arc<ModelEntity>>,
    pub hyper_parameters: Hyperparameters,
    pub label_schema: LabelSchema,
    pub model_template: Arc<ModelTemplate>,
}

impl TaskEnvironment {
    pub fn new(
        hyper_parameters: Hyperparameters,
        label_schema: LabelSchema,
        model_template: Arc<ModelTemplate>,
    ) -> Self {
        Self {
            model: None,
            hyper_parameters,
            label_schema,
            model_template,
        }
    }

    pub fn get_model_configuration(&self) -> ModelConfiguration {
        ModelConfiguration {
            label_schema: self.label_schema.clone(),
            hyper_parameters: self.hyper_parameters.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"
model_template_id: Custom_Object_Detection_Gen3_ATSS
name: gen3_mobilenetV2_ATSS
task_type: DETECTION
hyper_parameters:
  learning_parameters:
    num_iters: 300
    batch_size: 8
    learning_rate: 0.008
entrypoints:
  base: detection.train_task.DetectionTrainingTask
  openvino: detection.openvino_task.OpenVINODetectionTask
  nncf: detection.nncf_task.DetectionNNCFTask
"#;

    #[test]
    fn test_parse_template() {
        let template = ModelTemplate::from_yaml_str(TEMPLATE).unwrap();
        assert_eq!(template.name, "gen3_mobilenetV2_ATSS");
        assert_eq!(template.hyper_parameters.learning_parameters.batch_size, 8);
        assert_eq!(
            template.entrypoints.compression.as_deref(),
            Some("detection.nncf_task.DetectionNNCFTask")
        );
    }

    #[test]
    fn test_compression_entrypoint_is_optional() {
        let yaml = TEMPLATE.replace("  nncf: detection.nncf_task.DetectionNNCFTask\n", "");
        let template = ModelTemplate::from_yaml_str(&yaml).unwrap();
        assert!(template.entrypoints.compression.is_none());
    }

    #[test]
    fn test_cloned_environment_is_independent() {
        let template = Arc::new(ModelTemplate::from_yaml_str(TEMPLATE).unwrap());
        let env = TaskEnvironment::new(
            template.hyper_parameters.clone(),
            LabelSchema::default(),
            template,
        );
        let mut copy = env.clone();
        copy.hyper_parameters.learning_parameters.num_iters = 1;
        copy.model = Some(Arc::new(ModelEntity::new(copy.get_model_configuration())));

        assert_eq!(env.hyper_parameters.learning_parameters.num_iters, 300);
        assert!(env.model.is_none());
    }
}
