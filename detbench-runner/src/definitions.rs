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

//! Where datasets and model templates live on disk.

use crate::error::{HarnessError, HarnessResult};
use detbench_core::DatasetParameters;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DATASET_FIELDS: [&str; 6] = [
    "annotations_train",
    "images_train_dir",
    "annotations_val",
    "images_val_dir",
    "annotations_test",
    "images_test_dir",
];

/// Dataset name → split locations, read from a YAML file.
///
/// Relative paths are resolved against the directory of that file.
#[derive(Debug, Clone, Default)]
pub struct DatasetDefinitions {
    root: PathBuf,
    datasets: IndexMap<String, IndexMap<String, serde_yaml::Value>>,
}

impl DatasetDefinitions {
    pub fn from_file(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_yaml_str(&content, root).map_err(|source| HarnessError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(yaml: &str, root: impl Into<PathBuf>) -> Result<Self, serde_yaml::Error> {
        Ok(Self {
            root: root.into(),
            datasets: serde_yaml::from_str(yaml)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    /// Absolute split locations of `dataset`. Other keys of the definition are ignored.
    pub fn dataset_params(&self, dataset: &str) -> HarnessResult<DatasetParameters> {
        let definition = self
            .datasets
            .get(dataset)
            .ok_or_else(|| HarnessError::UnknownDataset(dataset.to_string()))?;

        let mut missing = Vec::new();
        let mut paths = Vec::with_capacity(DATASET_FIELDS.len());
        for field in DATASET_FIELDS {
            match definition.get(field).and_then(serde_yaml::Value::as_str) {
                Some(value) if !value.is_empty() => paths.push(self.root.join(value)),
                _ => missing.push(field),
            }
        }
        if !missing.is_empty() {
            return Err(HarnessError::IncompleteDataset {
                dataset: dataset.to_string(),
                missing,
            });
        }

        let mut paths = paths.into_iter();
        let mut next = || paths.next().unwrap_or_default();
        Ok(DatasetParameters {
            annotations_train: next(),
            images_train_dir: next(),
            annotations_val: next(),
            images_val_dir: next(),
            annotations_test: next(),
            images_test_dir: next(),
        })
    }
}

/// Model name → template path, found by searching a directory tree.
#[derive(Debug, Clone, Default)]
pub struct TemplateIndex {
    templates: BTreeMap<String, PathBuf>,
}

fn is_template_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("template") && n.ends_with(".yaml"))
        .unwrap_or(false)
}

impl TemplateIndex {
    /// Index every `template*.yaml` under `root`; the model name is the
    /// name of the directory holding the file.
    pub fn discover(root: impl AsRef<Path>) -> HarnessResult<Self> {
        let root = root.as_ref();
        let mut templates: BTreeMap<String, PathBuf> = BTreeMap::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_template_file(path) {
                continue;
            }
            let Some(name) = path
                .parent()
                .and_then(Path::file_name)
                .and_then(|n| n.to_str())
            else {
                continue;
            };
            if let Some(first) = templates.get(name) {
                return Err(HarnessError::DuplicateTemplate {
                    first: first.clone(),
                    second: path.to_path_buf(),
                });
            }
            tracing::debug!("Found template for {}: {:?}", name, path);
            templates.insert(name.to_string(), path.to_path_buf());
        }

        tracing::info!("Discovered {} templates under {:?}", templates.len(), root);
        Ok(Self { templates })
    }

    pub fn get(&self, model_name: &str) -> HarnessResult<&Path> {
        self.templates
            .get(model_name)
            .map(PathBuf::as_path)
            .ok_or_else(|| HarnessError::UnknownModel(model_name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.templates
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
