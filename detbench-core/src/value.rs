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

//! Stage result values and the per-test-case result store.
//!
//! A stage produces a [`Bundle`]: an insertion-ordered mapping whose values
//! are either plain numbers/text, nested bundles, or shared handles to the
//! entities the next stages need (datasets, models, tasks, environments).

use crate::address::{self, AddressError, Node};
use crate::entities::{DatasetEntity, ModelEntity, ModelTemplate, TaskEnvironment};
use crate::task::Task;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result bundle of one stage.
pub type Bundle = IndexMap<String, StageValue>;

/// A value stored inside a stage result bundle.
#[derive(Clone)]
pub enum StageValue {
    Float(f64),
    Int(i64),
    Text(String),
    Map(Bundle),
    Dataset(Arc<DatasetEntity>),
    Model(Arc<ModelEntity>),
    Task(Arc<dyn Task>),
    Environment(Arc<TaskEnvironment>),
    Template(Arc<ModelTemplate>),
}

impl StageValue {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            StageValue::Float(_) => "float",
            StageValue::Int(_) => "int",
            StageValue::Text(_) => "text",
            StageValue::Map(_) => "map",
            StageValue::Dataset(_) => "dataset",
            StageValue::Model(_) => "model",
            StageValue::Task(_) => "task",
            StageValue::Environment(_) => "environment",
            StageValue::Template(_) => "model_template",
        }
    }

    /// Numeric view of the value; text is accepted when it parses as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StageValue::Float(v) => Some(*v),
            StageValue::Int(v) => Some(*v as f64),
            StageValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bundle(&self) -> Option<&Bundle> {
        match self {
            StageValue::Map(bundle) => Some(bundle),
            _ => None,
        }
    }
}

impl fmt::Debug for StageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageValue::Float(v) => write!(f, "{v}"),
            StageValue::Int(v) => write!(f, "{v}"),
            StageValue::Text(s) => write!(f, "{s:?}"),
            StageValue::Map(bundle) => f.debug_map().entries(bundle.iter()).finish(),
            StageValue::Dataset(d) => write!(f, "<dataset: {} items>", d.len()),
            StageValue::Model(m) => write!(f, "<model: {:?}/{:?}>", m.status, m.format),
            StageValue::Task(_) => f.write_str("<task>"),
            StageValue::Environment(_) => f.write_str("<environment>"),
            StageValue::Template(t) => write!(f, "<model_template: {}>", t.name),
        }
    }
}

impl From<f64> for StageValue {
    fn from(v: f64) -> Self {
        StageValue::Float(v)
    }
}

impl From<i64> for StageValue {
    fn from(v: i64) -> Self {
        StageValue::Int(v)
    }
}

impl From<String> for StageValue {
    fn from(v: String) -> Self {
        StageValue::Text(v)
    }
}

impl From<&str> for StageValue {
    fn from(v: &str) -> Self {
        StageValue::Text(v.to_string())
    }
}

impl From<Bundle> for StageValue {
    fn from(v: Bundle) -> Self {
        StageValue::Map(v)
    }
}

impl From<Arc<DatasetEntity>> for StageValue {
    fn from(v: Arc<DatasetEntity>) -> Self {
        StageValue::Dataset(v)
    }
}

impl From<Arc<ModelEntity>> for StageValue {
    fn from(v: Arc<ModelEntity>) -> Self {
        StageValue::Model(v)
    }
}

impl From<Arc<dyn Task>> for StageValue {
    fn from(v: Arc<dyn Task>) -> Self {
        StageValue::Task(v)
    }
}

impl From<Arc<TaskEnvironment>> for StageValue {
    fn from(v: Arc<TaskEnvironment>) -> Self {
        StageValue::Environment(v)
    }
}

impl From<Arc<ModelTemplate>> for StageValue {
    fn from(v: Arc<ModelTemplate>) -> Self {
        StageValue::Template(v)
    }
}

/// Typed access to entity handles stored in a bundle.
pub trait BundleExt {
    fn dataset(&self, key: &str) -> Option<&Arc<DatasetEntity>>;
    fn model(&self, key: &str) -> Option<&Arc<ModelEntity>>;
    fn task(&self, key: &str) -> Option<&Arc<dyn Task>>;
    fn environment(&self, key: &str) -> Option<&Arc<TaskEnvironment>>;
    fn template(&self, key: &str) -> Option<&Arc<ModelTemplate>>;
}

impl BundleExt for Bundle {
    fn dataset(&self, key: &str) -> Option<&Arc<DatasetEntity>> {
        match self.get(key) {
            Some(StageValue::Dataset(d)) => Some(d),
            _ => None,
        }
    }

    fn model(&self, key: &str) -> Option<&Arc<ModelEntity>> {
        match self.get(key) {
            Some(StageValue::Model(m)) => Some(m),
            _ => None,
        }
    }

    fn task(&self, key: &str) -> Option<&Arc<dyn Task>> {
        match self.get(key) {
            Some(StageValue::Task(t)) => Some(t),
            _ => None,
        }
    }

    fn environment(&self, key: &str) -> Option<&Arc<TaskEnvironment>> {
        match self.get(key) {
            Some(StageValue::Environment(e)) => Some(e),
            _ => None,
        }
    }

    fn template(&self, key: &str) -> Option<&Arc<ModelTemplate>> {
        match self.get(key) {
            Some(StageValue::Template(t)) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Results of stage '{0}' are already stored")]
pub struct DuplicateResult(pub String);

/// Insertion-ordered results of the stages run so far for one test case.
///
/// Each stage name is inserted at most once.
#[derive(Debug, Default)]
pub struct ResultStore {
    stages: IndexMap<String, Arc<Bundle>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.stages.contains_key(stage)
    }

    pub fn get(&self, stage: &str) -> Option<&Arc<Bundle>> {
        self.stages.get(stage)
    }

    /// Store the results of a stage. Fails if the stage already has results.
    pub fn insert(
        &mut self,
        stage: impl Into<String>,
        results: Arc<Bundle>,
    ) -> Result<(), DuplicateResult> {
        let stage = stage.into();
        if self.stages.contains_key(&stage) {
            return Err(DuplicateResult(stage));
        }
        self.stages.insert(stage, results);
        Ok(())
    }

    /// Stage names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Resolve `stage.key.subkey...` across the stored stage results.
    pub fn resolve(&self, address: &str) -> Result<Node<'_>, AddressError> {
        let mut keys = address.split('.');
        let stage = keys.next().unwrap_or_default();
        let bundle = self
            .stages
            .get(stage)
            .ok_or_else(|| AddressError::missing_key(address, stage, self.keys()))?;
        address::descend(Node::Map(bundle), address, keys)
    }
}
