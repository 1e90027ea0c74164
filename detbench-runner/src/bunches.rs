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

//! Test bunches and their expansion into individual tests.
//!
//! A bunch names one or more models and datasets; every (model, dataset)
//! pair becomes one test per stage, in stage order.

use crate::error::{HarnessError, HarnessResult};
use detbench_core::{ParamOverride, StageName, TestParameters, REALLIFE_USECASE};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

pub const DEFAULT_NUM_ITERS: u32 = 1;
pub const DEFAULT_BATCH_SIZE: u32 = 2;

/// A group of similar tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestBunch {
    #[serde(deserialize_with = "one_or_many")]
    pub model_name: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub dataset_name: Vec<String>,
    #[serde(default)]
    pub num_training_iters: ParamOverride,
    #[serde(default)]
    pub batch_size: ParamOverride,
    pub usecase: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}

impl TestBunch {
    pub fn load_all(path: impl AsRef<Path>) -> HarnessResult<Vec<TestBunch>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| HarnessError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// One parameter set per (model, dataset, stage), defaults filled.
    pub fn expand(&self) -> impl Iterator<Item = TestParameters> + '_ {
        self.model_name.iter().flat_map(move |model| {
            self.dataset_name.iter().flat_map(move |dataset| {
                StageName::ALL.into_iter().map(move |stage| {
                    let mut params = TestParameters {
                        test_stage: stage,
                        model_name: model.clone(),
                        dataset_name: dataset.clone(),
                        num_training_iters: self.num_training_iters,
                        batch_size: self.batch_size,
                        usecase: self.usecase.clone(),
                    };
                    fill_defaults(&mut params);
                    params
                })
            })
        })
    }
}

/// The built-in bunches: a short precommit run over three models, and a
/// reallife run that keeps the template's iteration count and batch size.
pub fn default_bunches() -> Vec<TestBunch> {
    vec![
        TestBunch {
            model_name: vec![
                "gen3_mobilenetV2_SSD".to_string(),
                "gen3_mobilenetV2_ATSS".to_string(),
                "gen3_resnet50_VFNet".to_string(),
            ],
            dataset_name: vec!["dataset1_tiled_shortened_500_A".to_string()],
            num_training_iters: ParamOverride::UseDefault,
            batch_size: ParamOverride::UseDefault,
            usecase: "precommit".to_string(),
        },
        TestBunch {
            model_name: vec!["gen3_mobilenetV2_ATSS".to_string()],
            dataset_name: vec!["bbcd".to_string()],
            num_training_iters: ParamOverride::KeepConfig,
            batch_size: ParamOverride::KeepConfig,
            usecase: REALLIFE_USECASE.to_string(),
        },
    ]
}

/// Replace `DEFAULT_FIELD_VALUE_FOR_USING_IN_TEST` with the harness defaults.
pub fn fill_defaults(params: &mut TestParameters) {
    params.num_training_iters = params.num_training_iters.or_default(DEFAULT_NUM_ITERS);
    params.batch_size = params.batch_size.or_default(DEFAULT_BATCH_SIZE);
}

/// All tests of `bunches`, optionally restricted to one usecase.
pub fn list_tests(bunches: &[TestBunch], usecase: Option<&str>) -> Vec<TestParameters> {
    bunches
        .iter()
        .filter(|bunch| usecase.map_or(true, |u| bunch.usecase == u))
        .flat_map(|bunch| bunch.expand())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bunches_expand_in_stage_order() {
        let tests = list_tests(&default_bunches(), None);
        assert_eq!(tests.len(), (3 + 1) * StageName::ALL.len());

        let first: Vec<_> = tests[..10].iter().map(|t| t.test_stage).collect();
        assert_eq!(first, StageName::ALL.to_vec());
        assert!(tests[..10]
            .iter()
            .all(|t| t.model_name == "gen3_mobilenetV2_SSD"));
        assert_eq!(
            tests[0].test_id(),
            "ACTION-training,model-gen3_mobilenetV2_SSD,dataset-dataset1_tiled_shortened_500_A,\
             num_iters-1,batch-2,usecase-precommit"
        );
    }

    #[test]
    fn test_usecase_filter() {
        let tests = list_tests(&default_bunches(), Some("reallife"));
        assert_eq!(tests.len(), 10);
        assert!(tests.iter().all(|t| t.is_reallife()));
        assert!(tests
            .iter()
            .all(|t| t.num_training_iters == ParamOverride::KeepConfig));

        assert!(list_tests(&default_bunches(), Some("nightly")).is_empty());
    }

    #[test]
    fn test_fill_defaults_keeps_explicit_values() {
        let mut params = TestParameters {
            test_stage: StageName::Training,
            model_name: "m".to_string(),
            dataset_name: "d".to_string(),
            num_training_iters: ParamOverride::Value(7),
            batch_size: ParamOverride::UseDefault,
            usecase: "precommit".to_string(),
        };
        fill_defaults(&mut params);
        assert_eq!(params.num_training_iters, ParamOverride::Value(7));
        assert_eq!(params.batch_size, ParamOverride::Value(DEFAULT_BATCH_SIZE));
        assert!(params.ensure_resolved().is_ok());
    }

    #[test]
    fn test_bunch_yaml_accepts_single_names() {
        let bunches: Vec<TestBunch> = serde_yaml::from_str(
            r#"
- model_name: gen3_mobilenetV2_ATSS
  dataset_name: [a, b]
  batch_size: 4
  usecase: precommit
"#,
        )
        .unwrap();
        assert_eq!(bunches[0].model_name, vec!["gen3_mobilenetV2_ATSS"]);
        assert_eq!(bunches[0].num_training_iters, ParamOverride::UseDefault);

        let tests = list_tests(&bunches, None);
        assert_eq!(tests.len(), 20);
        assert_eq!(tests[10].dataset_name, "b");
        assert_eq!(tests[10].batch_size, ParamOverride::Value(4));
        assert_eq!(tests[10].num_training_iters, ParamOverride::Value(DEFAULT_NUM_ITERS));
    }
}
