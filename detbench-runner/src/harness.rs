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

//! Runs tests one after another, sharing test cases between them.

use crate::bunches::{default_bunches, list_tests, TestBunch};
use crate::cache::TestCaseCache;
use crate::config::HarnessConfig;
use crate::definitions::{DatasetDefinitions, TemplateIndex};
use crate::error::HarnessResult;
use detbench_core::TestParameters;
use detbench_evals::{ExpectationLookup, ExpectedMetrics, Validator};
use detbench_stages::{ActionContext, TestCase};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum TestOutcome {
    Passed,
    Failed(String),
    Skipped(String),
}

impl TestOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TestOutcome::Failed(_))
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Passed => f.write_str("PASSED"),
            TestOutcome::Failed(reason) => write!(f, "FAILED: {}", reason),
            TestOutcome::Skipped(reason) => write!(f, "SKIPPED: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub test_id: String,
    #[serde(flatten)]
    pub outcome: TestOutcome,
}

pub struct Harness {
    ctx: ActionContext,
    definitions: Option<DatasetDefinitions>,
    templates: TemplateIndex,
    expected: Option<Arc<ExpectedMetrics>>,
    cache: TestCaseCache,
}

impl Harness {
    pub fn new(
        ctx: ActionContext,
        definitions: Option<DatasetDefinitions>,
        templates: TemplateIndex,
        expected: Option<Arc<ExpectedMetrics>>,
    ) -> Self {
        Self {
            ctx,
            definitions,
            templates,
            expected,
            cache: TestCaseCache::new(),
        }
    }

    /// Load definitions, templates and expectations named by `config`.
    ///
    /// The compression flag of `config` replaces the one in `ctx`.
    pub fn from_config(config: &HarnessConfig, mut ctx: ActionContext) -> HarnessResult<Self> {
        ctx.compression_available = config.compression_available;

        let definitions = match &config.dataset_definitions {
            Some(path) => Some(DatasetDefinitions::from_file(path)?),
            None => {
                tracing::warn!(
                    "Dataset definitions are not set -- all the tests that require them are skipped"
                );
                None
            }
        };
        let templates = TemplateIndex::discover(&config.templates_root)?;
        let expected = match &config.expected_metrics {
            Some(path) => Some(Arc::new(ExpectedMetrics::from_file(path)?)),
            None => None,
        };
        Ok(Self::new(ctx, definitions, templates, expected))
    }

    pub fn templates(&self) -> &TemplateIndex {
        &self.templates
    }

    /// Only reallife tests are quality-gated; every other test gets a
    /// validator that accepts any result.
    pub fn validator_for(&self, params: &TestParameters) -> Validator {
        if !params.is_reallife() {
            return Validator::default();
        }
        Validator::new(Some(ExpectationLookup::new(
            self.expected.clone(),
            params.test_id(),
        )))
    }

    fn build_test_case(
        &self,
        definitions: &DatasetDefinitions,
        params: &TestParameters,
    ) -> HarnessResult<TestCase> {
        let dataset = definitions.dataset_params(&params.dataset_name)?;
        let template_path = self.templates.get(&params.model_name)?;
        Ok(TestCase::new(
            self.ctx.clone(),
            dataset,
            template_path,
            params.num_training_iters,
            params.batch_size,
        ))
    }

    /// The test case shared by all tests with the same cache key.
    pub fn test_case_for(
        &self,
        definitions: &DatasetDefinitions,
        params: &TestParameters,
    ) -> HarnessResult<Arc<TestCase>> {
        self.cache
            .get_or_build(&params.cache_key(), || self.build_test_case(definitions, params))
    }

    pub fn run_test(&self, params: &TestParameters) -> TestOutcome {
        let test_id = params.test_id();
        tracing::info!("Begin test {}", test_id);

        let Some(definitions) = &self.definitions else {
            return TestOutcome::Skipped("The dataset definitions are not set".to_string());
        };
        if let Err(e) = params.ensure_resolved() {
            return TestOutcome::Failed(e.to_string());
        }
        let case = match self.test_case_for(definitions, params) {
            Ok(case) => case,
            Err(e) => return TestOutcome::Failed(e.to_string()),
        };

        let validator = self.validator_for(params);
        let outcome = match case.run_stage(params.test_stage, Some(&validator)) {
            Ok(_) => TestOutcome::Passed,
            Err(e) if e.is_skip() => TestOutcome::Skipped(e.to_string()),
            Err(e) => TestOutcome::Failed(e.to_string()),
        };
        tracing::info!("End test {}: {}", test_id, outcome);
        outcome
    }

    /// Run `tests` in order.
    pub fn run_all(&self, tests: &[TestParameters]) -> Vec<TestReport> {
        tests
            .iter()
            .map(|params| TestReport {
                test_id: params.test_id(),
                outcome: self.run_test(params),
            })
            .collect()
    }
}

/// Tests selected by `config`: its bunches file or the built-in bunches,
/// filtered by its usecase.
pub fn configured_tests(config: &HarnessConfig) -> HarnessResult<Vec<TestParameters>> {
    let bunches = match &config.test_bunches {
        Some(path) => TestBunch::load_all(path)?,
        None => default_bunches(),
    };
    Ok(list_tests(&bunches, config.usecase.as_deref()))
}
