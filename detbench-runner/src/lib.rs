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

//! # Detbench runner
//!
//! Drives the stage engine over parametrized tests.
//!
//! ## Features
//!
//! - **Test bunches**: models × datasets × stages, with default iteration
//!   count and batch size filled in
//! - **Test-case cache**: successive tests with the same model, dataset,
//!   iterations and batch size share one `TestCase`
//! - **Dataset definitions**: YAML with paths relative to the file
//! - **Template discovery**: `template*.yaml` under a root directory
//! - **Configuration**: TOML file overridden by `DETBENCH_*` variables

pub mod bunches;
pub mod cache;
pub mod config;
pub mod definitions;
pub mod error;
pub mod harness;

pub use bunches::{
    default_bunches, fill_defaults, list_tests, TestBunch, DEFAULT_BATCH_SIZE, DEFAULT_NUM_ITERS,
};
pub use cache::TestCaseCache;
pub use config::HarnessConfig;
pub use definitions::{DatasetDefinitions, TemplateIndex};
pub use error::{HarnessError, HarnessResult};
pub use harness::{configured_tests, Harness, TestOutcome, TestReport};
