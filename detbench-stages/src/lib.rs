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

//! # Detbench Stages
//!
//! The stage engine of the harness: ten actions wired into a fixed
//! dependency graph, each run at most once per test case.
//!
//! - [`Action`]: one unit of work (train, evaluate, export, quantize,
//!   compress, ...) consuming the results of earlier stages
//! - [`Stage`]: runs its dependencies first, memoizes the outcome of its
//!   action and triggers validation for the stage that was asked for
//! - [`TestCase`]: owns the graph and the shared [`ResultStore`]
//!
//! [`ResultStore`]: detbench_core::ResultStore

pub mod action;
pub mod collector;
pub mod error;
pub mod stage;
pub mod test_case;

pub use action::{
    Action, ActionContext, CompressAction, CompressEvaluationAction, CompressExportAction,
    CompressExportEvaluationAction, ExportAction, ExportEvaluationAction, QuantizeAction,
    QuantizeEvaluationAction, TrainingAction, TrainingEvaluationAction,
};
pub use collector::{MemoryCollector, MetricsCollector, TracingCollector};
pub use error::{ActionError, ActionResult, StageError};
pub use stage::Stage;
pub use test_case::TestCase;
