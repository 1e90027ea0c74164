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

//! Stage error types

use detbench_core::{DatasetError, ParamError, StageName, TaskError, TemplateError, UnknownStageName};
use detbench_evals::ValidationError;
use std::sync::Arc;
use thiserror::Error;

/// Result type for action execution
pub type ActionResult<T> = Result<T, ActionError>;

/// Errors raised by an action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("The action {action} requires results of the stage {stage}, but they are absent")]
    MissingDependency { action: StageName, stage: StageName },

    #[error("The action {action} expects '{key}' ({kind}) in the results of the stage {stage}")]
    MissingEntity {
        action: StageName,
        stage: StageName,
        key: &'static str,
        kind: &'static str,
    },

    #[error("Training was failed: {0}")]
    TrainingFailed(String),

    #[error("In action \"{action}\": {reason}")]
    ExportFailed { action: StageName, reason: String },

    #[error("POT optimization was not successful: {0}")]
    QuantizeFailed(String),

    #[error("NNCF optimization was not successful: {0}")]
    CompressFailed(String),

    #[error("Cannot get performance of the model evaluated by {0}")]
    MissingPerformance(StageName),

    /// Soft skip: the stage cannot run in this environment.
    #[error("{0}")]
    Skipped(String),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),
}

/// Errors surfaced by running a stage
#[derive(Debug, Error)]
pub enum StageError {
    /// The action of `stage` failed; replays share the same error instance.
    #[error("Stage {stage} failed: {source}")]
    Action {
        stage: StageName,
        #[source]
        source: Arc<ActionError>,
    },

    #[error("Stage {stage} skipped: {reason}")]
    Skipped { stage: StageName, reason: String },

    #[error("For test stage \"{0}\": another stage with this name has been run already")]
    DuplicateStage(StageName),

    #[error(transparent)]
    UnknownStage(#[from] UnknownStageName),

    #[error("Stage {stage}: {source}")]
    Validation {
        stage: StageName,
        #[source]
        source: ValidationError,
    },
}

impl StageError {
    /// Wrap a stored action outcome, keeping skips distinguishable from failures.
    pub(crate) fn from_action(stage: StageName, error: Arc<ActionError>) -> Self {
        match error.as_ref() {
            ActionError::Skipped(reason) => StageError::Skipped {
                stage,
                reason: reason.clone(),
            },
            _ => StageError::Action {
                stage,
                source: error,
            },
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, StageError::Skipped { .. })
    }

    /// The stored action error, if this is an action failure.
    pub fn action_error(&self) -> Option<&Arc<ActionError>> {
        match self {
            StageError::Action { source, .. } => Some(source),
            _ => None,
        }
    }
}
