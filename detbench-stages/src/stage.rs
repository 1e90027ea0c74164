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

//! Memoized stage execution.
//!
//! A stage moves from `Pending` to `Succeeded` or `Failed` exactly once, the
//! first time its action runs. Later calls replay the stored outcome: the
//! same result bundle, or the same error instance.

use crate::action::{Action, ActionContext};
use crate::error::{ActionError, StageError};
use detbench_core::{Bundle, ResultStore, StageName};
use detbench_evals::Validator;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum StageState {
    Pending,
    Succeeded(Arc<Bundle>),
    Failed(Arc<ActionError>),
}

/// An action bound to the stages it depends on.
pub struct Stage {
    action: Box<dyn Action>,
    depends: Vec<Arc<Stage>>,
    state: Mutex<StageState>,
}

impl Stage {
    pub fn new(action: Box<dyn Action>, depends: Vec<Arc<Stage>>) -> Self {
        Self {
            action,
            depends,
            state: Mutex::new(StageState::Pending),
        }
    }

    pub fn name(&self) -> StageName {
        self.action.name()
    }

    pub fn depends(&self) -> impl Iterator<Item = StageName> + '_ {
        self.depends.iter().map(|stage| stage.name())
    }

    pub fn is_processed(&self) -> bool {
        !matches!(*self.state.lock(), StageState::Pending)
    }

    /// Run the dependencies, then this stage's action unless it already ran.
    ///
    /// Dependencies always run with `validator = None`; only the stage that
    /// was asked for is validated, and only if its action requires it.
    pub fn run_once(
        &self,
        ctx: &ActionContext,
        store: &mut ResultStore,
        validator: Option<&Validator>,
    ) -> Result<Arc<Bundle>, StageError> {
        let name = self.name();
        tracing::info!("Begin stage \"{}\"", name);
        tracing::debug!(
            "For test stage \"{}\": stored stages = {:?}",
            name,
            store.keys().collect::<Vec<_>>()
        );

        for dep in &self.depends {
            tracing::debug!("For test stage \"{}\": running dep. stage \"{}\"", name, dep.name());
            dep.run_once(ctx, store, None)?;
        }

        let state = self.state.lock().clone();
        match state {
            StageState::Failed(error) => {
                tracing::warn!(
                    "In stage {}: found that previous call of the stage failed, replaying the error",
                    name
                );
                return Err(StageError::from_action(name, error));
            }
            StageState::Succeeded(results) => {
                tracing::info!("The stage {} was already processed SUCCESSFULLY", name);
                self.validate(&results, store, validator)?;
                tracing::info!("End stage \"{}\"", name);
                return Ok(results);
            }
            StageState::Pending => {}
        }

        if store.contains(name.as_str()) {
            return Err(StageError::DuplicateStage(name));
        }

        tracing::info!("For test stage \"{}\": Before running main action", name);
        let results = match self.action.call(ctx, store) {
            Ok(bundle) => Arc::new(bundle),
            Err(error) => {
                tracing::info!(
                    "For test stage \"{}\": action failed: {}",
                    name,
                    error
                );
                let error = Arc::new(error);
                *self.state.lock() = StageState::Failed(error.clone());
                return Err(StageError::from_action(name, error));
            }
        };
        tracing::info!("For test stage \"{}\": After running main action", name);

        *self.state.lock() = StageState::Succeeded(results.clone());
        store
            .insert(name.as_str(), results.clone())
            .map_err(|_| StageError::DuplicateStage(name))?;

        // Outside the memoized section: a result with failing metrics is
        // still served to later stages.
        self.validate(&results, store, validator)?;
        tracing::info!("End stage \"{}\"", name);
        Ok(results)
    }

    fn validate(
        &self,
        results: &Bundle,
        store: &ResultStore,
        validator: Option<&Validator>,
    ) -> Result<(), StageError> {
        if !self.action.requires_validation() {
            return Ok(());
        }
        let Some(validator) = validator else {
            tracing::debug!(
                "No validator for stage {}, most probably it runs from a dependency chain",
                self.name()
            );
            return Ok(());
        };
        validator
            .validate(results, store)
            .map_err(|source| StageError::Validation {
                stage: self.name(),
                source,
            })
    }
}
