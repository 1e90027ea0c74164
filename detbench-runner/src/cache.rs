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

use crate::error::HarnessResult;
use detbench_core::CacheKey;
use detbench_stages::TestCase;
use parking_lot::Mutex;
use std::sync::Arc;

struct CachedCase {
    key: CacheKey,
    case: Option<Arc<TestCase>>,
}

/// Keeps the test case of the previous test while successive tests share
/// its model, dataset, iteration count and batch size.
///
/// Holds at most one test case; a new key drops it before the next one is built.
#[derive(Default)]
pub struct TestCaseCache {
    slot: Mutex<Option<CachedCase>>,
}

impl TestCaseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached test case for `key`, built with `build` if the key changed.
    pub fn get_or_build(
        &self,
        key: &CacheKey,
        build: impl FnOnce() -> HarnessResult<TestCase>,
    ) -> HarnessResult<Arc<TestCase>> {
        let mut slot = self.slot.lock();

        if slot.as_ref().map_or(false, |cached| cached.key == *key) {
            tracing::info!("Parameters were not changed -- cache is kept");
        } else {
            tracing::info!("Parameters were changed -- cache is cleaned");
            *slot = None;
        }

        let cached = slot.get_or_insert_with(|| CachedCase {
            key: key.clone(),
            case: None,
        });
        if let Some(case) = &cached.case {
            return Ok(case.clone());
        }

        tracing::info!("Creating test case for {:?}", key);
        let case = Arc::new(build()?);
        cached.case = Some(case.clone());
        Ok(case)
    }

    pub fn current_key(&self) -> Option<CacheKey> {
        self.slot.lock().as_ref().map(|cached| cached.key.clone())
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use detbench_core::{CocoLoader, ParamOverride, TaskRegistry};
    use detbench_stages::{ActionContext, MemoryCollector};

    fn key(model: &str, iters: u32) -> CacheKey {
        CacheKey {
            model_name: model.to_string(),
            dataset_name: "d".to_string(),
            num_training_iters: ParamOverride::Value(iters),
            batch_size: ParamOverride::Value(2),
        }
    }

    fn build() -> HarnessResult<TestCase> {
        let ctx = ActionContext {
            loader: Arc::new(CocoLoader::new()),
            tasks: Arc::new(TaskRegistry::new()),
            collector: Arc::new(MemoryCollector::new()),
            compression_available: true,
        };
        Ok(TestCase::new(
            ctx,
            Default::default(),
            "template.yaml",
            ParamOverride::Value(1),
            ParamOverride::Value(2),
        ))
    }

    #[test]
    fn test_same_key_reuses_instance() {
        let cache = TestCaseCache::new();
        let first = cache.get_or_build(&key("m", 1), build).unwrap();
        let second = cache
            .get_or_build(&key("m", 1), || panic!("must not rebuild"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_changed_key_rebuilds() {
        let cache = TestCaseCache::new();
        let first = cache.get_or_build(&key("m", 1), build).unwrap();
        let second = cache.get_or_build(&key("m", 5), build).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.current_key(), Some(key("m", 5)));

        // Returning to an earlier key does not bring the old instance back.
        let third = cache.get_or_build(&key("m", 1), build).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_failed_build_leaves_cache_empty() {
        let cache = TestCaseCache::new();
        cache.get_or_build(&key("m", 1), build).unwrap();
        let err = cache
            .get_or_build(&key("other", 1), || {
                Err(HarnessError::UnknownModel("other".to_string()))
            })
            .err()
            .unwrap();
        assert!(matches!(err, HarnessError::UnknownModel(_)));

        let rebuilt = cache.get_or_build(&key("other", 1), build);
        assert!(rebuilt.is_ok());
    }
}
