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

use crate::error::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_DATASET_DEFINITIONS: &str = "DETBENCH_DATASET_DEFINITIONS";
const ENV_EXPECTED_METRICS: &str = "DETBENCH_EXPECTED_METRICS";
const ENV_TEMPLATES_ROOT: &str = "DETBENCH_TEMPLATES_ROOT";
const ENV_TEST_BUNCHES: &str = "DETBENCH_TEST_BUNCHES";
const ENV_TEST_USECASE: &str = "DETBENCH_TEST_USECASE";
const ENV_COMPRESSION_AVAILABLE: &str = "DETBENCH_COMPRESSION_AVAILABLE";

/// Detbench harness configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// YAML file mapping dataset names to their annotation and image paths.
    /// Tests that need a dataset are skipped while this is unset.
    #[serde(default)]
    pub dataset_definitions: Option<PathBuf>,

    /// YAML file with expected metrics of the reallife tests
    #[serde(default)]
    pub expected_metrics: Option<PathBuf>,

    /// Directory searched recursively for `template*.yaml`
    #[serde(default = "default_templates_root")]
    pub templates_root: PathBuf,

    /// YAML file with test bunches; the built-in bunches are used when unset
    #[serde(default)]
    pub test_bunches: Option<PathBuf>,

    /// Only run bunches of this usecase
    #[serde(default)]
    pub usecase: Option<String>,

    /// Whether the compression backend is installed
    #[serde(default = "default_compression_available")]
    pub compression_available: bool,
}

fn default_templates_root() -> PathBuf {
    PathBuf::from("./configs/ote")
}

fn default_compression_available() -> bool {
    true
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            dataset_definitions: None,
            expected_metrics: None,
            templates_root: default_templates_root(),
            test_bunches: None,
            usecase: None,
            compression_available: default_compression_available(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> HarnessResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - DETBENCH_DATASET_DEFINITIONS: dataset definitions YAML
    /// - DETBENCH_EXPECTED_METRICS: expected metrics YAML
    /// - DETBENCH_TEMPLATES_ROOT: template search root (default: ./configs/ote)
    /// - DETBENCH_TEST_BUNCHES: test bunches YAML
    /// - DETBENCH_TEST_USECASE: usecase filter
    /// - DETBENCH_COMPRESSION_AVAILABLE: compression backend installed (default: true)
    pub fn from_env() -> Self {
        Self::default().merge_with(env_var)
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> HarnessResult<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        // Override with environment variables
        Ok(config.merge_with(env_var))
    }

    /// Override fields whose variable is set according to `lookup`.
    pub fn merge_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(ENV_DATASET_DEFINITIONS) {
            self.dataset_definitions = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup(ENV_EXPECTED_METRICS) {
            self.expected_metrics = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup(ENV_TEMPLATES_ROOT) {
            self.templates_root = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_TEST_BUNCHES) {
            self.test_bunches = Some(PathBuf::from(path));
        }
        if let Some(usecase) = lookup(ENV_TEST_USECASE) {
            self.usecase = Some(usecase).filter(|u| !u.is_empty());
        }
        if let Some(available) = lookup(ENV_COMPRESSION_AVAILABLE) {
            self.compression_available = available.parse().unwrap_or(true);
        }
        self
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config: HarnessConfig = toml::from_str("").unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert!(config.compression_available);
        assert_eq!(config.templates_root, PathBuf::from("./configs/ote"));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let config: HarnessConfig = toml::from_str(
            r#"
dataset_definitions = "/data/definitions.yml"
usecase = "precommit"
compression_available = false
"#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("DETBENCH_TEST_USECASE", "reallife"),
            ("DETBENCH_EXPECTED_METRICS", "/data/expected.yml"),
        ]);
        let config = config.merge_with(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(
            config.dataset_definitions,
            Some(PathBuf::from("/data/definitions.yml"))
        );
        assert_eq!(config.expected_metrics, Some(PathBuf::from("/data/expected.yml")));
        assert_eq!(config.usecase.as_deref(), Some("reallife"));
        assert!(!config.compression_available);
    }

    #[test]
    fn test_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::from_file(dir.path().join("absent.toml"));
        assert!(matches!(config, Err(HarnessError::Io { .. })));
    }
}
