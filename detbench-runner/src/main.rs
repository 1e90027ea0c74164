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

//! Detbench CLI
//!
//! Inspects the regression-test setup: the tests that would run, the
//! expected metrics file, and the discovered model templates.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use detbench_evals::ExpectedMetrics;
use detbench_runner::{configured_tests, HarnessConfig, TemplateIndex};
use serde_json::json;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "detbench")]
#[command(about = "Detbench - detection training regression tests", long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List test ids in execution order
    List {
        /// Only tests of this usecase (overrides config)
        #[arg(long)]
        usecase: Option<String>,
    },

    /// Check the shape of every requirement in an expected metrics file
    LintExpectations {
        /// Expected metrics YAML (defaults to the configured one)
        path: Option<PathBuf>,
    },

    /// List discovered model templates
    Templates {
        /// Search root (overrides config)
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = HarnessConfig::load(cli.config.clone())?;

    match cli.command {
        Commands::List { usecase } => {
            if usecase.is_some() {
                config.usecase = usecase;
            }
            let tests = configured_tests(&config)?;
            if cli.json {
                let listing: Vec<_> = tests
                    .iter()
                    .map(|t| json!({ "id": t.test_id(), "parameters": t }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for test in &tests {
                    println!("{}", test.test_id());
                }
            }
        }

        Commands::LintExpectations { path } => {
            let Some(path) = path.or(config.expected_metrics) else {
                bail!("No expected metrics file given and none configured");
            };
            let expected = ExpectedMetrics::from_file(&path)
                .with_context(|| format!("Failed to load {:?}", path))?;
            let issues = expected.lint();

            if cli.json {
                let report: Vec<_> = issues
                    .iter()
                    .map(|i| json!({ "test_id": i.test_id, "address": i.address, "error": i.error.to_string() }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for issue in &issues {
                    println!("{} / {}: {}", issue.test_id, issue.address, issue.error);
                }
                println!("{} tests checked, {} issues", expected.len(), issues.len());
            }
            if !issues.is_empty() {
                bail!("{} invalid requirements in {:?}", issues.len(), path);
            }
        }

        Commands::Templates { root } => {
            let root = root.unwrap_or(config.templates_root);
            let templates = TemplateIndex::discover(&root)
                .with_context(|| format!("Failed to index templates under {:?}", root))?;
            if cli.json {
                let listing: serde_json::Map<String, serde_json::Value> = templates
                    .iter()
                    .map(|(name, path)| (name.to_string(), json!(path)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for (name, path) in templates.iter() {
                    println!("{:<32} {}", name, path.display());
                }
            }
        }
    }

    Ok(())
}
