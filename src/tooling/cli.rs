//! CLI Tooling
//!
//! Command-line access to a shared state directory. Every invocation builds an
//! engine over the file store and synchronizes it from disk before running the
//! command, so the CLI always sees what peers have persisted.

use crate::config::{ConfigLoader, StoragePaths, SyncConfig};
use crate::engine::StateSyncEngine;
use crate::events::NullSink;
use crate::store::FileStateStore;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Statesync CLI - versioned shared state for cooperating agents
#[derive(Parser)]
#[command(name = "statesync")]
#[command(about = "Versioned, lock-coordinated shared state backed by a durable file store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Storage root (overrides storage.root from config)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the current value of a state
    Get {
        id: String,
        /// Print the full record instead of the value
        #[arg(long)]
        record: bool,
    },
    /// Write a new version of a state
    Set {
        id: String,
        /// JSON value
        value: String,
        /// Writer recorded on the new version
        #[arg(long, default_value = "cli")]
        agent: String,
    },
    /// Remove a state from the cache (and from disk with --purge)
    Delete {
        id: String,
        #[arg(long)]
        purge: bool,
    },
    /// List states in the store
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show aggregate version statistics
    Stats {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Load every persisted state and report how many were found
    Sync,
    /// Resolve two divergent JSON values
    Resolve {
        id: String,
        local: String,
        remote: String,
        /// merge or latest
        #[arg(long, default_value = "merge")]
        strategy: String,
        /// Persist the resolved value as a new version
        #[arg(long)]
        apply: bool,
        #[arg(long, default_value = "cli")]
        agent: String,
    },
    /// Print the effective configuration
    Config,
}

/// Resolved configuration plus the runtime the async engine runs on
pub struct CliContext {
    config: SyncConfig,
    paths: StoragePaths,
    runtime: tokio::runtime::Runtime,
}

impl CliContext {
    pub fn new(config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(None)?,
        };
        let paths = config.storage.resolve_paths(data_dir.as_deref())?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        Ok(Self {
            config,
            paths,
            runtime,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Engine over the configured store, initialized and synced from disk
    async fn open_engine(&self, purge_on_delete: bool) -> Result<StateSyncEngine> {
        let mut engine_config = self.config.engine.clone();
        engine_config.purge_on_delete |= purge_on_delete;

        let store = Arc::new(FileStateStore::new(self.paths.clone()));
        let engine = StateSyncEngine::with_config(store, Arc::new(NullSink), engine_config);
        engine.initialize().await?;
        let loaded = engine.sync_all_states().await?;
        debug!(loaded, states = %self.paths.states.display(), "Opened state store");
        Ok(engine)
    }

    pub fn execute(&self, command: &Commands) -> Result<String> {
        self.runtime.block_on(self.run(command))
    }

    async fn run(&self, command: &Commands) -> Result<String> {
        match command {
            Commands::Get { id, record } => {
                let engine = self.open_engine(false).await?;
                let output = if *record {
                    let record = engine
                        .get_record(id)?
                        .with_context(|| format!("State not found: {}", id))?;
                    serde_json::to_string_pretty(&record)?
                } else {
                    let value = engine
                        .get_state(id)?
                        .with_context(|| format!("State not found: {}", id))?;
                    serde_json::to_string_pretty(&value)?
                };
                Ok(output)
            }
            Commands::Set { id, value, agent } => {
                let value = parse_json_arg("value", value)?;
                let engine = self.open_engine(false).await?;
                let version = engine.set_state(id, value, agent).await?;
                Ok(format!("{} -> version {}", id, version))
            }
            Commands::Delete { id, purge } => {
                let engine = self.open_engine(*purge).await?;
                let existed = engine.delete_state(id).await?;
                if !existed {
                    anyhow::bail!("State not found: {}", id);
                }
                if engine.config().purge_on_delete {
                    Ok(format!("Deleted {} (durable copy purged)", id))
                } else {
                    Ok(format!("Deleted {} from cache; durable copy kept", id))
                }
            }
            Commands::List { format } => {
                let engine = self.open_engine(false).await?;
                let states = engine.get_state_list()?;
                match format.as_str() {
                    "json" => Ok(serde_json::to_string_pretty(&states)?),
                    "text" => {
                        if states.is_empty() {
                            return Ok("No states found".to_string());
                        }
                        let mut table = Table::new();
                        table.load_preset(comfy_table::presets::UTF8_FULL);
                        table.set_header(vec!["Id", "Version", "Agent", "Timestamp"]);
                        for state in &states {
                            table.add_row(vec![
                                state.id.clone(),
                                state.version.to_string(),
                                state.agent_id.clone(),
                                state.timestamp.to_rfc3339(),
                            ]);
                        }
                        Ok(table.to_string())
                    }
                    other => anyhow::bail!("Unknown format: {} (expected text or json)", other),
                }
            }
            Commands::Stats { format } => {
                let engine = self.open_engine(false).await?;
                let stats = engine.get_state_stats()?;
                match format.as_str() {
                    "json" => Ok(serde_json::to_string_pretty(&stats)?),
                    "text" => Ok(format!(
                        "States: {}\nTotal versions: {}\nAverage version: {:.2}",
                        stats.total_states, stats.total_versions, stats.avg_version
                    )),
                    other => anyhow::bail!("Unknown format: {} (expected text or json)", other),
                }
            }
            Commands::Sync => {
                // open_engine already syncs; report what it found
                let engine = self.open_engine(false).await?;
                let stats = engine.get_state_stats()?;
                Ok(format!(
                    "Synchronized {} states from {}",
                    stats.total_states,
                    self.paths.states.display()
                ))
            }
            Commands::Resolve {
                id,
                local,
                remote,
                strategy,
                apply,
                agent,
            } => {
                let local = parse_json_arg("local", local)?;
                let remote = parse_json_arg("remote", remote)?;
                let engine = self.open_engine(false).await?;
                let resolved = engine.resolve_conflict(id, &local, &remote, strategy)?;
                let rendered = serde_json::to_string_pretty(&resolved)?;
                if *apply {
                    let version = engine.set_state(id, resolved, agent).await?;
                    Ok(format!("{}\n{} -> version {}", rendered, id, version))
                } else {
                    Ok(rendered)
                }
            }
            Commands::Config => Ok(toml::to_string_pretty(&self.config)?),
        }
    }
}

fn parse_json_arg(name: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw)
        .with_context(|| format!("Argument <{}> is not valid JSON: {}", name, raw))
}
