//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Flowboard configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Maximum number of features allowed in progress at once
    pub wip_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub max_retries: u32,
    pub max_qa_iterations: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub project_id: String,
    /// Capacity of the backend push channels
    pub push_buffer: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self { wip_limit: 3 }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_qa_iterations: 3,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            project_id: "default".to_string(),
            push_buffer: 64,
        }
    }
}

const KEYS: &[&str] = &[
    "board.wip_limit",
    "execution.max_retries",
    "execution.max_qa_iterations",
    "sync.project_id",
    "sync.push_buffer",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("FLOWBOARD_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("flowboard")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.board.wip_limit == 0 {
            return Err(anyhow!("board.wip_limit must be at least 1"));
        }
        if self.sync.project_id.trim().is_empty() {
            return Err(anyhow!("sync.project_id cannot be empty"));
        }
        if self.sync.push_buffer == 0 {
            return Err(anyhow!("sync.push_buffer must be at least 1"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "board.wip_limit" => Ok(self.board.wip_limit.to_string()),
            "execution.max_retries" => Ok(self.execution.max_retries.to_string()),
            "execution.max_qa_iterations" => Ok(self.execution.max_qa_iterations.to_string()),
            "sync.project_id" => Ok(self.sync.project_id.clone()),
            "sync.push_buffer" => Ok(self.sync.push_buffer.to_string()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `flowboard config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "board.wip_limit" => {
                let limit: usize = value
                    .parse()
                    .with_context(|| format!("Invalid wip_limit value: {}", value))?;
                if limit == 0 {
                    return Err(anyhow!("WIP limit must be at least 1"));
                }
                self.board.wip_limit = limit;
            }
            "execution.max_retries" => {
                self.execution.max_retries = value
                    .parse()
                    .with_context(|| format!("Invalid max_retries value: {}", value))?;
            }
            "execution.max_qa_iterations" => {
                self.execution.max_qa_iterations = value
                    .parse()
                    .with_context(|| format!("Invalid max_qa_iterations value: {}", value))?;
            }
            "sync.project_id" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Project id cannot be empty"));
                }
                self.sync.project_id = value.trim().to_string();
            }
            "sync.push_buffer" => {
                let buffer: usize = value
                    .parse()
                    .with_context(|| format!("Invalid push_buffer value: {}", value))?;
                if buffer == 0 {
                    return Err(anyhow!("Push buffer must be at least 1"));
                }
                self.sync.push_buffer = buffer;
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `flowboard config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
