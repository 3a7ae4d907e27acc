use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::prompts;

/// Environment variable that overrides the host of every catalog entry.
pub const HOST_ENV: &str = "BASE_URL";

pub const DEFAULT_HOST: &str = "http://localhost:11434";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logical name of the model to benchmark, a key of `models`
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, ModelEntry>,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>, // Per-request timeout in seconds; unset waits forever
    #[serde(default)]
    pub health_check_timeout: u64, // Total time to wait for server readiness in seconds (0 = disabled)
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval: u64,
}

/// One entry of the model catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Model identifier as known to the server, e.g. `qwen3:1.7b`
    pub model: String,
    /// Server for this model; falls back to `endpoint.host`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// A catalog entry with its host resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTarget {
    pub name: String,
    pub model: String,
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// JSONL prompt file; the built-in corpus is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Built-in category to run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Only run prompts with this reference label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Number of prompts to run, first 10 by default
    #[serde(default = "default_sample_size")]
    pub sample_size: Option<usize>,
    #[serde(default)]
    pub shuffle: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub quiet: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_log: Option<PathBuf>,
}

/// Free-form description of the machine the server runs on, copied into the
/// report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_cpu")]
    pub cpu: String,
    #[serde(default = "default_memory")]
    pub memory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    /// Per-module log level overrides (e.g., ["reqwest=warn", "hyper=info"])
    #[serde(default)]
    pub filter: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: EndpointConfig::default(),
            models: default_models(),
            input: InputConfig::default(),
            output: OutputConfig::default(),
            system: SystemConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            timeout: None,
            health_check_timeout: 0,
            health_check_interval: default_health_check_interval(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            file: None,
            category: None,
            reference: None,
            sample_size: default_sample_size(),
            shuffle: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            quiet: false,
            trace_log: None,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            cpu: default_cpu(),
            memory: default_memory(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            filter: Vec::new(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_health_check_interval() -> u64 {
    5
}

fn default_models() -> BTreeMap<String, ModelEntry> {
    ["qwen3:1.7b", "deepseek-r1:1.5b", "llama3.2:3b", "gemma3n:e2b"]
        .into_iter()
        .map(|name| {
            (
                name.to_string(),
                ModelEntry {
                    model: name.to_string(),
                    host: None,
                },
            )
        })
        .collect()
}

fn default_sample_size() -> Option<usize> {
    Some(10)
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("analysis")
}

fn default_cpu() -> String {
    num_cpus::get().to_string()
}

fn default_memory() -> String {
    "16GB".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Config {
    /// Load the configuration file, or the built-in defaults when `path` is
    /// `None`. The `BASE_URL` override is applied afterwards, see
    /// [`Config::host_override`].
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("failed to read config {}: {}", path.display(), e)
                })?;
                toml::from_str(&contents)?
            }
            None => Config::default(),
        };
        config.apply_host_override(Self::host_override());
        Ok(config)
    }

    /// Host from the `BASE_URL` environment variable, if set and non-empty.
    pub fn host_override() -> Option<String> {
        std::env::var(HOST_ENV).ok().filter(|h| !h.trim().is_empty())
    }

    /// Point every catalog entry, and the default endpoint, at `host`.
    /// Returns `false` when there is nothing to apply.
    pub fn apply_host_override(&mut self, host: Option<String>) -> bool {
        let Some(host) = host.filter(|h| !h.trim().is_empty()) else {
            return false;
        };

        self.endpoint.host = host.clone();
        for entry in self.models.values_mut() {
            entry.host = Some(host.clone());
        }
        true
    }

    /// Resolve the selected model against the catalog.
    pub fn target(&self) -> anyhow::Result<ModelTarget> {
        let Some(entry) = self.models.get(&self.model) else {
            anyhow::bail!(
                "model '{}' is not in the catalog (known: {})",
                self.model,
                self.models.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        };

        Ok(ModelTarget {
            name: self.model.clone(),
            model: entry.model.clone(),
            host: entry
                .host
                .clone()
                .unwrap_or_else(|| self.endpoint.host.clone()),
        })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.endpoint.timeout.map(Duration::from_secs)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.target()?;

        if self.input.sample_size == Some(0) {
            anyhow::bail!("sample_size must be greater than 0");
        }

        if self.endpoint.timeout == Some(0) {
            anyhow::bail!("timeout must be greater than 0 when set");
        }

        if self.endpoint.health_check_timeout > 0 && self.endpoint.health_check_interval == 0 {
            anyhow::bail!(
                "health_check_interval must be greater than 0 when health checks are enabled"
            );
        }

        if let Some(category) = &self.input.category {
            if self.input.file.is_some() {
                anyhow::bail!("category filter only applies to the built-in prompts");
            }
            if !prompts::is_category(category) {
                anyhow::bail!("unknown prompt category '{}'", category);
            }
        }

        if let Some(reference) = &self.input.reference
            && self.input.file.is_none()
            && !prompts::reference_labels().contains(&reference.as_str())
        {
            anyhow::bail!("no built-in prompts are labelled '{}'", reference);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.models.len(), 4);
        assert_eq!(config.input.sample_size, Some(10));
        assert_eq!(config.output.directory, PathBuf::from("analysis"));
        assert!(config.endpoint.timeout.is_none());
        assert!(config.validate().is_ok());

        let target = config.target().unwrap();
        assert_eq!(target.model, "llama3.2:3b");
        assert_eq!(target.host, DEFAULT_HOST);
    }

    #[test]
    fn test_parse_file() {
        let config: Config = toml::from_str(
            r#"
            model = "fast"

            [endpoint]
            host = "http://10.0.0.2:11434"
            timeout = 300

            [models.fast]
            model = "qwen3:1.7b"
            host = "http://127.0.0.1:11435"

            [models.slow]
            model = "qwen3:4b"

            [input]
            category = "Multimodal Tasks"
            sample_size = 3

            [system]
            cpu = "4"
            memory = "8GB"

            [log]
            level = "debug"
            filter = ["reqwest=warn"]
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.system.memory, "8GB");
        assert_eq!(config.log.filter, vec!["reqwest=warn".to_string()]);

        let target = config.target().unwrap();
        assert_eq!(target.name, "fast");
        assert_eq!(target.model, "qwen3:1.7b");
        assert_eq!(target.host, "http://127.0.0.1:11435");
    }

    #[test]
    fn test_example_config_is_valid() {
        let config: Config = toml::from_str(include_str!("../bench.example.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.models.len(), 5);
        assert_eq!(config.input.sample_size, Some(10));

        let mut pinned = config.clone();
        pinned.model = "qwen3:4b".to_string();
        assert_eq!(pinned.target().unwrap().host, "http://127.0.0.1:11435");
    }

    #[test]
    fn test_entry_without_host_uses_endpoint() {
        let mut config = Config::default();
        config.endpoint.host = "http://gpu-box:11434".to_string();
        config.model = "gemma3n:e2b".to_string();
        assert_eq!(config.target().unwrap().host, "http://gpu-box:11434");
    }

    #[test]
    fn test_host_override_applies_to_every_entry() {
        let mut config = Config::default();
        config.models.insert(
            "pinned".to_string(),
            ModelEntry {
                model: "qwen3:4b".to_string(),
                host: Some("http://127.0.0.1:11435".to_string()),
            },
        );

        assert!(config.apply_host_override(Some("http://ollama:11434".to_string())));

        assert_eq!(config.endpoint.host, "http://ollama:11434");
        for entry in config.models.values() {
            assert_eq!(entry.host.as_deref(), Some("http://ollama:11434"));
        }
    }

    #[test]
    fn test_empty_host_override_ignored() {
        let mut config = Config::default();
        assert!(!config.apply_host_override(Some("  ".to_string())));
        assert!(!config.apply_host_override(None));
        assert_eq!(config.endpoint.host, DEFAULT_HOST);
    }

    #[test]
    fn test_sample_size_defaults_when_omitted() {
        let config: Config = toml::from_str("[input]\nshuffle = true\n").unwrap();
        assert_eq!(config.input.sample_size, Some(10));

        let config: Config = toml::from_str("[input]\nsample_size = 55\n").unwrap();
        assert_eq!(config.input.sample_size, Some(55));
    }

    #[test]
    fn test_validate_health_check_interval() {
        let mut config = Config::default();
        config.endpoint.health_check_interval = 0;
        assert!(config.validate().is_ok());

        config.endpoint.health_check_timeout = 60;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("health_check_interval"));

        config.endpoint.health_check_interval = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_model() {
        let mut config = Config::default();
        config.model = "qwen3:4b".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("qwen3:4b"));
        assert!(err.contains("llama3.2:3b"));
    }

    #[test]
    fn test_validate_input() {
        let mut config = Config::default();
        config.input.sample_size = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.input.category = Some("Cooking".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.input.category = Some("Multimodal Tasks".to_string());
        config.input.file = Some(PathBuf::from("prompts.jsonl"));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.input.reference = Some("gpt-2".to_string());
        assert!(config.validate().is_err());
        config.input.file = Some(PathBuf::from("prompts.jsonl"));
        assert!(config.validate().is_ok());
    }
}
