//! Configuration management for Ferret
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/ferret/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{FerretError, Result};
use crate::core::types::ToolKind;

/// Main configuration for Ferret
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Model configuration
    #[serde(default)]
    pub models: ModelConfig,
    /// Control loop configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Tool configuration
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Speech-to-text backend
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model driving the assistant node
    /// Default: qwen3:32b
    pub assistant: String,
    /// Model used by the image analysis tool
    /// Default: qwen2.5vl:7b
    pub vision: String,
}

/// Control loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum assistant turns before the run fails
    /// Default: 10
    pub max_turns: usize,
    /// Timeout for one model invocation in seconds
    pub model_timeout_secs: u64,
    /// Timeout for one tool invocation in seconds
    pub tool_timeout_secs: u64,
    /// Run the tool calls of one turn concurrently
    pub parallel_tools: bool,
    /// Bind the tool schemas to the model
    pub tools_enabled: bool,
    /// Marker closing the model's reasoning trace
    pub reasoning_delimiter: String,
    /// Prefix stripped from final answers when the model echoes it
    pub answer_prefix: Option<String>,
    /// Override for the built-in system prompt, relative to the working directory
    pub system_prompt_path: Option<PathBuf>,
}

/// Tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Names of the tools to register
    pub enabled: Vec<String>,
    /// Timeout for HTTP fetches made by tools, in seconds
    pub http_timeout_secs: u64,
    /// Maximum web search results
    pub web_search_results: usize,
    /// Maximum Wikipedia documents
    pub wiki_max_docs: usize,
    /// Maximum Arxiv documents
    pub arxiv_max_docs: usize,
    /// Characters kept from each Arxiv document
    pub arxiv_max_chars: usize,
    /// Python interpreter used by the REPL tool
    pub python_bin: String,
    /// Timeout for one Python snippet, in seconds
    pub python_timeout_secs: u64,
    /// yt-dlp executable
    pub yt_dlp_bin: String,
}

/// Speech-to-text backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Base URL of an OpenAI-compatible transcription server
    pub base_url: String,
    /// Transcription model name
    pub model: String,
    /// API key, if the server requires one
    pub api_key: Option<String>,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            timeout_secs: 300,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            assistant: env::var("FERRET_MODEL").unwrap_or_else(|_| "qwen3:32b".to_string()),
            vision: env::var("FERRET_VISION_MODEL")
                .unwrap_or_else(|_| "qwen2.5vl:7b".to_string()),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: env::var("FERRET_MAX_TURNS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            model_timeout_secs: 300,
            tool_timeout_secs: 120,
            parallel_tools: env_flag("FERRET_PARALLEL_TOOLS", true),
            tools_enabled: true,
            reasoning_delimiter: "</think>".to_string(),
            answer_prefix: Some("FINAL ANSWER:".to_string()),
            system_prompt_path: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: ToolKind::ALL.iter().map(|k| k.as_str().to_string()).collect(),
            http_timeout_secs: 15,
            web_search_results: 3,
            wiki_max_docs: 2,
            arxiv_max_docs: 3,
            arxiv_max_chars: 1000,
            python_bin: env::var("FERRET_PYTHON").unwrap_or_else(|_| "python3".to_string()),
            python_timeout_secs: 30,
            yt_dlp_bin: "yt-dlp".to_string(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("FERRET_WHISPER_URL")
                .unwrap_or_else(|_| "http://localhost:8000/v1".to_string()),
            model: env::var("FERRET_WHISPER_MODEL")
                .unwrap_or_else(|_| "Systran/faster-whisper-small".to_string()),
            api_key: env::var("FERRET_WHISPER_API_KEY").ok(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ferret")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    ///
    /// A missing config file means defaults; a file that does not parse or
    /// validate is an error.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = Self::config_file();
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FerretError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_toml(&content)
            .map_err(|e| FerretError::config(format!("{}: {}", path.display(), e.detail())))
    }

    /// Parse configuration from TOML text; missing sections use defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| FerretError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the control loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_turns == 0 {
            return Err(FerretError::config("agent.max_turns must be at least 1"));
        }

        if let Some(unknown) = self
            .tools
            .enabled
            .iter()
            .find(|name| name.parse::<ToolKind>().is_err())
        {
            return Err(FerretError::config(format!(
                "Unknown tool in tools.enabled: {}",
                unknown
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| FerretError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| FerretError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| FerretError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Whether a tool is listed in `tools.enabled`
    pub fn is_tool_enabled(&self, kind: ToolKind) -> bool {
        self.tools.enabled.iter().any(|t| t == kind.as_str())
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
