//! Tool registry - manages and dispatches tool calls
//!
//! Maps each enabled `ToolKind` to its implementation and routes tool calls
//! by name. Dispatch never fails: unknown names, tool errors and timeouts all
//! come back as text for the model.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::audio::{AnalyzeAudio, AnalyzeYoutubeAudio, Transcriber, WhisperTranscriber};
use super::files::{AnalyzeCodeFile, AnalyzeExcel};
use super::http::HttpFetcher;
use super::image::AnalyzeImage;
use super::python::PythonRepl;
use super::search::{ArxivSearch, WebSearch, WikiSearch};
use super::Tool;
use crate::core::{Config, ToolCall, ToolDefinition, ToolKind};
use crate::llm::LLMProvider;

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every tool enabled in `config`
    pub fn from_config(config: &Config, llm: Arc<dyn LLMProvider>) -> Self {
        let transcriber: Arc<dyn Transcriber> =
            Arc::new(WhisperTranscriber::from_config(&config.transcription));
        Self::with_transcriber(config, llm, transcriber)
    }

    /// Like `from_config`, with a caller-supplied speech-to-text backend
    pub fn with_transcriber(
        config: &Config,
        llm: Arc<dyn LLMProvider>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        let tools = &config.tools;
        let http = HttpFetcher::new(tools.http_timeout_secs);
        let mut registry = Self::new();

        for kind in ToolKind::ALL {
            if !config.is_tool_enabled(kind) {
                continue;
            }

            let tool: Arc<dyn Tool> = match kind {
                ToolKind::WebSearch => {
                    Arc::new(WebSearch::new(http.clone(), tools.web_search_results))
                }
                ToolKind::WikiSearch => Arc::new(WikiSearch::new(http.clone(), tools.wiki_max_docs)),
                ToolKind::ArxivSearch => Arc::new(ArxivSearch::new(
                    http.clone(),
                    tools.arxiv_max_docs,
                    tools.arxiv_max_chars,
                )),
                ToolKind::AnalyzeExcel => Arc::new(AnalyzeExcel::new(http.clone())),
                ToolKind::AnalyzeCodeFile => Arc::new(AnalyzeCodeFile::new(http.clone())),
                ToolKind::AnalyzeAudio => {
                    Arc::new(AnalyzeAudio::new(http.clone(), transcriber.clone()))
                }
                ToolKind::AnalyzeYoutubeAudio => Arc::new(AnalyzeYoutubeAudio::new(
                    tools.yt_dlp_bin.clone(),
                    transcriber.clone(),
                )),
                ToolKind::AnalyzeImage => Arc::new(AnalyzeImage::new(
                    http.clone(),
                    llm.clone(),
                    config.models.vision.clone(),
                )),
                ToolKind::PythonRepl => Arc::new(PythonRepl::new(
                    tools.python_bin.clone(),
                    tools.python_timeout_secs,
                )),
            };
            registry.register(tool);
        }

        registry
    }

    /// Register a tool, replacing any previous tool of the same kind
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    /// Look up a tool by the name the model uses
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        let kind = name.parse::<ToolKind>().ok()?;
        self.tools.get(&kind)
    }

    /// Whether a tool of this kind is registered
    pub fn contains(&self, kind: ToolKind) -> bool {
        self.tools.contains_key(&kind)
    }

    /// Definitions of all registered tools, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|tool| tool.definition()).collect();
        definitions.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        definitions
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.tools.keys().map(|kind| kind.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call, always producing text for the model
    pub async fn dispatch(&self, call: &ToolCall, timeout: Duration) -> String {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return format!(
                "Error: unknown tool '{}'. Available tools: {}",
                call.name,
                self.names().join(", ")
            );
        };

        info!(tool = %call.name, id = %call.id, "Running tool");

        match tokio::time::timeout(timeout, tool.run(&call.arguments)).await {
            Ok(output) => output,
            Err(_) => {
                warn!(tool = %call.name, secs = timeout.as_secs(), "Tool timed out");
                format!(
                    "Error: tool '{}' timed out after {}s",
                    call.name,
                    timeout.as_secs()
                )
            }
        }
    }
}
