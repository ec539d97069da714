//! Agent orchestrator
//!
//! Owns the configuration, the model backend and the tool registry, and
//! builds a fresh bounded graph for every question.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::agent::graph::{AgentGraph, AgentRun};
use crate::agent::nodes::{AssistantNode, ToolNode};
use crate::agent::prompt::load_system_prompt;
use crate::agent::state::Question;
use crate::core::{Config, FerretError, Result, ToolKind};
use crate::llm::{LLMProvider, OllamaClient};
use crate::tools::ToolRegistry;

/// Main agent that answers questions with the model and tools
pub struct Agent {
    /// Configuration
    config: Config,
    /// Model backend
    llm: Arc<dyn LLMProvider>,
    /// Tool registry, shared with the nodes of every run
    tools: Arc<ToolRegistry>,
    /// System prompt prepended to every model call
    system_prompt: String,
}

impl Agent {
    /// Create an agent backed by Ollama with the tools enabled in `config`
    pub fn with_config(config: Config) -> Result<Self> {
        let llm: Arc<dyn LLMProvider> = Arc::new(OllamaClient::from_config(&config));
        let tools = ToolRegistry::from_config(&config, llm.clone());
        Self::with_provider(config, llm, tools)
    }

    /// Create an agent from explicit parts
    pub fn with_provider(
        config: Config,
        llm: Arc<dyn LLMProvider>,
        tools: ToolRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let system_prompt = load_system_prompt(config.agent.system_prompt_path.as_deref())?;

        Ok(Self {
            config,
            llm,
            tools: Arc::new(tools),
            system_prompt,
        })
    }

    /// Check that the backend is reachable and the configured models are pulled
    pub async fn initialize(&self) -> Result<()> {
        let models = self.llm.list_models().await.map_err(|_| {
            FerretError::OllamaNotReachable(
                self.config.ollama_url(),
                self.config.models.assistant.clone(),
            )
        })?;
        debug!(provider = self.llm.name(), ?models, "Available models");

        if !self.llm.is_model_available(&self.config.models.assistant).await? {
            return Err(FerretError::ModelNotFound(
                self.config.models.assistant.clone(),
            ));
        }

        // The vision model is only reachable through analyze_image
        if self.config.agent.tools_enabled
            && self.tools.contains(ToolKind::AnalyzeImage)
            && !self.llm.is_model_available(&self.config.models.vision).await?
        {
            return Err(FerretError::ModelNotFound(self.config.models.vision.clone()));
        }

        Ok(())
    }

    /// Answer one question with a fresh conversation
    pub async fn answer(&self, question: impl Into<Question>) -> Result<AgentRun> {
        let question = question.into();
        self.graph().invoke(&question).await
    }

    fn graph(&self) -> AgentGraph<AssistantNode, ToolNode> {
        let agent = &self.config.agent;

        let assistant = AssistantNode::new(
            self.llm.clone(),
            self.tools.clone(),
            self.config.models.assistant.clone(),
            self.system_prompt.clone(),
        )
        .tools_enabled(agent.tools_enabled)
        .timeout(Duration::from_secs(agent.model_timeout_secs));

        let tools = ToolNode::new(self.tools.clone())
            .timeout(Duration::from_secs(agent.tool_timeout_secs))
            .parallel(agent.parallel_tools);

        AgentGraph::new(assistant, tools, agent.max_turns)
            .answer_format(agent.reasoning_delimiter.clone(), agent.answer_prefix.clone())
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registered tools
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Models known to the backend
    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.llm.list_models().await
    }

    /// Switch the assistant model for subsequent questions
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.config.models.assistant = model.into();
    }

    /// Change the turn limit for subsequent questions
    pub fn set_max_turns(&mut self, max_turns: usize) -> Result<()> {
        if max_turns == 0 {
            return Err(FerretError::config("max_turns must be at least 1"));
        }
        self.config.agent.max_turns = max_turns;
        Ok(())
    }
}
