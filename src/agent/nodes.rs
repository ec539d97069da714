//! Graph nodes: the assistant (model call) and the tool dispatcher

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info};

use crate::agent::state::{AgentState, StateUpdate};
use crate::core::{FerretError, Message, Result};
use crate::llm::LLMProvider;
use crate::tools::ToolRegistry;

/// One step of the control loop
#[async_trait]
pub trait Node: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Read the state and describe what to append to it
    async fn run(&self, state: &AgentState) -> Result<StateUpdate>;
}

/// Invokes the model on the system prompt plus the conversation so far
pub struct AssistantNode {
    llm: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    model: String,
    system_prompt: String,
    tools_enabled: bool,
    timeout: Duration,
}

impl AssistantNode {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            tools,
            model: model.into(),
            system_prompt: system_prompt.into(),
            tools_enabled: true,
            timeout: Duration::from_secs(300),
        }
    }

    /// Whether the model is offered the tool schemas
    pub fn tools_enabled(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Backend failures other than a missing model are reported as invocation errors
fn as_model_error(err: FerretError) -> FerretError {
    match err {
        FerretError::ModelInvocation(_) | FerretError::ModelNotFound(_) => err,
        other => FerretError::model(other.to_string()),
    }
}

#[async_trait]
impl Node for AssistantNode {
    fn name(&self) -> &'static str {
        "assistant"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let mut messages = Vec::with_capacity(state.len() + 1);
        messages.push(Message::system(self.system_prompt.as_str()));
        messages.extend_from_slice(state.messages());

        let use_tools = self.tools_enabled && !self.tools.is_empty();
        let call = async {
            if use_tools {
                let definitions = self.tools.definitions();
                self.llm
                    .chat_with_tools(&self.model, &messages, &definitions)
                    .await
            } else {
                self.llm.chat(&self.model, &messages).await
            }
        };

        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                FerretError::model(format!(
                    "{} did not answer within {}s",
                    self.model,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(as_model_error)?;

        let turn = state.turns();
        if let Some(usage) = &response.usage {
            debug!(
                turn,
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Token usage"
            );
        }

        let mut tool_calls = response.tool_calls;
        for (index, call) in tool_calls.iter_mut().enumerate() {
            if call.id.is_empty() {
                call.id = format!("call_{}_{}", turn, index);
            }
        }

        debug!(turn, tool_calls = tool_calls.len(), chars = response.content.len(), "Model replied");

        Ok(StateUpdate::assistant(Message::assistant_with_tools(
            response.content,
            tool_calls,
        )))
    }
}

/// Executes the tool calls of the last assistant message
pub struct ToolNode {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
    parallel: bool,
}

impl ToolNode {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            timeout: Duration::from_secs(120),
            parallel: true,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the calls of one turn concurrently instead of one after another
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

#[async_trait]
impl Node for ToolNode {
    fn name(&self) -> &'static str {
        "tools"
    }

    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let calls = state.pending_tool_calls();
        info!(calls = calls.len(), parallel = self.parallel, "Dispatching tool calls");

        // join_all keeps request order
        let outputs: Vec<String> = if self.parallel {
            join_all(calls.iter().map(|call| self.tools.dispatch(call, self.timeout))).await
        } else {
            let mut outputs = Vec::with_capacity(calls.len());
            for call in calls {
                outputs.push(self.tools.dispatch(call, self.timeout).await);
            }
            outputs
        };

        let messages = calls
            .iter()
            .zip(outputs)
            .map(|(call, output)| Message::tool_result(call, output))
            .collect();

        Ok(StateUpdate::tool_results(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Role, ToolCall, ToolDefinition};
    use crate::llm::LLMResponse;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers every request with the same response and records what it saw
    struct Canned {
        response: LLMResponse,
        requests: Mutex<Vec<(usize, bool)>>,
    }

    impl Canned {
        fn new(response: LLMResponse) -> Self {
            Self {
                response,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for Canned {
        async fn chat(&self, _model: &str, messages: &[Message]) -> Result<LLMResponse> {
            self.requests.lock().unwrap().push((messages.len(), false));
            Ok(self.response.clone())
        }

        async fn chat_with_tools(
            &self,
            _model: &str,
            messages: &[Message],
            _tools: &[ToolDefinition],
        ) -> Result<LLMResponse> {
            self.requests.lock().unwrap().push((messages.len(), true));
            Ok(self.response.clone())
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_assistant_assigns_call_ids() {
        let response = LLMResponse::with_tool_calls(vec![
            ToolCall::new("", "web_search", json!({"query": "a"})),
            ToolCall::new("given", "wiki_search", json!({"query": "b"})),
        ]);
        let llm = Arc::new(Canned::new(response));
        let node = AssistantNode::new(llm.clone(), Arc::new(ToolRegistry::new()), "m", "sys");

        let state = AgentState::seed(&"q".into());
        let update = node.run(&state).await.unwrap();

        assert!(update.completes_turn);
        let calls = &update.messages[0].tool_calls;
        assert_eq!(calls[0].id, "call_0_0");
        assert_eq!(calls[1].id, "given");
        // system prompt + one user message, plain chat since no tools are registered
        assert_eq!(llm.requests.lock().unwrap()[0], (2, false));
    }

    #[tokio::test]
    async fn test_empty_state_still_gets_system_prompt() {
        let llm = Arc::new(Canned::new(LLMResponse::text("ok")));
        let node = AssistantNode::new(llm.clone(), Arc::new(ToolRegistry::new()), "m", "sys")
            .tools_enabled(false);

        let update = node.run(&AgentState::default()).await.unwrap();
        assert_eq!(update.messages[0].role, Role::Assistant);
        assert_eq!(llm.requests.lock().unwrap()[0], (1, false));
    }

    #[tokio::test]
    async fn test_tool_node_with_nothing_pending() {
        let node = ToolNode::new(Arc::new(ToolRegistry::new()));
        let update = node.run(&AgentState::seed(&"q".into())).await.unwrap();
        assert!(update.messages.is_empty());
        assert!(!update.completes_turn);
    }

    #[test]
    fn test_backend_errors_become_model_errors() {
        let err = as_model_error(FerretError::Other("connection reset".to_string()));
        assert!(matches!(err, FerretError::ModelInvocation(_)));
        let err = as_model_error(FerretError::ModelNotFound("qwen3".to_string()));
        assert!(matches!(err, FerretError::ModelNotFound(_)));
    }
}
