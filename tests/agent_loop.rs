//! Control loop integration tests
//!
//! A scripted model drives the real assistant/tool graph with stand-in tools.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ferret::agent::Agent;
use ferret::core::{
    Config, FerretError, Message, Result, Role, ToolCall, ToolDefinition, ToolKind,
};
use ferret::llm::{LLMProvider, LLMResponse};
use ferret::tools::http::HttpFetcher;
use ferret::tools::image::AnalyzeImage;
use ferret::tools::{format_documents, Document, Tool, ToolRegistry};
use serde_json::{json, Value};

/// Replays queued responses and records every request
struct ScriptedLlm {
    script: Mutex<VecDeque<LLMResponse>>,
    /// Returned once the script is exhausted
    fallback: LLMResponse,
    requests: Mutex<Vec<(Vec<Message>, bool)>>,
}

impl ScriptedLlm {
    fn new(script: Vec<LLMResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback: LLMResponse::text("out of script"),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A model that asks for a tool on every turn
    fn always_calling(tool: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: LLMResponse::with_tool_calls(vec![ToolCall::new(
                "",
                tool,
                json!({"query": "again"}),
            )]),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn next(&self, messages: &[Message], with_tools: bool) -> LLMResponse {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), with_tools));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> (Vec<Message>, bool) {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn chat(&self, _model: &str, messages: &[Message]) -> Result<LLMResponse> {
        Ok(self.next(messages, false))
    }

    async fn chat_with_tools(
        &self,
        _model: &str,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        Ok(self.next(messages, true))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["qwen3:32b".to_string()])
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Stand-in tool: echoes its query after an optional delay, or fails
struct FakeTool {
    kind: ToolKind,
    delay: Duration,
    fail: bool,
}

impl FakeTool {
    fn echo(kind: ToolKind, delay_ms: u64) -> Arc<dyn Tool> {
        Arc::new(Self {
            kind,
            delay: Duration::from_millis(delay_ms),
            fail: false,
        })
    }

    fn failing(kind: ToolKind) -> Arc<dyn Tool> {
        Arc::new(Self {
            kind,
            delay: Duration::ZERO,
            fail: true,
        })
    }
}

#[async_trait]
impl Tool for FakeTool {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    fn description(&self) -> &str {
        "test tool"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"query": {"type": "string"}}})
    }

    async fn invoke(&self, args: &Value) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(FerretError::tool("service unavailable"));
        }
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
        Ok(format!("{}: {}", self.kind, query))
    }
}

/// Web search stand-in that returns documents in the real layout
struct FakeWebSearch;

#[async_trait]
impl Tool for FakeWebSearch {
    fn kind(&self) -> ToolKind {
        ToolKind::WebSearch
    }

    fn description(&self) -> &str {
        "search the web"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]})
    }

    async fn invoke(&self, args: &Value) -> Result<String> {
        let query = args["query"].as_str().unwrap_or_default();
        Ok(format_documents(
            query,
            &[Document::new(
                "https://en.wikipedia.org/wiki/Mercedes_Sosa",
                "Mercedes Sosa released 3 studio albums between 2000 and 2009.",
            )],
        ))
    }
}

fn config(max_turns: usize) -> Config {
    let mut config = Config::default();
    config.agent.max_turns = max_turns;
    config.agent.tool_timeout_secs = 5;
    config.agent.model_timeout_secs = 5;
    config
}

fn agent_with(config: Config, llm: Arc<ScriptedLlm>, tools: Vec<Arc<dyn Tool>>) -> Agent {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    Agent::with_provider(config, llm, registry).unwrap()
}

fn call(name: &str, query: &str) -> ToolCall {
    ToolCall::new("", name, json!({ "query": query }))
}

fn tool_messages(messages: &[Message]) -> Vec<&Message> {
    messages.iter().filter(|m| m.role == Role::Tool).collect()
}

#[tokio::test]
async fn test_single_turn_without_tool_calls() {
    let llm = ScriptedLlm::new(vec![LLMResponse::text(
        "<think>\nThe user asks for 2+2, which is 4.\n</think>\n\n4",
    )]);
    let agent = agent_with(config(5), llm.clone(), vec![FakeTool::echo(ToolKind::WebSearch, 0)]);

    let run = agent.answer("What is 2+2?").await.unwrap();

    assert_eq!(run.answer, "4");
    assert_eq!(run.state.turns(), 1);
    assert_eq!(run.state.len(), 2);
    assert_eq!(llm.request_count(), 1);

    let (messages, with_tools) = llm.request(0);
    assert!(with_tools);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].content, "What is 2+2?");
}

#[tokio::test]
async fn test_tool_results_match_requests_in_order() {
    let llm = ScriptedLlm::new(vec![
        LLMResponse::with_tool_calls(vec![
            call("web_search", "first"),
            call("wiki_search", "second"),
            call("arxiv_search", "third"),
        ]),
        LLMResponse::text("done"),
    ]);
    // Slowest call first, so completion order differs from request order
    let agent = agent_with(
        config(5),
        llm.clone(),
        vec![
            FakeTool::echo(ToolKind::WebSearch, 150),
            FakeTool::echo(ToolKind::WikiSearch, 0),
            FakeTool::echo(ToolKind::ArxivSearch, 50),
        ],
    );

    let run = agent.answer("Look three things up").await.unwrap();
    let results = tool_messages(run.state.messages());

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].content, "web_search: first");
    assert_eq!(results[1].content, "wiki_search: second");
    assert_eq!(results[2].content, "arxiv_search: third");

    let ids: Vec<_> = results
        .iter()
        .map(|m| m.tool_call_id.clone().unwrap())
        .collect();
    assert_eq!(ids, vec!["call_0_0", "call_0_1", "call_0_2"]);

    // The second model call sees every result
    let (messages, _) = llm.request(1);
    assert_eq!(tool_messages(&messages).len(), 3);
}

#[tokio::test]
async fn test_sequential_dispatch_keeps_order() {
    let llm = ScriptedLlm::new(vec![
        LLMResponse::with_tool_calls(vec![call("web_search", "a"), call("wiki_search", "b")]),
        LLMResponse::text("done"),
    ]);
    let mut config = config(5);
    config.agent.parallel_tools = false;
    let agent = agent_with(
        config,
        llm,
        vec![
            FakeTool::echo(ToolKind::WebSearch, 20),
            FakeTool::echo(ToolKind::WikiSearch, 0),
        ],
    );

    let run = agent.answer("q").await.unwrap();
    let results = tool_messages(run.state.messages());
    assert_eq!(results[0].content, "web_search: a");
    assert_eq!(results[1].content, "wiki_search: b");
}

#[tokio::test]
async fn test_turn_limit_stops_a_looping_model() {
    let llm = ScriptedLlm::always_calling("web_search");
    let agent = agent_with(config(3), llm.clone(), vec![FakeTool::echo(ToolKind::WebSearch, 0)]);

    let err = agent.answer("Never satisfied").await.unwrap_err();

    assert!(matches!(err, FerretError::TurnLimitExceeded { max_turns: 3 }));
    assert_eq!(llm.request_count(), 3);
}

#[tokio::test]
async fn test_tool_failure_does_not_abort_the_run() {
    let llm = ScriptedLlm::new(vec![
        LLMResponse::with_tool_calls(vec![
            call("arxiv_search", "quantum"),
            call("wiki_search", "quantum"),
        ]),
        LLMResponse::text("Quantum"),
    ]);
    let agent = agent_with(
        config(5),
        llm,
        vec![
            FakeTool::failing(ToolKind::ArxivSearch),
            FakeTool::echo(ToolKind::WikiSearch, 0),
        ],
    );

    let run = agent.answer("What is it?").await.unwrap();
    let results = tool_messages(run.state.messages());

    assert_eq!(run.answer, "Quantum");
    assert_eq!(
        results[0].content,
        "Error running arxiv_search: service unavailable"
    );
    assert_eq!(results[1].content, "wiki_search: quantum");
}

#[tokio::test]
async fn test_unknown_tool_becomes_error_text() {
    let llm = ScriptedLlm::new(vec![
        LLMResponse::with_tool_calls(vec![call("browser_click", "x")]),
        LLMResponse::text("gave up"),
    ]);
    let agent = agent_with(config(5), llm, vec![FakeTool::echo(ToolKind::WebSearch, 0)]);

    let run = agent.answer("q").await.unwrap();
    let results = tool_messages(run.state.messages());

    assert_eq!(
        results[0].content,
        "Error: unknown tool 'browser_click'. Available tools: web_search"
    );
    assert_eq!(results[0].tool_name.as_deref(), Some("browser_click"));
}

#[tokio::test]
async fn test_web_search_round_trip() {
    let llm = ScriptedLlm::new(vec![
        LLMResponse::with_tool_calls(vec![call(
            "web_search",
            "Mercedes Sosa studio albums 2000 2009",
        )]),
        LLMResponse::text("<think>The document says 3.</think>\n3"),
    ]);
    let search: Arc<dyn Tool> = Arc::new(FakeWebSearch);
    let agent = agent_with(config(5), llm.clone(), vec![search]);

    let run = agent
        .answer("How many studio albums did Mercedes Sosa publish between 2000 and 2009?")
        .await
        .unwrap();

    assert_eq!(run.answer, "3");
    assert_eq!(run.state.turns(), 2);

    let (messages, _) = llm.request(1);
    let result = messages.last().unwrap();
    assert_eq!(result.role, Role::Tool);
    assert!(result
        .content
        .starts_with("<Document source=\"https://en.wikipedia.org/wiki/Mercedes_Sosa\" page=\"\"/>"));
}

#[tokio::test]
async fn test_malformed_image_url_reported_as_text() {
    let llm = ScriptedLlm::new(vec![
        LLMResponse::with_tool_calls(vec![ToolCall::new(
            "",
            "analyze_image",
            json!({"url": "htp:/broken url.png", "question": "What move wins?"}),
        )]),
        LLMResponse::text("Cannot tell"),
    ]);
    let image: Arc<dyn Tool> =
        Arc::new(AnalyzeImage::new(HttpFetcher::new(2), llm.clone(), "qwen2.5vl:7b"));
    let agent = agent_with(config(5), llm, vec![image]);

    let run = agent.answer("Which move wins?").await.unwrap();
    let results = tool_messages(run.state.messages());

    assert_eq!(results.len(), 1);
    assert!(results[0].content.starts_with("Error extracting text:"));
    assert_eq!(run.answer, "Cannot tell");
}

#[tokio::test]
async fn test_tools_disabled_uses_plain_chat() {
    let llm = ScriptedLlm::new(vec![LLMResponse::text("Canberra")]);
    let mut config = config(5);
    config.agent.tools_enabled = false;
    let agent = agent_with(config, llm.clone(), vec![FakeTool::echo(ToolKind::WebSearch, 0)]);

    let run = agent.answer("Capital of Australia?").await.unwrap();

    assert_eq!(run.answer, "Canberra");
    assert!(!llm.request(0).1);
}

#[tokio::test]
async fn test_answers_are_independent() {
    let llm = ScriptedLlm::new(vec![LLMResponse::text("1"), LLMResponse::text("2")]);
    let agent = agent_with(config(5), llm.clone(), vec![]);

    agent.answer("first").await.unwrap();
    let second = agent.answer("second").await.unwrap();

    assert_eq!(second.answer, "2");
    assert_eq!(second.state.len(), 2);
    // system prompt + the new question only
    assert_eq!(llm.request(1).0.len(), 2);
}
