//! Ollama client and end-to-end agent tests against a mocked Ollama server

use ferret::core::{Config, FerretError, Message, ToolDefinition};
use ferret::llm::{LLMProvider, OllamaClient};
use ferret::Agent;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_body(content: &str) -> serde_json::Value {
    json!({
        "model": "qwen3:32b",
        "created_at": "2025-05-01T10:00:00Z",
        "message": {
            "role": "assistant",
            "content": content
        },
        "done": true,
        "prompt_eval_count": 26,
        "eval_count": 12
    })
}

fn tool_call_body(name: &str, arguments: serde_json::Value) -> serde_json::Value {
    json!({
        "model": "qwen3:32b",
        "created_at": "2025-05-01T10:00:00Z",
        "message": {
            "role": "assistant",
            "content": "",
            "tool_calls": [{
                "function": {
                    "name": name,
                    "arguments": arguments
                }
            }]
        },
        "done": true
    })
}

fn tags_body() -> serde_json::Value {
    json!({
        "models": [
            {"name": "qwen3:32b"},
            {"name": "qwen2.5vl:7b"}
        ]
    })
}

fn config_for(server: &MockServer) -> Config {
    let address = server.address();
    let mut config = Config::default();
    config.ollama.host = address.ip().to_string();
    config.ollama.port = address.port();
    config.models.assistant = "qwen3:32b".to_string();
    config.models.vision = "qwen2.5vl:7b".to_string();
    config.agent.max_turns = 4;
    config
}

#[tokio::test]
async fn test_text_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "qwen3:32b", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("Hello!")))
        .mount(&server)
        .await;

    let client = OllamaClient::with_base_url(server.uri());
    let response = client
        .chat("qwen3:32b", &[Message::user("Hi")])
        .await
        .unwrap();

    assert_eq!(response.content, "Hello!");
    assert!(response.tool_calls.is_empty());
    let usage = response.usage.unwrap();
    assert_eq!(usage.total_tokens, 38);
}

#[tokio::test]
async fn test_tool_call_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "tools": [{"type": "function", "function": {"name": "wiki_search"}}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(tool_call_body("wiki_search", json!({"query": "Ada Lovelace"}))),
        )
        .mount(&server)
        .await;

    let tools = vec![ToolDefinition::function(
        "wiki_search",
        "Search Wikipedia",
        json!({"type": "object", "properties": {"query": {"type": "string"}}}),
    )];

    let client = OllamaClient::with_base_url(server.uri());
    let response = client
        .chat_with_tools("qwen3:32b", &[Message::user("Who was Ada?")], &tools)
        .await
        .unwrap();

    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "wiki_search");
    assert_eq!(response.tool_calls[0].arguments, json!({"query": "Ada Lovelace"}));
    // Ollama does not send call ids; the assistant node assigns them
    assert!(response.tool_calls[0].id.is_empty());
}

#[tokio::test]
async fn test_missing_model() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "model \"nope\" not found, try pulling it first"})),
        )
        .mount(&server)
        .await;

    let client = OllamaClient::with_base_url(server.uri());
    let err = client
        .chat("nope", &[Message::user("Hi")])
        .await
        .unwrap_err();

    assert!(matches!(err, FerretError::ModelNotFound(ref m) if m == "nope"));
}

#[tokio::test]
async fn test_server_error_is_model_invocation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("out of memory"))
        .mount(&server)
        .await;

    let client = OllamaClient::with_base_url(server.uri());
    let err = client
        .chat("qwen3:32b", &[Message::user("Hi")])
        .await
        .unwrap_err();

    assert!(matches!(err, FerretError::ModelInvocation(ref m) if m.contains("out of memory")));
}

#[tokio::test]
async fn test_model_availability() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags_body()))
        .mount(&server)
        .await;

    let client = OllamaClient::with_base_url(server.uri());
    assert_eq!(client.list_models().await.unwrap().len(), 2);
    assert!(client.is_model_available("qwen3:32b").await.unwrap());
    assert!(client.is_model_available("qwen3").await.unwrap());
    assert!(!client.is_model_available("qwen3:8b").await.unwrap());
}

#[tokio::test]
async fn test_initialize_reports_missing_vision_model() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"models": [{"name": "qwen3:32b"}]})),
        )
        .mount(&server)
        .await;

    let agent = Agent::with_config(config_for(&server)).unwrap();
    let err = agent.initialize().await.unwrap_err();
    assert!(matches!(err, FerretError::ModelNotFound(ref m) if m == "qwen2.5vl:7b"));
}

#[tokio::test]
async fn test_initialize_skips_vision_model_without_tools() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"models": [{"name": "qwen3:32b"}]})),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.agent.tools_enabled = false;

    let agent = Agent::with_config(config).unwrap();
    assert!(agent.initialize().await.is_ok());
}

#[tokio::test]
async fn test_initialize_without_server() {
    let mut config = Config::default();
    config.ollama.host = "127.0.0.1".to_string();
    config.ollama.port = 1;

    let agent = Agent::with_config(config).unwrap();
    let err = agent.initialize().await.unwrap_err();
    assert!(matches!(err, FerretError::OllamaNotReachable(_, _)));
}

#[tokio::test]
async fn test_answer_strips_reasoning() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
            "<think>\nTwo plus two equals four.\n</think>\n\n4",
        )))
        .mount(&server)
        .await;

    let agent = Agent::with_config(config_for(&server)).unwrap();
    let run = agent.answer("What is 2+2?").await.unwrap();

    assert_eq!(run.answer, "4");
    assert_eq!(run.state.turns(), 1);
}

#[tokio::test]
async fn test_answer_with_code_file_tool() {
    let server = MockServer::start().await;
    let file_url = format!("{}/files/task.py", server.uri());

    Mock::given(method("GET"))
        .and(path("/files/task.py"))
        .respond_with(ResponseTemplate::new(200).set_body_string("print(6 * 7)\n"))
        .mount(&server)
        .await;

    // First model call asks for the file, the second answers
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(tool_call_body("analyze_code_file", json!({"url": file_url}))),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system"},
                {"role": "user"},
                {"role": "assistant"},
                {"role": "tool", "tool_name": "analyze_code_file", "content": "print(6 * 7)\n"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("<think>6*7</think>42")))
        .mount(&server)
        .await;

    let agent = Agent::with_config(config_for(&server)).unwrap();
    let run = agent
        .answer(ferret::Question::new("What does the attached script print?").with_file(&file_url))
        .await
        .unwrap();

    assert_eq!(run.answer, "42");
    assert_eq!(run.state.turns(), 2);
}
