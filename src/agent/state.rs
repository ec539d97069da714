//! Conversation state for a single agent run
//!
//! The state is append-only. Nodes read `&AgentState` and describe what to
//! add as a `StateUpdate`; the graph folds updates in with `apply`, which
//! consumes the previous state value.

use crate::core::{Message, Role, ToolCall};

/// A question put to the agent, optionally with a file to work on
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub text: String,
    /// URL of an attached file the tools can fetch
    pub file_url: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            file_url: None,
        }
    }

    pub fn with_file(mut self, url: impl Into<String>) -> Self {
        self.file_url = Some(url.into());
        self
    }

    /// Text of the user message that opens the conversation
    pub fn prompt(&self) -> String {
        match &self.file_url {
            Some(url) => format!("{}\n\nAttached file: {}", self.text, url),
            None => self.text.clone(),
        }
    }
}

impl From<&str> for Question {
    fn from(text: &str) -> Self {
        Question::new(text)
    }
}

impl From<String> for Question {
    fn from(text: String) -> Self {
        Question::new(text)
    }
}

/// Messages a node wants appended to the state
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    /// Whether this update is the product of an assistant invocation
    pub completes_turn: bool,
}

impl StateUpdate {
    /// Update carrying one assistant reply
    pub fn assistant(message: Message) -> Self {
        Self {
            messages: vec![message],
            completes_turn: true,
        }
    }

    /// Update carrying tool results
    pub fn tool_results(messages: Vec<Message>) -> Self {
        Self {
            messages,
            completes_turn: false,
        }
    }
}

/// Accumulated conversation of one run
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    messages: Vec<Message>,
    turns: usize,
}

impl AgentState {
    /// Initial state holding only the user's question
    pub fn seed(question: &Question) -> Self {
        Self {
            messages: vec![Message::user(question.prompt())],
            turns: 0,
        }
    }

    /// Fold an update into the state, returning the new state
    pub fn apply(mut self, update: StateUpdate) -> Self {
        self.messages.extend(update.messages);
        if update.completes_turn {
            self.turns += 1;
        }
        self
    }

    /// Number of completed assistant invocations
    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent assistant message, if any
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }

    /// Tool calls of the last message, when it is an assistant message asking for tools
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        match self.messages.last() {
            Some(message) if message.requests_tools() => &message.tool_calls,
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
