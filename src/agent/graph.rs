//! The bounded control loop
//!
//! ```text
//! Start -> Assistant -> Tools -> Assistant -> ... -> End
//! ```
//!
//! The assistant step runs at most `max_turns` times per run.

use tracing::{info, warn};

use crate::agent::answer::extract_answer;
use crate::agent::nodes::Node;
use crate::agent::state::{AgentState, Question};
use crate::core::{FerretError, Result};

/// Position in the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Start,
    Assistant,
    Tools,
    End,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Start => write!(f, "start"),
            Step::Assistant => write!(f, "assistant"),
            Step::Tools => write!(f, "tools"),
            Step::End => write!(f, "end"),
        }
    }
}

/// Where to go once the assistant has replied
pub fn route_after_assistant(state: &AgentState) -> Step {
    if state.pending_tool_calls().is_empty() {
        Step::End
    } else {
        Step::Tools
    }
}

/// Result of one run
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Final answer extracted from the last assistant message
    pub answer: String,
    /// Full conversation, including tool results
    pub state: AgentState,
}

/// Assistant and tool nodes wired into a bounded loop
pub struct AgentGraph<A, T> {
    assistant: A,
    tools: T,
    max_turns: usize,
    reasoning_delimiter: String,
    answer_prefix: Option<String>,
}

impl<A: Node, T: Node> AgentGraph<A, T> {
    pub fn new(assistant: A, tools: T, max_turns: usize) -> Self {
        Self {
            assistant,
            tools,
            max_turns,
            reasoning_delimiter: "</think>".to_string(),
            answer_prefix: None,
        }
    }

    /// Configure how the final answer is cut out of the last reply
    pub fn answer_format(mut self, delimiter: impl Into<String>, prefix: Option<String>) -> Self {
        self.reasoning_delimiter = delimiter.into();
        self.answer_prefix = prefix;
        self
    }

    /// Run the loop from a fresh state seeded with `question`
    pub async fn invoke(&self, question: &Question) -> Result<AgentRun> {
        let mut state = AgentState::seed(question);
        let mut step = Step::Start;

        loop {
            step = match step {
                Step::Start => Step::Assistant,
                Step::Assistant => {
                    if state.turns() >= self.max_turns {
                        warn!(max_turns = self.max_turns, "Turn limit reached without a final answer");
                        return Err(FerretError::TurnLimitExceeded {
                            max_turns: self.max_turns,
                        });
                    }

                    info!(
                        turn = state.turns() + 1,
                        max_turns = self.max_turns,
                        node = self.assistant.name(),
                        "Invoking model"
                    );
                    let update = self.assistant.run(&state).await?;
                    state = state.apply(update);
                    route_after_assistant(&state)
                }
                Step::Tools => {
                    info!(
                        turn = state.turns(),
                        node = self.tools.name(),
                        calls = state.pending_tool_calls().len(),
                        "Running tools"
                    );
                    let update = self.tools.run(&state).await?;
                    state = state.apply(update);
                    Step::Assistant
                }
                Step::End => break,
            };
        }

        let last = state
            .last_assistant()
            .ok_or_else(|| FerretError::model("Run ended without an assistant reply"))?;
        let answer = extract_answer(
            &last.content,
            &self.reasoning_delimiter,
            self.answer_prefix.as_deref(),
        );

        info!(turns = state.turns(), messages = state.len(), "Run complete");
        Ok(AgentRun { answer, state })
    }
}
